use snafu::ResultExt;

use super::KeyValueStore;
use super::error::{DecodeSnapshotSnafu, EncodeSnapshotSnafu, StorageResult};
use super::types::SessionRecord;

/// Fixed slot key holding the whole session collection; shared with snapshots
/// written by earlier web clients.
pub const SNAPSHOT_KEY: &str = "recentChats";

/// What a startup read of the snapshot slot found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotLoad {
    /// Nothing was ever written: first run.
    Missing,
    Loaded(Vec<SessionRecord>),
    /// The slot exists but could not be read or decoded.
    Unreadable { details: String },
}

pub fn encode_snapshot(sessions: &[SessionRecord]) -> StorageResult<String> {
    serde_json::to_string(sessions).context(EncodeSnapshotSnafu {
        stage: "encode-snapshot",
    })
}

pub fn decode_snapshot(raw: &str) -> StorageResult<Vec<SessionRecord>> {
    serde_json::from_str(raw).context(DecodeSnapshotSnafu {
        stage: "decode-snapshot",
    })
}

/// Reads the snapshot slot; never fails, the outcome says what was found.
pub fn load_snapshot(store: &dyn KeyValueStore) -> SnapshotLoad {
    let raw = match store.get(SNAPSHOT_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return SnapshotLoad::Missing,
        Err(error) => {
            tracing::warn!(key = SNAPSHOT_KEY, error = %error, "failed to read session snapshot");
            return SnapshotLoad::Unreadable {
                details: error.to_string(),
            };
        }
    };

    match decode_snapshot(&raw) {
        Ok(sessions) => SnapshotLoad::Loaded(sessions),
        Err(error) => {
            tracing::warn!(
                key = SNAPSHOT_KEY,
                bytes = raw.len(),
                error = %error,
                "session snapshot is malformed"
            );
            SnapshotLoad::Unreadable {
                details: error.to_string(),
            }
        }
    }
}

pub fn save_snapshot(store: &dyn KeyValueStore, sessions: &[SessionRecord]) -> StorageResult<()> {
    let encoded = encode_snapshot(sessions)?;
    store.set(SNAPSHOT_KEY, &encoded)
}
