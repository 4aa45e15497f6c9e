pub mod error;
pub mod slot;
pub mod snapshot;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use slot::{FileStore, MemoryStore};
pub use snapshot::{
    SNAPSHOT_KEY, SnapshotLoad, decode_snapshot, encode_snapshot, load_snapshot, save_snapshot,
};
pub use types::{MessageRecord, MessageRole, SessionRecord};

/// A named-slot store holding whole serialized documents.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
}
