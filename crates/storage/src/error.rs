use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display("storage key '{key}' is invalid; use ASCII letters, digits, '-' or '_'"))]
    InvalidKey { stage: &'static str, key: String },
    #[snafu(display("failed to create storage directory at {path}"))]
    CreateStorageDirectory {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to read storage slot from {path}"))]
    ReadSlot {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to write storage slot to {path}"))]
    WriteSlot {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to replace storage slot from {from} to {to}"))]
    ReplaceSlot {
        stage: &'static str,
        from: String,
        to: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to encode session snapshot: {source}"))]
    EncodeSnapshot {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to decode session snapshot: {source}"))]
    DecodeSnapshot {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("storage slot '{key}' is unavailable: {details}"))]
    SlotUnavailable {
        stage: &'static str,
        key: String,
        details: String,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;
