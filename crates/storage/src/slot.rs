use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use snafu::{ResultExt, ensure};

use super::KeyValueStore;
use super::error::{
    CreateStorageDirectorySnafu, InvalidKeySnafu, ReadSlotSnafu, ReplaceSlotSnafu, StorageResult,
    WriteSlotSnafu,
};

const SLOT_EXTENSION: &str = "json";
const TEMP_SLOT_EXTENSION: &str = "json.tmp";

/// Key-value slots backed by one JSON file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn slot_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.{SLOT_EXTENSION}")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.slot_path(key)?;
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&path).context(ReadSlotSnafu {
            stage: "read-slot",
            path: display_path(&path),
        })?;
        Ok(Some(raw))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.slot_path(key)?;
        std::fs::create_dir_all(&self.root).context(CreateStorageDirectorySnafu {
            stage: "create-storage-directory",
            path: display_path(&self.root),
        })?;

        // Write-then-rename keeps the previous snapshot intact if the process dies mid-write.
        let temp_path = path.with_extension(TEMP_SLOT_EXTENSION);
        std::fs::write(&temp_path, value).context(WriteSlotSnafu {
            stage: "write-temporary-slot",
            path: display_path(&temp_path),
        })?;

        std::fs::rename(&temp_path, &path).context(ReplaceSlotSnafu {
            stage: "rename-temporary-slot",
            from: display_path(&temp_path),
            to: display_path(&path),
        })?;

        tracing::debug!(key, path = %path.display(), bytes = value.len(), "wrote storage slot");
        Ok(())
    }
}

/// In-process slots; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::new();
        store.lock().insert(key.into(), value.into());
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        validate_key(key)?;
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || matches!(character, '-' | '_'));
    ensure!(
        valid,
        InvalidKeySnafu {
            stage: "validate-slot-key",
            key: key.to_string(),
        }
    );
    Ok(())
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
