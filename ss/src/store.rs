//! Core SliceStore implementation

use eyre::{Context, Result};
use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::SLICE_EXTENSION;

/// Name of the advisory lock file inside the store directory
const LOCK_FILE: &str = ".lock";

/// Metadata about one stored slice
#[derive(Debug, Clone)]
pub struct SliceInfo {
    /// Slice key
    pub key: String,
    /// Size of the serialized document in bytes
    pub bytes: u64,
}

/// Check that a key is safe to use as a file name
///
/// Keys are limited to ASCII alphanumerics, `_`, `-` and `.`, and may not start with a dot.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// Held for the duration of one read or write
struct LockGuard(fs::File);

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

/// The slice store
pub struct SliceStore {
    /// Base path for storage
    base_path: PathBuf,
}

impl SliceStore {
    /// Open or create a slice store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create store directory")?;
        debug!(?base_path, "Opened slice store");
        Ok(Self { base_path })
    }

    /// Directory holding the slice documents
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    fn slice_path(&self, key: &str) -> Result<PathBuf> {
        if !is_valid_key(key) {
            return Err(eyre::eyre!("Invalid slice key: '{}'", key));
        }
        Ok(self.base_path.join(format!("{}.{}", key, SLICE_EXTENSION)))
    }

    fn lock(&self, exclusive: bool) -> Result<LockGuard> {
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.base_path.join(LOCK_FILE))
            .context("Failed to open store lock file")?;
        if exclusive {
            FileExt::lock_exclusive(&file).context("Failed to lock store")?;
        } else {
            FileExt::lock_shared(&file).context("Failed to lock store")?;
        }
        Ok(LockGuard(file))
    }

    /// Read the raw text of a slice, `None` when the key was never written
    pub fn read_raw(&self, key: &str) -> Result<Option<String>> {
        let path = self.slice_path(key)?;
        let _guard = self.lock(false)?;
        if !path.exists() {
            debug!(%key, "read_raw: slice absent");
            return Ok(None);
        }
        let content = fs::read_to_string(&path).context(format!("Failed to read slice: {}", key))?;
        debug!(%key, bytes = content.len(), "read_raw: slice read");
        Ok(Some(content))
    }

    /// Replace the raw text of a slice
    ///
    /// The document is written to a temporary file and renamed over the old one,
    /// so readers see either the previous or the new version, never a torn write.
    pub fn write_raw(&self, key: &str, content: &str) -> Result<()> {
        let path = self.slice_path(key)?;
        let tmp = self.base_path.join(format!(".{}.{}.tmp", key, SLICE_EXTENSION));
        let _guard = self.lock(true)?;
        fs::write(&tmp, content).context(format!("Failed to write slice: {}", key))?;
        fs::rename(&tmp, &path).context(format!("Failed to replace slice: {}", key))?;
        debug!(%key, bytes = content.len(), "write_raw: slice written");
        Ok(())
    }

    /// Load and deserialize a slice
    ///
    /// Returns `Ok(None)` when the key is absent and an error when the stored
    /// text does not parse as `T`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_raw(key)? {
            Some(content) => {
                let value = serde_json::from_str(&content).context(format!("Failed to parse slice: {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Serialize and store a whole slice
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let content = serde_json::to_string(value).context(format!("Failed to serialize slice: {}", key))?;
        self.write_raw(key, &content)
    }

    /// Remove a slice, returning whether it existed
    pub fn remove(&self, key: &str) -> Result<bool> {
        let path = self.slice_path(key)?;
        let _guard = self.lock(true)?;
        if path.exists() {
            fs::remove_file(&path)?;
            info!(%key, "Removed slice");
            return Ok(true);
        }
        Ok(false)
    }

    /// List all stored slices, sorted by key
    pub fn list(&self) -> Result<Vec<SliceInfo>> {
        let mut slices = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == SLICE_EXTENSION).unwrap_or(false)
                && let Some(key) = path.file_stem().and_then(|s| s.to_str())
                && is_valid_key(key)
            {
                slices.push(SliceInfo {
                    key: key.to_string(),
                    bytes: entry.metadata()?.len(),
                });
            }
        }

        slices.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(slices)
    }
}
