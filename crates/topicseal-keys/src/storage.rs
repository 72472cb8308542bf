//! Backends for the second-level key cache.
//!
//! A backend stores one opaque text blob. It may be shared between
//! processes; nothing here coordinates concurrent writers.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use crate::error::CacheStorageError;

/// Persisted storage for the serialized key cache.
pub trait SecondLevelCacheStorage: Send + Sync {
    /// Replace the stored blob.
    fn store_entry(&self, text: &str) -> Result<(), CacheStorageError>;

    /// The stored blob, or `None` if nothing was stored yet.
    fn retrieve_entry(&self) -> Result<Option<String>, CacheStorageError>;
}

impl<T> SecondLevelCacheStorage for Arc<T>
where
    T: SecondLevelCacheStorage + ?Sized,
{
    fn store_entry(&self, text: &str) -> Result<(), CacheStorageError> {
        (**self).store_entry(text)
    }

    fn retrieve_entry(&self) -> Result<Option<String>, CacheStorageError> {
        (**self).retrieve_entry()
    }
}

/// Process-local storage, mostly for tests and single-instance deployments.
#[derive(Debug, Default)]
pub struct InMemoryCacheStorage {
    blob: Mutex<Option<String>>,
}

impl InMemoryCacheStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a blob.
    pub fn with_contents(text: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(text.into())),
        }
    }

    /// Current blob.
    pub fn contents(&self) -> Option<String> {
        self.blob.lock().clone()
    }
}

impl SecondLevelCacheStorage for InMemoryCacheStorage {
    fn store_entry(&self, text: &str) -> Result<(), CacheStorageError> {
        *self.blob.lock() = Some(text.to_string());
        Ok(())
    }

    fn retrieve_entry(&self) -> Result<Option<String>, CacheStorageError> {
        Ok(self.blob.lock().clone())
    }
}

/// Storage in a single file.
///
/// Every write goes to its own uniquely named sibling temp file that is then
/// renamed over the target. A reader sees either the old blob or a new one,
/// and concurrent writers never share a temp file; the last rename wins.
#[derive(Debug, Clone)]
pub struct FileCacheStorage {
    path: PathBuf,
}

impl FileCacheStorage {
    /// Storage at `path`. The parent directory must exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl SecondLevelCacheStorage for FileCacheStorage {
    fn store_entry(&self, text: &str) -> Result<(), CacheStorageError> {
        let mut temp = NamedTempFile::new_in(self.dir())?;
        temp.write_all(text.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn retrieve_entry(&self) -> Result<Option<String>, CacheStorageError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
