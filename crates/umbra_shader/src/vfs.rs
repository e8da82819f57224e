//! In-memory virtual filesystem
//!
//! Generated shader fragments (window size, camera planes, feature flags)
//! live here instead of on disk. The loader consults it before touching the
//! real filesystem, so a shader can `#include` a file that only exists in
//! memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

/// Shared in-memory file store
///
/// Cloning is cheap and every clone sees the same files.
#[derive(Debug, Clone, Default)]
pub struct VirtualFs {
    files: Arc<RwLock<HashMap<PathBuf, String>>>,
}

impl VirtualFs {
    /// Create an empty filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Write (or overwrite) a file
    pub fn write(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        let path = path.into();
        log::trace!("vfs write {:?}", path);
        self.files.write().insert(path, contents.into());
    }

    /// Read a file
    pub fn read(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.read().get(path.as_ref()).cloned()
    }

    /// Check whether a file exists
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.files.read().contains_key(path.as_ref())
    }

    /// Remove a file, returning its contents
    pub fn remove(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.write().remove(path.as_ref())
    }

    /// Number of stored files
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// Check if the filesystem is empty
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}
