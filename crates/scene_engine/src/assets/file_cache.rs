//! Byte-level file access with a process-lifetime cache.
//!
//! Attribute and texture data is referenced by path from the scene document,
//! often many times (several attributes usually share one buffer file). The
//! cache reads each path once; every later request returns the same shared
//! buffer.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::AssetError;

/// Path-keyed cache of immutable file contents
#[derive(Default)]
pub struct FileCache {
    entries: HashMap<PathBuf, Rc<[u8]>>,
}

impl FileCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a file, returning the cached buffer if the path was read before
    pub fn read(&mut self, path: &Path) -> Result<Rc<[u8]>, AssetError> {
        if let Some(bytes) = self.entries.get(path) {
            return Ok(Rc::clone(bytes));
        }

        let bytes = fs::read(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let bytes: Rc<[u8]> = bytes.into();
        self.entries.insert(path.to_path_buf(), Rc::clone(&bytes));
        log::debug!("cached {} ({} bytes)", path.display(), bytes.len());
        Ok(bytes)
    }

    /// Insert a buffer for a path without touching the filesystem.
    ///
    /// Lets callers (and tests) satisfy document references from memory.
    pub fn preload(&mut self, path: impl Into<PathBuf>, bytes: Vec<u8>) {
        self.entries.insert(path.into(), bytes.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preloaded_buffer_is_shared() {
        let mut cache = FileCache::new();
        cache.preload("mesh.bin", vec![1, 2, 3, 4]);

        let a = cache.read(Path::new("mesh.bin")).unwrap();
        let b = cache.read(Path::new("mesh.bin")).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(&a[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut cache = FileCache::new();
        assert!(cache.read(Path::new("no/such/file.bin")).is_err());
    }
}
