//! Manifest persistence.
//!
//! The core never chooses a storage location policy; it reads and
//! writes manifest text through this narrow interface. The filesystem
//! implementation uses the conventional dotfile inside each directory.

use crate::error::SigError;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Default manifest file name written inside each directory.
pub const DEFAULT_MANIFEST_NAME: &str = ".dirsig";

/// Where manifests live and how their raw text is read and written.
pub trait ManifestStore: Sync {
    /// Path the manifest for `dir` would occupy.
    fn manifest_path(&self, dir: &Path) -> PathBuf;

    /// Raw manifest text for `dir`, or `None` if none is persisted.
    fn load(&self, dir: &Path) -> Result<Option<String>, SigError>;

    /// Persist manifest text for `dir`, replacing any prior manifest.
    fn save(&self, dir: &Path, text: &str) -> Result<(), SigError>;

    /// Modification time of the persisted manifest, or `None` if none
    /// exists. Drives the staleness check.
    fn mtime(&self, dir: &Path) -> Result<Option<SystemTime>, SigError>;
}

/// Dotfile-per-directory store.
#[derive(Debug, Clone)]
pub struct FsStore {
    file_name: String,
}

impl FsStore {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

impl Default for FsStore {
    fn default() -> Self {
        Self::new(DEFAULT_MANIFEST_NAME)
    }
}

impl ManifestStore for FsStore {
    fn manifest_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.file_name)
    }

    fn load(&self, dir: &Path) -> Result<Option<String>, SigError> {
        let path = self.manifest_path(dir);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SigError::unreadable(path, e)),
        }
    }

    fn save(&self, dir: &Path, text: &str) -> Result<(), SigError> {
        let path = self.manifest_path(dir);
        std::fs::write(&path, text).map_err(|e| SigError::unreadable(path, e))
    }

    fn mtime(&self, dir: &Path) -> Result<Option<SystemTime>, SigError> {
        let path = self.manifest_path(dir);
        match std::fs::metadata(&path) {
            Ok(meta) => Ok(Some(meta.modified()?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SigError::unreadable(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::default();
        assert!(store.load(temp_dir.path()).unwrap().is_none());
        assert!(store.mtime(temp_dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::default();
        store.save(temp_dir.path(), "{}").unwrap();
        assert_eq!(store.load(temp_dir.path()).unwrap().as_deref(), Some("{}"));
        assert!(store.mtime(temp_dir.path()).unwrap().is_some());
    }

    #[test]
    fn test_manifest_path_uses_configured_name() {
        let store = FsStore::new(".checkSums");
        assert_eq!(
            store.manifest_path(Path::new("/d")),
            PathBuf::from("/d/.checkSums")
        );
    }

    #[test]
    fn test_save_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::default();
        store.save(temp_dir.path(), "first").unwrap();
        store.save(temp_dir.path(), "second").unwrap();
        assert_eq!(
            store.load(temp_dir.path()).unwrap().as_deref(),
            Some("second")
        );
    }
}
