//! Path normalization for manifest identity.
//!
//! Manifest paths must compare equal across runs, so the root path is
//! canonicalized (symlinks, `.`, `..` resolved), Unicode-normalized to
//! NFC, and stripped of trailing separators before it is stamped into a
//! manifest.

use crate::error::SigError;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Canonicalize and normalize a directory path.
///
/// Fails with [`SigError::NotFound`] if the path does not exist.
pub fn normalize(path: &Path) -> Result<PathBuf, SigError> {
    let canonical = dunce::canonicalize(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SigError::NotFound(path.to_path_buf()),
        _ => SigError::InvalidPath(format!("{}: {}", path.display(), e)),
    })?;
    Ok(PathBuf::from(normalize_string(
        &canonical.to_string_lossy(),
    )))
}

/// Normalize an already-canonical path string: NFC plus trailing
/// separator removal (except for the root itself).
pub fn normalize_string(path: &str) -> String {
    let mut result: String = path.nfc().collect();
    while result.len() > 1 && (result.ends_with('/') || result.ends_with('\\')) {
        result.pop();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_trailing_separator_removed() {
        assert_eq!(normalize_string("/some/dir/"), "/some/dir");
        assert_eq!(normalize_string("/"), "/");
    }

    #[test]
    fn test_unicode_nfc() {
        // e + combining acute composes to é.
        assert_eq!(normalize_string("/cafe\u{0301}"), "/caf\u{e9}");
    }

    #[test]
    fn test_normalize_missing_path_is_not_found() {
        match normalize(Path::new("/no/such/dir")) {
            Err(SigError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_is_absolute() {
        let temp_dir = TempDir::new().unwrap();
        let normalized = normalize(temp_dir.path()).unwrap();
        assert!(normalized.is_absolute());
    }
}
