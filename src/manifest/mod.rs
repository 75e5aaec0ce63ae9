//! Directory manifests
//!
//! A manifest is the record of one directory's classified, signed
//! children: per-entry metadata plus a content digest, with counts of
//! everything the traversal excluded. Manifests are immutable once
//! serialized; a stale one is replaced whole, never patched.

pub mod codec;
pub mod store;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What kind of filesystem object an entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// One child of a fingerprinted directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Base name of the child, without any kind marker. The serialized
    /// form appends `/` for directories and `@` for symlinks.
    pub name: String,
    pub kind: EntryKind,
    /// Modification time in whole epoch seconds.
    pub mod_time: i64,
    /// Byte length as reported by the filesystem.
    pub size: u64,
    /// Platform file identity; 0 when unavailable.
    pub inode: u64,
    /// Lowercase hex SHA-256 of the content. `None` is the "no digest"
    /// sentinel for directories, symlinks, and skipped files.
    pub digest: Option<String>,
}

/// Totals observed while listing one directory.
///
/// `total_entries` counts every child the listing produced (excluding
/// `.`/`..`), so it is always at least the sum of the skip buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    pub total_entries: u64,
    pub hidden_skipped: u64,
    pub backup_skipped: u64,
    pub symlinks_skipped: u64,
    pub subdir_count: u64,
}

/// The root record for one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryManifest {
    /// Absolute, normalized path of the directory.
    pub path: PathBuf,
    /// Build time in whole epoch seconds.
    pub generated_at: i64,
    /// Best-effort volume identity; an opaque placeholder when the
    /// platform cannot provide one.
    pub volume_id: String,
    /// Inode of the directory itself.
    pub inode: u64,
    pub counts: SkipCounts,
    /// Children in underlying directory-listing order (never sorted).
    pub entries: Vec<ManifestEntry>,
}

impl DirectoryManifest {
    /// Entry lookup by bare name (no kind marker).
    pub fn entry(&self, name: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}
