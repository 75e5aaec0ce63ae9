//! Small helpers over `std::fs::Metadata` for the fields manifests
//! record: epoch mtimes, inodes, and device ids.

use std::fs::Metadata;
use std::time::{SystemTime, UNIX_EPOCH};

/// Modification time as whole epoch seconds; 0 if the platform cannot
/// report one.
pub fn mtime_secs(meta: &Metadata) -> i64 {
    meta.modified().map_or(0, systemtime_secs)
}

/// Convert a `SystemTime` to whole epoch seconds (negative before 1970).
pub fn systemtime_secs(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

/// File identity integer; 0 where the platform has no inode concept.
#[cfg(unix)]
pub fn inode(meta: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.ino()
}

#[cfg(not(unix))]
pub fn inode(_meta: &Metadata) -> u64 {
    0
}

/// Device id of the filesystem holding the object, if the platform
/// exposes one. Differing device ids between parent and child mark a
/// mount point.
#[cfg(unix)]
pub fn device(meta: &Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.dev())
}

#[cfg(not(unix))]
pub fn device(_meta: &Metadata) -> Option<u64> {
    None
}
