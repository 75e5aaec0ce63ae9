//! Best-effort volume identification.
//!
//! Platform-specific and deliberately narrow: the core only needs an
//! opaque string it can stamp into a manifest, and tests need to inject
//! a fixed value instead of depending on host disk enumeration.

use std::path::Path;
use tracing::debug;

/// Placeholder used when no volume identity can be determined.
pub const UNKNOWN_VOLUME: &str = "unknown";

/// Supplies an opaque volume identity for a path. Never fatal; on
/// failure an implementation returns a placeholder.
pub trait VolumeIdentifier: Sync {
    fn volume_id(&self, path: &Path) -> String;
}

/// Platform identifier: the device id of the filesystem holding `path`
/// on unix, [`UNKNOWN_VOLUME`] elsewhere or on stat failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformVolumeId;

impl VolumeIdentifier for PlatformVolumeId {
    #[cfg(unix)]
    fn volume_id(&self, path: &Path) -> String {
        use std::os::unix::fs::MetadataExt;
        match std::fs::metadata(path) {
            Ok(meta) => meta.dev().to_string(),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Volume id unavailable");
                UNKNOWN_VOLUME.to_string()
            }
        }
    }

    #[cfg(not(unix))]
    fn volume_id(&self, path: &Path) -> String {
        debug!(path = %path.display(), "Volume id not supported on this platform");
        UNKNOWN_VOLUME.to_string()
    }
}

/// Fixed identifier: the `--no-volume-id` placeholder and the test
/// injection point.
#[derive(Debug, Clone)]
pub struct FixedVolumeId(pub String);

impl FixedVolumeId {
    /// The conventional disabled value.
    pub fn disabled() -> Self {
        FixedVolumeId("0".to_string())
    }
}

impl VolumeIdentifier for FixedVolumeId {
    fn volume_id(&self, _path: &Path) -> String {
        self.0.clone()
    }
}
