//! Manifest freshness heuristic.
//!
//! A manifest is considered fresh when its mtime is at least the
//! directory's own mtime. This is a heuristic, not a guarantee: clock
//! skew, mtime-preserving copies, coarse filesystem timestamp
//! resolution, or a write landing in the same mtime tick as the
//! manifest write can all fool it. `force_rebuild` exists to override
//! it when that matters.

use crate::error::SigError;
use crate::manifest::store::ManifestStore;
use std::path::Path;
use tracing::debug;

/// Decides whether a persisted manifest still reflects its directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct StalenessOracle;

impl StalenessOracle {
    /// True iff the store holds a manifest for `dir` whose mtime is
    /// newer than or equal to the directory's mtime. Equal timestamps
    /// count as fresh. The manifest mtime comes from the store, so a
    /// substituted store answers for its own manifests.
    pub fn is_fresh(&self, dir: &Path, store: &dyn ManifestStore) -> Result<bool, SigError> {
        let manifest_mtime = match store.mtime(dir)? {
            Some(mtime) => mtime,
            None => {
                debug!(dir = %dir.display(), "No persisted manifest; stale");
                return Ok(false);
            }
        };
        let dir_meta =
            std::fs::metadata(dir).map_err(|e| SigError::unreadable(dir, e))?;

        let fresh = manifest_mtime >= dir_meta.modified()?;
        debug!(dir = %dir.display(), fresh, "Staleness check");
        Ok(fresh)
    }
}
