//! Subdirectory digest strategies.
//!
//! How a subdirectory contributes a signature to its parent's entry
//! list. Finding directories that are "essentially the same" elsewhere
//! in a tree needs some signal between full deep recursion (expensive)
//! and bare names (blind to content drift); the strategy picks the
//! cost/precision tradeoff explicitly.

use crate::classify::{Classifier, EntryFacts};
use crate::error::SigError;
use crate::fsmeta;
use crate::manifest::store::ManifestStore;
use crate::signer::{ContentSigner, Sha256Signer};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Closed set of subdirectory digest modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum DirDigestStrategy {
    /// Subdirectory entries carry the "no digest" sentinel.
    #[default]
    None,
    /// Digest the subdirectory's persisted manifest file. Requires the
    /// builder to have recursed (and persisted) first.
    #[serde(rename = "SELF")]
    #[value(name = "self")]
    SelfManifest,
    /// Digest the sorted, newline-joined names of the eligible
    /// children. Detects renames, additions, and removals only.
    Names,
    /// Digest the sorted child names paired with mtime and size. A
    /// cheap approximation of content awareness; not tamper-proof.
    Approx,
}

impl DirDigestStrategy {
    /// Compute the digest a subdirectory entry should carry under this
    /// strategy, or `None` for [`DirDigestStrategy::None`].
    ///
    /// Per-entry failures (an unreadable child, a missing manifest under
    /// `SelfManifest`) surface as errors; the builder downgrades them to
    /// diagnostics rather than aborting the traversal.
    pub fn digest_subdir(
        &self,
        subdir: &Path,
        classifier: &Classifier,
        signer: &dyn ContentSigner,
        store: &dyn ManifestStore,
    ) -> Result<Option<String>, SigError> {
        match self {
            DirDigestStrategy::None => Ok(None),
            DirDigestStrategy::SelfManifest => {
                let manifest_path = store.manifest_path(subdir);
                signer.sign(&manifest_path).map(Some)
            }
            DirDigestStrategy::Names => {
                let names = eligible_child_names(subdir, classifier)?;
                let joined = names
                    .iter()
                    .map(|(name, _)| name.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(Some(Sha256Signer::sign_bytes(joined.as_bytes())))
            }
            DirDigestStrategy::Approx => {
                let names = eligible_child_names(subdir, classifier)?;
                let lines: Vec<String> = names
                    .iter()
                    .map(|(name, meta)| {
                        format!("{}\t{}\t{}", name, fsmeta::mtime_secs(meta), meta.len())
                    })
                    .collect();
                Ok(Some(Sha256Signer::sign_bytes(lines.join("\n").as_bytes())))
            }
        }
    }
}

/// Immediate eligible children of `dir`, lexicographically sorted by
/// name. Sorting affects only digest input, never emitted entry order.
fn eligible_child_names(
    dir: &Path,
    classifier: &Classifier,
) -> Result<Vec<(String, std::fs::Metadata)>, SigError> {
    let dir_meta = std::fs::metadata(dir).map_err(|e| SigError::unreadable(dir, e))?;
    let dir_dev = fsmeta::device(&dir_meta);

    let mut children = Vec::new();
    let read = std::fs::read_dir(dir).map_err(|e| SigError::unreadable(dir, e))?;
    for entry in read {
        let entry = entry.map_err(|e| SigError::unreadable(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let meta = match entry.path().symlink_metadata() {
            Ok(m) => m,
            // A child that vanished mid-listing is simply not eligible.
            Err(_) => continue,
        };
        let facts = EntryFacts {
            is_symlink: meta.is_symlink(),
            is_mount_point: dir_dev.is_some() && fsmeta::device(&meta) != dir_dev,
        };
        if classifier.classify(&name, facts) == crate::classify::Decision::Include {
            children.push((name, meta));
        }
    }
    children.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::store::FsStore;
    use std::fs;
    use tempfile::TempDir;

    fn digest(
        strategy: DirDigestStrategy,
        dir: &Path,
    ) -> Result<Option<String>, SigError> {
        strategy.digest_subdir(dir, &Classifier::default(), &Sha256Signer::new(), &FsStore::default())
    }

    #[test]
    fn test_none_yields_sentinel() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(digest(DirDigestStrategy::None, temp_dir.path()).unwrap(), None);
    }

    #[test]
    fn test_names_digest_matches_sorted_join() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("z.txt"), "1").unwrap();
        fs::write(temp_dir.path().join("a.txt"), "2").unwrap();

        let got = digest(DirDigestStrategy::Names, temp_dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(got, Sha256Signer::sign_bytes(b"a.txt\nz.txt"));
    }

    #[test]
    fn test_names_digest_skips_ineligible_children() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), "2").unwrap();
        fs::write(temp_dir.path().join(".hidden"), "h").unwrap();
        fs::write(temp_dir.path().join("junk.bak"), "b").unwrap();

        let got = digest(DirDigestStrategy::Names, temp_dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(got, Sha256Signer::sign_bytes(b"a.txt"));
    }

    #[test]
    fn test_names_digest_stable_across_runs() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("m.txt"), "m").unwrap();
        fs::write(temp_dir.path().join("n.txt"), "n").unwrap();

        let d1 = digest(DirDigestStrategy::Names, temp_dir.path()).unwrap();
        let d2 = digest(DirDigestStrategy::Names, temp_dir.path()).unwrap();
        assert_eq!(d1, d2);
    }

    #[test]
    fn test_approx_digest_changes_with_size() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("f.txt");
        fs::write(&file, "short").unwrap();
        let d1 = digest(DirDigestStrategy::Approx, temp_dir.path()).unwrap();

        fs::write(&file, "a much longer content").unwrap();
        let d2 = digest(DirDigestStrategy::Approx, temp_dir.path()).unwrap();
        assert_ne!(d1, d2);
    }

    #[test]
    fn test_self_without_manifest_is_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        match digest(DirDigestStrategy::SelfManifest, temp_dir.path()) {
            Err(SigError::Unreadable { .. }) => {}
            other => panic!("expected Unreadable, got {:?}", other),
        }
    }

    #[test]
    fn test_self_digests_manifest_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::default();
        store.save(temp_dir.path(), "manifest-bytes").unwrap();

        let got = digest(DirDigestStrategy::SelfManifest, temp_dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(got, Sha256Signer::sign_bytes(b"manifest-bytes"));
    }
}
