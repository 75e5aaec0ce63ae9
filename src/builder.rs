//! Manifest builder: traversal, classification, signing, recursion.
//!
//! The builder drives everything: it lists a directory, consults the
//! classifier per entry, signs included files, folds subdirectories in
//! through the active digest strategy, and assembles the counts. With
//! recursion enabled it processes subdirectories bottom-up, gated by
//! the staleness oracle, so a `SELF` strategy can reference an
//! already-fresh child manifest.

use crate::classify::{Classifier, Decision, EntryFacts};
use crate::error::SigError;
use crate::fsmeta;
use crate::manifest::codec::{self, TimeFormat};
use crate::manifest::store::ManifestStore;
use crate::manifest::{DirectoryManifest, EntryKind, ManifestEntry, SkipCounts};
use crate::pathnorm;
use crate::signer::ContentSigner;
use crate::staleness::StalenessOracle;
use crate::strategy::DirDigestStrategy;
use crate::volume::VolumeIdentifier;
use chrono::Utc;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Enumerated build configuration.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Descend into subdirectories (bottom-up).
    pub recurse: bool,
    /// Include symlinks as entries instead of skipping them. Symlinked
    /// directories are never recursed into.
    pub follow_symlinks: bool,
    /// Include dotfiles.
    pub include_hidden: bool,
    /// Include backup-looking files.
    pub include_backups: bool,
    /// How subdirectories contribute digests to their parent.
    pub strategy: DirDigestStrategy,
    /// Bypass the staleness check and recompute everything.
    pub force_rebuild: bool,
    /// How many levels down the `SELF` strategy applies before
    /// degrading to `NONE`. 1 means immediate children only.
    pub self_depth: usize,
    /// Write each directory's manifest into the directory as it is
    /// built. Required for `SELF` digests to resolve.
    pub persist: bool,
    /// Timestamp rendering used when persisting.
    pub time_format: TimeFormat,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            recurse: false,
            follow_symlinks: false,
            include_hidden: false,
            include_backups: false,
            strategy: DirDigestStrategy::None,
            force_rebuild: false,
            self_depth: 1,
            persist: false,
            time_format: TimeFormat::default(),
        }
    }
}

impl BuildOptions {
    fn classifier(&self) -> Classifier {
        Classifier {
            include_hidden: self.include_hidden,
            include_backups: self.include_backups,
            follow_symlinks: self.follow_symlinks,
        }
    }

    /// Strategy in effect at `depth`. Only `SELF` degrades with depth;
    /// the other strategies apply at every level.
    fn strategy_at(&self, depth: usize) -> DirDigestStrategy {
        match self.strategy {
            DirDigestStrategy::SelfManifest if depth >= self.self_depth => {
                DirDigestStrategy::None
            }
            s => s,
        }
    }
}

/// A per-entry problem the traversal recovered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub message: String,
}

/// Result of one `build` call: the manifest plus everything the
/// traversal had to skip or work around.
#[derive(Debug)]
pub struct BuildOutcome {
    pub manifest: DirectoryManifest,
    /// Per-entry problems, aggregated across the whole recursion.
    pub diagnostics: Vec<Diagnostic>,
    /// The root manifest was fresh on disk and reused verbatim, with
    /// no classification or signing performed.
    pub reused: bool,
}

/// One raw directory listing row, in listing order.
struct RawEntry {
    name: String,
    path: PathBuf,
    meta: std::fs::Metadata,
    facts: EntryFacts,
}

pub struct ManifestBuilder<'a> {
    options: BuildOptions,
    signer: &'a dyn ContentSigner,
    store: &'a dyn ManifestStore,
    volume: &'a dyn VolumeIdentifier,
    oracle: StalenessOracle,
}

impl<'a> ManifestBuilder<'a> {
    pub fn new(
        options: BuildOptions,
        signer: &'a dyn ContentSigner,
        store: &'a dyn ManifestStore,
        volume: &'a dyn VolumeIdentifier,
    ) -> Self {
        if options.strategy == DirDigestStrategy::SelfManifest && !options.persist {
            warn!("SELF digest strategy without persistence; subdirectory manifests may be missing");
        }
        Self {
            options,
            signer,
            store,
            volume,
            oracle: StalenessOracle,
        }
    }

    /// Build the manifest for `root`.
    ///
    /// The root must exist and be a directory; anything else is fatal.
    /// Per-entry failures below the root are recorded as diagnostics
    /// and never abort the traversal.
    #[instrument(skip(self), fields(root = %root.display()))]
    pub fn build(&self, root: &Path) -> Result<BuildOutcome, SigError> {
        let start = Instant::now();
        let root = pathnorm::normalize(root)?;
        let meta = std::fs::metadata(&root).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SigError::NotFound(root.clone()),
            _ => SigError::unreadable(&root, e),
        })?;
        if !meta.is_dir() {
            return Err(SigError::NotADirectory(root));
        }

        let mut diagnostics = Vec::new();
        let (manifest, reused) = self.build_dir(&root, 0, &mut diagnostics)?;

        info!(
            root = %manifest.path.display(),
            entries = manifest.counts.total_entries,
            subdirs = manifest.counts.subdir_count,
            diagnostics = diagnostics.len(),
            reused,
            duration_ms = start.elapsed().as_millis() as u64,
            "Manifest build completed"
        );
        Ok(BuildOutcome {
            manifest,
            diagnostics,
            reused,
        })
    }

    fn build_dir(
        &self,
        dir: &Path,
        depth: usize,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<(DirectoryManifest, bool), SigError> {
        // Reuse a fresh persisted manifest unchanged. A malformed one
        // is rebuilt rather than trusted.
        if !self.options.force_rebuild && self.oracle.is_fresh(dir, self.store)? {
            if let Some(text) = self.store.load(dir)? {
                match codec::decode(&text) {
                    Ok(manifest) => {
                        debug!(dir = %dir.display(), "Manifest fresh; reusing");
                        return Ok((manifest, true));
                    }
                    Err(e) => {
                        warn!(dir = %dir.display(), error = %e, "Stored manifest malformed; rebuilding");
                    }
                }
            }
        }

        let raw = self.list_dir(dir, diags)?;
        let classifier = self.options.classifier();

        // Bottom-up: recurse into included subdirectories before the
        // current level's entries are finalized.
        if self.options.recurse {
            for entry in &raw {
                if !entry.meta.is_dir() || entry.facts.is_symlink {
                    continue;
                }
                if classifier.classify(&entry.name, entry.facts) != Decision::Include {
                    continue;
                }
                if let Err(e) = self.build_dir(&entry.path, depth + 1, diags) {
                    warn!(dir = %entry.path.display(), error = %e, "Subdirectory build failed");
                    diags.push(Diagnostic {
                        path: entry.path.clone(),
                        message: format!("subdirectory skipped: {e}"),
                    });
                }
            }
        }

        let (counts, entries) = self.process_level(depth, &raw, &classifier, diags)?;

        let dir_meta = std::fs::metadata(dir).map_err(|e| SigError::unreadable(dir, e))?;
        let manifest = DirectoryManifest {
            path: dir.to_path_buf(),
            generated_at: Utc::now().timestamp(),
            volume_id: self.volume.volume_id(dir),
            inode: fsmeta::inode(&dir_meta),
            counts,
            entries,
        };

        if self.options.persist {
            let text = codec::encode(&manifest, self.options.time_format);
            self.store.save(dir, &text)?;
        }
        Ok((manifest, false))
    }

    /// List `dir` in underlying directory order. A listing failure
    /// propagates as an error; the recursion downgrades it to a
    /// diagnostic everywhere except the root.
    fn list_dir(
        &self,
        dir: &Path,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<Vec<RawEntry>, SigError> {
        let dir_meta = std::fs::metadata(dir).map_err(|e| SigError::unreadable(dir, e))?;
        let dir_dev = fsmeta::device(&dir_meta);

        let mut raw = Vec::new();
        let read = std::fs::read_dir(dir).map_err(|e| SigError::unreadable(dir, e))?;
        for entry in read {
            let entry = entry.map_err(|e| SigError::unreadable(dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            let meta = match path.symlink_metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Entry unreadable; skipped");
                    diags.push(Diagnostic {
                        path: path.clone(),
                        message: format!("unreadable: {e}"),
                    });
                    continue;
                }
            };
            let facts = EntryFacts {
                is_symlink: meta.is_symlink(),
                is_mount_point: dir_dev.is_some() && fsmeta::device(&meta) != dir_dev,
            };
            raw.push(RawEntry {
                name,
                path,
                meta,
                facts,
            });
        }
        Ok(raw)
    }

    /// Classify one level's raw entries, sign its files, and fold in
    /// subdirectory digests. Entry order equals listing order; file
    /// hashing runs on the rayon pool and results are slotted back by
    /// index so hashing completion order cannot leak into the output.
    fn process_level(
        &self,
        depth: usize,
        raw: &[RawEntry],
        classifier: &Classifier,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<(SkipCounts, Vec<ManifestEntry>), SigError> {
        let strategy = self.options.strategy_at(depth);
        let mut counts = SkipCounts::default();
        let mut slots: Vec<Option<ManifestEntry>> = Vec::with_capacity(raw.len());
        let mut sign_jobs: Vec<(usize, &Path)> = Vec::new();

        for entry in raw {
            counts.total_entries += 1;
            let slot = slots.len();
            slots.push(None);

            match classifier.classify(&entry.name, entry.facts) {
                Decision::SkipHidden => counts.hidden_skipped += 1,
                Decision::SkipBackup => counts.backup_skipped += 1,
                Decision::SkipSymlink => counts.symlinks_skipped += 1,
                Decision::SkipMountPoint => {
                    warn!(path = %entry.path.display(), "Mount point encountered; skipped");
                    diags.push(Diagnostic {
                        path: entry.path.clone(),
                        message: "mount point; not crossed".to_string(),
                    });
                }
                Decision::Include => {
                    if entry.facts.is_symlink {
                        slots[slot] = Some(self.symlink_entry(entry));
                    } else if entry.meta.is_dir() {
                        counts.subdir_count += 1;
                        let digest = match strategy.digest_subdir(
                            &entry.path,
                            classifier,
                            self.signer,
                            self.store,
                        ) {
                            Ok(d) => d,
                            Err(e) => {
                                warn!(path = %entry.path.display(), error = %e, "Subdirectory digest failed");
                                diags.push(Diagnostic {
                                    path: entry.path.clone(),
                                    message: format!("directory digest unavailable: {e}"),
                                });
                                None
                            }
                        };
                        slots[slot] = Some(ManifestEntry {
                            name: entry.name.clone(),
                            kind: EntryKind::Directory,
                            mod_time: fsmeta::mtime_secs(&entry.meta),
                            size: entry.meta.len(),
                            inode: fsmeta::inode(&entry.meta),
                            digest,
                        });
                    } else if entry.meta.is_file() {
                        sign_jobs.push((slot, &entry.path));
                    } else {
                        // Sockets, fifos, devices: not content-addressable,
                        // and a file row must carry a digest. Counted but
                        // dropped, like unreadable files.
                        debug!(path = %entry.path.display(), "Special file; skipped");
                        diags.push(Diagnostic {
                            path: entry.path.clone(),
                            message: "special file; not signed".to_string(),
                        });
                    }
                }
            }
        }

        // Sign files in parallel; slot indices restore listing order.
        let signed: Vec<(usize, Result<String, SigError>)> = sign_jobs
            .par_iter()
            .map(|(slot, path)| (*slot, self.signer.sign(path)))
            .collect();
        for (slot, result) in signed {
            let entry = &raw[slot];
            match result {
                Ok(digest) => {
                    slots[slot] = Some(ManifestEntry {
                        name: entry.name.clone(),
                        kind: EntryKind::File,
                        mod_time: fsmeta::mtime_secs(&entry.meta),
                        size: entry.meta.len(),
                        inode: fsmeta::inode(&entry.meta),
                        digest: Some(digest),
                    });
                }
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "File unreadable; skipped");
                    diags.push(Diagnostic {
                        path: entry.path.clone(),
                        message: format!("unreadable: {e}"),
                    });
                }
            }
        }

        Ok((counts, slots.into_iter().flatten().collect()))
    }

    /// Entry for an included symlink: recorded with the link's own
    /// stat, never followed into, never digested.
    fn symlink_entry(&self, entry: &RawEntry) -> ManifestEntry {
        ManifestEntry {
            name: entry.name.clone(),
            kind: EntryKind::Symlink,
            mod_time: fsmeta::mtime_secs(&entry.meta),
            size: entry.meta.len(),
            inode: fsmeta::inode(&entry.meta),
            digest: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::store::FsStore;
    use crate::signer::Sha256Signer;
    use crate::volume::FixedVolumeId;
    use std::fs;
    use tempfile::TempDir;

    fn build(root: &Path, options: BuildOptions) -> Result<BuildOutcome, SigError> {
        let signer = Sha256Signer::new();
        let store = FsStore::default();
        let volume = FixedVolumeId::disabled();
        ManifestBuilder::new(options, &signer, &store, &volume).build(root)
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        match build(&missing, BuildOptions::default()) {
            Err(SigError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_file_root_is_not_a_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("plain");
        fs::write(&file, "x").unwrap();
        match build(&file, BuildOptions::default()) {
            Err(SigError::NotADirectory(_)) => {}
            other => panic!("expected NotADirectory, got {:?}", other),
        }
    }

    #[test]
    fn test_basic_counts_and_digest() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), "x").unwrap();
        fs::write(temp_dir.path().join(".hidden"), "h").unwrap();
        fs::write(temp_dir.path().join("b.bak"), "b").unwrap();

        let outcome = build(temp_dir.path(), BuildOptions::default()).unwrap();
        let m = &outcome.manifest;
        assert_eq!(m.counts.total_entries, 3);
        assert_eq!(m.counts.hidden_skipped, 1);
        assert_eq!(m.counts.backup_skipped, 1);
        assert_eq!(m.counts.symlinks_skipped, 0);
        assert_eq!(m.counts.subdir_count, 0);
        assert_eq!(m.entries.len(), 1);

        let entry = m.entry("a.txt").unwrap();
        assert_eq!(entry.kind, EntryKind::File);
        // sha256("x")
        assert_eq!(
            entry.digest.as_deref(),
            Some("2d711642b726b04401627ca9fbac32f5c8530fb1903cc4db02258717921a4881")
        );
        assert!(!outcome.reused);
    }

    #[test]
    fn test_entries_keep_listing_order() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["zz.txt", "aa.txt", "mm.txt"] {
            fs::write(temp_dir.path().join(name), name).unwrap();
        }

        let listing: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();

        let outcome = build(temp_dir.path(), BuildOptions::default()).unwrap();
        let built: Vec<String> = outcome
            .manifest
            .entries
            .iter()
            .map(|e| e.name.clone())
            .collect();
        assert_eq!(built, listing);
    }

    #[test]
    fn test_subdir_digest_none_by_default() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();

        let outcome = build(temp_dir.path(), BuildOptions::default()).unwrap();
        let entry = outcome.manifest.entry("sub").unwrap();
        assert_eq!(entry.kind, EntryKind::Directory);
        assert_eq!(entry.digest, None);
        assert_eq!(outcome.manifest.counts.subdir_count, 1);
    }

    #[test]
    fn test_names_strategy_stable_across_runs() {
        let temp_dir = TempDir::new().unwrap();
        let sub = temp_dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("inner.txt"), "content").unwrap();

        let options = BuildOptions {
            recurse: true,
            strategy: DirDigestStrategy::Names,
            ..BuildOptions::default()
        };
        let d1 = build(temp_dir.path(), options)
            .unwrap()
            .manifest
            .entry("sub")
            .unwrap()
            .digest
            .clone();
        let d2 = build(temp_dir.path(), options)
            .unwrap()
            .manifest
            .entry("sub")
            .unwrap()
            .digest
            .clone();
        assert!(d1.is_some());
        assert_eq!(d1, d2);
    }

    #[test]
    fn test_symlink_skipped_and_counted() {
        #[cfg(unix)]
        {
            let temp_dir = TempDir::new().unwrap();
            fs::write(temp_dir.path().join("target.txt"), "t").unwrap();
            std::os::unix::fs::symlink(
                temp_dir.path().join("target.txt"),
                temp_dir.path().join("link"),
            )
            .unwrap();

            let outcome = build(temp_dir.path(), BuildOptions::default()).unwrap();
            assert_eq!(outcome.manifest.counts.symlinks_skipped, 1);
            assert!(outcome.manifest.entry("link").is_none());
        }
    }

    #[test]
    fn test_followed_symlink_has_no_digest() {
        #[cfg(unix)]
        {
            let temp_dir = TempDir::new().unwrap();
            fs::write(temp_dir.path().join("target.txt"), "t").unwrap();
            std::os::unix::fs::symlink(
                temp_dir.path().join("target.txt"),
                temp_dir.path().join("link"),
            )
            .unwrap();

            let options = BuildOptions {
                follow_symlinks: true,
                ..BuildOptions::default()
            };
            let outcome = build(temp_dir.path(), options).unwrap();
            let entry = outcome.manifest.entry("link").unwrap();
            assert_eq!(entry.kind, EntryKind::Symlink);
            assert_eq!(entry.digest, None);
        }
    }

    #[test]
    fn test_recurse_persists_child_manifests() {
        let temp_dir = TempDir::new().unwrap();
        let sub = temp_dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("inner.txt"), "content").unwrap();

        let options = BuildOptions {
            recurse: true,
            persist: true,
            ..BuildOptions::default()
        };
        build(temp_dir.path(), options).unwrap();
        assert!(sub.join(".dirsig").exists());
        assert!(temp_dir.path().join(".dirsig").exists());
    }

    #[test]
    fn test_self_strategy_digests_child_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let sub = temp_dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("inner.txt"), "content").unwrap();

        let options = BuildOptions {
            recurse: true,
            persist: true,
            strategy: DirDigestStrategy::SelfManifest,
            force_rebuild: true,
            ..BuildOptions::default()
        };
        let outcome = build(temp_dir.path(), options).unwrap();
        let digest = outcome.manifest.entry("sub").unwrap().digest.clone().unwrap();

        let child_text = fs::read_to_string(sub.join(".dirsig")).unwrap();
        assert_eq!(digest, Sha256Signer::sign_bytes(child_text.as_bytes()));
    }

    #[test]
    fn test_fifo_skipped_and_manifest_round_trips() {
        #[cfg(unix)]
        {
            let temp_dir = TempDir::new().unwrap();
            fs::write(temp_dir.path().join("a.txt"), "x").unwrap();
            let fifo = temp_dir.path().join("pipe");
            let made = std::process::Command::new("mkfifo")
                .arg(&fifo)
                .status()
                .map(|s| s.success())
                .unwrap_or(false);
            if !made {
                // No mkfifo on this system; nothing to test.
                return;
            }

            let options = BuildOptions {
                persist: true,
                ..BuildOptions::default()
            };
            let outcome = build(temp_dir.path(), options).unwrap();
            let m = &outcome.manifest;
            assert_eq!(m.counts.total_entries, 2);
            assert!(m.entry("a.txt").is_some());
            assert!(m.entry("pipe").is_none());
            assert!(outcome.diagnostics.iter().any(|d| d.path.ends_with("pipe")));

            // The persisted text decodes back to the same manifest, so
            // the next run reuses it instead of rebuilding.
            let text = codec::encode(m, TimeFormat::Epoch);
            assert_eq!(&codec::decode(&text).unwrap(), m);

            let second = build(temp_dir.path(), options).unwrap();
            assert!(second.reused);
        }
    }

    #[test]
    fn test_unreadable_file_skipped_not_fatal() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let temp_dir = TempDir::new().unwrap();
            fs::write(temp_dir.path().join("ok.txt"), "fine").unwrap();
            let locked = temp_dir.path().join("locked.txt");
            fs::write(&locked, "secret").unwrap();
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
            if fs::read(&locked).is_ok() {
                // Mode bits don't bind (running as root); nothing to test.
                return;
            }

            let outcome = build(temp_dir.path(), BuildOptions::default()).unwrap();
            assert_eq!(outcome.manifest.counts.total_entries, 2);
            assert!(outcome.manifest.entry("ok.txt").is_some());
            assert!(outcome.manifest.entry("locked.txt").is_none());
            assert!(outcome
                .diagnostics
                .iter()
                .any(|d| d.path.ends_with("locked.txt")));

            fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        }
    }
}
