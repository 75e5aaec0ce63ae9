//! Per-entry eligibility rules for directory traversal.
//!
//! Rules are applied in a fixed order and the first match wins, so a
//! hidden backup file is reported as hidden-skipped, never
//! backup-skipped. `.` and `..` never reach the classifier; the
//! directory listing excludes them before counting.

use serde::{Deserialize, Serialize};

/// Outcome of classifying one directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Include,
    SkipHidden,
    SkipBackup,
    SkipSymlink,
    SkipMountPoint,
}

/// Facts about an entry the classifier needs beyond its name.
///
/// Collected by the builder from `symlink_metadata` so the classifier
/// itself stays free of filesystem access and fully unit-testable.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryFacts {
    /// The entry is a symbolic link (not followed when detected).
    pub is_symlink: bool,
    /// The entry sits on a different filesystem than its parent.
    pub is_mount_point: bool,
}

/// Classifier configuration, mirroring the builder's include flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Classifier {
    /// Include dotfiles instead of skipping them.
    pub include_hidden: bool,
    /// Include backup-looking files instead of skipping them.
    pub include_backups: bool,
    /// Follow symbolic links instead of skipping them.
    pub follow_symlinks: bool,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            include_hidden: false,
            include_backups: false,
            follow_symlinks: false,
        }
    }
}

impl Classifier {
    /// Apply the exclusion rules in order: hidden, mount point, symlink,
    /// backup. Mount points are always skipped regardless of flags so a
    /// traversal never crosses a volume boundary.
    pub fn classify(&self, name: &str, facts: EntryFacts) -> Decision {
        if !self.include_hidden && name.starts_with('.') {
            return Decision::SkipHidden;
        }
        if facts.is_mount_point {
            return Decision::SkipMountPoint;
        }
        if facts.is_symlink && !self.follow_symlinks {
            return Decision::SkipSymlink;
        }
        if !self.include_backups && is_backup_name(name) {
            return Decision::SkipBackup;
        }
        Decision::Include
    }
}

/// Backup-file heuristic: `foo~`, `#foo#`, `foo.bak`, `foo.tmp`,
/// "Copy 2 of foo", "foo backup 3", and the like.
///
/// Matches only English keywords and only `backup`/`copy` casing with an
/// optional leading capital. Localized backup conventions are a known
/// limitation.
pub fn is_backup_name(name: &str) -> bool {
    if name.starts_with(['~', '#']) || name.ends_with(['~', '#']) {
        return true;
    }
    let (stem, ext) = split_extension(name);
    if matches!(ext, Some("bak") | Some("bkup") | Some("tmp")) {
        return true;
    }
    has_backup_keyword(stem)
}

/// Split `name` into (stem, extension) at the last dot. A leading dot
/// alone does not make an extension.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(0) | None => (name, None),
        Some(idx) => (&name[..idx], Some(&name[idx + 1..])),
    }
}

/// True if `s` contains `backup`/`copy` (optionally capitalized) at a
/// word boundary, e.g. "Copy 2 of foo" or "report backup 3".
fn has_backup_keyword(s: &str) -> bool {
    const KEYWORDS: [&str; 4] = ["backup", "copy", "Backup", "Copy"];
    let bytes = s.as_bytes();
    for kw in KEYWORDS {
        let mut from = 0;
        while let Some(pos) = s[from..].find(kw) {
            let start = from + pos;
            let end = start + kw.len();
            let before_ok = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
            let after_ok = end == s.len() || !bytes[end].is_ascii_alphanumeric();
            if before_ok && after_ok {
                return true;
            }
            from = start + 1;
        }
    }
    false
}
