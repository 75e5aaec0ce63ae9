//! Canonical textual encoding of manifests.
//!
//! The persisted form is deterministic JSON. The first element of the
//! `entries` array is a label row naming the fields of the rows that
//! follow; JSON has no comments, and labeling every row would bloat the
//! file, so one label row keeps the output self-describing.
//!
//! Entry names carry a kind marker: directories get a trailing `/`,
//! symlinks a trailing `@` (ls -F style). Decoding strips the marker to
//! recover the kind.

use crate::error::SigError;
use crate::manifest::{DirectoryManifest, EntryKind, ManifestEntry, SkipCounts};
use chrono::{NaiveDateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};
use std::path::PathBuf;

/// Name written to the `generator` field of every manifest.
pub const GENERATOR: &str = "dirsig";

/// Timestamp rendering. A presentation choice, not a semantic one:
/// both forms decode to the same epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFormat {
    /// Numeric Unix epoch seconds.
    Epoch,
    /// Human-readable UTC, ctime style (`Sat May  9 19:43:47 2020`).
    #[default]
    Readable,
}

/// ctime-style rendering, in UTC so encode/decode round-trips exactly.
const READABLE_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

const LABELS: [&str; 5] = ["modTime", "size", "inode", "name", "digest"];

/// Encode a manifest as its canonical JSON text.
pub fn encode(manifest: &DirectoryManifest, time_format: TimeFormat) -> String {
    let mut rows: Vec<Value> = Vec::with_capacity(manifest.entries.len() + 1);
    rows.push(json!(LABELS));
    for entry in &manifest.entries {
        rows.push(json!([
            render_time_value(entry.mod_time, time_format),
            entry.size,
            entry.inode,
            marked_name(entry),
            entry.digest.clone().unwrap_or_default(),
        ]));
    }

    let doc = json!({
        "generator": GENERATOR,
        "time": render_time_string(manifest.generated_at, time_format),
        "volumeId": manifest.volume_id,
        "inode": manifest.inode.to_string(),
        "path": manifest.path.to_string_lossy(),
        "totalEntries": manifest.counts.total_entries,
        "hiddenSkipped": manifest.counts.hidden_skipped,
        "backupSkipped": manifest.counts.backup_skipped,
        "symlinksSkipped": manifest.counts.symlinks_skipped,
        "subdirCount": manifest.counts.subdir_count,
        "entries": rows,
    });

    // preserve_order keeps the field order of the literal above.
    serde_json::to_string_pretty(&doc).expect("manifest serialization cannot fail")
}

/// Decode manifest text. Rejects malformed input outright; never
/// returns a partially populated manifest.
pub fn decode(text: &str) -> Result<DirectoryManifest, SigError> {
    let doc: Value = serde_json::from_str(text)
        .map_err(|e| SigError::MalformedManifest(format!("not valid JSON: {e}")))?;
    let obj = doc
        .as_object()
        .ok_or_else(|| malformed("top level is not an object"))?;

    require_str(obj, "generator")?;
    let generated_at = parse_time_string(require_str(obj, "time")?)?;
    let volume_id = require_str(obj, "volumeId")?.to_string();
    let inode = require_str(obj, "inode")?
        .parse::<u64>()
        .map_err(|_| malformed("inode is not a non-negative integer"))?;
    let path = PathBuf::from(require_str(obj, "path")?);

    let counts = SkipCounts {
        total_entries: require_u64(obj, "totalEntries")?,
        hidden_skipped: require_u64(obj, "hiddenSkipped")?,
        backup_skipped: require_u64(obj, "backupSkipped")?,
        symlinks_skipped: require_u64(obj, "symlinksSkipped")?,
        subdir_count: require_u64(obj, "subdirCount")?,
    };
    let skip_sum = counts
        .hidden_skipped
        .checked_add(counts.backup_skipped)
        .and_then(|s| s.checked_add(counts.symlinks_skipped))
        .ok_or_else(|| malformed("skip counts overflow"))?;
    if counts.total_entries < skip_sum {
        return Err(malformed("totalEntries less than sum of skip counts"));
    }

    let rows = obj
        .get("entries")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing entries array"))?;
    let (label_row, entry_rows) = rows
        .split_first()
        .ok_or_else(|| malformed("entries array is empty; label row required"))?;
    check_label_row(label_row)?;

    let mut entries = Vec::with_capacity(entry_rows.len());
    for row in entry_rows {
        entries.push(decode_row(row)?);
    }

    Ok(DirectoryManifest {
        path,
        generated_at,
        volume_id,
        inode,
        counts,
        entries,
    })
}

fn marked_name(entry: &ManifestEntry) -> String {
    match entry.kind {
        EntryKind::File => entry.name.clone(),
        EntryKind::Directory => format!("{}/", entry.name),
        EntryKind::Symlink => format!("{}@", entry.name),
    }
}

fn render_time_value(secs: i64, fmt: TimeFormat) -> Value {
    match fmt {
        TimeFormat::Epoch => json!(secs),
        TimeFormat::Readable => json!(readable(secs)),
    }
}

fn render_time_string(secs: i64, fmt: TimeFormat) -> String {
    match fmt {
        TimeFormat::Epoch => secs.to_string(),
        TimeFormat::Readable => readable(secs),
    }
}

fn readable(secs: i64) -> String {
    match Utc.timestamp_opt(secs, 0).single() {
        Some(ts) => ts.format(READABLE_FORMAT).to_string(),
        None => secs.to_string(),
    }
}

fn parse_time_string(s: &str) -> Result<i64, SigError> {
    if let Ok(secs) = s.parse::<i64>() {
        return Ok(secs);
    }
    // Older manifests carried fractional epoch seconds; take the whole
    // part. Anything but digits.digits (e.g. "inf", "1e9") falls through.
    if let Some((whole, frac)) = s.split_once('.') {
        if !whole.is_empty()
            && !frac.is_empty()
            && whole.bytes().all(|b| b.is_ascii_digit())
            && frac.bytes().all(|b| b.is_ascii_digit())
        {
            if let Ok(secs) = whole.parse::<i64>() {
                return Ok(secs);
            }
        }
    }
    NaiveDateTime::parse_from_str(s, READABLE_FORMAT)
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|_| malformed(&format!("unrecognized timestamp: {s:?}")))
}

fn decode_row(row: &Value) -> Result<ManifestEntry, SigError> {
    let cells = row
        .as_array()
        .filter(|c| c.len() == 5)
        .ok_or_else(|| malformed("entry row is not a 5-element array"))?;

    let mod_time = match &cells[0] {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| malformed("modTime out of range"))?,
        Value::String(s) => parse_time_string(s)?,
        _ => return Err(malformed("modTime is neither number nor string")),
    };
    let size = cells[1]
        .as_u64()
        .ok_or_else(|| malformed("size is not a non-negative integer"))?;
    let inode = cells[2]
        .as_u64()
        .ok_or_else(|| malformed("inode is not a non-negative integer"))?;
    let marked = cells[3]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed("name is missing or empty"))?;
    let digest_field = cells[4]
        .as_str()
        .ok_or_else(|| malformed("digest is not a string"))?;

    let (name, kind) = if let Some(stripped) = marked.strip_suffix('/') {
        (stripped.to_string(), EntryKind::Directory)
    } else if let Some(stripped) = marked.strip_suffix('@') {
        (stripped.to_string(), EntryKind::Symlink)
    } else {
        (marked.to_string(), EntryKind::File)
    };
    if name.is_empty() {
        return Err(malformed("entry name is only a kind marker"));
    }

    let digest = if digest_field.is_empty() {
        None
    } else if is_hex_digest(digest_field) {
        Some(digest_field.to_string())
    } else {
        return Err(malformed(&format!("digest is not 64 hex chars: {digest_field:?}")));
    };
    if kind == EntryKind::File && digest.is_none() {
        return Err(malformed(&format!("file entry {name:?} has no digest")));
    }

    Ok(ManifestEntry {
        name,
        kind,
        mod_time,
        size,
        inode,
        digest,
    })
}

fn check_label_row(row: &Value) -> Result<(), SigError> {
    let labels: Vec<&str> = row
        .as_array()
        .map(|cells| cells.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if labels != LABELS {
        return Err(malformed("first entries element is not the label row"));
    }
    Ok(())
}

fn is_hex_digest(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn require_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a str, SigError> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(&format!("missing or non-string field {key:?}")))
}

fn require_u64(obj: &Map<String, Value>, key: &str) -> Result<u64, SigError> {
    obj.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| malformed(&format!("missing or invalid count field {key:?}")))
}

fn malformed(msg: &str) -> SigError {
    SigError::MalformedManifest(msg.to_string())
}
