//! File and delivery naming for finished segments.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const FILE_STAMP: &str = "%Y%m%d_%H%M%S";
const LABEL_STAMP: &str = "%Y-%m-%d %H:%M:%S";

/// `{label}_{YYYYMMDD_HHMMSS}.wav`, local wall-clock time.
///
/// `label` must already be a safe path component (no separators).
pub fn segment_file_name(label: &str, at: SystemTime) -> String {
    let local: DateTime<Local> = at.into();
    format!("{label}_{}.wav", local.format(FILE_STAMP))
}

/// `{label} {YYYY-MM-DD HH:MM:SS}`, handed to the sink with the file path.
pub fn delivery_label(label: &str, at: SystemTime) -> String {
    let local: DateTime<Local> = at.into();
    format!("{label} {}", local.format(LABEL_STAMP))
}

/// First path under `dir` for `file_name` that does not exist yet, adding
/// `_1`, `_2`, ... before the extension on collisions.
pub fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (file_name, String::new()),
    };
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{stem}_{n}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
