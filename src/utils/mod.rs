//! Shared helpers: event latches, filename collision handling, unix time.

pub mod latch;

pub use latch::Latch;

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as unix seconds.
#[inline]
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Returns the first free variant of `path` by appending `-1`, `-2`, …
/// before the extension.
///
/// `data/Metadata.json` → `data/Metadata-1.json` → `data/Metadata-2.json` …
/// The input path itself is returned unchanged if it does not exist.
pub fn increment_filename(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    let mut n = 1usize;
    loop {
        let name = match &ext {
            Some(ext) => format!("{}-{}.{}", stem, n, ext),
            None => format!("{}-{}", stem, n),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
