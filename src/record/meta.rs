//! Metadata artifact written next to the sinks at hub start.
//!
//! One JSON file per session; a pre-existing file with the same base name is
//! never overwritten, the name gets a `-N` suffix instead. Written once,
//! before any writer opens its sink.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::utils::increment_filename;

use super::recording::Recording;

#[derive(Debug, Serialize)]
pub struct ImageMeta {
    pub extension: String,
    pub ndigits: usize,
    pub initial_num: u64,
}

#[derive(Debug, Serialize)]
pub struct RecordingMeta {
    pub name: String,
    pub kind: &'static str,
    pub dt_s: f64,
    pub active: bool,
    pub saving: bool,
    pub continuous: bool,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageMeta>,
}

#[derive(Debug, Serialize)]
pub struct SessionMeta {
    pub program: &'static str,
    pub version: &'static str,
    #[serde(rename = "time (unix)")]
    pub time_unix: f64,
    pub path: String,
    pub dt_save_s: f64,
    pub dt_request_s: f64,
    pub recordings: Vec<RecordingMeta>,
}

impl RecordingMeta {
    pub fn from_recording(recording: &Recording) -> Self {
        let image = recording
            .image_info()
            .map(|(extension, ndigits, initial_num)| ImageMeta {
                extension,
                ndigits,
                initial_num,
            });
        Self {
            name: recording.name().to_string(),
            kind: recording.kind_name(),
            dt_s: recording.timer().interval().as_secs_f64(),
            active: recording.is_active(),
            saving: recording.is_saving(),
            continuous: recording.continuous(),
            file: recording.sink().path().display().to_string(),
            image,
        }
    }
}

/// Serializes the session metadata, avoiding filename collisions with prior
/// sessions. Returns the path actually written.
pub fn write_session_meta(
    dir: &Path,
    filename: &str,
    meta: &SessionMeta,
) -> Result<PathBuf, std::io::Error> {
    let path = increment_filename(&dir.join(filename));
    let file = std::fs::File::create(&path)?;
    serde_json::to_writer_pretty(file, meta)?;
    Ok(path)
}
