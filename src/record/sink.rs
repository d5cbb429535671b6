//! Durable file sinks: delimited text files for numeric data and image
//! timestamps, plus the numbered per-image binary store.
//!
//! A sink is configuration only; writers open and close the underlying file
//! on every flush cycle. The header is written once, when the file is first
//! created, so an interrupted recording can be restarted and appends where
//! it left off.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::sensors::ImageFrame;

/// Per-column value formatting for delimited sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFormat {
    /// Fixed number of decimals, e.g. `Fixed(3)` → `2727.250`.
    Fixed(usize),
    /// Shortest faithful float representation.
    General,
    /// Rounded integer.
    Integer,
}

impl ColumnFormat {
    pub fn format(&self, value: f64) -> String {
        match *self {
            ColumnFormat::Fixed(decimals) => format!("{value:.decimals$}"),
            ColumnFormat::General => format!("{value}"),
            ColumnFormat::Integer => format!("{}", value.round() as i64),
        }
    }
}

/// Append-mode delimited text sink with a header line and per-column
/// formats. Default separator is a tab.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
    delimiter: u8,
    column_names: Vec<String>,
    column_formats: Vec<ColumnFormat>,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>, column_names: &[&str]) -> Self {
        Self {
            path: path.into(),
            delimiter: b'\t',
            column_names: column_names.iter().map(|s| s.to_string()).collect(),
            column_formats: Vec::new(),
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// One format per value column; missing entries fall back to `General`.
    pub fn with_formats(mut self, formats: &[ColumnFormat]) -> Self {
        self.column_formats = formats.to_vec();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn format_value(&self, column: usize, value: f64) -> String {
        self.column_formats
            .get(column)
            .copied()
            .unwrap_or(ColumnFormat::General)
            .format(value)
    }

    /// Creates the file with its header line unless it already exists, so a
    /// restarted recording appends to the previous data.
    pub fn init(&self) -> Result<(), csv::Error> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(BufWriter::new(file));
        writer.write_record(&self.column_names)?;
        writer.flush()?;
        Ok(())
    }

    /// Opens the sink for appending. The caller owns the writer for the
    /// duration of one flush cycle.
    pub fn open_append(&self) -> Result<csv::Writer<BufWriter<File>>, csv::Error> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        Ok(csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_writer(BufWriter::new(file)))
    }

    /// Number of lines currently in the file (header included).
    /// A missing or empty file counts as zero.
    pub fn line_count(&self) -> std::io::Result<usize> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        Ok(BufReader::new(file).lines().count())
    }
}

/// Directory of numbered per-image files: `<name>-<num:0{ndigits}><ext>`.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    extension: String,
    ndigits: usize,
}

impl ImageStore {
    /// `continuous` recordings default to `.tif` (fast to write), others to
    /// `.png`.
    pub fn new(dir: impl Into<PathBuf>, extension: Option<&str>, continuous: bool) -> Self {
        let extension = extension
            .map(|e| e.to_string())
            .unwrap_or_else(|| if continuous { ".tif" } else { ".png" }.to_string());
        Self {
            dir: dir.into(),
            extension,
            ndigits: 5,
        }
    }

    pub fn with_ndigits(mut self, ndigits: usize) -> Self {
        self.ndigits = ndigits;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn ndigits(&self) -> usize {
        self.ndigits
    }

    pub fn init(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    pub fn image_filename(&self, name: &str, num: u64) -> String {
        format!(
            "{name}-{num:0width$}{ext}",
            width = self.ndigits,
            ext = self.extension
        )
    }

    /// Writes the encoded frame bytes, returning the filename used.
    pub fn write_frame(&self, name: &str, num: u64, frame: &ImageFrame) -> std::io::Result<String> {
        let filename = self.image_filename(name, num);
        std::fs::write(self.dir.join(&filename), &frame.bytes)?;
        Ok(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_to_string(path: &Path) -> String {
        let mut s = String::new();
        File::open(path).unwrap().read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn header_written_once_then_appends() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("P.tsv"), &["time (unix)", "dt (s)", "value"])
            .with_formats(&[ColumnFormat::Fixed(3), ColumnFormat::Fixed(3), ColumnFormat::General]);

        sink.init().unwrap();
        {
            let mut w = sink.open_append().unwrap();
            w.write_record(["1.000", "0.100", "2727.25"]).unwrap();
            w.flush().unwrap();
        }
        // Re-init must not truncate or duplicate the header.
        sink.init().unwrap();
        {
            let mut w = sink.open_append().unwrap();
            w.write_record(["2.000", "1.000", "2727.5"]).unwrap();
            w.flush().unwrap();
        }

        let content = read_to_string(sink.path());
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "time (unix)\tdt (s)\tvalue");
        assert_eq!(lines[1], "1.000\t0.100\t2727.25");
        assert_eq!(sink.line_count().unwrap(), 3);
    }

    #[test]
    fn missing_file_counts_zero_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("absent.tsv"), &["a"]);
        assert_eq!(sink.line_count().unwrap(), 0);
    }

    #[test]
    fn column_formats() {
        assert_eq!(ColumnFormat::Fixed(3).format(2727.25), "2727.250");
        assert_eq!(ColumnFormat::Integer.format(2.6), "3");
        assert_eq!(ColumnFormat::General.format(0.5), "0.5");
    }

    #[test]
    fn image_filenames_are_zero_padded() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("Cam0"), None, false);
        assert_eq!(store.image_filename("Cam0", 7), "Cam0-00007.png");

        let fast = ImageStore::new(dir.path().join("fast"), None, true).with_ndigits(3);
        assert_eq!(fast.image_filename("Cam0", 7), "Cam0-007.tif");

        let custom = ImageStore::new(dir.path().join("c"), Some(".jpg"), true);
        assert_eq!(custom.image_filename("Cam0", 0), "Cam0-00000.jpg");
    }

    #[test]
    fn write_frame_persists_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("Cam0"), None, false);
        store.init().unwrap();
        let frame = ImageFrame {
            width: 2,
            height: 2,
            bytes: vec![1, 2, 3, 4],
        };
        let filename = store.write_frame("Cam0", 3, &frame).unwrap();
        assert_eq!(filename, "Cam0-00003.png");
        assert_eq!(std::fs::read(store.dir().join(filename)).unwrap(), vec![1, 2, 3, 4]);
    }
}
