//! Per-sensor recording: binds a sensor to its formatter, sink, queues and
//! controlled properties.
//!
//! Properties (`dt`, `active`, `saving`) are mutated by the CLI thread and
//! re-read by the reader/writer threads at every tick, so they live in
//! atomics or behind the shared timer state. The image counter `num` is
//! strictly monotonic within a session and resumes from the timestamp sink
//! when a recording is restarted over existing files.

use std::fs::File;
use std::io::BufWriter;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;

use crate::queue::DataQueue;
use crate::sensors::Payload;
use crate::timing::CheckptTimer;

use super::measurement::Measurement;
use super::sink::{CsvSink, ImageStore};

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("recording '{recording}': payload does not match the {expected} formatter")]
    PayloadMismatch {
        recording: String,
        expected: &'static str,
    },
    #[error("invalid value '{value}' for property '{property}': {reason}")]
    InvalidProperty {
        property: String,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Formatter and sink wiring of a recording.
pub enum RecordingKind {
    Numeric {
        sink: CsvSink,
    },
    Image {
        /// Timestamp sink; the frames themselves go to `store`.
        sink: CsvSink,
        store: ImageStore,
        num: AtomicU64,
    },
}

pub struct Recording {
    name: String,
    timer: CheckptTimer,
    active: AtomicBool,
    saving: AtomicBool,
    continuous: bool,
    save_queue: DataQueue<Measurement>,
    plot_queue: DataQueue<Measurement>,
    kind: RecordingKind,
}

/// Controlled properties every recording exposes to the CLI broker.
pub const CONTROLLED_PROPERTIES: [&str; 3] = ["dt", "active", "saving"];

impl Recording {
    /// Names of the properties the CLI can mutate on this recording.
    pub fn property_names(&self) -> &'static [&'static str] {
        &CONTROLLED_PROPERTIES
    }
}

impl Recording {
    pub fn numeric(name: &str, dt: Duration, sink: CsvSink) -> Self {
        Self {
            name: name.to_string(),
            timer: CheckptTimer::with_options(dt, name, false, false),
            active: AtomicBool::new(true),
            saving: AtomicBool::new(true),
            continuous: false,
            save_queue: DataQueue::new(),
            plot_queue: DataQueue::new(),
            kind: RecordingKind::Numeric { sink },
        }
    }

    /// Image recording over an existing or fresh timestamp sink. The image
    /// counter resumes from the sink line count so numbering continues
    /// monotonically across restarts: `lines − 1` when data lines exist
    /// (the header does not count), `0` otherwise.
    pub fn image(
        name: &str,
        dt: Duration,
        sink: CsvSink,
        store: ImageStore,
    ) -> Result<Self, RecordingError> {
        sink.init()?;
        store.init()?;
        let lines = sink.line_count()?;
        let num = if lines > 1 { (lines - 1) as u64 } else { 0 };
        Ok(Self {
            name: name.to_string(),
            timer: CheckptTimer::with_options(dt, name, false, false),
            active: AtomicBool::new(true),
            saving: AtomicBool::new(true),
            continuous: false,
            save_queue: DataQueue::new(),
            plot_queue: DataQueue::new(),
            kind: RecordingKind::Image {
                sink,
                store,
                num: AtomicU64::new(num),
            },
        })
    }

    /// Disables inter-read sleep; the reader loops as fast as the sensor
    /// allows.
    pub fn with_continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    pub fn with_active(self, active: bool) -> Self {
        self.active.store(active, Ordering::Relaxed);
        self
    }

    pub fn with_saving(self, saving: bool) -> Self {
        self.saving.store(saving, Ordering::Relaxed);
        self
    }

    /// Replaces the default timer, e.g. for precise anchoring or warnings.
    pub fn with_timer(mut self, timer: CheckptTimer) -> Self {
        self.timer = timer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timer(&self) -> &CheckptTimer {
        &self.timer
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Relaxed)
    }

    pub fn set_saving(&self, saving: bool) {
        self.saving.store(saving, Ordering::Relaxed);
    }

    pub fn continuous(&self) -> bool {
        self.continuous
    }

    pub fn save_queue(&self) -> &DataQueue<Measurement> {
        &self.save_queue
    }

    pub fn plot_queue(&self) -> &DataQueue<Measurement> {
        &self.plot_queue
    }

    pub fn sink(&self) -> &CsvSink {
        match &self.kind {
            RecordingKind::Numeric { sink } => sink,
            RecordingKind::Image { sink, .. } => sink,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            RecordingKind::Numeric { .. } => "numeric",
            RecordingKind::Image { .. } => "image",
        }
    }

    /// `(extension, ndigits, next num)` for image recordings.
    pub fn image_info(&self) -> Option<(String, usize, u64)> {
        match &self.kind {
            RecordingKind::Image { store, num, .. } => Some((
                store.extension().to_string(),
                store.ndigits(),
                num.load(Ordering::Relaxed),
            )),
            RecordingKind::Numeric { .. } => None,
        }
    }

    /// Creates the sink files (and image directory) if they do not exist.
    pub fn init_file(&self) -> Result<(), RecordingError> {
        match &self.kind {
            RecordingKind::Numeric { sink } => sink.init()?,
            RecordingKind::Image { sink, store, .. } => {
                sink.init()?;
                store.init()?;
            }
        }
        Ok(())
    }

    /// Turns a raw payload into a measurement. `Ok(None)` is the
    /// do-not-persist sentinel. A payload that does not match the formatter
    /// is a programmer error and terminates the reader.
    pub fn format_measurement(
        &self,
        payload: Payload,
        time: f64,
        dt: f64,
    ) -> Result<Option<Measurement>, RecordingError> {
        match (&self.kind, payload) {
            (_, Payload::Empty) => Ok(None),
            (RecordingKind::Numeric { .. }, Payload::Values(values)) => {
                Ok(Some(Measurement::Numeric {
                    name: self.name.clone(),
                    time,
                    dt,
                    values,
                }))
            }
            (RecordingKind::Image { num, .. }, Payload::Frame(frame)) => {
                let num = num.fetch_add(1, Ordering::Relaxed);
                Ok(Some(Measurement::Image {
                    name: self.name.clone(),
                    time,
                    dt,
                    num,
                    frame,
                }))
            }
            (RecordingKind::Numeric { .. }, Payload::Frame(_)) => {
                Err(RecordingError::PayloadMismatch {
                    recording: self.name.clone(),
                    expected: "numeric",
                })
            }
            (RecordingKind::Image { .. }, Payload::Values(_)) => {
                Err(RecordingError::PayloadMismatch {
                    recording: self.name.clone(),
                    expected: "image",
                })
            }
        }
    }

    /// Persists one measurement through an open sink writer. Image
    /// measurements write the frame file first, then the timestamp line, so
    /// both share the same derived filename.
    pub fn save(
        &self,
        measurement: &Measurement,
        writer: &mut csv::Writer<BufWriter<File>>,
    ) -> Result<(), RecordingError> {
        match (&self.kind, measurement) {
            (RecordingKind::Numeric { sink }, Measurement::Numeric { time, dt, values, .. }) => {
                let mut row = Vec::with_capacity(2 + values.len());
                row.push(sink.format_value(0, *time));
                row.push(sink.format_value(1, *dt));
                for (i, value) in values.iter().enumerate() {
                    row.push(sink.format_value(2 + i, *value));
                }
                writer.write_record(&row)?;
            }
            (
                RecordingKind::Image { sink, store, .. },
                Measurement::Image { time, dt, num, frame, .. },
            ) => {
                let filename = store.write_frame(&self.name, *num, frame)?;
                let row = [
                    filename,
                    sink.format_value(1, *time),
                    sink.format_value(2, *dt),
                ];
                writer.write_record(&row)?;
            }
            _ => {
                return Err(RecordingError::PayloadMismatch {
                    recording: self.name.clone(),
                    expected: self.kind_name(),
                })
            }
        }
        Ok(())
    }

    /// Applies a property command. `Ok(false)` means the property is not one
    /// this recording exposes (the broker ignores it silently); a parse
    /// failure is reported to the caller.
    pub fn set_property(&self, property: &str, value: &str) -> Result<bool, RecordingError> {
        match property {
            "dt" => {
                let secs: f64 = value.parse().map_err(|_| RecordingError::InvalidProperty {
                    property: property.to_string(),
                    value: value.to_string(),
                    reason: "expected seconds as a number".to_string(),
                })?;
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(RecordingError::InvalidProperty {
                        property: property.to_string(),
                        value: value.to_string(),
                        reason: "interval must be positive".to_string(),
                    });
                }
                self.timer.set_interval(Duration::from_secs_f64(secs));
                Ok(true)
            }
            "active" => {
                self.set_active(parse_bool(property, value)?);
                Ok(true)
            }
            "saving" => {
                self.set_saving(parse_bool(property, value)?);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Current value of a controlled property, for logs and metadata.
    pub fn property_value(&self, property: &str) -> Option<String> {
        match property {
            "dt" => Some(format!("{}", self.timer.interval().as_secs_f64())),
            "active" => Some(self.is_active().to_string()),
            "saving" => Some(self.is_saving().to_string()),
            _ => None,
        }
    }
}

fn parse_bool(property: &str, value: &str) -> Result<bool, RecordingError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(RecordingError::InvalidProperty {
            property: property.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
