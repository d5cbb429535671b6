//! Recording pipeline: measurements, sinks, per-sensor recordings, the
//! reader/writer thread pair and the record hub composition root.

pub mod hub;
pub mod measurement;
pub mod meta;
pub mod reader;
pub mod recording;
pub mod sink;
pub mod writer;

pub use hub::{HubError, RecordHub};
pub use measurement::Measurement;
pub use recording::{Recording, RecordingError};
pub use sink::{ColumnFormat, CsvSink, ImageStore};
