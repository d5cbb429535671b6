//! Sensor capability: named sources producing numeric channels or frames.
//!
//! The engine never inspects payloads; the recording's formatter interprets
//! them. A failed `read()` is an expected, recoverable condition handled by
//! the reader loop; everything downstream of a successful read is treated as
//! a programmer error.

pub mod simulated;

pub use simulated::{FlakySensor, SimulatedCamera, SimulatedSensor};

use thiserror::Error;

/// Recoverable sensor read failure. Readers log the failed/resumed
/// transitions and keep trying on the next tick.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor reading failed: {0}")]
    ReadFailed(String),
    #[error("sensor unavailable: {0}")]
    Unavailable(String),
}

/// Pre-encoded image frame. Codecs live in the sensor drivers; the engine
/// only moves and stores the bytes.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Raw payload handed to the recording's formatter.
#[derive(Debug, Clone)]
pub enum Payload {
    Values(Vec<f64>),
    Frame(ImageFrame),
    /// Successful read with nothing to record; the formatter turns this into
    /// the do-not-persist sentinel.
    Empty,
}

/// An opaque source with a stable name, scoped open/close and a fallible
/// read. Implementations are owned by their reader thread.
pub trait Sensor: Send {
    fn name(&self) -> &str;

    fn open(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn close(&mut self) {}

    fn read(&mut self) -> Result<Payload, SensorError>;
}
