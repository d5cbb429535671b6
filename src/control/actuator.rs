//! Actuator seam of the control engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("actuator error: {0}")]
    Device(String),
    #[error("actuator read-back unavailable: {0}")]
    ReadBack(String),
}

/// A device with a settable quantity and a read-back channel used to verify
/// that the applied value took effect.
pub trait Actuator: Send {
    fn apply(&mut self, value: f64) -> Result<(), ControlError>;
    fn read(&mut self) -> Result<f64, ControlError>;
}

/// In-memory actuator for the demo bench and tests: applies instantly, reads
/// back what was applied, and remembers every applied value.
pub struct SoftActuator {
    value: f64,
    pub applied: Vec<f64>,
}

impl SoftActuator {
    pub fn new(initial: f64) -> Self {
        Self {
            value: initial,
            applied: Vec::new(),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl Actuator for SoftActuator {
    fn apply(&mut self, value: f64) -> Result<(), ControlError> {
        self.value = value;
        self.applied.push(value);
        Ok(())
    }

    fn read(&mut self) -> Result<f64, ControlError> {
        Ok(self.value)
    }
}
