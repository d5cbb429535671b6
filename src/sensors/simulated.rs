//! Simulated sensors for the demo bench and the test suite.
//!
//! Numeric sources produce a base value plus uniform noise per channel;
//! the flaky wrapper injects deterministic failure windows; the camera
//! produces small synthetic frames.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{ImageFrame, Payload, Sensor, SensorError};

/// Multi-channel numeric source: `base ± noise` per channel.
pub struct SimulatedSensor {
    name: String,
    bases: Vec<f64>,
    noise: f64,
    rng: StdRng,
}

impl SimulatedSensor {
    pub fn new(name: &str, bases: Vec<f64>, noise: f64) -> Self {
        Self {
            name: name.to_string(),
            bases,
            noise,
            rng: StdRng::seed_from_u64(0xACD5),
        }
    }

    /// Deterministic noise stream for reproducible tests.
    pub fn seeded(name: &str, bases: Vec<f64>, noise: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new(name, bases, noise)
        }
    }
}

impl Sensor for SimulatedSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self) -> Result<Payload, SensorError> {
        let values = self
            .bases
            .iter()
            .map(|base| {
                if self.noise > 0.0 {
                    base + self.rng.random_range(-self.noise..self.noise)
                } else {
                    *base
                }
            })
            .collect();
        Ok(Payload::Values(values))
    }
}

/// Wraps a sensor and fails reads whose index falls inside one of the
/// configured windows. Read indices start at 0.
pub struct FlakySensor<S> {
    inner: S,
    fail_windows: Vec<(u64, u64)>,
    reads: u64,
}

impl<S: Sensor> FlakySensor<S> {
    /// `fail_windows`: inclusive `(from, to)` read-index ranges that fail.
    pub fn new(inner: S, fail_windows: Vec<(u64, u64)>) -> Self {
        Self {
            inner,
            fail_windows,
            reads: 0,
        }
    }
}

impl<S: Sensor> Sensor for FlakySensor<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn open(&mut self) -> Result<(), SensorError> {
        self.inner.open()
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn read(&mut self) -> Result<Payload, SensorError> {
        let n = self.reads;
        self.reads += 1;
        if self.fail_windows.iter().any(|&(a, b)| n >= a && n <= b) {
            return Err(SensorError::ReadFailed(format!(
                "{}: no response (simulated)",
                self.inner.name()
            )));
        }
        self.inner.read()
    }
}

/// Synthetic camera: grayscale gradient frames with a moving offset so
/// successive images differ.
pub struct SimulatedCamera {
    name: String,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl SimulatedCamera {
    pub fn new(name: &str, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            frame_count: 0,
        }
    }
}

impl Sensor for SimulatedCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self) -> Result<Payload, SensorError> {
        let offset = (self.frame_count % 256) as u8;
        self.frame_count += 1;
        let mut bytes = Vec::with_capacity((self.width * self.height) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                bytes.push(((x + y) as u8).wrapping_add(offset));
            }
        }
        Ok(Payload::Frame(ImageFrame {
            width: self.width,
            height: self.height,
            bytes,
        }))
    }
}
