//! Non-blocking ramp executor with range clamping and read-back
//! verification.
//!
//! A `ramp` spawns a worker that interpolates the setpoint every timer tick;
//! equal endpoints turn the leg into a dwell, held for the leg duration and
//! verified against the device read-back. `stop()` cancels any leg within
//! one tick. The optional `convert_input` hook maps a user-facing quantity
//! (e.g. %RH) onto the device-facing one (e.g. bath temperature) before
//! clamping and applying.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::timing::CheckptTimer;
use crate::utils::Latch;

use super::actuator::Actuator;
use super::duration::{parse_hms, DurationParseError};

type ConvertInput = Box<dyn Fn(f64) -> f64 + Send + Sync>;

pub struct Control<A: Actuator> {
    quantity: String,
    range: (Option<f64>, Option<f64>),
    round_digits: i32,
    convert_input: Option<ConvertInput>,
    actuator: Mutex<A>,
    timer: CheckptTimer,
    stop: Latch,
}

impl<A: Actuator + 'static> Control<A> {
    pub fn new(quantity: &str, actuator: A) -> Self {
        Self {
            quantity: quantity.to_string(),
            range: (None, None),
            round_digits: 2,
            convert_input: None,
            actuator: Mutex::new(actuator),
            timer: CheckptTimer::with_options(Duration::from_secs(1), quantity, false, false),
            stop: Latch::new(),
        }
    }

    /// Allowed device-facing range; `None` on either side means unbounded.
    pub fn with_range(mut self, vmin: Option<f64>, vmax: Option<f64>) -> Self {
        self.range = (vmin, vmax);
        self
    }

    /// Decimal digits used when rounding applied values and read-backs.
    pub fn with_round_digits(mut self, digits: i32) -> Self {
        self.round_digits = digits;
        self
    }

    /// Transform from the user-facing quantity to the device-facing one,
    /// applied before clamping.
    pub fn with_convert_input(mut self, f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        self.convert_input = Some(Box::new(f));
        self
    }

    /// Interval between setpoint updates during a ramp (default 1 s).
    pub fn with_tick(self, tick: Duration) -> Self {
        self.timer.set_interval(tick);
        self
    }

    pub fn quantity(&self) -> &str {
        &self.quantity
    }

    pub fn actuator(&self) -> &Mutex<A> {
        &self.actuator
    }

    /// Cancels the running leg within one tick.
    pub fn stop(&self) {
        self.stop.set();
        self.timer.stop();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.is_set()
    }

    /// Clamps a device-facing value into the allowed range, logging every
    /// substitution. Idempotent.
    pub fn clamp(&self, value: f64) -> f64 {
        let vmin = self.range.0.unwrap_or(f64::NEG_INFINITY);
        let vmax = self.range.1.unwrap_or(f64::INFINITY);
        if value < vmin {
            warn!(
                "{}: value {value} outside of allowed range [{vmin}, {vmax}], applying {vmin}",
                self.quantity
            );
            vmin
        } else if value > vmax {
            warn!(
                "{}: value {value} outside of allowed range [{vmin}, {vmax}], applying {vmax}",
                self.quantity
            );
            vmax
        } else {
            value
        }
    }

    pub fn round_value(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.round_digits);
        (value * factor).round() / factor
    }

    /// Non-blocking ramp of the user-facing quantity from `v1` to `v2` over
    /// `duration`. Equal endpoints dwell instead. Returns the worker handle.
    pub fn ramp(self: &Arc<Self>, duration: Duration, quantity: (f64, f64)) -> JoinHandle<()> {
        self.stop.clear();
        let control = self.clone();
        std::thread::spawn(move || {
            control.timer.reset();
            let (v1, v2) = quantity;
            if v1 == v2 {
                control.dwell(v1, duration);
            } else {
                control.run_ramp(v1, v2, duration);
            }
        })
    }

    /// `ramp` with an `"H:M:S"` duration string.
    pub fn ramp_hms(
        self: &Arc<Self>,
        duration: &str,
        quantity: (f64, f64),
    ) -> Result<JoinHandle<()>, DurationParseError> {
        Ok(self.ramp(parse_hms(duration)?, quantity))
    }

    /// Constant leg: apply once, verify by read-back until it matches, hold
    /// for the leg duration.
    fn dwell(&self, value: f64, duration: Duration) {
        info!("{}: dwelling started at {value}", self.quantity);
        let target = self.apply_value(value);
        let mut verified = false;

        loop {
            if self.stop.is_set() {
                info!("{}: dwelling manually stopped", self.quantity);
                return;
            }
            if !verified {
                let read_back = self.actuator.lock().read();
                match read_back {
                    Ok(rb) if self.round_value(rb) == target => {
                        debug!("{}: read-back confirmed {target}", self.quantity);
                        verified = true;
                    }
                    Ok(rb) => debug!(
                        "{}: read-back {rb} does not match {target} yet",
                        self.quantity
                    ),
                    Err(e) => warn!("{}: read-back failed: {e}", self.quantity),
                }
            }
            if self.timer.elapsed() > duration {
                break;
            }
            self.timer.checkpt();
        }
        info!("{}: dwelling finished at {value}", self.quantity);
    }

    /// Linear interpolation leg, final value applied exactly.
    fn run_ramp(&self, v1: f64, v2: f64, duration: Duration) {
        info!(
            "{}: ramp {v1} -> {v2} over {:.1} s",
            self.quantity,
            duration.as_secs_f64()
        );
        let total = duration.as_secs_f64();
        if total > 0.0 {
            loop {
                if self.stop.is_set() {
                    info!("{}: ramp manually stopped", self.quantity);
                    return;
                }
                let t = self.timer.elapsed().as_secs_f64();
                if t > total {
                    break;
                }
                let v = v1 + (t / total) * (v2 - v1);
                self.apply_value(v);
                self.timer.checkpt();
            }
        }
        if self.stop.is_set() {
            info!("{}: ramp manually stopped", self.quantity);
            return;
        }
        self.apply_value(v2);
        info!("{}: ramp finished at {v2}", self.quantity);
    }

    /// Convert → clamp → round → apply → verify. Returns the rounded target
    /// actually requested from the device.
    fn apply_value(&self, user_value: f64) -> f64 {
        let device_value = match &self.convert_input {
            Some(convert) => convert(user_value),
            None => user_value,
        };
        let target = self.round_value(self.clamp(device_value));

        let mut actuator = self.actuator.lock();
        if let Err(e) = actuator.apply(target) {
            warn!("{}: apply failed: {e}", self.quantity);
            return target;
        }
        match actuator.read() {
            Ok(rb) if self.round_value(rb) != target => warn!(
                "{}: read-back {rb} differs from target {target}, retrying next tick",
                self.quantity
            ),
            Err(e) => warn!("{}: read-back failed: {e}", self.quantity),
            _ => {}
        }
        target
    }
}
