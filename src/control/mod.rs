//! Setpoint control engine: non-blocking ramps with bounded-limit
//! enforcement and read-back verification, composed into repeatable
//! programs (plain cycles, staircases, teeth).

pub mod actuator;
pub mod control;
pub mod duration;
pub mod program;

pub use actuator::{Actuator, ControlError, SoftActuator};
pub use control::Control;
pub use duration::parse_hms;
pub use program::{Leg, Program, SlopeUnit, Stairs, Teeth, TeethStart};
