//! # labrec — periodic multi-sensor acquisition and recording engine
//!
//! Drives a heterogeneous set of sensors (numerical channels and image
//! streams) at individually controlled cadences, buffers measurements through
//! per-sensor queues, writes them durably to per-sensor files and exposes a
//! live data feed consumed by viewers. Programmed temporal patterns (ramps,
//! staircases, teeth) drive a settable quantity on an external actuator.
//!
//! ## Architecture
//! - **Reader/Writer pair per recording:** one thread reads the sensor on a
//!   checkpoint timer, one thread drains the save queue to the sink.
//! - **Record hub:** composition root; fans out threads, brokers property
//!   commands from the CLI, gates the live graph, joins everything on stop.
//! - **Control:** non-blocking ramp executor with range clamping, read-back
//!   verification and composable programs (plain cycles, stairs, teeth).
//! - **Oscilloscope window:** fixed-width wrapping view that keeps trailing
//!   data visible until the cursor passes over it.
//!
//! ## Concurrency
//! - Crossbeam channels back the save/plot queues (non-blocking drains).
//! - `stop` and `graph` are condvar-backed latches shared across all threads.
//! - Properties (`dt`, `active`, `saving`) are atomics re-read at every tick.

pub mod cli;
pub mod control;
pub mod plot;
pub mod queue;
pub mod record;
pub mod sensors;
pub mod timing;
pub mod utils;
pub mod view;
