//! Live plotting: the wrapping oscilloscope window model and the bundled
//! plotters-based frame renderer.

pub mod oscillo;
pub mod render;

pub use oscillo::{FrameSnapshot, LineData, OscilloWindow, TraceSnapshot};
pub use render::SvgScopeRenderer;
