//! Bundled headless backends.
//!
//! Both write the latest content to a file that external watchers (image
//! viewers, browsers, `watch`-style tools) can poll. GUI toolkits plug in
//! through the same `ViewerBackend` seam.

use std::path::PathBuf;

use log::{debug, error};

use crate::plot::render::SvgScopeRenderer;

use super::window::DisplayContent;
use super::ViewerBackend;

/// Renders oscilloscope frames into an SVG file.
pub struct SvgScopeBackend {
    renderer: SvgScopeRenderer,
}

impl SvgScopeBackend {
    pub fn new(path: impl Into<PathBuf>, size: (u32, u32)) -> Self {
        Self {
            renderer: SvgScopeRenderer::new(path, size),
        }
    }
}

impl ViewerBackend for SvgScopeBackend {
    fn draw(&mut self, content: &DisplayContent) {
        if let DisplayContent::Lines { frame, overlays, .. } = content {
            self.renderer.render(frame, overlays);
        }
    }
}

/// Dumps the latest image frame's bytes to a fixed file; overlay text goes
/// to the debug log (a framebuffer backend would burn it into the pixels).
pub struct RawFrameBackend {
    path: PathBuf,
}

impl RawFrameBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ViewerBackend for RawFrameBackend {
    fn draw(&mut self, content: &DisplayContent) {
        if let DisplayContent::Image {
            name,
            frame,
            overlays,
            ..
        } = content
        {
            if let Err(e) = std::fs::write(&self.path, &frame.bytes) {
                error!("[{name}] could not write live frame: {e}");
            }
            if !overlays.is_empty() {
                debug!("[{name}] {}", overlays.join("  "));
            }
        }
    }
}
