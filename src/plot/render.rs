//! Bundled oscilloscope frame renderer.
//!
//! Draws each frame snapshot into an SVG file (one chart row per trace, a
//! traveling grey bar, point markers per channel) that any watcher can
//! display. Rendering failures are logged, never fatal to the viewer loop.

use std::path::PathBuf;

use log::error;
use plotters::coord::Shift;
use plotters::prelude::*;

use super::oscillo::{FrameSnapshot, TraceSnapshot};

pub struct SvgScopeRenderer {
    path: PathBuf,
    size: (u32, u32),
}

impl SvgScopeRenderer {
    pub fn new(path: impl Into<PathBuf>, size: (u32, u32)) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Renders one frame; `overlays` go into the top chart caption.
    pub fn render(&self, frame: &FrameSnapshot, overlays: &[String]) {
        let mut svg = String::new();
        if let Err(e) = self.draw(&mut svg, frame, overlays) {
            error!("oscilloscope render failed: {e}");
            return;
        }
        if let Err(e) = std::fs::write(&self.path, svg) {
            error!("could not write {}: {e}", self.path.display());
        }
    }

    fn draw(
        &self,
        svg: &mut String,
        frame: &FrameSnapshot,
        overlays: &[String],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let root = SVGBackend::with_string(svg, self.size).into_drawing_area();
        root.fill(&WHITE)?;

        let rows = frame.traces.len().max(1);
        let areas = root.split_evenly((rows, 1));

        for (i, trace) in frame.traces.iter().enumerate() {
            let caption = if i == 0 && !overlays.is_empty() {
                format!("{} [{}]", trace.name, overlays.join("  "))
            } else {
                trace.name.clone()
            };
            plot_trace(&areas[i], &caption, trace, frame)?;
        }
        root.present()?;
        Ok(())
    }
}

fn plot_trace(
    area: &DrawingArea<SVGBackend, Shift>,
    caption: &str,
    trace: &TraceSnapshot,
    frame: &FrameSnapshot,
) -> Result<(), Box<dyn std::error::Error>> {
    let width = frame.window_width;

    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for line in &trace.lines {
        for &y in &line.ys {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }
    if !min_y.is_finite() {
        min_y = 0.0;
        max_y = 1.0;
    }
    let max_y = max_y.max(min_y + 1e-6);

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 16))
        .margin(8)
        .x_label_area_size(20)
        .y_label_area_size(45)
        .build_cartesian_2d(-0.05 * width..1.05 * width, min_y..max_y)?;
    chart.configure_mesh().disable_mesh().draw()?;

    for (c, line) in trace.lines.iter().enumerate() {
        let color = Palette99::pick(c);
        chart.draw_series(
            line.xs
                .iter()
                .zip(&line.ys)
                .map(|(&x, &y)| Circle::new((x, y), 2, color.filled())),
        )?;
    }

    // Traveling cursor.
    let bar = RGBColor(128, 128, 128);
    chart.draw_series(std::iter::once(PathElement::new(
        vec![(frame.bar_x, min_y), (frame.bar_x, max_y)],
        bar.stroke_width(3),
    )))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::oscillo::OscilloWindow;

    #[test]
    fn renders_frame_to_svg_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scope.svg");
        let renderer = SvgScopeRenderer::new(&path, (640, 480));

        let mut window = OscilloWindow::new(10.0);
        window.add_trace("P", 1);
        for t in 0..5 {
            window.push_point("P", t as f64, &[t as f64]);
        }
        let frame = window.frame(5.0);
        renderer.render(&frame, &["12.0 fps".to_string()]);

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("12.0 fps"));
    }

    #[test]
    fn empty_frame_renders_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.svg");
        let renderer = SvgScopeRenderer::new(&path, (320, 240));
        let mut window = OscilloWindow::new(10.0);
        window.add_trace("P", 1);
        let frame = window.frame(0.0);
        renderer.render(&frame, &[]);
        assert!(path.exists());
    }
}
