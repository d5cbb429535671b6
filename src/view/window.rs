//! Viewer windows: one per live source, each consuming a plot queue.
//!
//! Image windows keep only the latest frame per display tick (drain-last
//! skips the backlog); oscilloscope windows consume every queued measurement
//! so the lines stay continuous. Overlays carry an fps estimate, the image
//! counter and any attached info feeds.

use crate::plot::oscillo::{FrameSnapshot, OscilloWindow};
use crate::queue::DataQueue;
use crate::record::Measurement;
use crate::sensors::ImageFrame;

use super::fps::FpsCounter;
use super::info::InfoFeed;

/// What a backend is asked to draw for one tick of one window.
pub enum DisplayContent {
    Image {
        name: String,
        frame: ImageFrame,
        overlays: Vec<String>,
        /// Burn the overlays into the pixels (framebuffer-style backends)
        /// rather than laying them out beside the image.
        overlay_on_image: bool,
    },
    Lines {
        name: String,
        frame: FrameSnapshot,
        overlays: Vec<String>,
    },
}

enum WindowKind {
    Image,
    Scope(OscilloWindow),
}

pub struct Window {
    name: String,
    queue: DataQueue<Measurement>,
    kind: WindowKind,
    show_fps: bool,
    show_num: bool,
    overlay_on_image: bool,
    fps: FpsCounter,
    last_num: Option<u64>,
    info_feeds: Vec<InfoFeed>,
}

impl Window {
    /// Live image window fed by a recording's plot queue.
    pub fn image(name: &str, queue: DataQueue<Measurement>) -> Self {
        Self {
            name: name.to_string(),
            queue,
            kind: WindowKind::Image,
            show_fps: true,
            show_num: true,
            overlay_on_image: false,
            fps: FpsCounter::new(),
            last_num: None,
            info_feeds: Vec::new(),
        }
    }

    /// Oscilloscope window over numeric measurements.
    pub fn scope(name: &str, queue: DataQueue<Measurement>, window_width: f64, channels: usize) -> Self {
        let mut oscillo = OscilloWindow::new(window_width);
        oscillo.add_trace(name, channels);
        Self {
            name: name.to_string(),
            queue,
            kind: WindowKind::Scope(oscillo),
            show_fps: true,
            show_num: false,
            overlay_on_image: false,
            fps: FpsCounter::new(),
            last_num: None,
            info_feeds: Vec::new(),
        }
    }

    pub fn with_show_fps(mut self, show: bool) -> Self {
        self.show_fps = show;
        self
    }

    pub fn with_show_num(mut self, show: bool) -> Self {
        self.show_num = show;
        self
    }

    pub fn with_overlay_on_image(mut self, on_image: bool) -> Self {
        self.overlay_on_image = on_image;
        self
    }

    pub fn attach_info_feed(&mut self, feed: InfoFeed) {
        self.info_feeds.push(feed);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn overlays(&self) -> Vec<String> {
        let mut overlays = Vec::new();
        if self.show_fps {
            if let Some(text) = self.fps.overlay() {
                overlays.push(text);
            }
        }
        if self.show_num {
            if let Some(num) = self.last_num {
                overlays.push(format!("#{num}"));
            }
        }
        for feed in &self.info_feeds {
            if let Some(text) = feed.latest() {
                overlays.push(text);
            }
        }
        overlays
    }

    /// One display tick at wall-clock `now` (unix seconds). `None` means
    /// there is nothing new to draw.
    pub fn tick(&mut self, now: f64) -> Option<DisplayContent> {
        match &mut self.kind {
            WindowKind::Image => {
                // Skip the backlog, keep the most recent frame only.
                let measurement = self.queue.drain_last()?;
                let (frame, num) = match measurement {
                    Measurement::Image { frame, num, .. } => (frame, num),
                    Measurement::Numeric { .. } => return None,
                };
                self.last_num = Some(num);
                self.fps.mark();
                Some(DisplayContent::Image {
                    name: self.name.clone(),
                    frame,
                    overlays: self.overlays(),
                    overlay_on_image: self.overlay_on_image,
                })
            }
            WindowKind::Scope(oscillo) => {
                // Lines need every point, not just the freshest one.
                for measurement in self.queue.drain_all() {
                    if let Measurement::Numeric { time, values, .. } = &measurement {
                        oscillo.push_point(measurement.name(), *time, values);
                    }
                }
                self.fps.mark();
                let frame = oscillo.frame(now);
                Some(DisplayContent::Lines {
                    name: self.name.clone(),
                    frame,
                    overlays: self.overlays(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_measurement(num: u64) -> Measurement {
        Measurement::Image {
            name: "Cam0".to_string(),
            time: num as f64,
            dt: 1.0,
            num,
            frame: ImageFrame {
                width: 2,
                height: 2,
                bytes: vec![num as u8; 4],
            },
        }
    }

    #[test]
    fn image_window_keeps_latest_frame_only() {
        let queue = DataQueue::new();
        let mut window = Window::image("Cam0", queue.clone());
        for num in 0..5 {
            queue.put(image_measurement(num));
        }
        let content = window.tick(0.0).unwrap();
        match content {
            DisplayContent::Image { frame, overlays, .. } => {
                assert_eq!(frame.bytes, vec![4u8; 4]);
                // Counter overlay reflects the latest num.
                assert!(overlays.iter().any(|o| o == "#4"), "overlays {overlays:?}");
            }
            DisplayContent::Lines { .. } => panic!("expected image content"),
        }
        assert!(queue.is_empty());
        // No new frame → nothing to draw.
        assert!(window.tick(0.1).is_none());
    }

    #[test]
    fn scope_window_consumes_all_points() {
        let queue = DataQueue::new();
        let mut window = Window::scope("P", queue.clone(), 10.0, 1);
        for t in 0..5 {
            queue.put(Measurement::Numeric {
                name: "P".to_string(),
                time: t as f64,
                dt: 1.0,
                values: vec![t as f64],
            });
        }
        let content = window.tick(4.0).unwrap();
        match content {
            DisplayContent::Lines { frame, .. } => {
                assert_eq!(frame.traces[0].lines[0].xs.len(), 5);
            }
            DisplayContent::Image { .. } => panic!("expected lines content"),
        }
    }

    #[test]
    fn info_feed_text_joins_overlays() {
        let queue = DataQueue::new();
        let mut window = Window::image("Cam0", queue.clone());
        let feed = InfoFeed::new(2);
        feed.push("bath 24.1 C".to_string());
        window.attach_info_feed(feed);
        queue.put(image_measurement(1));
        let content = window.tick(0.0).unwrap();
        match content {
            DisplayContent::Image { overlays, .. } => {
                assert!(overlays.iter().any(|o| o == "bath 24.1 C"));
            }
            _ => panic!("expected image content"),
        }
    }
}
