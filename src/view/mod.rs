//! Viewer frame: queue-driven live display of images and oscilloscope
//! lines.
//!
//! The viewer owns one window per live source and paces them at `dt_graph`.
//! Closing the viewer sets the `close` latch only — recording continues
//! until the user issues a stop command; the hub's `stop` latch in turn
//! closes the viewer from outside.

pub mod backends;
pub mod fps;
pub mod info;
pub mod window;

pub use backends::{RawFrameBackend, SvgScopeBackend};
pub use fps::FpsCounter;
pub use info::InfoFeed;
pub use window::{DisplayContent, Window};

use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::utils::{unix_now, Latch};

/// Rendering seam: the engine drives any backend able to draw a window's
/// content and report that its surface was closed.
pub trait ViewerBackend: Send {
    fn draw(&mut self, content: &DisplayContent);

    fn is_closed(&self) -> bool {
        false
    }
}

pub struct Viewer {
    windows: Vec<(Window, Box<dyn ViewerBackend>)>,
    dt_graph: Duration,
    stop: Arc<Latch>,
    close: Arc<Latch>,
}

impl Viewer {
    /// `stop` is the external shutdown request; `close` is set by the viewer
    /// itself when every window is gone.
    pub fn new(dt_graph: Duration, stop: Arc<Latch>, close: Arc<Latch>) -> Self {
        Self {
            windows: Vec::new(),
            dt_graph,
            stop,
            close,
        }
    }

    pub fn add_window(&mut self, window: Window, backend: Box<dyn ViewerBackend>) {
        self.windows.push((window, backend));
    }

    /// Blocking display loop; returns when all windows closed or `stop` was
    /// set. Sets `close` on exit, never `stop`.
    pub fn run(&mut self) {
        info!("viewer started ({} windows)", self.windows.len());
        loop {
            if self.stop.is_set() {
                break;
            }
            let mut any_open = false;
            for (window, backend) in &mut self.windows {
                if backend.is_closed() {
                    continue;
                }
                any_open = true;
                if let Some(content) = window.tick(unix_now()) {
                    backend.draw(&content);
                }
            }
            if !any_open {
                break;
            }
            if self.stop.wait_timeout(self.dt_graph) {
                break;
            }
        }
        self.close.set();
        info!("viewer closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::DataQueue;
    use crate::record::Measurement;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingBackend {
        frames: Arc<AtomicUsize>,
        closed: Arc<AtomicBool>,
    }

    impl ViewerBackend for CountingBackend {
        fn draw(&mut self, _content: &DisplayContent) {
            self.frames.fetch_add(1, Ordering::Relaxed);
        }
        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::Relaxed)
        }
    }

    #[test]
    fn stop_ends_viewer_and_sets_close() {
        let queue: DataQueue<Measurement> = DataQueue::new();
        let stop = Arc::new(Latch::new());
        let close = Arc::new(Latch::new());
        let frames = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicBool::new(false));

        let mut viewer = Viewer::new(Duration::from_millis(10), stop.clone(), close.clone());
        viewer.add_window(
            Window::scope("P", queue.clone(), 10.0, 1),
            Box::new(CountingBackend {
                frames: frames.clone(),
                closed: closed.clone(),
            }),
        );

        let handle = std::thread::spawn(move || viewer.run());
        std::thread::sleep(Duration::from_millis(80));
        stop.set();
        handle.join().unwrap();

        assert!(close.is_set());
        assert!(frames.load(Ordering::Relaxed) >= 2);
    }

    #[test]
    fn all_windows_closed_ends_viewer_without_stop() {
        let queue: DataQueue<Measurement> = DataQueue::new();
        let stop = Arc::new(Latch::new());
        let close = Arc::new(Latch::new());
        let closed = Arc::new(AtomicBool::new(false));

        let mut viewer = Viewer::new(Duration::from_millis(10), stop.clone(), close.clone());
        viewer.add_window(
            Window::scope("P", queue, 10.0, 1),
            Box::new(CountingBackend {
                frames: Arc::new(AtomicUsize::new(0)),
                closed: closed.clone(),
            }),
        );

        let handle = std::thread::spawn(move || viewer.run());
        std::thread::sleep(Duration::from_millis(40));
        closed.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        // Viewer closing is not a recording stop.
        assert!(close.is_set());
        assert!(!stop.is_set());
    }

    struct LastContent(Arc<Mutex<Option<String>>>);

    impl ViewerBackend for LastContent {
        fn draw(&mut self, content: &DisplayContent) {
            let name = match content {
                DisplayContent::Image { name, .. } => name.clone(),
                DisplayContent::Lines { name, .. } => name.clone(),
            };
            *self.0.lock() = Some(name);
        }
    }

    #[test]
    fn draws_window_content() {
        let queue = DataQueue::new();
        queue.put(Measurement::Numeric {
            name: "P".to_string(),
            time: 0.0,
            dt: 0.1,
            values: vec![1.0],
        });
        let stop = Arc::new(Latch::new());
        let close = Arc::new(Latch::new());
        let last = Arc::new(Mutex::new(None));

        let mut viewer = Viewer::new(Duration::from_millis(5), stop.clone(), close.clone());
        viewer.add_window(
            Window::scope("P", queue, 10.0, 1),
            Box::new(LastContent(last.clone())),
        );
        let handle = std::thread::spawn(move || viewer.run());
        std::thread::sleep(Duration::from_millis(40));
        stop.set();
        handle.join().unwrap();

        assert_eq!(last.lock().clone(), Some("P".to_string()));
    }
}
