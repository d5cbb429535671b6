//! Info feeds: short strings emitted at their own cadence, overlaid on
//! viewer windows (clock, device status, queue depth, ...).
//!
//! Backed by a small lock-free ring so an emitter never blocks a window and
//! a slow window only ever sees the latest text.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_queue::ArrayQueue;

use crate::utils::Latch;

#[derive(Clone)]
pub struct InfoFeed {
    queue: Arc<ArrayQueue<String>>,
}

impl InfoFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity.max(1))),
        }
    }

    /// Non-blocking publish; the oldest entry is dropped when full.
    pub fn push(&self, text: String) {
        let mut text = text;
        while let Err(rejected) = self.queue.push(text) {
            let _ = self.queue.pop();
            text = rejected;
        }
    }

    /// Most recent entry, discarding anything older.
    pub fn latest(&self) -> Option<String> {
        let mut latest = None;
        while let Some(text) = self.queue.pop() {
            latest = Some(text);
        }
        latest
    }

    /// Spawns an emitter thread producing a fresh string every `period`
    /// until `stop` is set.
    pub fn spawn_periodic(
        period: Duration,
        stop: Arc<Latch>,
        produce: impl Fn() -> String + Send + 'static,
    ) -> (Self, JoinHandle<()>) {
        let feed = Self::new(4);
        let emitter = feed.clone();
        let handle = std::thread::spawn(move || {
            while !stop.wait_timeout(period) {
                emitter.push(produce());
            }
        });
        (feed, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_wins() {
        let feed = InfoFeed::new(4);
        for i in 0..10 {
            feed.push(format!("tick {i}"));
        }
        assert_eq!(feed.latest(), Some("tick 9".to_string()));
        assert_eq!(feed.latest(), None);
    }

    #[test]
    fn periodic_emitter_stops_on_latch() {
        let stop = Arc::new(Latch::new());
        let (feed, handle) =
            InfoFeed::spawn_periodic(Duration::from_millis(10), stop.clone(), || "ok".to_string());
        std::thread::sleep(Duration::from_millis(60));
        stop.set();
        handle.join().unwrap();
        assert_eq!(feed.latest(), Some("ok".to_string()));
    }
}
