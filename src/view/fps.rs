//! Display-rate estimate from a sliding sample of recent frame times.

use std::collections::VecDeque;
use std::time::Instant;

use average::Mean;

const DEFAULT_SAMPLES: usize = 20;

pub struct FpsCounter {
    times: VecDeque<Instant>,
    capacity: usize,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::with_samples(DEFAULT_SAMPLES)
    }

    pub fn with_samples(capacity: usize) -> Self {
        Self {
            times: VecDeque::with_capacity(capacity.max(2)),
            capacity: capacity.max(2),
        }
    }

    /// Records that a frame was displayed now.
    pub fn mark(&mut self) {
        if self.times.len() == self.capacity {
            self.times.pop_front();
        }
        self.times.push_back(Instant::now());
    }

    /// Mean rate over the retained samples; `None` until two frames exist.
    pub fn fps(&self) -> Option<f64> {
        if self.times.len() < 2 {
            return None;
        }
        let mean: Mean = self
            .times
            .iter()
            .zip(self.times.iter().skip(1))
            .map(|(a, b)| b.duration_since(*a).as_secs_f64())
            .collect();
        let interval = mean.mean();
        if interval > 0.0 {
            Some(1.0 / interval)
        } else {
            None
        }
    }

    pub fn overlay(&self) -> Option<String> {
        self.fps().map(|fps| format!("{fps:.1} fps"))
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn needs_two_samples() {
        let mut fps = FpsCounter::new();
        assert!(fps.fps().is_none());
        fps.mark();
        assert!(fps.fps().is_none());
    }

    #[test]
    fn estimates_steady_rate() {
        let mut fps = FpsCounter::new();
        for _ in 0..6 {
            fps.mark();
            thread::sleep(Duration::from_millis(20));
        }
        let estimate = fps.fps().unwrap();
        // ~50 fps with generous scheduling slack.
        assert!(estimate > 20.0 && estimate < 60.0, "estimate {estimate}");
        assert!(fps.overlay().unwrap().ends_with("fps"));
    }

    #[test]
    fn sliding_window_caps_samples() {
        let mut fps = FpsCounter::with_samples(4);
        for _ in 0..20 {
            fps.mark();
        }
        assert!(fps.times.len() <= 4);
    }
}
