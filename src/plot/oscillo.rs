//! Wrapping oscilloscope window.
//!
//! A fixed-width window appears to scroll while actually wrapping: when the
//! traveling cursor reaches the right edge it snaps back to the left and
//! overwrites the trailing data, which stays visible until the cursor passes
//! over it. Per sensor, two parallel stores hold the segment being drawn
//! (`current`) and the trailing remainder of the last sweep (`previous`);
//! `reference_time` anchors the current sweep in absolute seconds.
//!
//! The model is pure: it consumes timestamped samples and produces frame
//! snapshots, with no dependency on any rendering toolkit.

use std::collections::HashMap;

/// Parallel time/value stores for one sensor, one values list per channel.
/// Times are absolute unix seconds.
#[derive(Debug, Clone, Default)]
pub struct Segment {
    pub times: Vec<f64>,
    pub values: Vec<Vec<f64>>,
}

impl Segment {
    fn new(channels: usize) -> Self {
        Self {
            times: Vec::new(),
            values: vec![Vec::new(); channels],
        }
    }

    fn push(&mut self, time: f64, values: &[f64]) {
        self.times.push(time);
        for (channel, value) in self.values.iter_mut().zip(values) {
            channel.push(*value);
        }
    }

    fn clear(&mut self) {
        self.times.clear();
        for channel in &mut self.values {
            channel.clear();
        }
    }
}

/// One polyline of a rendered frame, in window coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LineData {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct TraceSnapshot {
    pub name: String,
    pub lines: Vec<LineData>,
}

/// Everything a backend needs to draw one frame.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    /// Cursor position in window coordinates.
    pub bar_x: f64,
    pub window_width: f64,
    pub traces: Vec<TraceSnapshot>,
}

pub struct OscilloWindow {
    window_width: f64,
    reference_time: Option<f64>,
    channels: HashMap<String, usize>,
    order: Vec<String>,
    previous: HashMap<String, Segment>,
    current: HashMap<String, Segment>,
}

impl OscilloWindow {
    pub fn new(window_width: f64) -> Self {
        Self {
            window_width,
            reference_time: None,
            channels: HashMap::new(),
            order: Vec::new(),
            previous: HashMap::new(),
            current: HashMap::new(),
        }
    }

    /// Registers a trace before data arrives. Unregistered names are added
    /// lazily on their first sample.
    pub fn add_trace(&mut self, name: &str, channels: usize) {
        if self.channels.contains_key(name) {
            return;
        }
        self.channels.insert(name.to_string(), channels);
        self.order.push(name.to_string());
        self.previous
            .insert(name.to_string(), Segment::new(channels));
        self.current.insert(name.to_string(), Segment::new(channels));
    }

    pub fn window_width(&self) -> f64 {
        self.window_width
    }

    pub fn reference_time(&self) -> Option<f64> {
        self.reference_time
    }

    /// Single-sample measurement: one time, one value per channel.
    pub fn push_point(&mut self, name: &str, time: f64, values: &[f64]) {
        self.push_span(name, &[time], &values.iter().map(|v| vec![*v]).collect::<Vec<_>>());
    }

    /// Array measurement: `channels[c]` holds one value per entry of
    /// `times`. Late samples from before the current sweep are duplicated
    /// into the previous store so they stay visible on the left of the
    /// window.
    pub fn push_span(&mut self, name: &str, times: &[f64], channels: &[Vec<f64>]) {
        if times.is_empty() {
            return;
        }
        if !self.channels.contains_key(name) {
            self.add_trace(name, channels.len());
        }

        let t_min = times[0];
        let reference = *self.reference_time.get_or_insert(t_min);

        let current = self
            .current
            .get_mut(name)
            .expect("trace registered above");
        for (i, &t) in times.iter().enumerate() {
            let sample: Vec<f64> = channels.iter().map(|c| c[i]).collect();
            current.push(t, &sample);
        }

        if t_min < reference {
            let previous = self
                .previous
                .get_mut(name)
                .expect("trace registered above");
            for (i, &t) in times.iter().enumerate() {
                let sample: Vec<f64> = channels.iter().map(|c| c[i]).collect();
                previous.push(t, &sample);
            }
        }
    }

    /// Builds the frame for wall-clock `now` (unix seconds), then wraps the
    /// sweep if the cursor ran past the right edge.
    ///
    /// Current samples map to `x = t − reference`; trailing previous samples
    /// satisfying `t + window_width > now` map to
    /// `x = t − reference + window_width`, i.e. onto the right side of the
    /// window ahead of the cursor. Previous samples already passed by the
    /// cursor are discarded.
    pub fn frame(&mut self, now: f64) -> FrameSnapshot {
        let reference = self.reference_time.unwrap_or(now);
        let now_rel = now - reference;
        let width = self.window_width;

        let mut traces = Vec::with_capacity(self.order.len());
        for name in &self.order {
            let channels = self.channels[name];
            let current = &self.current[name];
            let previous = self.previous.get_mut(name).expect("trace registered");

            // Trailing retention: drop previous points the cursor passed.
            let keep: Vec<bool> = previous
                .times
                .iter()
                .map(|&t| t + width > now)
                .collect();
            retain_by_mask(&mut previous.times, &keep);
            for channel in &mut previous.values {
                retain_by_mask(channel, &keep);
            }

            let mut lines = Vec::with_capacity(channels);
            for c in 0..channels {
                let mut xs: Vec<f64> =
                    current.times.iter().map(|&t| t - reference).collect();
                let mut ys = current.values[c].clone();
                xs.extend(previous.times.iter().map(|&t| t - reference + width));
                ys.extend(previous.values[c].iter().copied());
                lines.push(LineData { xs, ys });
            }
            traces.push(TraceSnapshot {
                name: name.clone(),
                lines,
            });
        }

        // Wrap after drawing: the trailing data of this sweep becomes the
        // previous store of the next one.
        if self.reference_time.is_some() && now_rel > width {
            for name in &self.order {
                let current = self.current.get_mut(name).expect("trace registered");
                let previous = self.previous.get_mut(name).expect("trace registered");
                std::mem::swap(previous, current);
                current.clear();
            }
            self.reference_time = Some(reference + width);
        }

        FrameSnapshot {
            bar_x: now_rel,
            window_width: width,
            traces,
        }
    }

    /// Raw store access for tests and diagnostics.
    pub fn segments(&self, name: &str) -> Option<(&Segment, &Segment)> {
        Some((self.previous.get(name)?, self.current.get(name)?))
    }
}

fn retain_by_mask(values: &mut Vec<f64>, keep: &[bool]) {
    let mut index = 0;
    values.retain(|_| {
        let keep = keep[index];
        index += 1;
        keep
    });
}
