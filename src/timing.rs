//! Checkpoint timer: deadline-accurate periodic scheduling.
//!
//! `checkpt()` sleeps until the next scheduled tick. Overruns are compensated
//! by skipping the missed ticks instead of accumulating drift. The long part
//! of each wait parks on a condvar so `stop()` and interval changes release
//! the waiter immediately; the final stretch spins via `SpinSleeper` for
//! sub-millisecond release accuracy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::warn;
use parking_lot::{Condvar, Mutex};
use spin_sleep::{SpinSleeper, SpinStrategy};

/// Below this remaining time, the waiter switches from the condvar to the
/// spin sleeper. Cancellation latency is bounded by this margin.
const SPIN_MARGIN: Duration = Duration::from_millis(3);

struct TimerState {
    interval: Duration,
    /// Instant of the last `reset()`, anchor of precise-mode ticks.
    origin: Instant,
    /// Scheduled time of the tick most recently taken (relative mode).
    last_tick: Instant,
    /// Number of ticks taken since `reset()` (precise mode).
    ticks: u64,
    stopped: bool,
}

struct TimerInner {
    state: Mutex<TimerState>,
    cvar: Condvar,
    sleeper: SpinSleeper,
    name: String,
    precise: bool,
    warnings: bool,
}

/// Cheaply cloneable periodic timer. Clones share the same schedule, so a
/// property setter can change `interval` while a reader sleeps in
/// `checkpt()`.
#[derive(Clone)]
pub struct CheckptTimer {
    inner: Arc<TimerInner>,
}

impl CheckptTimer {
    pub fn new(interval: Duration) -> Self {
        Self::with_options(interval, "timer", false, false)
    }

    /// `precise` ties ticks to `reset + k·interval` absolute anchors;
    /// the default mode schedules each tick relative to the previous one.
    pub fn with_options(interval: Duration, name: &str, precise: bool, warnings: bool) -> Self {
        let now = Instant::now();
        Self {
            inner: Arc::new(TimerInner {
                state: Mutex::new(TimerState {
                    interval,
                    origin: now,
                    last_tick: now,
                    ticks: 0,
                    stopped: false,
                }),
                cvar: Condvar::new(),
                sleeper: SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread),
                name: name.to_string(),
                precise,
                warnings,
            }),
        }
    }

    /// Restarts the schedule from now and re-arms a stopped timer.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        let now = Instant::now();
        state.origin = now;
        state.last_tick = now;
        state.ticks = 0;
        state.stopped = false;
        self.inner.cvar.notify_all();
    }

    pub fn interval(&self) -> Duration {
        self.inner.state.lock().interval
    }

    /// Swaps the interval atomically; an in-flight `checkpt()` re-evaluates
    /// its deadline against the new value.
    pub fn set_interval(&self, interval: Duration) {
        let mut state = self.inner.state.lock();
        state.interval = interval;
        self.inner.cvar.notify_all();
    }

    /// Time elapsed since the last `reset()`.
    pub fn elapsed(&self) -> Duration {
        self.inner.state.lock().origin.elapsed()
    }

    /// Releases any waiter immediately and makes further `checkpt()` calls
    /// return `false` until the next `reset()`.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        state.stopped = true;
        self.inner.cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.state.lock().stopped
    }

    fn target(&self, state: &TimerState) -> Instant {
        if self.inner.precise {
            state.origin + mul_duration(state.interval, state.ticks + 1)
        } else {
            state.last_tick + state.interval
        }
    }

    /// Advances the schedule past `now`, skipping missed ticks so the next
    /// deadline is strictly in the future.
    fn take_tick(&self, state: &mut TimerState, target: Instant, now: Instant) {
        if self.inner.precise {
            if now >= target {
                let elapsed = now.duration_since(state.origin);
                state.ticks = div_duration(elapsed, state.interval) + 1;
            } else {
                state.ticks += 1;
            }
        } else if now >= target {
            let missed = div_duration(now.duration_since(target), state.interval);
            state.last_tick = target + mul_duration(state.interval, missed);
        } else {
            state.last_tick = target;
        }
    }

    /// Sleeps until the next scheduled tick.
    ///
    /// Returns `true` when the tick was taken, `false` when the timer was
    /// stopped. If the deadline already passed on entry, returns immediately
    /// (one warning per overrun when warnings are enabled).
    pub fn checkpt(&self) -> bool {
        let mut state = self.inner.state.lock();
        loop {
            if state.stopped {
                return false;
            }

            let target = self.target(&state);
            let now = Instant::now();

            if now >= target {
                if self.inner.warnings {
                    warn!(
                        "timer '{}': tick late by {:.1} ms, skipping ahead",
                        self.inner.name,
                        now.duration_since(target).as_secs_f64() * 1e3,
                    );
                }
                self.take_tick(&mut state, target, now);
                return true;
            }

            let remaining = target.duration_since(now);
            if remaining > SPIN_MARGIN {
                // Interruptible portion: stop() or set_interval() wakes us
                // and the deadline is recomputed.
                let _ = self
                    .inner
                    .cvar
                    .wait_for(&mut state, remaining - SPIN_MARGIN);
                continue;
            }

            // Final stretch: short uninterruptible spin for accuracy.
            drop(state);
            self.inner.sleeper.sleep(remaining);
            state = self.inner.state.lock();
            if state.stopped {
                return false;
            }
            let now = Instant::now();
            let target = self.target(&state);
            self.take_tick(&mut state, target, now);
            return true;
        }
    }
}

fn mul_duration(d: Duration, n: u64) -> Duration {
    Duration::from_nanos((d.as_nanos() as u64).saturating_mul(n))
}

fn div_duration(num: Duration, den: Duration) -> u64 {
    if den.is_zero() {
        return 0;
    }
    (num.as_nanos() / den.as_nanos()) as u64
}
