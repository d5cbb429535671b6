//! Waitable boolean latch shared between threads.
//!
//! The `stop` and `graph` events of the record hub are latches: any thread
//! can set/clear them, workers poll them between ticks or block on them with
//! a timeout. Setting wakes all waiters immediately.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Condvar-backed boolean event. `Default` starts unset.
pub struct Latch {
    state: Mutex<bool>,
    cvar: Condvar,
}

impl Latch {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(false),
            cvar: Condvar::new(),
        }
    }

    /// Sets the latch and wakes every waiter.
    pub fn set(&self) {
        let mut state = self.state.lock();
        *state = true;
        self.cvar.notify_all();
    }

    /// Clears the latch. Does not wake waiters.
    pub fn clear(&self) {
        *self.state.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.state.lock()
    }

    /// Blocks until the latch is set or `timeout` elapses.
    /// Returns the latch state on exit.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        if *state {
            return true;
        }
        let _ = self.cvar.wait_for(&mut state, timeout);
        *state
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}
