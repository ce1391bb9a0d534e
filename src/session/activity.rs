//! Last audio activity timestamp, shared between the session and the watchdog

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;

#[derive(Clone)]
pub struct ActivityClock {
    last: Arc<Mutex<Instant>>,
}

impl ActivityClock {
    pub fn new() -> Self {
        Self {
            last: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Record activity now
    pub fn touch(&self) {
        self.touch_at(Instant::now());
    }

    /// Record activity at `at`. Never moves the clock backwards.
    pub fn touch_at(&self, at: Instant) {
        let mut last = self.last.lock();
        if at > *last {
            *last = at;
        }
    }

    /// Time of the last recorded activity
    pub fn last(&self) -> Instant {
        *self.last.lock()
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}
