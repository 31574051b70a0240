use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Monotonic time source for breaker cool-downs and cache freshness.
///
/// Injected rather than read ambiently so timing-sensitive state machines
/// stay deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("manual clock lock is not poisoned");
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().expect("manual clock lock is not poisoned")
    }
}
