use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of claim dates.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock that advances by a fixed step on every reading.
///
/// Useful in tests that compare modification times: two consecutive writes
/// always land on different seconds.
#[derive(Debug)]
pub struct StepClock {
    next: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl StepClock {
    /// Start at `start`, advancing one second per reading.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::with_step(start, Duration::seconds(1))
    }

    pub fn with_step(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self.next.lock().expect("lock poisoned");
        let now = *next;
        *next = now + self.step;
        now
    }
}
