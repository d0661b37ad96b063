//! Clock abstraction for the scheduler's time domain

use std::sync::{Arc, Mutex};

/// Source of the current time in seconds, in the domain renders are scheduled in.
/// `None` means the clock is not available yet (or has gone away).
pub trait Clock: Send {
    fn now(&self) -> Option<f64>;
}

/// Hand-driven clock for tests and offline rendering
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    time: Arc<Mutex<Option<f64>>>,
}

impl ManualClock {
    /// A ready clock reading `start`
    pub fn new(start: f64) -> Self {
        Self {
            time: Arc::new(Mutex::new(Some(start))),
        }
    }

    /// A clock that is not available until `set` is called
    pub fn not_ready() -> Self {
        Self::default()
    }

    pub fn set(&self, time: f64) {
        if let Ok(mut t) = self.time.lock() {
            *t = Some(time);
        }
    }

    pub fn advance(&self, dt: f64) {
        if let Ok(mut t) = self.time.lock() {
            if let Some(now) = t.as_mut() {
                *now += dt;
            }
        }
    }

    pub fn make_unavailable(&self) {
        if let Ok(mut t) = self.time.lock() {
            *t = None;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Option<f64> {
        self.time.lock().ok().and_then(|t| *t)
    }
}
