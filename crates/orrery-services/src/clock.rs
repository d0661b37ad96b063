//! Clock sources for the two backends

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use orrery_core::Clock;

/// Audio clock: frames rendered by the output stream over its sample rate.
/// Reads `None` until the stream has reported a sample rate.
#[derive(Debug, Clone, Default)]
pub struct StreamClock {
    frames: Arc<AtomicU64>,
    sample_rate: Arc<AtomicU32>,
}

impl StreamClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        match self.sample_rate.load(Ordering::Acquire) {
            0 => None,
            rate => Some(rate),
        }
    }

    pub(crate) fn set_sample_rate(&self, sample_rate: u32) {
        self.sample_rate.store(sample_rate, Ordering::Release);
    }

    /// Stop reporting time (the stream went away)
    pub(crate) fn invalidate(&self) {
        self.sample_rate.store(0, Ordering::Release);
    }

    pub(crate) fn frames(&self) -> Arc<AtomicU64> {
        self.frames.clone()
    }

    pub fn frame_position(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }
}

impl Clock for StreamClock {
    fn now(&self) -> Option<f64> {
        let rate = self.sample_rate()?;
        Some(self.frame_position() as f64 / rate as f64)
    }
}

/// Wall clock measured from a shared origin; used by the device backend
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn seconds(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    /// Time left until `at` (zero when already due)
    pub fn until(&self, at: f64) -> Duration {
        Duration::from_secs_f64((at - self.seconds()).max(0.0))
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Option<f64> {
        Some(self.seconds())
    }
}
