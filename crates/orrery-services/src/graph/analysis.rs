//! Analysis tap: lock-free level metering plus a short waveform window

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

/// Frames kept in the waveform window
pub const WAVEFORM_LEN: usize = 1024;

/// f32 stored as bits so the engine can publish without locking
#[derive(Debug, Default)]
struct Level(AtomicU32);

impl Level {
    fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Levels of the last published block, readable from any thread
#[derive(Debug)]
pub struct MeterState {
    peak: Level,
    rms: Level,
    clip: AtomicBool,
    waveform: Mutex<Vec<f32>>,
}

impl Default for MeterState {
    fn default() -> Self {
        Self::new()
    }
}

impl MeterState {
    pub(crate) fn new() -> Self {
        Self {
            peak: Level::default(),
            rms: Level::default(),
            clip: AtomicBool::new(false),
            waveform: Mutex::new(vec![0.0; WAVEFORM_LEN]),
        }
    }

    /// Absolute peak across both channels
    pub fn peak(&self) -> f32 {
        self.peak.get()
    }

    /// RMS of the mono downmix
    pub fn rms(&self) -> f32 {
        self.rms.get()
    }

    /// Latched once any sample exceeds full scale
    pub fn is_clipped(&self) -> bool {
        self.clip.load(Ordering::Relaxed)
    }

    pub fn clear_clip(&self) {
        self.clip.store(false, Ordering::Relaxed);
    }

    /// Most recent mono frames, oldest first
    pub fn waveform(&self) -> Vec<f32> {
        self.waveform.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

/// Audio-thread half: accumulates one callback's worth of frames, then publishes
pub(crate) struct AnalysisTap {
    peak: f32,
    sum_sq: f32,
    count: usize,
    recent: VecDeque<f32>,
}

impl AnalysisTap {
    pub(crate) fn new() -> Self {
        Self {
            peak: 0.0,
            sum_sq: 0.0,
            count: 0,
            recent: VecDeque::with_capacity(WAVEFORM_LEN),
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, left: f32, right: f32) {
        let mono = 0.5 * (left + right);
        self.peak = self.peak.max(left.abs()).max(right.abs());
        self.sum_sq += mono * mono;
        self.count += 1;
        if self.recent.len() == WAVEFORM_LEN {
            self.recent.pop_front();
        }
        self.recent.push_back(mono);
    }

    pub(crate) fn publish(&mut self, meter: &MeterState) {
        if self.count == 0 {
            return;
        }
        meter.peak.set(self.peak);
        meter.rms.set((self.sum_sq / self.count as f32).sqrt());
        if self.peak > 1.0 {
            meter.clip.store(true, Ordering::Relaxed);
        }
        // Skip the window update rather than wait on a reader
        if let Ok(mut window) = meter.waveform.try_lock() {
            let fresh = self.recent.len();
            window.copy_within(fresh.., 0);
            let (a, b) = self.recent.as_slices();
            let start = WAVEFORM_LEN - fresh;
            window[start..start + a.len()].copy_from_slice(a);
            window[start + a.len()..].copy_from_slice(b);
        }
        self.peak = 0.0;
        self.sum_sq = 0.0;
        self.count = 0;
        self.recent.clear();
    }
}
