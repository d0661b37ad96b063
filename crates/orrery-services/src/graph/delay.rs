//! Stereo feedback delay (wet path only; the graph mixes dry and wet)
//!
//! Left and right run through separate lines and are merged back into one
//! stereo wet frame.

use orrery_core::effects::MAX_DELAY_S;
use orrery_core::DelaySettings;

struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(2)],
            write_pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, delay_samples: usize, feedback: f32) -> f32 {
        let len = self.buffer.len();
        let read_pos = (self.write_pos + len - delay_samples) % len;
        let delayed = self.buffer[read_pos];
        self.buffer[self.write_pos] = input + delayed * feedback;
        self.write_pos = (self.write_pos + 1) % len;
        delayed
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
    }
}

pub struct StereoDelay {
    left: DelayLine,
    right: DelayLine,
    delay_samples: usize,
    feedback: f32,
    sample_rate: f32,
}

impl StereoDelay {
    pub fn new(settings: &DelaySettings, sample_rate: f32) -> Self {
        let max_samples = (MAX_DELAY_S * sample_rate) as usize + 1;
        let mut delay = Self {
            left: DelayLine::new(max_samples),
            right: DelayLine::new(max_samples),
            delay_samples: 1,
            feedback: 0.0,
            sample_rate,
        };
        delay.set(settings);
        delay
    }

    pub fn set(&mut self, settings: &DelaySettings) {
        let samples = (settings.time() * self.sample_rate) as usize;
        self.delay_samples = samples.clamp(1, self.left.buffer.len() - 1);
        self.feedback = settings.feedback();
    }

    /// Feed one frame, returning the delayed (wet) frame
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        (
            self.left.process(left, self.delay_samples, self.feedback),
            self.right.process(right, self.delay_samples, self.feedback),
        )
    }

    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_arrives_after_delay_time() {
        let settings = DelaySettings { enabled: true, time_s: 0.01, feedback: 0.5, mix: 1.0 };
        let mut delay = StereoDelay::new(&settings, 1000.0);

        let mut out = Vec::new();
        for i in 0..25 {
            let x = if i == 0 { 1.0 } else { 0.0 };
            out.push(delay.process(x, -x));
        }
        assert_eq!(out[10], (1.0, -1.0));
        assert_eq!(out[20], (0.5, -0.5));
        assert!(out[..10].iter().all(|&(l, r)| l == 0.0 && r == 0.0));
    }

    #[test]
    fn test_channels_stay_separate() {
        let settings = DelaySettings { enabled: true, time_s: 0.005, feedback: 0.9, mix: 1.0 };
        let mut delay = StereoDelay::new(&settings, 1000.0);
        for i in 0..40 {
            let (_, right) = delay.process(if i == 0 { 1.0 } else { 0.0 }, 0.0);
            assert_eq!(right, 0.0);
        }
    }

    #[test]
    fn test_time_clamped_to_buffer() {
        let settings = DelaySettings { time_s: 60.0, ..Default::default() };
        let delay = StereoDelay::new(&settings, 100.0);
        assert!(delay.delay_samples < delay.left.buffer.len());
    }
}
