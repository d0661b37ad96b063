//! Sound sources for voices: oscillators and pitch-shifted samples

use std::sync::Arc;

use fundsp::hacker::*;
use orrery_core::Waveform;

use crate::samples::SampleZone;

/// Plays a mono sample at a fixed rate with linear interpolation
pub struct SamplePlayer {
    data: Arc<[f32]>,
    position: f64,
    rate: f64,
}

impl SamplePlayer {
    pub fn new(data: Arc<[f32]>, rate: f64) -> Self {
        Self {
            data,
            position: 0.0,
            rate: if rate.is_finite() && rate > 0.0 { rate } else { 1.0 },
        }
    }

    #[inline]
    fn next(&mut self) -> f32 {
        let idx = self.position as usize;
        if idx + 1 >= self.data.len() {
            return 0.0;
        }
        let frac = (self.position - idx as f64) as f32;
        let out = self.data[idx] + (self.data[idx + 1] - self.data[idx]) * frac;
        self.position += self.rate;
        out
    }
}

pub enum Source {
    Oscillator(Box<dyn AudioUnit>),
    Sample(SamplePlayer),
}

impl Source {
    pub fn oscillator(waveform: Waveform, frequency_hz: f32, sample_rate: f64) -> Self {
        let mut unit: Box<dyn AudioUnit> = match waveform {
            Waveform::Sine => Box::new(sine_hz(frequency_hz)),
            Waveform::Square => Box::new(square_hz(frequency_hz)),
            Waveform::Sawtooth => Box::new(saw_hz(frequency_hz)),
            Waveform::Triangle => Box::new(triangle_hz(frequency_hz)),
        };
        unit.set_sample_rate(sample_rate);
        Self::Oscillator(unit)
    }

    /// Sample zone played back at `frequency_hz / zone base frequency`;
    /// `rate_scale` corrects for a bank loaded at another sample rate
    pub fn sample(zone: &SampleZone, frequency_hz: f64, rate_scale: f64) -> Self {
        let rate = frequency_hz / zone.base_frequency_hz * rate_scale;
        Self::Sample(SamplePlayer::new(zone.data.clone(), rate))
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        match self {
            Self::Oscillator(unit) => {
                let mut out = [0.0f32; 1];
                unit.tick(&[], &mut out);
                out[0]
            }
            Self::Sample(player) => player.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rate_doubling_skips_frames() {
        let data: Arc<[f32]> = Arc::from(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut source = Source::Sample(SamplePlayer::new(data, 2.0));
        let out: Vec<f32> = (0..4).map(|_| source.next_sample()).collect();
        assert_eq!(out, vec![0.0, 2.0, 4.0, 0.0]);
    }

    #[test]
    fn test_sample_interpolates() {
        let data: Arc<[f32]> = Arc::from(vec![0.0, 1.0, 0.0]);
        let mut source = Source::Sample(SamplePlayer::new(data, 0.5));
        let out: Vec<f32> = (0..3).map(|_| source.next_sample()).collect();
        assert_eq!(out, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_oscillator_is_bounded_and_moving() {
        let mut source = Source::oscillator(Waveform::Sawtooth, 440.0, 48_000.0);
        let out: Vec<f32> = (0..480).map(|_| source.next_sample()).collect();
        assert!(out.iter().all(|s| s.abs() <= 1.01));
        assert!(out.iter().any(|s| s.abs() > 0.5));
    }
}
