//! ADSR gain curve scaled to a voice's effective duration

use orrery_core::EnvelopeShape;

pub const ATTACK_S: f64 = 0.001;
pub const MIN_HOLD_S: f64 = 0.01;
/// Level treated as silence by the exponential segments
const FLOOR: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    peak: f64,
    sustain: f64,
    decay: f64,
    hold: f64,
    release: f64,
}

impl Envelope {
    /// `duration_s` is the effective duration (nominal x note length multiplier)
    pub fn new(duration_s: f64, shape: &EnvelopeShape, peak: f64) -> Self {
        let duration = if duration_s.is_finite() { duration_s.max(0.0) } else { 0.0 };
        let fraction = |f: f64| if f.is_finite() { f.max(0.0) } else { 0.0 };
        let decay = duration * fraction(shape.decay_fraction);
        let release = duration * fraction(shape.release_fraction);
        let peak = if peak.is_finite() { peak.max(0.0) } else { 0.0 };
        let sustain_level = fraction(shape.sustain_level).min(1.0).max(FLOOR);

        Self {
            peak,
            sustain: peak * sustain_level,
            decay,
            hold: (duration - ATTACK_S - decay).max(MIN_HOLD_S),
            release,
        }
    }

    pub fn peak(&self) -> f64 {
        self.peak
    }

    /// Attack + decay + hold + release
    pub fn total(&self) -> f64 {
        ATTACK_S + self.decay + self.hold + self.release
    }

    /// Gain `t` seconds after the voice starts
    pub fn level_at(&self, t: f64) -> f64 {
        if t < 0.0 || self.peak <= 0.0 {
            return 0.0;
        }
        if t < ATTACK_S {
            return self.peak * t / ATTACK_S;
        }

        let t = t - ATTACK_S;
        if t < self.decay {
            return exp_ramp(self.peak, self.sustain, t / self.decay);
        }

        let t = t - self.decay;
        if t < self.hold {
            return self.sustain;
        }

        let t = t - self.hold;
        if t < self.release {
            return exp_ramp(self.sustain, self.peak * FLOOR, t / self.release);
        }
        0.0
    }
}

/// Exponential interpolation from `from` to `to`, `u` in [0, 1)
#[inline]
fn exp_ramp(from: f64, to: f64, u: f64) -> f64 {
    from * (to / from).powf(u)
}
