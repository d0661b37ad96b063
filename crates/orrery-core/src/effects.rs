//! Effects parameters for the signal graph, with the bypass law

use serde::{Deserialize, Serialize};

/// Longest delay time the delay line is sized for
pub const MAX_DELAY_S: f32 = 5.0;
/// Feedback ceiling that keeps the delay loop stable
pub const MAX_FEEDBACK: f32 = 0.95;

/// One EQ band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    pub gain_db: f32,
    pub frequency_hz: f32,
    pub q: f32,
}

impl EqBand {
    pub fn new(gain_db: f32, frequency_hz: f32, q: f32) -> Self {
        Self { gain_db, frequency_hz, q }
    }
}

/// Low shelf, mid peak, high shelf
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqSettings {
    pub low: EqBand,
    pub mid: EqBand,
    pub high: EqBand,
}

impl Default for EqSettings {
    fn default() -> Self {
        Self {
            low: EqBand::new(0.0, 250.0, 0.707),
            mid: EqBand::new(0.0, 1000.0, 1.0),
            high: EqBand::new(0.0, 4000.0, 0.707),
        }
    }
}

/// Dry/wet gain pair of a parallel effect stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WetDry {
    pub dry: f32,
    pub wet: f32,
}

impl WetDry {
    pub const BYPASS: WetDry = WetDry { dry: 1.0, wet: 0.0 };
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelaySettings {
    pub enabled: bool,
    pub time_s: f32,
    pub feedback: f32,
    pub mix: f32,
}

impl Default for DelaySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            time_s: 0.3,
            feedback: 0.35,
            mix: 0.3,
        }
    }
}

impl DelaySettings {
    /// Stage gains; a disabled delay passes the dry signal untouched
    pub fn gains(&self) -> WetDry {
        if !self.enabled {
            return WetDry::BYPASS;
        }
        let mix = sanitize(self.mix, 0.0, 1.0, 0.0);
        WetDry { dry: 1.0 - mix, wet: mix }
    }

    pub fn time(&self) -> f32 {
        sanitize(self.time_s, 0.001, MAX_DELAY_S, 0.3)
    }

    pub fn feedback(&self) -> f32 {
        sanitize(self.feedback, 0.0, MAX_FEEDBACK, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbSettings {
    pub enabled: bool,
    pub dry: f32,
    pub wet: f32,
    /// Impulse length in seconds
    pub size_s: f32,
    pub decay: f32,
}

impl Default for ReverbSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            dry: 1.0,
            wet: 0.3,
            size_s: 2.0,
            decay: 2.0,
        }
    }
}

impl ReverbSettings {
    pub fn gains(&self) -> WetDry {
        if !self.enabled {
            return WetDry::BYPASS;
        }
        WetDry {
            dry: sanitize(self.dry, 0.0, 1.0, 1.0),
            wet: sanitize(self.wet, 0.0, 1.0, 0.0),
        }
    }

    /// Parameters that determine the impulse response
    pub fn impulse_key(&self) -> ImpulseKey {
        ImpulseKey {
            size_s: sanitize(self.size_s, 0.05, 10.0, 2.0),
            decay: sanitize(self.decay, 0.01, 100.0, 2.0),
        }
    }
}

/// Identity of a generated impulse response
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpulseKey {
    pub size_s: f32,
    pub decay: f32,
}

/// Complete effects snapshot pushed into the signal graph
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsState {
    pub eq: EqSettings,
    pub delay: DelaySettings,
    pub reverb: ReverbSettings,
}

fn sanitize(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}
