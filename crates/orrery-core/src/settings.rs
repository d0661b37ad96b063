//! Playback settings shared by the scheduler and both backends

use serde::{Deserialize, Serialize};

use crate::error::{OrreryError, Result};
use crate::rhythm::{beat_duration, RepeatMode, RhythmPattern, MAX_REPEATS};
use crate::sequence::OrderMode;

pub const DEFAULT_TEMPO_BPM: f64 = 120.0;
pub const DEFAULT_LOOKAHEAD_MS: f64 = 25.0;
pub const DEFAULT_HORIZON_S: f64 = 0.1;

/// Oscillator shape for synthesized voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Sound source for the audio backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    #[default]
    Oscillator,
    /// Pitch-shifted samples, falling back to the oscillator when none are loaded
    Sampler,
}

/// Which backend renders the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    #[default]
    Audio,
    Device,
}

/// Stereo placement of voices from their live X/Z position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spatialization {
    pub enabled: bool,
    pub width_percent: f64,
}

impl Default for Spatialization {
    fn default() -> Self {
        Self {
            enabled: true,
            width_percent: 100.0,
        }
    }
}

impl Spatialization {
    /// Width as a factor, zero when disabled
    pub fn width(&self) -> f64 {
        if self.enabled && self.width_percent.is_finite() {
            self.width_percent.max(0.0) / 100.0
        } else {
            0.0
        }
    }
}

/// ADSR shape relative to a voice's effective duration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeShape {
    /// Decay time as a fraction of the effective duration
    pub decay_fraction: f64,
    /// Sustain level relative to peak
    pub sustain_level: f64,
    /// Release time as a fraction of the effective duration
    pub release_fraction: f64,
}

impl Default for EnvelopeShape {
    fn default() -> Self {
        Self {
            decay_fraction: 0.2,
            sustain_level: 0.6,
            release_fraction: 0.3,
        }
    }
}

/// Everything the scheduler and renderers read from the host each tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub tempo_bpm: f64,
    pub global_subdivision: f64,
    pub rhythm_pattern: RhythmPattern,
    pub repeat_mode: RepeatMode,
    /// Steps per cycle; 0 uses the order's natural length
    pub cycle_length: usize,
    pub order_mode: OrderMode,
    pub note_length_multiplier: f64,
    pub arpeggio_delay_ms: f64,
    pub spatialization: Spatialization,
    pub master_volume: f32,
    pub instrument: InstrumentKind,
    pub waveform: Waveform,
    pub envelope: EnvelopeShape,
    pub lookahead_ms: f64,
    pub horizon_s: f64,
    pub output_mode: OutputMode,
    /// Device name (substring match) for the device backend
    pub device: Option<String>,
    pub channel: u8,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            tempo_bpm: DEFAULT_TEMPO_BPM,
            global_subdivision: 1.0,
            rhythm_pattern: RhythmPattern::default(),
            repeat_mode: RepeatMode::Off,
            cycle_length: 0,
            order_mode: OrderMode::Forward,
            note_length_multiplier: 1.0,
            arpeggio_delay_ms: 0.0,
            spatialization: Spatialization::default(),
            master_volume: 0.8,
            instrument: InstrumentKind::Oscillator,
            waveform: Waveform::Sine,
            envelope: EnvelopeShape::default(),
            lookahead_ms: DEFAULT_LOOKAHEAD_MS,
            horizon_s: DEFAULT_HORIZON_S,
            output_mode: OutputMode::Audio,
            device: None,
            channel: 0,
        }
    }
}

impl PlaybackSettings {
    /// Tempo with invalid values replaced by the default
    pub fn tempo(&self) -> f64 {
        if self.tempo_bpm.is_finite() && self.tempo_bpm > 0.0 {
            self.tempo_bpm
        } else {
            DEFAULT_TEMPO_BPM
        }
    }

    pub fn beat_duration(&self) -> f64 {
        beat_duration(self.tempo())
    }

    pub fn arpeggio_delay_s(&self) -> f64 {
        if self.arpeggio_delay_ms.is_finite() {
            self.arpeggio_delay_ms.max(0.0) / 1000.0
        } else {
            0.0
        }
    }

    pub fn note_length(&self) -> f64 {
        if self.note_length_multiplier.is_finite() {
            self.note_length_multiplier.max(0.0)
        } else {
            1.0
        }
    }

    pub fn lookahead_s(&self) -> f64 {
        if self.lookahead_ms.is_finite() && self.lookahead_ms > 0.0 {
            self.lookahead_ms / 1000.0
        } else {
            DEFAULT_LOOKAHEAD_MS / 1000.0
        }
    }

    pub fn horizon(&self) -> f64 {
        if self.horizon_s.is_finite() && self.horizon_s > 0.0 {
            self.horizon_s
        } else {
            DEFAULT_HORIZON_S
        }
    }

    /// MIDI channel clamped to 0..=15
    pub fn midi_channel(&self) -> u8 {
        self.channel.min(15)
    }

    /// Reject values a host should never hand over; playback itself tolerates them
    pub fn validate(&self) -> Result<()> {
        if !(self.tempo_bpm.is_finite() && self.tempo_bpm > 0.0) {
            return Err(OrreryError::InvalidTempo(self.tempo_bpm));
        }
        if !valid_subdivision(self.global_subdivision) {
            return Err(OrreryError::InvalidSubdivision(self.global_subdivision));
        }
        if let Some(&bad) = self.rhythm_pattern.0.iter().find(|s| !valid_subdivision(**s)) {
            return Err(OrreryError::InvalidSubdivision(bad));
        }
        if !(self.note_length_multiplier.is_finite() && self.note_length_multiplier >= 0.0) {
            return Err(OrreryError::InvalidNoteLength(self.note_length_multiplier));
        }
        if !(self.arpeggio_delay_ms.is_finite() && self.arpeggio_delay_ms >= 0.0) {
            return Err(OrreryError::InvalidArpeggioDelay(self.arpeggio_delay_ms));
        }
        Ok(())
    }
}

/// Positive, and no finer than a Ratchet/Flow step can actually play
fn valid_subdivision(subdivision: f64) -> bool {
    subdivision.is_finite() && subdivision > 0.0 && subdivision <= MAX_REPEATS as f64
}
