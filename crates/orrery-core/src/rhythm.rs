//! Rhythm patterns, repeat modes and step timing

use serde::{Deserialize, Serialize};

/// Per-cycle-position beat subdivisions (2.0 = eighth notes at quarter-note beats)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RhythmPattern(pub Vec<f64>);

impl RhythmPattern {
    pub fn new(subdivisions: Vec<f64>) -> Self {
        Self(subdivisions)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Subdivision for a cycle position, wrapping around the pattern
    pub fn subdivision_at(&self, position: usize) -> Option<f64> {
        if self.0.is_empty() {
            return None;
        }
        Some(self.0[position % self.0.len()])
    }
}

/// How a step's time slot is filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    /// One render per step
    #[default]
    Off,
    /// Re-trigger the same step floor(subdivision) times within its slot
    Ratchet,
    /// Walk the next floor(subdivision) notes in document order within the slot
    Flow,
}

/// Most triggers a single Ratchet or Flow step may fire
pub const MAX_REPEATS: usize = 64;

/// Length of one beat in seconds
pub fn beat_duration(tempo_bpm: f64) -> f64 {
    60.0 / tempo_bpm
}

/// Timing of one step: `repeats` triggers spaced `spacing` apart filling `slot`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepTiming {
    pub slot: f64,
    pub spacing: f64,
    pub repeats: usize,
}

/// Compute a step's timing; `None` when the subdivision cannot be played
pub fn step_timing(tempo_bpm: f64, subdivision: f64, mode: RepeatMode) -> Option<StepTiming> {
    if !subdivision.is_finite() || subdivision <= 0.0 {
        return None;
    }

    let single = beat_duration(tempo_bpm) / subdivision;
    let repeats = match mode {
        RepeatMode::Off => 1,
        RepeatMode::Ratchet | RepeatMode::Flow => (subdivision.floor() as usize).clamp(1, MAX_REPEATS),
    };

    Some(StepTiming {
        slot: single * repeats as f64,
        spacing: single,
        repeats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_duration_off() {
        let timing = step_timing(120.0, 2.0, RepeatMode::Off).unwrap();
        assert_eq!(timing.slot, 0.25);
        assert_eq!(timing.repeats, 1);
    }

    #[test]
    fn test_step_duration_formula() {
        for &(tempo, sub) in &[(60.0, 1.0), (90.0, 3.0), (133.0, 0.5), (200.0, 4.0)] {
            let timing = step_timing(tempo, sub, RepeatMode::Off).unwrap();
            let expected = 60.0 / (tempo * sub);
            assert!((timing.slot - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_ratchet_shares_slot() {
        let timing = step_timing(120.0, 3.7, RepeatMode::Ratchet).unwrap();
        assert_eq!(timing.repeats, 3);
        assert!((timing.spacing - 0.5 / 3.7).abs() < 1e-12);
        assert!((timing.slot - 3.0 * 0.5 / 3.7).abs() < 1e-12);
    }

    #[test]
    fn test_fractional_subdivision_repeats_at_least_once() {
        let timing = step_timing(120.0, 0.5, RepeatMode::Flow).unwrap();
        assert_eq!(timing.repeats, 1);
        assert_eq!(timing.slot, 1.0);
    }

    #[test]
    fn test_repeats_are_capped() {
        let timing = step_timing(120.0, 1.0e7, RepeatMode::Ratchet).unwrap();
        assert_eq!(timing.repeats, MAX_REPEATS);
        assert!((timing.slot - MAX_REPEATS as f64 * 0.5 / 1.0e7).abs() < 1e-15);
        assert_eq!(step_timing(120.0, 1.0e7, RepeatMode::Off).unwrap().repeats, 1);
    }

    #[test]
    fn test_invalid_subdivision() {
        assert!(step_timing(120.0, 0.0, RepeatMode::Off).is_none());
        assert!(step_timing(120.0, -1.0, RepeatMode::Ratchet).is_none());
        assert!(step_timing(120.0, f64::NAN, RepeatMode::Off).is_none());
    }

    #[test]
    fn test_pattern_wraps() {
        let pattern = RhythmPattern::new(vec![1.0, 2.0, 4.0]);
        assert_eq!(pattern.subdivision_at(4), Some(2.0));
        assert_eq!(RhythmPattern::default().subdivision_at(0), None);
    }
}
