//! Note voices for the audio backend

mod envelope;
mod panner;
mod renderer;
mod source;

use orrery_core::{InstrumentKind, PlaybackSettings, ScheduledVoice};

use crate::samples::SampleBank;

pub use envelope::{Envelope, ATTACK_S, MIN_HOLD_S};
pub use panner::{spatialize, StereoGain};
pub use renderer::AudioRenderer;
pub use source::{SamplePlayer, Source};

/// Extra life after the envelope ends before a voice is dropped
pub const TAIL_S: f64 = 0.1;

/// One sounding note: source, envelope and stereo placement, pinned to frames
pub struct Voice {
    start_frame: u64,
    end_frame: u64,
    sample_rate: f64,
    source: Source,
    envelope: Envelope,
    gain: StereoGain,
}

impl Voice {
    /// Build a voice for the graph; `None` for notes that cannot sound.
    /// Start times in the past are clamped to `now`.
    pub fn prepare(
        scheduled: &ScheduledVoice,
        settings: &PlaybackSettings,
        now: f64,
        sample_rate: u32,
        samples: Option<&SampleBank>,
    ) -> Option<Self> {
        let note = &scheduled.note;
        if !note.is_playable() || sample_rate == 0 {
            return None;
        }

        let rate = sample_rate as f64;
        let start = if scheduled.time.is_finite() { scheduled.time.max(now) } else { now };
        let duration = scheduled.duration * settings.note_length();
        let peak = settings.master_volume.max(0.0) as f64 * (note.velocity as f64 / 127.0) * scheduled.volume as f64;
        let envelope = Envelope::new(duration, &settings.envelope, peak);
        let lifetime = duration.max(envelope.total()) + TAIL_S;

        let zone = match settings.instrument {
            InstrumentKind::Sampler => samples.and_then(|bank| bank.nearest(note.frequency_hz).map(|z| (bank, z))),
            InstrumentKind::Oscillator => None,
        };
        let source = match zone {
            Some((bank, zone)) => Source::sample(zone, note.frequency_hz, bank.sample_rate() as f64 / rate),
            None => Source::oscillator(settings.waveform, note.frequency_hz as f32, rate),
        };

        let start_frame = (start * rate).round() as u64;
        Some(Self {
            start_frame,
            end_frame: start_frame + (lifetime * rate).ceil() as u64,
            sample_rate: rate,
            source,
            envelope,
            gain: spatialize(note.live_x, note.live_z, settings.spatialization.width()),
        })
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    pub fn end_frame(&self) -> u64 {
        self.end_frame
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn is_finished(&self, frame: u64) -> bool {
        frame >= self.end_frame
    }

    /// Next stereo frame; `frame` is the absolute frame being rendered
    #[inline]
    pub fn render(&mut self, frame: u64) -> (f32, f32) {
        let t = frame.saturating_sub(self.start_frame) as f64 / self.sample_rate;
        let sample = self.source.next_sample() * self.envelope.level_at(t) as f32;
        (sample * self.gain.left, sample * self.gain.right)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use orrery_core::{live_note, Note, Transform};

    use super::*;
    use crate::samples::SampleZone;

    fn scheduled(note: Note, time: f64, duration: f64) -> ScheduledVoice {
        ScheduledVoice {
            note: live_note(&note, &Transform::default()),
            time,
            duration,
            volume: 1.0,
        }
    }

    #[test]
    fn test_unplayable_notes_yield_no_voice() {
        let settings = PlaybackSettings::default();
        let silent = scheduled(Note::new(1, 440.0, 0), 1.0, 0.5);
        assert!(Voice::prepare(&silent, &settings, 0.0, 48_000, None).is_none());
        let broken = scheduled(Note::new(2, f64::NAN, 100), 1.0, 0.5);
        assert!(Voice::prepare(&broken, &settings, 0.0, 48_000, None).is_none());
    }

    #[test]
    fn test_past_start_clamped_to_now() {
        let settings = PlaybackSettings::default();
        let voice = Voice::prepare(&scheduled(Note::new(1, 440.0, 100), 0.5, 0.5), &settings, 2.0, 1000, None).unwrap();
        assert_eq!(voice.start_frame(), 2000);
    }

    #[test]
    fn test_lifetime_covers_envelope_plus_tail() {
        let settings = PlaybackSettings { note_length_multiplier: 2.0, ..Default::default() };
        let voice = Voice::prepare(&scheduled(Note::new(1, 440.0, 127), 1.0, 0.5), &settings, 0.0, 1000, None).unwrap();
        let total = voice.envelope().total();
        assert!(total > 1.0);
        let expected = 1000 + ((total + TAIL_S) * 1000.0).ceil() as u64;
        assert_eq!(voice.end_frame(), expected);
    }

    #[test]
    fn test_peak_scales_with_master_velocity_and_volume() {
        let settings = PlaybackSettings { master_volume: 0.5, ..Default::default() };
        let mut voice = scheduled(Note::new(1, 440.0, 127), 0.0, 0.5);
        voice.volume = 0.5;
        let voice = Voice::prepare(&voice, &settings, 0.0, 1000, None).unwrap();
        assert!((voice.envelope().peak() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_sampler_uses_nearest_zone() {
        let mut bank = SampleBank::empty(1000);
        bank.insert(SampleZone {
            name: "A4".into(),
            midi_note: 69,
            base_frequency_hz: 440.0,
            data: Arc::from(vec![0.5; 4000]),
        });
        let settings = PlaybackSettings {
            instrument: InstrumentKind::Sampler,
            spatialization: orrery_core::Spatialization { enabled: false, width_percent: 100.0 },
            ..Default::default()
        };
        let mut voice =
            Voice::prepare(&scheduled(Note::new(1, 880.0, 127), 0.0, 0.5), &settings, 0.0, 1000, Some(&bank)).unwrap();
        assert!(matches!(voice.source, Source::Sample(_)));

        // Constant sample data: output follows the envelope
        let (left, right) = voice.render(1);
        let expected = 0.5 * voice.envelope().level_at(0.001) as f32 * StereoGain::CENTER.left;
        assert!((left - expected).abs() < 1e-6);
        assert_eq!(left, right);
    }
}
