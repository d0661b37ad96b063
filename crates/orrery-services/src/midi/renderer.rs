use crossbeam_channel::Sender;
use orrery_core::{PlaybackSettings, Renderer, VoiceBatch};
use tracing::trace;

use super::dispatcher::{DispatchCommand, MessageKind};
use super::wire::{control_change, note_off, note_on, pan_value, pitch_for, Message, CENTER_PAN, PAN_CC};

/// Shortest note the device backend will send
const MIN_NOTE_S: f64 = 0.010;

/// Renderer that queues note-on/note-off pairs (with pan) on the dispatcher
pub struct MidiRenderer {
    tx: Sender<DispatchCommand>,
}

impl MidiRenderer {
    pub fn new(tx: Sender<DispatchCommand>) -> Self {
        Self { tx }
    }

    fn send(&self, at: f64, kind: MessageKind, bytes: Message) {
        if self.tx.send(DispatchCommand::Send { at, kind, bytes }).is_err() {
            trace!("MIDI dispatcher gone, message dropped");
        }
    }
}

impl Renderer for MidiRenderer {
    fn render(&mut self, batch: &VoiceBatch, settings: &PlaybackSettings) {
        let channel = settings.midi_channel();
        let width = settings.spatialization.width();
        let voices: Vec<_> = batch
            .voices
            .iter()
            .filter(|v| v.note.velocity > 0)
            .filter_map(|v| pitch_for(v.note.frequency_hz).map(|pitch| (v, pitch)))
            .collect();
        if voices.is_empty() {
            return;
        }

        // Simultaneous voices share one pan position
        let shared_pan = batch.arpeggio_delay <= 0.0;
        if shared_pan {
            let pan = if width > 0.0 {
                let mean_z = voices.iter().map(|(v, _)| v.note.live_z).sum::<f64>() / voices.len() as f64;
                pan_value(mean_z, width)
            } else {
                CENTER_PAN
            };
            self.send(batch.time, MessageKind::Control, control_change(channel, PAN_CC, pan));
        }

        for (voice, pitch) in voices {
            if !shared_pan {
                let pan = pan_value(voice.note.live_z, width);
                self.send(voice.time, MessageKind::Control, control_change(channel, PAN_CC, pan));
            }
            let length = (voice.duration * settings.note_length()).max(MIN_NOTE_S);
            self.send(voice.time, MessageKind::NoteOn, note_on(channel, pitch, voice.note.velocity));
            self.send(voice.time + length, MessageKind::NoteOff, note_off(channel, pitch));
        }
    }

    fn transport_boundary(&mut self, settings: &PlaybackSettings) {
        let _ = self.tx.send(DispatchCommand::Boundary { channel: settings.midi_channel() });
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::{unbounded, Receiver};
    use orrery_core::{live_note, Note, ScheduledVoice, Spatialization, Transform};

    use super::*;

    fn voice(id: u64, freq: f64, z: f64, time: f64) -> ScheduledVoice {
        let note = Note::new(id, freq, 100).at(0.0, 0.0, z);
        ScheduledVoice { note: live_note(&note, &Transform::default()), time, duration: 0.5, volume: 1.0 }
    }

    fn drain(rx: &Receiver<DispatchCommand>) -> Vec<(f64, MessageKind, Message)> {
        rx.try_iter()
            .filter_map(|c| match c {
                DispatchCommand::Send { at, kind, bytes } => Some((at, kind, bytes)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_single_note_pair() {
        let (tx, rx) = unbounded();
        let mut renderer = MidiRenderer::new(tx);
        let settings = PlaybackSettings { channel: 2, ..Default::default() };
        let batch = VoiceBatch { time: 1.0, arpeggio_delay: 0.0, voices: vec![voice(1, 440.0, 0.0, 1.0)] };
        renderer.render(&batch, &settings);

        let sent = drain(&rx);
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], (1.0, MessageKind::Control, [0xB2, PAN_CC, CENTER_PAN]));
        assert_eq!(sent[1], (1.0, MessageKind::NoteOn, [0x92, 69, 100]));
        assert_eq!(sent[2], (1.5, MessageKind::NoteOff, [0x82, 69, 0]));
    }

    #[test]
    fn test_cluster_shares_mean_pan() {
        let (tx, rx) = unbounded();
        let mut renderer = MidiRenderer::new(tx);
        let settings = PlaybackSettings::default();
        let batch = VoiceBatch {
            time: 2.0,
            arpeggio_delay: 0.0,
            voices: vec![voice(1, 261.63, 3.0, 2.0), voice(2, 329.63, 0.0, 2.0)],
        };
        renderer.render(&batch, &settings);

        let sent = drain(&rx);
        let pans: Vec<_> = sent.iter().filter(|m| m.1 == MessageKind::Control).collect();
        assert_eq!(pans.len(), 1);
        assert_eq!(pans[0].2[2], pan_value(1.5, 1.0));
        assert_eq!(sent.iter().filter(|m| m.1 == MessageKind::NoteOn).count(), 2);
    }

    #[test]
    fn test_spatialization_off_centers_pan() {
        let (tx, rx) = unbounded();
        let mut renderer = MidiRenderer::new(tx);
        let settings = PlaybackSettings {
            spatialization: Spatialization { enabled: false, width_percent: 100.0 },
            ..Default::default()
        };
        let batch = VoiceBatch { time: 0.0, arpeggio_delay: 0.0, voices: vec![voice(1, 440.0, 3.0, 0.0)] };
        renderer.render(&batch, &settings);
        assert_eq!(drain(&rx)[0].2[2], CENTER_PAN);
    }

    #[test]
    fn test_arpeggio_pans_each_voice() {
        let (tx, rx) = unbounded();
        let mut renderer = MidiRenderer::new(tx);
        let settings = PlaybackSettings { arpeggio_delay_ms: 50.0, ..Default::default() };
        let batch = VoiceBatch {
            time: 0.0,
            arpeggio_delay: 0.05,
            voices: vec![voice(1, 440.0, -3.0, 0.0), voice(2, 550.0, 3.0, 0.05)],
        };
        renderer.render(&batch, &settings);

        let pans: Vec<_> = drain(&rx).into_iter().filter(|m| m.1 == MessageKind::Control).collect();
        assert_eq!(pans.len(), 2);
        assert_eq!(pans[0].2[2], 0);
        assert_eq!((pans[1].0, pans[1].2[2]), (0.05, 127));
    }

    #[test]
    fn test_short_notes_get_minimum_length() {
        let (tx, rx) = unbounded();
        let mut renderer = MidiRenderer::new(tx);
        let settings = PlaybackSettings { note_length_multiplier: 0.0, ..Default::default() };
        let batch = VoiceBatch { time: 0.0, arpeggio_delay: 0.0, voices: vec![voice(1, 440.0, 0.0, 0.0)] };
        renderer.render(&batch, &settings);
        let off = drain(&rx).into_iter().find(|m| m.1 == MessageKind::NoteOff).unwrap();
        assert!((off.0 - MIN_NOTE_S).abs() < 1e-12);
    }

    #[test]
    fn test_silent_voices_are_skipped() {
        let (tx, rx) = unbounded();
        let mut renderer = MidiRenderer::new(tx);
        let mut silent = voice(1, 440.0, 0.0, 0.0);
        silent.note.velocity = 0;
        let batch = VoiceBatch { time: 0.0, arpeggio_delay: 0.0, voices: vec![silent] };
        renderer.render(&batch, &PlaybackSettings::default());
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_boundary_carries_channel() {
        let (tx, rx) = unbounded();
        let mut renderer = MidiRenderer::new(tx);
        renderer.transport_boundary(&PlaybackSettings { channel: 20, ..Default::default() });
        assert_eq!(rx.try_recv().unwrap(), DispatchCommand::Boundary { channel: 15 });
    }
}
