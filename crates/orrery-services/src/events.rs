//! Event sinks for hosts

use crossbeam_channel::Sender;
use orrery_core::{EventSink, LiveNote, NoteId, PlayingNotesChange};
use tracing::{debug, trace};

/// Owned playback notification, for delivery across threads
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    NotePlayed {
        id: NoteId,
        frequency_hz: f64,
        velocity: u8,
        scheduled_time: f64,
        duration: f64,
    },
    PlayingNotes(PlayingNotesChange),
}

impl PlaybackEvent {
    fn note_played(note: &LiveNote, scheduled_time: f64, duration: f64) -> Self {
        Self::NotePlayed {
            id: note.id,
            frequency_hz: note.frequency_hz,
            velocity: note.velocity,
            scheduled_time,
            duration,
        }
    }
}

/// Forwards events into a channel; drops them if the receiver is gone or full
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<PlaybackEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<PlaybackEvent>) -> Self {
        Self { tx }
    }

    fn push(&self, event: PlaybackEvent) {
        if self.tx.try_send(event).is_err() {
            trace!("Playback event dropped");
        }
    }
}

impl EventSink for ChannelSink {
    fn on_note_played(&mut self, note: &LiveNote, scheduled_time: f64, duration: f64) {
        self.push(PlaybackEvent::note_played(note, scheduled_time, duration));
    }

    fn on_playing_notes_change(&mut self, change: &PlayingNotesChange) {
        self.push(PlaybackEvent::PlayingNotes(change.clone()));
    }
}

/// Logs every event at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_note_played(&mut self, note: &LiveNote, scheduled_time: f64, duration: f64) {
        debug!(
            id = note.id.0,
            frequency_hz = note.frequency_hz,
            scheduled_time,
            duration,
            "Note played"
        );
    }

    fn on_playing_notes_change(&mut self, change: &PlayingNotesChange) {
        debug!(?change, "Playing notes changed");
    }
}

/// Calls a closure with every event
pub struct CallbackSink<F> {
    callback: F,
}

impl<F: FnMut(PlaybackEvent) + Send> CallbackSink<F> {
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F: FnMut(PlaybackEvent) + Send> EventSink for CallbackSink<F> {
    fn on_note_played(&mut self, note: &LiveNote, scheduled_time: f64, duration: f64) {
        (self.callback)(PlaybackEvent::note_played(note, scheduled_time, duration));
    }

    fn on_playing_notes_change(&mut self, change: &PlayingNotesChange) {
        (self.callback)(PlaybackEvent::PlayingNotes(change.clone()));
    }
}

#[cfg(test)]
mod tests {
    use orrery_core::{live_note, Note, Transform};

    use super::*;

    #[test]
    fn test_channel_sink_forwards_and_tolerates_full_channel() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut sink = ChannelSink::new(tx);
        let note = live_note(&Note::new(4, 440.0, 90), &Transform::default());

        sink.on_note_played(&note, 1.5, 0.25);
        sink.on_playing_notes_change(&PlayingNotesChange::Clear);

        let event = rx.try_recv().unwrap();
        assert!(matches!(event, PlaybackEvent::NotePlayed { id: NoteId(4), velocity: 90, .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_tracing_sink_drives_a_scheduler() {
        use orrery_core::{ManualClock, PlaybackSettings, Renderer, Scheduler, Snapshot, VoiceBatch};

        struct Silent;
        impl Renderer for Silent {
            fn render(&mut self, _batch: &VoiceBatch, _settings: &PlaybackSettings) {}
        }

        let clock = ManualClock::new(0.0);
        let mut scheduler = Scheduler::new(clock.clone(), Silent).with_sink(TracingSink);
        let settings = PlaybackSettings::default();
        let notes = vec![Note::new(1, 440.0, 100)];
        assert!(scheduler.start(&settings));
        clock.set(0.05);
        let rendered = scheduler.tick(&Snapshot { notes: &notes, transform: &Transform::default(), settings: &settings });
        assert_eq!(rendered, 1);
        scheduler.stop(&settings);
    }

    #[test]
    fn test_callback_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = CallbackSink::new(|e| seen.push(e));
            sink.on_playing_notes_change(&PlayingNotesChange::Remove(vec![NoteId(1)]));
        }
        assert_eq!(seen, vec![PlaybackEvent::PlayingNotes(PlayingNotesChange::Remove(vec![NoteId(1)]))]);
    }
}
