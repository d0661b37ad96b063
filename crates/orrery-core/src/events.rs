//! Playback event surface

use std::collections::BTreeSet;

use crate::note::{LiveNote, NoteId};

/// Change to the set of currently highlighted notes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayingNotesChange {
    /// Replace the set with these ids
    Replace(Vec<NoteId>),
    /// Remove these ids if they are still present
    Remove(Vec<NoteId>),
    Clear,
}

impl PlayingNotesChange {
    pub fn apply(&self, playing: &mut BTreeSet<NoteId>) {
        match self {
            Self::Replace(ids) => {
                playing.clear();
                playing.extend(ids.iter().copied());
            }
            Self::Remove(ids) => {
                for id in ids {
                    playing.remove(id);
                }
            }
            Self::Clear => playing.clear(),
        }
    }
}

/// Receives playback notifications. Both methods default to no-ops.
pub trait EventSink: Send {
    /// Called once per rendered voice
    fn on_note_played(&mut self, _note: &LiveNote, _scheduled_time: f64, _duration: f64) {}

    /// Called when the clock reaches a step boundary or a highlight expiry
    fn on_playing_notes_change(&mut self, _change: &PlayingNotesChange) {}
}

/// Sink that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {}
