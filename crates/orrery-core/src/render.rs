//! The render step shared by both backends

use crate::note::LiveNote;
use crate::settings::PlaybackSettings;

/// One voice ready for submission
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledVoice {
    pub note: LiveNote,
    /// Start time in the clock domain, arpeggio offset included
    pub time: f64,
    /// Nominal duration before the note length multiplier
    pub duration: f64,
    /// Gain factor (1/sqrt(n) for clusters)
    pub volume: f32,
}

/// All voices of one trigger: a single note or a cluster
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceBatch {
    /// Trigger time of the first voice
    pub time: f64,
    pub arpeggio_delay: f64,
    pub voices: Vec<ScheduledVoice>,
}

impl VoiceBatch {
    pub fn is_cluster(&self) -> bool {
        self.voices.len() > 1
    }
}

/// Backend that turns scheduled voices into sound or device messages.
///
/// Implementations must not block: they submit future-timestamped work and
/// return.
pub trait Renderer: Send {
    fn render(&mut self, batch: &VoiceBatch, settings: &PlaybackSettings);

    /// Called on every transport start and stop
    fn transport_boundary(&mut self, _settings: &PlaybackSettings) {}
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, batch: &VoiceBatch, settings: &PlaybackSettings) {
        (**self).render(batch, settings)
    }

    fn transport_boundary(&mut self, settings: &PlaybackSettings) {
        (**self).transport_boundary(settings)
    }
}
