//! orrery-core: Scheduling domain for the orrery instrument

pub mod clock;
pub mod effects;
mod error;
pub mod events;
pub mod note;
pub mod render;
pub mod rhythm;
pub mod scheduler;
pub mod sequence;
pub mod settings;

pub use clock::{Clock, ManualClock};
pub use effects::{DelaySettings, EffectsState, EqBand, EqSettings, ImpulseKey, ReverbSettings, WetDry};
pub use error::{OrreryError, Result};
pub use events::{EventSink, NullSink, PlayingNotesChange};
pub use note::{
    frequency_to_midi, live_note, midi_to_frequency,
    LiveNote, Note, NoteId, Position, Transform, TransformAnimator,
};
pub use render::{Renderer, ScheduledVoice, VoiceBatch};
pub use rhythm::{step_timing, RepeatMode, RhythmPattern, StepTiming, MAX_REPEATS};
pub use scheduler::{EngineState, Scheduler, Snapshot};
pub use sequence::{OrderMode, PickingPattern, SequenceInterpreter, Step};
pub use settings::{EnvelopeShape, InstrumentKind, OutputMode, PlaybackSettings, Spatialization, Waveform};
