//! orrery-services: Real-time audio, device and transport plumbing

pub mod audio_io;
pub mod cell;
pub mod clock;
pub mod events;
pub mod graph;
pub mod midi;
pub mod recorder;
pub mod samples;
pub mod transport;
pub mod voice;

pub use audio_io::{list_output_devices, AudioOutputError, PendingOutput, RealtimeOutputStream};
pub use cell::LiveCell;
pub use clock::{MonotonicClock, StreamClock};
pub use events::{CallbackSink, ChannelSink, PlaybackEvent, TracingSink};
pub use graph::{GraphEngine, GraphError, MeterState, RecordingTaps, SignalGraph};
pub use midi::{start_device_output, Dispatcher, MidiError, MidiRenderer};
pub use recorder::{RecordError, WavRecorder};
pub use samples::{SampleBank, SampleError, SampleZone};
pub use transport::{Session, Transport, TransportError};
pub use voice::AudioRenderer;
