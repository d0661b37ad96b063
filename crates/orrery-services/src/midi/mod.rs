//! Device backend: scheduled voices as timestamped MIDI messages

mod device;
mod dispatcher;
mod renderer;
pub mod wire;

pub use device::{list_output_ports, select_port, MidiPort, MidirPort};
pub use dispatcher::{DispatchCommand, Dispatcher, MessageKind};
pub use renderer::MidiRenderer;

use thiserror::Error;
use tracing::warn;

use crate::clock::MonotonicClock;

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("Failed to initialize MIDI output: {0}")]
    Init(String),

    #[error("No MIDI output port matches '{0}'")]
    PortNotFound(String),

    #[error("Failed to connect MIDI output: {0}")]
    Connect(String),

    #[error("MIDI send failed: {0}")]
    Send(String),
}

/// Open the device backend. `selector` picks a port by index or name; with no
/// selector the first port is used. When no port can be opened the backend
/// still runs and every send is a no-op.
pub fn start_device_output(selector: Option<&str>, clock: MonotonicClock) -> (MidiRenderer, Dispatcher) {
    let port: Option<Box<dyn MidiPort>> = match MidirPort::connect(selector.unwrap_or("0")) {
        Ok(port) => Some(Box::new(port)),
        Err(e) => {
            warn!(error = %e, "MIDI output unavailable, device messages will be dropped");
            None
        }
    };
    let dispatcher = Dispatcher::spawn(port, clock);
    (MidiRenderer::new(dispatcher.sender()), dispatcher)
}
