//! Signal graph builder
//!
//! The control half (`SignalGraph`) lives with the host; the real-time half
//! (`GraphEngine`) is created exactly once per readiness transition and moved
//! into the output callback. They share nothing but a bounded command channel,
//! the stream clock's frame counter and the meter.

mod analysis;
mod delay;
mod engine;
mod eq;
mod reverb;

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use orrery_core::{EffectsState, ImpulseKey};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audio_io::{AudioOutputError, PendingOutput, RealtimeOutputStream};
use crate::clock::StreamClock;

pub use analysis::{MeterState, WAVEFORM_LEN};
pub use delay::StereoDelay;
pub use engine::GraphEngine;
pub(crate) use engine::GraphCommand;
pub use eq::ThreeBandEq;
pub use reverb::{generate_impulse, Convolver};

use engine::{EngineParts, StageParams};

pub(crate) const COMMAND_CAPACITY: usize = 1024;
const RECORD_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Signal graph is already built")]
    AlreadyBuilt,
    #[error("Audio output error: {0}")]
    Output(#[from] AudioOutputError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphState {
    NotReady,
    Ready { sample_rate: u32 },
}

/// Taps a host can attach to: interleaved stereo blocks plus live levels
#[derive(Clone)]
pub struct RecordingTaps {
    pub stream: Receiver<Vec<f32>>,
    pub analysis: Arc<MeterState>,
    pub sample_rate: u32,
}

pub struct SignalGraph {
    state: GraphState,
    commands: Sender<GraphCommand>,
    engine_rx: Option<Receiver<GraphCommand>>,
    record_tx: Sender<Vec<f32>>,
    record_rx: Receiver<Vec<f32>>,
    meter: Arc<MeterState>,
    clock: StreamClock,
    effects: EffectsState,
    impulse_key: Option<ImpulseKey>,
    impulse_generations: u64,
    rng: fastrand::Rng,
}

impl Default for SignalGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalGraph {
    pub fn new() -> Self {
        Self::with_rng(fastrand::Rng::new())
    }

    /// Deterministic impulse responses
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(fastrand::Rng::with_seed(seed))
    }

    fn with_rng(rng: fastrand::Rng) -> Self {
        let (commands, engine_rx) = bounded(COMMAND_CAPACITY);
        let (record_tx, record_rx) = bounded(RECORD_CAPACITY);
        Self {
            state: GraphState::NotReady,
            commands,
            engine_rx: Some(engine_rx),
            record_tx,
            record_rx,
            meter: Arc::new(MeterState::new()),
            clock: StreamClock::new(),
            effects: EffectsState::default(),
            impulse_key: None,
            impulse_generations: 0,
            rng,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, GraphState::Ready { .. })
    }

    /// Clock advanced by the engine; reads `None` until the graph is built
    pub fn clock(&self) -> StreamClock {
        self.clock.clone()
    }

    pub(crate) fn command_sender(&self) -> Sender<GraphCommand> {
        self.commands.clone()
    }

    /// Build the chain for an output running at `sample_rate`. Returns the
    /// real-time half on the first call only; later calls are no-ops.
    pub fn on_output_ready(&mut self, sample_rate: u32) -> Option<GraphEngine> {
        if self.is_ready() || sample_rate == 0 {
            debug!("Signal graph already built");
            return None;
        }
        let commands = self.engine_rx.take()?;

        let reverb = self.effects.reverb.enabled.then(|| self.build_convolver(sample_rate));
        let engine = GraphEngine::new(EngineParts {
            sample_rate: sample_rate as f32,
            commands,
            frames: self.clock.frames(),
            meter: self.meter.clone(),
            record_tx: self.record_tx.clone(),
            params: StageParams::from(&self.effects),
            reverb,
        });

        self.clock.set_sample_rate(sample_rate);
        self.state = GraphState::Ready { sample_rate };
        info!(sample_rate, "Signal graph built");
        Some(engine)
    }

    /// Open an output device and start the engine on it
    pub fn connect(&mut self, device: Option<&str>) -> Result<RealtimeOutputStream, GraphError> {
        if self.is_ready() {
            return Err(GraphError::AlreadyBuilt);
        }
        let output = PendingOutput::open(device)?;
        let mut engine = self.on_output_ready(output.sample_rate).ok_or(GraphError::AlreadyBuilt)?;

        match output.start(move |data, _, channels| engine.process(data, channels as usize)) {
            Ok(stream) => Ok(stream),
            Err(e) => {
                self.teardown();
                Err(e.into())
            }
        }
    }

    /// Apply an effects snapshot. Never blocks; before the graph is built the
    /// snapshot is kept and applied at build time.
    pub fn update(&mut self, effects: &EffectsState) {
        self.effects = *effects;
        let GraphState::Ready { sample_rate } = self.state else {
            return;
        };

        self.send(GraphCommand::Params(StageParams::from(effects)));
        if effects.reverb.enabled && self.impulse_key != Some(effects.reverb.impulse_key()) {
            let convolver = self.build_convolver(sample_rate);
            self.send(GraphCommand::Impulse(convolver));
        }
    }

    pub fn effects(&self) -> &EffectsState {
        &self.effects
    }

    /// How many impulse responses have been generated so far
    pub fn impulse_generations(&self) -> u64 {
        self.impulse_generations
    }

    pub fn set_master_gain(&self, gain: f32) {
        if self.is_ready() {
            self.send(GraphCommand::MasterGain(gain));
        }
    }

    /// Recording and analysis taps; `None` until the graph is built
    pub fn recording_taps(&self) -> Option<RecordingTaps> {
        let GraphState::Ready { sample_rate } = self.state else {
            return None;
        };
        Some(RecordingTaps {
            stream: self.record_rx.clone(),
            analysis: self.meter.clone(),
            sample_rate,
        })
    }

    /// Disconnect every stage. The engine goes silent and the graph can be
    /// built again for a new output.
    pub fn teardown(&mut self) {
        if !self.is_ready() {
            return;
        }
        self.send(GraphCommand::Teardown);
        self.clock.invalidate();

        let (commands, engine_rx) = bounded(COMMAND_CAPACITY);
        self.commands = commands;
        self.engine_rx = Some(engine_rx);
        self.impulse_key = None;
        self.state = GraphState::NotReady;
        info!("Signal graph torn down");
    }

    fn build_convolver(&mut self, sample_rate: u32) -> Box<Convolver> {
        let key = self.effects.reverb.impulse_key();
        let impulse = generate_impulse(key, sample_rate as f32, &mut self.rng);
        self.impulse_key = Some(key);
        self.impulse_generations += 1;
        debug!(size_s = key.size_s, decay = key.decay, "Generated impulse response");
        Box::new(Convolver::new(&impulse))
    }

    fn send(&self, command: GraphCommand) {
        if self.commands.try_send(command).is_err() {
            warn!("Graph command queue full, update dropped");
        }
    }
}
