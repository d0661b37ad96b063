//! Audio backend renderer: turns scheduled voices into graph voices

use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use orrery_core::{Clock, PlaybackSettings, Renderer, VoiceBatch};
use tracing::warn;

use super::Voice;
use crate::clock::StreamClock;
use crate::graph::{GraphCommand, SignalGraph};
use crate::samples::SampleBank;

pub struct AudioRenderer {
    commands: Sender<GraphCommand>,
    clock: StreamClock,
    samples: Option<Arc<SampleBank>>,
    /// A boundary cancel that found the queue full; sent before anything else
    cancel_owed: bool,
}

impl AudioRenderer {
    pub fn new(graph: &SignalGraph) -> Self {
        Self {
            commands: graph.command_sender(),
            clock: graph.clock(),
            samples: None,
            cancel_owed: false,
        }
    }

    /// Use `bank` for the sampler instrument; an empty bank falls back to the oscillator
    pub fn with_samples(mut self, bank: Arc<SampleBank>) -> Self {
        self.samples = Some(bank).filter(|b| !b.is_empty());
        self
    }

    pub fn clock(&self) -> &StreamClock {
        &self.clock
    }

    /// Queue a pending-voice cancel; remembered for the next call if the queue is full
    fn send_cancel(&mut self) -> bool {
        match self.commands.try_send(GraphCommand::CancelPending) {
            Ok(()) => {
                self.cancel_owed = false;
                true
            }
            Err(TrySendError::Full(_)) => {
                if !self.cancel_owed {
                    warn!("Graph queue full, pending-voice cancel deferred");
                }
                self.cancel_owed = true;
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.cancel_owed = false;
                false
            }
        }
    }
}

impl Renderer for AudioRenderer {
    fn render(&mut self, batch: &VoiceBatch, settings: &PlaybackSettings) {
        let (Some(now), Some(sample_rate)) = (self.clock.now(), self.clock.sample_rate()) else {
            return;
        };

        if self.cancel_owed && !self.send_cancel() {
            return;
        }

        for scheduled in &batch.voices {
            let Some(voice) = Voice::prepare(scheduled, settings, now, sample_rate, self.samples.as_deref()) else {
                continue;
            };
            if self.commands.try_send(GraphCommand::StartVoice(Box::new(voice))).is_err() {
                warn!(id = scheduled.note.id.0, "Graph queue full, voice dropped");
            }
        }
    }

    fn transport_boundary(&mut self, _settings: &PlaybackSettings) {
        self.send_cancel();
    }
}
