//! Real-time half of the signal graph, owned by the output callback

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use orrery_core::{DelaySettings, EffectsState, EqSettings, WetDry};

use super::analysis::{AnalysisTap, MeterState};
use super::delay::StereoDelay;
use super::eq::ThreeBandEq;
use super::reverb::Convolver;
use crate::voice::Voice;

/// Time constant of parameter smoothing
const SMOOTHING_S: f32 = 0.01;

/// Messages from the control side
pub(crate) enum GraphCommand {
    StartVoice(Box<Voice>),
    /// Drop voices that have not started yet
    CancelPending,
    Params(StageParams),
    Impulse(Box<Convolver>),
    MasterGain(f32),
    Teardown,
}

/// Per-stage parameters derived from an effects snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct StageParams {
    pub eq: EqSettings,
    pub delay: DelaySettings,
    pub delay_gains: WetDry,
    pub reverb_gains: WetDry,
}

impl From<&EffectsState> for StageParams {
    fn from(effects: &EffectsState) -> Self {
        Self {
            eq: effects.eq,
            delay: effects.delay,
            delay_gains: effects.delay.gains(),
            reverb_gains: effects.reverb.gains(),
        }
    }
}

/// One-pole smoothed gain
struct SmoothedGain {
    current: f32,
    target: f32,
    coeff: f32,
}

impl SmoothedGain {
    fn new(value: f32, sample_rate: f32) -> Self {
        Self {
            current: value,
            target: value,
            coeff: 1.0 - (-1.0 / (SMOOTHING_S * sample_rate)).exp(),
        }
    }

    fn set(&mut self, target: f32) {
        self.target = target;
    }

    #[inline]
    fn next(&mut self) -> f32 {
        self.current += (self.target - self.current) * self.coeff;
        if (self.target - self.current).abs() < 1e-6 {
            self.current = self.target;
        }
        self.current
    }
}

/// Wet/dry pair of a parallel stage
struct StageMix {
    dry: SmoothedGain,
    wet: SmoothedGain,
}

impl StageMix {
    fn new(gains: WetDry, sample_rate: f32) -> Self {
        Self {
            dry: SmoothedGain::new(gains.dry, sample_rate),
            wet: SmoothedGain::new(gains.wet, sample_rate),
        }
    }

    fn set(&mut self, gains: WetDry) {
        self.dry.set(gains.dry);
        self.wet.set(gains.wet);
    }

    #[inline]
    fn mix(&mut self, dry: (f32, f32), wet: (f32, f32)) -> (f32, f32) {
        let (d, w) = (self.dry.next(), self.wet.next());
        (dry.0 * d + wet.0 * w, dry.1 * d + wet.1 * w)
    }
}

/// EQ -> delay -> reverb -> master -> analysis -> {output, recording}
pub struct GraphEngine {
    commands: Receiver<GraphCommand>,
    frames: Arc<AtomicU64>,
    frame: u64,
    /// Not yet started, latest start first
    pending: Vec<Box<Voice>>,
    active: Vec<Box<Voice>>,
    eq: ThreeBandEq,
    delay: StereoDelay,
    delay_mix: StageMix,
    reverb: Option<Box<Convolver>>,
    reverb_mix: StageMix,
    master: SmoothedGain,
    analysis: AnalysisTap,
    meter: Arc<MeterState>,
    record_tx: Sender<Vec<f32>>,
    record_block: Vec<f32>,
    silenced: bool,
}

pub(crate) struct EngineParts {
    pub sample_rate: f32,
    pub commands: Receiver<GraphCommand>,
    pub frames: Arc<AtomicU64>,
    pub meter: Arc<MeterState>,
    pub record_tx: Sender<Vec<f32>>,
    pub params: StageParams,
    pub reverb: Option<Box<Convolver>>,
}

impl GraphEngine {
    pub(crate) fn new(parts: EngineParts) -> Self {
        let EngineParts { sample_rate, commands, frames, meter, record_tx, params, reverb } = parts;
        Self {
            commands,
            frame: frames.load(Ordering::Acquire),
            frames,
            pending: Vec::new(),
            active: Vec::new(),
            eq: ThreeBandEq::new(&params.eq, sample_rate),
            delay: StereoDelay::new(&params.delay, sample_rate),
            delay_mix: StageMix::new(params.delay_gains, sample_rate),
            reverb,
            reverb_mix: StageMix::new(params.reverb_gains, sample_rate),
            master: SmoothedGain::new(1.0, sample_rate),
            analysis: AnalysisTap::new(),
            meter,
            record_tx,
            record_block: Vec::new(),
            silenced: false,
        }
    }

    /// Absolute frame index of the next frame to render
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn active_voices(&self) -> usize {
        self.active.len()
    }

    pub fn pending_voices(&self) -> usize {
        self.pending.len()
    }

    pub fn is_silenced(&self) -> bool {
        self.silenced
    }

    /// Fill one interleaved output buffer
    pub fn process(&mut self, data: &mut [f32], channels: usize) {
        self.drain_commands();

        if self.silenced || channels == 0 {
            data.fill(0.0);
            return;
        }

        for out in data.chunks_mut(channels) {
            let (left, right) = self.next_frame();
            match out {
                [mono] => *mono = 0.5 * (left + right),
                [l, r, rest @ ..] => {
                    *l = left;
                    *r = right;
                    rest.fill(0.0);
                }
                [] => {}
            }
        }

        self.analysis.publish(&self.meter);
        self.flush_recording();
        self.frames.store(self.frame, Ordering::Release);
    }

    fn next_frame(&mut self) -> (f32, f32) {
        let frame = self.frame;
        while self.pending.last().is_some_and(|v| v.start_frame() <= frame) {
            if let Some(voice) = self.pending.pop() {
                self.active.push(voice);
            }
        }

        let (mut left, mut right) = (0.0, 0.0);
        for voice in &mut self.active {
            let (l, r) = voice.render(frame);
            left += l;
            right += r;
        }
        self.active.retain(|v| !v.is_finished(frame + 1));

        let dry = self.eq.process(left, right);
        let echo = self.delay.process(dry.0, dry.1);
        let delayed = self.delay_mix.mix(dry, echo);

        let wet = match self.reverb.as_mut() {
            Some(convolver) => convolver.process(delayed.0, delayed.1),
            None => (0.0, 0.0),
        };
        let (left, right) = self.reverb_mix.mix(delayed, wet);

        let master = self.master.next();
        let (left, right) = (left * master, right * master);

        self.analysis.push(left, right);
        self.record_block.push(left);
        self.record_block.push(right);
        self.frame += 1;
        (left, right)
    }

    fn flush_recording(&mut self) {
        if self.record_block.is_empty() {
            return;
        }
        // Nobody draining: drop the block instead of blocking the callback
        if self.record_tx.is_full() {
            self.record_block.clear();
            return;
        }
        let capacity = self.record_block.len();
        let block = std::mem::replace(&mut self.record_block, Vec::with_capacity(capacity));
        let _ = self.record_tx.try_send(block);
    }

    fn drain_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(command) => self.apply(command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.silence();
                    break;
                }
            }
        }
    }

    fn apply(&mut self, command: GraphCommand) {
        match command {
            GraphCommand::StartVoice(voice) => {
                if voice.is_finished(self.frame) {
                    return;
                }
                let at = self.pending.partition_point(|p| p.start_frame() > voice.start_frame());
                self.pending.insert(at, voice);
            }
            GraphCommand::CancelPending => self.pending.clear(),
            GraphCommand::Params(params) => {
                self.eq.set(&params.eq);
                self.delay.set(&params.delay);
                self.delay_mix.set(params.delay_gains);
                self.reverb_mix.set(params.reverb_gains);
            }
            GraphCommand::Impulse(convolver) => self.reverb = Some(convolver),
            GraphCommand::MasterGain(gain) => self.master.set(gain.max(0.0)),
            GraphCommand::Teardown => self.silence(),
        }
    }

    fn silence(&mut self) {
        self.pending.clear();
        self.active.clear();
        self.delay.clear();
        self.reverb = None;
        self.silenced = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothed_gain_converges_without_jump() {
        let mut gain = SmoothedGain::new(0.0, 1000.0);
        gain.set(1.0);
        let first = gain.next();
        assert!(first > 0.0 && first < 0.2);
        let settled = (0..200).map(|_| gain.next()).last().unwrap_or_default();
        assert_eq!(settled, 1.0);
    }

    #[test]
    fn test_stage_mix_bypass_passes_dry() {
        let mut mix = StageMix::new(WetDry::BYPASS, 1000.0);
        assert_eq!(mix.mix((0.3, -0.3), (5.0, 5.0)), (0.3, -0.3));
    }
}
