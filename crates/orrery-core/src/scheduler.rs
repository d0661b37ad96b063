//! Lookahead scheduler
//!
//! The scheduler never renders "now". It keeps `next_event_time` in the clock's
//! domain and, on every tick, submits every step that starts before
//! `now + horizon`. Ticks may jitter by tens of milliseconds without moving
//! a single note, because the renders themselves are timestamped.

use tracing::{debug, info};

use crate::clock::Clock;
use crate::events::{EventSink, NullSink, PlayingNotesChange};
use crate::note::{live_note, LiveNote, Note, Transform};
use crate::render::{Renderer, ScheduledVoice, VoiceBatch};
use crate::rhythm::{step_timing, RepeatMode};
use crate::sequence::{SequenceInterpreter, Step};
use crate::settings::PlaybackSettings;

/// Gap between `start()` and the first scheduled step
pub const START_OFFSET_S: f64 = 0.1;
/// Gap between `play_chord()` and the chord
pub const CHORD_OFFSET_S: f64 = 0.01;
/// Upper bound on steps submitted by a single tick
pub const MAX_STEPS_PER_TICK: usize = 512;
/// Fraction of a voice's slot after which its highlight is cleared
const HIGHLIGHT_FRACTION: f64 = 0.9;

/// Read-only view of the host's state for one tick
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub notes: &'a [Note],
    pub transform: &'a Transform,
    pub settings: &'a PlaybackSettings,
}

/// Scheduler-private timing state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineState {
    pub next_event_time: f64,
    pub step_cursor: usize,
    pub flow_cursor: usize,
    pub lookahead_ms: f64,
    pub horizon_s: f64,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            next_event_time: 0.0,
            step_cursor: 0,
            flow_cursor: 0,
            lookahead_ms: crate::settings::DEFAULT_LOOKAHEAD_MS,
            horizon_s: crate::settings::DEFAULT_HORIZON_S,
        }
    }
}

#[derive(Debug, Clone)]
struct HighlightCue {
    at: f64,
    change: PlayingNotesChange,
}

/// Walks the step list ahead of the clock and hands voices to a renderer
pub struct Scheduler<C: Clock, R: Renderer> {
    clock: C,
    renderer: R,
    sink: Box<dyn EventSink>,
    interpreter: SequenceInterpreter,
    state: EngineState,
    running: bool,
    cues: Vec<HighlightCue>,
}

impl<C: Clock, R: Renderer> Scheduler<C, R> {
    pub fn new(clock: C, renderer: R) -> Self {
        Self {
            clock,
            renderer,
            sink: Box::new(NullSink),
            interpreter: SequenceInterpreter::new(),
            state: EngineState::default(),
            running: false,
            cues: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn with_interpreter(mut self, interpreter: SequenceInterpreter) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn set_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sink = sink;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Start playback. Returns whether the scheduler is running afterwards;
    /// refuses (returns false) while the clock is unavailable.
    pub fn start(&mut self, settings: &PlaybackSettings) -> bool {
        if self.running {
            return true;
        }
        let Some(now) = self.clock.now() else {
            debug!("Clock not ready, start ignored");
            return false;
        };

        self.state = EngineState {
            next_event_time: now + START_OFFSET_S,
            step_cursor: 0,
            flow_cursor: 0,
            lookahead_ms: settings.lookahead_s() * 1000.0,
            horizon_s: settings.horizon(),
        };
        self.cues.clear();
        self.running = true;
        self.renderer.transport_boundary(settings);
        info!(at = now, tempo = settings.tempo(), "Scheduler started");
        true
    }

    /// Stop playback; a no-op when already stopped
    pub fn stop(&mut self, settings: &PlaybackSettings) {
        if !self.running {
            return;
        }
        self.running = false;
        self.state = EngineState {
            lookahead_ms: self.state.lookahead_ms,
            horizon_s: self.state.horizon_s,
            ..EngineState::default()
        };
        self.cues.clear();
        self.sink.on_playing_notes_change(&PlayingNotesChange::Clear);
        self.renderer.transport_boundary(settings);
        info!("Scheduler stopped");
    }

    /// The note list was replaced wholesale: restart the walk from the top
    pub fn reset_sequence(&mut self) {
        self.interpreter.regenerate();
        self.state.step_cursor = 0;
        self.state.flow_cursor = 0;
        if self.running {
            if let Some(now) = self.clock.now() {
                self.state.next_event_time = self.state.next_event_time.max(now + START_OFFSET_S);
            }
        }
    }

    /// Explicitly rebuild the step list (re-shuffles random order)
    pub fn regenerate_sequence(&mut self) {
        self.interpreter.regenerate();
    }

    /// Seconds until the next tick should run
    pub fn lookahead(&self) -> f64 {
        self.state.lookahead_ms / 1000.0
    }

    /// Submit every step due within the horizon. Returns the number of voices
    /// rendered.
    pub fn tick(&mut self, snapshot: &Snapshot<'_>) -> usize {
        if !self.running {
            return 0;
        }
        let Some(now) = self.clock.now() else {
            return 0;
        };

        let settings = snapshot.settings;
        self.state.lookahead_ms = settings.lookahead_s() * 1000.0;
        self.state.horizon_s = settings.horizon();
        self.flush_cues(now);

        let live: Vec<LiveNote> = snapshot
            .notes
            .iter()
            .map(|n| live_note(n, snapshot.transform))
            .collect();
        let steps = self
            .interpreter
            .steps(settings.order_mode, live.len(), settings.cycle_length)
            .to_vec();

        let horizon_end = now + self.state.horizon_s;
        let mut rendered = 0;
        let mut scheduled = 0;

        while self.state.next_event_time < horizon_end && scheduled < MAX_STEPS_PER_TICK {
            if !steps.is_empty() {
                self.state.step_cursor %= steps.len();
            }
            let (advance, voices) = self.schedule_step(&steps, &live, settings);
            rendered += voices;
            self.state.next_event_time += advance;
            self.state.step_cursor = match steps.len() {
                0 => 0,
                len => (self.state.step_cursor + 1) % len,
            };
            scheduled += 1;
        }

        if scheduled == MAX_STEPS_PER_TICK {
            debug!(scheduled, "Step limit reached for this tick");
        }
        rendered
    }

    /// Sound `notes` together once, outside the loop
    pub fn play_chord(&mut self, notes: &[Note], transform: &Transform, settings: &PlaybackSettings) -> usize {
        let Some(now) = self.clock.now() else {
            return 0;
        };
        let live: Vec<LiveNote> = notes.iter().map(|n| live_note(n, transform)).collect();
        let indices: Vec<usize> = (0..live.len()).collect();
        self.trigger(&indices, &live, now + CHORD_OFFSET_S, settings.beat_duration(), settings, false)
    }

    /// Render the step at the cursor; returns (time advance, voices rendered)
    fn schedule_step(&mut self, steps: &[Step], live: &[LiveNote], settings: &PlaybackSettings) -> (f64, usize) {
        let beat = settings.beat_duration();
        let Some(step) = steps.get(self.state.step_cursor) else {
            return (beat, 0);
        };

        let subdivision = self.resolve_subdivision(step, live, settings);
        let Some(timing) = step_timing(settings.tempo(), subdivision, settings.repeat_mode) else {
            debug!(subdivision, "Non-positive subdivision, advancing one beat");
            return (beat, 0);
        };

        let start = self.state.next_event_time;
        let mut rendered = 0;

        match settings.repeat_mode {
            RepeatMode::Off | RepeatMode::Ratchet => {
                for k in 0..timing.repeats {
                    let at = start + k as f64 * timing.spacing;
                    rendered += self.trigger(step.indices(), live, at, timing.spacing, settings, true);
                }
            }
            RepeatMode::Flow => {
                if !matches!(step, Step::Rest) && !live.is_empty() {
                    for k in 0..timing.repeats {
                        let index = self.state.flow_cursor % live.len();
                        self.state.flow_cursor = (index + 1) % live.len();
                        let at = start + k as f64 * timing.spacing;
                        rendered += self.trigger(&[index], live, at, timing.spacing, settings, true);
                    }
                }
            }
        }

        (timing.slot, rendered)
    }

    /// Pattern entry, else the (first) note's own subdivision, else the global one
    fn resolve_subdivision(&self, step: &Step, live: &[LiveNote], settings: &PlaybackSettings) -> f64 {
        if let Some(subdivision) = settings.rhythm_pattern.subdivision_at(self.state.step_cursor) {
            return subdivision;
        }
        step.indices()
            .first()
            .filter(|_| !live.is_empty())
            .and_then(|&i| live[i % live.len()].rhythm_subdivision)
            .unwrap_or(settings.global_subdivision)
    }

    fn trigger(
        &mut self,
        indices: &[usize],
        live: &[LiveNote],
        time: f64,
        duration: f64,
        settings: &PlaybackSettings,
        highlight: bool,
    ) -> usize {
        if live.is_empty() {
            return 0;
        }
        let playable: Vec<&LiveNote> = indices
            .iter()
            .map(|&i| &live[i % live.len()])
            .filter(|n| n.is_playable())
            .collect();
        if playable.is_empty() {
            return 0;
        }

        let volume = if playable.len() > 1 {
            1.0 / (playable.len() as f32).sqrt()
        } else {
            1.0
        };
        let arpeggio_delay = settings.arpeggio_delay_s();

        let batch = VoiceBatch {
            time,
            arpeggio_delay,
            voices: playable
                .iter()
                .enumerate()
                .map(|(k, note)| ScheduledVoice {
                    note: (*note).clone(),
                    time: time + k as f64 * arpeggio_delay,
                    duration,
                    volume,
                })
                .collect(),
        };

        self.renderer.render(&batch, settings);
        for voice in &batch.voices {
            self.sink.on_note_played(&voice.note, voice.time, voice.duration);
        }

        if highlight {
            let ids: Vec<_> = batch.voices.iter().map(|v| v.note.id).collect();
            self.cues.push(HighlightCue {
                at: time,
                change: PlayingNotesChange::Replace(ids.clone()),
            });
            self.cues.push(HighlightCue {
                at: time + duration * HIGHLIGHT_FRACTION,
                change: PlayingNotesChange::Remove(ids),
            });
        }

        batch.voices.len()
    }

    fn flush_cues(&mut self, now: f64) {
        if self.cues.is_empty() {
            return;
        }
        let (mut due, pending): (Vec<HighlightCue>, Vec<HighlightCue>) =
            std::mem::take(&mut self.cues).into_iter().partition(|c| c.at <= now);
        self.cues = pending;
        due.sort_by(|a, b| a.at.total_cmp(&b.at));
        for cue in due {
            self.sink.on_playing_notes_change(&cue.change);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::clock::ManualClock;
    use crate::note::NoteId;
    use crate::rhythm::{RhythmPattern, MAX_REPEATS};
    use crate::sequence::{OrderMode, PickingPattern};

    #[derive(Clone, Default)]
    struct RecordingRenderer {
        batches: Arc<Mutex<Vec<VoiceBatch>>>,
        boundaries: Arc<Mutex<usize>>,
    }

    impl RecordingRenderer {
        fn batches(&self) -> Vec<VoiceBatch> {
            self.batches.lock().unwrap().clone()
        }

        fn voices(&self) -> Vec<ScheduledVoice> {
            self.batches().into_iter().flat_map(|b| b.voices).collect()
        }

        fn ids(&self) -> Vec<u64> {
            self.voices().iter().map(|v| v.note.id.0).collect()
        }

        fn boundaries(&self) -> usize {
            *self.boundaries.lock().unwrap()
        }
    }

    impl Renderer for RecordingRenderer {
        fn render(&mut self, batch: &VoiceBatch, _settings: &PlaybackSettings) {
            self.batches.lock().unwrap().push(batch.clone());
        }

        fn transport_boundary(&mut self, _settings: &PlaybackSettings) {
            *self.boundaries.lock().unwrap() += 1;
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Played(u64, f64),
        Change(PlayingNotesChange),
    }

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<Event>>>);

    impl RecordingSink {
        fn events(&self) -> Vec<Event> {
            self.0.lock().unwrap().clone()
        }

        fn played(&self) -> usize {
            self.events().iter().filter(|e| matches!(e, Event::Played(..))).count()
        }
    }

    impl EventSink for RecordingSink {
        fn on_note_played(&mut self, note: &LiveNote, scheduled_time: f64, _duration: f64) {
            self.0.lock().unwrap().push(Event::Played(note.id.0, scheduled_time));
        }

        fn on_playing_notes_change(&mut self, change: &PlayingNotesChange) {
            self.0.lock().unwrap().push(Event::Change(change.clone()));
        }
    }

    fn notes(count: usize) -> Vec<Note> {
        (0..count)
            .map(|i| Note::new(i as u64, 220.0 * (i + 1) as f64, 100))
            .collect()
    }

    fn setup() -> (Scheduler<ManualClock, RecordingRenderer>, ManualClock, RecordingRenderer, RecordingSink) {
        let clock = ManualClock::new(0.0);
        let renderer = RecordingRenderer::default();
        let sink = RecordingSink::default();
        let scheduler = Scheduler::new(clock.clone(), renderer.clone())
            .with_sink(sink.clone())
            .with_interpreter(SequenceInterpreter::with_seed(1));
        (scheduler, clock, renderer, sink)
    }

    fn tick_at(
        scheduler: &mut Scheduler<ManualClock, RecordingRenderer>,
        clock: &ManualClock,
        now: f64,
        notes: &[Note],
        settings: &PlaybackSettings,
    ) -> usize {
        clock.set(now);
        let transform = Transform::default();
        scheduler.tick(&Snapshot { notes, transform: &transform, settings })
    }

    #[test]
    fn test_single_step_duration() {
        let (mut scheduler, clock, renderer, _) = setup();
        let settings = PlaybackSettings { global_subdivision: 2.0, ..Default::default() };
        let notes = notes(1);

        assert!(scheduler.start(&settings));
        assert_eq!(tick_at(&mut scheduler, &clock, 0.0, &notes, &settings), 0);
        assert_eq!(tick_at(&mut scheduler, &clock, 0.05, &notes, &settings), 1);

        let voices = renderer.voices();
        assert_eq!(voices[0].time, 0.1);
        assert_eq!(voices[0].duration, 0.25);
        assert!((scheduler.state().next_event_time - 0.35).abs() < 1e-12);
    }

    #[test]
    fn test_reverse_order_walk() {
        let (mut scheduler, clock, renderer, _) = setup();
        let settings = PlaybackSettings {
            order_mode: OrderMode::Reverse,
            cycle_length: 4,
            ..Default::default()
        };
        let notes = notes(4);
        scheduler.start(&settings);
        // Steps at 0.1, 0.6, 1.1, 1.6 all fall inside the horizon
        tick_at(&mut scheduler, &clock, 1.55, &notes, &settings);
        assert_eq!(renderer.ids(), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_ratchet_repeats_within_slot() {
        let (mut scheduler, clock, renderer, _) = setup();
        let settings = PlaybackSettings {
            global_subdivision: 3.0,
            repeat_mode: RepeatMode::Ratchet,
            ..Default::default()
        };
        let notes = notes(2);
        scheduler.start(&settings);
        tick_at(&mut scheduler, &clock, 0.05, &notes, &settings);

        let voices = renderer.voices();
        assert_eq!(voices.len(), 3);
        assert!(voices.iter().all(|v| v.note.id == NoteId(0)));
        let single = 0.5 / 3.0;
        for (k, voice) in voices.iter().enumerate() {
            assert!((voice.time - (0.1 + k as f64 * single)).abs() < 1e-12);
        }
        assert!((scheduler.state().next_event_time - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_flow_walks_document_order_across_cycles() {
        let (mut scheduler, clock, renderer, _) = setup();
        let settings = PlaybackSettings {
            global_subdivision: 2.0,
            repeat_mode: RepeatMode::Flow,
            ..Default::default()
        };
        let notes = notes(4);
        scheduler.start(&settings);
        // Slots are 0.5s: steps at 0.1 and 0.6
        tick_at(&mut scheduler, &clock, 0.9, &notes, &settings);
        assert_eq!(renderer.ids(), vec![0, 1, 2, 3]);
        tick_at(&mut scheduler, &clock, 1.4, &notes, &settings);
        assert_eq!(renderer.ids(), vec![0, 1, 2, 3, 0, 1]);
    }

    #[test]
    fn test_restart_resets_flow_cursor() {
        let (mut scheduler, clock, renderer, _) = setup();
        let settings = PlaybackSettings {
            global_subdivision: 3.0,
            repeat_mode: RepeatMode::Flow,
            ..Default::default()
        };
        let notes = notes(5);
        scheduler.start(&settings);
        tick_at(&mut scheduler, &clock, 0.05, &notes, &settings);
        assert_eq!(renderer.ids(), vec![0, 1, 2]);

        scheduler.stop(&settings);
        clock.set(2.0);
        scheduler.start(&settings);
        tick_at(&mut scheduler, &clock, 2.05, &notes, &settings);
        assert_eq!(renderer.ids(), vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_start_stop_idempotent() {
        let (mut scheduler, clock, renderer, sink) = setup();
        let settings = PlaybackSettings::default();
        assert!(scheduler.start(&settings));
        let state = scheduler.state();
        clock.set(0.5);
        assert!(scheduler.start(&settings));
        assert_eq!(scheduler.state(), state);
        assert_eq!(renderer.boundaries(), 1);

        scheduler.stop(&settings);
        scheduler.stop(&settings);
        assert!(!scheduler.is_running());
        assert_eq!(renderer.boundaries(), 2);
        assert_eq!(sink.events(), vec![Event::Change(PlayingNotesChange::Clear)]);
    }

    #[test]
    fn test_refuses_start_without_clock() {
        let renderer = RecordingRenderer::default();
        let clock = ManualClock::not_ready();
        let mut scheduler = Scheduler::new(clock.clone(), renderer.clone());
        assert!(!scheduler.start(&PlaybackSettings::default()));
        assert!(!scheduler.is_running());
        assert_eq!(renderer.boundaries(), 0);
    }

    #[test]
    fn test_clock_loss_mid_run_is_silent() {
        let (mut scheduler, clock, renderer, _) = setup();
        let settings = PlaybackSettings::default();
        let notes = notes(2);
        scheduler.start(&settings);
        clock.make_unavailable();
        let transform = Transform::default();
        let rendered = scheduler.tick(&Snapshot { notes: &notes, transform: &transform, settings: &settings });
        assert_eq!(rendered, 0);
        assert!(scheduler.is_running());
        assert!(renderer.batches().is_empty());
    }

    #[test]
    fn test_cluster_voices_share_time_without_arpeggio() {
        let (mut scheduler, clock, renderer, _) = setup();
        let settings = PlaybackSettings {
            order_mode: OrderMode::Picking(PickingPattern::Strum),
            ..Default::default()
        };
        let notes = notes(3);
        scheduler.start(&settings);
        tick_at(&mut scheduler, &clock, 0.05, &notes, &settings);

        let batch = &renderer.batches()[0];
        assert_eq!(batch.voices.len(), 3);
        assert!(batch.voices.iter().all(|v| v.time == 0.1));
        let expected = 1.0 / 3.0_f32.sqrt();
        assert!(batch.voices.iter().all(|v| (v.volume - expected).abs() < 1e-6));
    }

    #[test]
    fn test_cluster_arpeggio_offsets() {
        let (mut scheduler, clock, renderer, _) = setup();
        let settings = PlaybackSettings {
            order_mode: OrderMode::Picking(PickingPattern::Strum),
            arpeggio_delay_ms: 20.0,
            ..Default::default()
        };
        let notes = notes(3);
        scheduler.start(&settings);
        tick_at(&mut scheduler, &clock, 0.05, &notes, &settings);

        let batch = &renderer.batches()[0];
        for (k, voice) in batch.voices.iter().enumerate() {
            assert!((voice.time - (0.1 + k as f64 * 0.02)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_silent_voice_in_cluster() {
        let (mut scheduler, clock, renderer, sink) = setup();
        let settings = PlaybackSettings {
            order_mode: OrderMode::Picking(PickingPattern::Strum),
            ..Default::default()
        };
        let mut notes = notes(2);
        notes[0].velocity = 0;
        scheduler.start(&settings);
        tick_at(&mut scheduler, &clock, 0.05, &notes, &settings);

        let voices = renderer.voices();
        assert_eq!(voices.len(), 1);
        assert_eq!(voices[0].note.id, NoteId(1));
        assert_eq!(voices[0].volume, 1.0);
        assert_eq!(sink.played(), 1);
    }

    #[test]
    fn test_non_positive_subdivision_advances_one_beat() {
        let (mut scheduler, clock, renderer, _) = setup();
        let settings = PlaybackSettings {
            rhythm_pattern: RhythmPattern::new(vec![-1.0]),
            ..Default::default()
        };
        let notes = notes(2);
        scheduler.start(&settings);
        tick_at(&mut scheduler, &clock, 0.05, &notes, &settings);
        assert!(renderer.batches().is_empty());
        assert!((scheduler.state().next_event_time - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_empty_sequence_advances_one_beat() {
        let (mut scheduler, clock, renderer, _) = setup();
        let settings = PlaybackSettings { tempo_bpm: 60.0, ..Default::default() };
        scheduler.start(&settings);
        tick_at(&mut scheduler, &clock, 0.05, &[], &settings);
        assert!(renderer.batches().is_empty());
        assert!((scheduler.state().next_event_time - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_pattern_overrides_note_subdivision() {
        let (mut scheduler, clock, renderer, _) = setup();
        let settings = PlaybackSettings {
            rhythm_pattern: RhythmPattern::new(vec![4.0, 1.0]),
            ..Default::default()
        };
        let notes = vec![Note::new(0, 220.0, 100).with_subdivision(2.0), Note::new(1, 330.0, 100)];
        scheduler.start(&settings);
        tick_at(&mut scheduler, &clock, 0.2, &notes, &settings);
        let voices = renderer.voices();
        assert_eq!(voices[0].duration, 0.125);
        assert_eq!(voices[1].duration, 0.5);
    }

    #[test]
    fn test_note_subdivision_used_without_pattern() {
        let (mut scheduler, clock, renderer, _) = setup();
        let settings = PlaybackSettings::default();
        let notes = vec![Note::new(0, 220.0, 100).with_subdivision(4.0)];
        scheduler.start(&settings);
        tick_at(&mut scheduler, &clock, 0.05, &notes, &settings);
        assert_eq!(renderer.voices()[0].duration, 0.125);
    }

    #[test]
    fn test_cursor_clamped_when_sequence_shrinks() {
        let (mut scheduler, clock, renderer, _) = setup();
        let settings = PlaybackSettings::default();
        let four = notes(4);
        scheduler.start(&settings);
        tick_at(&mut scheduler, &clock, 0.65, &four, &settings);
        assert_eq!(scheduler.state().step_cursor, 2);

        let one = notes(1);
        tick_at(&mut scheduler, &clock, 1.05, &one, &settings);
        assert_eq!(renderer.ids(), vec![0, 1, 0]);
        assert_eq!(scheduler.state().step_cursor, 0);
    }

    #[test]
    fn test_highlights_follow_the_clock() {
        let (mut scheduler, clock, _, sink) = setup();
        let settings = PlaybackSettings::default();
        let notes = notes(1);
        scheduler.start(&settings);
        tick_at(&mut scheduler, &clock, 0.05, &notes, &settings);
        tick_at(&mut scheduler, &clock, 0.2, &notes, &settings);
        tick_at(&mut scheduler, &clock, 0.56, &notes, &settings);

        let changes: Vec<Event> = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::Change(_)))
            .collect();
        assert_eq!(
            changes,
            vec![
                Event::Change(PlayingNotesChange::Replace(vec![NoteId(0)])),
                Event::Change(PlayingNotesChange::Remove(vec![NoteId(0)])),
            ]
        );

        scheduler.stop(&settings);
        assert_eq!(sink.events().last(), Some(&Event::Change(PlayingNotesChange::Clear)));
    }

    #[test]
    fn test_play_chord_outside_loop() {
        let (mut scheduler, clock, renderer, sink) = setup();
        clock.set(3.0);
        let settings = PlaybackSettings::default();
        let rendered = scheduler.play_chord(&notes(3), &Transform::default(), &settings);
        assert_eq!(rendered, 3);
        let batch = &renderer.batches()[0];
        assert!(batch.voices.iter().all(|v| (v.time - 3.01).abs() < 1e-12));
        assert!(batch.voices.iter().all(|v| v.duration == 0.5));
        assert_eq!(sink.played(), 3);
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_ratchet_step_is_bounded() {
        let (mut scheduler, clock, renderer, _) = setup();
        let settings = PlaybackSettings {
            global_subdivision: 1.0e7,
            repeat_mode: RepeatMode::Ratchet,
            horizon_s: 1.0e-9,
            ..Default::default()
        };
        let notes = notes(1);
        scheduler.start(&settings);
        tick_at(&mut scheduler, &clock, 0.1, &notes, &settings);
        assert_eq!(renderer.batches().len(), MAX_REPEATS);
    }

    #[test]
    fn test_tick_is_bounded() {
        let (mut scheduler, clock, renderer, _) = setup();
        let settings = PlaybackSettings { global_subdivision: 1.0e9, ..Default::default() };
        let notes = notes(1);
        scheduler.start(&settings);
        tick_at(&mut scheduler, &clock, 0.05, &notes, &settings);
        assert_eq!(renderer.batches().len(), MAX_STEPS_PER_TICK);
    }
}
