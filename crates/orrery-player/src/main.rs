//! orrery: headless player for spatial note scenes

mod config;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use crossbeam_channel::{bounded, Receiver};
use orrery_core::{
    Clock, NoteId, OutputMode, Renderer, Scheduler, SequenceInterpreter, TransformAnimator,
};
use orrery_services::{
    list_output_devices, midi, start_device_output, AudioRenderer, ChannelSink, MonotonicClock, PlaybackEvent,
    SampleBank, Session, SignalGraph, Transport, WavRecorder,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::SessionConfig;

/// Host frame period for animation and event draining
const FRAME: Duration = Duration::from_millis(16);
/// Master fade before the graph is torn down
const FADE_OUT: Duration = Duration::from_millis(60);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Audio,
    Device,
}

#[derive(Parser)]
#[command(name = "orrery", about = "Play a spatial note scene through audio or MIDI")]
struct Cli {
    /// Session file (TOML); defaults to the user session, then a demo scene
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds to play before stopping
    #[arg(short, long, default_value_t = 16.0)]
    seconds: f64,

    /// Override the session's output backend
    #[arg(short, long, value_enum)]
    output: Option<Backend>,

    /// Audio device or MIDI port (name substring or port index)
    #[arg(short, long)]
    device: Option<String>,

    /// List audio devices and MIDI ports, then exit
    #[arg(long)]
    list_devices: bool,

    /// Record the audio output to this WAV file
    #[arg(short, long)]
    record: Option<PathBuf>,

    /// Print one cycle of the step list as JSON, then exit
    #[arg(long)]
    dump_steps: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("orrery=info".parse()?))
        .init();

    let cli = Cli::parse();

    if cli.list_devices {
        return list_devices();
    }

    let mut session = config::load(cli.config.as_deref())?;
    session.playback.validate().context("invalid playback settings")?;
    if let Some(backend) = cli.output {
        session.playback.output_mode = match backend {
            Backend::Audio => OutputMode::Audio,
            Backend::Device => OutputMode::Device,
        };
    }
    if cli.device.is_some() {
        session.playback.device = cli.device.clone();
    }

    if cli.dump_steps {
        let mut interpreter = SequenceInterpreter::new();
        let steps = interpreter.steps(
            session.playback.order_mode,
            session.notes.len(),
            session.playback.cycle_length,
        );
        println!("{}", serde_json::to_string_pretty(steps)?);
        return Ok(());
    }

    info!(
        notes = session.notes.len(),
        tempo = session.playback.tempo(),
        output = ?session.playback.output_mode,
        "Starting orrery"
    );

    let play_for = Duration::from_secs_f64(cli.seconds.max(0.0));
    match session.playback.output_mode {
        OutputMode::Audio => run_audio(session, play_for, cli.record),
        OutputMode::Device => {
            if cli.record.is_some() {
                warn!("Recording is only available with the audio backend");
            }
            run_device(session, play_for)
        }
    }
}

fn list_devices() -> anyhow::Result<()> {
    println!("Audio outputs:");
    match list_output_devices() {
        Ok(names) => names.iter().for_each(|n| println!("  {n}")),
        Err(e) => println!("  unavailable: {e}"),
    }
    println!("MIDI outputs:");
    match midi::list_output_ports() {
        Ok(names) => names.iter().enumerate().for_each(|(i, n)| println!("  {i}: {n}")),
        Err(e) => println!("  unavailable: {e}"),
    }
    Ok(())
}

fn shared_session(config: &SessionConfig) -> Arc<Session> {
    Arc::new(Session::new(config.notes.clone(), config.transform, config.playback.clone()))
}

fn run_audio(config: SessionConfig, play_for: Duration, record: Option<PathBuf>) -> anyhow::Result<()> {
    let mut graph = SignalGraph::new();
    graph.update(&config.effects);
    let stream = graph
        .connect(config.playback.device.as_deref())
        .context("opening audio output")?;

    let mut renderer = AudioRenderer::new(&graph);
    if let Some(dir) = &config.samples_dir {
        match SampleBank::load_dir(dir, stream.sample_rate()) {
            Ok(bank) => renderer = renderer.with_samples(Arc::new(bank)),
            Err(e) => warn!(error = %e, "Sample directory unusable, using oscillators"),
        }
    }

    let taps = graph.recording_taps().context("signal graph not built")?;
    let recorder = record
        .map(|path| WavRecorder::spawn(path, taps.stream.clone(), taps.sample_rate))
        .transpose()?;

    let (event_tx, event_rx) = bounded(1024);
    let scheduler = Scheduler::new(graph.clock(), renderer).with_sink(ChannelSink::new(event_tx));
    let mut transport = Transport::new(scheduler, shared_session(&config));

    start(&mut transport)?;

    play(&transport, &config, &event_rx, play_for);
    transport.stop()?;

    graph.set_master_gain(0.0);
    thread::sleep(FADE_OUT);
    if let Some(recorder) = recorder {
        let frames = recorder.finish()?;
        info!(frames, "Recording saved");
    }
    info!(peak = taps.analysis.peak(), clipped = taps.analysis.is_clipped(), "Output levels");
    graph.teardown();
    stream.stop();
    Ok(())
}

fn run_device(config: SessionConfig, play_for: Duration) -> anyhow::Result<()> {
    let clock = MonotonicClock::new();
    let (renderer, dispatcher) = start_device_output(config.playback.device.as_deref(), clock);

    let (event_tx, event_rx) = bounded(1024);
    let scheduler = Scheduler::new(clock, renderer).with_sink(ChannelSink::new(event_tx));
    let mut transport = Transport::new(scheduler, shared_session(&config));

    start(&mut transport)?;
    play(&transport, &config, &event_rx, play_for);
    transport.stop()?;
    dispatcher.shutdown();
    Ok(())
}

/// Start playback once; a clock that is not ready yet is a setup failure here
fn start<C: Clock + 'static, R: Renderer + 'static>(transport: &mut Transport<C, R>) -> anyhow::Result<()> {
    if !transport.start()? {
        anyhow::bail!("playback clock not available");
    }
    Ok(())
}

/// Animate the scene and report highlights until `play_for` elapses
fn play<C: Clock + 'static, R: Renderer + 'static>(
    transport: &Transport<C, R>,
    config: &SessionConfig,
    events: &Receiver<PlaybackEvent>,
    play_for: Duration,
) {
    let mut animator = TransformAnimator::new(&config.transform);
    let mut playing: BTreeSet<NoteId> = BTreeSet::new();
    let started = Instant::now();
    let mut last = started;

    while started.elapsed() < play_for {
        thread::sleep(FRAME);
        let now = Instant::now();
        let current = *transport.session().transform.load();
        let next = animator.advance(&current, now.duration_since(last).as_secs_f64());
        transport.update_transform(move |t| *t = next);
        last = now;

        for event in events.try_iter() {
            match event {
                PlaybackEvent::NotePlayed { id, frequency_hz, scheduled_time, .. } => {
                    debug!(id = id.0, frequency_hz, scheduled_time, "Note scheduled");
                }
                PlaybackEvent::PlayingNotes(change) => {
                    change.apply(&mut playing);
                    info!(playing = ?playing.iter().map(|id| id.0).collect::<Vec<_>>(), "Highlight");
                }
            }
        }
    }
}
