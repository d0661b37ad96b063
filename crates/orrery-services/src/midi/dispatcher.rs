//! Timed MIDI dispatch thread
//!
//! Renders arrive ahead of time; the dispatcher holds them in a time-ordered
//! queue and writes each one to the port when its timestamp comes due.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::cmp::Reverse;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use super::device::MidiPort;
use super::wire::{all_notes_off, Message};
use crate::clock::MonotonicClock;

/// Longest sleep while the queue is empty
const IDLE_WAIT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    NoteOn,
    NoteOff,
    Control,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchCommand {
    Send { at: f64, kind: MessageKind, bytes: Message },
    /// Transport start/stop on `channel`
    Boundary { channel: u8 },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TimedMessage {
    pub at: f64,
    pub seq: u64,
    pub kind: MessageKind,
    pub bytes: Message,
}

impl Eq for TimedMessage {}

impl Ord for TimedMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.total_cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for TimedMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Time-ordered message queue; ties keep submission order
#[derive(Debug, Default)]
pub(crate) struct DispatchQueue {
    heap: BinaryHeap<Reverse<TimedMessage>>,
    seq: u64,
}

impl DispatchQueue {
    pub fn push(&mut self, at: f64, kind: MessageKind, bytes: Message) {
        if !at.is_finite() {
            return;
        }
        self.seq += 1;
        self.heap.push(Reverse(TimedMessage { at, seq: self.seq, kind, bytes }));
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn next_due(&self) -> Option<f64> {
        self.heap.peek().map(|Reverse(m)| m.at)
    }

    /// Remove and return every message due at `now`, in order
    pub fn pop_due(&mut self, now: f64) -> Vec<Message> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|Reverse(m)| m.at <= now) {
            if let Some(Reverse(m)) = self.heap.pop() {
                due.push(m.bytes);
            }
        }
        due
    }

    /// Empty the queue at a transport boundary: pending note-ons and control
    /// messages are dropped, pending note-offs are sent now, then all-notes-off
    pub fn boundary(&mut self, channel: u8) -> Vec<Message> {
        let mut flushed: Vec<TimedMessage> = self
            .heap
            .drain()
            .map(|Reverse(m)| m)
            .filter(|m| m.kind == MessageKind::NoteOff)
            .collect();
        flushed.sort();
        let mut out: Vec<Message> = flushed.into_iter().map(|m| m.bytes).collect();
        out.push(all_notes_off(channel));
        out
    }

    /// Everything still queued that must not be left hanging
    fn drain_note_offs(&mut self) -> Vec<Message> {
        let mut offs: Vec<TimedMessage> = self
            .heap
            .drain()
            .map(|Reverse(m)| m)
            .filter(|m| m.kind == MessageKind::NoteOff)
            .collect();
        offs.sort();
        offs.into_iter().map(|m| m.bytes).collect()
    }
}

/// Port wrapper that turns a failed send into a released port
struct PortSink {
    port: Option<Box<dyn MidiPort>>,
}

impl PortSink {
    fn send(&mut self, bytes: &Message) {
        let Some(port) = self.port.as_mut() else {
            return;
        };
        if let Err(e) = port.send(bytes) {
            warn!(port = %port.name(), error = %e, "MIDI send failed, releasing port");
            self.port = None;
        }
    }
}

/// Handle to the dispatch thread
pub struct Dispatcher {
    tx: Sender<DispatchCommand>,
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn the dispatcher. With no port every message is a silent no-op.
    pub fn spawn(port: Option<Box<dyn MidiPort>>, clock: MonotonicClock) -> Self {
        let (tx, rx) = unbounded();
        let handle = thread::Builder::new()
            .name("orrery-midi".into())
            .spawn(move || run(rx, PortSink { port }, clock))
            .map_err(|e| warn!(error = %e, "Failed to spawn MIDI dispatcher"))
            .ok();
        Self { tx, handle }
    }

    pub fn sender(&self) -> Sender<DispatchCommand> {
        self.tx.clone()
    }

    /// Stop the thread, sending any pending note-offs first
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.tx.send(DispatchCommand::Shutdown);
            let _ = handle.join();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.join();
    }
}

fn run(rx: Receiver<DispatchCommand>, mut sink: PortSink, clock: MonotonicClock) {
    let mut queue = DispatchQueue::default();
    loop {
        let wait = queue.next_due().map_or(IDLE_WAIT, |at| clock.until(at).min(IDLE_WAIT));
        match rx.recv_timeout(wait) {
            Ok(DispatchCommand::Send { at, kind, bytes }) => queue.push(at, kind, bytes),
            Ok(DispatchCommand::Boundary { channel }) => {
                debug!(channel, pending = queue.len(), "MIDI transport boundary");
                for bytes in queue.boundary(channel) {
                    sink.send(&bytes);
                }
            }
            Ok(DispatchCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                for bytes in queue.drain_note_offs() {
                    sink.send(&bytes);
                }
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        for bytes in queue.pop_due(clock.seconds()) {
            sink.send(&bytes);
        }
    }
    debug!("MIDI dispatcher stopped");
}
