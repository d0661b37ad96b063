//! Transport: drives the scheduler from a worker thread on the lookahead period

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use orrery_core::{Clock, Note, PlaybackSettings, Renderer, Scheduler, Snapshot, Transform};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cell::LiveCell;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to spawn scheduler thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Scheduler lock poisoned")]
    Poisoned,
}

/// Host-editable state, read fresh on every tick
#[derive(Debug, Default)]
pub struct Session {
    pub notes: LiveCell<Vec<Note>>,
    pub transform: LiveCell<Transform>,
    pub settings: LiveCell<PlaybackSettings>,
}

impl Session {
    pub fn new(notes: Vec<Note>, transform: Transform, settings: PlaybackSettings) -> Self {
        Self {
            notes: LiveCell::new(notes),
            transform: LiveCell::new(transform),
            settings: LiveCell::new(settings),
        }
    }
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the scheduler and its tick thread
pub struct Transport<C: Clock + 'static, R: Renderer + 'static> {
    scheduler: Arc<Mutex<Scheduler<C, R>>>,
    session: Arc<Session>,
    worker: Option<Worker>,
}

impl<C: Clock + 'static, R: Renderer + 'static> Transport<C, R> {
    pub fn new(scheduler: Scheduler<C, R>, session: Arc<Session>) -> Self {
        Self {
            scheduler: Arc::new(Mutex::new(scheduler)),
            session,
            worker: None,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Lock the scheduler for inspection or direct control
    pub fn scheduler(&self) -> Result<MutexGuard<'_, Scheduler<C, R>>, TransportError> {
        self.scheduler.lock().map_err(|_| TransportError::Poisoned)
    }

    /// Start playback and the tick thread. Returns false when the clock is
    /// not ready yet; calling it while running is a no-op.
    pub fn start(&mut self) -> Result<bool, TransportError> {
        if self.worker.is_some() {
            return Ok(true);
        }

        {
            let settings = self.session.settings.load();
            let mut scheduler = self.scheduler()?;
            if !scheduler.start(&settings) {
                return Ok(false);
            }
            tick_once(&mut scheduler, &self.session);
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let scheduler = self.scheduler.clone();
        let session = self.session.clone();
        let spawned = thread::Builder::new().name("orrery-scheduler".into()).spawn(move || {
            loop {
                let period = match scheduler.lock() {
                    Ok(s) => Duration::from_secs_f64(s.lookahead()),
                    Err(_) => break,
                };
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                match scheduler.lock() {
                    Ok(mut s) => tick_once(&mut s, &session),
                    Err(_) => {
                        warn!("Scheduler lock poisoned, tick thread exiting");
                        break;
                    }
                }
            }
            debug!("Tick thread stopped");
        });

        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker { stop_tx, handle });
                info!("Transport started");
                Ok(true)
            }
            Err(e) => {
                let settings = self.session.settings.load();
                self.scheduler()?.stop(&settings);
                Err(e.into())
            }
        }
    }

    /// Stop the tick thread, then the scheduler. No-op when stopped.
    pub fn stop(&mut self) -> Result<(), TransportError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        let _ = worker.stop_tx.send(());
        if worker.handle.join().is_err() {
            warn!("Tick thread panicked");
        }
        let settings = self.session.settings.load();
        self.scheduler()?.stop(&settings);
        info!("Transport stopped");
        Ok(())
    }

    /// Replace the note list; the walk restarts at the first step
    pub fn replace_notes(&self, notes: Vec<Note>) -> Result<(), TransportError> {
        let mut scheduler = self.scheduler()?;
        self.session.notes.store(notes);
        scheduler.reset_sequence();
        Ok(())
    }

    pub fn update_settings(&self, edit: impl Fn(&mut PlaybackSettings)) {
        self.session.settings.update(edit);
    }

    pub fn update_transform(&self, edit: impl Fn(&mut Transform)) {
        self.session.transform.update(edit);
    }

    /// Sound the current notes together once; works while stopped
    pub fn play_chord(&self) -> Result<usize, TransportError> {
        let notes = self.session.notes.load();
        let transform = self.session.transform.load();
        let settings = self.session.settings.load();
        Ok(self.scheduler()?.play_chord(&notes, &transform, &settings))
    }
}

impl<C: Clock + 'static, R: Renderer + 'static> Drop for Transport<C, R> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "Transport stop failed during drop");
        }
    }
}

fn tick_once<C: Clock, R: Renderer>(scheduler: &mut Scheduler<C, R>, session: &Session) {
    let notes = session.notes.load();
    let transform = session.transform.load();
    let settings = session.settings.load();
    scheduler.tick(&Snapshot {
        notes: &notes,
        transform: &transform,
        settings: &settings,
    });
}
