//! Error types for orrery

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrreryError {
    #[error("Invalid tempo: {0} BPM")]
    InvalidTempo(f64),
    #[error("Invalid subdivision: {0}")]
    InvalidSubdivision(f64),
    #[error("Invalid note length multiplier: {0}")]
    InvalidNoteLength(f64),
    #[error("Invalid arpeggio delay: {0} ms")]
    InvalidArpeggioDelay(f64),
    #[error("Unknown picking pattern: {0}")]
    UnknownPattern(String),
}

pub type Result<T> = std::result::Result<T, OrreryError>;
