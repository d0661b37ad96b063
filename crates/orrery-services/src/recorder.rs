//! WAV capture of the recording tap

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recorder thread panicked")]
    Panicked,
}

type Writer = hound::WavWriter<BufWriter<File>>;

/// Writes interleaved stereo blocks to a 32-bit float WAV file on a worker thread
pub struct WavRecorder {
    path: PathBuf,
    stop_tx: Sender<()>,
    handle: JoinHandle<Result<u64, RecordError>>,
}

impl WavRecorder {
    pub fn spawn(path: impl AsRef<Path>, blocks: Receiver<Vec<f32>>, sample_rate: u32) -> Result<Self, RecordError> {
        let path = path.as_ref().to_path_buf();
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let writer = hound::WavWriter::create(&path, spec)?;
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("orrery-recorder".into())
            .spawn(move || write_loop(writer, blocks, stop_rx))?;

        info!(path = %path.display(), sample_rate, "Recording started");
        Ok(Self { path, stop_tx, handle })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drain what is already queued, close the file and return the frame count
    pub fn finish(self) -> Result<u64, RecordError> {
        let _ = self.stop_tx.send(());
        let frames = self.handle.join().map_err(|_| RecordError::Panicked)??;
        info!(path = %self.path.display(), frames, "Recording finished");
        Ok(frames)
    }
}

fn write_loop(mut writer: Writer, blocks: Receiver<Vec<f32>>, stop_rx: Receiver<()>) -> Result<u64, RecordError> {
    let mut samples: u64 = 0;
    loop {
        select! {
            recv(blocks) -> block => match block {
                Ok(block) => samples += write_block(&mut writer, &block)?,
                Err(_) => break,
            },
            recv(stop_rx) -> _ => {
                for block in blocks.try_iter() {
                    samples += write_block(&mut writer, &block)?;
                }
                break;
            }
        }
    }
    writer.finalize()?;
    debug!(samples, "Recorder closed");
    Ok(samples / 2)
}

fn write_block(writer: &mut Writer, block: &[f32]) -> Result<u64, RecordError> {
    for &sample in block {
        writer.write_sample(sample)?;
    }
    Ok(block.len() as u64)
}
