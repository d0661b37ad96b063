//! Sample bank: note-named WAV files, decoded once and pitch-shifted per voice

use std::path::{Path, PathBuf};
use std::sync::Arc;

use orrery_core::{frequency_to_midi, midi_to_frequency};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("Failed to read sample directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("Resample error: {0}")]
    Resample(String),
}

/// One decoded sample and the note it was recorded at
#[derive(Debug, Clone)]
pub struct SampleZone {
    pub name: String,
    pub midi_note: u8,
    pub base_frequency_hz: f64,
    pub data: Arc<[f32]>,
}

#[derive(Debug, Clone, Default)]
pub struct SampleBank {
    zones: Vec<SampleZone>,
    sample_rate: u32,
}

impl SampleBank {
    pub fn empty(sample_rate: u32) -> Self {
        Self { zones: Vec::new(), sample_rate }
    }

    /// Load every `<note>.wav` in `dir` (e.g. `C4.wav`, `F#3.wav`, `Bb2.wav`),
    /// resampled to `sample_rate`. Files that fail to decode are skipped.
    pub fn load_dir(dir: &Path, sample_rate: u32) -> Result<Self, SampleError> {
        let entries = std::fs::read_dir(dir).map_err(|source| SampleError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut bank = Self::empty(sample_rate);
        for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
            let is_wav = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
            if !is_wav {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(midi_note) = parse_note_name(stem) else {
                debug!(path = %path.display(), "Skipping sample without a note name");
                continue;
            };

            match load_zone(&path, stem, midi_note, sample_rate) {
                Ok(zone) => bank.insert(zone),
                Err(e) => warn!(error = %e, "Skipping sample"),
            }
        }

        info!(dir = %dir.display(), zones = bank.len(), "Loaded sample bank");
        Ok(bank)
    }

    pub fn insert(&mut self, zone: SampleZone) {
        let at = self.zones.partition_point(|z| z.midi_note <= zone.midi_note);
        self.zones.insert(at, zone);
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Zone with the smallest MIDI distance to `frequency_hz`
    pub fn nearest(&self, frequency_hz: f64) -> Option<&SampleZone> {
        let target = frequency_to_midi(frequency_hz);
        self.zones
            .iter()
            .min_by(|a, b| {
                let da = (a.midi_note as f64 - target).abs();
                let db = (b.midi_note as f64 - target).abs();
                da.total_cmp(&db)
            })
    }
}

fn load_zone(path: &Path, name: &str, midi_note: u8, sample_rate: u32) -> Result<SampleZone, SampleError> {
    let (mono, file_rate) = decode_wav(path)?;
    let data = resample(&mono, file_rate, sample_rate)?;
    Ok(SampleZone {
        name: name.to_string(),
        midi_note,
        base_frequency_hz: midi_to_frequency(midi_note as f64),
        data: Arc::from(data),
    })
}

/// Decode a WAV file to mono f32 samples and its sample rate
pub fn decode_wav(path: &Path) -> Result<(Vec<f32>, u32), SampleError> {
    let decode_err = |reason: String| SampleError::Decode { path: path.to_path_buf(), reason };

    let reader = hound::WavReader::open(path).map_err(|e| decode_err(e.to_string()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let raw_samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().filter_map(Result::ok).collect(),
        hound::SampleFormat::Int => {
            let max_val = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .filter_map(Result::ok)
                .map(|s| s as f32 / max_val)
                .collect()
        }
    };

    if raw_samples.is_empty() {
        return Err(decode_err("WAV file is empty".into()));
    }

    let mono: Vec<f32> = if channels == 1 {
        raw_samples
    } else {
        raw_samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };
    Ok((mono, spec.sample_rate))
}

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, SampleError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(to_rate as f64 / from_rate as f64, 2.0, params, samples.len(), 1)
        .map_err(|e| SampleError::Resample(e.to_string()))?;

    let input = vec![samples.to_vec()];
    let output = resampler
        .process(&input, None)
        .map_err(|e| SampleError::Resample(e.to_string()))?;

    Ok(output.into_iter().flatten().collect())
}

/// MIDI note for names like `C4`, `F#3`, `Bb2`, `A-1` (C4 = 60)
pub fn parse_note_name(name: &str) -> Option<u8> {
    let mut chars = name.chars();
    let semitone: i32 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let (accidental, octave) = match rest.chars().next()? {
        '#' => (1, &rest[1..]),
        'b' => (-1, &rest[1..]),
        _ => (0, rest),
    };
    let octave: i32 = octave.parse().ok()?;
    let midi = (octave + 1) * 12 + semitone + accidental;
    u8::try_from(midi).ok().filter(|m| *m <= 127)
}
