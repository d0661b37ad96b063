use std::path::{Path, PathBuf};

use anyhow::Context;
use orrery_core::{EffectsState, Note, OrderMode, PickingPattern, PlaybackSettings, RepeatMode, Transform};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Everything needed to play a scene without a host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub playback: PlaybackSettings,
    #[serde(default)]
    pub effects: EffectsState,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub notes: Vec<Note>,
    /// Directory of note-named WAV files for the sampler instrument
    #[serde(default)]
    pub samples_dir: Option<PathBuf>,
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("orrery")
        .join("session.toml")
}

/// Load `path`, or the user session file, or the built-in demo scene
pub fn load(path: Option<&Path>) -> anyhow::Result<SessionConfig> {
    if let Some(path) = path {
        return read(path);
    }
    let default = config_path();
    if default.exists() {
        return read(&default);
    }
    debug!(path = %default.display(), "No session file, using demo scene");
    Ok(demo())
}

fn read(path: &Path) -> anyhow::Result<SessionConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: SessionConfig = toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    info!(path = %path.display(), notes = config.notes.len(), "Loaded session");
    Ok(config)
}

/// C major seventh spread around the listener, picked Travis-style
pub fn demo() -> SessionConfig {
    let notes = [261.63, 329.63, 392.0, 493.88]
        .iter()
        .enumerate()
        .map(|(i, &freq)| {
            let angle = i as f64 * std::f64::consts::FRAC_PI_2;
            Note::new(i as u64 + 1, freq, 96).at(angle.cos() * 2.0, 0.0, angle.sin() * 2.0)
        })
        .collect();

    let mut config = SessionConfig {
        playback: PlaybackSettings {
            tempo_bpm: 96.0,
            global_subdivision: 2.0,
            order_mode: OrderMode::Picking(PickingPattern::Travis),
            repeat_mode: RepeatMode::Off,
            ..Default::default()
        },
        notes,
        ..Default::default()
    };
    config.effects.reverb.enabled = true;
    config.effects.delay.enabled = true;
    config.transform.auto_rotate.y = true;
    config.transform.auto_rotate.speed_y = 20.0;
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_is_valid() {
        let demo = demo();
        assert!(demo.playback.validate().is_ok());
        assert_eq!(demo.notes.len(), 4);
    }

    #[test]
    fn test_parse_session_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        std::fs::write(
            &path,
            r#"
[playback]
tempo_bpm = 140.0
order_mode = { picking = "alberti" }
repeat_mode = "ratchet"
rhythm_pattern = [1.0, 2.0]
output_mode = "device"

[effects.delay]
enabled = true
time_s = 0.25

[[notes]]
id = 1
pitch_frequency_hz = 220.0
position = { x = 1.0, y = 0.0, z = -1.0 }

[[notes]]
id = 2
pitch_frequency_hz = 330.0
velocity = 64
rhythm_subdivision = 3.0
"#,
        )
        .unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.playback.tempo_bpm, 140.0);
        assert_eq!(config.playback.order_mode, OrderMode::Picking(PickingPattern::Alberti));
        assert_eq!(config.playback.repeat_mode, RepeatMode::Ratchet);
        assert_eq!(config.playback.rhythm_pattern.len(), 2);
        assert!(config.effects.delay.enabled);
        assert!(!config.effects.reverb.enabled);
        assert_eq!(config.notes[0].velocity, 100);
        assert_eq!(config.notes[1].rhythm_subdivision, Some(3.0));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
