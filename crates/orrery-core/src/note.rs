//! Notes, the scene transform, and the live per-tick projection of a note

use serde::{Deserialize, Serialize};

/// Reference pitch for MIDI note 69
pub const A4_HZ: f64 = 440.0;

/// Stable identifier of a note, owned by whoever edits the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId(pub u64);

/// Point in scene space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A note placed in the scene (pre-transform)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    #[serde(default)]
    pub position: Position,
    pub pitch_frequency_hz: f64,
    /// Frequency after tuning/scale snapping; preferred over the raw pitch
    #[serde(default)]
    pub tuned_frequency_hz: f64,
    #[serde(default)]
    pub color: String,
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default = "default_velocity")]
    pub velocity: u8,
    /// Fallback subdivision used when no rhythm pattern is active
    #[serde(default)]
    pub rhythm_subdivision: Option<f64>,
}

fn default_radius() -> f64 {
    0.2
}

fn default_velocity() -> u8 {
    100
}

impl Note {
    pub fn new(id: u64, frequency_hz: f64, velocity: u8) -> Self {
        Self {
            id: NoteId(id),
            position: Position::default(),
            pitch_frequency_hz: frequency_hz,
            tuned_frequency_hz: frequency_hz,
            color: String::new(),
            radius: default_radius(),
            velocity,
            rhythm_subdivision: None,
        }
    }

    pub fn at(mut self, x: f64, y: f64, z: f64) -> Self {
        self.position = Position::new(x, y, z);
        self
    }

    pub fn with_subdivision(mut self, subdivision: f64) -> Self {
        self.rhythm_subdivision = Some(subdivision);
        self
    }

    /// Frequency used for playback before any transposition
    pub fn base_frequency_hz(&self) -> f64 {
        if self.tuned_frequency_hz.is_finite() && self.tuned_frequency_hz > 0.0 {
            self.tuned_frequency_hz
        } else {
            self.pitch_frequency_hz
        }
    }
}

/// Euler rotation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Rotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Continuous rotation per axis, in degrees per second
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoRotate {
    pub x: bool,
    pub y: bool,
    pub z: bool,
    pub speed_x: f64,
    pub speed_y: f64,
    pub speed_z: f64,
}

/// Sinusoidal sweep of the vertical translation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoTranspose {
    pub enabled: bool,
    /// Peak offset in semitones
    pub range: f64,
    /// Sweep rate in cycles per second
    pub speed: f64,
}

/// Scene-wide transform applied to every note
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    /// Vertical offset; doubles as a semitone transposition
    pub y_translation: f64,
    pub rotation: Rotation,
    pub auto_rotate: AutoRotate,
    pub auto_transpose: AutoTranspose,
}

impl Transform {
    /// Whole-semitone transposition derived from the vertical offset
    pub fn semitone_offset(&self) -> i32 {
        if self.y_translation.is_finite() {
            self.y_translation.round() as i32
        } else {
            0
        }
    }

    /// Rotate a point by this transform's Euler angles (XYZ order) and lift it
    pub fn apply(&self, p: Position) -> Position {
        let (sx, cx) = self.rotation.x.to_radians().sin_cos();
        let (sy, cy) = self.rotation.y.to_radians().sin_cos();
        let (sz, cz) = self.rotation.z.to_radians().sin_cos();

        // Rz
        let x1 = p.x * cz - p.y * sz;
        let y1 = p.x * sz + p.y * cz;
        let z1 = p.z;
        // Ry
        let x2 = x1 * cy + z1 * sy;
        let y2 = y1;
        let z2 = -x1 * sy + z1 * cy;
        // Rx
        let x3 = x2;
        let y3 = y2 * cx - z2 * sx;
        let z3 = y2 * sx + z2 * cx;

        let lift = if self.y_translation.is_finite() { self.y_translation } else { 0.0 };
        Position::new(x3, y3 + lift, z3)
    }
}

/// Snapshot of a note with the current transform applied
#[derive(Debug, Clone, PartialEq)]
pub struct LiveNote {
    pub id: NoteId,
    pub frequency_hz: f64,
    pub velocity: u8,
    pub rhythm_subdivision: Option<f64>,
    pub live_x: f64,
    pub live_y: f64,
    pub live_z: f64,
}

impl LiveNote {
    /// Whether this note can produce sound at all
    pub fn is_playable(&self) -> bool {
        (1..=127).contains(&self.velocity)
            && self.frequency_hz.is_finite()
            && self.frequency_hz > 0.0
    }

    /// Fractional MIDI note number for the live frequency
    pub fn midi_pitch(&self) -> f64 {
        frequency_to_midi(self.frequency_hz)
    }
}

/// Project a note through the transform. Pure; called once per tick.
pub fn live_note(note: &Note, transform: &Transform) -> LiveNote {
    let semitones = transform.semitone_offset() as f64;
    let frequency_hz = note.base_frequency_hz() * 2.0_f64.powf(semitones / 12.0);
    let p = transform.apply(note.position);

    LiveNote {
        id: note.id,
        frequency_hz,
        velocity: note.velocity,
        rhythm_subdivision: note.rhythm_subdivision,
        live_x: p.x,
        live_y: p.y,
        live_z: p.z,
    }
}

/// Fractional MIDI note number (A4 = 69)
pub fn frequency_to_midi(frequency_hz: f64) -> f64 {
    12.0 * (frequency_hz / A4_HZ).log2() + 69.0
}

/// Frequency of a (possibly fractional) MIDI note number
pub fn midi_to_frequency(midi: f64) -> f64 {
    A4_HZ * 2.0_f64.powf((midi - 69.0) / 12.0)
}

/// Steps the auto-rotate / auto-transpose animation for hosts that drive it
#[derive(Debug, Clone)]
pub struct TransformAnimator {
    elapsed: f64,
    base_translation: f64,
}

impl TransformAnimator {
    pub fn new(transform: &Transform) -> Self {
        Self {
            elapsed: 0.0,
            base_translation: transform.y_translation,
        }
    }

    /// Re-anchor the transposition sweep (e.g. after the user drags the scene)
    pub fn rebase(&mut self, transform: &Transform) {
        self.base_translation = transform.y_translation;
    }

    /// Return `transform` advanced by `dt` seconds
    pub fn advance(&mut self, transform: &Transform, dt: f64) -> Transform {
        if !dt.is_finite() || dt <= 0.0 {
            return *transform;
        }
        self.elapsed += dt;

        let mut next = *transform;
        let auto = transform.auto_rotate;
        if auto.x {
            next.rotation.x = (next.rotation.x + auto.speed_x * dt).rem_euclid(360.0);
        }
        if auto.y {
            next.rotation.y = (next.rotation.y + auto.speed_y * dt).rem_euclid(360.0);
        }
        if auto.z {
            next.rotation.z = (next.rotation.z + auto.speed_z * dt).rem_euclid(360.0);
        }

        let sweep = transform.auto_transpose;
        if sweep.enabled {
            let phase = std::f64::consts::TAU * sweep.speed * self.elapsed;
            next.y_translation = self.base_translation + sweep.range * phase.sin();
        }

        next
    }
}
