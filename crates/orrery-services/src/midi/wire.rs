//! MIDI wire encoding for the device backend

use orrery_core::frequency_to_midi;

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PAN_CC: u8 = 10;
pub const ALL_NOTES_OFF_CC: u8 = 123;
pub const CENTER_PAN: u8 = 64;
/// Live Z range mapped onto the full pan range
const PAN_Z_RANGE: f64 = 3.0;

pub type Message = [u8; 3];

pub fn note_on(channel: u8, pitch: u8, velocity: u8) -> Message {
    [NOTE_ON | (channel & 0x0F), pitch & 0x7F, velocity & 0x7F]
}

pub fn note_off(channel: u8, pitch: u8) -> Message {
    [NOTE_OFF | (channel & 0x0F), pitch & 0x7F, 0]
}

pub fn control_change(channel: u8, controller: u8, value: u8) -> Message {
    [CONTROL_CHANGE | (channel & 0x0F), controller & 0x7F, value & 0x7F]
}

pub fn all_notes_off(channel: u8) -> Message {
    control_change(channel, ALL_NOTES_OFF_CC, 0)
}

/// `round(12 * log2(f / 440) + 69)` clamped to 0..=127; `None` for unplayable frequencies
pub fn pitch_for(frequency_hz: f64) -> Option<u8> {
    if !(frequency_hz.is_finite() && frequency_hz > 0.0) {
        return None;
    }
    Some(frequency_to_midi(frequency_hz).round().clamp(0.0, 127.0) as u8)
}

/// Pan CC value for a live Z position; `width` is the spatialization factor
pub fn pan_value(z: f64, width: f64) -> u8 {
    let position = (z / PAN_Z_RANGE * width).clamp(-1.0, 1.0);
    if position.is_nan() {
        return CENTER_PAN;
    }
    (((position + 1.0) / 2.0) * 127.0).round() as u8
}
