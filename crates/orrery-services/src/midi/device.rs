//! MIDI output ports

use midir::{MidiOutput, MidiOutputConnection};
use tracing::info;

use super::MidiError;

const CLIENT_NAME: &str = "orrery";

/// Destination for raw MIDI bytes
pub trait MidiPort: Send {
    fn name(&self) -> &str;
    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiError>;
}

/// Names of the available output ports, in port order
pub fn list_output_ports() -> Result<Vec<String>, MidiError> {
    let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|p| midi_out.port_name(p).ok())
        .collect())
}

/// Port selected by index or by case-insensitive name substring
pub struct MidirPort {
    connection: MidiOutputConnection,
    name: String,
}

impl MidirPort {
    pub fn connect(selector: &str) -> Result<Self, MidiError> {
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;
        let ports = midi_out.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_out.port_name(p).unwrap_or_default())
            .collect();

        let index = select_port(&names, selector).ok_or_else(|| MidiError::PortNotFound(selector.to_string()))?;
        let name = names[index].clone();
        let connection = midi_out
            .connect(&ports[index], "orrery-output")
            .map_err(|e| MidiError::Connect(e.to_string()))?;

        info!(port = %name, "Connected MIDI output");
        Ok(Self { connection, name })
    }
}

impl MidiPort for MidirPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiError> {
        self.connection.send(bytes).map_err(|e| MidiError::Send(e.to_string()))
    }
}

/// Index of the port matching `selector`: a port number, else a name substring
pub fn select_port(names: &[String], selector: &str) -> Option<usize> {
    if let Ok(index) = selector.trim().parse::<usize>() {
        return (index < names.len()).then_some(index);
    }
    let needle = selector.to_lowercase();
    names.iter().position(|n| n.to_lowercase().contains(&needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_port() {
        let names = vec!["Midi Through 14:0".to_string(), "IAC Driver Bus 1".to_string()];
        assert_eq!(select_port(&names, "iac"), Some(1));
        assert_eq!(select_port(&names, "0"), Some(0));
        assert_eq!(select_port(&names, "5"), None);
        assert_eq!(select_port(&names, "fluid"), None);
    }
}
