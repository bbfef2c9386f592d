//! Sound through an external synth on a MIDI output port (via midir).

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use midir::{MidiOutput, MidiOutputConnection};
use tracing::info;

use crate::engine::SoundEngine;
use crate::error::EngineError;
use crate::synth::check_soundfont;

/// Status byte and data bytes for one channel message
fn encode(status: u8, channel: u8, data: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(1 + data.len());
    bytes.push(status | (channel & 0x0F));
    bytes.extend(data.iter().map(|b| b & 0x7F));
    bytes
}

/// A [`SoundEngine`] writing to a MIDI output port
pub struct MidiPortEngine {
    connection: Mutex<Option<MidiOutputConnection>>,
    pub port_name: String,
    pub messages_sent: AtomicU64,
}

impl MidiPortEngine {
    /// Open the first output port whose name contains `port_pattern`
    pub fn open(port_pattern: &str) -> Result<Self, EngineError> {
        let midi_out =
            MidiOutput::new("tunedeck-out").map_err(|e| EngineError::NoDriver(e.to_string()))?;

        let ports = midi_out.ports();
        let port = ports
            .iter()
            .find(|p| {
                midi_out
                    .port_name(p)
                    .map(|n| n.contains(port_pattern))
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                EngineError::NoDriver(format!("no MIDI output port matches '{}'", port_pattern))
            })?;

        let port_name = midi_out
            .port_name(port)
            .map_err(|e| EngineError::NoDriver(e.to_string()))?;

        let connection = midi_out
            .connect(port, "tunedeck-output")
            .map_err(|e| EngineError::NoDriver(e.to_string()))?;

        info!("Opened MIDI output: {}", port_name);

        Ok(Self {
            connection: Mutex::new(Some(connection)),
            port_name,
            messages_sent: AtomicU64::new(0),
        })
    }

    fn send_raw(&self, data: &[u8]) -> Result<(), EngineError> {
        let mut guard = self.connection.lock().expect("midi output mutex poisoned");
        match guard.as_mut() {
            Some(conn) => {
                conn.send(data)
                    .map_err(|e| EngineError::Backend(e.to_string()))?;
                self.messages_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            None => Err(EngineError::Backend("MIDI output closed".to_string())),
        }
    }

    pub fn close(&self) {
        let mut guard = self.connection.lock().expect("midi output mutex poisoned");
        if let Some(conn) = guard.take() {
            conn.close();
            info!("Closed MIDI output: {}", self.port_name);
        }
    }
}

impl SoundEngine for MidiPortEngine {
    fn note_on(&self, channel: u8, key: u8, velocity: u8) -> Result<(), EngineError> {
        self.send_raw(&encode(0x90, channel, &[key, velocity]))
    }

    fn note_off(&self, channel: u8, key: u8) -> Result<(), EngineError> {
        self.send_raw(&encode(0x80, channel, &[key, 0]))
    }

    fn program_change(&self, channel: u8, program: u8) -> Result<(), EngineError> {
        self.send_raw(&encode(0xC0, channel, &[program]))
    }

    fn control_change(&self, channel: u8, controller: u8, value: u8) -> Result<(), EngineError> {
        self.send_raw(&encode(0xB0, channel, &[controller, value]))
    }

    /// The external synth brings its own sounds; the file is only checked.
    fn load_soundfont(&self, path: &Path) -> Result<(), EngineError> {
        check_soundfont(path)?;
        info!(
            "{} plays with its own sounds, not {}",
            self.port_name,
            path.display()
        );
        Ok(())
    }
}

impl Drop for MidiPortEngine {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(encode(0x90, 0, &[60, 100]), vec![0x90, 60, 100]);
        assert_eq!(encode(0x80, 9, &[38, 0]), vec![0x89, 38, 0]);
        assert_eq!(encode(0xC0, 1, &[110]), vec![0xC1, 110]);
        // Out-of-range values are masked to 4 and 7 bits
        assert_eq!(encode(0xB0, 17, &[200, 128]), vec![0xB1, 72, 0]);
    }
}
