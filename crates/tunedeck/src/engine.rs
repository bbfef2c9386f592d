//! The sound engine seam.
//!
//! A [`SoundEngine`] turns MIDI channel messages into sound (a synth, a MIDI
//! output port, or a recorder in tests). A [`FilePlayer`] plays a playlist
//! of MIDI files through an engine and is created on demand by a
//! [`PlayerFactory`], because stopping playback means throwing the player
//! away.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use tracing::debug;

use crate::error::EngineError;
use crate::synth::check_soundfont;

/// Channel messages the preview voice and the file player need.
pub trait SoundEngine: Send + Sync {
    fn note_on(&self, channel: u8, key: u8, velocity: u8) -> Result<(), EngineError>;

    fn note_off(&self, channel: u8, key: u8) -> Result<(), EngineError>;

    fn program_change(&self, channel: u8, program: u8) -> Result<(), EngineError>;

    fn control_change(&self, channel: u8, controller: u8, value: u8) -> Result<(), EngineError>;

    /// Make a soundfont available to the engine.
    fn load_soundfont(&self, path: &Path) -> Result<(), EngineError>;

    /// Silence a channel (CC 123, all notes off)
    fn all_notes_off(&self, channel: u8) -> Result<(), EngineError> {
        self.control_change(channel, 123, 0)
    }
}

/// Where a file player takes its tempo from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub enum PlayerTempo {
    /// The tempo written in the MIDI file
    #[default]
    Internal,
    /// The file's tempo multiplied by a factor
    Scaled(f64),
    /// A fixed tempo in quarter notes per minute, ignoring the file
    External(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlayerStatus {
    /// Loaded but not playing (never started, or paused)
    Ready,
    Playing,
    /// Reached the end of the playlist, repeats included
    Done,
}

/// A playlist player.
///
/// `stop` only halts: the position is kept and `play` resumes from it.
/// There is no rewind; recreate the player to start over.
pub trait FilePlayer: Send {
    fn add(&mut self, path: &Path) -> Result<(), EngineError>;

    fn play(&mut self) -> Result<(), EngineError>;

    fn stop(&mut self) -> Result<(), EngineError>;

    fn seek(&mut self, tick: u64) -> Result<(), EngineError>;

    /// Number of times to play the playlist; -1 plays forever
    fn set_loop(&mut self, count: i32) -> Result<(), EngineError>;

    fn set_tempo(&mut self, tempo: PlayerTempo) -> Result<(), EngineError>;

    fn status(&self) -> PlayerStatus;

    fn current_tick(&self) -> u64;

    fn total_ticks(&self) -> u64;

    /// Effective tempo in beats per minute
    fn bpm(&self) -> f64;

    /// Tempo written in the file at the current position (µs per quarter note)
    fn midi_tempo(&self) -> u32;
}

/// Creates file players; each `create` gives a fresh player at tick 0.
pub trait PlayerFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn FilePlayer>, EngineError>;
}

/// Factory for a deck whose synth failed to start
#[derive(Debug, Clone)]
pub struct NoPlayerFactory {
    reason: String,
}

impl NoPlayerFactory {
    pub fn new(reason: impl Into<String>) -> Self {
        NoPlayerFactory {
            reason: reason.into(),
        }
    }
}

impl PlayerFactory for NoPlayerFactory {
    fn create(&self) -> Result<Box<dyn FilePlayer>, EngineError> {
        Err(EngineError::NoDriver(self.reason.clone()))
    }
}

/// One call made to a [`RecordingEngine`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8 },
    ProgramChange { channel: u8, program: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    SoundfontLoaded { path: PathBuf },
}

/// An engine that makes no sound and remembers every call.
///
/// Used for dry runs and in tests.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: EngineEvent) -> Result<(), EngineError> {
        debug!("engine: {:?}", event);
        self.events
            .lock()
            .expect("recording engine mutex poisoned")
            .push(event);
        Ok(())
    }

    /// Snapshot of the calls so far
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .expect("recording engine mutex poisoned")
            .clone()
    }

    /// Take the calls so far, leaving the log empty
    pub fn take_events(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut *self.events.lock().expect("recording engine mutex poisoned"))
    }

    pub fn note_ons(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, EngineEvent::NoteOn { .. }))
            .count()
    }

    pub fn note_offs(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, EngineEvent::NoteOff { .. }))
            .count()
    }
}

impl SoundEngine for RecordingEngine {
    fn note_on(&self, channel: u8, key: u8, velocity: u8) -> Result<(), EngineError> {
        self.record(EngineEvent::NoteOn {
            channel,
            key,
            velocity,
        })
    }

    fn note_off(&self, channel: u8, key: u8) -> Result<(), EngineError> {
        self.record(EngineEvent::NoteOff { channel, key })
    }

    fn program_change(&self, channel: u8, program: u8) -> Result<(), EngineError> {
        self.record(EngineEvent::ProgramChange { channel, program })
    }

    fn control_change(&self, channel: u8, controller: u8, value: u8) -> Result<(), EngineError> {
        self.record(EngineEvent::ControlChange {
            channel,
            controller,
            value,
        })
    }

    fn load_soundfont(&self, path: &Path) -> Result<(), EngineError> {
        check_soundfont(path)?;
        self.record(EngineEvent::SoundfontLoaded {
            path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_engine_counts() {
        let engine = RecordingEngine::new();
        engine.note_on(0, 60, 100).unwrap();
        engine.note_off(0, 60).unwrap();
        engine.program_change(0, 21).unwrap();
        engine.all_notes_off(1).unwrap();

        assert_eq!(engine.note_ons(), 1);
        assert_eq!(engine.note_offs(), 1);
        assert_eq!(
            engine.take_events().last(),
            Some(&EngineEvent::ControlChange {
                channel: 1,
                controller: 123,
                value: 0
            })
        );
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_recording_engine_rejects_missing_soundfont() {
        let engine = RecordingEngine::new();
        assert!(engine
            .load_soundfont(Path::new("/nonexistent/soundfont.sf2"))
            .is_err());
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_no_player_factory() {
        let factory = NoPlayerFactory::new("no soundfont");
        assert!(matches!(factory.create(), Err(EngineError::NoDriver(r)) if r == "no soundfont"));
    }

    #[test]
    fn test_engine_event_json() {
        let json = serde_json::to_string(&EngineEvent::NoteOn {
            channel: 0,
            key: 66,
            velocity: 100,
        })
        .unwrap();
        assert_eq!(json, r#"{"event":"note_on","channel":0,"key":66,"velocity":100}"#);
    }
}
