//! MIDI file parsing for playback
//!
//! Extracts channel events and tempo changes from Standard MIDI Files,
//! converting midly's event types into the messages a [`SoundEngine`]
//! understands.
//!
//! [`SoundEngine`]: crate::engine::SoundEngine

use std::path::Path;
use std::time::Duration;

use midly::{MetaMessage, MidiMessage as MidlyMessage, Smf, TrackEventKind};

use crate::engine::SoundEngine;
use crate::error::EngineError;

/// 120 bpm, the MIDI default when a file sets no tempo
pub const DEFAULT_MIDI_TEMPO: u32 = 500_000;

/// Channel messages the player forwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessage {
    NoteOn { key: u8, velocity: u8 },
    NoteOff { key: u8 },
    ControlChange { controller: u8, value: u8 },
    ProgramChange { program: u8 },
}

impl ChannelMessage {
    /// Send this message to an engine
    pub fn send(&self, engine: &dyn SoundEngine, channel: u8) -> Result<(), EngineError> {
        match *self {
            ChannelMessage::NoteOn { key, velocity } => engine.note_on(channel, key, velocity),
            ChannelMessage::NoteOff { key } => engine.note_off(channel, key),
            ChannelMessage::ControlChange { controller, value } => {
                engine.control_change(channel, controller, value)
            }
            ChannelMessage::ProgramChange { program } => engine.program_change(channel, program),
        }
    }
}

/// A MIDI event at a specific tick position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiFileEvent {
    /// Absolute tick position in the file
    pub tick: u64,
    /// MIDI channel (0-15)
    pub channel: u8,
    pub message: ChannelMessage,
}

/// Tempo change at a specific tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoChange {
    pub tick: u64,
    /// Microseconds per quarter note
    pub micros_per_quarter: u32,
}

impl TempoChange {
    pub fn bpm(&self) -> f64 {
        60_000_000.0 / self.micros_per_quarter as f64
    }
}

/// Parsed MIDI file ready for playback
#[derive(Debug, Clone)]
pub struct ParsedMidiFile {
    /// Pulses per quarter note (ticks per beat)
    pub ppq: u16,
    /// Tempo changes throughout the file, sorted by tick
    pub tempo_changes: Vec<TempoChange>,
    /// All channel events, sorted by tick
    pub events: Vec<MidiFileEvent>,
    /// Duration in ticks
    pub duration_ticks: u64,
}

impl ParsedMidiFile {
    /// Index of the first event at or after `tick`
    pub fn first_event_at(&self, tick: u64) -> usize {
        self.events.partition_point(|e| e.tick < tick)
    }

    /// Tempo in force at a tick, in microseconds per quarter note
    pub fn tempo_at(&self, tick: u64) -> u32 {
        self.tempo_changes
            .iter()
            .rev()
            .find(|tc| tc.tick <= tick)
            .map(|tc| tc.micros_per_quarter)
            .unwrap_or(DEFAULT_MIDI_TEMPO)
    }

    /// Wall-clock length of `ticks` at the given tempo
    pub fn ticks_to_duration(&self, ticks: u64, micros_per_quarter: f64) -> Duration {
        let ppq = self.ppq.max(1) as f64;
        Duration::from_secs_f64(ticks as f64 * micros_per_quarter / ppq / 1_000_000.0)
    }
}

/// Convert midly MidiMessage to a channel message.
///
/// Aftertouch and pitch bend have no counterpart in the engine and are
/// dropped.
fn convert_midly_message(message: MidlyMessage) -> Option<ChannelMessage> {
    match message {
        MidlyMessage::NoteOn { key, vel } => {
            if vel.as_int() == 0 {
                // Note On with velocity 0 is Note Off
                Some(ChannelMessage::NoteOff { key: key.as_int() })
            } else {
                Some(ChannelMessage::NoteOn {
                    key: key.as_int(),
                    velocity: vel.as_int(),
                })
            }
        }
        MidlyMessage::NoteOff { key, .. } => Some(ChannelMessage::NoteOff { key: key.as_int() }),
        MidlyMessage::Controller { controller, value } => Some(ChannelMessage::ControlChange {
            controller: controller.as_int(),
            value: value.as_int(),
        }),
        MidlyMessage::ProgramChange { program } => Some(ChannelMessage::ProgramChange {
            program: program.as_int(),
        }),
        MidlyMessage::Aftertouch { .. }
        | MidlyMessage::ChannelAftertouch { .. }
        | MidlyMessage::PitchBend { .. } => None,
    }
}

/// Parse a MIDI file from bytes
///
/// Extracts all channel events and tempo changes, sorted by tick position.
/// `path` is only used in error messages.
pub fn parse_midi_file(bytes: &[u8], path: &Path) -> Result<ParsedMidiFile, EngineError> {
    let smf = Smf::parse(bytes).map_err(|e| EngineError::InvalidMidiFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let ppq = match smf.header.timing {
        midly::Timing::Metrical(t) => t.as_int(),
        midly::Timing::Timecode(_fps, _tpf) => {
            // SMPTE timing - use reasonable default
            480
        }
    };

    let mut events = Vec::new();
    let mut tempo_changes = vec![TempoChange {
        tick: 0,
        micros_per_quarter: DEFAULT_MIDI_TEMPO,
    }];
    let mut max_tick = 0u64;

    for track in &smf.tracks {
        let mut tick = 0u64;

        for event in track {
            tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Midi { channel, message } => {
                    if let Some(message) = convert_midly_message(message) {
                        events.push(MidiFileEvent {
                            tick,
                            channel: channel.as_int(),
                            message,
                        });
                    }
                }
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    tempo_changes.push(TempoChange {
                        tick,
                        micros_per_quarter: tempo.as_int(),
                    });
                }
                _ => {}
            }

            max_tick = max_tick.max(tick);
        }
    }

    // Sort events by tick (tracks may interleave); the sort is stable so
    // a note-off keeps its place before a note-on at the same tick
    events.sort_by_key(|e| e.tick);
    tempo_changes.sort_by_key(|t| t.tick);

    Ok(ParsedMidiFile {
        ppq,
        tempo_changes,
        events,
        duration_ticks: max_tick,
    })
}

/// Read and parse a MIDI file from disk
pub fn load_midi_file(path: &Path) -> Result<ParsedMidiFile, EngineError> {
    let bytes = std::fs::read(path)?;
    parse_midi_file(&bytes, path)
}
