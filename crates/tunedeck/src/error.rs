//! Error types for the sound engine and the deck.

use std::path::PathBuf;

use abc::AbcError;
use thiserror::Error;

/// Sound backend failures.
///
/// Setup failures (`NoDriver`, `NoSoundfont`) are recoverable: the preview
/// voice keeps working without sound.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No usable sound driver: {0}")]
    NoDriver(String),

    #[error("No soundfont can be found (tried {})", display_paths(.0))]
    NoSoundfont(Vec<PathBuf>),

    #[error("Sound backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid MIDI file {path}: {message}")]
    InvalidMidiFile { path: PathBuf, message: String },

    #[error("Unknown instrument: '{0}'")]
    UnknownInstrument(String),

    #[error("MIDI channel must be 0-15, got {0}")]
    InvalidChannel(u8),
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failures while rendering a tune to MIDI
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("{command} failed with {status}")]
    Failed { command: String, status: String },

    #[error("{command} produced no MIDI file")]
    NoOutput { command: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything that can stop the deck from setting up or playing a tune.
#[derive(Debug, Error)]
pub enum DeckError {
    #[error(transparent)]
    Abc(#[from] AbcError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Invalid repeat count: '{0}'")]
    InvalidRepeatCount(String),

    #[error("Invalid tempo: '{0}'")]
    InvalidTempo(String),

    #[error("No tune is open")]
    NoTune,
}
