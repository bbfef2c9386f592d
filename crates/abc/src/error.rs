//! Errors raised while reading ABC text.

use thiserror::Error;

/// Failures that stop a tune from being set up for playback.
///
/// Live note preview never surfaces these: it falls back to C major or
/// to "no note" instead (see [`crate::buffer::note_to_play`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbcError {
    #[error("'{0}' is not a valid key name")]
    InvalidKey(String),

    #[error("Invalid meter: '{0}'")]
    InvalidMeter(String),

    #[error("Invalid default note length: '{0}'")]
    InvalidDefaultNoteLength(String),

    #[error("Invalid or unsupported tempo: '{0}'")]
    InvalidOrUnsupportedTempo(String),

    #[error("Reference number (X: header) missing in current tune")]
    MissingReferenceNumber,

    #[error("Cannot compute notes per minute: missing meter or tempo")]
    MissingTempoContext,

    #[error("Invalid ABC note: '{0}'")]
    InvalidNoteToken(String),
}

pub type Result<T> = std::result::Result<T, AbcError>;
