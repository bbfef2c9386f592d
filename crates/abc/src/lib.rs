//! ABC notation music theory, tune header scanning and tempo model.
//!
//! This crate knows just enough ABC to play a tune and to preview notes
//! while one is being typed: key signatures and modes, the single-note
//! grammar, the header fields (`X:`, `T:`, `M:`, `L:`, `Q:`, `R:`, `K:`)
//! and the tempo arithmetic a sequencer needs. Rendering the tune body to
//! MIDI is left to an external tool.
//!
//! # Example
//!
//! ```
//! use abc::{scan_tune, compute_notes_per_minute, compute_ticks_per_note, ScanMode};
//!
//! let abc = [
//!     "X:1",
//!     "T:The Kesh",
//!     "M:6/8",
//!     "L:1/8",
//!     "Q:3/8=120",
//!     "K:G",
//!     "GAG GAB|ABA ABd|",
//! ];
//!
//! let header = scan_tune(&abc, ScanMode::FullTune).unwrap().value;
//! let npm = compute_notes_per_minute(
//!     header.default_note_length,
//!     header.meter,
//!     header.tempo.as_ref(),
//! )
//! .unwrap();
//! assert_eq!(npm, 360);
//! assert_eq!(compute_ticks_per_note(npm), 120);
//! ```

pub mod ast;
pub mod buffer;
pub mod error;
pub mod feedback;
pub mod parser;
pub mod tempo;
pub mod theory;

pub use ast::*;
pub use buffer::{current_raw_tune, note_to_play, EditBuffer, TextBuffer};
pub use error::{AbcError, Result};
pub use feedback::{Feedback, FeedbackLevel, ParseResult};
pub use parser::{
    note_token_to_midi, normalize_key, normalize_key_lenient, scan_tune, HeaderScanner, ScanMode,
};
pub use tempo::{compute_notes_per_minute, compute_ticks_per_note, default_tempo, AbcTempo, Speed};
pub use theory::alteration_for;
