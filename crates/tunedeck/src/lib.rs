//! Tunedeck: play the ABC tune under the cursor and preview notes as they
//! are typed.
//!
//! - [`preview::PreviewVoice`] sounds one note per keystroke and silences it
//!   after a short delay.
//! - [`controller::PlaybackController`] plays a rendered tune with pause,
//!   stop, loop and tempo control.
//! - [`deck::Deck`] ties both to an open tune: rendering, tempo presets and
//!   the loop toggle.
//!
//! Sound goes through the [`engine::SoundEngine`] trait. The built-in
//! [`smf_player::SmfPlayer`] plays MIDI files on any engine; with the
//! `midi-port` feature notes can go to an external synth over a MIDI port.

pub mod controller;
pub mod deck;
pub mod engine;
pub mod error;
pub mod midi_file;
#[cfg(feature = "midi-port")]
pub mod midi_port;
pub mod preview;
pub mod render;
pub mod smf_player;
pub mod synth;
pub mod telemetry;

pub use controller::{LoopMode, PlaybackController, PlaybackReadout, PlaybackState, TempoOverride};
pub use deck::{Deck, OpenTune};
pub use engine::{
    EngineEvent, FilePlayer, NoPlayerFactory, PlayerFactory, PlayerStatus, PlayerTempo,
    RecordingEngine, SoundEngine,
};
pub use error::{DeckError, EngineError, RenderError};
pub use preview::PreviewVoice;
pub use render::{Abc2MidiCommand, RenderedTune, TuneRenderer};
pub use smf_player::{SmfPlayer, SmfPlayerFactory};
pub use synth::{instrument_program, Synth, INSTRUMENTS};
