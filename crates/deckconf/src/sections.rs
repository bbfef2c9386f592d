//! Configuration sections, one per TOML table.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sound output: where soundfonts live and which MIDI port to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Soundfont candidates, tried in order until one loads
    #[serde(default = "AudioConfig::default_soundfonts")]
    pub soundfonts: Vec<PathBuf>,

    /// Name pattern of a MIDI output port to send notes to instead of the
    /// built-in synth. Only used when built with the `midi-port` feature.
    #[serde(default)]
    pub midi_port: Option<String>,
}

impl AudioConfig {
    fn default_soundfonts() -> Vec<PathBuf> {
        vec![
            PathBuf::from("/usr/share/sounds/sf2/FluidR3_GM.sf2"),
            PathBuf::from("/usr/share/sounds/sf2/default.sf2"),
        ]
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            soundfonts: Self::default_soundfonts(),
            midi_port: None,
        }
    }
}

/// Keystroke note preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// How long a previewed note sounds before its note-off
    #[serde(default = "PreviewConfig::default_duration_ms")]
    pub duration_ms: u64,

    #[serde(default = "PreviewConfig::default_velocity")]
    pub velocity: u8,

    #[serde(default)]
    pub channel: u8,

    /// General MIDI instrument name, e.g. "Fiddle"
    #[serde(default = "PreviewConfig::default_instrument")]
    pub instrument: String,
}

impl PreviewConfig {
    fn default_duration_ms() -> u64 {
        500
    }

    fn default_velocity() -> u8 {
        100
    }

    fn default_instrument() -> String {
        "Acoustic Grand Piano".to_string()
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            duration_ms: Self::default_duration_ms(),
            velocity: Self::default_velocity(),
            channel: 0,
            instrument: Self::default_instrument(),
        }
    }
}

/// Whole-tune playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Period of the position/tempo readout refresh
    #[serde(default = "PlaybackConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Repeat count offered when switching to "repeat N times"
    #[serde(default = "PlaybackConfig::default_repeat")]
    pub default_repeat: u32,

    /// External ABC to MIDI converter
    #[serde(default = "PlaybackConfig::default_renderer")]
    pub renderer: String,
}

impl PlaybackConfig {
    fn default_poll_interval_ms() -> u64 {
        1000
    }

    fn default_repeat() -> u32 {
        3
    }

    fn default_renderer() -> String {
        "abc2midi".to_string()
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            default_repeat: Self::default_repeat(),
            renderer: Self::default_renderer(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive handed to the tracing subscriber
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}
