//! Configuration loading for tunedeck.
//!
//! # Usage
//!
//! ```rust,no_run
//! use deckconf::DeckConfig;
//!
//! let config = DeckConfig::load().expect("Failed to load config");
//!
//! for sf in &config.audio.soundfonts {
//!     println!("soundfont candidate: {}", sf.display());
//! }
//! println!("preview note: {} ms", config.preview.duration_ms);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/tunedeck/config.toml` (system)
//! 2. `~/.config/tunedeck/config.toml` (user)
//! 3. `./tunedeck.toml` (local override), or a path given on the command line
//! 4. Environment variables (`TUNEDECK_*`, `RUST_LOG`)
//!
//! Each file only overrides the keys it sets.
//!
//! # Example Config
//!
//! ```toml
//! [audio]
//! soundfonts = ["~/sf2/Fiddle.sf2", "/usr/share/sounds/sf2/FluidR3_GM.sf2"]
//! midi_port = "FLUID"
//!
//! [preview]
//! duration_ms = 400
//! velocity = 90
//! instrument = "Fiddle"
//!
//! [playback]
//! poll_interval_ms = 1000
//! default_repeat = 3
//! renderer = "/usr/local/bin/abc2midi"
//!
//! [logging]
//! level = "tunedeck=debug,abc=info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files, discover_config_files_with_override, expand_path, ConfigSources};
pub use sections::{AudioConfig, LoggingConfig, PlaybackConfig, PreviewConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete tunedeck configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeckConfig {
    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DeckConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/tunedeck/config.toml`
    /// 3. `~/.config/tunedeck/config.toml`
    /// 4. `./tunedeck.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, using `config_path` in place of `./tunedeck.toml`.
    ///
    /// System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = DeckConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            loader::load_into(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let body = toml::to_string_pretty(self).unwrap_or_default();
        format!("# tunedeck configuration\n\n{}", body)
    }
}
