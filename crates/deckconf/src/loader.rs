//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, DeckConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/tunedeck/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("tunedeck/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("tunedeck.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load a TOML file on top of `config`. Keys absent from the file keep
/// their current value.
pub fn load_into(config: &mut DeckConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    apply_toml(config, &contents, path)
}

/// Load config from a single TOML file over compiled defaults.
pub fn load_from_file(path: &Path) -> Result<DeckConfig, ConfigError> {
    let mut config = DeckConfig::default();
    load_into(&mut config, path)?;
    Ok(config)
}

fn parse_error(path: &Path, message: impl Into<String>) -> ConfigError {
    ConfigError::Parse {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn int_in_range<T: TryFrom<i64>>(
    table: &toml::Table,
    section: &str,
    key: &str,
    path: &Path,
) -> Result<Option<T>, ConfigError> {
    match table.get(key).and_then(|v| v.as_integer()) {
        Some(v) => T::try_from(v)
            .map(Some)
            .map_err(|_| parse_error(path, format!("{}.{} out of range: {}", section, key, v))),
        None => Ok(None),
    }
}

/// Overlay the keys present in a TOML document onto `config`.
pub(crate) fn apply_toml(
    config: &mut DeckConfig,
    contents: &str,
    path: &Path,
) -> Result<(), ConfigError> {
    let table: toml::Table = contents
        .parse()
        .map_err(|e: toml::de::Error| parse_error(path, e.to_string()))?;

    if let Some(audio) = table.get("audio").and_then(|v| v.as_table()) {
        if let Some(fonts) = audio.get("soundfonts").and_then(|v| v.as_array()) {
            config.audio.soundfonts = fonts
                .iter()
                .filter_map(|v| v.as_str())
                .map(expand_path)
                .collect();
        }
        if let Some(v) = audio.get("midi_port").and_then(|v| v.as_str()) {
            config.audio.midi_port = Some(v.to_string());
        }
    }

    if let Some(preview) = table.get("preview").and_then(|v| v.as_table()) {
        if let Some(v) = int_in_range::<u64>(preview, "preview", "duration_ms", path)? {
            config.preview.duration_ms = v;
        }
        if let Some(v) = int_in_range::<u8>(preview, "preview", "velocity", path)? {
            if !(1..=127).contains(&v) {
                return Err(parse_error(path, format!("preview.velocity out of range: {}", v)));
            }
            config.preview.velocity = v;
        }
        if let Some(v) = int_in_range::<u8>(preview, "preview", "channel", path)? {
            if v > 15 {
                return Err(parse_error(path, format!("preview.channel out of range: {}", v)));
            }
            config.preview.channel = v;
        }
        if let Some(v) = preview.get("instrument").and_then(|v| v.as_str()) {
            config.preview.instrument = v.to_string();
        }
    }

    if let Some(playback) = table.get("playback").and_then(|v| v.as_table()) {
        if let Some(v) = int_in_range::<u64>(playback, "playback", "poll_interval_ms", path)? {
            config.playback.poll_interval_ms = v.max(1);
        }
        if let Some(v) = int_in_range::<u32>(playback, "playback", "default_repeat", path)? {
            config.playback.default_repeat = v.max(1);
        }
        if let Some(v) = playback.get("renderer").and_then(|v| v.as_str()) {
            config.playback.renderer = expand_path(v).to_string_lossy().into_owned();
        }
    }

    if let Some(logging) = table.get("logging").and_then(|v| v.as_table()) {
        if let Some(v) = logging.get("level").and_then(|v| v.as_str()) {
            config.logging.level = v.to_string();
        }
    }

    Ok(())
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut DeckConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, env::vars());
}

/// Apply overrides from an explicit set of variables.
///
/// Values that do not parse are skipped.
pub fn apply_overrides_from(
    config: &mut DeckConfig,
    sources: &mut ConfigSources,
    vars: impl IntoIterator<Item = (String, String)>,
) {
    let mut rust_log = None;

    for (key, value) in vars {
        let applied = match key.as_str() {
            // Colon separated, like PATH
            "TUNEDECK_SOUNDFONTS" => {
                config.audio.soundfonts = value
                    .split(':')
                    .filter(|s| !s.is_empty())
                    .map(expand_path)
                    .collect();
                true
            }
            "TUNEDECK_MIDI_PORT" => {
                config.audio.midi_port = Some(value);
                true
            }
            "TUNEDECK_PREVIEW_DURATION_MS" => value
                .parse()
                .map(|v| config.preview.duration_ms = v)
                .is_ok(),
            "TUNEDECK_PREVIEW_VELOCITY" => match value.parse::<u8>() {
                Ok(v) if (1..=127).contains(&v) => {
                    config.preview.velocity = v;
                    true
                }
                _ => false,
            },
            "TUNEDECK_INSTRUMENT" => {
                config.preview.instrument = value;
                true
            }
            "TUNEDECK_POLL_INTERVAL_MS" => match value.parse::<u64>() {
                Ok(v) if v > 0 => {
                    config.playback.poll_interval_ms = v;
                    true
                }
                _ => false,
            },
            "TUNEDECK_RENDERER" => {
                config.playback.renderer = value;
                true
            }
            "TUNEDECK_LOG_LEVEL" => {
                config.logging.level = value;
                true
            }
            "RUST_LOG" => {
                rust_log = Some(value);
                false
            }
            _ => false,
        };

        if applied {
            sources.env_overrides.push(key);
        }
    }

    // RUST_LOG wins over TUNEDECK_LOG_LEVEL whatever the iteration order
    if let Some(v) = rust_log {
        config.logging.level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let expanded = expand_path("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_path_unknown_var_is_kept() {
        let expanded = expand_path("$TUNEDECK_SURELY_UNSET_VAR/sf2");
        assert_eq!(expanded, PathBuf::from("$TUNEDECK_SURELY_UNSET_VAR/sf2"));
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_apply_minimal_toml() {
        let toml = r#"
[preview]
instrument = "Fiddle"
"#;
        let mut config = DeckConfig::default();
        apply_toml(&mut config, toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.preview.instrument, "Fiddle");
        // Other values should be defaults
        assert_eq!(config.preview.duration_ms, 500);
        assert_eq!(config.audio.soundfonts.len(), 2);
    }

    #[test]
    fn test_apply_full_toml() {
        let toml = r#"
[audio]
soundfonts = ["/my/soundfonts/a.sf2"]
midi_port = "FLUID Synth"

[preview]
duration_ms = 300
velocity = 64
channel = 2
instrument = "Flute"

[playback]
poll_interval_ms = 250
default_repeat = 5
renderer = "/opt/abcmidi/abc2midi"

[logging]
level = "debug"
"#;
        let mut config = DeckConfig::default();
        apply_toml(&mut config, toml, Path::new("test.toml")).unwrap();

        assert_eq!(config.audio.soundfonts, vec![PathBuf::from("/my/soundfonts/a.sf2")]);
        assert_eq!(config.audio.midi_port.as_deref(), Some("FLUID Synth"));
        assert_eq!(config.preview.duration_ms, 300);
        assert_eq!(config.preview.velocity, 64);
        assert_eq!(config.preview.channel, 2);
        assert_eq!(config.preview.instrument, "Flute");
        assert_eq!(config.playback.poll_interval_ms, 250);
        assert_eq!(config.playback.default_repeat, 5);
        assert_eq!(config.playback.renderer, "/opt/abcmidi/abc2midi");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_layers_only_override_present_keys() {
        let mut config = DeckConfig::default();
        apply_toml(
            &mut config,
            "[preview]\nvelocity = 80\ninstrument = \"Accordion\"\n",
            Path::new("user.toml"),
        )
        .unwrap();
        apply_toml(&mut config, "[preview]\nvelocity = 90\n", Path::new("local.toml")).unwrap();

        assert_eq!(config.preview.velocity, 90);
        assert_eq!(config.preview.instrument, "Accordion");
    }

    #[test]
    fn test_bad_values_are_parse_errors() {
        let mut config = DeckConfig::default();
        let err = apply_toml(&mut config, "[preview]\nvelocity = 200\n", Path::new("bad.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = apply_toml(&mut config, "[preview]\nchannel = 16\n", Path::new("bad.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("preview.channel"));

        let err = apply_toml(&mut config, "[preview\n", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = DeckConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(
            &mut config,
            &mut sources,
            vars(&[
                ("TUNEDECK_SOUNDFONTS", "/a.sf2:/b.sf2"),
                ("TUNEDECK_PREVIEW_VELOCITY", "loud"),
                ("TUNEDECK_INSTRUMENT", "Fiddle"),
                ("HOME", "/home/someone"),
            ]),
        );

        assert_eq!(
            config.audio.soundfonts,
            vec![PathBuf::from("/a.sf2"), PathBuf::from("/b.sf2")]
        );
        assert_eq!(config.preview.velocity, 100);
        assert_eq!(config.preview.instrument, "Fiddle");
        assert_eq!(
            sources.env_overrides,
            vec!["TUNEDECK_SOUNDFONTS".to_string(), "TUNEDECK_INSTRUMENT".to_string()]
        );
    }

    #[test]
    fn test_rust_log_wins() {
        let mut config = DeckConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(
            &mut config,
            &mut sources,
            vars(&[("RUST_LOG", "trace"), ("TUNEDECK_LOG_LEVEL", "warn")]),
        );
        assert_eq!(config.logging.level, "trace");
    }
}
