//! Synth setup: pick an engine, load a soundfont, or fall back to silence.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use deckconf::AudioConfig;
use tracing::{info, warn};

use crate::engine::SoundEngine;
use crate::error::EngineError;

/// Instruments offered for preview, with their General MIDI programs
pub const INSTRUMENTS: &[(&str, u8)] = &[
    ("Acoustic Grand Piano", 0),
    ("Accordion", 21),
    ("Flute", 73),
    ("Fiddle", 110),
];

/// General MIDI program for an instrument name (case-insensitive)
pub fn instrument_program(name: &str) -> Option<u8> {
    let name = name.trim();
    INSTRUMENTS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, program)| program)
}

/// Check that `path` is a readable SoundFont 2 file (RIFF form type `sfbk`)
pub fn check_soundfont(path: &Path) -> Result<(), EngineError> {
    let mut header = [0u8; 12];
    File::open(path)?.read_exact(&mut header)?;
    if &header[0..4] != b"RIFF" || &header[8..12] != b"sfbk" {
        return Err(EngineError::Backend(format!(
            "{} is not a soundfont",
            path.display()
        )));
    }
    Ok(())
}

/// Open the engine the audio config asks for.
#[cfg(feature = "midi-port")]
pub fn connect(audio: &AudioConfig) -> Result<Arc<dyn SoundEngine>, EngineError> {
    match &audio.midi_port {
        Some(pattern) => {
            let engine = crate::midi_port::MidiPortEngine::open(pattern)?;
            Ok(Arc::new(engine))
        }
        None => Err(EngineError::NoDriver(
            "no MIDI output port configured ([audio] midi_port)".to_string(),
        )),
    }
}

/// Open the engine the audio config asks for.
#[cfg(not(feature = "midi-port"))]
pub fn connect(audio: &AudioConfig) -> Result<Arc<dyn SoundEngine>, EngineError> {
    let wanted = audio.midi_port.as_deref().unwrap_or("none configured");
    Err(EngineError::NoDriver(format!(
        "built without the midi-port feature (port: {})",
        wanted
    )))
}

/// The preview synth: an engine with a soundfont loaded, or nothing.
///
/// Setup failures are kept (and logged once) instead of returned, so the
/// rest of the deck always has a synth to talk to.
pub struct Synth {
    engine: Option<Arc<dyn SoundEngine>>,
    soundfont: Option<PathBuf>,
    setup_error: Option<String>,
}

impl Synth {
    pub fn start(audio: &AudioConfig) -> Self {
        Self::with_engine(connect(audio), &audio.soundfonts)
    }

    pub fn with_engine(
        engine: Result<Arc<dyn SoundEngine>, EngineError>,
        soundfonts: &[PathBuf],
    ) -> Self {
        let setup = engine.and_then(|engine| {
            let soundfont = load_first_soundfont(engine.as_ref(), soundfonts)?;
            Ok((engine, soundfont))
        });

        match setup {
            Ok((engine, soundfont)) => {
                info!("synth ready with soundfont {}", soundfont.display());
                Synth {
                    engine: Some(engine),
                    soundfont: Some(soundfont),
                    setup_error: None,
                }
            }
            Err(e) => {
                warn!("sound disabled: {}", e);
                Synth {
                    engine: None,
                    soundfont: None,
                    setup_error: Some(e.to_string()),
                }
            }
        }
    }

    /// A synth that never makes a sound
    pub fn soundless() -> Self {
        Synth {
            engine: None,
            soundfont: None,
            setup_error: None,
        }
    }

    pub fn engine(&self) -> Option<Arc<dyn SoundEngine>> {
        self.engine.clone()
    }

    pub fn has_sound(&self) -> bool {
        self.engine.is_some()
    }

    pub fn soundfont(&self) -> Option<&Path> {
        self.soundfont.as_deref()
    }

    /// Why sound is unavailable, when setup failed
    pub fn setup_error(&self) -> Option<&str> {
        self.setup_error.as_deref()
    }
}

fn load_first_soundfont(
    engine: &dyn SoundEngine,
    candidates: &[PathBuf],
) -> Result<PathBuf, EngineError> {
    for path in candidates {
        match engine.load_soundfont(path) {
            Ok(()) => return Ok(path.clone()),
            Err(e) => info!("skipping soundfont {}: {}", path.display(), e),
        }
    }
    Err(EngineError::NoSoundfont(candidates.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineEvent, RecordingEngine};
    use std::io::Write;

    fn fake_soundfont() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".sf2").tempfile().unwrap();
        file.write_all(b"RIFF\x04\x00\x00\x00sfbkLIST").unwrap();
        file
    }

    #[test]
    fn test_instrument_program() {
        assert_eq!(instrument_program("Fiddle"), Some(110));
        assert_eq!(instrument_program("accordion"), Some(21));
        assert_eq!(instrument_program(" Flute "), Some(73));
        assert_eq!(instrument_program("Bagpipe"), None);
    }

    #[test]
    fn test_check_soundfont() {
        let good = fake_soundfont();
        assert!(check_soundfont(good.path()).is_ok());

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        bad.write_all(b"RIFF\x04\x00\x00\x00WAVEfmt ").unwrap();
        assert!(matches!(
            check_soundfont(bad.path()),
            Err(EngineError::Backend(_))
        ));

        assert!(matches!(
            check_soundfont(Path::new("/nonexistent/a.sf2")),
            Err(EngineError::Io(_))
        ));
    }

    #[test]
    fn test_first_loadable_soundfont_wins() {
        let good = fake_soundfont();
        let engine = Arc::new(RecordingEngine::new());
        let candidates = vec![
            PathBuf::from("/nonexistent/FluidR3_GM.sf2"),
            good.path().to_path_buf(),
        ];

        let synth = Synth::with_engine(Ok(engine.clone()), &candidates);
        assert!(synth.has_sound());
        assert_eq!(synth.soundfont(), Some(good.path()));
        assert_eq!(
            engine.events(),
            vec![EngineEvent::SoundfontLoaded {
                path: good.path().to_path_buf()
            }]
        );
    }

    #[test]
    fn test_no_soundfont_is_soundless() {
        let engine = Arc::new(RecordingEngine::new());
        let synth = Synth::with_engine(Ok(engine), &[PathBuf::from("/nonexistent/a.sf2")]);
        assert!(!synth.has_sound());
        assert!(synth.setup_error().unwrap().contains("No soundfont"));
    }

    #[test]
    fn test_no_driver_is_soundless() {
        let synth = Synth::with_engine(
            Err(EngineError::NoDriver("alsa".to_string())),
            &[PathBuf::from("/usr/share/sounds/sf2/FluidR3_GM.sf2")],
        );
        assert!(!synth.has_sound());
        assert!(synth.engine().is_none());
        assert!(synth.setup_error().unwrap().contains("alsa"));
    }

    #[cfg(not(feature = "midi-port"))]
    #[test]
    fn test_connect_without_port_support() {
        let err = connect(&AudioConfig::default()).err().unwrap();
        assert!(matches!(err, EngineError::NoDriver(_)));
    }
}
