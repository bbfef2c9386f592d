//! Rendering a tune to a MIDI file with an external converter.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::RenderError;

/// A rendered tune. The files are deleted when this is dropped.
#[derive(Debug)]
pub struct RenderedTune {
    dir: TempDir,
    midi: PathBuf,
}

impl RenderedTune {
    /// Take ownership of a MIDI file written into `dir`
    pub fn new(dir: TempDir, midi: PathBuf) -> Self {
        RenderedTune { dir, midi }
    }

    pub fn midi_path(&self) -> &Path {
        &self.midi
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Turns the lines of one ABC tune into a playable MIDI file
pub trait TuneRenderer: Send + Sync {
    fn render(&self, tune: &[String]) -> Result<RenderedTune, RenderError>;
}

/// Runs `<program> tune.abc -o tune.mid` in a fresh temporary directory
#[derive(Debug, Clone)]
pub struct Abc2MidiCommand {
    program: String,
}

impl Abc2MidiCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Abc2MidiCommand {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for Abc2MidiCommand {
    fn default() -> Self {
        Self::new("abc2midi")
    }
}

impl TuneRenderer for Abc2MidiCommand {
    fn render(&self, tune: &[String]) -> Result<RenderedTune, RenderError> {
        let dir = tempfile::Builder::new().prefix("tunedeck-").tempdir()?;
        let abc_path = dir.path().join("tune.abc");
        let midi_path = dir.path().join("tune.mid");

        let mut text = tune.join("\n");
        text.push('\n');
        std::fs::write(&abc_path, text)?;

        debug!("running {} on {}", self.program, abc_path.display());
        let output = Command::new(&self.program)
            .arg(&abc_path)
            .arg("-o")
            .arg(&midi_path)
            .output()
            .map_err(|source| RenderError::Spawn {
                command: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            warn!(
                "{} failed ({})\nstdout: {}\nstderr: {}",
                self.program,
                output.status,
                stdout.trim(),
                stderr.trim()
            );
            return Err(RenderError::Failed {
                command: self.program.clone(),
                status: output.status.to_string(),
            });
        }
        if !stdout.trim().is_empty() {
            debug!("{}: {}", self.program, stdout.trim());
        }

        if !midi_path.is_file() {
            return Err(RenderError::NoOutput {
                command: self.program.clone(),
            });
        }
        Ok(RenderedTune::new(dir, midi_path))
    }
}
