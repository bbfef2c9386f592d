//! The deck: one open tune, its tempo, the preview voice and the player.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use abc::{
    current_raw_tune, default_tempo, note_to_play, scan_tune, AbcTempo, EditBuffer, Feedback,
    FeedbackLevel, ScanMode, Speed, TextBuffer, TuneHeader,
};
use deckconf::DeckConfig;
use tracing::{debug, info, warn};

use crate::controller::{LoopMode, PlaybackController, PlaybackState};
use crate::engine::PlayerFactory;
use crate::error::DeckError;
use crate::preview::PreviewVoice;
use crate::render::{RenderedTune, TuneRenderer};

/// Tempo bounds for the bpm entry
pub const MIN_BPM: u32 = 1;
pub const MAX_BPM: u32 = 999;

/// Step of the speed up / slow down buttons, in bpm
pub const BPM_STEP: u32 = 2;

/// A tune set up for playback
#[derive(Debug)]
pub struct OpenTune {
    pub header: TuneHeader,
    pub feedback: Vec<Feedback>,
    pub raw: Vec<String>,
    rendered: RenderedTune,
}

impl OpenTune {
    pub fn midi_path(&self) -> &Path {
        self.rendered.midi_path()
    }
}

pub struct Deck {
    voice: PreviewVoice,
    controller: PlaybackController,
    renderer: Box<dyn TuneRenderer>,
    tune: Option<OpenTune>,
    tempo: AbcTempo,
    default_repeat: u32,
}

impl Deck {
    pub fn new(
        voice: PreviewVoice,
        factory: Arc<dyn PlayerFactory>,
        renderer: Box<dyn TuneRenderer>,
        config: &DeckConfig,
    ) -> Self {
        let controller = PlaybackController::new(
            factory,
            Duration::from_millis(config.playback.poll_interval_ms),
        )
        .with_voice(voice.clone());

        Deck {
            voice,
            controller,
            renderer,
            tune: None,
            tempo: default_tempo(None, Speed::Medium),
            default_repeat: config.playback.default_repeat.max(1),
        }
    }

    pub fn voice(&self) -> &PreviewVoice {
        &self.voice
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController {
        &mut self.controller
    }

    pub fn tune(&self) -> Option<&OpenTune> {
        self.tune.as_ref()
    }

    /// The tempo shown to the user, in the tune's own beat unit
    pub fn tempo(&self) -> AbcTempo {
        self.tempo
    }

    /// Set up the tune under the cursor for playback.
    ///
    /// The previously open tune is stopped and its rendered file removed
    /// first, even if the new one fails to parse or render.
    pub fn open_tune<B: EditBuffer + ?Sized>(&mut self, buffer: &B) -> Result<&OpenTune, DeckError> {
        self.close_tune();

        let raw = current_raw_tune(buffer)?;
        let parsed = scan_tune(&raw, ScanMode::FullTune)?;
        for note in &parsed.feedback {
            if note.level == FeedbackLevel::Warning {
                warn!("line {}: {}", note.line, note.message);
            }
        }

        let rendered = self.renderer.render(&raw)?;
        self.controller
            .set_playlist(vec![rendered.midi_path().to_path_buf()]);
        info!(
            "opened X:{} '{}' ({})",
            parsed.value.reference,
            parsed.value.title(),
            rendered.midi_path().display()
        );

        let tune = self.tune.insert(OpenTune {
            header: parsed.value,
            feedback: parsed.feedback,
            raw,
            rendered,
        });
        let header = tune.header.clone();
        self.apply_tune_tempo(&header)?;

        self.tune
            .as_ref()
            .ok_or(DeckError::NoTune)
    }

    /// Stop playback and delete the rendered file
    pub fn close_tune(&mut self) {
        self.controller.set_playlist(Vec::new());
        if let Some(old) = self.tune.take() {
            debug!("removing {}", old.midi_path().display());
        }
    }

    pub fn play(&mut self) -> Result<(), DeckError> {
        if self.tune.is_none() {
            return Err(DeckError::NoTune);
        }
        self.controller.play()
    }

    pub fn pause(&mut self) -> Result<(), DeckError> {
        self.controller.pause()
    }

    pub fn stop(&mut self) {
        self.controller.stop();
    }

    /// Play-or-pause, as one button does
    pub fn toggle_play(&mut self) -> Result<PlaybackState, DeckError> {
        match self.controller.state() {
            PlaybackState::Playing => self.pause()?,
            PlaybackState::Paused | PlaybackState::Stopped => self.play()?,
        }
        Ok(self.controller.state())
    }

    /// Back to the tune's own `Q:`, or the rhythm's medium tempo without one
    pub fn reset_tempo(&mut self) -> Result<AbcTempo, DeckError> {
        let header = self
            .tune
            .as_ref()
            .map(|t| t.header.clone())
            .unwrap_or_default();
        self.apply_tune_tempo(&header)?;
        Ok(self.tempo)
    }

    fn apply_tune_tempo(&mut self, header: &TuneHeader) -> Result<(), DeckError> {
        match header.tempo {
            // The rendered file already carries this tempo
            Some(tempo) => {
                self.tempo = tempo.into();
                self.controller.reset_tempo()
            }
            None => {
                self.tempo = default_tempo(header.rhythm.as_deref(), Speed::Medium);
                self.send_tempo()
            }
        }
    }

    /// Switch to the slow, medium or fast tempo for the tune's rhythm
    pub fn set_speed(&mut self, speed: Speed) -> Result<AbcTempo, DeckError> {
        let rhythm = self.tune.as_ref().and_then(|t| t.header.rhythm.clone());
        self.tempo = default_tempo(rhythm.as_deref(), speed);
        debug!("{:?} tempo for {:?}: {}", speed, rhythm, self.tempo);
        self.send_tempo()?;
        Ok(self.tempo)
    }

    /// Set the bpm, clamped to 1..=999
    pub fn set_bpm(&mut self, bpm: u32) -> Result<AbcTempo, DeckError> {
        self.tempo.set_bpm(bpm.clamp(MIN_BPM, MAX_BPM))?;
        self.send_tempo()?;
        Ok(self.tempo)
    }

    /// Bpm typed by the user; text that is not a number keeps the tempo
    pub fn set_bpm_from_text(&mut self, text: &str) -> Result<AbcTempo, DeckError> {
        match text.trim().parse::<i64>() {
            Ok(bpm) => {
                let bpm = bpm.clamp(MIN_BPM as i64, MAX_BPM as i64) as u32;
                self.set_bpm(bpm)
            }
            Err(_) => {
                debug!("ignoring tempo entry '{}'", text);
                Ok(self.tempo)
            }
        }
    }

    pub fn speed_up(&mut self) -> Result<AbcTempo, DeckError> {
        self.set_bpm(self.tempo.bpm().saturating_add(BPM_STEP))
    }

    pub fn slow_down(&mut self) -> Result<AbcTempo, DeckError> {
        self.set_bpm(self.tempo.bpm().saturating_sub(BPM_STEP))
    }

    fn send_tempo(&mut self) -> Result<(), DeckError> {
        self.controller.set_tempo_bpm(self.tempo.qpm().max(1))
    }

    /// Next loop mode: no loop, loop forever, repeat n times, no loop...
    ///
    /// `repeat_text` is the repeat count entry; when it is not a positive
    /// number the configured default count is used.
    pub fn toggle_loop(&mut self, repeat_text: &str) -> Result<LoopMode, DeckError> {
        let next = match self.controller.loop_mode() {
            LoopMode::NoLoop => LoopMode::LoopForever,
            LoopMode::LoopForever => {
                let count = repeat_text
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|&n| n > 0)
                    .unwrap_or(self.default_repeat);
                LoopMode::Repeat(count)
            }
            LoopMode::Repeat(_) => LoopMode::NoLoop,
        };
        self.controller.set_loop_mode(next)?;
        Ok(next)
    }

    /// Repeat count typed while repeating; invalid text keeps the count
    pub fn set_repeat_from_text(&mut self, text: &str) -> LoopMode {
        if let Err(e) = self.controller.set_repeat_from_text(text) {
            debug!("{}", e);
        }
        self.controller.loop_mode()
    }

    /// Preview the note for a key pressed at the buffer's cursor.
    ///
    /// Returns the MIDI number sounded. Never fails: anything that is not
    /// a playable note is silently skipped.
    pub fn on_keystroke<B: EditBuffer + ?Sized>(&self, buffer: &B, key: char) -> Option<u8> {
        let token = note_to_play(buffer, key)?;
        match self.voice.play_token(&token) {
            Ok(midi) => Some(midi),
            Err(e) => {
                debug!("no preview for '{}': {}", token, e);
                None
            }
        }
    }

    /// Preview `key` then insert it into the buffer, as the editor does
    pub fn type_key(&self, buffer: &mut TextBuffer, key: char) -> Option<u8> {
        let sounded = self.on_keystroke(buffer, key);
        let mut text = [0u8; 4];
        buffer.insert(key.encode_utf8(&mut text));
        sounded
    }

    pub fn select_instrument(&self, name: &str) -> Result<u8, DeckError> {
        Ok(self.voice.set_instrument(name)?)
    }

    pub fn select_channel(&self, channel: u8) -> Result<(), DeckError> {
        Ok(self.voice.set_channel(channel)?)
    }
}
