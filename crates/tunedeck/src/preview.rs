//! Keystroke note preview.
//!
//! A [`PreviewVoice`] sounds one note at a time. Each note gets a delayed
//! note-off on a tokio timer; a newer note pre-empts the old one. The
//! whole switch (old note off, timer cancelled, new note on, new timer
//! armed) happens under one mutex, and every timer carries the token of
//! the note it was armed for, so a timer that fires late finds a
//! different token and does nothing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use deckconf::PreviewConfig;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::SoundEngine;
use crate::error::{DeckError, EngineError};
use crate::synth::instrument_program;

#[derive(Debug)]
struct Sounding {
    key: u8,
    channel: u8,
    token: u64,
    timer: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct VoiceState {
    sounding: Option<Sounding>,
    next_token: u64,
    duration: Duration,
    velocity: u8,
    channel: u8,
    program: u8,
}

/// One monophonic preview voice. Clones share the same voice.
///
/// Without an engine (soundless) every operation succeeds and does nothing.
#[derive(Clone)]
pub struct PreviewVoice {
    state: Arc<Mutex<VoiceState>>,
    engine: Option<Arc<dyn SoundEngine>>,
}

impl PreviewVoice {
    pub fn new(engine: Option<Arc<dyn SoundEngine>>, config: &PreviewConfig) -> Self {
        let program = instrument_program(&config.instrument).unwrap_or_else(|| {
            warn!(
                "unknown preview instrument '{}', using Acoustic Grand Piano",
                config.instrument
            );
            0
        });
        let channel = if config.channel > 15 {
            warn!("preview channel {} out of range, using 0", config.channel);
            0
        } else {
            config.channel
        };

        let voice = PreviewVoice {
            state: Arc::new(Mutex::new(VoiceState {
                sounding: None,
                next_token: 0,
                duration: Duration::from_millis(config.duration_ms),
                velocity: config.velocity.min(127),
                channel,
                program,
            })),
            engine,
        };

        if let Some(engine) = &voice.engine {
            if let Err(e) = engine.program_change(channel, program) {
                warn!("could not select preview instrument: {}", e);
            }
        }
        voice
    }

    pub fn soundless(config: &PreviewConfig) -> Self {
        Self::new(None, config)
    }

    pub fn has_sound(&self) -> bool {
        self.engine.is_some()
    }

    /// Sound `key`, cutting off whatever the voice was playing
    pub fn play_note(&self, key: u8) -> Result<(), EngineError> {
        let Some(engine) = &self.engine else {
            return Ok(());
        };
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| EngineError::Backend(format!("no async runtime for preview: {}", e)))?;

        let mut state = self.state.lock().expect("preview voice mutex poisoned");
        if let Some(old) = state.sounding.take() {
            release(engine.as_ref(), old);
        }

        let channel = state.channel;
        engine.note_on(channel, key, state.velocity)?;

        let token = state.next_token;
        state.next_token += 1;
        let timer = runtime.spawn(note_off_later(
            self.state.clone(),
            engine.clone(),
            token,
            state.duration,
        ));
        state.sounding = Some(Sounding {
            key,
            channel,
            token,
            timer: Some(timer),
        });
        debug!("preview note {} on channel {}", key, channel);
        Ok(())
    }

    /// Sound an ABC note token such as `^f` or `C,`
    pub fn play_token(&self, token: &str) -> Result<u8, DeckError> {
        let key = abc::note_token_to_midi(token)?;
        self.play_note(key)?;
        Ok(key)
    }

    /// Stop the sounding note now, if any
    pub fn silence(&self) {
        let Some(engine) = &self.engine else {
            return;
        };
        let mut state = self.state.lock().expect("preview voice mutex poisoned");
        if let Some(old) = state.sounding.take() {
            release(engine.as_ref(), old);
        }
    }

    /// The key currently sounding
    pub fn sounding_note(&self) -> Option<u8> {
        self.state
            .lock()
            .expect("preview voice mutex poisoned")
            .sounding
            .as_ref()
            .map(|s| s.key)
    }

    pub fn channel(&self) -> u8 {
        self.state.lock().expect("preview voice mutex poisoned").channel
    }

    pub fn program(&self) -> u8 {
        self.state.lock().expect("preview voice mutex poisoned").program
    }

    /// Switch instrument by name, returning its program number
    pub fn set_instrument(&self, name: &str) -> Result<u8, EngineError> {
        let program =
            instrument_program(name).ok_or_else(|| EngineError::UnknownInstrument(name.to_string()))?;
        let mut state = self.state.lock().expect("preview voice mutex poisoned");
        state.program = program;
        if let Some(engine) = &self.engine {
            engine.program_change(state.channel, program)?;
        }
        Ok(program)
    }

    /// Move the voice to another channel, taking the instrument along
    pub fn set_channel(&self, channel: u8) -> Result<(), EngineError> {
        if channel > 15 {
            return Err(EngineError::InvalidChannel(channel));
        }
        let mut state = self.state.lock().expect("preview voice mutex poisoned");
        if let Some(engine) = &self.engine {
            if let Some(old) = state.sounding.take() {
                release(engine.as_ref(), old);
            }
            engine.program_change(channel, state.program)?;
        }
        state.channel = channel;
        Ok(())
    }
}

/// Note-off for a pre-empted or silenced note; the caller holds the lock
fn release(engine: &dyn SoundEngine, sounding: Sounding) {
    if let Some(timer) = sounding.timer {
        timer.abort();
    }
    if let Err(e) = engine.note_off(sounding.channel, sounding.key) {
        warn!("preview note off failed: {}", e);
    }
}

async fn note_off_later(
    state: Arc<Mutex<VoiceState>>,
    engine: Arc<dyn SoundEngine>,
    token: u64,
    duration: Duration,
) {
    tokio::time::sleep(duration).await;

    let mut state = state.lock().expect("preview voice mutex poisoned");
    let current = state.sounding.as_ref().map(|s| s.token);
    if current != Some(token) {
        return;
    }
    if let Some(sounding) = state.sounding.take() {
        if let Err(e) = engine.note_off(sounding.channel, sounding.key) {
            warn!("preview note off failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineEvent, RecordingEngine};
    use pretty_assertions::assert_eq;

    fn voice_with(engine: &Arc<RecordingEngine>) -> PreviewVoice {
        let voice = PreviewVoice::new(Some(engine.clone()), &PreviewConfig::default());
        engine.take_events();
        voice
    }

    #[tokio::test(start_paused = true)]
    async fn test_note_ends_after_duration() {
        let engine = Arc::new(RecordingEngine::new());
        let voice = voice_with(&engine);

        voice.play_note(66).unwrap();
        assert_eq!(voice.sounding_note(), Some(66));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(engine.note_offs(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(voice.sounding_note(), None);
        assert_eq!(
            engine.events(),
            vec![
                EngineEvent::NoteOn {
                    channel: 0,
                    key: 66,
                    velocity: 100
                },
                EngineEvent::NoteOff { channel: 0, key: 66 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_typing_one_off_per_on() {
        let engine = Arc::new(RecordingEngine::new());
        let voice = voice_with(&engine);

        for key in [60, 62, 64, 65, 67, 69, 71, 72] {
            voice.play_note(key).unwrap();
            tokio::time::sleep(Duration::from_millis(120)).await;
        }
        tokio::time::sleep(Duration::from_secs(2)).await;

        let events = engine.events();
        assert_eq!(engine.note_ons(), 8);
        assert_eq!(engine.note_offs(), 8);
        for key in [60, 62, 64, 65, 67, 69, 71, 72] {
            let offs = events
                .iter()
                .filter(|e| matches!(e, EngineEvent::NoteOff { key: k, .. } if *k == key))
                .count();
            assert_eq!(offs, 1, "key {} should be released exactly once", key);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_keeps_newer_note() {
        let engine = Arc::new(RecordingEngine::new());
        let voice = voice_with(&engine);

        voice.play_note(60).unwrap();
        tokio::time::sleep(Duration::from_millis(450)).await;
        voice.play_note(60).unwrap();

        // The first note's timer would have fired at 500 ms
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(voice.sounding_note(), Some(60));
        assert_eq!(engine.note_offs(), 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(voice.sounding_note(), None);
        assert_eq!(engine.note_offs(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence() {
        let engine = Arc::new(RecordingEngine::new());
        let voice = voice_with(&engine);

        voice.play_note(72).unwrap();
        voice.silence();
        voice.silence();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(engine.note_ons(), 1);
        assert_eq!(engine.note_offs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_token() {
        let engine = Arc::new(RecordingEngine::new());
        let voice = voice_with(&engine);

        assert_eq!(voice.play_token("^f").unwrap(), 78);
        assert!(matches!(
            voice.play_token("H"),
            Err(DeckError::Abc(abc::AbcError::InvalidNoteToken(_)))
        ));
        assert_eq!(voice.sounding_note(), Some(78));
    }

    #[tokio::test]
    async fn test_soundless_voice_does_nothing() {
        let voice = PreviewVoice::soundless(&PreviewConfig::default());
        assert!(!voice.has_sound());
        voice.play_note(60).unwrap();
        assert_eq!(voice.sounding_note(), None);
        assert_eq!(voice.set_instrument("Flute").unwrap(), 73);
        voice.set_channel(3).unwrap();
        voice.silence();
    }

    #[test]
    fn test_instrument_and_channel_selection() {
        let engine = Arc::new(RecordingEngine::new());
        let voice = voice_with(&engine);

        assert_eq!(voice.set_instrument("Fiddle").unwrap(), 110);
        voice.set_channel(2).unwrap();
        assert!(matches!(
            voice.set_instrument("Theremin"),
            Err(EngineError::UnknownInstrument(_))
        ));
        assert!(matches!(
            voice.set_channel(16),
            Err(EngineError::InvalidChannel(16))
        ));

        assert_eq!(voice.channel(), 2);
        assert_eq!(voice.program(), 110);
        assert_eq!(
            engine.events(),
            vec![
                EngineEvent::ProgramChange {
                    channel: 0,
                    program: 110
                },
                EngineEvent::ProgramChange {
                    channel: 2,
                    program: 110
                },
            ]
        );
    }

    #[test]
    fn test_initial_program_from_config() {
        let engine = Arc::new(RecordingEngine::new());
        let config = PreviewConfig {
            instrument: "Accordion".to_string(),
            channel: 1,
            ..PreviewConfig::default()
        };
        let _voice = PreviewVoice::new(Some(engine.clone()), &config);
        assert_eq!(
            engine.events(),
            vec![EngineEvent::ProgramChange {
                channel: 1,
                program: 21
            }]
        );
    }
}
