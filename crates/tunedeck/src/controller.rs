//! Whole-tune playback: play, pause, stop, loop and tempo control.
//!
//! The controller owns at most one [`FilePlayer`]. Pausing halts it in
//! place; stopping throws it away, because a player cannot rewind. While
//! playing, a poll task publishes a [`PlaybackReadout`] on a watch channel.
//! The poll task checks its generation under the controller lock on every
//! tick and ends as soon as the controller pauses, stops or is dropped.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::{FilePlayer, PlayerFactory, PlayerStatus, PlayerTempo};
use crate::error::{DeckError, EngineError};
use crate::preview::PreviewVoice;

/// Smallest and largest tempo scale factor reachable by quick-adjust
pub const SCALE_MIN: f64 = 0.1;
pub const SCALE_MAX: f64 = 10.0;
pub const SCALE_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    NoLoop,
    LoopForever,
    Repeat(u32),
}

impl LoopMode {
    /// Count as the player understands it: -1 plays forever
    pub fn count(&self) -> i32 {
        match *self {
            LoopMode::NoLoop => 1,
            LoopMode::LoopForever => -1,
            LoopMode::Repeat(n) => i32::try_from(n).unwrap_or(i32::MAX),
        }
    }
}

/// What overrides the tempo written in the rendered file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TempoOverride {
    #[default]
    FromFile,
    /// Quarter notes per minute
    Bpm(u32),
    Scale(f64),
}

impl TempoOverride {
    pub fn player_tempo(&self) -> PlayerTempo {
        match *self {
            TempoOverride::FromFile => PlayerTempo::Internal,
            TempoOverride::Bpm(bpm) => PlayerTempo::External(bpm),
            TempoOverride::Scale(f) if f == 1.0 => PlayerTempo::Internal,
            TempoOverride::Scale(f) => PlayerTempo::Scaled(f),
        }
    }
}

/// Position and tempo as last observed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackReadout {
    pub state: PlaybackState,
    pub current_tick: u64,
    pub total_ticks: u64,
    pub bpm: f64,
    /// Microseconds per quarter note written in the file
    pub midi_tempo: u32,
}

impl PlaybackReadout {
    fn stopped() -> Self {
        PlaybackReadout {
            state: PlaybackState::Stopped,
            current_tick: 0,
            total_ticks: 0,
            bpm: 0.0,
            midi_tempo: 0,
        }
    }
}

struct Shared {
    player: Option<Box<dyn FilePlayer>>,
    state: PlaybackState,
    poll_generation: u64,
}

impl Shared {
    fn readout(&self) -> PlaybackReadout {
        match &self.player {
            Some(player) => PlaybackReadout {
                state: self.state,
                current_tick: player.current_tick(),
                total_ticks: player.total_ticks(),
                bpm: player.bpm(),
                midi_tempo: player.midi_tempo(),
            },
            None => PlaybackReadout {
                state: self.state,
                ..PlaybackReadout::stopped()
            },
        }
    }
}

pub struct PlaybackController {
    factory: Arc<dyn PlayerFactory>,
    shared: Arc<Mutex<Shared>>,
    playlist: Vec<PathBuf>,
    loop_mode: LoopMode,
    tempo: TempoOverride,
    voice: Option<PreviewVoice>,
    poll_interval: Duration,
    readout_tx: Arc<watch::Sender<PlaybackReadout>>,
    poller: Option<JoinHandle<()>>,
}

impl PlaybackController {
    pub fn new(factory: Arc<dyn PlayerFactory>, poll_interval: Duration) -> Self {
        let (readout_tx, _) = watch::channel(PlaybackReadout::stopped());
        PlaybackController {
            factory,
            shared: Arc::new(Mutex::new(Shared {
                player: None,
                state: PlaybackState::Stopped,
                poll_generation: 0,
            })),
            playlist: Vec::new(),
            loop_mode: LoopMode::NoLoop,
            tempo: TempoOverride::FromFile,
            voice: None,
            poll_interval,
            readout_tx: Arc::new(readout_tx),
            poller: None,
        }
    }

    /// Silence this preview voice before tearing the player down
    pub fn with_voice(mut self, voice: PreviewVoice) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackReadout> {
        self.readout_tx.subscribe()
    }

    /// Read the player now rather than waiting for the next poll
    pub fn readout(&self) -> PlaybackReadout {
        self.shared
            .lock()
            .expect("playback controller mutex poisoned")
            .readout()
    }

    pub fn state(&self) -> PlaybackState {
        self.shared
            .lock()
            .expect("playback controller mutex poisoned")
            .state
    }

    pub fn playlist(&self) -> &[PathBuf] {
        &self.playlist
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn tempo(&self) -> TempoOverride {
        self.tempo
    }

    /// Replace the playlist. Any playback in progress is stopped.
    pub fn set_playlist(&mut self, files: Vec<PathBuf>) {
        self.stop();
        debug!("playlist: {:?}", files);
        self.playlist = files;
    }

    pub fn play(&mut self) -> Result<(), DeckError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| EngineError::Backend(format!("no async runtime for playback: {}", e)))?;

        {
            let mut shared = self.shared.lock().expect("playback controller mutex poisoned");

            let finished = shared
                .player
                .as_ref()
                .map(|p| p.status() == PlayerStatus::Done)
                .unwrap_or(false);
            if shared.state == PlaybackState::Playing && !finished {
                return Ok(());
            }
            if finished {
                debug!("previous run finished, starting over");
                if let Some(mut player) = shared.player.take() {
                    player.stop()?;
                }
            }

            if shared.player.is_none() {
                let mut player = self.factory.create()?;
                for file in &self.playlist {
                    player.add(file)?;
                }
                player.set_loop(self.loop_mode.count())?;
                player.set_tempo(self.tempo.player_tempo())?;
                shared.player = Some(player);
            }

            if let Some(player) = shared.player.as_mut() {
                player.play()?;
            }
            shared.state = PlaybackState::Playing;
            self.readout_tx.send_replace(shared.readout());
        }

        info!("playing {} file(s)", self.playlist.len());
        self.start_poller(&runtime);
        Ok(())
    }

    /// Halt in place; `play` resumes from the same position
    pub fn pause(&mut self) -> Result<(), DeckError> {
        self.stop_poller();
        let mut shared = self.shared.lock().expect("playback controller mutex poisoned");
        if shared.state != PlaybackState::Playing {
            return Ok(());
        }
        if let Some(player) = shared.player.as_mut() {
            player.stop()?;
        }
        shared.state = PlaybackState::Paused;
        self.readout_tx.send_replace(shared.readout());
        debug!("paused");
        Ok(())
    }

    /// Halt and discard the player; the next `play` starts from the top
    pub fn stop(&mut self) {
        self.stop_poller();
        if let Some(voice) = &self.voice {
            voice.silence();
        }

        let mut shared = self.shared.lock().expect("playback controller mutex poisoned");
        if let Some(mut player) = shared.player.take() {
            if let Err(e) = player.stop() {
                debug!("player stop failed during teardown: {}", e);
            }
            debug!("stopped");
        }
        shared.state = PlaybackState::Stopped;
        self.readout_tx.send_replace(PlaybackReadout::stopped());
    }

    pub fn seek(&mut self, tick: u64) -> Result<(), DeckError> {
        let mut shared = self.shared.lock().expect("playback controller mutex poisoned");
        if let Some(player) = shared.player.as_mut() {
            player.seek(tick)?;
        }
        Ok(())
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) -> Result<(), DeckError> {
        if let LoopMode::Repeat(0) = mode {
            return Err(DeckError::InvalidRepeatCount("0".to_string()));
        }
        let mut shared = self.shared.lock().expect("playback controller mutex poisoned");
        if let Some(player) = shared.player.as_mut() {
            player.set_loop(mode.count())?;
        }
        self.loop_mode = mode;
        debug!("loop mode: {:?}", mode);
        Ok(())
    }

    /// Repeat count typed by the user; a positive integer
    pub fn set_repeat_from_text(&mut self, text: &str) -> Result<u32, DeckError> {
        let count = text
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| DeckError::InvalidRepeatCount(text.to_string()))?;
        self.set_loop_mode(LoopMode::Repeat(count))?;
        Ok(count)
    }

    /// Play at a fixed tempo in quarter notes per minute
    pub fn set_tempo_bpm(&mut self, bpm: u32) -> Result<(), DeckError> {
        if bpm == 0 {
            return Err(DeckError::InvalidTempo(bpm.to_string()));
        }
        self.apply_tempo(TempoOverride::Bpm(bpm))
    }

    /// Play at the file's own tempo times `factor`
    pub fn set_tempo_scale(&mut self, factor: f64) -> Result<(), DeckError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(DeckError::InvalidTempo(factor.to_string()));
        }
        self.apply_tempo(TempoOverride::Scale(factor))
    }

    pub fn scale_up(&mut self) -> Result<f64, DeckError> {
        self.step_scale(SCALE_STEP)
    }

    pub fn scale_down(&mut self) -> Result<f64, DeckError> {
        self.step_scale(-SCALE_STEP)
    }

    fn step_scale(&mut self, delta: f64) -> Result<f64, DeckError> {
        let current = match self.tempo {
            TempoOverride::Scale(f) => f,
            _ => 1.0,
        };
        let next = ((current + delta) * 10.0).round() / 10.0;
        let next = next.clamp(SCALE_MIN, SCALE_MAX);
        self.set_tempo_scale(next)?;
        Ok(next)
    }

    /// Back to the tempo written in the file
    pub fn reset_tempo(&mut self) -> Result<(), DeckError> {
        self.apply_tempo(TempoOverride::FromFile)
    }

    fn apply_tempo(&mut self, tempo: TempoOverride) -> Result<(), DeckError> {
        let mut shared = self.shared.lock().expect("playback controller mutex poisoned");
        if let Some(player) = shared.player.as_mut() {
            player.set_tempo(tempo.player_tempo())?;
        }
        self.tempo = tempo;
        debug!("tempo override: {:?}", tempo);
        Ok(())
    }

    fn start_poller(&mut self, runtime: &tokio::runtime::Handle) {
        let generation = {
            let mut shared = self.shared.lock().expect("playback controller mutex poisoned");
            shared.poll_generation += 1;
            shared.poll_generation
        };
        let task = runtime.spawn(poll(
            self.shared.clone(),
            self.readout_tx.clone(),
            generation,
            self.poll_interval,
        ));
        if let Some(old) = self.poller.replace(task) {
            old.abort();
        }
    }

    fn stop_poller(&mut self) {
        self.shared
            .lock()
            .expect("playback controller mutex poisoned")
            .poll_generation += 1;
        if let Some(task) = self.poller.take() {
            task.abort();
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll(
    shared: Arc<Mutex<Shared>>,
    readout_tx: Arc<watch::Sender<PlaybackReadout>>,
    generation: u64,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let mut state = shared.lock().expect("playback controller mutex poisoned");
        if state.poll_generation != generation {
            return;
        }
        let done = state
            .player
            .as_ref()
            .map(|p| p.status() == PlayerStatus::Done)
            .unwrap_or(true);
        if done {
            state.state = PlaybackState::Stopped;
        }
        readout_tx.send_replace(state.readout());
        if done {
            debug!("playback reached the end");
            return;
        }
    }
}
