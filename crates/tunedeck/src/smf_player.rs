//! Built-in playlist player for Standard MIDI Files.
//!
//! Events are scheduled on a tokio task and sent to a [`SoundEngine`] as
//! their time comes. All transport state lives behind one mutex; the task
//! only acts while its generation matches the transport's, so a halted or
//! re-seeked run can never send another event.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{FilePlayer, PlayerFactory, PlayerStatus, PlayerTempo, SoundEngine};
use crate::error::EngineError;
use crate::midi_file::{load_midi_file, ParsedMidiFile};

#[derive(Debug)]
struct Transport {
    status: PlayerStatus,
    file_index: usize,
    /// Position within the current file
    tick: u64,
    /// Index of the next event to send in the current file
    next_event: usize,
    /// Passes through the playlist still to play, the current one included.
    /// -1 plays forever.
    loops_left: i32,
    tempo: PlayerTempo,
    /// (channel, key) of notes switched on and not yet off
    sounding: Vec<(u8, u8)>,
    generation: u64,
}

impl Transport {
    fn new() -> Self {
        Transport {
            status: PlayerStatus::Ready,
            file_index: 0,
            tick: 0,
            next_event: 0,
            loops_left: 1,
            tempo: PlayerTempo::Internal,
            sounding: Vec::new(),
            generation: 0,
        }
    }

    /// Microseconds per quarter note actually used at the current position
    fn effective_tempo(&self, file: &ParsedMidiFile) -> f64 {
        let written = file.tempo_at(self.tick) as f64;
        match self.tempo {
            PlayerTempo::Internal => written,
            PlayerTempo::Scaled(factor) if factor > 0.0 => written / factor,
            PlayerTempo::Scaled(_) => written,
            PlayerTempo::External(qpm) => 60_000_000.0 / qpm.max(1) as f64,
        }
    }

    fn silence(&mut self, engine: &dyn SoundEngine) {
        for (channel, key) in self.sounding.drain(..) {
            if let Err(e) = engine.note_off(channel, key) {
                warn!("note off failed while silencing player: {}", e);
            }
        }
    }

    /// Move to the next file, looping back to the first one while repeats
    /// remain. Returns false at the very end.
    fn advance(&mut self, file_count: usize) -> bool {
        if self.file_index + 1 < file_count {
            self.file_index += 1;
        } else if self.loops_left == -1 || self.loops_left > 1 {
            if self.loops_left > 1 {
                self.loops_left -= 1;
            }
            self.file_index = 0;
        } else {
            self.status = PlayerStatus::Done;
            return false;
        }
        self.tick = 0;
        self.next_event = 0;
        true
    }
}

/// Plays a playlist of MIDI files through a [`SoundEngine`].
pub struct SmfPlayer {
    engine: Arc<dyn SoundEngine>,
    files: Vec<Arc<ParsedMidiFile>>,
    transport: Arc<Mutex<Transport>>,
    task: Option<JoinHandle<()>>,
}

impl SmfPlayer {
    pub fn new(engine: Arc<dyn SoundEngine>) -> Self {
        SmfPlayer {
            engine,
            files: Vec::new(),
            transport: Arc::new(Mutex::new(Transport::new())),
            task: None,
        }
    }

    /// Add an already parsed file to the playlist
    pub fn add_parsed(&mut self, file: ParsedMidiFile) {
        self.files.push(Arc::new(file));
    }

    fn spawn(&mut self, generation: u64) -> Result<(), EngineError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| EngineError::Backend(format!("no async runtime for playback: {}", e)))?;
        let task = handle.spawn(run(
            self.engine.clone(),
            Arc::new(self.files.clone()),
            self.transport.clone(),
            generation,
        ));
        if let Some(old) = self.task.replace(task) {
            old.abort();
        }
        Ok(())
    }

    /// Halt the running task and silence held notes, keeping the position
    fn halt(&mut self) {
        let mut t = self.transport.lock().expect("player transport mutex poisoned");
        t.generation += 1;
        if t.status == PlayerStatus::Playing {
            t.status = PlayerStatus::Ready;
        }
        t.silence(self.engine.as_ref());
        drop(t);

        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn current_file(&self, t: &Transport) -> Option<&Arc<ParsedMidiFile>> {
        self.files.get(t.file_index)
    }
}

impl FilePlayer for SmfPlayer {
    fn add(&mut self, path: &Path) -> Result<(), EngineError> {
        let parsed = load_midi_file(path)?;
        debug!(
            "playlist += {} ({} events, {} ticks)",
            path.display(),
            parsed.events.len(),
            parsed.duration_ticks
        );
        self.add_parsed(parsed);
        Ok(())
    }

    fn play(&mut self) -> Result<(), EngineError> {
        let generation = {
            let mut t = self.transport.lock().expect("player transport mutex poisoned");
            match t.status {
                PlayerStatus::Playing | PlayerStatus::Done => return Ok(()),
                PlayerStatus::Ready => {}
            }
            if self.files.is_empty() {
                t.status = PlayerStatus::Done;
                return Ok(());
            }
            t.status = PlayerStatus::Playing;
            t.generation += 1;
            t.generation
        };
        info!("playback started ({} file(s))", self.files.len());
        self.spawn(generation)
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.halt();
        Ok(())
    }

    fn seek(&mut self, tick: u64) -> Result<(), EngineError> {
        let restart = {
            let mut t = self.transport.lock().expect("player transport mutex poisoned");
            let Some(file) = self.files.get(t.file_index).cloned() else {
                return Ok(());
            };
            t.silence(self.engine.as_ref());
            t.tick = tick.min(file.duration_ticks);
            t.next_event = file.first_event_at(t.tick);
            if t.status == PlayerStatus::Playing {
                t.generation += 1;
                Some(t.generation)
            } else {
                None
            }
        };
        debug!("seek to tick {}", tick);
        match restart {
            Some(generation) => self.spawn(generation),
            None => Ok(()),
        }
    }

    fn set_loop(&mut self, count: i32) -> Result<(), EngineError> {
        if count == 0 || count < -1 {
            return Err(EngineError::Backend(format!(
                "loop count must be positive or -1, got {}",
                count
            )));
        }
        self.transport
            .lock()
            .expect("player transport mutex poisoned")
            .loops_left = count;
        Ok(())
    }

    fn set_tempo(&mut self, tempo: PlayerTempo) -> Result<(), EngineError> {
        match tempo {
            PlayerTempo::Scaled(f) if !(f > 0.0) => {
                return Err(EngineError::Backend(format!("invalid tempo factor {}", f)));
            }
            PlayerTempo::External(0) => {
                return Err(EngineError::Backend("tempo must be at least 1 bpm".to_string()));
            }
            _ => {}
        }
        self.transport
            .lock()
            .expect("player transport mutex poisoned")
            .tempo = tempo;
        Ok(())
    }

    fn status(&self) -> PlayerStatus {
        self.transport
            .lock()
            .expect("player transport mutex poisoned")
            .status
    }

    fn current_tick(&self) -> u64 {
        self.transport
            .lock()
            .expect("player transport mutex poisoned")
            .tick
    }

    fn total_ticks(&self) -> u64 {
        let t = self.transport.lock().expect("player transport mutex poisoned");
        self.current_file(&t).map(|f| f.duration_ticks).unwrap_or(0)
    }

    fn bpm(&self) -> f64 {
        let t = self.transport.lock().expect("player transport mutex poisoned");
        match self.current_file(&t) {
            Some(file) => 60_000_000.0 / t.effective_tempo(file),
            None => 120.0,
        }
    }

    fn midi_tempo(&self) -> u32 {
        let t = self.transport.lock().expect("player transport mutex poisoned");
        self.current_file(&t)
            .map(|f| f.tempo_at(t.tick))
            .unwrap_or(crate::midi_file::DEFAULT_MIDI_TEMPO)
    }
}

impl Drop for SmfPlayer {
    fn drop(&mut self) {
        self.halt();
    }
}

/// What the playback task does next
enum Step {
    /// Sleep until `target` in the current file
    Wait { target: u64, ticks: u64, tempo: f64, file: Arc<ParsedMidiFile> },
    Finished,
}

async fn run(
    engine: Arc<dyn SoundEngine>,
    files: Arc<Vec<Arc<ParsedMidiFile>>>,
    transport: Arc<Mutex<Transport>>,
    generation: u64,
) {
    loop {
        let step = {
            let mut t = transport.lock().expect("player transport mutex poisoned");
            if t.generation != generation {
                return;
            }
            next_step(&mut t, &files)
        };

        let (target, file) = match step {
            Step::Finished => {
                info!("playback finished");
                return;
            }
            Step::Wait {
                target,
                ticks,
                tempo,
                file,
            } => {
                let wait = file.ticks_to_duration(ticks, tempo);
                if wait.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(wait).await;
                }
                (target, file)
            }
        };

        let mut t = transport.lock().expect("player transport mutex poisoned");
        if t.generation != generation {
            return;
        }
        t.tick = target;
        while let Some(event) = file.events.get(t.next_event) {
            if event.tick > target {
                break;
            }
            if let Err(e) = event.message.send(engine.as_ref(), event.channel) {
                warn!("failed to send MIDI event: {}", e);
            }
            track_note(&mut t.sounding, event.channel, &event.message);
            t.next_event += 1;
        }
    }
}

/// Decide the next wait, moving across files and loops at file ends
fn next_step(t: &mut Transport, files: &[Arc<ParsedMidiFile>]) -> Step {
    let mut advanced = 0;
    loop {
        let Some(file) = files.get(t.file_index).cloned() else {
            t.status = PlayerStatus::Done;
            return Step::Finished;
        };

        let target = match file.events.get(t.next_event) {
            Some(event) => event.tick,
            None if t.tick < file.duration_ticks => file.duration_ticks,
            None => {
                // Every file has been tried from its start with nothing to wait for
                if advanced == files.len() {
                    warn!("playlist has nothing to play");
                    t.status = PlayerStatus::Done;
                    return Step::Finished;
                }
                advanced += 1;
                if t.advance(files.len()) {
                    continue;
                }
                return Step::Finished;
            }
        };

        return Step::Wait {
            target,
            ticks: target.saturating_sub(t.tick),
            tempo: t.effective_tempo(&file),
            file,
        };
    }
}

fn track_note(sounding: &mut Vec<(u8, u8)>, channel: u8, message: &crate::midi_file::ChannelMessage) {
    use crate::midi_file::ChannelMessage;
    match *message {
        ChannelMessage::NoteOn { key, .. } => sounding.push((channel, key)),
        ChannelMessage::NoteOff { key } => {
            if let Some(pos) = sounding.iter().position(|&n| n == (channel, key)) {
                sounding.swap_remove(pos);
            }
        }
        _ => {}
    }
}

/// Creates [`SmfPlayer`]s on a shared engine
pub struct SmfPlayerFactory {
    engine: Arc<dyn SoundEngine>,
}

impl SmfPlayerFactory {
    pub fn new(engine: Arc<dyn SoundEngine>) -> Self {
        SmfPlayerFactory { engine }
    }
}

impl PlayerFactory for SmfPlayerFactory {
    fn create(&self) -> Result<Box<dyn FilePlayer>, EngineError> {
        Ok(Box::new(SmfPlayer::new(self.engine.clone())))
    }
}
