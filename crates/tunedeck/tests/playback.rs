//! Playing real MIDI files through the controller and the built-in player.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use tunedeck::{
    LoopMode, PlaybackController, PlaybackState, RecordingEngine, SmfPlayerFactory,
};

/// An eight-note scale at 480 ppq, eighth notes, 100 bpm
fn write_scale(dir: &tempfile::TempDir) -> PathBuf {
    let mut track = vec![TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(600_000))),
    }];
    for key in [62u8, 64, 66, 67, 69, 71, 73, 74] {
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(80),
                },
            },
        });
        track.push(TrackEvent {
            delta: u28::new(240),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(0),
                },
            },
        });
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header::new(Format::SingleTrack, Timing::Metrical(u15::new(480))),
        tracks: vec![track],
    };
    let path = dir.path().join("scale.mid");
    smf.save(&path).unwrap();
    path
}

/// What abc2midi writes for a tune with a header and no notes
fn write_silent(dir: &tempfile::TempDir) -> PathBuf {
    let track = vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000))),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ];
    let smf = Smf {
        header: Header::new(Format::SingleTrack, Timing::Metrical(u15::new(480))),
        tracks: vec![track],
    };
    let path = dir.path().join("silent.mid");
    smf.save(&path).unwrap();
    path
}

fn controller(engine: &Arc<RecordingEngine>) -> PlaybackController {
    PlaybackController::new(
        Arc::new(SmfPlayerFactory::new(engine.clone())),
        Duration::from_millis(250),
    )
}

#[tokio::test(start_paused = true)]
async fn test_scale_plays_to_the_end() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(RecordingEngine::new());
    let mut controller = controller(&engine);
    controller.set_playlist(vec![write_scale(&dir)]);

    controller.play().unwrap();
    let readout = controller.readout();
    assert_eq!(readout.total_ticks, 1920);
    assert_eq!(readout.midi_tempo, 600_000);
    assert_eq!(readout.bpm, 100.0);

    // 8 eighth notes at 100 bpm: 2.4 s
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(controller.state(), PlaybackState::Stopped);
    assert_eq!(engine.note_ons(), 8);
    assert_eq!(engine.note_offs(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_resume_midway() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(RecordingEngine::new());
    let mut controller = controller(&engine);
    controller.set_playlist(vec![write_scale(&dir)]);

    controller.play().unwrap();
    tokio::time::sleep(Duration::from_millis(1000)).await;
    controller.pause().unwrap();
    let paused_at = controller.readout().current_tick;
    assert_eq!(paused_at, 720);
    assert_eq!(engine.note_ons(), engine.note_offs());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(controller.readout().current_tick, paused_at);

    controller.play().unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(controller.state(), PlaybackState::Stopped);
    assert_eq!(engine.note_ons(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_repeat_with_bpm_override() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(RecordingEngine::new());
    let mut controller = controller(&engine);
    controller.set_playlist(vec![write_scale(&dir)]);
    controller.set_loop_mode(LoopMode::Repeat(2)).unwrap();
    controller.set_tempo_bpm(200).unwrap();

    controller.play().unwrap();
    assert_eq!(controller.readout().bpm, 200.0);

    // Twice through at 1.2 s each
    tokio::time::sleep(Duration::from_millis(2300)).await;
    assert_eq!(engine.note_ons(), 16);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(controller.state(), PlaybackState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_stop_then_play_starts_over() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(RecordingEngine::new());
    let mut controller = controller(&engine);
    controller.set_playlist(vec![write_scale(&dir)]);

    controller.play().unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;
    controller.stop();
    assert_eq!(controller.readout().current_tick, 0);
    let played = engine.note_ons();

    controller.play().unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(engine.note_ons(), played + 8);
}

#[tokio::test]
async fn test_missing_file_fails_to_play() {
    let engine = Arc::new(RecordingEngine::new());
    let mut controller = controller(&engine);
    controller.set_playlist(vec![PathBuf::from("/nonexistent/tune.mid")]);

    assert!(controller.play().is_err());
    assert_eq!(controller.state(), PlaybackState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_loop_forever_over_silent_tune_stops() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(RecordingEngine::new());
    let mut controller = controller(&engine);
    controller.set_playlist(vec![write_silent(&dir)]);
    controller.set_loop_mode(LoopMode::LoopForever).unwrap();

    controller.play().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(controller.state(), PlaybackState::Stopped);
    assert_eq!(engine.note_ons(), 0);
    controller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_silent_tune_between_real_ones() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(RecordingEngine::new());
    let mut controller = controller(&engine);
    let scale = write_scale(&dir);
    controller.set_playlist(vec![scale.clone(), write_silent(&dir), scale]);

    controller.play().unwrap();
    // Two scales at 2.4 s each
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(controller.state(), PlaybackState::Stopped);
    assert_eq!(engine.note_ons(), 16);
    assert_eq!(engine.note_ons(), engine.note_offs());
}
