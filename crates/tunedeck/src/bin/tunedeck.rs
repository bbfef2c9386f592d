//! tunedeck command line
//!
//! Inspect ABC tune headers, resolve keystrokes to notes and play the tune
//! under a given line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use abc::{
    compute_notes_per_minute, compute_ticks_per_note, default_tempo, note_to_play, scan_tune,
    AbcTempo, ScanMode, Speed, TextBuffer,
};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use deckconf::DeckConfig;
use tracing::{info, warn};
use tunedeck::{
    Abc2MidiCommand, Deck, LoopMode, NoPlayerFactory, PlaybackReadout, PlaybackState,
    PreviewVoice, RecordingEngine, SmfPlayerFactory, Synth,
};

/// Tunedeck - play and preview ABC tunes
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to load instead of ./tunedeck.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TuneArgs {
    /// ABC file
    file: PathBuf,

    /// Any line of the tune (1-based); defaults to the first tune
    #[arg(short, long)]
    line: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the header fields of a tune
    Header {
        #[command(flatten)]
        tune: TuneArgs,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// MIDI number of an ABC note such as ^f or C,
    Note { token: String },

    /// Which note a key typed at a position would sound
    Keystroke {
        file: PathBuf,

        #[arg(short, long)]
        line: usize,

        /// Characters before the cursor on that line
        #[arg(short, long)]
        column: usize,

        #[arg(short, long)]
        key: char,
    },

    /// Tempo figures for a tune
    Tempo {
        #[command(flatten)]
        tune: TuneArgs,
    },

    /// Render a tune and play it
    Play {
        #[command(flatten)]
        tune: TuneArgs,

        /// Play this many times
        #[arg(long, conflicts_with = "forever")]
        repeat: Option<u32>,

        /// Loop until interrupted
        #[arg(long)]
        forever: bool,

        /// Tempo in the tune's beats per minute
        #[arg(long, conflicts_with_all = ["scale", "speed"])]
        bpm: Option<u32>,

        /// Multiply the tune's tempo
        #[arg(long, conflicts_with = "speed")]
        scale: Option<f64>,

        /// Default tempo for the tune's rhythm
        #[arg(long)]
        speed: Option<Speed>,

        /// Play into an in-memory engine and print what would have sounded
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the effective configuration and where it came from
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = DeckConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    tunedeck::telemetry::init(&config.logging.level)?;

    match cli.command {
        Commands::Header { tune, json } => show_header(&tune, json),
        Commands::Note { token } => {
            let midi = abc::note_token_to_midi(&token)?;
            println!("{} = MIDI {}", token, midi);
            Ok(())
        }
        Commands::Keystroke {
            file,
            line,
            column,
            key,
        } => {
            let buffer = read_buffer(&file)?.with_cursor(line, column);
            match note_to_play(&buffer, key) {
                Some(token) => {
                    let midi = abc::note_token_to_midi(&token)?;
                    println!("{} = MIDI {}", token, midi);
                }
                None => println!("'{}' plays no note here", key),
            }
            Ok(())
        }
        Commands::Tempo { tune } => show_tempo(&tune),
        Commands::Play {
            tune,
            repeat,
            forever,
            bpm,
            scale,
            speed,
            dry_run,
        } => {
            let loop_mode = match (forever, repeat) {
                (true, _) => LoopMode::LoopForever,
                (false, Some(n)) => LoopMode::Repeat(n),
                (false, None) => LoopMode::NoLoop,
            };
            let options = PlayOptions {
                loop_mode,
                bpm,
                scale,
                speed,
                dry_run,
            };
            play(&config, &tune, options).await
        }
        Commands::Config => {
            print!("{}", config.to_toml());
            println!();
            if sources.files.is_empty() {
                println!("# no config files found, using defaults");
            }
            for file in &sources.files {
                println!("# loaded {}", file.display());
            }
            for var in &sources.env_overrides {
                println!("# overridden by ${}", var);
            }
            Ok(())
        }
    }
}

fn read_buffer(path: &Path) -> Result<TextBuffer> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(TextBuffer::new(&text))
}

/// The file with the cursor on the requested line, or on the first X: line
fn tune_buffer(args: &TuneArgs) -> Result<TextBuffer> {
    let buffer = read_buffer(&args.file)?;
    let line = match args.line {
        Some(line) => line,
        None => {
            let text = buffer.text();
            let first = text
                .lines()
                .position(|l| l.trim_start().starts_with("X:"))
                .with_context(|| format!("No tune (X: line) in {}", args.file.display()))?;
            first + 1
        }
    };
    Ok(buffer.with_cursor(line, 0))
}

fn show_header(args: &TuneArgs, json: bool) -> Result<()> {
    let buffer = tune_buffer(args)?;
    let raw = abc::current_raw_tune(&buffer)?;
    let parsed = scan_tune(&raw, ScanMode::HeaderOnly)
        .with_context(|| format!("Invalid tune header in {}", args.file.display()))?;

    if json {
        let out = serde_json::json!({
            "header": parsed.value,
            "feedback": parsed.feedback,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let header = &parsed.value;
    println!("X:{}  {}", header.reference, header.title());
    for title in header.titles.iter().skip(1) {
        println!("      {}", title);
    }
    let unset = || "-".to_string();
    println!("key:    {}", header.key.map(|k| k.to_string()).unwrap_or_else(unset));
    println!("meter:  {}", header.meter.map(|m| m.to_string()).unwrap_or_else(unset));
    println!(
        "length: {}",
        header
            .default_note_length
            .map(|l| l.to_string())
            .unwrap_or_else(unset)
    );
    println!("tempo:  {}", header.tempo.map(|t| t.to_string()).unwrap_or_else(unset));
    println!("rhythm: {}", header.rhythm.clone().unwrap_or_else(unset));
    for note in &parsed.feedback {
        println!("line {}: {:?}: {}", note.line, note.level, note.message);
    }
    Ok(())
}

fn show_tempo(args: &TuneArgs) -> Result<()> {
    let buffer = tune_buffer(args)?;
    let raw = abc::current_raw_tune(&buffer)?;
    let header = scan_tune(&raw, ScanMode::HeaderOnly)?.value;

    let (tempo, source) = match header.tempo {
        Some(tempo) => (AbcTempo::from(tempo), "Q: field"),
        None => (
            default_tempo(header.rhythm.as_deref(), Speed::Medium),
            "rhythm default",
        ),
    };
    println!("tempo: {} ({}), {} quarter notes per minute", tempo, source, tempo.qpm());

    match compute_notes_per_minute(header.default_note_length, header.meter, header.tempo.as_ref()) {
        Ok(npm) => {
            println!("notes per minute: {}", npm);
            println!("ticks per note:   {}", compute_ticks_per_note(npm));
        }
        Err(e) => println!("notes per minute: unavailable ({})", e),
    }
    Ok(())
}

struct PlayOptions {
    loop_mode: LoopMode,
    bpm: Option<u32>,
    scale: Option<f64>,
    speed: Option<Speed>,
    dry_run: bool,
}

fn build_deck(config: &DeckConfig, dry_run: bool) -> (Deck, Option<Arc<RecordingEngine>>) {
    let renderer = Box::new(Abc2MidiCommand::new(config.playback.renderer.clone()));

    if dry_run {
        let engine = Arc::new(RecordingEngine::new());
        let voice = PreviewVoice::new(Some(engine.clone()), &config.preview);
        let factory = Arc::new(SmfPlayerFactory::new(engine.clone()));
        return (Deck::new(voice, factory, renderer, config), Some(engine));
    }

    let synth = Synth::start(&config.audio);
    let deck = match synth.engine() {
        Some(engine) => {
            let voice = PreviewVoice::new(Some(engine.clone()), &config.preview);
            Deck::new(voice, Arc::new(SmfPlayerFactory::new(engine)), renderer, config)
        }
        None => {
            let reason = synth.setup_error().unwrap_or("sound disabled").to_string();
            let voice = PreviewVoice::soundless(&config.preview);
            Deck::new(voice, Arc::new(NoPlayerFactory::new(reason)), renderer, config)
        }
    };
    (deck, None)
}

async fn play(config: &DeckConfig, args: &TuneArgs, options: PlayOptions) -> Result<()> {
    let buffer = tune_buffer(args)?;
    let (mut deck, recorder) = build_deck(config, options.dry_run);

    let tune = deck
        .open_tune(&buffer)
        .with_context(|| format!("Cannot play tune in {}", args.file.display()))?;
    println!("X:{}  {}", tune.header.reference, tune.header.title());

    deck.controller_mut().set_loop_mode(options.loop_mode)?;
    if let Some(speed) = options.speed {
        deck.set_speed(speed)?;
    }
    if let Some(bpm) = options.bpm {
        deck.set_bpm(bpm)?;
    }
    if let Some(scale) = options.scale {
        deck.controller_mut().set_tempo_scale(scale)?;
    }
    if options.bpm.is_some() || options.speed.is_some() {
        println!("tempo: {}", deck.tempo());
    }

    let mut readouts = deck.controller().subscribe();
    deck.play()?;
    info!("playing, loop mode {:?}", options.loop_mode);

    loop {
        tokio::select! {
            changed = readouts.changed() => {
                if changed.is_err() {
                    break;
                }
                let readout = readouts.borrow_and_update().clone();
                print_readout(&readout);
                if readout.state == PlaybackState::Stopped {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted");
                deck.stop();
                break;
            }
        }
    }

    if let Some(engine) = recorder {
        let events = engine.events();
        if events.is_empty() {
            bail!("dry run produced no MIDI events");
        }
        println!(
            "dry run: {} events, {} notes",
            events.len(),
            engine.note_ons()
        );
    }
    Ok(())
}

fn print_readout(readout: &PlaybackReadout) {
    match readout.state {
        PlaybackState::Stopped => println!("stopped"),
        state => println!(
            "{:?}: tick {}/{}  {:.1} bpm  (file tempo {} us/quarter)",
            state, readout.current_tick, readout.total_ticks, readout.bpm, readout.midi_tempo
        ),
    }
}
