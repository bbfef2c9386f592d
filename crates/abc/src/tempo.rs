//! Tempo arithmetic: notes per minute, tick resolution, quarter notes per
//! minute, and sensible default tempos for traditional rhythms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{Fraction, Meter, Tempo};
use crate::error::{AbcError, Result};
use crate::parser::header::parse_tempo;

/// Highest event rate the sequencer is asked to handle
const MAX_TICKS_PER_SECOND: u64 = 1000;

/// Ticks per default-length note, finest first
const TICKS_PER_NOTE_CANDIDATES: [u32; 4] = [480, 240, 120, 60];

/// Number of default-length notes per minute.
///
/// A missing default note length is derived from the meter (`1/denominator`)
/// and a bare `Q:N` takes the default note length as its beat unit.
pub fn compute_notes_per_minute(
    default_note_length: Option<Fraction>,
    meter: Option<Meter>,
    tempo: Option<&Tempo>,
) -> Result<u32> {
    let (Some(meter), Some(tempo)) = (meter, tempo) else {
        return Err(AbcError::MissingTempoContext);
    };

    let note_length =
        default_note_length.unwrap_or_else(|| Fraction::new(1, meter.to_fraction().denominator));
    let beat_unit = tempo.beat_unit.unwrap_or(note_length);

    let npm = (tempo.bpm as u64 * beat_unit.numerator as u64 * note_length.denominator as u64)
        .checked_div(beat_unit.denominator as u64)
        .ok_or_else(|| AbcError::InvalidOrUnsupportedTempo(tempo.to_string()))?;

    let npm = u32::try_from(npm).map_err(|_| AbcError::InvalidOrUnsupportedTempo(tempo.to_string()))?;
    debug!("notes per minute = {}", npm);
    Ok(npm)
}

/// Largest tick resolution that keeps the event rate at or under
/// 1000 ticks per second, falling back to 60.
pub fn compute_ticks_per_note(notes_per_minute: u32) -> u32 {
    TICKS_PER_NOTE_CANDIDATES
        .into_iter()
        .find(|&tpn| tpn as u64 * notes_per_minute as u64 <= MAX_TICKS_PER_SECOND * 60)
        .unwrap_or(60)
}

/// An editable `Q:` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbcTempo {
    beat_unit: Option<Fraction>,
    bpm: u32,
}

impl AbcTempo {
    pub fn parse(raw: &str) -> Result<Self> {
        let tempo = parse_tempo(raw)?;
        if tempo.bpm == 0 {
            return Err(AbcError::InvalidOrUnsupportedTempo(raw.trim().to_string()));
        }
        Ok(tempo.into())
    }

    pub fn beat_unit(&self) -> Option<Fraction> {
        self.beat_unit
    }

    /// Beats per minute, as written in the tune
    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: u32) -> Result<()> {
        if bpm < 1 {
            return Err(AbcError::InvalidOrUnsupportedTempo(bpm.to_string()));
        }
        self.bpm = bpm;
        Ok(())
    }

    /// Quarter notes per minute, the unit MIDI players work in.
    ///
    /// Without a beat unit the beat is assumed to be a quarter note.
    pub fn qpm(&self) -> u32 {
        match self.beat_unit {
            None => self.bpm,
            Some(unit) if unit.denominator == 0 => self.bpm,
            Some(unit) => {
                (self.bpm as u64 * 4 * unit.numerator as u64 / unit.denominator as u64) as u32
            }
        }
    }
}

impl From<Tempo> for AbcTempo {
    fn from(tempo: Tempo) -> Self {
        AbcTempo {
            beat_unit: tempo.beat_unit,
            bpm: tempo.bpm,
        }
    }
}

impl From<AbcTempo> for Tempo {
    fn from(tempo: AbcTempo) -> Self {
        Tempo {
            beat_unit: tempo.beat_unit,
            bpm: tempo.bpm,
        }
    }
}

impl fmt::Display for AbcTempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Tempo::from(*self).fmt(f)
    }
}

impl FromStr for AbcTempo {
    type Err = AbcError;

    fn from_str(s: &str) -> Result<Self> {
        AbcTempo::parse(s)
    }
}

/// How fast a default tempo should be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Slow,
    #[default]
    Medium,
    Fast,
}

impl FromStr for Speed {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow" => Ok(Speed::Slow),
            "medium" => Ok(Speed::Medium),
            "fast" => Ok(Speed::Fast),
            other => Err(format!("unknown speed '{}'", other)),
        }
    }
}

// (rhythm, beat unit, slow, medium, fast)
const DEFAULT_TEMPOS: [(&str, Fraction, [u32; 3]); 6] = [
    ("reel", Fraction { numerator: 1, denominator: 2 }, [70, 90, 110]),
    ("jig", Fraction { numerator: 3, denominator: 8 }, [90, 110, 130]),
    ("hornpipe", Fraction { numerator: 1, denominator: 2 }, [55, 70, 85]),
    ("polka", Fraction { numerator: 1, denominator: 4 }, [110, 140, 160]),
    ("slide", Fraction { numerator: 3, denominator: 8 }, [110, 140, 160]),
    ("fling", Fraction { numerator: 1, denominator: 2 }, [65, 80, 95]),
];

// 120 quarter notes per minute is also what abc2midi assumes
const FALLBACK_TEMPO: (Fraction, [u32; 3]) =
    (Fraction { numerator: 1, denominator: 4 }, [90, 120, 150]);

/// Default tempo for a rhythm (`R:` value) at the given speed.
///
/// Unknown or absent rhythms get `1/4=120` at medium speed.
pub fn default_tempo(rhythm: Option<&str>, speed: Speed) -> AbcTempo {
    let rhythm = rhythm.map(|r| r.trim().to_ascii_lowercase());
    let tier = match speed {
        Speed::Slow => 0,
        Speed::Medium => 1,
        Speed::Fast => 2,
    };

    let found = rhythm.as_deref().and_then(|r| {
        DEFAULT_TEMPOS
            .iter()
            .find(|(name, _, _)| *name == r)
            .map(|(_, unit, bpms)| (*unit, *bpms))
    });

    let (unit, bpms) = match found {
        Some(entry) => entry,
        None => {
            debug!("unknown or undefined rhythm {:?}, using fallback tempo", rhythm);
            FALLBACK_TEMPO
        }
    };

    AbcTempo {
        beat_unit: Some(unit),
        bpm: bpms[tier],
    }
}
