//! Header line classification and field value parsing.

use crate::ast::{Fraction, Meter, Tempo};
use crate::error::{AbcError, Result};

/// The one-letter field tags that may open a header line
const HEADER_TAGS: [char; 22] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S',
    'T', 'W', 'X', 'Z',
];

/// Default note lengths the player supports (as 1/N)
const NOTE_LENGTH_DENOMINATORS: [u32; 4] = [4, 8, 16, 32];

/// Comment lines start with `%` once leading whitespace is removed
pub fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('%')
}

/// A reference number line (`X:`) opens a tune
pub fn is_reference_number(line: &str) -> bool {
    line.trim_start().starts_with("X:")
}

/// Whether a line starts with one of the reserved header tags
pub fn is_header_line(line: &str) -> bool {
    let mut chars = line.trim_start().chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(tag), Some(':')) if HEADER_TAGS.contains(&tag)
    )
}

/// Split a header line into its tag and trimmed value
pub fn split_field(line: &str) -> Option<(char, &str)> {
    let trimmed = line.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(tag), Some(':')) => Some((tag, trimmed[tag.len_utf8() + 1..].trim())),
        _ => None,
    }
}

/// Parse a fraction like "4/4" or "1/8"
fn parse_fraction(s: &str) -> Option<Fraction> {
    let (num, den) = s.split_once('/')?;
    let num = num.trim().parse().ok()?;
    let den = den.trim().parse().ok()?;
    Some(Fraction::new(num, den))
}

/// Parse meter field value (e.g., "4/4", "C", "C|", "6/8")
pub fn parse_meter(value: &str) -> Result<Meter> {
    let trimmed = value.trim();

    match trimmed {
        "C" => Ok(Meter::Common),
        "C|" => Ok(Meter::Cut),
        _ => match parse_fraction(trimmed) {
            Some(f) if f.denominator != 0 => Ok(Meter::Simple {
                numerator: f.numerator,
                denominator: f.denominator,
            }),
            _ => Err(AbcError::InvalidMeter(trimmed.to_string())),
        },
    }
}

/// Parse default note length field value: one of 1/4, 1/8, 1/16, 1/32
pub fn parse_default_note_length(value: &str) -> Result<Fraction> {
    let trimmed = value.trim();
    match parse_fraction(trimmed) {
        Some(f) if f.numerator == 1 && NOTE_LENGTH_DENOMINATORS.contains(&f.denominator) => Ok(f),
        _ => Err(AbcError::InvalidDefaultNoteLength(trimmed.to_string())),
    }
}

/// Parse tempo field value: "120" or "3/8=120".
///
/// The ABC 1.6 forms `C=120` and `C3=120` are not supported.
pub fn parse_tempo(value: &str) -> Result<Tempo> {
    let trimmed = value.trim();
    let invalid = || AbcError::InvalidOrUnsupportedTempo(trimmed.to_string());

    if let Ok(bpm) = trimmed.parse::<u32>() {
        return Ok(Tempo {
            beat_unit: None,
            bpm,
        });
    }

    let (beat, bpm) = trimmed.split_once('=').ok_or_else(invalid)?;
    let beat_unit = parse_fraction(beat)
        .filter(|f| f.denominator != 0)
        .ok_or_else(invalid)?;
    let bpm = bpm.trim().parse::<u32>().map_err(|_| invalid())?;

    Ok(Tempo {
        beat_unit: Some(beat_unit),
        bpm,
    })
}
