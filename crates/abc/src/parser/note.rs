//! Single-note token parsing using winnow combinators.
//!
//! Grammar: `[accidental] letter [octave-marker]`, e.g. `^f`, `__E`, `c'`, `C,`.

use winnow::combinator::{alt, opt};
use winnow::prelude::*;
use winnow::token::one_of;

use crate::ast::{Accidental, NoteName};
use crate::error::{AbcError, Result};
use crate::theory;

type PResult<T> = winnow::ModalResult<T>;

/// A parsed note token, before conversion to MIDI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteToken {
    pub accidental: Option<Accidental>,
    pub pitch: NoteName,
    /// Lower-case letter: one octave above the upper-case band
    pub high: bool,
    /// +1 for `'`, -1 for `,`
    pub octave_shift: i8,
}

impl NoteToken {
    pub fn to_midi(&self) -> i16 {
        theory::midi_number(self.pitch, self.high, self.accidental, self.octave_shift)
    }
}

/// Parse a note pitch, reporting whether it is in the lower-case band
pub fn parse_pitch(input: &mut &str) -> PResult<(NoteName, bool)> {
    let c = one_of(['C', 'D', 'E', 'F', 'G', 'A', 'B', 'c', 'd', 'e', 'f', 'g', 'a', 'b'])
        .parse_next(input)?;
    // one_of only lets note letters through
    let pitch = NoteName::from_char(c).unwrap_or(NoteName::C);
    Ok((pitch, c.is_ascii_lowercase()))
}

/// Parse an accidental (^, ^^, _, __, =)
pub fn parse_accidental(input: &mut &str) -> PResult<Accidental> {
    alt((
        "^^".map(|_| Accidental::DoubleSharp),
        "^".map(|_| Accidental::Sharp),
        "__".map(|_| Accidental::DoubleFlat),
        "_".map(|_| Accidental::Flat),
        "=".map(|_| Accidental::Natural),
    ))
    .parse_next(input)
}

/// Parse a single octave marker (' or ,)
pub fn parse_octave_marker(input: &mut &str) -> PResult<i8> {
    alt(('\''.value(1), ','.value(-1))).parse_next(input)
}

fn parse_note_token(input: &mut &str) -> PResult<NoteToken> {
    let accidental = opt(parse_accidental).parse_next(input)?;
    let (pitch, high) = parse_pitch(input)?;
    let octave_shift = opt(parse_octave_marker).parse_next(input)?.unwrap_or(0);

    Ok(NoteToken {
        accidental,
        pitch,
        high,
        octave_shift,
    })
}

/// Parse a complete note token; trailing input is an error.
pub fn parse_token(token: &str) -> Result<NoteToken> {
    let mut input = token;
    let note = parse_note_token(&mut input)
        .map_err(|_| AbcError::InvalidNoteToken(token.to_string()))?;
    if !input.is_empty() {
        return Err(AbcError::InvalidNoteToken(token.to_string()));
    }
    Ok(note)
}

/// Convert an ABC note token to its MIDI note number.
///
/// Middle C is upper-case `C` (60). An explicit `=` contributes nothing.
pub fn note_token_to_midi(token: &str) -> Result<u8> {
    let note = parse_token(token)?;
    u8::try_from(note.to_midi()).map_err(|_| AbcError::InvalidNoteToken(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pitch() {
        let mut input = "C";
        assert_eq!(parse_pitch(&mut input).unwrap(), (NoteName::C, false));

        let mut input = "c";
        assert_eq!(parse_pitch(&mut input).unwrap(), (NoteName::C, true));

        let mut input = "H";
        assert!(parse_pitch(&mut input).is_err());
    }

    #[test]
    fn test_parse_accidental() {
        let mut input = "^";
        assert_eq!(parse_accidental(&mut input).unwrap(), Accidental::Sharp);

        let mut input = "^^";
        assert_eq!(
            parse_accidental(&mut input).unwrap(),
            Accidental::DoubleSharp
        );

        let mut input = "_";
        assert_eq!(parse_accidental(&mut input).unwrap(), Accidental::Flat);

        let mut input = "__";
        assert_eq!(
            parse_accidental(&mut input).unwrap(),
            Accidental::DoubleFlat
        );

        let mut input = "=";
        assert_eq!(parse_accidental(&mut input).unwrap(), Accidental::Natural);
    }

    #[test]
    fn test_documented_midi_numbers() {
        let table = [
            ("C", 60),
            ("c", 72),
            ("c'", 84),
            ("C,", 48),
            ("^C", 61),
            ("^^C", 62),
            ("_E", 63),
            ("__E", 62),
        ];
        for (token, expected) in table {
            assert_eq!(note_token_to_midi(token).unwrap(), expected, "{token}");
        }
    }

    #[test]
    fn test_natural_marker_adds_nothing() {
        assert_eq!(note_token_to_midi("=f").unwrap(), 77);
        assert_eq!(note_token_to_midi("=B,").unwrap(), 59);
    }

    #[test]
    fn test_combined_markers() {
        assert_eq!(note_token_to_midi("_b'").unwrap(), 94);
        assert_eq!(note_token_to_midi("^^G,").unwrap(), 57);
    }

    #[test]
    fn test_invalid_tokens() {
        for token in ["", "H", "^", "^^^C", "C''", "CD", "c,,", "#C", "C#"] {
            assert_eq!(
                note_token_to_midi(token),
                Err(AbcError::InvalidNoteToken(token.to_string())),
                "{token:?}"
            );
        }
    }
}
