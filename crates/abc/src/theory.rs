//! Scale and mode tables, and the key-signature lookups built on them.

use crate::ast::{Accidental, Key, Mode, NoteName, Tonic};

/// MIDI number of upper-case `C` (middle C).
pub const MIDDLE_C: u8 = 60;

/// Scale degree: a natural letter plus its alteration in the scale.
type Degree = (NoteName, i8);

/// The major scale built on a tonic, degree by degree.
pub fn major_scale(tonic: Tonic) -> [Degree; 7] {
    use NoteName::*;
    match tonic {
        Tonic::C => [(C, 0), (D, 0), (E, 0), (F, 0), (G, 0), (A, 0), (B, 0)],

        Tonic::G => [(G, 0), (A, 0), (B, 0), (C, 0), (D, 0), (E, 0), (F, 1)],
        Tonic::D => [(D, 0), (E, 0), (F, 1), (G, 0), (A, 0), (B, 0), (C, 1)],
        Tonic::A => [(A, 0), (B, 0), (C, 1), (D, 0), (E, 0), (F, 1), (G, 1)],
        Tonic::E => [(E, 0), (F, 1), (G, 1), (A, 0), (B, 0), (C, 1), (D, 1)],
        Tonic::B => [(B, 0), (C, 1), (D, 1), (E, 0), (F, 1), (G, 1), (A, 1)],
        Tonic::FSharp => [(F, 1), (G, 1), (A, 1), (B, 0), (C, 1), (D, 1), (E, 1)],
        Tonic::CSharp => [(C, 1), (D, 1), (E, 1), (F, 1), (G, 1), (A, 1), (B, 1)],

        Tonic::F => [(F, 0), (G, 0), (A, 0), (B, -1), (C, 0), (D, 0), (E, 0)],
        Tonic::BFlat => [(B, -1), (C, 0), (D, 0), (E, -1), (F, 0), (G, 0), (A, 0)],
        Tonic::EFlat => [(E, -1), (F, 0), (G, 0), (A, -1), (B, -1), (C, 0), (D, 0)],
        Tonic::AFlat => [(A, -1), (B, -1), (C, 0), (D, -1), (E, -1), (F, 0), (G, 0)],
        Tonic::DFlat => [(D, -1), (E, -1), (F, 0), (G, -1), (A, -1), (B, -1), (C, 0)],
        Tonic::GFlat => [(G, -1), (A, -1), (B, -1), (C, -1), (D, -1), (E, -1), (F, 0)],
        Tonic::CFlat => [(C, -1), (D, -1), (E, -1), (F, -1), (G, -1), (A, -1), (B, -1)],
    }
}

/// Per-degree alteration of a mode relative to the major scale on the same tonic.
pub fn mode_alterations(mode: Mode) -> [i8; 7] {
    match mode {
        Mode::Major => [0, 0, 0, 0, 0, 0, 0],
        Mode::Dorian => [0, 0, -1, 0, 0, 0, -1],
        Mode::Phrygian => [0, -1, -1, 0, 0, -1, -1],
        Mode::Lydian => [0, 0, 0, 1, 0, 0, 0],
        Mode::Mixolydian => [0, 0, 0, 0, 0, 0, -1],
        Mode::Minor => [0, 0, -1, 0, 0, -1, -1],
        Mode::Locrian => [0, -1, -1, 0, -1, -1, -1],
    }
}

/// Alteration a key signature applies to a natural note.
///
/// The note is found in the parallel major scale of the key's tonic; the
/// degree's own sharp/flat is then combined with the mode's alteration at
/// that degree. `None` means the note is played natural.
pub fn alteration_for(note: NoteName, key: &Key) -> Option<Accidental> {
    let scale = major_scale(key.tonic);
    let alterations = mode_alterations(key.mode);

    // Every tonic's scale spells each letter exactly once.
    let (index, (_, in_major)) = scale
        .iter()
        .enumerate()
        .find(|(_, (letter, _))| *letter == note)?;

    Accidental::from_semitone_offset(in_major + alterations[index])
}

/// Absolute MIDI number of a note.
///
/// `high` is the lower-case letter band (one octave above middle C's band),
/// `octave_shift` counts `'` (+1) and `,` (-1) markers.
pub fn midi_number(
    letter: NoteName,
    high: bool,
    accidental: Option<Accidental>,
    octave_shift: i8,
) -> i16 {
    let mut number = MIDDLE_C as i16 + letter.to_semitone() as i16;
    if high {
        number += 12;
    }
    number += 12 * octave_shift as i16;
    number += accidental.map(|a| a.to_semitone_offset()).unwrap_or(0) as i16;
    number
}
