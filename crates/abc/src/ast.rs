//! Types for the parts of ABC notation this crate understands.
//!
//! Only the header fields needed to play a tune and the single-note
//! grammar used for keystroke preview are modelled here.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The seven natural note letters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteName {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteName {
    /// Convert to semitone offset from C (0-11)
    pub fn to_semitone(&self) -> i8 {
        match self {
            NoteName::C => 0,
            NoteName::D => 2,
            NoteName::E => 4,
            NoteName::F => 5,
            NoteName::G => 7,
            NoteName::A => 9,
            NoteName::B => 11,
        }
    }

    /// All note names in order
    pub fn all() -> [NoteName; 7] {
        [
            NoteName::C,
            NoteName::D,
            NoteName::E,
            NoteName::F,
            NoteName::G,
            NoteName::A,
            NoteName::B,
        ]
    }

    /// Parse a note letter (case-insensitive)
    pub fn from_char(c: char) -> Option<NoteName> {
        match c.to_ascii_uppercase() {
            'C' => Some(NoteName::C),
            'D' => Some(NoteName::D),
            'E' => Some(NoteName::E),
            'F' => Some(NoteName::F),
            'G' => Some(NoteName::G),
            'A' => Some(NoteName::A),
            'B' => Some(NoteName::B),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            NoteName::C => 'C',
            NoteName::D => 'D',
            NoteName::E => 'E',
            NoteName::F => 'F',
            NoteName::G => 'G',
            NoteName::A => 'A',
            NoteName::B => 'B',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accidental {
    DoubleSharp,
    Sharp,
    Natural,
    Flat,
    DoubleFlat,
}

impl Accidental {
    /// Convert to semitone offset
    pub fn to_semitone_offset(&self) -> i8 {
        match self {
            Accidental::DoubleSharp => 2,
            Accidental::Sharp => 1,
            Accidental::Natural => 0,
            Accidental::Flat => -1,
            Accidental::DoubleFlat => -2,
        }
    }

    /// Alteration implied by a key signature.
    ///
    /// Zero means "no marker" rather than an explicit natural, so it maps
    /// to `None`. Offsets outside -2..=2 cannot come out of a key.
    pub fn from_semitone_offset(offset: i8) -> Option<Accidental> {
        match offset {
            2 => Some(Accidental::DoubleSharp),
            1 => Some(Accidental::Sharp),
            -1 => Some(Accidental::Flat),
            -2 => Some(Accidental::DoubleFlat),
            _ => None,
        }
    }

    /// Parse an ABC accidental marker
    pub fn parse(s: &str) -> Option<Accidental> {
        match s {
            "^" => Some(Accidental::Sharp),
            "_" => Some(Accidental::Flat),
            "^^" => Some(Accidental::DoubleSharp),
            "__" => Some(Accidental::DoubleFlat),
            "=" => Some(Accidental::Natural),
            _ => None,
        }
    }

    /// The ABC marker written before a note letter
    pub fn abc_marker(&self) -> &'static str {
        match self {
            Accidental::DoubleSharp => "^^",
            Accidental::Sharp => "^",
            Accidental::Natural => "=",
            Accidental::Flat => "_",
            Accidental::DoubleFlat => "__",
        }
    }
}

/// Diatonic modes, in their canonical three-letter spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Mode {
    #[default]
    Major,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Minor,
    Locrian,
}

impl Mode {
    pub fn all() -> [Mode; 7] {
        [
            Mode::Major,
            Mode::Dorian,
            Mode::Phrygian,
            Mode::Lydian,
            Mode::Mixolydian,
            Mode::Minor,
            Mode::Locrian,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Major => "maj",
            Mode::Dorian => "dor",
            Mode::Phrygian => "phr",
            Mode::Lydian => "lyd",
            Mode::Mixolydian => "mix",
            Mode::Minor => "min",
            Mode::Locrian => "loc",
        }
    }

    /// Match a mode name by its leading three letters.
    ///
    /// Prefixes are tried in order: maj, ion, dor, phr, lyd, mix, min, eol,
    /// loc. Ionian folds into major and Aeolian into minor.
    pub fn from_prefix(s: &str) -> Option<Mode> {
        const PREFIXES: [(&str, Mode); 9] = [
            ("maj", Mode::Major),
            ("ion", Mode::Major),
            ("dor", Mode::Dorian),
            ("phr", Mode::Phrygian),
            ("lyd", Mode::Lydian),
            ("mix", Mode::Mixolydian),
            ("min", Mode::Minor),
            ("eol", Mode::Minor),
            ("loc", Mode::Locrian),
        ];

        PREFIXES
            .iter()
            .find(|(prefix, _)| s.starts_with(prefix))
            .map(|(_, mode)| *mode)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root of a key: one of the fifteen major-key tonics.
///
/// Tonics outside this set (A#, Fb, ...) have no key signature and cannot
/// be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Tonic {
    #[default]
    C,
    G,
    D,
    A,
    E,
    B,
    FSharp,
    CSharp,
    F,
    BFlat,
    EFlat,
    AFlat,
    DFlat,
    GFlat,
    CFlat,
}

impl Tonic {
    pub fn all() -> [Tonic; 15] {
        [
            Tonic::C,
            Tonic::G,
            Tonic::D,
            Tonic::A,
            Tonic::E,
            Tonic::B,
            Tonic::FSharp,
            Tonic::CSharp,
            Tonic::F,
            Tonic::BFlat,
            Tonic::EFlat,
            Tonic::AFlat,
            Tonic::DFlat,
            Tonic::GFlat,
            Tonic::CFlat,
        ]
    }

    /// Look up a tonic from a letter and an optional sharp/flat
    pub fn from_parts(letter: NoteName, accidental: Option<Accidental>) -> Option<Tonic> {
        use NoteName::*;
        match (letter, accidental) {
            (C, None) => Some(Tonic::C),
            (G, None) => Some(Tonic::G),
            (D, None) => Some(Tonic::D),
            (A, None) => Some(Tonic::A),
            (E, None) => Some(Tonic::E),
            (B, None) => Some(Tonic::B),
            (F, Some(Accidental::Sharp)) => Some(Tonic::FSharp),
            (C, Some(Accidental::Sharp)) => Some(Tonic::CSharp),
            (F, None) => Some(Tonic::F),
            (B, Some(Accidental::Flat)) => Some(Tonic::BFlat),
            (E, Some(Accidental::Flat)) => Some(Tonic::EFlat),
            (A, Some(Accidental::Flat)) => Some(Tonic::AFlat),
            (D, Some(Accidental::Flat)) => Some(Tonic::DFlat),
            (G, Some(Accidental::Flat)) => Some(Tonic::GFlat),
            (C, Some(Accidental::Flat)) => Some(Tonic::CFlat),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tonic::C => "C",
            Tonic::G => "G",
            Tonic::D => "D",
            Tonic::A => "A",
            Tonic::E => "E",
            Tonic::B => "B",
            Tonic::FSharp => "F#",
            Tonic::CSharp => "C#",
            Tonic::F => "F",
            Tonic::BFlat => "Bb",
            Tonic::EFlat => "Eb",
            Tonic::AFlat => "Ab",
            Tonic::DFlat => "Db",
            Tonic::GFlat => "Gb",
            Tonic::CFlat => "Cb",
        }
    }
}

impl fmt::Display for Tonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key signature, normalized to (tonic, mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Key {
    pub tonic: Tonic,
    pub mode: Mode,
}

impl Key {
    pub fn new(tonic: Tonic, mode: Mode) -> Self {
        Key { tonic, mode }
    }
}

/// Renders the canonical form, e.g. `F#maj` or `Bbmin`.
impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tonic, self.mode)
    }
}

/// A plain numerator/denominator pair (note lengths, beat units)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fraction {
    pub numerator: u32,
    pub denominator: u32,
}

impl Fraction {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Fraction {
            numerator,
            denominator,
        }
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Meter/time signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Meter {
    Simple { numerator: u32, denominator: u32 },
    Common, // C = 4/4
    Cut,    // C| = 2/2
}

impl Meter {
    pub fn to_fraction(&self) -> Fraction {
        match self {
            Meter::Simple {
                numerator,
                denominator,
            } => Fraction::new(*numerator, *denominator),
            Meter::Common => Fraction::new(4, 4),
            Meter::Cut => Fraction::new(2, 2),
        }
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Meter::Simple {
                numerator,
                denominator,
            } => write!(f, "{}/{}", numerator, denominator),
            Meter::Common => write!(f, "C"),
            Meter::Cut => write!(f, "C|"),
        }
    }
}

/// Tempo (Q: field)
///
/// `beat_unit` is `None` for the bare form `Q:120`; the beat then falls
/// back to the default note length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tempo {
    pub beat_unit: Option<Fraction>,
    pub bpm: u32,
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.beat_unit {
            Some(unit) => write!(f, "{}={}", unit, self.bpm),
            None => write!(f, "{}", self.bpm),
        }
    }
}

/// Everything the player needs from a tune header.
///
/// Produced by one pass of [`crate::parser::scan_tune`] and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuneHeader {
    pub reference: u32,
    pub titles: Vec<String>,
    pub key: Option<Key>,
    pub meter: Option<Meter>,
    pub default_note_length: Option<Fraction>,
    pub tempo: Option<Tempo>,
    pub rhythm: Option<String>,
}

impl Default for TuneHeader {
    fn default() -> Self {
        TuneHeader {
            reference: 1,
            titles: Vec::new(),
            key: None,
            meter: None,
            default_note_length: None,
            tempo: None,
            rhythm: None,
        }
    }
}

impl TuneHeader {
    /// The first title, or an empty string
    pub fn title(&self) -> &str {
        self.titles.first().map(String::as_str).unwrap_or("")
    }
}
