//! Key signature normalization for ABC notation.

use tracing::debug;

use crate::ast::{Accidental, Key, Mode, NoteName, Tonic};
use crate::error::{AbcError, Result};

fn read_tonic(raw: &str) -> Option<(Tonic, &str)> {
    let mut chars = raw.chars();
    let letter = chars.next().and_then(NoteName::from_char)?;

    let rest = chars.as_str();
    let (accidental, rest) = if let Some(r) = rest.strip_prefix('#') {
        (Some(Accidental::Sharp), r)
    } else if let Some(r) = rest.strip_prefix('b') {
        (Some(Accidental::Flat), r)
    } else {
        (None, rest)
    };

    Some((Tonic::from_parts(letter, accidental)?, rest))
}

fn read_mode(word: &str) -> Option<Mode> {
    let word = word.to_ascii_lowercase();
    match word.as_str() {
        "" => Some(Mode::Major),
        "m" => Some(Mode::Minor),
        w if w.len() >= 3 => Mode::from_prefix(w),
        _ => None,
    }
}

/// Tonic plus the whole remainder as the mode. Space between the two is
/// allowed, anything after the mode word is not.
fn read_key(raw: &str) -> Option<Key> {
    let (tonic, rest) = read_tonic(raw.trim())?;
    let rest = rest.trim_start();
    if rest.contains(char::is_whitespace) {
        return None;
    }
    Some(Key::new(tonic, read_mode(rest)?))
}

/// Like [`read_key`], but only the first word counts as the mode and
/// `clef=...` style modifiers are skipped.
fn read_key_loosely(raw: &str) -> Option<Key> {
    let (tonic, rest) = read_tonic(raw.trim())?;
    let word = rest
        .split_whitespace()
        .find(|word| !word.contains('='))
        .unwrap_or("");
    Some(Key::new(tonic, read_mode(word)?))
}

/// Parse and normalize a K: field value (e.g. `G`, `Amix`, `F#m`, `Eb dorian`).
///
/// Fails with [`AbcError::InvalidKey`] when the tonic has no major key
/// signature or the mode is not recognized. Used when setting up a tune.
pub fn normalize_key(raw: &str) -> Result<Key> {
    read_key(raw).ok_or_else(|| AbcError::InvalidKey(raw.trim().to_string()))
}

/// Normalize a K: field value without ever failing.
///
/// Words after the mode and `clef=` modifiers are ignored; anything else
/// [`normalize_key`] rejects becomes C major. Used for keystroke
/// preview, where a bad header must not get in the way of typing.
pub fn normalize_key_lenient(raw: &str) -> Key {
    read_key_loosely(raw).unwrap_or_else(|| {
        debug!("invalid key '{}', assuming C major", raw.trim());
        Key::default()
    })
}
