//! Reading ABC out of an editor buffer around the text cursor.
//!
//! Two questions are answered here: which tune is the cursor in, and which
//! note (if any) should sound for the key that was just pressed.

use tracing::debug;

use crate::ast::{Accidental, NoteName};
use crate::error::{AbcError, Result};
use crate::parser::header::{is_reference_number, split_field};
use crate::parser::key::normalize_key_lenient;
use crate::theory::alteration_for;

/// The view of an editor buffer the scanners need.
///
/// Line numbers are 1-based.
pub trait EditBuffer {
    /// Text of the cursor's line, up to (not including) the cursor
    fn current_line_to_cursor(&self) -> String;

    /// Line `n`, without its line terminator; `None` past the end
    fn line(&self, n: usize) -> Option<String>;

    fn cursor_line(&self) -> usize;
}

/// A plain in-memory buffer with a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBuffer {
    lines: Vec<String>,
    cursor_line: usize,
    cursor_column: usize,
}

impl TextBuffer {
    /// A buffer with the cursor at the very end of `text`
    pub fn new(text: &str) -> Self {
        let mut buffer = TextBuffer {
            lines: text
                .split('\n')
                .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
                .collect(),
            cursor_line: 1,
            cursor_column: 0,
        };
        buffer.cursor_line = buffer.lines.len();
        buffer.cursor_column = buffer.lines[buffer.lines.len() - 1].chars().count();
        buffer
    }

    /// Move the cursor; both coordinates are clamped to the buffer.
    ///
    /// `line` is 1-based, `column` counts characters before the cursor.
    pub fn set_cursor(&mut self, line: usize, column: usize) {
        self.cursor_line = line.clamp(1, self.lines.len());
        let width = self.lines[self.cursor_line - 1].chars().count();
        self.cursor_column = column.min(width);
    }

    pub fn with_cursor(mut self, line: usize, column: usize) -> Self {
        self.set_cursor(line, column);
        self
    }

    pub fn cursor_column(&self) -> usize {
        self.cursor_column
    }

    /// Insert text at the cursor, leaving the cursor after it
    pub fn insert(&mut self, text: &str) {
        let current = &self.lines[self.cursor_line - 1];
        let split = current
            .char_indices()
            .nth(self.cursor_column)
            .map(|(i, _)| i)
            .unwrap_or(current.len());
        let (head, tail) = current.split_at(split);
        let combined = format!("{}{}", head, text);
        let tail = tail.to_string();

        let mut new_lines: Vec<String> = combined.split('\n').map(str::to_string).collect();
        let last = new_lines.len() - 1;
        let column = new_lines[last].chars().count();
        new_lines[last].push_str(&tail);

        let row = self.cursor_line - 1;
        self.lines.splice(row..=row, new_lines.iter().cloned());
        self.cursor_line = row + new_lines.len();
        self.cursor_column = column;
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl EditBuffer for TextBuffer {
    fn current_line_to_cursor(&self) -> String {
        self.lines[self.cursor_line - 1]
            .chars()
            .take(self.cursor_column)
            .collect()
    }

    fn line(&self, n: usize) -> Option<String> {
        n.checked_sub(1).and_then(|i| self.lines.get(i)).cloned()
    }

    fn cursor_line(&self) -> usize {
        self.cursor_line
    }
}

/// The lines of the tune under the cursor, starting at its `X:` line.
///
/// The tune ends before the next `X:` line, the next blank line or the end
/// of the buffer, whichever comes first.
pub fn current_raw_tune<B: EditBuffer + ?Sized>(buffer: &B) -> Result<Vec<String>> {
    let cursor = buffer.cursor_line();
    let mut raw_tune = Vec::new();

    let mut line_no = cursor;
    loop {
        if line_no == 0 {
            return Err(AbcError::MissingReferenceNumber);
        }
        let line = buffer.line(line_no).unwrap_or_default();
        let found = is_reference_number(&line);
        raw_tune.push(line);
        if found {
            break;
        }
        line_no -= 1;
    }
    raw_tune.reverse();

    let mut line_no = cursor + 1;
    while let Some(line) = buffer.line(line_no) {
        if is_reference_number(&line) || line.trim().is_empty() {
            break;
        }
        raw_tune.push(line);
        line_no += 1;
    }

    Ok(raw_tune)
}

/// The raw K: value in force at the cursor, if the tune has one above it
fn current_raw_key<B: EditBuffer + ?Sized>(buffer: &B) -> Option<String> {
    (1..=buffer.cursor_line()).rev().find_map(|n| {
        let line = buffer.line(n)?;
        match split_field(&line) {
            Some(('K', value)) => Some(Some(value.to_string())),
            Some(('X', _)) => Some(None),
            _ => None,
        }
    })?
}

/// Accidental written at the very end of `text` (`^`, `^^`, `_`, `__` or `=`)
fn trailing_accidental(text: &str) -> Option<Accidental> {
    let mut rev = text.chars().rev();
    match rev.next()? {
        '=' => Some(Accidental::Natural),
        c @ ('^' | '_') => {
            let doubled = rev.next() == Some(c);
            match (c, doubled) {
                ('^', true) => Some(Accidental::DoubleSharp),
                ('^', false) => Some(Accidental::Sharp),
                ('_', true) => Some(Accidental::DoubleFlat),
                _ => Some(Accidental::Flat),
            }
        }
        _ => None,
    }
}

/// Decide which note, if any, the key just pressed should sound.
///
/// Returns a normalized ABC note token such as `^f`, `_B,` or `c'`, or
/// `None` when the keystroke is not a note: inside a comment, on a header
/// line, an octave marker that does not follow a note letter of the right
/// case, or any other character.
///
/// Without an explicit accidental in front of the note the current key
/// decides; a missing or malformed K: field counts as C major.
pub fn note_to_play<B: EditBuffer + ?Sized>(buffer: &B, key: char) -> Option<String> {
    let mut line = buffer.current_line_to_cursor();

    if line.contains('%') {
        return None;
    }

    let mut head = line.chars();
    if let (Some(first), Some(':')) = (head.next(), head.next()) {
        if first.is_ascii_uppercase() {
            return None;
        }
    }

    let (note, octave_marker) = match key {
        '\'' | ',' => {
            let previous = line.pop()?;
            NoteName::from_char(previous)?;
            let fits = match key {
                ',' => previous.is_ascii_uppercase(),
                _ => previous.is_ascii_lowercase(),
            };
            if !fits {
                return None;
            }
            (previous, Some(key))
        }
        _ => {
            NoteName::from_char(key)?;
            (key, None)
        }
    };

    let accidental = match trailing_accidental(&line) {
        Some(Accidental::Natural) => None,
        Some(explicit) => Some(explicit),
        None => {
            let raw_key = current_raw_key(buffer).unwrap_or_else(|| "C".to_string());
            let key = normalize_key_lenient(&raw_key);
            NoteName::from_char(note).and_then(|name| alteration_for(name, &key))
        }
    };

    let mut token = String::new();
    if let Some(accidental) = accidental {
        token.push_str(accidental.abc_marker());
    }
    token.push(note);
    if let Some(marker) = octave_marker {
        token.push(marker);
    }

    debug!("note to play: {}", token);
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TWO_TUNES: &str = "\
% tunebook
X:1
T:First
K:D
DEFG|ABcd|

X:2
T:Second
K:G
GABc|
dedB|
X:3
K:C
CDEF|";

    #[test]
    fn test_text_buffer_cursor() {
        let buffer = TextBuffer::new("X:1\nK:C\nCDE");
        assert_eq!(buffer.cursor_line(), 3);
        assert_eq!(buffer.current_line_to_cursor(), "CDE");

        let buffer = buffer.with_cursor(2, 1);
        assert_eq!(buffer.current_line_to_cursor(), "K");
        assert_eq!(buffer.line(0), None);
        assert_eq!(buffer.line(1).as_deref(), Some("X:1"));
        assert_eq!(buffer.line(4), None);
    }

    #[test]
    fn test_text_buffer_insert() {
        let mut buffer = TextBuffer::new("X:1\nK:C\nCE").with_cursor(3, 1);
        buffer.insert("D");
        assert_eq!(buffer.text(), "X:1\nK:C\nCDE");
        assert_eq!(buffer.current_line_to_cursor(), "CD");

        buffer.insert("|\nF");
        assert_eq!(buffer.text(), "X:1\nK:C\nCD|\nFE");
        assert_eq!(buffer.cursor_line(), 4);
        assert_eq!(buffer.current_line_to_cursor(), "F");
    }

    #[test]
    fn test_current_raw_tune_middle() {
        let buffer = TextBuffer::new(TWO_TUNES).with_cursor(10, 2);
        let tune = current_raw_tune(&buffer).unwrap();
        assert_eq!(tune, vec!["X:2", "T:Second", "K:G", "GABc|", "dedB|"]);
    }

    #[test]
    fn test_current_raw_tune_stops_at_blank_line() {
        let buffer = TextBuffer::new(TWO_TUNES).with_cursor(3, 0);
        let tune = current_raw_tune(&buffer).unwrap();
        assert_eq!(tune, vec!["X:1", "T:First", "K:D", "DEFG|ABcd|"]);
    }

    #[test]
    fn test_current_raw_tune_on_reference_line() {
        let buffer = TextBuffer::new(TWO_TUNES).with_cursor(12, 0);
        let tune = current_raw_tune(&buffer).unwrap();
        assert_eq!(tune, vec!["X:3", "K:C", "CDEF|"]);
    }

    #[test]
    fn test_current_raw_tune_missing_reference() {
        let buffer = TextBuffer::new(TWO_TUNES).with_cursor(1, 0);
        assert_eq!(
            current_raw_tune(&buffer),
            Err(AbcError::MissingReferenceNumber)
        );
    }

    #[test]
    fn test_note_in_key() {
        let buffer = TextBuffer::new("K:G\nCDEF GAB");
        assert_eq!(note_to_play(&buffer, 'f').as_deref(), Some("^f"));
        assert_eq!(note_to_play(&buffer, 'G').as_deref(), Some("G"));
    }

    #[test]
    fn test_explicit_natural() {
        let buffer = TextBuffer::new("K:G\nCDEF GAB=");
        assert_eq!(note_to_play(&buffer, 'f').as_deref(), Some("f"));
    }

    #[test]
    fn test_explicit_accidentals() {
        let buffer = TextBuffer::new("K:G\nCDEF ^^");
        assert_eq!(note_to_play(&buffer, 'c').as_deref(), Some("^^c"));

        let buffer = TextBuffer::new("K:G\nCDEF _");
        assert_eq!(note_to_play(&buffer, 'f').as_deref(), Some("_f"));

        let buffer = TextBuffer::new("K:D\n__");
        assert_eq!(note_to_play(&buffer, 'B').as_deref(), Some("__B"));
    }

    #[test]
    fn test_header_line_is_silent() {
        let buffer = TextBuffer::new("X:1\nC:Paddy F");
        assert_eq!(note_to_play(&buffer, 'F'), None);
    }

    #[test]
    fn test_comment_is_silent() {
        let buffer = TextBuffer::new("K:C\nCDE % about ");
        assert_eq!(note_to_play(&buffer, 'E'), None);
    }

    #[test]
    fn test_not_a_note() {
        let buffer = TextBuffer::new("K:C\nCDE");
        assert_eq!(note_to_play(&buffer, 'h'), None);
        assert_eq!(note_to_play(&buffer, '|'), None);
    }

    #[test]
    fn test_octave_markers() {
        let buffer = TextBuffer::new("K:D\nABc");
        assert_eq!(note_to_play(&buffer, '\'').as_deref(), Some("^c'"));
        assert_eq!(note_to_play(&buffer, ','), None);

        let buffer = TextBuffer::new("K:F\nAB");
        assert_eq!(note_to_play(&buffer, ',').as_deref(), Some("_B,"));
        assert_eq!(note_to_play(&buffer, '\''), None);

        let buffer = TextBuffer::new("K:C\n^c");
        assert_eq!(note_to_play(&buffer, '\'').as_deref(), Some("^c'"));
    }

    #[test]
    fn test_octave_marker_without_note() {
        let buffer = TextBuffer::new("K:C\nAB|");
        assert_eq!(note_to_play(&buffer, '\''), None);

        let buffer = TextBuffer::new("K:C\n");
        assert_eq!(note_to_play(&buffer, '\''), None);
    }

    #[test]
    fn test_key_defaults_to_c_major() {
        let buffer = TextBuffer::new("X:1\nT:No key\nfB");
        assert_eq!(note_to_play(&buffer, 'f').as_deref(), Some("f"));

        let buffer = TextBuffer::new("X:1\nK:Bschtroumpf\nfB");
        assert_eq!(note_to_play(&buffer, 'f').as_deref(), Some("f"));
    }

    #[test]
    fn test_key_search_stops_at_reference_number() {
        let buffer = TextBuffer::new("X:1\nK:A\n\nX:2\nT:Next\nC");
        assert_eq!(note_to_play(&buffer, 'c').as_deref(), Some("c"));
    }

    #[test]
    fn test_modal_key() {
        let buffer = TextBuffer::new("X:1\nK:C dorian\nCD");
        assert_eq!(note_to_play(&buffer, 'E').as_deref(), Some("_E"));
        assert_eq!(note_to_play(&buffer, 'B').as_deref(), Some("_B"));
    }
}
