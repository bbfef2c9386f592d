//! Line-by-line tune header scanner.
//!
//! The scanner is a small state machine (`Begin -> Header -> Tune/End`)
//! fed one line at a time. It extracts the fields needed to play a tune
//! and leaves the tune body to an external renderer.
//!
//! Field values that cannot be parsed stop the scan with an [`AbcError`];
//! lines that are merely out of place are recorded as feedback and skipped.

pub mod header;
pub mod key;
pub mod note;

use tracing::{debug, warn};

use crate::ast::TuneHeader;
use crate::error::Result;
use crate::feedback::{FeedbackCollector, ParseResult};

pub use header::{is_comment, is_header_line, is_reference_number};
pub use key::{normalize_key, normalize_key_lenient};
pub use note::note_token_to_midi;

/// Where the scanner goes once the K: field closes the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Keep reading: the remaining lines are the tune body
    #[default]
    FullTune,
    /// Only the header is wanted; everything after K: is ignored
    HeaderOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Begin,
    Header,
    Tune,
    End,
}

/// Incremental header scanner. One instance per tune.
#[derive(Debug)]
pub struct HeaderScanner {
    mode: ScanMode,
    state: ScanState,
    header: TuneHeader,
    collector: FeedbackCollector,
    line_no: usize,
}

impl HeaderScanner {
    pub fn new(mode: ScanMode) -> Self {
        HeaderScanner {
            mode,
            state: ScanState::Begin,
            header: TuneHeader::default(),
            collector: FeedbackCollector::new(),
            line_no: 0,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Feed the next line of the tune.
    pub fn feed_line(&mut self, line: &str) -> Result<()> {
        self.line_no += 1;
        self.collector.set_line(self.line_no);

        let line = line.trim();
        if line.is_empty() || header::is_comment(line) {
            return Ok(());
        }

        match self.state {
            ScanState::Begin => {
                if header::is_reference_number(line) {
                    self.begin_tune(line);
                } else {
                    self.unexpected(line);
                }
            }
            ScanState::Header => self.header_line(line)?,
            ScanState::Tune | ScanState::End => {
                if header::is_header_line(line) {
                    self.unexpected(line);
                }
            }
        }

        Ok(())
    }

    /// Finish scanning and hand over the header with its feedback.
    pub fn finish(mut self) -> ParseResult<TuneHeader> {
        if self.header.key.is_none() {
            self.collector.info("no K: field found, header is incomplete");
        }
        ParseResult::new(self.header, self.collector.into_feedback())
    }

    fn begin_tune(&mut self, line: &str) {
        let value = header::split_field(line).map(|(_, v)| v).unwrap_or("");
        match value.parse() {
            Ok(reference) => self.header.reference = reference,
            Err(_) => self
                .collector
                .info(format!("invalid X: value '{}', using 1", value)),
        }
        debug!("tune X:{} begins", self.header.reference);
        self.state = ScanState::Header;
    }

    fn header_line(&mut self, line: &str) -> Result<()> {
        let Some((tag, value)) = header::split_field(line).filter(|_| header::is_header_line(line))
        else {
            self.unexpected(line);
            return Ok(());
        };

        match tag {
            'T' => self.header.titles.push(value.to_string()),
            'R' => self.header.rhythm = Some(value.to_string()),
            'M' => {
                let meter = header::parse_meter(value)?;
                debug!("meter = {:?}", meter);
                self.header.meter = Some(meter);
            }
            'L' => {
                let length = header::parse_default_note_length(value)?;
                debug!("default note length = {}", length);
                self.header.default_note_length = Some(length);
            }
            'Q' => {
                let tempo = header::parse_tempo(value)?;
                debug!("tempo = {}", tempo);
                self.header.tempo = Some(tempo);
            }
            'K' => {
                let key = key::normalize_key(value)?;
                debug!("key = {}", key);
                self.header.key = Some(key);
                self.state = match self.mode {
                    ScanMode::FullTune => ScanState::Tune,
                    ScanMode::HeaderOnly => ScanState::End,
                };
            }
            _ => debug!("ignore header line: {}", line),
        }

        Ok(())
    }

    fn unexpected(&mut self, line: &str) {
        warn!("unexpected ABC line: '{}'", line);
        self.collector
            .warning(format!("unexpected ABC line: '{}'", line));
    }
}

/// Scan a raw tune (one string per line) in a single pass.
pub fn scan_tune<S: AsRef<str>>(lines: &[S], mode: ScanMode) -> Result<ParseResult<TuneHeader>> {
    let mut scanner = HeaderScanner::new(mode);
    for line in lines {
        scanner.feed_line(line.as_ref())?;
    }
    Ok(scanner.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::error::AbcError;
    use crate::feedback::FeedbackLevel;

    fn lines(abc: &str) -> Vec<&str> {
        abc.lines().collect()
    }

    #[test]
    fn test_parse_minimal() {
        let result = scan_tune(&lines("X:1\nT:Test\nK:C\n"), ScanMode::FullTune).unwrap();

        assert_eq!(result.value.reference, 1);
        assert_eq!(result.value.title(), "Test");
        assert_eq!(result.value.key, Some(Key::new(Tonic::C, Mode::Major)));
        assert!(result.feedback.is_empty());
    }

    #[test]
    fn test_parse_all_fields() {
        let abc = "X:7\nT:The Kesh\nT:Kesh Jig\nR:jig\nM:6/8\nL:1/8\nQ:3/8=120\nK:G\n";
        let header = scan_tune(&lines(abc), ScanMode::FullTune).unwrap().value;

        assert_eq!(header.reference, 7);
        assert_eq!(header.title(), "The Kesh");
        assert_eq!(header.titles.len(), 2);
        assert_eq!(header.rhythm.as_deref(), Some("jig"));
        assert_eq!(
            header.meter,
            Some(Meter::Simple {
                numerator: 6,
                denominator: 8
            })
        );
        assert_eq!(header.default_note_length, Some(Fraction::new(1, 8)));
        assert_eq!(
            header.tempo,
            Some(Tempo {
                beat_unit: Some(Fraction::new(3, 8)),
                bpm: 120
            })
        );
        assert_eq!(header.key, Some(Key::new(Tonic::G, Mode::Major)));
    }

    #[test]
    fn test_parse_common_time() {
        let header = scan_tune(&lines("X:1\nM:C\nK:D\n"), ScanMode::FullTune)
            .unwrap()
            .value;
        assert_eq!(header.meter, Some(Meter::Common));
    }

    #[test]
    fn test_missing_title_is_empty() {
        let header = scan_tune(&lines("X:1\nK:D\n"), ScanMode::FullTune)
            .unwrap()
            .value;
        assert_eq!(header.title(), "");
    }

    #[test]
    fn test_lines_before_reference_are_reported() {
        let result = scan_tune(&lines("T:Orphan\nX:1\nK:C\n"), ScanMode::FullTune).unwrap();

        assert_eq!(result.value.title(), "");
        let warnings: Vec<_> = result.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, 1);
        assert!(warnings[0].message.contains("T:Orphan"));
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let abc = "% file comment\n\nX:1\n  % indented\nT:Test\n\nK:Am\n";
        let result = scan_tune(&lines(abc), ScanMode::FullTune).unwrap();
        assert!(result.feedback.is_empty());
        assert_eq!(result.value.key, Some(Key::new(Tonic::A, Mode::Minor)));
    }

    #[test]
    fn test_reserved_headers_ignored() {
        let abc = "X:1\nC:Trad\nO:Ireland\nZ:someone\nK:C\n";
        let result = scan_tune(&lines(abc), ScanMode::FullTune).unwrap();
        assert!(result.feedback.is_empty());
    }

    #[test]
    fn test_non_header_line_in_header_is_reported() {
        let abc = "X:1\nT:Test\nGABc\nJ:odd\nK:C\n";
        let result = scan_tune(&lines(abc), ScanMode::FullTune).unwrap();
        assert_eq!(result.warnings().count(), 2);
        assert_eq!(result.value.key, Some(Key::default()));
    }

    #[test]
    fn test_key_switches_state() {
        let mut scanner = HeaderScanner::new(ScanMode::FullTune);
        assert_eq!(scanner.state(), ScanState::Begin);
        scanner.feed_line("X:1").unwrap();
        assert_eq!(scanner.state(), ScanState::Header);
        scanner.feed_line("K:G").unwrap();
        assert_eq!(scanner.state(), ScanState::Tune);

        let mut scanner = HeaderScanner::new(ScanMode::HeaderOnly);
        scanner.feed_line("X:1").unwrap();
        scanner.feed_line("K:G").unwrap();
        assert_eq!(scanner.state(), ScanState::End);
    }

    #[test]
    fn test_header_shaped_lines_after_key_are_reported() {
        let abc = "X:1\nK:G\nGABc dedB|\nM:3/4\nGAB|\n";
        let result = scan_tune(&lines(abc), ScanMode::FullTune).unwrap();

        assert_eq!(result.warnings().count(), 1);
        assert_eq!(result.feedback[0].line, 4);
        // Fields after the header never change it
        assert_eq!(result.value.meter, None);
    }

    #[test]
    fn test_field_errors_are_surfaced() {
        let err = scan_tune(&lines("X:1\nM:free\nK:C\n"), ScanMode::FullTune).unwrap_err();
        assert_eq!(err, AbcError::InvalidMeter("free".into()));

        let err = scan_tune(&lines("X:1\nL:1/3\nK:C\n"), ScanMode::FullTune).unwrap_err();
        assert_eq!(err, AbcError::InvalidDefaultNoteLength("1/3".into()));

        let err = scan_tune(&lines("X:1\nQ:C=120\nK:C\n"), ScanMode::FullTune).unwrap_err();
        assert_eq!(err, AbcError::InvalidOrUnsupportedTempo("C=120".into()));

        let err = scan_tune(&lines("X:1\nK:Bschtroumpf\n"), ScanMode::FullTune).unwrap_err();
        assert_eq!(err, AbcError::InvalidKey("Bschtroumpf".into()));
    }

    #[test]
    fn test_missing_key_is_noted() {
        let result = scan_tune(&lines("X:1\nT:No key\n"), ScanMode::FullTune).unwrap();
        assert_eq!(result.value.key, None);
        assert_eq!(result.feedback.len(), 1);
        assert_eq!(result.feedback[0].level, FeedbackLevel::Info);
    }
}
