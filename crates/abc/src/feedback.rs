//! Scanner feedback (unexpected lines, missing fields).
//!
//! The header scanner never stops on a line it does not understand; it
//! records the line here and moves on.

use serde::{Deserialize, Serialize};

/// One note about a line of the scanned tune
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub level: FeedbackLevel,
    pub message: String,
    /// 1-based line number within the scanned tune
    pub line: usize,
}

impl Feedback {
    pub fn warning(message: impl Into<String>, line: usize) -> Self {
        Feedback {
            level: FeedbackLevel::Warning,
            message: message.into(),
            line,
        }
    }

    pub fn info(message: impl Into<String>, line: usize) -> Self {
        Feedback {
            level: FeedbackLevel::Info,
            message: message.into(),
            line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackLevel {
    /// A line was skipped because it made no sense where it appeared
    Warning,
    /// Something worth knowing, e.g. a field the player will default
    Info,
}

/// Collector for feedback during scanning
#[derive(Debug, Default)]
pub struct FeedbackCollector {
    feedback: Vec<Feedback>,
    current_line: usize,
}

impl FeedbackCollector {
    pub fn new() -> Self {
        FeedbackCollector {
            feedback: Vec::new(),
            current_line: 1,
        }
    }

    /// Update position tracking (call when advancing through input)
    pub fn set_line(&mut self, line: usize) {
        self.current_line = line;
    }

    /// Add a warning at current position
    pub fn warning(&mut self, message: impl Into<String>) {
        self.feedback
            .push(Feedback::warning(message, self.current_line));
    }

    /// Add info at current position
    pub fn info(&mut self, message: impl Into<String>) {
        self.feedback.push(Feedback::info(message, self.current_line));
    }

    /// Get all feedback
    pub fn into_feedback(self) -> Vec<Feedback> {
        self.feedback
    }
}

/// Result of scanning with feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult<T> {
    pub value: T,
    pub feedback: Vec<Feedback>,
}

impl<T> ParseResult<T> {
    pub fn new(value: T, feedback: Vec<Feedback>) -> Self {
        ParseResult { value, feedback }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Feedback> {
        self.feedback
            .iter()
            .filter(|f| f.level == FeedbackLevel::Warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_collector() {
        let mut collector = FeedbackCollector::new();

        collector.warning("unexpected ABC line: 'foo'");
        collector.set_line(5);
        collector.info("no K: field");

        let feedback = collector.into_feedback();
        assert_eq!(feedback.len(), 2);
        assert_eq!(feedback[0].line, 1);
        assert_eq!(feedback[0].level, FeedbackLevel::Warning);
        assert_eq!(feedback[1].line, 5);
        assert_eq!(feedback[1].level, FeedbackLevel::Info);
    }

    #[test]
    fn test_parse_result_warnings() {
        let result: ParseResult<i32> = ParseResult::new(
            42,
            vec![
                Feedback::warning("test warning", 1),
                Feedback::info("test info", 2),
            ],
        );

        assert_eq!(result.warnings().count(), 1);
    }
}
