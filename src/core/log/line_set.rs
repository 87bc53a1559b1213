// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Debug;
use std::sync::Arc;

use regex::Regex;

use crate::core::error::{LogFluxError, LogFluxResult};
use crate::core::log::Timecode;

/// An ordered, filtered view over the lines of one indexed log.
///
/// Lines are addressed by their *view line* (position inside this set) and
/// map to a *log line* (absolute line number in the file). View order must
/// follow log order: `view_line_to_log_line` is strictly increasing. The
/// recognizer's finish lookup relies on this.
pub trait LineSet: Debug {
    fn num_lines(&self) -> usize;

    fn view_line_to_log_line(&self, view_line: usize) -> Option<u64>;

    /// With `exact`, the view line holding exactly `log_line`. Otherwise the
    /// first view line whose log line is `>= log_line`.
    fn log_line_to_view_line(&self, log_line: u64, exact: bool) -> Option<usize>;

    fn field_unsigned(&self, view_line: usize, field: usize) -> Option<u64>;

    fn field_signed(&self, view_line: usize, field: usize) -> Option<i64>;

    fn field_float(&self, view_line: usize, field: usize) -> Option<f64>;

    fn field_text(&self, view_line: usize, field: usize) -> Option<String>;

    /// Text of the line outside of any parsed field.
    fn non_field_text(&self, view_line: usize) -> Option<String>;

    fn nearest_utc_timecode(&self, view_line: usize) -> Timecode;
}

/// Source of line sets: the indexing engine behind a log file.
pub trait LogIndex: Debug {
    fn create_line_set(&self, pattern: &LinePattern) -> LogFluxResult<Arc<dyn LineSet>>;
}

/// Match predicate used to build a line set: a regular expression over the
/// raw text of each line.
#[derive(Debug, Clone)]
pub struct LinePattern {
    source: String,
    regex: Regex,
}

impl LinePattern {
    pub fn new(source: &str) -> LogFluxResult<Self> {
        if source.trim().is_empty() {
            return Err(LogFluxError::malformed_pattern(source, "pattern is empty"));
        }
        let regex = Regex::new(source)
            .map_err(|e| LogFluxError::malformed_pattern(source, e.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pattern_rejected() {
        let err = LinePattern::new("  ").unwrap_err();
        assert!(matches!(err, LogFluxError::MalformedPattern { .. }));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = LinePattern::new("request (").unwrap_err();
        assert!(matches!(err, LogFluxError::MalformedPattern { .. }));
    }

    #[test]
    fn test_match() {
        let pattern = LinePattern::new(r"GET /api/\w+").unwrap();
        assert!(pattern.is_match("10:00:01 GET /api/users 200"));
        assert!(!pattern.is_match("10:00:01 POST /api/users 201"));
        assert_eq!(pattern.as_str(), r"GET /api/\w+");
    }
}
