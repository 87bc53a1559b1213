// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory log index.
//!
//! Stands in for the native indexing engine: lines are parsed once with a
//! [`LineFormat`] into typed fields, and [`LinePattern`]s select line sets
//! over them. Log lines are numbered from zero.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;
use regex::Regex;

use crate::core::error::{LogFluxError, LogFluxResult};
use crate::core::log::{LineSet, LinePattern, LogIndex, Timecode};

/// Group name holding the line's timestamp.
pub const TIMESTAMP_GROUP: &str = "ts";
/// Group name holding the line's free text.
pub const MESSAGE_GROUP: &str = "msg";

/// One parsed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Type a raw token: unsigned, then signed, then float, else text.
    pub fn parse(token: &str) -> Self {
        if let Ok(v) = token.parse::<u64>() {
            FieldValue::Unsigned(v)
        } else if let Ok(v) = token.parse::<i64>() {
            FieldValue::Signed(v)
        } else if let Ok(v) = token.parse::<f64>() {
            FieldValue::Float(v)
        } else {
            FieldValue::Text(token.to_string())
        }
    }

    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            FieldValue::Unsigned(v) => Some(*v),
            FieldValue::Signed(v) => u64::try_from(*v).ok(),
            FieldValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Some(*v as u64),
            FieldValue::Float(_) => None,
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_signed(&self) -> Option<i64> {
        match self {
            FieldValue::Unsigned(v) => i64::try_from(*v).ok(),
            FieldValue::Signed(v) => Some(*v),
            FieldValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            FieldValue::Float(_) => None,
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Unsigned(v) => Some(*v as f64),
            FieldValue::Signed(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Unsigned(v) => v.to_string(),
            FieldValue::Signed(v) => v.to_string(),
            FieldValue::Float(v) => v.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }
}

/// One indexed log line.
#[derive(Debug, Clone, Default)]
pub struct LogRecord {
    pub raw: String,
    pub timecode: Option<Timecode>,
    pub fields: Vec<FieldValue>,
    pub text: String,
}

impl LogRecord {
    /// A record with no parsed fields; all of `raw` is non-field text.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            text: raw.clone(),
            raw,
            timecode: None,
            fields: Vec::new(),
        }
    }

    pub fn with_timecode(mut self, timecode: Timecode) -> Self {
        self.timecode = Some(timecode);
        self
    }

    pub fn with_field(mut self, value: FieldValue) -> Self {
        self.fields.push(value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

/// Line layout: a regex whose capture groups become fields.
///
/// A group named `ts` is parsed as the line timestamp (RFC 3339, or
/// `%Y-%m-%d %H:%M:%S%.f` taken as UTC) and a group named `msg` becomes the
/// non-field text. Every other group is a field, numbered from zero in
/// group order. Lines that do not match keep their whole text as non-field
/// text.
#[derive(Debug, Clone)]
pub struct LineFormat {
    regex: Regex,
}

impl LineFormat {
    pub fn new(source: &str) -> LogFluxResult<Self> {
        let regex = Regex::new(source)
            .map_err(|e| LogFluxError::malformed_pattern(source, e.to_string()))?;
        Ok(Self { regex })
    }

    pub fn parse_line(&self, raw: &str) -> LogRecord {
        let Some(caps) = self.regex.captures(raw) else {
            return LogRecord::new(raw);
        };

        let mut record = LogRecord {
            raw: raw.to_string(),
            timecode: None,
            fields: Vec::new(),
            text: String::new(),
        };
        let mut saw_message = false;
        for (i, name) in self.regex.capture_names().enumerate().skip(1) {
            let Some(m) = caps.get(i) else {
                if name.is_none() {
                    record.fields.push(FieldValue::Text(String::new()));
                }
                continue;
            };
            match name {
                Some(TIMESTAMP_GROUP) => record.timecode = parse_timestamp(m.as_str()),
                Some(MESSAGE_GROUP) => {
                    record.text = m.as_str().to_string();
                    saw_message = true;
                }
                _ => record.fields.push(FieldValue::parse(m.as_str())),
            }
        }
        if !saw_message {
            if let Some(whole) = caps.get(0) {
                record.text = raw[whole.end()..].trim_start().to_string();
            }
        }
        record
    }
}

fn parse_timestamp(text: &str) -> Option<Timecode> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(Timecode::from_datetime(&dt.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| Timecode::from_datetime(&naive.and_utc()))
}

/// Index over a log held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogIndex {
    records: Arc<Vec<LogRecord>>,
}

impl MemoryLogIndex {
    pub fn new(records: Vec<LogRecord>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    pub fn parse(text: &str, format: &LineFormat) -> Self {
        let records: Vec<LogRecord> = text.lines().map(|l| format.parse_line(l)).collect();
        debug!("Indexed {} log lines", records.len());
        Self::new(records)
    }

    pub fn num_lines(&self) -> usize {
        self.records.len()
    }

    /// A set holding every line of the log.
    pub fn all_lines(&self) -> MemoryLineSet {
        MemoryLineSet {
            records: Arc::clone(&self.records),
            lines: (0..self.records.len() as u64).collect(),
        }
    }
}

impl LogIndex for MemoryLogIndex {
    fn create_line_set(&self, pattern: &LinePattern) -> LogFluxResult<Arc<dyn LineSet>> {
        let lines: Vec<u64> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| pattern.is_match(&r.raw))
            .map(|(i, _)| i as u64)
            .collect();
        debug!(
            "Line set '{}' selected {} of {} lines",
            pattern.as_str(),
            lines.len(),
            self.records.len()
        );
        Ok(Arc::new(MemoryLineSet {
            records: Arc::clone(&self.records),
            lines,
        }))
    }
}

/// Line set produced by [`MemoryLogIndex`].
#[derive(Debug, Clone)]
pub struct MemoryLineSet {
    records: Arc<Vec<LogRecord>>,
    lines: Vec<u64>,
}

impl MemoryLineSet {
    fn record(&self, view_line: usize) -> Option<&LogRecord> {
        let log_line = *self.lines.get(view_line)?;
        self.records.get(log_line as usize)
    }

    fn field(&self, view_line: usize, field: usize) -> Option<&FieldValue> {
        self.record(view_line)?.fields.get(field)
    }
}

impl LineSet for MemoryLineSet {
    fn num_lines(&self) -> usize {
        self.lines.len()
    }

    fn view_line_to_log_line(&self, view_line: usize) -> Option<u64> {
        self.lines.get(view_line).copied()
    }

    fn log_line_to_view_line(&self, log_line: u64, exact: bool) -> Option<usize> {
        let idx = self.lines.partition_point(|&l| l < log_line);
        match self.lines.get(idx) {
            Some(&l) if !exact || l == log_line => Some(idx),
            _ => None,
        }
    }

    fn field_unsigned(&self, view_line: usize, field: usize) -> Option<u64> {
        self.field(view_line, field)?.as_unsigned()
    }

    fn field_signed(&self, view_line: usize, field: usize) -> Option<i64> {
        self.field(view_line, field)?.as_signed()
    }

    fn field_float(&self, view_line: usize, field: usize) -> Option<f64> {
        self.field(view_line, field)?.as_float()
    }

    fn field_text(&self, view_line: usize, field: usize) -> Option<String> {
        self.field(view_line, field).map(FieldValue::as_text)
    }

    fn non_field_text(&self, view_line: usize) -> Option<String> {
        self.record(view_line).map(|r| r.text.clone())
    }

    fn nearest_utc_timecode(&self, view_line: usize) -> Timecode {
        let Some(&log_line) = self.lines.get(view_line) else {
            return Timecode::ZERO;
        };
        let at = log_line as usize;
        let before = self.records[..=at].iter().rev().find_map(|r| r.timecode);
        before
            .or_else(|| self.records[at + 1..].iter().find_map(|r| r.timecode))
            .unwrap_or(Timecode::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> MemoryLogIndex {
        let format = LineFormat::new(r"^(?P<ts>\d{4}-\S+) (\w+) (\S+) ?(?P<msg>.*)$").unwrap();
        MemoryLogIndex::parse(
            "2024-01-01T00:00:00Z start 7 first\n\
             continuation without format\n\
             2024-01-01T00:00:02.5Z finish -3 second\n\
             2024-01-01T00:00:03Z start 1.5 third",
            &format,
        )
    }

    #[test]
    fn test_parse_typed_fields() {
        let index = sample_index();
        let all = index.all_lines();
        assert_eq!(all.num_lines(), 4);
        assert_eq!(all.field_text(0, 0).as_deref(), Some("start"));
        assert_eq!(all.field_unsigned(0, 1), Some(7));
        assert_eq!(all.field_signed(2, 1), Some(-3));
        assert_eq!(all.field_unsigned(2, 1), None);
        assert_eq!(all.field_float(3, 1), Some(1.5));
        assert_eq!(all.non_field_text(0).as_deref(), Some("first"));
        assert_eq!(
            all.non_field_text(1).as_deref(),
            Some("continuation without format")
        );
        assert_eq!(all.field_text(1, 0), None);
    }

    #[test]
    fn test_line_set_mapping() {
        let index = sample_index();
        let starts = index.create_line_set(&LinePattern::new(" start ").unwrap()).unwrap();
        assert_eq!(starts.num_lines(), 2);
        assert_eq!(starts.view_line_to_log_line(0), Some(0));
        assert_eq!(starts.view_line_to_log_line(1), Some(3));
        assert_eq!(starts.view_line_to_log_line(2), None);
        assert_eq!(starts.log_line_to_view_line(1, false), Some(1));
        assert_eq!(starts.log_line_to_view_line(1, true), None);
        assert_eq!(starts.log_line_to_view_line(3, true), Some(1));
        assert_eq!(starts.log_line_to_view_line(4, false), None);
    }

    #[test]
    fn test_nearest_timecode_falls_back_to_earlier_line() {
        let index = sample_index();
        let all = index.all_lines();
        let t0 = all.nearest_utc_timecode(0);
        assert_eq!(all.nearest_utc_timecode(1), t0);
        assert_eq!(all.nearest_utc_timecode(2).subtract(&t0), 2_500_000_000);
    }

    #[test]
    fn test_nearest_timecode_looks_forward_when_nothing_before() {
        let index = MemoryLogIndex::new(vec![
            LogRecord::new("banner"),
            LogRecord::new("boot").with_timecode(Timecode::new(100, 0)),
        ]);
        let all = index.all_lines();
        assert_eq!(all.nearest_utc_timecode(0), Timecode::new(100, 0));
        assert_eq!(all.nearest_utc_timecode(9), Timecode::ZERO);
    }

    #[test]
    fn test_naive_timestamp_format() {
        let format = LineFormat::new(r"^(?P<ts>\d{4}-\d\d-\d\d \d\d:\d\d:\d\d(?:\.\d+)?) ").unwrap();
        let record = format.parse_line("2024-01-01 00:00:01.25 hello");
        let tc = record.timecode.unwrap();
        assert_eq!(tc.offset_ns(), 250_000_000);
        assert_eq!(record.text, "hello");
    }
}
