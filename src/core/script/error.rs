// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use thiserror::Error;

/// Category of a failure raised by analysis script code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptErrorKind {
    /// Raised deliberately by the script.
    Raised,
    /// A query issued by the script failed.
    Sql,
    /// The script panicked.
    Panic,
    /// The script referred to a column, table or output that does not exist.
    Lookup,
    /// The host stopped the unit after a host-side failure.
    Aborted,
}

impl ScriptErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ScriptErrorKind::Raised => "ScriptError",
            ScriptErrorKind::Sql => "SqlError",
            ScriptErrorKind::Panic => "Panic",
            ScriptErrorKind::Lookup => "LookupError",
            ScriptErrorKind::Aborted => "Aborted",
        }
    }
}

impl fmt::Display for ScriptErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure inside user-authored analysis code.
///
/// `trace` lists the frames the error passed through, innermost first.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ScriptError {
    pub kind: ScriptErrorKind,
    pub message: String,
    pub trace: Vec<String>,
}

impl ScriptError {
    pub fn new(kind: ScriptErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace: Vec::new(),
        }
    }

    pub fn raised(message: impl Into<String>) -> Self {
        Self::new(ScriptErrorKind::Raised, message)
    }

    pub fn lookup(message: impl Into<String>) -> Self {
        Self::new(ScriptErrorKind::Lookup, message)
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(ScriptErrorKind::Aborted, message)
    }

    /// Record that the error passed through `frame`.
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.trace.push(frame.into());
        self
    }

    /// Kind, message and trace, one frame per line.
    pub fn format_full(&self) -> String {
        let mut out = self.to_string();
        for frame in &self.trace {
            out.push_str("\n  in ");
            out.push_str(frame);
        }
        out
    }
}

impl From<rusqlite::Error> for ScriptError {
    fn from(e: rusqlite::Error) -> Self {
        ScriptError::new(ScriptErrorKind::Sql, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_full_lists_frames() {
        let err = ScriptError::raised("bad row")
            .with_frame("insert")
            .with_frame("Project(requests)");
        assert_eq!(
            err.format_full(),
            "ScriptError: bad row\n  in insert\n  in Project(requests)"
        );
    }

    #[test]
    fn test_sql_conversion() {
        let err: ScriptError = rusqlite::Error::InvalidQuery.into();
        assert_eq!(err.kind, ScriptErrorKind::Sql);
    }
}
