// SPDX-License-Identifier: MIT OR Apache-2.0

//! LogFlux Core Error Types
//!
//! Host-side failures of an analysis run. Failures raised by analysis scripts
//! are carried as [`ScriptError`] and only become a `LogFluxError` when they
//! cross a projector or quantifier boundary.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::script::ScriptError;

/// Result type for LogFlux operations
pub type LogFluxResult<T> = Result<T, LogFluxError>;

/// Comprehensive LogFlux error types
#[derive(Error, Debug)]
pub enum LogFluxError {
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        config_key: Option<String>,
    },

    #[error("Invalid parameter '{parameter:?}': {message}")]
    InvalidParameter {
        message: String,
        parameter: Option<String>,
    },

    #[error("Malformed line pattern '{pattern}': {message}")]
    MalformedPattern { pattern: String, message: String },

    #[error("Malformed filter expression '{expression}': {message}")]
    MalformedFilter { expression: String, message: String },

    #[error("Invalid projection schema: {message}")]
    SchemaInvalid {
        message: String,
        field: Option<String>,
    },

    #[error("Store unavailable at {}: {message}", path.display())]
    StoreUnavailable {
        path: PathBuf,
        message: String,
        source: Option<rusqlite::Error>,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl LogFluxError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            config_key: None,
        }
    }

    /// Create a configuration error with a specific key
    pub fn configuration_with_key(message: impl Into<String>, config_key: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            config_key: Some(config_key.into()),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(message: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
            parameter: Some(parameter.into()),
        }
    }

    pub fn malformed_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    pub fn malformed_filter(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedFilter {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Create a schema error naming the offending field
    pub fn schema_invalid(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::SchemaInvalid {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a store acquisition error
    pub fn store_unavailable(path: impl Into<PathBuf>, source: rusqlite::Error) -> Self {
        Self::StoreUnavailable {
            path: path.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a generic error from a string
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Whether this error originated in user-authored script code.
    pub fn is_script_error(&self) -> bool {
        matches!(self, Self::Script(_))
    }

    /// Charge an SQLite failure to the script that left the store in its
    /// current state. Other errors are returned unchanged.
    pub(crate) fn into_script(self, frame: impl Into<String>) -> Self {
        match self {
            Self::Sqlite(e) => Self::Script(ScriptError::from(e).with_frame(frame)),
            other => other,
        }
    }
}
