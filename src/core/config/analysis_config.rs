// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{LogFluxError, LogFluxResult};

/// Log level for engine diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    pub fn parse(s: &str) -> LogFluxResult<Self> {
        match s.to_lowercase().as_str() {
            "off" => Ok(LogLevel::Off),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LogFluxError::configuration_with_key(
                format!(
                    "Invalid log level '{}'. Valid values: 'off', 'error', 'warn', 'info', 'debug', 'trace'",
                    s
                ),
                "logging.level",
            )),
        }
    }

    #[inline]
    pub const fn as_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
}

/// Settings for one analysis session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Path of the top-level analysis store. Derived stores live next to it.
    pub root: PathBuf,

    /// On the first run of a reopened session, keep quantifier outputs that
    /// already exist on disk instead of recomputing them.
    #[serde(default = "default_true")]
    pub reuse_quantifiers: bool,

    /// Emit a warning for every start line whose finish search ran off the
    /// end of the finish set.
    #[serde(default = "default_true")]
    pub warn_on_gaps: bool,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_true() -> bool {
    true
}

impl AnalysisConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            reuse_quantifiers: true,
            warn_on_gaps: true,
            logging: LoggingConfig::default(),
        }
    }

    pub fn from_toml_str(text: &str) -> LogFluxResult<Self> {
        let config: AnalysisConfig = toml::from_str(text)
            .map_err(|e| LogFluxError::configuration(format!("Invalid analysis config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> LogFluxResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check that `root` can serve as the stem of derived store names.
    pub fn validate(&self) -> LogFluxResult<()> {
        if self.root.as_os_str().is_empty() {
            return Err(LogFluxError::configuration_with_key(
                "root store path cannot be empty",
                "root",
            ));
        }
        if self.root.file_stem().is_none() {
            return Err(LogFluxError::configuration_with_key(
                format!("root store path '{}' has no file name", self.root.display()),
                "root",
            ));
        }
        Ok(())
    }
}

/// Install `env_logger` at the configured level. `RUST_LOG` still wins when
/// set. Calling this more than once is harmless.
pub fn init_logging(config: &LoggingConfig) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(config.level.as_filter());
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    let _ = builder.try_init();
}
