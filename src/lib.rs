// SPDX-License-Identifier: MIT OR Apache-2.0

//! # LogFlux
//!
//! Event recognition and relational projection over indexed log files.
//!
//! An analysis script ([`ScriptUnit`]) recognizes intervals of a log as
//! events, projects them into small SQLite stores and derives metrics from
//! those stores in a second pass. [`AnalysisSession`] drives a run;
//! [`AnalysisResults`] records every named output it produced.

pub mod core;

pub use crate::core::analysis::{AnalysisOutput, AnalysisResults, AnalysisSession};
pub use crate::core::config::{init_logging, AnalysisConfig};
pub use crate::core::error::{LogFluxError, LogFluxResult};
pub use crate::core::script::{ScriptApi, ScriptError, ScriptUnit};
