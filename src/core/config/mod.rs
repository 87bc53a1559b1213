// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Analysis Configuration Module
//!
//! Configuration for one analysis session, loaded from TOML:
//!
//! ```toml
//! root = "/var/cache/logflux/web-01.db"
//! reuse_quantifiers = true
//! warn_on_gaps = true
//!
//! [logging]
//! level = "info"
//! ```
//!
//! `root` names the top-level analysis store. Its file stem is the prefix of
//! every derived store name.

pub mod analysis_config;

pub use analysis_config::{init_logging, AnalysisConfig, LogLevel, LoggingConfig};
