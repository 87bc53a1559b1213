// SPDX-License-Identifier: MIT OR Apache-2.0

//! The boundary between the host and analysis scripts.
//!
//! An analysis is a [`ScriptUnit`]: a callable compiled once and evaluated per
//! run against a [`ScriptApi`]. The API is the whole capability surface; each
//! entry point runs under its own [`ScriptGuard`] so one broken output never
//! stops the others.

pub mod api;
pub mod error;
pub mod guard;
pub mod unit;

pub use api::{NetworkPart, OutputHandle, ScriptApi};
pub use error::{ScriptError, ScriptErrorKind};
pub use guard::{warn_reporter, Reporter, ScriptGuard};
pub use unit::ScriptUnit;
