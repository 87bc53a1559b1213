// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failure boundary around calls into analysis scripts.
//!
//! A guarded unit either succeeds or is reported once through the reporter.
//! Errors and panics never travel past the guard.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use log::warn;

use crate::core::error::{LogFluxError, LogFluxResult};
use crate::core::script::{ScriptError, ScriptErrorKind};

/// Receives `"<unit name>: <formatted error>"` for every failed unit.
pub type Reporter<'a> = &'a dyn Fn(&str);

/// The default reporter: one `log::warn!` per failure.
pub fn warn_reporter(report: &str) {
    warn!("{}", report);
}

pub struct ScriptGuard<'a> {
    name: String,
    reporter: Reporter<'a>,
}

impl ScriptGuard<'static> {
    /// Guard reporting through `log::warn!`.
    pub fn new(name: impl Into<String>) -> Self {
        ScriptGuard {
            name: name.into(),
            reporter: &warn_reporter,
        }
    }
}

impl<'a> ScriptGuard<'a> {
    pub fn with_reporter(name: impl Into<String>, reporter: Reporter<'a>) -> Self {
        Self {
            name: name.into(),
            reporter,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `unit`. `None` means it failed and has been reported.
    pub fn run<T, F>(&self, unit: F) -> Option<T>
    where
        F: FnOnce() -> Result<T, ScriptError>,
    {
        let error = match panic::catch_unwind(AssertUnwindSafe(unit)) {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => e,
            Err(payload) => ScriptError::new(ScriptErrorKind::Panic, panic_message(payload.as_ref())),
        };
        self.report(&error);
        None
    }

    pub fn report(&self, error: &ScriptError) {
        (self.reporter)(&format!("{}: {}", self.name, error.format_full()));
    }
}

/// Separate script failures, which the guard reports, from host failures,
/// which must reach the driver untouched.
pub(crate) fn split_host_error<T>(result: LogFluxResult<T>) -> Result<LogFluxResult<T>, ScriptError> {
    match result {
        Err(LogFluxError::Script(e)) => Err(e),
        other => Ok(other),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
