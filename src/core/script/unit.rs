// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use crate::core::script::{ScriptApi, ScriptError};

type ScriptBody = dyn Fn(&mut ScriptApi<'_>) -> Result<(), ScriptError>;

/// An analysis, compiled once and evaluated on every run.
pub struct ScriptUnit {
    name: String,
    body: Box<ScriptBody>,
}

impl ScriptUnit {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut ScriptApi<'_>) -> Result<(), ScriptError> + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn call(&self, api: &mut ScriptApi<'_>) -> Result<(), ScriptError> {
        (self.body)(api)
    }
}

impl fmt::Debug for ScriptUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptUnit").field("name", &self.name).finish_non_exhaustive()
    }
}
