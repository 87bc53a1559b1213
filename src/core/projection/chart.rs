// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chart descriptors attached to projections and quantifiers.
//!
//! A chart is two script callbacks: one that declares its parameters and one
//! that renders series from the store. Rendering runs inside a `ScriptGuard`.

use std::collections::BTreeMap;
use std::fmt;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::core::error::LogFluxResult;
use crate::core::projection::StoreReader;
use crate::core::script::{Reporter, ScriptError, ScriptGuard};

/// A user-adjustable chart input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartParameter {
    pub name: String,
    pub description: String,
    pub default: JsonValue,
}

impl ChartParameter {
    pub fn new(name: impl Into<String>, description: impl Into<String>, default: JsonValue) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default,
        }
    }
}

pub type ChartArgs = BTreeMap<String, JsonValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub title: String,
    pub series: Vec<ChartSeries>,
}

/// What the render callback is given.
pub struct ChartRequest<'a> {
    pub connection: &'a Connection,
    pub table: &'a str,
    /// Visible event ids, when the chart asked for the selection.
    pub selection: Option<&'a [i64]>,
    /// Parameter values, defaults filled in.
    pub args: &'a ChartArgs,
}

pub trait ChartBuilder {
    fn parameters(&self) -> Vec<ChartParameter> {
        Vec::new()
    }

    fn render(&self, request: &ChartRequest<'_>) -> Result<ChartData, ScriptError>;
}

/// Chart from a parameter list and a render closure.
pub struct FnChart<F> {
    parameters: Vec<ChartParameter>,
    render: F,
}

impl<F> FnChart<F>
where
    F: Fn(&ChartRequest<'_>) -> Result<ChartData, ScriptError>,
{
    pub fn new(parameters: Vec<ChartParameter>, render: F) -> Self {
        Self { parameters, render }
    }
}

impl<F> ChartBuilder for FnChart<F>
where
    F: Fn(&ChartRequest<'_>) -> Result<ChartData, ScriptError>,
{
    fn parameters(&self) -> Vec<ChartParameter> {
        self.parameters.clone()
    }

    fn render(&self, request: &ChartRequest<'_>) -> Result<ChartData, ScriptError> {
        (self.render)(request)
    }
}

pub struct ChartInfo {
    name: String,
    wants_selection: bool,
    builder: Box<dyn ChartBuilder>,
}

impl ChartInfo {
    pub fn new(name: impl Into<String>, wants_selection: bool, builder: Box<dyn ChartBuilder>) -> Self {
        Self {
            name: name.into(),
            wants_selection,
            builder,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wants_selection(&self) -> bool {
        self.wants_selection
    }

    /// Parameter definitions, guarded. A failing definition callback yields
    /// no parameters.
    pub fn parameters(&self) -> Vec<ChartParameter> {
        self.parameters_guarded(&ScriptGuard::new(self.guard_name()))
    }

    fn parameters_guarded(&self, guard: &ScriptGuard<'_>) -> Vec<ChartParameter> {
        guard
            .run(|| Ok::<_, ScriptError>(self.builder.parameters()))
            .unwrap_or_default()
    }

    /// Render against `reader`, reporting script failures with `log::warn!`.
    pub fn render(&self, reader: &StoreReader, args: &ChartArgs) -> LogFluxResult<Option<ChartData>> {
        let guard = ScriptGuard::new(self.guard_name());
        self.render_guarded(&guard, reader, args)
    }

    pub fn render_with_reporter(
        &self,
        reader: &StoreReader,
        args: &ChartArgs,
        reporter: Reporter<'_>,
    ) -> LogFluxResult<Option<ChartData>> {
        let guard = ScriptGuard::with_reporter(self.guard_name(), reporter);
        self.render_guarded(&guard, reader, args)
    }

    fn render_guarded(
        &self,
        guard: &ScriptGuard<'_>,
        reader: &StoreReader,
        args: &ChartArgs,
    ) -> LogFluxResult<Option<ChartData>> {
        let selection = if self.wants_selection {
            Some(reader.selection()?)
        } else {
            None
        };
        let mut resolved: ChartArgs = self
            .parameters_guarded(guard)
            .into_iter()
            .map(|p| (p.name, p.default))
            .collect();
        resolved.extend(args.iter().map(|(k, v)| (k.clone(), v.clone())));

        let request = ChartRequest {
            connection: reader.connection(),
            table: reader.table(),
            selection: selection.as_deref(),
            args: &resolved,
        };
        Ok(guard.run(|| self.builder.render(&request)))
    }

    fn guard_name(&self) -> String {
        format!("Chart({})", self.name)
    }
}

impl fmt::Debug for ChartInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartInfo")
            .field("name", &self.name)
            .field("wants_selection", &self.wants_selection)
            .finish_non_exhaustive()
    }
}
