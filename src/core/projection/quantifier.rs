// SPDX-License-Identifier: MIT OR Apache-2.0

//! Second-pass projections summarising an event store into metrics.

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::core::error::LogFluxResult;
use crate::core::log::Timecode;
use crate::core::projection::chart::ChartInfo;
use crate::core::projection::{
    DbInfo, EventClock, ProjectionContext, ProjectionSchema, Projector, StoreReader, StoreRole,
};
use crate::core::script::ScriptError;

pub type QuantifyFn = Box<dyn FnMut(&mut ProjectionContext<'_>) -> Result<(), ScriptError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantifierOutcome {
    /// The event store this quantifier reads does not exist.
    UpstreamMissing,
    /// Locked run and the output already exists.
    Reused,
    /// The metrics store was rebuilt with this many rows.
    Computed { rows: usize },
}

impl QuantifierOutcome {
    pub fn did_work(&self) -> bool {
        matches!(self, QuantifierOutcome::Computed { .. })
    }
}

pub struct QuantifierInfo {
    db: Arc<DbInfo>,
    schema: ProjectionSchema,
    origin: Option<Timecode>,
    callback: QuantifyFn,
    charts: Vec<ChartInfo>,
    runs: usize,
}

impl QuantifierInfo {
    /// Quantifier `name` over the event store `upstream`.
    pub fn new(
        upstream: &Arc<DbInfo>,
        name: &str,
        schema: ProjectionSchema,
        origin: Option<Timecode>,
        callback: QuantifyFn,
    ) -> LogFluxResult<Self> {
        Ok(Self {
            db: DbInfo::derive(upstream, name, StoreRole::Quantifier)?,
            schema,
            origin,
            callback,
            charts: Vec::new(),
            runs: 0,
        })
    }

    pub fn name(&self) -> &str {
        self.db.name()
    }

    pub fn db(&self) -> &Arc<DbInfo> {
        &self.db
    }

    pub fn upstream(&self) -> Option<&Arc<DbInfo>> {
        self.db.parent()
    }

    pub fn schema(&self) -> &ProjectionSchema {
        &self.schema
    }

    pub fn table_name(&self) -> &'static str {
        StoreRole::Quantifier.table_name()
    }

    /// Times the metrics store has actually been rebuilt.
    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn charts(&self) -> &[ChartInfo] {
        &self.charts
    }

    pub fn chart(&self, name: &str) -> Option<&ChartInfo> {
        self.charts.iter().find(|c| c.name() == name)
    }

    pub fn add_chart(&mut self, chart: ChartInfo) {
        self.charts.push(chart);
    }

    /// Rebuild the metrics store unless there is nothing to do.
    ///
    /// `locked` skips the rebuild when the output already exists. The event
    /// store is attached as `base1` and is the only ancestor visible.
    pub fn run(&mut self, locked: bool) -> LogFluxResult<QuantifierOutcome> {
        let upstream_exists = self.upstream().map(|u| u.exists()).unwrap_or(false);
        if !upstream_exists {
            debug!("Quantifier '{}': no event store, skipping", self.name());
            return Ok(QuantifierOutcome::UpstreamMissing);
        }
        if locked && self.db.exists() {
            debug!("Quantifier '{}': reusing {}", self.name(), self.db.path().display());
            return Ok(QuantifierOutcome::Reused);
        }

        let projector = Projector::new(Arc::clone(&self.db), self.schema.clone(), StoreRole::Quantifier)
            .with_attach_depth(1);
        let mut clock = EventClock::with_origin(self.origin);
        let callback = &mut self.callback;
        let rows = projector.run_with(&mut clock, false, |ctx| callback(ctx))?;
        self.runs += 1;
        Ok(QuantifierOutcome::Computed { rows })
    }

    pub fn reader(&self) -> LogFluxResult<StoreReader> {
        StoreReader::open_with_schema(&self.db, self.table_name(), self.schema.clone())
    }

    pub fn invalidate(&self) -> LogFluxResult<bool> {
        self.db.invalidate()
    }
}

impl fmt::Debug for QuantifierInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuantifierInfo")
            .field("db", &self.db)
            .field("schema", &self.schema)
            .field("charts", &self.charts)
            .field("runs", &self.runs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::projection::{DbConnection, ProjectionField};

    fn event_store(root: &Arc<DbInfo>) -> Arc<DbInfo> {
        let events = DbInfo::derive(root, "requests", StoreRole::Events).unwrap();
        let db = DbConnection::create(&events).unwrap();
        db.connection()
            .execute_batch(
                "CREATE TABLE events (event_id INTEGER, status INTEGER);
                 INSERT INTO events VALUES (1, 200), (2, 500), (3, 200);",
            )
            .unwrap();
        db.close().unwrap();
        events
    }

    fn status_counts(upstream: &Arc<DbInfo>) -> QuantifierInfo {
        let schema = ProjectionSchema::new()
            .field(ProjectionField::int("status"))
            .unwrap()
            .field(ProjectionField::int("count"))
            .unwrap();
        QuantifierInfo::new(
            upstream,
            "by_status",
            schema,
            None,
            Box::new(|ctx: &mut ProjectionContext<'_>| -> Result<(), ScriptError> {
                ctx.connection().execute(
                    "INSERT INTO metrics (status, count)
                     SELECT status, COUNT(*) FROM base1.events GROUP BY status",
                    [],
                )?;
                Ok(())
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_locked_run_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = DbInfo::root(dir.path().join("run.db"));
        let events = event_store(&root);
        let mut quantifier = status_counts(&events);

        assert!(quantifier.run(true).unwrap().did_work());
        assert_eq!(quantifier.run(true).unwrap(), QuantifierOutcome::Reused);
        assert_eq!(quantifier.runs(), 1);

        assert!(quantifier.run(false).unwrap().did_work());
        assert_eq!(quantifier.runs(), 2);

        let reader = quantifier.reader().unwrap();
        assert_eq!(reader.row_count(false).unwrap(), 2);
    }

    #[test]
    fn test_missing_upstream_is_nothing_to_do() {
        let dir = tempfile::tempdir().unwrap();
        let root = DbInfo::root(dir.path().join("run.db"));
        let events = DbInfo::derive(&root, "requests", StoreRole::Events).unwrap();
        let mut quantifier = status_counts(&events);

        assert_eq!(quantifier.run(false).unwrap(), QuantifierOutcome::UpstreamMissing);
        assert!(!quantifier.db().exists());
        assert_eq!(quantifier.runs(), 0);
    }

    #[test]
    fn test_script_failure_surfaces_as_script_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = DbInfo::root(dir.path().join("run.db"));
        let events = event_store(&root);
        let mut quantifier = QuantifierInfo::new(
            &events,
            "nested",
            ProjectionSchema::new(),
            None,
            Box::new(|ctx: &mut ProjectionContext<'_>| -> Result<(), ScriptError> {
                ctx.insert_event(
                    &crate::core::recognition::Event {
                        event_id: 1,
                        start_line: 0,
                        finish_line: 0,
                        start_time: Timecode::ZERO,
                        finish_time: Timecode::ZERO,
                    },
                    &[],
                )?;
                Err(ScriptError::raised("stop"))
            }),
        )
        .unwrap();
        let err = quantifier.run(false).unwrap_err();
        assert!(err.is_script_error());
    }
}
