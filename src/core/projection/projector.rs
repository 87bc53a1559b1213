// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running a projection function against a freshly created store.
//!
//! The projector creates the store, attaches its ancestors, creates the data
//! table from the schema, hands a [`ProjectionContext`] to the user function
//! and finally rebuilds the `filter` table and commits. It does not catch
//! script failures: they come back as [`LogFluxError::Script`] for the caller
//! to route through a `ScriptGuard`. SQL failures while finishing the store
//! count as script failures too, since only the user function could have
//! broken it. A store left half-written by a failing
//! function is simply recreated on the next run.

use std::sync::Arc;

use log::{debug, info};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection};

use crate::core::error::{LogFluxError, LogFluxResult};
use crate::core::log::Timecode;
use crate::core::projection::chart::ChartInfo;
use crate::core::projection::quantifier::QuantifierInfo;
use crate::core::projection::{
    filter, DbConnection, DbInfo, ProjectionSchema, StoreReader, StoreRole, EVENT_ID_FIELD,
};
use crate::core::recognition::{Event, EventIdCounter, EventSource};
use crate::core::script::ScriptError;

/// Table recording each data table's schema, for readers that only have a path.
pub const SCHEMA_TABLE: &str = "projection_schema";

/// Event identity and time origin shared by every projection of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventClock {
    ids: EventIdCounter,
    origin: Option<Timecode>,
}

impl EventClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock that only carries a time origin; used by second-pass stores.
    pub fn with_origin(origin: Option<Timecode>) -> Self {
        Self {
            ids: EventIdCounter::new(),
            origin,
        }
    }

    pub fn ids(&self) -> &EventIdCounter {
        &self.ids
    }

    /// Start time of the first event recognized in the run.
    pub fn origin(&self) -> Option<Timecode> {
        self.origin
    }

    fn observe(&mut self, event: &Event) -> Timecode {
        *self.origin.get_or_insert(event.start_time)
    }
}

/// What a projection function sees: its open store and nothing else.
pub struct ProjectionContext<'a> {
    conn: &'a Connection,
    schema: &'a ProjectionSchema,
    table: &'a str,
    clock: &'a mut EventClock,
    can_recognise: bool,
    rows: usize,
}

impl<'a> ProjectionContext<'a> {
    /// The store connection, ancestors attached as `base1`, `base2`, ...
    pub fn connection(&self) -> &Connection {
        self.conn
    }

    pub fn schema(&self) -> &ProjectionSchema {
        self.schema
    }

    pub fn table(&self) -> &str {
        self.table
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn origin(&self) -> Option<Timecode> {
        self.clock.origin()
    }

    /// Run a recognition pass over `source`, allocating ids for its events.
    pub fn recognise(&mut self, source: &EventSource) -> Result<Vec<Event>, ScriptError> {
        if !self.can_recognise {
            return Err(ScriptError::lookup(
                "recognition is not available in a second-pass projection",
            ));
        }
        let (events, stats) = source
            .collect(&mut self.clock.ids)
            .ok_or_else(|| ScriptError::raised("event source is already being recognised"))?;
        if let Some(first) = events.first() {
            self.clock.observe(first);
        }
        debug!(
            "Projection '{}' recognised {} events ({} gaps)",
            self.table, stats.events, stats.gaps
        );
        Ok(events)
    }

    /// Insert one row from `(column, value)` pairs.
    pub fn insert(&mut self, values: &[(&str, &dyn ToSql)]) -> Result<(), ScriptError> {
        let columns: Vec<&str> = values.iter().map(|(name, _)| *name).collect();
        let params: Vec<&dyn ToSql> = values.iter().map(|(_, v)| *v).collect();
        self.insert_row(&columns, &params)
    }

    /// Insert one row for `event`: `event_id` and any timing-role columns are
    /// filled from the event, offsets in nanoseconds from the run origin.
    pub fn insert_event(
        &mut self,
        event: &Event,
        values: &[(&str, &dyn ToSql)],
    ) -> Result<(), ScriptError> {
        let origin = self.clock.observe(event);
        let event_id = event.event_id as i64;
        let start = event.start_time.subtract(&origin);
        let finish = event.finish_time.subtract(&origin);
        let duration = event.duration_ns();

        let mut columns: Vec<&str> = Vec::with_capacity(values.len() + 4);
        let mut params: Vec<&dyn ToSql> = Vec::with_capacity(values.len() + 4);
        columns.push(EVENT_ID_FIELD);
        params.push(&event_id);
        let fields = self.schema.fields();
        for (index, value) in [
            (self.schema.start_offset_column(), &start),
            (self.schema.finish_offset_column(), &finish),
            (self.schema.duration_column(), &duration),
        ] {
            if let Some(index) = index {
                columns.push(fields[index].name.as_str());
                params.push(value);
            }
        }
        for (name, value) in values {
            if columns.contains(name) {
                return Err(ScriptError::raised(format!(
                    "column '{}' is filled from the event",
                    name
                )));
            }
            columns.push(name);
            params.push(*value);
        }
        self.insert_row(&columns, &params)
    }

    fn insert_row(&mut self, columns: &[&str], params: &[&dyn ToSql]) -> Result<(), ScriptError> {
        if let Some(unknown) = columns.iter().find(|c| self.schema.index_of(c).is_none()) {
            return Err(ScriptError::lookup(format!(
                "table '{}' has no column '{}'",
                self.table, unknown
            )));
        }
        let quoted: Vec<String> = columns.iter().map(|c| format!("\"{}\"", c)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            self.table,
            quoted.join(", "),
            placeholders.join(", ")
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.execute(params)?;
        self.rows += 1;
        Ok(())
    }
}

/// One projection about to be written.
#[derive(Debug, Clone)]
pub struct Projector {
    info: Arc<DbInfo>,
    schema: ProjectionSchema,
    role: StoreRole,
    attach_depth: Option<usize>,
}

impl Projector {
    pub fn new(info: Arc<DbInfo>, schema: ProjectionSchema, role: StoreRole) -> Self {
        Self {
            info,
            schema,
            role,
            attach_depth: None,
        }
    }

    /// Attach only the nearest `depth` ancestors.
    pub fn with_attach_depth(mut self, depth: usize) -> Self {
        self.attach_depth = Some(depth);
        self
    }

    pub fn info(&self) -> &Arc<DbInfo> {
        &self.info
    }

    pub fn schema(&self) -> &ProjectionSchema {
        &self.schema
    }

    /// Create the store and run `user_fn` against it. Returns rows written.
    pub fn run<F>(&self, clock: &mut EventClock, user_fn: F) -> LogFluxResult<usize>
    where
        F: FnOnce(&mut ProjectionContext<'_>) -> Result<(), ScriptError>,
    {
        self.run_with(clock, true, user_fn)
    }

    pub(crate) fn run_with<F>(
        &self,
        clock: &mut EventClock,
        can_recognise: bool,
        user_fn: F,
    ) -> LogFluxResult<usize>
    where
        F: FnOnce(&mut ProjectionContext<'_>) -> Result<(), ScriptError>,
    {
        let table = self.role.table_name();
        let mut db = DbConnection::create(&self.info)?;
        db.attach_ancestors(self.attach_depth)?;
        db.begin()?;
        let conn = db.connection();
        conn.execute_batch(&self.schema.create_table_sql(table))?;
        conn.execute(
            &format!(
                "CREATE TABLE \"{}\" (table_name TEXT PRIMARY KEY, schema TEXT NOT NULL)",
                SCHEMA_TABLE
            ),
            [],
        )?;
        conn.execute(
            &format!("INSERT INTO \"{}\" VALUES (?1, ?2)", SCHEMA_TABLE),
            params![table, self.schema.to_json()?],
        )?;

        let mut ctx = ProjectionContext {
            conn,
            schema: &self.schema,
            table,
            clock,
            can_recognise,
            rows: 0,
        };
        user_fn(&mut ctx).map_err(LogFluxError::Script)?;
        let rows = ctx.rows;

        // The function had the raw connection, so the table may be gone or
        // the transaction already closed.
        let frame = format!("finishing projection '{}'", self.info.name());
        let visible = filter::reset_filter(conn, table).map_err(|e| e.into_script(frame.as_str()))?;
        db.commit().map_err(|e| e.into_script(frame))?;
        info!(
            "Projected '{}' into {}: {} rows, {} visible",
            self.info.name(),
            self.info.path().display(),
            rows,
            visible
        );
        Ok(rows)
    }
}

/// A projection that completed, as recorded in the run's results.
#[derive(Debug)]
pub struct ProjectorInfo {
    db: Arc<DbInfo>,
    schema: ProjectionSchema,
    role: StoreRole,
    rows: usize,
    quantifiers: Vec<QuantifierInfo>,
    charts: Vec<ChartInfo>,
}

impl ProjectorInfo {
    pub fn new(db: Arc<DbInfo>, schema: ProjectionSchema, role: StoreRole, rows: usize) -> Self {
        Self {
            db,
            schema,
            role,
            rows,
            quantifiers: Vec::new(),
            charts: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.db.name()
    }

    pub fn db(&self) -> &Arc<DbInfo> {
        &self.db
    }

    pub fn schema(&self) -> &ProjectionSchema {
        &self.schema
    }

    pub fn role(&self) -> StoreRole {
        self.role
    }

    pub fn table_name(&self) -> &'static str {
        self.role.table_name()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn quantifiers(&self) -> &[QuantifierInfo] {
        &self.quantifiers
    }

    pub fn quantifier(&self, name: &str) -> Option<&QuantifierInfo> {
        self.quantifiers.iter().find(|q| q.name() == name)
    }

    pub(crate) fn quantifier_mut(&mut self, name: &str) -> Option<&mut QuantifierInfo> {
        self.quantifiers.iter_mut().find(|q| q.name() == name)
    }

    pub(crate) fn remove_quantifier(&mut self, name: &str) -> Option<QuantifierInfo> {
        let at = self.quantifiers.iter().position(|q| q.name() == name)?;
        Some(self.quantifiers.remove(at))
    }

    pub(crate) fn add_quantifier(&mut self, quantifier: QuantifierInfo) {
        self.quantifiers.push(quantifier);
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

    /// Read-only view of the store for display.
    pub fn reader(&self) -> LogFluxResult<StoreReader> {
        StoreReader::open_with_schema(&self.db, self.table_name(), self.schema.clone())
    }

    /// Remove this store and every quantifier store derived from it.
    pub fn invalidate(&self) -> LogFluxResult<usize> {
        let mut removed = usize::from(self.db.invalidate()?);
        for quantifier in &self.quantifiers {
            removed += usize::from(quantifier.db().invalidate()?);
        }
        Ok(removed)
    }
}
