// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};

use crate::core::error::{LogFluxError, LogFluxResult};
use crate::core::projection::filter::{self, FILTER_TABLE};
use crate::core::projection::projector::SCHEMA_TABLE;
use crate::core::projection::{DbConnection, DbInfo, ProjectionSchema, EVENT_ID_FIELD};

/// Read-only view of one produced store for the display layer.
pub struct StoreReader {
    db: DbConnection,
    schema: ProjectionSchema,
    table: String,
}

impl StoreReader {
    /// Open a store, taking the schema recorded alongside its data table.
    pub fn open(info: &Arc<DbInfo>, table: &str) -> LogFluxResult<Self> {
        let db = Self::connect(info)?;
        let stored: Option<String> = db
            .connection()
            .query_row(
                &format!("SELECT schema FROM \"{}\" WHERE table_name = ?1", SCHEMA_TABLE),
                [table],
                |row| row.get(0),
            )
            .optional()?;
        let schema = match stored {
            Some(json) => ProjectionSchema::from_json(&json)?,
            None => {
                return Err(LogFluxError::invalid_parameter(
                    format!("store {} has no table '{}'", info.path().display(), table),
                    "table",
                ))
            }
        };
        Ok(Self {
            db,
            schema,
            table: table.to_string(),
        })
    }

    pub fn open_with_schema(
        info: &Arc<DbInfo>,
        table: &str,
        schema: ProjectionSchema,
    ) -> LogFluxResult<Self> {
        Ok(Self {
            db: Self::connect(info)?,
            schema,
            table: table.to_string(),
        })
    }

    fn connect(info: &Arc<DbInfo>) -> LogFluxResult<DbConnection> {
        let mut db = DbConnection::open_read_only(info)?;
        db.attach_ancestors(None)?;
        Ok(db)
    }

    pub fn info(&self) -> &Arc<DbInfo> {
        self.db.info()
    }

    pub fn schema(&self) -> &ProjectionSchema {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn connection(&self) -> &Connection {
        self.db.connection()
    }

    /// Names of the columns the display layer shows, in schema order.
    pub fn columns(&self) -> Vec<&str> {
        self.schema
            .shown_fields()
            .map(|(_, f)| f.name.as_str())
            .collect()
    }

    pub fn row_count(&self, filtered: bool) -> LogFluxResult<usize> {
        let sql = format!(
            "SELECT COUNT(*) FROM \"{}\"{}",
            self.table,
            Self::filter_clause(filtered)
        );
        let count: i64 = self.connection().query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// One page of shown columns, as stored.
    pub fn raw_rows(&self, filtered: bool, offset: usize, limit: usize) -> LogFluxResult<Vec<Vec<Value>>> {
        let shown: Vec<String> = self
            .columns()
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect();
        if shown.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM \"{}\"{} ORDER BY rowid LIMIT ?1 OFFSET ?2",
            shown.join(", "),
            self.table,
            Self::filter_clause(filtered)
        );
        let width = shown.len();
        let mut stmt = self.connection().prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], |row| {
            (0..width)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<Value>>>()
        })?;
        Ok(rows.collect::<Result<Vec<Vec<Value>>, _>>()?)
    }

    /// One page of shown columns, rendered for display.
    pub fn rows(&self, filtered: bool, offset: usize, limit: usize) -> LogFluxResult<Vec<Vec<String>>> {
        let indices: Vec<usize> = self.schema.shown_fields().map(|(i, _)| i).collect();
        let raw = self.raw_rows(filtered, offset, limit)?;
        Ok(raw
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&indices)
                    .map(|(value, &index)| self.schema.format_value(index, value))
                    .collect()
            })
            .collect())
    }

    /// Event ids currently visible.
    pub fn selection(&self) -> LogFluxResult<Vec<i64>> {
        filter::read_selection(self.connection())
    }

    fn filter_clause(filtered: bool) -> String {
        if filtered {
            format!(
                " WHERE {id} IN (SELECT {id} FROM \"{f}\")",
                id = EVENT_ID_FIELD,
                f = FILTER_TABLE
            )
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log::Timecode;
    use crate::core::projection::{
        apply_filter, EventClock, FilterExpression, ProjectionField, Projector, StoreRole,
    };
    use crate::core::recognition::Event;

    fn populate(root: &Arc<DbInfo>) -> Arc<DbInfo> {
        let info = DbInfo::derive(root, "requests", StoreRole::Events).unwrap();
        let schema = ProjectionSchema::display()
            .field(ProjectionField::int("status"))
            .unwrap();
        Projector::new(Arc::clone(&info), schema, StoreRole::Events)
            .run(&mut EventClock::new(), |ctx| {
                for (id, status) in [(1u64, 200i64), (2, 404), (3, 200)] {
                    let event = Event {
                        event_id: id,
                        start_line: id,
                        finish_line: id + 1,
                        start_time: Timecode::new(id as i64, 0),
                        finish_time: Timecode::new(id as i64, 250_000_000),
                    };
                    ctx.insert_event(&event, &[("status", &status)])?;
                }
                Ok(())
            })
            .unwrap();
        info
    }

    #[test]
    fn test_rows_use_stored_schema() {
        let dir = tempfile::tempdir().unwrap();
        let root = DbInfo::root(dir.path().join("run.db"));
        let info = populate(&root);

        let reader = StoreReader::open(&info, "events").unwrap();
        assert_eq!(reader.columns(), vec!["start", "duration", "status"]);
        assert_eq!(reader.row_count(false).unwrap(), 3);

        let rows = reader.rows(false, 1, 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["1.000000000", "0.250000000", "404"]);
    }

    #[test]
    fn test_filtered_view_follows_filter_table() {
        let dir = tempfile::tempdir().unwrap();
        let root = DbInfo::root(dir.path().join("run.db"));
        let info = populate(&root);

        {
            let db = DbConnection::open(&info).unwrap();
            let expr = FilterExpression::parse("status = 200").unwrap();
            apply_filter(db.connection(), "events", &expr).unwrap();
        }

        let reader = StoreReader::open(&info, "events").unwrap();
        assert_eq!(reader.row_count(true).unwrap(), 2);
        assert_eq!(reader.row_count(false).unwrap(), 3);
        assert_eq!(reader.selection().unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_unknown_table() {
        let dir = tempfile::tempdir().unwrap();
        let root = DbInfo::root(dir.path().join("run.db"));
        let info = populate(&root);
        assert!(StoreReader::open(&info, "metrics").is_err());
    }
}
