// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `filter` marker table: the event ids currently visible in a store.

use log::debug;
use rusqlite::Connection;

use crate::core::error::{LogFluxError, LogFluxResult};
use crate::core::projection::EVENT_ID_FIELD;

pub const FILTER_TABLE: &str = "filter";

/// A row predicate over a store's data table, as an SQL boolean expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpression {
    source: String,
}

impl FilterExpression {
    /// Structural check only; column names are resolved when applied.
    pub fn parse(text: &str) -> LogFluxResult<Self> {
        let source = text.trim();
        if source.is_empty() {
            return Err(LogFluxError::malformed_filter(text, "expression is empty"));
        }

        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        for c in source.chars() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '\'' | '"') => quote = Some(c),
                (None, '(') => depth += 1,
                (None, ')') => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        LogFluxError::malformed_filter(text, "unbalanced ')'")
                    })?;
                }
                (None, ';') => {
                    return Err(LogFluxError::malformed_filter(
                        text,
                        "statement separators are not allowed",
                    ));
                }
                (None, _) => {}
            }
        }
        if quote.is_some() {
            return Err(LogFluxError::malformed_filter(text, "unterminated quote"));
        }
        if depth != 0 {
            return Err(LogFluxError::malformed_filter(text, "unbalanced '('"));
        }
        Ok(Self {
            source: source.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Drop and recreate the filter table holding every row of `table`.
pub fn reset_filter(conn: &Connection, table: &str) -> LogFluxResult<usize> {
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS \"{f}\"; CREATE TABLE \"{f}\" ({id} INTEGER PRIMARY KEY)",
        f = FILTER_TABLE,
        id = EVENT_ID_FIELD
    ))?;
    let rows = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO \"{f}\" SELECT {id} FROM \"{t}\" WHERE {id} IS NOT NULL",
            f = FILTER_TABLE,
            id = EVENT_ID_FIELD,
            t = table
        ),
        [],
    )?;
    debug!("Filter reset on '{}': {} rows visible", table, rows);
    Ok(rows)
}

/// Replace the filter contents with the rows of `table` matching `expr`.
pub fn apply_filter(conn: &Connection, table: &str, expr: &FilterExpression) -> LogFluxResult<usize> {
    let select = format!(
        "SELECT {id} FROM \"{t}\" WHERE ({e}) AND {id} IS NOT NULL",
        id = EVENT_ID_FIELD,
        t = table,
        e = expr.as_str()
    );
    // Resolve columns before touching the current selection.
    conn.prepare(&select)
        .map_err(|e| LogFluxError::malformed_filter(expr.as_str(), e.to_string()))?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(&format!("DELETE FROM \"{}\"", FILTER_TABLE), [])?;
    let rows = tx.execute(
        &format!("INSERT OR IGNORE INTO \"{}\" {}", FILTER_TABLE, select),
        [],
    )?;
    tx.commit()?;
    debug!("Filter '{}' on '{}': {} rows visible", expr.as_str(), table, rows);
    Ok(rows)
}

/// Event ids currently in the filter table, ascending.
pub fn read_selection(conn: &Connection) -> LogFluxResult<Vec<i64>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {id} FROM \"{f}\" ORDER BY {id}",
        id = EVENT_ID_FIELD,
        f = FILTER_TABLE
    ))?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE events (event_id INTEGER, status INTEGER, url TEXT);
             INSERT INTO events VALUES (1, 200, '/a'), (2, 500, '/b'), (3, 200, '/c'), (NULL, 0, 'x');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "   ", "(status = 1", "status = 1)", "url = 'x", "1; DROP TABLE events"] {
            let err = FilterExpression::parse(bad).unwrap_err();
            assert!(matches!(err, LogFluxError::MalformedFilter { .. }), "{bad}");
        }
        assert!(FilterExpression::parse("url = ';('").is_ok());
        assert_eq!(
            FilterExpression::parse("  status = 200 ").unwrap().as_str(),
            "status = 200"
        );
    }

    #[test]
    fn test_reset_selects_every_identified_row() {
        let conn = store();
        assert_eq!(reset_filter(&conn, "events").unwrap(), 3);
        assert_eq!(read_selection(&conn).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_apply_then_reset() {
        let conn = store();
        reset_filter(&conn, "events").unwrap();

        let expr = FilterExpression::parse("status = 200").unwrap();
        assert_eq!(apply_filter(&conn, "events", &expr).unwrap(), 2);
        assert_eq!(read_selection(&conn).unwrap(), vec![1, 3]);

        reset_filter(&conn, "events").unwrap();
        assert_eq!(read_selection(&conn).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_unknown_column_keeps_selection() {
        let conn = store();
        reset_filter(&conn, "events").unwrap();
        let expr = FilterExpression::parse("missing = 1").unwrap();
        let err = apply_filter(&conn, "events", &expr).unwrap_err();
        assert!(matches!(err, LogFluxError::MalformedFilter { .. }));
        assert_eq!(read_selection(&conn).unwrap().len(), 3);
    }
}
