// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scoped access to one store file.

use std::fs;
use std::io;
use std::sync::Arc;

use log::debug;
use rusqlite::{Connection, OpenFlags};

use crate::core::error::{LogFluxError, LogFluxResult};
use crate::core::projection::DbInfo;

/// Attach name of the `n`-th ancestor, nearest first, counting from 1.
pub fn attach_name(n: usize) -> String {
    format!("base{}", n)
}

pub struct DbConnection {
    info: Arc<DbInfo>,
    conn: Connection,
    attached: Vec<String>,
}

impl DbConnection {
    /// Open a fresh store, discarding any previous file at the same path.
    pub fn create(info: &Arc<DbInfo>) -> LogFluxResult<Self> {
        match fs::remove_file(info.path()) {
            Ok(()) => debug!("Replaced store {}", info.path().display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let conn = Connection::open(info.path())
            .map_err(|e| LogFluxError::store_unavailable(info.path(), e))?;
        debug!("Created store {}", info.path().display());
        Ok(Self::wrap(info, conn))
    }

    /// Open an existing store for modification.
    pub fn open(info: &Arc<DbInfo>) -> LogFluxResult<Self> {
        Self::open_with_flags(info, OpenFlags::SQLITE_OPEN_READ_WRITE)
    }

    /// Open an existing store for reading only.
    pub fn open_read_only(info: &Arc<DbInfo>) -> LogFluxResult<Self> {
        Self::open_with_flags(info, OpenFlags::SQLITE_OPEN_READ_ONLY)
    }

    fn open_with_flags(info: &Arc<DbInfo>, flags: OpenFlags) -> LogFluxResult<Self> {
        let conn = Connection::open_with_flags(info.path(), flags | OpenFlags::SQLITE_OPEN_NO_MUTEX)
            .map_err(|e| LogFluxError::store_unavailable(info.path(), e))?;
        Ok(Self::wrap(info, conn))
    }

    fn wrap(info: &Arc<DbInfo>, conn: Connection) -> Self {
        Self {
            info: Arc::clone(info),
            conn,
            attached: Vec::new(),
        }
    }

    /// Attach up to `depth` ancestors (all when `None`) as `base1`, `base2`, ...
    ///
    /// Numbering follows chain position, so an ancestor whose file does not
    /// exist leaves a gap rather than shifting the names of those above it.
    pub fn attach_ancestors(&mut self, depth: Option<usize>) -> LogFluxResult<usize> {
        let limit = depth.unwrap_or(usize::MAX);
        for (i, ancestor) in self.info.ancestors().take(limit).enumerate() {
            let alias = attach_name(i + 1);
            if !ancestor.exists() {
                debug!(
                    "Skipping attach of missing store {} as {}",
                    ancestor.path().display(),
                    alias
                );
                continue;
            }
            let path = ancestor.path().to_string_lossy().into_owned();
            self.conn
                .execute(&format!("ATTACH DATABASE ?1 AS {}", alias), [&path])
                .map_err(|e| LogFluxError::store_unavailable(ancestor.path(), e))?;
            debug!("Attached {} as {}", path, alias);
            self.attached.push(alias);
        }
        Ok(self.attached.len())
    }

    pub fn attached(&self) -> &[String] {
        &self.attached
    }

    pub fn info(&self) -> &Arc<DbInfo> {
        &self.info
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn begin(&self) -> LogFluxResult<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    /// Commit the open transaction and close the store.
    pub fn commit(self) -> LogFluxResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.close()
    }

    pub fn close(self) -> LogFluxResult<()> {
        let path = self.info.path().to_path_buf();
        self.conn.close().map_err(|(_, e)| LogFluxError::from(e))?;
        debug!("Closed store {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::projection::StoreRole;

    #[test]
    fn test_create_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = DbInfo::root(dir.path().join("run.db"));
        let info = DbInfo::derive(&root, "p", StoreRole::Events).unwrap();

        let first = DbConnection::create(&info).unwrap();
        first
            .connection()
            .execute_batch("CREATE TABLE t (x INTEGER)")
            .unwrap();
        first.close().unwrap();

        let second = DbConnection::create(&info).unwrap();
        let tables: i64 = second
            .connection()
            .query_row("SELECT COUNT(*) FROM sqlite_master", [], |r| r.get(0))
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[test]
    fn test_attach_chain_names() {
        let dir = tempfile::tempdir().unwrap();
        let root = DbInfo::root(dir.path().join("run.db"));
        let events = DbInfo::derive(&root, "p", StoreRole::Events).unwrap();
        let metrics = DbInfo::derive(&events, "q", StoreRole::Quantifier).unwrap();

        let root_conn = DbConnection::create(&root).unwrap();
        root_conn
            .connection()
            .execute_batch("CREATE TABLE meta (v TEXT); INSERT INTO meta VALUES ('root')")
            .unwrap();
        root_conn.close().unwrap();
        let ev_conn = DbConnection::create(&events).unwrap();
        ev_conn
            .connection()
            .execute_batch("CREATE TABLE events (event_id INTEGER); INSERT INTO events VALUES (7)")
            .unwrap();
        ev_conn.close().unwrap();

        let mut conn = DbConnection::create(&metrics).unwrap();
        assert_eq!(conn.attach_ancestors(None).unwrap(), 2);
        assert_eq!(conn.attached(), ["base1", "base2"]);
        let id: i64 = conn
            .connection()
            .query_row("SELECT event_id FROM base1.events", [], |r| r.get(0))
            .unwrap();
        assert_eq!(id, 7);
        let v: String = conn
            .connection()
            .query_row("SELECT v FROM base2.meta", [], |r| r.get(0))
            .unwrap();
        assert_eq!(v, "root");
    }

    #[test]
    fn test_missing_ancestor_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = DbInfo::root(dir.path().join("run.db"));
        let events = DbInfo::derive(&root, "p", StoreRole::Events).unwrap();

        let mut conn = DbConnection::create(&events).unwrap();
        assert_eq!(conn.attach_ancestors(None).unwrap(), 0);
        assert!(!root.exists());
    }

    #[test]
    fn test_open_missing_store_fails() {
        let dir = tempfile::tempdir().unwrap();
        let root = DbInfo::root(dir.path().join("absent.db"));
        let err = DbConnection::open_read_only(&root).err().unwrap();
        assert!(matches!(err, LogFluxError::StoreUnavailable { .. }));
    }
}
