// SPDX-License-Identifier: MIT OR Apache-2.0

//! Node/link projection pairs and partition discovery.

use std::sync::Arc;

use log::info;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::core::error::{LogFluxError, LogFluxResult};
use crate::core::projection::{DbConnection, DbInfo, ProjectorInfo};
use crate::core::script::ScriptError;

pub const PARTITIONS_TABLE: &str = "partitions";

/// Attach name of the links store while partitions are discovered.
pub const LINKS_ALIAS: &str = "linkdb";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub id: i64,
    pub description: String,
}

#[derive(Debug)]
pub struct NetworkInfo {
    name: String,
    nodes: ProjectorInfo,
    links: ProjectorInfo,
    partitions: Vec<Partition>,
}

impl NetworkInfo {
    pub fn new(name: impl Into<String>, nodes: ProjectorInfo, links: ProjectorInfo) -> Self {
        Self {
            name: name.into(),
            nodes,
            links,
            partitions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &ProjectorInfo {
        &self.nodes
    }

    pub fn links(&self) -> &ProjectorInfo {
        &self.links
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Run `discover` against the node store, links attached as `linkdb`,
    /// and keep the `partitions` table it fills.
    ///
    /// A failing callback comes back as `LogFluxError::Script` and leaves the
    /// previous partition list untouched.
    pub fn discover_partitions<F>(&mut self, discover: F) -> LogFluxResult<&[Partition]>
    where
        F: FnOnce(&Connection) -> Result<(), ScriptError>,
    {
        self.partitions = discover_partitions(self.nodes.db(), self.links.db(), discover)?;
        info!(
            "Network '{}': {} partitions",
            self.name,
            self.partitions.len()
        );
        Ok(&self.partitions)
    }

    pub fn invalidate(&self) -> LogFluxResult<usize> {
        Ok(self.nodes.invalidate()? + self.links.invalidate()?)
    }
}

fn discover_partitions<F>(
    nodes: &Arc<DbInfo>,
    links: &Arc<DbInfo>,
    discover: F,
) -> LogFluxResult<Vec<Partition>>
where
    F: FnOnce(&Connection) -> Result<(), ScriptError>,
{
    let db = DbConnection::open(nodes)?;
    let conn = db.connection();
    let links_path = links.path().to_string_lossy().into_owned();
    conn.execute(
        &format!("ATTACH DATABASE ?1 AS {}", LINKS_ALIAS),
        [&links_path],
    )?;
    db.begin()?;
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS \"{p}\"; CREATE TABLE \"{p}\" (id INTEGER PRIMARY KEY, description TEXT NOT NULL)",
        p = PARTITIONS_TABLE
    ))?;
    discover(conn)?;

    let frame = format!("partitions of '{}'", nodes.name());
    let partitions = read_partitions(conn)
        .map_err(|e| LogFluxError::Script(ScriptError::from(e).with_frame(frame.as_str())))?;
    db.commit().map_err(|e| e.into_script(frame))?;
    Ok(partitions)
}

fn read_partitions(conn: &Connection) -> rusqlite::Result<Vec<Partition>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, description FROM \"{}\" ORDER BY id",
        PARTITIONS_TABLE
    ))?;
    let rows = stmt.query_map([], |row| {
        Ok(Partition {
            id: row.get(0)?,
            description: row.get(1)?,
        })
    })?;
    rows.collect()
}
