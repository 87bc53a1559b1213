// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic naming of derived relational stores.
//!
//! Every derived store sits next to its parent and is named
//! `{parent_stem}.{short_name}({role}).db`. The parent stem already encodes
//! the whole ancestry, so distinct (ancestry, name, role) triples never map to
//! the same file.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::error::{LogFluxError, LogFluxResult};

/// Logical role of a store relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreRole {
    Events,
    Quantifier,
    Nodes,
    Links,
}

impl StoreRole {
    /// Tag embedded in the file name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            StoreRole::Events => "events",
            StoreRole::Quantifier => "quantifier",
            StoreRole::Nodes => "nodes",
            StoreRole::Links => "links",
        }
    }

    /// Name of the data table inside a store of this role.
    pub const fn table_name(&self) -> &'static str {
        match self {
            StoreRole::Events => "events",
            StoreRole::Quantifier => "metrics",
            StoreRole::Nodes => "nodes",
            StoreRole::Links => "links",
        }
    }
}

impl fmt::Display for StoreRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of a store ancestry chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbInfo {
    name: String,
    path: PathBuf,
    parent: Option<Arc<DbInfo>>,
}

impl DbInfo {
    /// The top-level analysis store. Its file need not exist.
    pub fn root(path: impl Into<PathBuf>) -> Arc<Self> {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Arc::new(Self {
            name,
            path,
            parent: None,
        })
    }

    /// Child store of `parent` for the output `name` in `role`.
    pub fn derive(parent: &Arc<DbInfo>, name: &str, role: StoreRole) -> LogFluxResult<Arc<Self>> {
        if name.is_empty() {
            return Err(LogFluxError::invalid_parameter(
                "output name must not be empty",
                "name",
            ));
        }
        let file_name = format!("{}.{}({}).db", parent.stem(), short_name(name), role);
        let path = match parent.path.parent() {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        };
        Ok(Arc::new(Self {
            name: name.to_string(),
            path,
            parent: Some(Arc::clone(parent)),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parent(&self) -> Option<&Arc<DbInfo>> {
        self.parent.as_ref()
    }

    /// Ancestors, nearest first.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors {
            next: self.parent.as_deref(),
        }
    }

    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Delete the backing file. Returns whether a file was removed.
    pub fn invalidate(&self) -> LogFluxResult<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Invalidated store {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// File name without the trailing `.db`-style extension.
    fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub struct Ancestors<'a> {
    next: Option<&'a DbInfo>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a DbInfo;

    fn next(&mut self) -> Option<&'a DbInfo> {
        let current = self.next?;
        self.next = current.parent.as_deref();
        Some(current)
    }
}

/// File-name-safe form of an output name.
///
/// `[A-Za-z0-9_-]` pass through; every other UTF-8 byte becomes `~XX`.
/// `~` itself is escaped, so the mapping is injective.
pub fn short_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("~{:02X}", byte));
        }
    }
    out
}
