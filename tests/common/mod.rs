// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use logflux::core::log::{LineAccessor, LineFormat, MemoryLogIndex};
use logflux::core::projection::{ProjectionField, ProjectionSchema, ScalarType};
use logflux::core::recognition::{analyser_fn, Analyser, StartMatch};
use logflux::AnalysisConfig;
use tempfile::TempDir;

/// A small access log. Requests 1-3 complete; request 4 never does.
pub const ACCESS_LOG: &str = "\
2024-03-05T10:00:00.000Z start 1 /api/users
2024-03-05T10:00:00.100Z start 2 /api/orders
2024-03-05T10:00:00.250Z end 1 200
2024-03-05T10:00:00.400Z start 3 /api/users
2024-03-05T10:00:00.900Z end 2 500
2024-03-05T10:00:01.000Z end 3 200
2024-03-05T10:00:02.000Z start 4 /api/health
";

pub const START_PATTERN: &str = r" start \d+ ";
pub const FINISH_PATTERN: &str = r" end \d+ ";

/// Field 0 is the request id, field 1 the path (start) or status (end).
pub fn access_index() -> MemoryLogIndex {
    let format = LineFormat::new(r"^(?P<ts>\S+) (?P<msg>start|end) (\d+) (\S+)$").unwrap();
    MemoryLogIndex::parse(ACCESS_LOG, &format)
}

/// Pairs a start line with the first end line carrying the same request id.
pub fn match_request_id() -> impl Analyser {
    analyser_fn(|line: &LineAccessor<'_>| {
        let id = line.unsigned(0);
        StartMatch::finish(move |candidate: &LineAccessor<'_>| candidate.unsigned(0) == id)
    })
}

/// Display schema plus the request path.
pub fn request_schema() -> ProjectionSchema {
    ProjectionSchema::display()
        .field(ProjectionField::text("path"))
        .unwrap()
}

pub fn latency_schema() -> ProjectionSchema {
    ProjectionSchema::new()
        .field(ProjectionField::text("path"))
        .unwrap()
        .field(ProjectionField::int("count"))
        .unwrap()
        .field(ProjectionField::new("mean_ms", ScalarType::Real))
        .unwrap()
}

/// A scratch directory holding the analysis root store.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("web.db")
    }

    pub fn config(&self) -> AnalysisConfig {
        AnalysisConfig::new(self.root())
    }

    pub fn store(&self, file_name: &str) -> PathBuf {
        self.dir.path().join(file_name)
    }
}

/// Reporter that keeps every report for later inspection.
pub fn collecting_reporter() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) + 'static) {
    let reports = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&reports);
    (reports, move |r: &str| sink.borrow_mut().push(r.to_string()))
}
