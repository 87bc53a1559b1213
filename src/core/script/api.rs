// SPDX-License-Identifier: MIT OR Apache-2.0

//! The callables an analysis script is given.
//!
//! Every entry point is guarded on its own. A script failure is reported and
//! the entry point returns `None`/`false`; a host failure (bad pattern, store
//! that cannot be created) is kept as fatal, every later call becomes a
//! no-op, and the driver fails the run with it.

use std::sync::Arc;

use log::error;
use rusqlite::Connection;

use crate::core::analysis::{AnalysisOutput, AnalysisResults};
use crate::core::error::{LogFluxError, LogFluxResult};
use crate::core::log::{LinePattern, LogIndex};
use crate::core::projection::{
    ChartBuilder, ChartInfo, DbInfo, NetworkInfo, ProjectionContext, ProjectionSchema, Projector,
    ProjectorInfo, QuantifierInfo, StoreRole,
};
use crate::core::recognition::{Analyser, EventRecognizer, EventSource};
use crate::core::script::guard::split_host_error;
use crate::core::script::{Reporter, ScriptError, ScriptGuard};

/// Names an output a script may hang quantifiers or charts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputHandle {
    projection: String,
    quantifier: Option<String>,
}

impl OutputHandle {
    fn projection(name: &str) -> Self {
        Self {
            projection: name.to_string(),
            quantifier: None,
        }
    }

    /// The projection or quantifier name.
    pub fn name(&self) -> &str {
        self.quantifier.as_deref().unwrap_or(&self.projection)
    }

    pub fn is_quantifier(&self) -> bool {
        self.quantifier.is_some()
    }
}

/// A node or link projection waiting to be bundled into a network.
#[derive(Debug)]
pub struct NetworkPart {
    info: ProjectorInfo,
}

impl NetworkPart {
    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn rows(&self) -> usize {
        self.info.rows()
    }
}

pub struct ScriptApi<'a> {
    index: &'a dyn LogIndex,
    reporter: Reporter<'a>,
    warn_on_gaps: bool,
    results: AnalysisResults,
    fatal: Option<LogFluxError>,
}

impl<'a> ScriptApi<'a> {
    pub(crate) fn new(
        index: &'a dyn LogIndex,
        reporter: Reporter<'a>,
        warn_on_gaps: bool,
        results: AnalysisResults,
    ) -> Self {
        Self {
            index,
            reporter,
            warn_on_gaps,
            results,
            fatal: None,
        }
    }

    /// The results built so far, or the host failure that stopped the run.
    pub(crate) fn finish(self) -> LogFluxResult<AnalysisResults> {
        match self.fatal {
            Some(e) => Err(e),
            None => Ok(self.results),
        }
    }

    fn guarded<T, F>(&mut self, name: String, body: F) -> Option<T>
    where
        F: FnOnce(&mut Self) -> LogFluxResult<T>,
    {
        if self.fatal.is_some() {
            return None;
        }
        let guard = ScriptGuard::with_reporter(name, self.reporter);
        match guard.run(|| split_host_error(body(self)))? {
            Ok(value) => Some(value),
            Err(e) => {
                error!("{}: {}", guard.name(), e);
                self.fatal = Some(e);
                None
            }
        }
    }

    /// `Recognise(analyser, start_pattern, finish_pattern=None)`.
    ///
    /// Without a finish pattern the start set is also the finish set.
    pub fn recognise<A>(&mut self, analyser: A, start: &str, finish: Option<&str>) -> Option<EventSource>
    where
        A: Analyser + 'static,
    {
        let index = self.index;
        let warn_on_gaps = self.warn_on_gaps;
        self.guarded("Recognise".to_string(), move |_| {
            let start_set = index.create_line_set(&LinePattern::new(start)?)?;
            let recognizer = match finish {
                Some(pattern) => {
                    let finish_set = index.create_line_set(&LinePattern::new(pattern)?)?;
                    EventRecognizer::new(start_set, finish_set)
                }
                None => EventRecognizer::self_paired(start_set),
            };
            Ok(EventSource::new(
                recognizer.with_gap_warnings(warn_on_gaps),
                Box::new(analyser),
            ))
        })
    }

    /// `Project(name, fn, schema)`: write a named event store.
    pub fn project<F>(&mut self, name: &str, schema: ProjectionSchema, f: F) -> Option<OutputHandle>
    where
        F: FnOnce(&mut ProjectionContext<'_>) -> Result<(), ScriptError>,
    {
        self.guarded(format!("Project({})", name), |api| {
            if api.results.contains(name) {
                return Err(ScriptError::raised(format!("output '{}' is already defined", name)).into());
            }
            let info = api.run_projection(name, schema, StoreRole::Events, f)?;
            api.results.insert(AnalysisOutput::Projection(info));
            Ok(OutputHandle::projection(name))
        })
    }

    /// `Nodes(name, fn, schema)`: a node table, recorded only through `Network`.
    pub fn nodes<F>(&mut self, name: &str, schema: ProjectionSchema, f: F) -> Option<NetworkPart>
    where
        F: FnOnce(&mut ProjectionContext<'_>) -> Result<(), ScriptError>,
    {
        self.guarded(format!("Nodes({})", name), |api| {
            let info = api.run_projection(name, schema, StoreRole::Nodes, f)?;
            Ok(NetworkPart { info })
        })
    }

    /// `Links(name, fn, schema)`: a link table, recorded only through `Network`.
    pub fn links<F>(&mut self, name: &str, schema: ProjectionSchema, f: F) -> Option<NetworkPart>
    where
        F: FnOnce(&mut ProjectionContext<'_>) -> Result<(), ScriptError>,
    {
        self.guarded(format!("Links({})", name), |api| {
            let info = api.run_projection(name, schema, StoreRole::Links, f)?;
            Ok(NetworkPart { info })
        })
    }

    /// `Network(name, node_proj, link_proj)`.
    pub fn network(&mut self, name: &str, nodes: NetworkPart, links: NetworkPart) -> bool {
        self.register_network(name, nodes, links, None::<fn(&Connection) -> Result<(), ScriptError>>)
    }

    /// `Network(name, node_proj, link_proj, partition_fn)`: `discover` fills the
    /// `partitions` table of the node store, links attached as `linkdb`.
    pub fn network_with_partitions<F>(
        &mut self,
        name: &str,
        nodes: NetworkPart,
        links: NetworkPart,
        discover: F,
    ) -> bool
    where
        F: FnOnce(&Connection) -> Result<(), ScriptError>,
    {
        self.register_network(name, nodes, links, Some(discover))
    }

    fn register_network<F>(
        &mut self,
        name: &str,
        nodes: NetworkPart,
        links: NetworkPart,
        discover: Option<F>,
    ) -> bool
    where
        F: FnOnce(&Connection) -> Result<(), ScriptError>,
    {
        self.guarded(format!("Network({})", name), |api| {
            if api.results.contains(name) {
                return Err(ScriptError::raised(format!("output '{}' is already defined", name)).into());
            }
            if nodes.info.role() != StoreRole::Nodes || links.info.role() != StoreRole::Links {
                return Err(ScriptError::raised("a network needs a Nodes and a Links projection").into());
            }
            let mut network = NetworkInfo::new(name, nodes.info, links.info);
            if let Some(discover) = discover {
                network.discover_partitions(discover)?;
            }
            api.results.insert(AnalysisOutput::Network(network));
            Ok(())
        })
        .is_some()
    }

    /// `Quantify(name, fn, schema)` on a projection; runs after the script body.
    pub fn quantify<F>(
        &mut self,
        target: &OutputHandle,
        name: &str,
        schema: ProjectionSchema,
        f: F,
    ) -> Option<OutputHandle>
    where
        F: FnMut(&mut ProjectionContext<'_>) -> Result<(), ScriptError> + 'static,
    {
        self.guarded(format!("Quantify({})", name), |api| {
            if target.is_quantifier() {
                return Err(ScriptError::raised("quantifiers attach to projections only").into());
            }
            let origin = api.results.clock().origin();
            let projection = api.results.projection_mut(&target.projection).ok_or_else(|| {
                ScriptError::lookup(format!("no projection named '{}'", target.projection))
            })?;
            if projection.quantifier(name).is_some() {
                return Err(ScriptError::raised(format!(
                    "'{}' already has a quantifier named '{}'",
                    target.projection, name
                ))
                .into());
            }
            let quantifier = QuantifierInfo::new(projection.db(), name, schema, origin, Box::new(f))?;
            api.results.add_quantifier(&target.projection, quantifier);
            Ok(OutputHandle {
                projection: target.projection.clone(),
                quantifier: Some(name.to_string()),
            })
        })
    }

    /// `Chart(name, wants_selection, builder)` on a projection or quantifier.
    pub fn chart<B>(&mut self, target: &OutputHandle, name: &str, wants_selection: bool, builder: B) -> bool
    where
        B: ChartBuilder + 'static,
    {
        self.guarded(format!("Chart({})", name), |api| {
            let projection = api.results.projection_mut(&target.projection).ok_or_else(|| {
                ScriptError::lookup(format!("no projection named '{}'", target.projection))
            })?;
            let chart = ChartInfo::new(name, wants_selection, Box::new(builder));
            match &target.quantifier {
                Some(q) => {
                    let quantifier = projection
                        .quantifier_mut(q)
                        .ok_or_else(|| ScriptError::lookup(format!("no quantifier named '{}'", q)))?;
                    if quantifier.chart(name).is_some() {
                        return Err(duplicate_chart(name).into());
                    }
                    quantifier.add_chart(chart);
                }
                None => {
                    if projection.chart(name).is_some() {
                        return Err(duplicate_chart(name).into());
                    }
                    projection.add_chart(chart);
                }
            }
            Ok(())
        })
        .is_some()
    }

    /// `MakeDisplaySchema()`: hidden `event_id` plus start, finish and duration.
    pub fn make_display_schema(&self) -> ProjectionSchema {
        ProjectionSchema::display()
    }

    fn run_projection<F>(
        &mut self,
        name: &str,
        schema: ProjectionSchema,
        role: StoreRole,
        f: F,
    ) -> LogFluxResult<ProjectorInfo>
    where
        F: FnOnce(&mut ProjectionContext<'_>) -> Result<(), ScriptError>,
    {
        let db = DbInfo::derive(self.results.root(), name, role)?;
        let projector = Projector::new(Arc::clone(&db), schema, role);
        let rows = projector.run(self.results.clock_mut(), f)?;
        Ok(ProjectorInfo::new(db, projector.schema().clone(), role, rows))
    }
}

fn duplicate_chart(name: &str) -> ScriptError {
    ScriptError::raised(format!("chart '{}' is already defined", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::core::log::{LineAccessor, LineFormat, MemoryLogIndex};
    use crate::core::projection::{ChartData, ChartRequest, FnChart, ProjectionField};
    use crate::core::recognition::{analyser_fn, StartMatch};

    const LOG: &str = "\
2024-01-01T00:00:00Z open 1
2024-01-01T00:00:01Z open 2
2024-01-01T00:00:03Z close 1
2024-01-01T00:00:04Z close 2
";

    fn index() -> MemoryLogIndex {
        let format = LineFormat::new(r"^(?P<ts>\S+) (?P<msg>\w+) (\d+)$").unwrap();
        MemoryLogIndex::parse(LOG, &format)
    }

    fn same_id() -> impl Analyser {
        analyser_fn(|line: &LineAccessor<'_>| {
            let id = line.unsigned(0);
            StartMatch::finish(move |c: &LineAccessor<'_>| c.unsigned(0) == id)
        })
    }

    fn api<'a>(index: &'a MemoryLogIndex, reporter: Reporter<'a>, dir: &std::path::Path) -> ScriptApi<'a> {
        let results = AnalysisResults::new(DbInfo::root(dir.join("run.db")));
        ScriptApi::new(index, reporter, true, results)
    }

    #[test]
    fn test_broken_projection_does_not_stop_others() {
        let dir = tempfile::tempdir().unwrap();
        let index = index();
        let reports = RefCell::new(Vec::<String>::new());
        let reporter = |r: &str| reports.borrow_mut().push(r.to_string());
        let mut api = api(&index, &reporter, dir.path());

        let source = api.recognise(same_id(), "open", Some("close")).unwrap();
        let broken = api.project("broken", ProjectionSchema::display(), |_| {
            Err(ScriptError::raised("bad projection"))
        });
        let good = api.project("requests", ProjectionSchema::display(), |ctx| {
            for event in ctx.recognise(&source)? {
                ctx.insert_event(&event, &[])?;
            }
            Ok(())
        });

        assert!(broken.is_none());
        assert_eq!(good.unwrap().name(), "requests");
        assert_eq!(reports.borrow().len(), 1);
        assert!(reports.borrow()[0].starts_with("Project(broken): ScriptError: bad projection"));

        let results = api.finish().unwrap();
        assert!(results.projection("broken").is_none());
        assert_eq!(results.projection("requests").unwrap().rows(), 2);
        assert_eq!(results.event_ids().current(), 2);
    }

    #[test]
    fn test_malformed_pattern_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let index = index();
        let reports = RefCell::new(Vec::<String>::new());
        let reporter = |r: &str| reports.borrow_mut().push(r.to_string());
        let mut api = api(&index, &reporter, dir.path());

        assert!(api.recognise(same_id(), "open(", None).is_none());
        assert!(api
            .project("later", ProjectionSchema::display(), |_| Ok(()))
            .is_none());
        assert!(reports.borrow().is_empty());

        let err = api.finish().unwrap_err();
        assert!(matches!(err, LogFluxError::MalformedPattern { .. }));
    }

    #[test]
    fn test_duplicate_names_and_lookups() {
        let dir = tempfile::tempdir().unwrap();
        let index = index();
        let reports = RefCell::new(Vec::<String>::new());
        let reporter = |r: &str| reports.borrow_mut().push(r.to_string());
        let mut api = api(&index, &reporter, dir.path());

        let handle = api.project("p", ProjectionSchema::new(), |_| Ok(())).unwrap();
        assert!(api.project("p", ProjectionSchema::new(), |_| Ok(())).is_none());

        let schema = ProjectionSchema::new().field(ProjectionField::int("n")).unwrap();
        let q = api
            .quantify(&handle, "q", schema.clone(), |_: &mut ProjectionContext<'_>| Ok(()))
            .unwrap();
        assert!(q.is_quantifier());
        assert!(api
            .quantify(&handle, "q", schema.clone(), |_: &mut ProjectionContext<'_>| Ok(()))
            .is_none());
        assert!(api
            .quantify(&q, "nested", schema, |_: &mut ProjectionContext<'_>| Ok(()))
            .is_none());

        let missing = OutputHandle::projection("missing");
        let chart = FnChart::new(Vec::new(), |_: &ChartRequest<'_>| -> Result<ChartData, ScriptError> {
            Ok(ChartData::default())
        });
        assert!(!api.chart(&missing, "c", false, chart));

        assert_eq!(reports.borrow().len(), 4);
        assert!(reports.borrow()[3].starts_with("Chart(c): LookupError"));
        let results = api.finish().unwrap();
        assert_eq!(results.projection("p").unwrap().quantifiers().len(), 1);
    }

    #[test]
    fn test_network_records_only_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let index = index();
        let reporter = |_: &str| {};
        let mut api = api(&index, &reporter, dir.path());

        let host = ProjectionSchema::new().field(ProjectionField::text("host")).unwrap();
        let edge = ProjectionSchema::new()
            .field(ProjectionField::text("src"))
            .unwrap()
            .field(ProjectionField::text("dst"))
            .unwrap();
        let nodes = api
            .nodes("mesh", host, |ctx| ctx.insert(&[("host", &"a")]))
            .unwrap();
        let links = api
            .links("mesh", edge, |ctx| ctx.insert(&[("src", &"a"), ("dst", &"a")]))
            .unwrap();
        assert!(api.network_with_partitions("mesh", nodes, links, |conn| {
            conn.execute("INSERT INTO partitions VALUES (1, 'all')", [])?;
            Ok(())
        }));

        let results = api.finish().unwrap();
        assert_eq!(results.len(), 1);
        let network = results.network("mesh").unwrap();
        assert_eq!(network.partitions().len(), 1);
        assert_eq!(network.nodes().rows(), 1);
    }
}
