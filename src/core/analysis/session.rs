// SPDX-License-Identifier: MIT OR Apache-2.0

//! The analysis driver.
//!
//! A run evaluates the script unit once: projections are written as the
//! script declares them, then every registered quantifier runs in
//! registration order. Everything happens on the calling thread and each run
//! replaces the previous results wholesale.

use std::sync::Arc;

use log::{debug, info};

use crate::core::analysis::AnalysisResults;
use crate::core::config::AnalysisConfig;
use crate::core::error::LogFluxResult;
use crate::core::log::LogIndex;
use crate::core::projection::DbInfo;
use crate::core::script::guard::split_host_error;
use crate::core::script::{warn_reporter, Reporter, ScriptApi, ScriptGuard, ScriptUnit};

pub struct AnalysisSession {
    config: AnalysisConfig,
    root: Arc<DbInfo>,
    reporter: Box<dyn Fn(&str)>,
    /// One-shot: reuse existing quantifier output on the next run only.
    reuse_pending: bool,
    results: Option<AnalysisResults>,
}

impl AnalysisSession {
    /// A fresh analysis: every quantifier is computed.
    pub fn new(config: AnalysisConfig) -> LogFluxResult<Self> {
        Self::build(config, false)
    }

    /// A saved analysis being reopened: the first run may reuse quantifier
    /// stores that are already on disk.
    pub fn reopen(config: AnalysisConfig) -> LogFluxResult<Self> {
        let reuse = config.reuse_quantifiers;
        Self::build(config, reuse)
    }

    fn build(config: AnalysisConfig, reuse_pending: bool) -> LogFluxResult<Self> {
        config.validate()?;
        let root = DbInfo::root(config.root.clone());
        Ok(Self {
            config,
            root,
            reporter: Box::new(warn_reporter),
            reuse_pending,
            results: None,
        })
    }

    /// Send script failure reports to `reporter` instead of `log::warn!`.
    pub fn with_reporter<R>(mut self, reporter: R) -> Self
    where
        R: Fn(&str) + 'static,
    {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn root(&self) -> &Arc<DbInfo> {
        &self.root
    }

    pub fn results(&self) -> Option<&AnalysisResults> {
        self.results.as_ref()
    }

    /// Evaluate `unit` against `index`.
    ///
    /// Script failures are reported and leave their output out of the
    /// results. Host failures fail the run and leave no results behind.
    pub fn run(&mut self, index: &dyn LogIndex, unit: &ScriptUnit) -> LogFluxResult<&AnalysisResults> {
        let locked = std::mem::take(&mut self.reuse_pending);
        self.results = None;
        let reporter: Reporter<'_> = &*self.reporter;

        let mut api = ScriptApi::new(
            index,
            reporter,
            self.config.warn_on_gaps,
            AnalysisResults::new(Arc::clone(&self.root)),
        );
        ScriptGuard::with_reporter(unit.name(), reporter).run(|| unit.call(&mut api));
        let mut results = api.finish()?;
        run_quantifiers(&mut results, locked, reporter)?;

        info!(
            "Analysis '{}' produced {} outputs, {} events",
            unit.name(),
            results.len(),
            results.event_ids().current()
        );
        let results: &AnalysisResults = self.results.insert(results);
        Ok(results)
    }
}

/// Second pass, in registration order. A quantifier that fails is dropped
/// from the results.
fn run_quantifiers(results: &mut AnalysisResults, locked: bool, reporter: Reporter<'_>) -> LogFluxResult<()> {
    for (projection, name) in results.quantifier_order() {
        let Some(quantifier) = results.quantifier_mut(&projection, &name) else {
            continue;
        };
        let guard = ScriptGuard::with_reporter(format!("Quantify({})", name), reporter);
        match guard.run(|| split_host_error(quantifier.run(locked))) {
            Some(Ok(outcome)) => debug!("Quantifier '{}' on '{}': {:?}", name, projection, outcome),
            Some(Err(e)) => return Err(e),
            None => {
                quantifier.invalidate()?;
                results.remove_quantifier(&projection, &name);
            }
        }
    }
    Ok(())
}
