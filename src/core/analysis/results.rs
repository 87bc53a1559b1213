// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use log::debug;

use crate::core::error::LogFluxResult;
use crate::core::projection::{DbInfo, EventClock, NetworkInfo, ProjectorInfo, QuantifierInfo};
use crate::core::recognition::EventIdCounter;

/// One named output of an analysis run.
#[derive(Debug)]
pub enum AnalysisOutput {
    Projection(ProjectorInfo),
    Network(NetworkInfo),
}

impl AnalysisOutput {
    pub fn name(&self) -> &str {
        match self {
            AnalysisOutput::Projection(p) => p.name(),
            AnalysisOutput::Network(n) => n.name(),
        }
    }

    pub fn as_projection(&self) -> Option<&ProjectorInfo> {
        match self {
            AnalysisOutput::Projection(p) => Some(p),
            AnalysisOutput::Network(_) => None,
        }
    }

    pub fn as_network(&self) -> Option<&NetworkInfo> {
        match self {
            AnalysisOutput::Network(n) => Some(n),
            AnalysisOutput::Projection(_) => None,
        }
    }

    fn invalidate(&self) -> LogFluxResult<usize> {
        match self {
            AnalysisOutput::Projection(p) => p.invalidate(),
            AnalysisOutput::Network(n) => n.invalidate(),
        }
    }
}

/// Everything one analysis run produced, in declaration order.
#[derive(Debug)]
pub struct AnalysisResults {
    root: Arc<DbInfo>,
    clock: EventClock,
    outputs: Vec<AnalysisOutput>,
    /// (projection, quantifier) pairs in registration order.
    quantifier_order: Vec<(String, String)>,
}

impl AnalysisResults {
    pub fn new(root: Arc<DbInfo>) -> Self {
        Self {
            root,
            clock: EventClock::new(),
            outputs: Vec::new(),
            quantifier_order: Vec::new(),
        }
    }

    pub fn root(&self) -> &Arc<DbInfo> {
        &self.root
    }

    pub fn event_ids(&self) -> &EventIdCounter {
        self.clock.ids()
    }

    pub fn clock(&self) -> &EventClock {
        &self.clock
    }

    pub(crate) fn clock_mut(&mut self) -> &mut EventClock {
        &mut self.clock
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&AnalysisOutput> {
        self.outputs.iter().find(|o| o.name() == name)
    }

    pub fn outputs(&self) -> &[AnalysisOutput] {
        &self.outputs
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|o| o.name())
    }

    pub fn projection(&self, name: &str) -> Option<&ProjectorInfo> {
        self.get(name).and_then(AnalysisOutput::as_projection)
    }

    pub fn network(&self, name: &str) -> Option<&NetworkInfo> {
        self.get(name).and_then(AnalysisOutput::as_network)
    }

    pub fn quantifier(&self, projection: &str, name: &str) -> Option<&QuantifierInfo> {
        self.projection(projection)?.quantifier(name)
    }

    pub fn projections(&self) -> impl Iterator<Item = &ProjectorInfo> {
        self.outputs.iter().filter_map(AnalysisOutput::as_projection)
    }

    pub(crate) fn projection_mut(&mut self, name: &str) -> Option<&mut ProjectorInfo> {
        self.outputs.iter_mut().find_map(|o| match o {
            AnalysisOutput::Projection(p) if p.name() == name => Some(p),
            _ => None,
        })
    }

    /// Every quantifier, in the order the script registered them.
    pub fn quantifiers(&self) -> impl Iterator<Item = &QuantifierInfo> {
        self.quantifier_order
            .iter()
            .filter_map(|(projection, name)| self.quantifier(projection, name))
    }

    pub(crate) fn quantifier_order(&self) -> Vec<(String, String)> {
        self.quantifier_order.clone()
    }

    pub(crate) fn quantifier_mut(&mut self, projection: &str, name: &str) -> Option<&mut QuantifierInfo> {
        self.projection_mut(projection)?.quantifier_mut(name)
    }

    pub(crate) fn add_quantifier(&mut self, projection: &str, quantifier: QuantifierInfo) {
        let name = quantifier.name().to_string();
        if let Some(target) = self.projection_mut(projection) {
            target.add_quantifier(quantifier);
            self.quantifier_order.push((projection.to_string(), name));
        }
    }

    pub(crate) fn remove_quantifier(&mut self, projection: &str, name: &str) -> Option<QuantifierInfo> {
        self.quantifier_order
            .retain(|(p, q)| !(p.as_str() == projection && q.as_str() == name));
        self.projection_mut(projection)?.remove_quantifier(name)
    }

    pub(crate) fn insert(&mut self, output: AnalysisOutput) {
        debug!("Recorded output '{}'", output.name());
        self.outputs.push(output);
    }

    /// Delete every store file this run produced. Returns files removed.
    pub fn invalidate(&self) -> LogFluxResult<usize> {
        let mut removed = 0;
        for output in &self.outputs {
            removed += output.invalidate()?;
        }
        debug!("Invalidated {} stores under {}", removed, self.root.path().display());
        Ok(removed)
    }
}
