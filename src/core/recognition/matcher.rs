// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::core::log::LineAccessor;

/// Finish predicate created by a successful start match.
///
/// Carries whatever start-line state it needs and is asked, candidate by
/// candidate, whether a finish line closes the event.
pub trait FinishMatcher {
    fn matches(&mut self, line: &LineAccessor<'_>) -> bool;
}

impl<F> FinishMatcher for F
where
    F: FnMut(&LineAccessor<'_>) -> bool,
{
    fn matches(&mut self, line: &LineAccessor<'_>) -> bool {
        self(line)
    }
}

/// Outcome of testing a start-set line.
pub enum StartMatch {
    /// Not a start line.
    NoMatch,
    /// Matched, but the line is a marker with no finish to look for.
    Marker,
    /// Matched; search the finish set with this predicate.
    Finish(Box<dyn FinishMatcher>),
}

impl StartMatch {
    /// Wrap a closure as the finish predicate.
    pub fn finish<F>(predicate: F) -> Self
    where
        F: FnMut(&LineAccessor<'_>) -> bool + 'static,
    {
        StartMatch::Finish(Box::new(predicate))
    }

    pub fn with_matcher<M: FinishMatcher + 'static>(matcher: M) -> Self {
        StartMatch::Finish(Box::new(matcher))
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, StartMatch::NoMatch)
    }
}

impl std::fmt::Debug for StartMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartMatch::NoMatch => f.write_str("NoMatch"),
            StartMatch::Marker => f.write_str("Marker"),
            StartMatch::Finish(_) => f.write_str("Finish(..)"),
        }
    }
}

/// Start predicate supplied by an analysis.
pub trait Analyser {
    fn match_start(&mut self, line: &LineAccessor<'_>) -> StartMatch;
}

/// Analyser backed by a closure; see [`analyser_fn`].
pub struct FnAnalyser<F>(F);

impl<F> Analyser for FnAnalyser<F>
where
    F: FnMut(&LineAccessor<'_>) -> StartMatch,
{
    fn match_start(&mut self, line: &LineAccessor<'_>) -> StartMatch {
        (self.0)(line)
    }
}

pub fn analyser_fn<F>(f: F) -> FnAnalyser<F>
where
    F: FnMut(&LineAccessor<'_>) -> StartMatch,
{
    FnAnalyser(f)
}
