// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interval matching over a start set and a finish set.
//!
//! Every start-set line is offered to the analyser. A start match yields a
//! finish predicate, which is tried against finish-set lines from the first
//! one at or after the start line's log position until it accepts one or the
//! set runs out. Ids are allocated only for events that close.
//!
//! The finish lookup assumes the finish set is in log order. Candidates are
//! examined linearly, so a predicate that rarely accepts costs
//! O(|start| * |finish|).

use std::sync::Arc;

use log::{info, warn};

use crate::core::log::{LineAccessor, LineSet};
use crate::core::recognition::{Analyser, Event, EventIdCounter, FinishMatcher, StartMatch};

/// Counters describing one recognition pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecognitionStats {
    /// Start-set lines offered to the analyser.
    pub examined: usize,
    /// Lines matched as markers (no finish wanted).
    pub markers: usize,
    /// Start matches with no finish-set line at or after them.
    pub abandoned: usize,
    /// Start matches whose finish search exhausted the finish set.
    pub gaps: usize,
    /// Events produced.
    pub events: usize,
}

#[derive(Debug, Clone)]
pub struct EventRecognizer {
    start_set: Arc<dyn LineSet>,
    finish_set: Arc<dyn LineSet>,
    warn_on_gaps: bool,
}

impl EventRecognizer {
    pub fn new(start_set: Arc<dyn LineSet>, finish_set: Arc<dyn LineSet>) -> Self {
        Self {
            start_set,
            finish_set,
            warn_on_gaps: true,
        }
    }

    /// Start and finish lines come from the same set.
    pub fn self_paired(set: Arc<dyn LineSet>) -> Self {
        Self::new(Arc::clone(&set), set)
    }

    pub fn with_gap_warnings(mut self, enabled: bool) -> Self {
        self.warn_on_gaps = enabled;
        self
    }

    pub fn start_set(&self) -> &dyn LineSet {
        self.start_set.as_ref()
    }

    pub fn finish_set(&self) -> &dyn LineSet {
        self.finish_set.as_ref()
    }

    /// Lazily recognize events, drawing ids from `ids`.
    pub fn recognize<'r>(
        &'r self,
        analyser: &'r mut dyn Analyser,
        ids: &'r mut EventIdCounter,
    ) -> Recognition<'r> {
        Recognition {
            recognizer: self,
            analyser,
            ids,
            next_start: 0,
            stats: RecognitionStats::default(),
            finished: false,
        }
    }
}

/// Iterator over the events of one recognition pass.
pub struct Recognition<'r> {
    recognizer: &'r EventRecognizer,
    analyser: &'r mut dyn Analyser,
    ids: &'r mut EventIdCounter,
    next_start: usize,
    stats: RecognitionStats,
    finished: bool,
}

impl<'r> Recognition<'r> {
    pub fn stats(&self) -> RecognitionStats {
        self.stats
    }

    fn finish_pass(&mut self) {
        if !self.finished {
            self.finished = true;
            info!(
                "Recognition examined {} start lines: {} events, {} markers, {} abandoned, {} gaps",
                self.stats.examined,
                self.stats.events,
                self.stats.markers,
                self.stats.abandoned,
                self.stats.gaps
            );
        }
    }

    /// First finish-set view line at or after `start_log_line` that the
    /// predicate accepts.
    fn search_finish(&self, start_log_line: u64, mut finish: Box<dyn FinishMatcher>) -> FinishSearch {
        let finish_set = self.recognizer.finish_set.as_ref();
        let Some(first) = finish_set.log_line_to_view_line(start_log_line, false) else {
            return FinishSearch::NoCandidate;
        };
        let mut cursor = LineAccessor::new(finish_set, first);
        while cursor.is_valid() {
            if finish.matches(&cursor) {
                return FinishSearch::Found(cursor.position());
            }
            cursor.advance();
        }
        FinishSearch::Exhausted
    }
}

enum FinishSearch {
    Found(usize),
    NoCandidate,
    Exhausted,
}

impl Iterator for Recognition<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        let start_set = Arc::clone(&self.recognizer.start_set);
        let finish_set = Arc::clone(&self.recognizer.finish_set);

        while self.next_start < start_set.num_lines() {
            let view_line = self.next_start;
            self.next_start += 1;
            self.stats.examined += 1;

            let accessor = LineAccessor::new(start_set.as_ref(), view_line);
            let finish = match self.analyser.match_start(&accessor) {
                StartMatch::NoMatch => continue,
                StartMatch::Marker => {
                    self.stats.markers += 1;
                    continue;
                }
                StartMatch::Finish(finish) => finish,
            };

            let Some(start_log_line) = start_set.view_line_to_log_line(view_line) else {
                continue;
            };

            let finish_view_line = match self.search_finish(start_log_line, finish) {
                FinishSearch::Found(v) => v,
                FinishSearch::NoCandidate => {
                    self.stats.abandoned += 1;
                    continue;
                }
                FinishSearch::Exhausted => {
                    self.stats.gaps += 1;
                    if self.recognizer.warn_on_gaps {
                        warn!(
                            "No finish line found for event starting at log line {}",
                            start_log_line
                        );
                    }
                    continue;
                }
            };

            let Some(finish_log_line) = finish_set.view_line_to_log_line(finish_view_line) else {
                continue;
            };

            let event = Event {
                event_id: self.ids.allocate(),
                start_line: start_log_line,
                finish_line: finish_log_line,
                start_time: start_set.nearest_utc_timecode(view_line),
                finish_time: finish_set.nearest_utc_timecode(finish_view_line),
            };
            self.stats.events += 1;
            return Some(event);
        }

        self.finish_pass();
        None
    }
}
