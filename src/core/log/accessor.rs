// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::core::log::{LineSet, Timecode};

/// Read-only cursor over one line set.
///
/// Holds nothing but the set and a position; every read goes to the set.
#[derive(Debug, Clone, Copy)]
pub struct LineAccessor<'a> {
    set: &'a dyn LineSet,
    view_line: usize,
}

impl<'a> LineAccessor<'a> {
    pub fn new(set: &'a dyn LineSet, view_line: usize) -> Self {
        Self { set, view_line }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.view_line
    }

    pub fn set_position(&mut self, view_line: usize) {
        self.view_line = view_line;
    }

    /// Move to the next view line. Returns `false` once past the end.
    pub fn advance(&mut self) -> bool {
        self.view_line += 1;
        self.view_line < self.set.num_lines()
    }

    pub fn is_valid(&self) -> bool {
        self.view_line < self.set.num_lines()
    }

    pub fn log_line(&self) -> Option<u64> {
        self.set.view_line_to_log_line(self.view_line)
    }

    pub fn unsigned(&self, field: usize) -> Option<u64> {
        self.set.field_unsigned(self.view_line, field)
    }

    pub fn signed(&self, field: usize) -> Option<i64> {
        self.set.field_signed(self.view_line, field)
    }

    pub fn float(&self, field: usize) -> Option<f64> {
        self.set.field_float(self.view_line, field)
    }

    pub fn text(&self, field: usize) -> Option<String> {
        self.set.field_text(self.view_line, field)
    }

    pub fn non_field_text(&self) -> Option<String> {
        self.set.non_field_text(self.view_line)
    }

    pub fn nearest_timecode(&self) -> Timecode {
        self.set.nearest_utc_timecode(self.view_line)
    }

    pub fn line_set(&self) -> &'a dyn LineSet {
        self.set
    }
}
