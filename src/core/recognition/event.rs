// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::core::log::Timecode;

/// One recognized interval of the log.
///
/// Line numbers are absolute log lines; `finish_line >= start_line` always
/// holds for events produced by the recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: u64,
    pub start_line: u64,
    pub finish_line: u64,
    pub start_time: Timecode,
    pub finish_time: Timecode,
}

impl Event {
    pub fn duration_ns(&self) -> i64 {
        self.finish_time.subtract(&self.start_time)
    }

    /// Number of log lines spanned, both ends included. Never less than one.
    pub fn line_span(&self) -> u64 {
        self.finish_line.saturating_sub(self.start_line) + 1
    }
}

/// Allocator of event identities for one analysis run.
///
/// Ids start at 1 and are handed out only when an event is finalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventIdCounter {
    last: u64,
}

impl EventIdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    /// The most recently allocated id, 0 if none.
    #[inline]
    pub fn current(&self) -> u64 {
        self.last
    }
}
