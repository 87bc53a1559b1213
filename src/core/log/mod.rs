// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access to an indexed log: line sets, the cursor handed to match
//! predicates, and timecodes.

pub mod accessor;
pub mod line_set;
pub mod memory_index;
pub mod timecode;

pub use accessor::LineAccessor;
pub use line_set::{LinePattern, LineSet, LogIndex};
pub use memory_index::{FieldValue, LineFormat, LogRecord, MemoryLineSet, MemoryLogIndex};
pub use timecode::Timecode;
