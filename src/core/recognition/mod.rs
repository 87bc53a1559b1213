// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event recognition: turning start/finish line sets into identified events.

pub mod event;
pub mod matcher;
pub mod recognizer;
pub mod source;

pub use event::{Event, EventIdCounter};
pub use matcher::{analyser_fn, Analyser, FinishMatcher, FnAnalyser, StartMatch};
pub use recognizer::{EventRecognizer, Recognition, RecognitionStats};
pub use source::EventSource;
