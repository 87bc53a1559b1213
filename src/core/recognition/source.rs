// SPDX-License-Identifier: MIT OR Apache-2.0

use std::cell::RefCell;
use std::fmt;

use crate::core::recognition::{Analyser, Event, EventIdCounter, EventRecognizer, RecognitionStats};

/// A recognizer bound to the analyser that drives it.
///
/// Handed to analysis scripts by `Recognise`; every projection that reads it
/// performs its own recognition pass, drawing ids from the run's counter.
pub struct EventSource {
    recognizer: EventRecognizer,
    analyser: RefCell<Box<dyn Analyser>>,
}

impl EventSource {
    pub fn new(recognizer: EventRecognizer, analyser: Box<dyn Analyser>) -> Self {
        Self {
            recognizer,
            analyser: RefCell::new(analyser),
        }
    }

    pub fn recognizer(&self) -> &EventRecognizer {
        &self.recognizer
    }

    /// Run one full pass. `None` if a pass over this source is already running.
    pub fn collect(&self, ids: &mut EventIdCounter) -> Option<(Vec<Event>, RecognitionStats)> {
        let mut analyser = self.analyser.try_borrow_mut().ok()?;
        let mut recognition = self.recognizer.recognize(&mut **analyser, ids);
        let events: Vec<Event> = recognition.by_ref().collect();
        Some((events, recognition.stats()))
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("recognizer", &self.recognizer)
            .finish_non_exhaustive()
    }
}
