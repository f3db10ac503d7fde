//! Event channel from background workers to the UI thread.
//!
//! Workers push, the UI thread polls `pending()` once per input cycle and pops
//! until it returns false. Completed match sets travel through the channel by
//! value; the UI thread is the only owner of the filter-slot table.

use crate::error::{FewerError, Result};
use crate::filter::{PatternMatchSet, ScanTicket};
use parking_lot::Mutex;
use std::collections::VecDeque;

#[derive(Debug)]
pub enum Event {
    /// Status text for the info row (progress, failures)
    Info(String),

    /// A background scan finished for `slot`
    FilterReady {
        slot: usize,
        ticket: ScanTicket,
        matches: PatternMatchSet,
    },

    /// The background scan for `text` in `slot` panicked
    FilterFailed {
        slot: usize,
        ticket: ScanTicket,
        text: String,
        message: String,
    },
}

/// Thread-safe FIFO of [`Event`]s
#[derive(Debug, Default)]
pub struct EventChannel {
    queue: Mutex<VecDeque<Event>>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.queue.lock().push_back(event);
    }

    pub fn pending(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        !self.pending()
    }

    /// Oldest event
    ///
    /// # Errors
    /// * `QueueEmpty` when nothing is pending; callers check `pending()` first
    pub fn try_pop(&self) -> Result<Event> {
        self.queue.lock().pop_front().ok_or(FewerError::QueueEmpty)
    }

    /// Take every pending event in arrival order
    pub fn drain(&self) -> Vec<Event> {
        self.queue.lock().drain(..).collect()
    }
}
