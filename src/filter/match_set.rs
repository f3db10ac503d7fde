//! Lines of a file matched by one filter.
//!
//! A match set is built either synchronously or on a dedicated worker thread.
//! The worker owns everything it needs (a shared handle to the index, its
//! filter, the abort signal and the event channel) and hands the finished set
//! to the UI thread through the channel.

use crate::event::{Event, EventChannel};
use crate::file_handler::{LineIndex, LineNumber, ScanOutcome};
use crate::filter::abort::{AbortSignal, ScanTicket};
use crate::filter::expression::Filter;
use crate::intersect::{Intersectable, LineSequence};
use crate::progress::Progress;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A filter together with the ascending line numbers it keeps
#[derive(Debug, Clone)]
pub struct PatternMatchSet {
    filter: Filter,
    matches: Arc<[LineNumber]>,
}

impl PatternMatchSet {
    /// Scan the whole file on the calling thread
    pub fn build(index: &LineIndex, filter: Filter, progress: &mut dyn Progress) -> Self {
        let abort = AbortSignal::new(1);
        let ticket = abort.begin(0);
        match Self::collect(index, filter.clone(), &abort, ticket, progress) {
            Some(set) => set,
            // nothing else holds this signal
            None => Self::from_matches(filter, Vec::new()),
        }
    }

    /// Scan `index`, or `None` if the scan was aborted first
    pub fn collect(
        index: &LineIndex,
        filter: Filter,
        abort: &AbortSignal,
        ticket: ScanTicket,
        progress: &mut dyn Progress,
    ) -> Option<Self> {
        let mut matches = Vec::new();
        let outcome = index.scan(abort, ticket, progress, |record, bytes| {
            if filter.is_match(bytes) {
                matches.push(record.number);
            }
        });

        match outcome {
            ScanOutcome::Completed => Some(Self::from_matches(filter, matches)),
            ScanOutcome::Aborted => None,
        }
    }

    /// Run [`PatternMatchSet::collect`] on a worker thread for `slot`
    ///
    /// Progress is pushed to `events` as [`Event::Info`] and the result as
    /// [`Event::FilterReady`]. Aborted scans push no result. A panic inside the
    /// scan is caught on the worker and reported as [`Event::FilterFailed`].
    ///
    /// # Errors
    /// * The worker thread could not be spawned
    pub fn spawn_background(
        index: Arc<LineIndex>,
        filter: Filter,
        slot: usize,
        ticket: ScanTicket,
        abort: Arc<AbortSignal>,
        events: Arc<EventChannel>,
    ) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("filter-{}", slot + 1))
            .spawn(move || {
                let text = filter.text().to_string();
                log::debug!("filter {}: scanning for {}", slot + 1, text);

                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    let mut progress = |done: u64, percent: u8| {
                        events.push(Event::Info(format!(
                            "filter {} {} : {} lines {}%",
                            slot + 1,
                            text,
                            done,
                            percent
                        )));
                    };
                    Self::collect(&index, filter, &abort, ticket, &mut progress)
                }));

                match result {
                    Ok(Some(matches)) => {
                        log::debug!(
                            "filter {}: {} matched {} lines",
                            slot + 1,
                            text,
                            matches.size()
                        );
                        events.push(Event::FilterReady {
                            slot,
                            ticket,
                            matches,
                        });
                    }
                    Ok(None) => log::debug!("filter {}: scan for {} aborted", slot + 1, text),
                    Err(payload) => {
                        let reason = payload
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| payload.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic".to_string());
                        log::warn!("filter {}: scan for {} failed: {}", slot + 1, text, reason);
                        events.push(Event::FilterFailed {
                            slot,
                            ticket,
                            text,
                            message: reason,
                        });
                    }
                }
            })
    }

    pub fn from_matches(filter: Filter, matches: Vec<LineNumber>) -> Self {
        Self {
            filter,
            matches: matches.into(),
        }
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Normalized expression text
    pub fn text(&self) -> &str {
        self.filter.text()
    }

    /// Number of matching lines
    pub fn size(&self) -> usize {
        self.matches.len()
    }

    pub fn sequence(&self) -> &[LineNumber] {
        &self.matches
    }
}

impl Intersectable for PatternMatchSet {
    fn line_sequence(&self) -> LineSequence {
        LineSequence::Only(Arc::clone(&self.matches))
    }
}
