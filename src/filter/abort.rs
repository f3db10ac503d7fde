//! Cooperative cancellation for background scans.
//!
//! Every slot has a generation counter. Starting a scan bumps the counter and
//! hands out a [`ScanTicket`] carrying the new value; a scan whose ticket no
//! longer matches its slot's counter has been superseded and stops at its next
//! check. A separate flag aborts every scan at once (used on shutdown).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Identifies one background scan of one filter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTicket {
    slot: usize,
    generation: u64,
}

impl ScanTicket {
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// Shared abort signal with "abort everything" and "abort one slot" scopes.
#[derive(Debug)]
pub struct AbortSignal {
    all: AtomicBool,
    generations: Vec<AtomicU64>,
}

impl AbortSignal {
    /// Signal covering `slots` independent filter slots
    pub fn new(slots: usize) -> Self {
        Self {
            all: AtomicBool::new(false),
            generations: (0..slots.max(1)).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Abort whatever is running for `slot` and return a ticket for a new scan.
    ///
    /// # Panics
    /// If `slot` is outside the range given to [`AbortSignal::new`].
    pub fn begin(&self, slot: usize) -> ScanTicket {
        let generation = self.generations[slot].fetch_add(1, Ordering::AcqRel) + 1;
        ScanTicket { slot, generation }
    }

    /// Abort the scan currently running for `slot`, if any
    pub fn abort_slot(&self, slot: usize) {
        if let Some(counter) = self.generations.get(slot) {
            counter.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Abort every scan, current and future
    pub fn abort_all(&self) {
        self.all.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self, ticket: ScanTicket) -> bool {
        if self.all.load(Ordering::Acquire) {
            return true;
        }
        self.generations
            .get(ticket.slot)
            .map_or(true, |counter| counter.load(Ordering::Acquire) != ticket.generation)
    }
}
