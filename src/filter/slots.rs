//! The table of filter slots owned by the UI thread.
//!
//! Each slot holds one filter expression. Setting a slot compiles the
//! expression synchronously (bad input is rejected before any work starts),
//! then either reuses a cached match set, joins a scan another slot already
//! runs for the same expression, or starts a background scan. Finished scans
//! come back through the [`EventChannel`] and are accepted only by slots still
//! waiting on that scan's ticket.

use crate::error::{FewerError, Result};
use crate::event::{Event, EventChannel};
use crate::file_handler::LineIndex;
use crate::filter::abort::{AbortSignal, ScanTicket};
use crate::filter::expression::{normalize, Filter};
use crate::filter::match_set::PatternMatchSet;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Number of independently editable filter slots
pub const MAX_FILTER_SLOTS: usize = 22;

/// State of one filter slot
#[derive(Debug, Clone)]
pub enum SlotState {
    Empty,

    /// Waiting on the background scan `ticket` for `text`; the scan may be
    /// owned by another slot holding the same expression
    Pending { text: String, ticket: ScanTicket },

    Ready(Arc<PatternMatchSet>),

    /// `text` failed to compile
    Invalid { text: String, message: String },
}

impl SlotState {
    /// Normalized expression held by the slot, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            SlotState::Empty => None,
            SlotState::Pending { text, .. } | SlotState::Invalid { text, .. } => Some(text),
            SlotState::Ready(set) => Some(set.text()),
        }
    }
}

/// What [`FilterSlots::set`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotUpdate {
    /// Empty input emptied the slot
    Cleared,
    /// The slot already held this expression
    Unchanged,
    /// A cached match set was reused; the slot is ready now
    Cached,
    /// The slot now waits on a background scan
    Started,
    /// The expression did not compile; carries the short message
    Rejected(String),
}

/// What [`FilterSlots::handle_event`] did with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// Status text for the info row
    Info(String),
    /// A slot became ready; the visible line set must be recomputed
    FilterReady(usize),
    /// The result belonged to an expression the slot no longer holds
    Stale,
}

/// Filter slot table plus the cache of completed match sets
pub struct FilterSlots {
    slots: Vec<SlotState>,
    cache: LruCache<String, Arc<PatternMatchSet>>,
    index: Arc<LineIndex>,
    abort: Arc<AbortSignal>,
    events: Arc<EventChannel>,
}

impl FilterSlots {
    pub fn new(index: Arc<LineIndex>, events: Arc<EventChannel>, cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: vec![SlotState::Empty; MAX_FILTER_SLOTS],
            cache: LruCache::new(capacity),
            index,
            abort: Arc::new(AbortSignal::new(MAX_FILTER_SLOTS)),
            events,
        }
    }

    /// Put the expression `raw` into `slot`
    ///
    /// Invalid expressions leave the slot in [`SlotState::Invalid`] and are
    /// reported as [`SlotUpdate::Rejected`], not as an error. An expression
    /// another slot is already scanning for waits on that scan.
    ///
    /// # Errors
    /// * `SlotOutOfRange` when `slot >= MAX_FILTER_SLOTS`
    pub fn set(&mut self, slot: usize, raw: &str) -> Result<SlotUpdate> {
        self.check_slot(slot)?;

        let text = normalize(raw);
        if text.is_empty() {
            self.clear(slot)?;
            return Ok(SlotUpdate::Cleared);
        }
        if self.slots[slot].text() == Some(text.as_str()) {
            return Ok(SlotUpdate::Unchanged);
        }

        // whatever was running for the old expression is now stale
        self.release(slot);

        if let Some(set) = self.cache.get(&text) {
            log::debug!("found regex in cache: {}", text);
            self.slots[slot] = SlotState::Ready(Arc::clone(set));
            return Ok(SlotUpdate::Cached);
        }

        if let Some(ticket) = self.running_scan(&text) {
            log::debug!(
                "filter {}: joining scan of filter {} for {}",
                slot + 1,
                ticket.slot() + 1,
                text
            );
            self.slots[slot] = SlotState::Pending { text, ticket };
            return Ok(SlotUpdate::Started);
        }

        match Filter::compile(&text) {
            Ok(filter) => Ok(self.start_scan(slot, filter)),
            Err(e) => {
                let message = e.status_text();
                log::debug!("filter {}: rejected {}: {}", slot + 1, text, message);
                self.slots[slot] = SlotState::Invalid {
                    text,
                    message: message.clone(),
                };
                Ok(SlotUpdate::Rejected(message))
            }
        }
    }

    /// Empty `slot`, aborting its scan if one is running
    pub fn clear(&mut self, slot: usize) -> Result<()> {
        self.check_slot(slot)?;
        self.release(slot);
        Ok(())
    }

    /// Apply one event popped from the channel
    pub fn handle_event(&mut self, event: Event) -> Handled {
        match event {
            Event::Info(text) => Handled::Info(text),
            Event::FilterReady {
                slot,
                ticket,
                matches,
            } => {
                let set = Arc::new(matches);
                self.cache.put(set.text().to_string(), Arc::clone(&set));

                let waiting = self.waiting_on(ticket);
                if waiting.is_empty() {
                    log::debug!(
                        "filter {}: dropping stale result for {}",
                        slot + 1,
                        set.text()
                    );
                    return Handled::Stale;
                }
                for &waiter in &waiting {
                    self.slots[waiter] = SlotState::Ready(Arc::clone(&set));
                }
                Handled::FilterReady(slot)
            }
            Event::FilterFailed {
                slot,
                ticket,
                text,
                message,
            } => {
                let waiting = self.waiting_on(ticket);
                if waiting.is_empty() {
                    return Handled::Stale;
                }
                for &waiter in &waiting {
                    self.slots[waiter] = SlotState::Invalid {
                        text: text.clone(),
                        message: message.clone(),
                    };
                }
                Handled::Info(format!("filter {} {} failed: {}", slot + 1, text, message))
            }
        }
    }

    pub fn state(&self, slot: usize) -> Option<&SlotState> {
        self.slots.get(slot)
    }

    /// Completed match sets in slot order; pending and invalid slots are skipped
    pub fn active_sets(&self) -> Vec<Arc<PatternMatchSet>> {
        self.slots
            .iter()
            .filter_map(|state| match state {
                SlotState::Ready(set) => Some(Arc::clone(set)),
                _ => None,
            })
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        self.slots
            .iter()
            .any(|state| matches!(state, SlotState::Pending { .. }))
    }

    /// Slots holding an expression, with its normalized text
    pub fn expressions(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, state)| state.text().map(|text| (slot, text)))
    }

    /// Status text shown next to a slot
    pub fn describe(&self, slot: usize) -> Option<String> {
        let text = match self.slots.get(slot)? {
            SlotState::Empty => return None,
            SlotState::Pending { text, .. } => format!("{} (pending)", text),
            SlotState::Ready(set) => {
                let plural = if set.size() == 1 { "" } else { "es" };
                format!("{} ({} match{})", set.text(), set.size(), plural)
            }
            SlotState::Invalid { text, message } => format!("{} : {}", text, message),
        };
        Some(text)
    }

    /// Start a background scan owned by `slot`
    fn start_scan(&mut self, slot: usize, filter: Filter) -> SlotUpdate {
        let text = filter.text().to_string();
        let ticket = self.abort.begin(slot);
        let spawned = PatternMatchSet::spawn_background(
            Arc::clone(&self.index),
            filter,
            slot,
            ticket,
            Arc::clone(&self.abort),
            Arc::clone(&self.events),
        );

        match spawned {
            Ok(_) => {
                self.slots[slot] = SlotState::Pending { text, ticket };
                SlotUpdate::Started
            }
            Err(e) => {
                let message = format!("cannot start background scan: {}", e);
                log::warn!("filter {}: {}", slot + 1, message);
                self.slots[slot] = SlotState::Invalid {
                    text,
                    message: message.clone(),
                };
                SlotUpdate::Rejected(message)
            }
        }
    }

    /// Empty `slot`; a scan it owned moves to the first slot still waiting on it
    fn release(&mut self, slot: usize) {
        let owned = match &self.slots[slot] {
            SlotState::Pending { ticket, .. } if ticket.slot() == slot => Some(*ticket),
            _ => None,
        };
        self.abort.abort_slot(slot);
        self.slots[slot] = SlotState::Empty;

        let Some(ticket) = owned else { return };
        let waiting = self.waiting_on(ticket);
        let Some((&heir, rest)) = waiting.split_first() else {
            return;
        };
        let text = self.slots[heir].text().unwrap_or_default().to_string();
        log::debug!("filter {}: taking over scan for {}", heir + 1, text);

        match Filter::compile(&text) {
            Ok(filter) => {
                self.start_scan(heir, filter);
            }
            Err(e) => {
                self.slots[heir] = SlotState::Invalid {
                    text,
                    message: e.status_text(),
                }
            }
        }
        let state = self.slots[heir].clone();
        for &other in rest {
            self.slots[other] = state.clone();
        }
    }

    /// Ticket of a scan already running for `text`
    fn running_scan(&self, text: &str) -> Option<ScanTicket> {
        self.slots.iter().find_map(|state| match state {
            SlotState::Pending { text: pending, ticket } if pending == text => Some(*ticket),
            _ => None,
        })
    }

    /// Slots waiting on the scan identified by `ticket`
    fn waiting_on(&self, ticket: ScanTicket) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, state)| match state {
                SlotState::Pending { ticket: t, .. } if *t == ticket => Some(slot),
                _ => None,
            })
            .collect()
    }

    fn check_slot(&self, slot: usize) -> Result<()> {
        if slot >= self.slots.len() {
            return Err(FewerError::SlotOutOfRange {
                slot,
                max: self.slots.len(),
            });
        }
        Ok(())
    }
}

impl Drop for FilterSlots {
    fn drop(&mut self) {
        self.abort.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn slots_over(data: &str) -> (FilterSlots, Arc<EventChannel>) {
        let index = Arc::new(LineIndex::from_bytes(data.to_string()));
        let events = Arc::new(EventChannel::new());
        (FilterSlots::new(index, Arc::clone(&events), 8), events)
    }

    /// Feed events to the table until no slot is pending
    fn settle(slots: &mut FilterSlots, events: &EventChannel) -> Vec<Handled> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut handled = Vec::new();
        while slots.has_pending() {
            assert!(Instant::now() < deadline, "filters never became ready");
            while events.pending() {
                handled.push(slots.handle_event(events.try_pop().unwrap()));
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        handled
    }

    #[test]
    fn test_set_starts_scan_and_becomes_ready() {
        let (mut slots, events) = slots_over("alpha\nbeta\nalphabet\n");

        assert_eq!(slots.set(0, "alpha").unwrap(), SlotUpdate::Started);
        assert!(slots.has_pending());
        assert_eq!(slots.describe(0).as_deref(), Some("/alpha/ (pending)"));

        let handled = settle(&mut slots, &events);
        assert!(handled.contains(&Handled::FilterReady(0)));

        let active = slots.active_sets();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].sequence(), &[1, 3]);
        assert_eq!(slots.describe(0).as_deref(), Some("/alpha/ (2 matches)"));
    }

    #[test]
    fn test_cache_hit_is_immediately_ready() {
        let (mut slots, events) = slots_over("one\ntwo\nthree\n");
        slots.set(0, "t").unwrap();
        settle(&mut slots, &events);

        assert_eq!(slots.set(1, "/t/").unwrap(), SlotUpdate::Cached);
        assert!(!slots.has_pending());
        assert!(matches!(slots.state(1), Some(SlotState::Ready(_))));

        let active = slots.active_sets();
        assert!(Arc::ptr_eq(&active[0], &active[1]));
    }

    #[test]
    fn test_same_text_is_unchanged() {
        let (mut slots, events) = slots_over("x\n");
        slots.set(2, "x").unwrap();
        assert_eq!(slots.set(2, "/x/").unwrap(), SlotUpdate::Unchanged);
        settle(&mut slots, &events);
    }

    #[test]
    fn test_invalid_expression_is_rejected_without_scanning() {
        let (mut slots, events) = slots_over("x\n");

        let update = slots.set(0, "/a/bcd").unwrap();
        assert_eq!(
            update,
            SlotUpdate::Rejected("invalid regular expression flags character: b".into())
        );
        assert!(!slots.has_pending());
        assert!(slots.active_sets().is_empty());
        assert_eq!(
            slots.describe(0).as_deref(),
            Some("/a/bcd : invalid regular expression flags character: b")
        );
        assert!(!events.pending());
    }

    #[test]
    fn test_empty_text_clears_slot() {
        let (mut slots, events) = slots_over("x\n");
        slots.set(0, "x").unwrap();
        settle(&mut slots, &events);

        assert_eq!(slots.set(0, "").unwrap(), SlotUpdate::Cleared);
        assert!(matches!(slots.state(0), Some(SlotState::Empty)));
        assert_eq!(slots.describe(0), None);
    }

    #[test]
    fn test_stale_result_is_dropped() {
        let (mut slots, _events) = slots_over("a\nb\n");
        let index = LineIndex::from_bytes("a\nb\n");
        let stale = PatternMatchSet::build(
            &index,
            Filter::compile("b").unwrap(),
            &mut crate::progress::NoProgress,
        );

        let superseded = slots.abort.begin(0);
        slots.slots[0] = SlotState::Pending {
            text: "/a/".into(),
            ticket: slots.abort.begin(0),
        };
        let handled = slots.handle_event(Event::FilterReady {
            slot: 0,
            ticket: superseded,
            matches: stale,
        });

        assert_eq!(handled, Handled::Stale);
        assert!(matches!(slots.state(0), Some(SlotState::Pending { .. })));
        // the result is still valid for its own expression
        assert_eq!(slots.set(1, "b").unwrap(), SlotUpdate::Cached);
    }

    #[test]
    fn test_failed_scan_marks_slot_invalid() {
        let (mut slots, _events) = slots_over("a\n");
        let ticket = slots.abort.begin(4);
        slots.slots[4] = SlotState::Pending {
            text: "/a/".into(),
            ticket,
        };

        let handled = slots.handle_event(Event::FilterFailed {
            slot: 4,
            ticket,
            text: "/a/".into(),
            message: "boom".into(),
        });

        assert_eq!(handled, Handled::Info("filter 5 /a/ failed: boom".into()));
        assert!(!slots.has_pending());
        assert_eq!(slots.describe(4).as_deref(), Some("/a/ : boom"));
    }

    #[test]
    fn test_trailing_backslash_settles() {
        let (mut slots, events) = slots_over("a\\\nab\n");

        assert_eq!(slots.set(0, "a\\").unwrap(), SlotUpdate::Started);
        assert_eq!(slots.describe(0).as_deref(), Some("/a\\\\/ (pending)"));

        let handled = settle(&mut slots, &events);
        assert!(handled.contains(&Handled::FilterReady(0)));
        assert_eq!(slots.active_sets()[0].sequence(), &[1]);
    }

    #[test]
    fn test_same_expression_joins_running_scan() {
        let (mut slots, events) = slots_over("a\nb\nab\n");

        assert_eq!(slots.set(0, "b").unwrap(), SlotUpdate::Started);
        assert_eq!(slots.set(1, "/b/").unwrap(), SlotUpdate::Started);
        let owner = match (slots.state(0), slots.state(1)) {
            (
                Some(SlotState::Pending { ticket: first, .. }),
                Some(SlotState::Pending { ticket: second, .. }),
            ) => {
                assert_eq!(first, second);
                *first
            }
            other => panic!("both slots should wait on one scan, got {other:?}"),
        };
        assert_eq!(owner.slot(), 0);

        let handled = settle(&mut slots, &events);
        let ready = handled
            .iter()
            .filter(|h| matches!(h, Handled::FilterReady(_)))
            .count();
        assert_eq!(ready, 1);

        let active = slots.active_sets();
        assert_eq!(active.len(), 2);
        assert!(Arc::ptr_eq(&active[0], &active[1]));
        assert_eq!(active[0].sequence(), &[2, 3]);
    }

    #[test]
    fn test_clearing_scan_owner_hands_scan_to_waiting_slot() {
        let (mut slots, events) = slots_over("a\nb\nab\n");
        slots.set(0, "b").unwrap();
        slots.set(2, "b").unwrap();

        slots.clear(0).unwrap();
        match slots.state(2) {
            Some(SlotState::Pending { ticket, .. }) => assert_eq!(ticket.slot(), 2),
            other => panic!("slot 2 should own a new scan, got {other:?}"),
        }

        settle(&mut slots, &events);
        assert!(matches!(slots.state(0), Some(SlotState::Empty)));
        assert_eq!(slots.describe(2).as_deref(), Some("/b/ (2 matches)"));
    }

    #[test]
    fn test_resetting_running_slot_discards_first_result() {
        let data: String = (1..=200_000).map(|i| format!("{i}\n")).collect();
        let (mut slots, events) = slots_over(&data);

        assert_eq!(slots.set(0, "/^1/").unwrap(), SlotUpdate::Started);
        assert_eq!(slots.set(0, "/^2000/").unwrap(), SlotUpdate::Started);
        settle(&mut slots, &events);

        // an already finished first scan may still report late
        std::thread::sleep(Duration::from_millis(50));
        for event in events.drain() {
            assert!(!matches!(slots.handle_event(event), Handled::FilterReady(_)));
        }

        match slots.state(0) {
            Some(SlotState::Ready(set)) => {
                assert_eq!(set.text(), "/^2000/");
                assert_eq!(set.sequence().len(), 12);
            }
            other => panic!("expected the second expression, got {other:?}"),
        }
        assert_eq!(slots.active_sets().len(), 1);
    }

    #[test]
    fn test_info_events_pass_through() {
        let (mut slots, _events) = slots_over("");
        assert_eq!(
            slots.handle_event(Event::Info("hello".into())),
            Handled::Info("hello".into())
        );
    }

    #[test]
    fn test_slot_out_of_range() {
        let (mut slots, _events) = slots_over("x\n");
        assert!(matches!(
            slots.set(MAX_FILTER_SLOTS, "x"),
            Err(FewerError::SlotOutOfRange { slot: 22, max: 22 })
        ));
        assert!(slots.clear(99).is_err());
    }

    #[test]
    fn test_expressions_lists_filled_slots() {
        let (mut slots, events) = slots_over("x\n");
        slots.set(0, "x").unwrap();
        slots.set(3, "!y").unwrap();
        settle(&mut slots, &events);

        let listed: Vec<_> = slots.expressions().collect();
        assert_eq!(listed, vec![(0, "/x/"), (3, "/y/!")]);
    }
}
