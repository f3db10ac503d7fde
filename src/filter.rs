//! Regex filters over the line index.
//!
//! This module ties together expression parsing, match-set construction,
//! cancellation of background scans and the slot table the UI edits.

pub mod abort;
pub mod expression;
pub mod match_set;
pub mod slots;

pub use abort::{AbortSignal, ScanTicket};
pub use expression::{normalize, Filter, Flags};
pub use match_set::PatternMatchSet;
pub use slots::{FilterSlots, Handled, SlotState, SlotUpdate, MAX_FILTER_SLOTS};
