//! # rfewer - Filtering Pager for Large Text Files
//!
//! A viewer for very large text files that narrows the visible lines through up
//! to 22 regex filters at once. Filters are matched on background threads while
//! the view stays responsive; the lines shown are the intersection of every
//! finished filter.
//!
//! ## Features
//!
//! - **Lazy Line Index**: lines are indexed on demand over a memory-mapped buffer
//! - **Background Filters**: each filter scans the file on its own thread and can
//!   be cancelled by editing it again
//! - **Set Intersection**: k-way merge of the ascending match sequences
//! - **Stable Scrolling**: the view stays near its old position when filters change
//!
//! ## Architecture
//!
//! - [`error`] - Centralized error types and handling
//! - [`file_handler`] - Byte buffer and concurrent line index
//! - [`filter`] - Filter expressions, match sets, cancellation and the slot table
//! - [`intersect`] - Intersection of line-number sequences
//! - [`viewport`] - Scroll position over the displayed lines
//! - [`event`] - Channel from background workers to the UI thread
//! - [`search`] - Search within the displayed lines
//! - [`app`] - Session coordination

// Core modules
pub mod config;
pub mod error;
pub mod file_handler;
pub mod progress;

// Filtering engine
pub mod event;
pub mod filter;
pub mod intersect;
pub mod viewport;

// Core components
pub mod app;
pub mod search;

// Re-export commonly used types for convenience
pub use error::{FewerError, Result};

// Public API surface for external usage
pub use app::{PageLine, Session};
pub use config::Settings;
pub use file_handler::{LineIndex, LineNumber};
pub use filter::{Filter, PatternMatchSet, MAX_FILTER_SLOTS};
pub use viewport::Viewport;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
