//! Error types and handling infrastructure for rfewer.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! custom error types. The binary layers `anyhow` on top for context.
//!
//! ## Error classes
//!
//! - **Fatal**: the byte buffer could not be opened ([`FewerError::FileAccess`],
//!   [`FewerError::NotAFile`]); the process exits with [`FewerError::exit_status`]
//! - **Recovered locally**: [`FewerError::LineNotFound`] and
//!   [`FewerError::PatternCompile`] are surfaced as status text
//! - **Defects**: [`FewerError::QueueEmpty`] means a caller popped the event
//!   channel without checking `pending()` first

use std::path::PathBuf;
use thiserror::Error;

/// Exit status for a missing or unreadable input file (sysexits `EX_NOINPUT`).
pub const EXIT_NO_INPUT: i32 = 66;

/// Exit status for bad command-line usage (sysexits `EX_USAGE`).
pub const EXIT_USAGE: i32 = 64;

/// The main error type for rfewer operations.
#[derive(Error, Debug)]
pub enum FewerError {
    /// The file could not be opened, read or mapped
    #[error("Cannot access file {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Path exists but is not a regular file
    #[error("Path is not a regular file: {path}")]
    NotAFile { path: PathBuf },

    /// Requested line lies beyond the end of the file
    #[error("Line {line} not found")]
    LineNotFound { line: u64 },

    /// Malformed filter or search expression
    #[error("{expression} : {message}")]
    PatternCompile { expression: String, message: String },

    /// The event channel was popped while empty
    #[error("Event queue is empty")]
    QueueEmpty,

    /// Filter slot index outside the slot table
    #[error("Filter slot {slot} out of range (maximum {max})")]
    SlotOutOfRange { slot: usize, max: usize },

    /// Configuration file could not be parsed
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid command line arguments
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

/// Standard Result type for rfewer operations.
pub type Result<T> = std::result::Result<T, FewerError>;

impl FewerError {
    /// Create a FileAccess error for `path`
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }

    /// Create a LineNotFound error
    pub fn line_not_found(line: u64) -> Self {
        Self::LineNotFound { line }
    }

    /// Create a PatternCompile error for the (possibly normalized) expression text
    pub fn pattern_compile(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PatternCompile {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Create a Config error with a descriptive message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an InvalidArgument error with a descriptive message
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Process exit status used when this error terminates the program
    pub fn exit_status(&self) -> i32 {
        match self {
            Self::FileAccess { .. } | Self::NotAFile { .. } => EXIT_NO_INPUT,
            Self::InvalidArgument { .. } | Self::Config { .. } | Self::SlotOutOfRange { .. } => {
                EXIT_USAGE
            }
            _ => 1,
        }
    }

    /// Short message shown inline next to a filter slot or in the status row
    pub fn status_text(&self) -> String {
        match self {
            Self::PatternCompile { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

// Automatic conversion from io::Error when no path is known at the call site
impl From<std::io::Error> for FewerError {
    fn from(err: std::io::Error) -> Self {
        Self::FileAccess {
            path: PathBuf::new(),
            source: err,
        }
    }
}
