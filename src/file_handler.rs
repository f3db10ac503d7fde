//! File access: an immutable byte view of the input and a lazily built line index over it.
//!
//! Small files are read into memory, larger ones are memory-mapped. The
//! [`LineIndex`] is shared between the UI thread and background filter scans.

pub mod byte_buffer;
pub mod line_index;
pub mod validation;

pub use byte_buffer::ByteBuffer;
pub use line_index::{LineIndex, LineNumber, LineRecord, Lines, ScanOutcome};
pub use validation::validate_file_path;
