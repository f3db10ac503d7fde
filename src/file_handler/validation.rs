//! File validation utilities for ensuring a path can be opened as a byte buffer.
//!
//! Checks run before any mapping is attempted so the user gets a precise
//! message instead of a generic mmap failure.

use crate::error::{FewerError, Result};
use std::fs::File;
use std::path::Path;

/// Validate that a file path is accessible and suitable for viewing
///
/// # Validations Performed
/// - Path exists and resolves to a regular file (not a directory)
/// - File is readable by the current process
///
/// Empty files pass: they simply index to zero lines.
///
/// # Returns
/// * The file size in bytes
pub fn validate_file_path(path: &Path) -> Result<u64> {
    let metadata = std::fs::metadata(path).map_err(|e| FewerError::file_access(path, e))?;

    if !metadata.is_file() {
        return Err(FewerError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    // Try to open the file to verify read permissions
    File::open(path).map_err(|e| FewerError::file_access(path, e))?;

    Ok(metadata.len())
}
