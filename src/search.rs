//! Incremental search within the displayed lines.
//!
//! A search pattern uses the filter expression grammar. Searching walks the
//! viewport's sequence from the top line (exclusive) and moves the top onto the
//! first match. Only displayed lines are searched, so a search never lands on
//! a line hidden by a filter.

use crate::error::Result;
use crate::file_handler::LineIndex;
use crate::filter::Filter;
use crate::viewport::Viewport;

/// Direction of travel through the displayed lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    Forward,
    Backward,
}

/// A compiled search expression; the `!` flag finds non-matching lines
#[derive(Debug, Clone)]
pub struct SearchPattern {
    filter: Filter,
}

impl SearchPattern {
    pub fn compile(text: &str) -> Result<Self> {
        Ok(Self {
            filter: Filter::compile(text)?,
        })
    }

    /// Normalized expression text
    pub fn text(&self) -> &str {
        self.filter.text()
    }

    pub fn is_match(&self, line: &[u8]) -> bool {
        self.filter.is_match(line)
    }
}

/// Move the view top to the next displayed line matching `pattern`
///
/// # Returns
/// * `false` when no later line matches; the view is left where it was
pub fn search_next(pattern: &SearchPattern, viewport: &mut Viewport, index: &LineIndex) -> Result<bool> {
    search(pattern, viewport, index, SearchDirection::Forward)
}

/// Move the view top to the previous displayed line matching `pattern`
pub fn search_prev(pattern: &SearchPattern, viewport: &mut Viewport, index: &LineIndex) -> Result<bool> {
    search(pattern, viewport, index, SearchDirection::Backward)
}

pub fn search(
    pattern: &SearchPattern,
    viewport: &mut Viewport,
    index: &LineIndex,
    direction: SearchDirection,
) -> Result<bool> {
    if !viewport.start() {
        return Ok(false);
    }

    loop {
        let moved = match direction {
            SearchDirection::Forward => viewport.next(),
            SearchDirection::Backward => viewport.prev(),
        };
        if !moved {
            break;
        }

        let n = viewport.current();
        let record = index.line(n)?;
        if pattern.is_match(index.line_bytes(&record)) {
            return Ok(viewport.go_to(n));
        }
    }

    viewport.start();
    Ok(false)
}
