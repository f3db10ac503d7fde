//! Scroll position over the displayed line sequence.
//!
//! The viewport keeps two cursors into its [`LineSequence`]: the top of the
//! view, and a read cursor that the renderer walks with `start`/`next` while
//! drawing a page. After a page is drawn the read cursor sits on the bottom
//! line, which is what `page_down` jumps to.
//!
//! An empty sequence means the viewport is unpositioned; every line-number
//! query then returns 0.

use crate::file_handler::LineNumber;
use crate::intersect::LineSequence;

#[derive(Debug, Clone)]
pub struct Viewport {
    sequence: LineSequence,
    top: usize,
    cursor: usize,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new()
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self {
            sequence: LineSequence::empty(),
            top: 0,
            cursor: 0,
        }
    }

    pub fn is_positioned(&self) -> bool {
        !self.sequence.is_empty()
    }

    /// Replace the displayed sequence, keeping the view near its old top line
    pub fn assign(&mut self, sequence: LineSequence) {
        let old_top = self.top_line_number();
        self.sequence = sequence;
        self.top = 0;
        self.cursor = 0;
        if old_top != 0 {
            self.go_to_approx(old_top);
        }
    }

    pub fn sequence(&self) -> &LineSequence {
        &self.sequence
    }

    /// Number of displayed lines
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Reset the read cursor to the top; false if there is nothing to show
    pub fn start(&mut self) -> bool {
        self.cursor = self.top;
        self.is_positioned()
    }

    pub fn next(&mut self) -> bool {
        if self.cursor + 1 >= self.sequence.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    pub fn prev(&mut self) -> bool {
        if self.cursor == 0 || !self.is_positioned() {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// Line under the read cursor, 0 when unpositioned
    pub fn current(&self) -> LineNumber {
        self.sequence.get(self.cursor).unwrap_or(0)
    }

    pub fn up(&mut self) {
        if self.top > 0 {
            self.top -= 1;
        }
    }

    pub fn down(&mut self) {
        if self.top + 1 < self.sequence.len() {
            self.top += 1;
        }
    }

    /// The bottom line of the last drawn page becomes the top
    pub fn page_down(&mut self) {
        if self.is_positioned() {
            self.top = self.cursor.max(self.top);
        }
    }

    /// Scroll back so the current top line ends up at the bottom of `rows`
    pub fn page_up(&mut self, rows: usize) {
        self.top = self.top.saturating_sub(rows.saturating_sub(1).max(1));
        self.cursor = self.top;
    }

    pub fn go_to_first(&mut self) {
        self.top = 0;
        self.cursor = 0;
    }

    /// Position so the last `rows` lines fill the view
    pub fn go_to_end(&mut self, rows: usize) {
        self.top = self.sequence.len().saturating_sub(rows.max(1));
        self.cursor = self.top;
    }

    /// Put line `n` at the top if it is displayed; otherwise do nothing
    pub fn go_to(&mut self, n: LineNumber) -> bool {
        match self.sequence.position(n) {
            Some(idx) => {
                self.top = idx;
                self.cursor = idx;
                true
            }
            None => false,
        }
    }

    /// Put the first displayed line `>= n` at the top, or the last line if
    /// every displayed line is smaller
    pub fn go_to_approx(&mut self, n: LineNumber) -> bool {
        if !self.is_positioned() {
            return false;
        }
        let idx = self.sequence.lower_bound(n).min(self.sequence.len() - 1);
        self.top = idx;
        self.cursor = idx;
        true
    }

    /// Jump to `percent` of the way through the displayed line numbers
    ///
    /// Values above 100 are clamped; 0 goes to the first line exactly.
    pub fn go_to_percent(&mut self, percent: u64) -> bool {
        if !self.is_positioned() {
            return false;
        }
        let percent = percent.min(100);
        if percent == 0 {
            self.go_to_first();
            return true;
        }
        let target = self.last_line_number() as u64 * percent / 100;
        self.go_to_approx(target as LineNumber)
    }

    pub fn top_line_number(&self) -> LineNumber {
        self.sequence.get(self.top).unwrap_or(0)
    }

    /// Line under the read cursor; the bottom line once a page is drawn
    pub fn bottom_line_number(&self) -> LineNumber {
        self.current()
    }

    pub fn last_line_number(&self) -> LineNumber {
        self.sequence.last().unwrap_or(0)
    }

    pub fn is_first_displayed(&self) -> bool {
        self.is_positioned() && self.top == 0
    }

    pub fn is_last_displayed(&self) -> bool {
        self.is_positioned() && self.cursor + 1 == self.sequence.len()
    }
}
