//! Progress reporting for long scans.
//!
//! `parse_all` and background filter scans report `(items_done, percent)`
//! periodically. Collaborators can render that as a transient indicator or
//! ignore it entirely.

use std::io::Write;

/// Receiver of periodic progress reports.
pub trait Progress {
    /// `done` counts lines processed so far, `percent` is in `0..=100`.
    fn progress(&mut self, done: u64, percent: u8);
}

impl<F> Progress for F
where
    F: FnMut(u64, u8),
{
    fn progress(&mut self, done: u64, percent: u8) {
        self(done, percent)
    }
}

/// Progress sink that discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn progress(&mut self, _done: u64, _percent: u8) {}
}

/// Writes `"<description><done> <percent>% "` on a single, rewritten line.
///
/// The line is blanked out again when the reporter is dropped.
pub struct WriterProgress<W: Write> {
    out: W,
    description: String,
    max_len: usize,
}

impl<W: Write> WriterProgress<W> {
    pub fn new(out: W, description: impl Into<String>) -> Self {
        Self {
            out,
            description: description.into(),
            max_len: 0,
        }
    }
}

impl WriterProgress<std::io::Stderr> {
    pub fn stderr(description: impl Into<String>) -> Self {
        Self::new(std::io::stderr(), description)
    }
}

impl<W: Write> Progress for WriterProgress<W> {
    fn progress(&mut self, done: u64, percent: u8) {
        let text = format!("{}{} {}% ", self.description, done, percent);
        self.max_len = self.max_len.max(text.len());
        // Progress output is best effort.
        let _ = write!(self.out, "\r{}", text);
        let _ = self.out.flush();
    }
}

impl<W: Write> Drop for WriterProgress<W> {
    fn drop(&mut self) {
        if self.max_len > 0 {
            let _ = write!(self.out, "\r{}\r", " ".repeat(self.max_len));
            let _ = self.out.flush();
        }
    }
}

/// Integer percentage of `part` in `whole`, clamped to `0..=100`.
pub fn percent_of(part: u64, whole: u64) -> u8 {
    if whole == 0 {
        return 100;
    }
    ((part.min(whole) as u128 * 100) / whole as u128) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_progress() {
        let mut seen = Vec::new();
        {
            let mut sink = |done: u64, percent: u8| seen.push((done, percent));
            sink.progress(10, 50);
        }
        assert_eq!(seen, vec![(10, 50)]);
    }

    #[test]
    fn test_writer_progress_clears_on_drop() {
        let mut buffer = Vec::new();
        {
            let mut p = WriterProgress::new(&mut buffer, "parsing line: ");
            p.progress(10_000, 42);
        }
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("\rparsing line: 10000 42% "));
        assert!(text.ends_with('\r'));
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(0, 200), 0);
        assert_eq!(percent_of(50, 200), 25);
        assert_eq!(percent_of(300, 200), 100);
        assert_eq!(percent_of(0, 0), 100);
    }
}
