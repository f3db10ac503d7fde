//! Lazily built, concurrently readable table of line boundaries
//!
//! The index owns the [`ByteBuffer`] and grows an append-only table of
//! [`LineRecord`]s as lines are requested. Any number of threads may read it
//! while one of them extends it:
//!
//! - extension is serialized by the parse cursor mutex (single writer)
//! - records are appended in batches under a short write lock
//! - the published line count is an atomic stored *after* the records are in
//!   place, so a reader that observes `size() >= n` always finds record `n`
//!
//! Newlines are located with memchr. Line 0 is a sentinel record that is never
//! returned to callers; real lines are numbered from 1.

use crate::error::{FewerError, Result};
use crate::file_handler::byte_buffer::ByteBuffer;
use crate::filter::abort::{AbortSignal, ScanTicket};
use crate::intersect::{Intersectable, LineSequence};
use crate::progress::{percent_of, Progress};
use bstr::ByteSlice;
use memchr::memchr;
use parking_lot::{Mutex, RwLock};
use std::borrow::Cow;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// 1-based line number; 0 is reserved for "no line"
pub type LineNumber = u32;

/// Lines appended per write-lock acquisition when extending the index
const PARSE_BATCH: usize = 4096;

/// Records copied out per read-lock acquisition by [`Lines`]
const ITER_BATCH: usize = 1024;

/// Boundaries of one line inside the byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRecord {
    /// Offset of the first byte of the line
    pub start: u64,

    /// Offset one past the last content byte; the terminator (`\n` or `\r\n`)
    /// is excluded
    pub content_end: u64,

    /// Offset where the following line starts, `None` for the last line
    pub next_start: Option<u64>,

    /// 1-based line number
    pub number: LineNumber,
}

impl LineRecord {
    const SENTINEL: LineRecord = LineRecord {
        start: 0,
        content_end: 0,
        next_start: Some(0),
        number: 0,
    };

    /// Content length in bytes, terminator excluded
    pub fn len(&self) -> u64 {
        self.content_end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.content_end == self.start
    }
}

/// Outcome of a [`LineIndex::scan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every line was visited
    Completed,
    /// The abort signal fired before the end of the file
    Aborted,
}

/// Where the next extension of the index resumes
#[derive(Debug)]
struct ParseCursor {
    next_start: u64,
    done: bool,
}

/// Concurrent line index over an immutable byte buffer
#[derive(Debug)]
pub struct LineIndex {
    buffer: ByteBuffer,

    /// `records[0]` is the sentinel, `records[n]` describes line `n`
    records: RwLock<Vec<LineRecord>>,

    /// Number of real lines whose records are visible to readers
    published: AtomicUsize,

    /// Bytes covered by the published records
    parsed_bytes: AtomicU64,

    fully_parsed: AtomicBool,

    /// Held by whichever thread is extending the table
    cursor: Mutex<ParseCursor>,

    progress_interval: u32,
}

impl LineIndex {
    /// Lines between progress reports and abort checks
    pub const DEFAULT_PROGRESS_INTERVAL: u32 = 10_000;

    /// Build an (unparsed) index over `buffer`
    pub fn new(buffer: ByteBuffer) -> Self {
        Self::with_progress_interval(buffer, Self::DEFAULT_PROGRESS_INTERVAL)
    }

    pub fn with_progress_interval(buffer: ByteBuffer, progress_interval: u32) -> Self {
        let done = buffer.is_empty();
        Self {
            buffer,
            records: RwLock::new(vec![LineRecord::SENTINEL]),
            published: AtomicUsize::new(0),
            parsed_bytes: AtomicU64::new(0),
            fully_parsed: AtomicBool::new(done),
            cursor: Mutex::new(ParseCursor {
                next_start: 0,
                done,
            }),
            progress_interval: progress_interval.max(1),
        }
    }

    /// Open `path` and index it lazily
    ///
    /// # Errors
    /// * `FileAccess` / `NotAFile` when the file cannot be opened
    pub fn open(path: impl AsRef<Path>, in_memory_threshold: u64) -> Result<Self> {
        Ok(Self::new(ByteBuffer::open(path, in_memory_threshold)?))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(ByteBuffer::from_bytes(bytes))
    }

    pub fn buffer(&self) -> &ByteBuffer {
        &self.buffer
    }

    /// Number of lines parsed so far
    pub fn size(&self) -> usize {
        self.published.load(Ordering::Acquire)
    }

    pub fn is_fully_parsed(&self) -> bool {
        self.fully_parsed.load(Ordering::Acquire)
    }

    /// Percentage of the buffer's bytes covered by parsed lines
    pub fn parsed_percent(&self) -> u8 {
        percent_of(self.parsed_bytes.load(Ordering::Acquire), self.buffer.len())
    }

    /// Make sure lines `1..=n` are parsed
    ///
    /// # Returns
    /// * `false` if the file has fewer than `n` lines
    ///
    /// # Performance
    /// * Only the region past the current parse position is scanned
    /// * Readers are blocked only while a batch of records is appended
    pub fn parse_through(&self, n: LineNumber) -> bool {
        let wanted = n as usize;
        if wanted <= self.size() {
            return true;
        }
        if self.is_fully_parsed() {
            return false;
        }

        let mut cursor = self.cursor.lock();
        // another thread may have done the work while we waited for the cursor
        while self.size() < wanted && !cursor.done {
            let missing = wanted - self.size();
            self.parse_batch(&mut cursor, missing.min(PARSE_BATCH));
        }
        self.size() >= wanted
    }

    /// Parse the whole file, reporting `(lines_done, percent_of_bytes)` every
    /// progress interval. No-op if already fully parsed.
    pub fn parse_all(&self, progress: &mut dyn Progress) {
        if self.is_fully_parsed() {
            return;
        }

        let interval = self.progress_interval as usize;
        loop {
            let target = (self.size() + interval).min(LineNumber::MAX as usize) as LineNumber;
            let more = self.parse_through(target);
            progress.progress(self.size() as u64, self.parsed_percent());
            if !more || self.is_fully_parsed() {
                break;
            }
        }

        log::debug!(
            "indexed {} lines ({} bytes)",
            self.size(),
            self.buffer.len()
        );
    }

    /// Record for line `n`, parsing up to it if needed
    ///
    /// # Errors
    /// * `LineNotFound` for line 0 or a line past the end of the file
    pub fn line(&self, n: LineNumber) -> Result<LineRecord> {
        if n == 0 || !self.parse_through(n) {
            return Err(FewerError::line_not_found(n as u64));
        }
        Ok(self.records.read()[n as usize])
    }

    /// Content bytes of a record, terminator excluded
    pub fn line_bytes(&self, record: &LineRecord) -> &[u8] {
        self.buffer.slice(record.start, record.content_end)
    }

    /// Content of line `n` as text; invalid UTF-8 is replaced
    pub fn line_text(&self, n: LineNumber) -> Result<Cow<'_, str>> {
        let record = self.line(n)?;
        Ok(self.line_bytes(&record).to_str_lossy())
    }

    /// Sequence of every line parsed so far, `1..=size()`
    pub fn line_numbers(&self) -> LineSequence {
        LineSequence::All(self.size() as LineNumber)
    }

    /// Forward iterator over all lines, parsing lazily
    pub fn iter(&self) -> Lines<'_> {
        Lines {
            index: self,
            next: 1,
            batch: Vec::new(),
            pos: 0,
        }
    }

    /// Visit every line in order, parsing as needed
    ///
    /// Every progress interval the abort signal is checked for `ticket` and
    /// `(lines_done, percent_of_bytes)` is reported.
    pub fn scan<V>(
        &self,
        abort: &AbortSignal,
        ticket: ScanTicket,
        progress: &mut dyn Progress,
        mut visit: V,
    ) -> ScanOutcome
    where
        V: FnMut(&LineRecord, &[u8]),
    {
        let chunk = self.progress_interval as usize;
        let total = self.buffer.len();
        let mut next = 1usize;

        loop {
            if abort.is_aborted(ticket) {
                return ScanOutcome::Aborted;
            }

            let last = (next + chunk - 1).min(LineNumber::MAX as usize);
            self.parse_through(last as LineNumber);
            let available = self.size().min(last);
            if next > available {
                break;
            }

            let mut covered = 0;
            for record in self.records_range(next, available) {
                visit(&record, self.line_bytes(&record));
                covered = record.next_start.unwrap_or(total);
            }
            progress.progress(available as u64, percent_of(covered, total));

            if available < last {
                break;
            }
            next = available + 1;
        }

        ScanOutcome::Completed
    }

    /// Copy of records `first..=last`, clamped to what is published
    fn records_range(&self, first: usize, last: usize) -> Vec<LineRecord> {
        let last = last.min(self.size());
        if first > last {
            return Vec::new();
        }
        self.records.read()[first..=last].to_vec()
    }

    /// Parse up to `max_lines` lines past the cursor and publish them
    fn parse_batch(&self, cursor: &mut ParseCursor, max_lines: usize) {
        let bytes = self.buffer.as_bytes();
        let len = bytes.len();
        let mut number = self.size() as u64;
        let mut pos = cursor.next_start as usize;
        let mut batch = Vec::with_capacity(max_lines);

        while batch.len() < max_lines && pos < len {
            if number >= LineNumber::MAX as u64 {
                log::warn!(
                    "{} has more than {} lines, ignoring the rest",
                    self.buffer.path().display(),
                    LineNumber::MAX
                );
                pos = len;
                break;
            }
            number += 1;

            let (mut content_end, next) = match memchr(b'\n', &bytes[pos..]) {
                Some(offset) => (pos + offset, pos + offset + 1),
                // final fragment without a terminator is still a line
                None => (len, len),
            };
            if content_end > pos && bytes[content_end - 1] == b'\r' {
                content_end -= 1;
            }

            batch.push(LineRecord {
                start: pos as u64,
                content_end: content_end as u64,
                next_start: (next < len).then_some(next as u64),
                number: number as LineNumber,
            });
            pos = next;
        }

        cursor.next_start = pos as u64;
        cursor.done = pos >= len;

        {
            let mut records = self.records.write();
            records.extend_from_slice(&batch);
            self.parsed_bytes.store(pos as u64, Ordering::Release);
            self.published.store(records.len() - 1, Ordering::Release);
        }

        if cursor.done {
            self.fully_parsed.store(true, Ordering::Release);
        }
    }
}

impl Intersectable for LineIndex {
    fn line_sequence(&self) -> LineSequence {
        self.line_numbers()
    }
}

/// Forward iterator over the records of a [`LineIndex`]
pub struct Lines<'a> {
    index: &'a LineIndex,
    next: usize,
    batch: Vec<LineRecord>,
    pos: usize,
}

impl Iterator for Lines<'_> {
    type Item = LineRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos == self.batch.len() {
            let last = (self.next + ITER_BATCH - 1).min(LineNumber::MAX as usize);
            self.index.parse_through(last as LineNumber);
            self.batch = self.index.records_range(self.next, last);
            self.pos = 0;
            self.next += self.batch.len();
        }

        let record = self.batch.get(self.pos).copied()?;
        self.pos += 1;
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use proptest::prelude::*;
    use std::sync::Arc;

    /// Expected line contents: split on `\n`, drop a trailing `\r`, no line
    /// for an empty tail
    fn reference_lines(data: &[u8]) -> Vec<Vec<u8>> {
        let mut lines: Vec<Vec<u8>> = data.split(|&b| b == b'\n').map(|l| l.to_vec()).collect();
        if lines.last().map_or(false, |l| l.is_empty()) {
            lines.pop();
        }
        for line in &mut lines {
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        lines
    }

    fn create_test_data() -> Vec<u8> {
        b"Line 1\nLine 2\nLine 3\nLine 4\nLine 5\n".to_vec()
    }

    #[test]
    fn test_new_index_is_unparsed() {
        let index = LineIndex::from_bytes(create_test_data());
        assert_eq!(index.size(), 0);
        assert!(!index.is_fully_parsed());
    }

    #[test]
    fn test_parse_through_is_incremental() {
        let index = LineIndex::from_bytes(create_test_data());

        assert!(index.parse_through(2));
        assert!(index.size() >= 2);
        assert!(index.parse_through(5));
        assert_eq!(index.size(), 5);
        assert!(!index.parse_through(6));
        assert!(index.is_fully_parsed());
    }

    #[test]
    fn test_line_records() {
        let index = LineIndex::from_bytes("a\nbc\r\n\nlast");

        let first = index.line(1).unwrap();
        assert_eq!(
            first,
            LineRecord {
                start: 0,
                content_end: 1,
                next_start: Some(2),
                number: 1
            }
        );

        let crlf = index.line(2).unwrap();
        assert_eq!(index.line_bytes(&crlf), b"bc");
        assert_eq!(crlf.next_start, Some(6));

        let empty = index.line(3).unwrap();
        assert!(empty.is_empty());

        let last = index.line(4).unwrap();
        assert_eq!(index.line_bytes(&last), b"last");
        assert_eq!(last.next_start, None);
    }

    #[test]
    fn test_trailing_newline_does_not_add_a_line() {
        let index = LineIndex::from_bytes("a\nb\n");
        index.parse_all(&mut NoProgress);
        assert_eq!(index.size(), 2);
        assert_eq!(index.line(2).unwrap().next_start, None);
    }

    #[test]
    fn test_empty_file() {
        let index = LineIndex::from_bytes("");
        assert!(index.is_fully_parsed());
        index.parse_all(&mut NoProgress);
        assert_eq!(index.size(), 0);
        assert!(matches!(
            index.line(1),
            Err(FewerError::LineNotFound { line: 1 })
        ));
    }

    #[test]
    fn test_line_zero_is_not_found() {
        let index = LineIndex::from_bytes(create_test_data());
        assert!(matches!(
            index.line(0),
            Err(FewerError::LineNotFound { line: 0 })
        ));
    }

    #[test]
    fn test_line_past_end_is_not_found() {
        let index = LineIndex::from_bytes(create_test_data());
        assert!(matches!(
            index.line(6),
            Err(FewerError::LineNotFound { line: 6 })
        ));
    }

    #[test]
    fn test_single_line_no_newline() {
        let index = LineIndex::from_bytes("Single line without newline");
        assert_eq!(
            index.line_text(1).unwrap(),
            "Single line without newline"
        );
        assert!(!index.parse_through(2));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let index = LineIndex::from_bytes(b"ok\n\xff\xfe bad\n".to_vec());
        assert_eq!(index.line_text(1).unwrap(), "ok");
        assert!(index.line_text(2).unwrap().contains('\u{FFFD}'));
    }

    #[test]
    fn test_parse_all_reports_progress() {
        let data: String = (1..=25).map(|i| format!("line {i}\n")).collect();
        let index = LineIndex::with_progress_interval(ByteBuffer::from_bytes(data), 10);

        let mut reports = Vec::new();
        index.parse_all(&mut |done: u64, percent: u8| reports.push((done, percent)));

        assert_eq!(index.size(), 25);
        assert_eq!(reports.first(), Some(&(10, 37)));
        assert_eq!(reports.last().map(|r| r.1), Some(100));
        assert!(reports.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn test_iter_visits_every_line() {
        let data: String = (1..=3000).map(|i| format!("{i}\n")).collect();
        let index = LineIndex::from_bytes(data);

        let numbers: Vec<LineNumber> = index.iter().map(|r| r.number).collect();
        assert_eq!(numbers.len(), 3000);
        assert!(numbers.iter().enumerate().all(|(i, &n)| n as usize == i + 1));
        assert!(index.is_fully_parsed());
    }

    #[test]
    fn test_scan_completes() {
        let index = LineIndex::with_progress_interval(ByteBuffer::from_bytes("a\nb\nc\n"), 2);
        let abort = AbortSignal::new(1);
        let ticket = abort.begin(0);

        let mut seen = Vec::new();
        let mut reports = 0;
        let outcome = index.scan(
            &abort,
            ticket,
            &mut |_: u64, _: u8| reports += 1,
            |record, bytes| seen.push((record.number, bytes.to_vec())),
        );

        assert_eq!(outcome, ScanOutcome::Completed);
        assert_eq!(
            seen,
            vec![(1, b"a".to_vec()), (2, b"b".to_vec()), (3, b"c".to_vec())]
        );
        assert_eq!(reports, 2);
    }

    #[test]
    fn test_scan_stops_when_aborted() {
        let data: String = (1..=100).map(|i| format!("{i}\n")).collect();
        let index = LineIndex::with_progress_interval(ByteBuffer::from_bytes(data), 10);
        let abort = AbortSignal::new(1);
        let ticket = abort.begin(0);

        let mut visited = 0;
        let outcome = index.scan(&abort, ticket, &mut NoProgress, |_, _| {
            visited += 1;
            if visited == 15 {
                abort.abort_slot(0);
            }
        });

        assert_eq!(outcome, ScanOutcome::Aborted);
        assert_eq!(visited, 20);
    }

    #[test]
    fn test_concurrent_readers_and_extension() {
        let data: String = (1..=20_000).map(|i| format!("line {i}\n")).collect();
        let index = Arc::new(LineIndex::from_bytes(data));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    for n in (1 + t..=20_000).step_by(997) {
                        let n = n as LineNumber;
                        let record = index.line(n).unwrap();
                        assert_eq!(record.number, n);
                        assert_eq!(index.line_text(n).unwrap(), format!("line {n}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        index.parse_all(&mut NoProgress);
        assert_eq!(index.size(), 20_000);
    }

    #[test]
    fn test_open_from_disk() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"first\nsecond\n").unwrap();
        file.flush().unwrap();

        let index = LineIndex::open(file.path(), 1024).unwrap();
        assert_eq!(index.line_text(2).unwrap(), "second");
        assert_eq!(index.buffer().path(), file.path());
    }

    proptest! {
        #[test]
        fn prop_index_matches_reference_split(data in prop::collection::vec(
            prop::sample::select(vec![b'a', b'b', b'\n', b'\r']), 0..400)
        ) {
            let expected = reference_lines(&data);
            let index = LineIndex::with_progress_interval(ByteBuffer::from_bytes(data), 7);
            index.parse_all(&mut NoProgress);

            prop_assert_eq!(index.size(), expected.len());
            for (i, line) in expected.iter().enumerate() {
                let n = (i + 1) as LineNumber;
                let record = index.line(n).unwrap();
                prop_assert_eq!(record.number, n);
                prop_assert_eq!(index.line_bytes(&record), line.as_slice());
                prop_assert_eq!(record.next_start.is_none(), i + 1 == expected.len());
            }
        }
    }
}
