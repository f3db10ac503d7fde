//! Session orchestration layer
//!
//! A [`Session`] wires the line index, the filter slots, the event channel and
//! the viewport together. It is driven from a single (UI) thread: edits come in
//! through its methods, background results are picked up by `poll_events`, and
//! the renderer reads pages back out with `page`.

use crate::config::Settings;
use crate::error::Result;
use crate::event::EventChannel;
use crate::file_handler::{ByteBuffer, LineIndex, LineNumber};
use crate::filter::{FilterSlots, Handled, SlotUpdate};
use crate::intersect::{intersect, Intersectable};
use crate::progress::Progress;
use crate::search::{self, SearchPattern};
use crate::viewport::Viewport;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One displayed line, ready for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLine {
    pub number: LineNumber,
    pub text: String,
}

/// Viewer state for one opened file
pub struct Session {
    path: PathBuf,
    index: Arc<LineIndex>,
    events: Arc<EventChannel>,
    filters: FilterSlots,
    viewport: Viewport,
    search: Option<SearchPattern>,
    info: Option<String>,
    settings: Settings,
}

impl Session {
    /// Open `path`; lines are indexed lazily until [`Session::parse_all`]
    pub fn open(path: impl AsRef<Path>, settings: Settings) -> Result<Self> {
        let path = path.as_ref();
        let buffer = ByteBuffer::open(path, settings.in_memory_threshold)?;
        let index = LineIndex::with_progress_interval(buffer, settings.progress_interval);
        let mut session = Self::from_index(Arc::new(index), settings);
        session.path = path.to_path_buf();
        Ok(session)
    }

    /// Session over an index that is already built
    pub fn from_index(index: Arc<LineIndex>, settings: Settings) -> Self {
        let events = Arc::new(EventChannel::new());
        let filters = FilterSlots::new(
            Arc::clone(&index),
            Arc::clone(&events),
            settings.cache_capacity,
        );
        let mut session = Self {
            path: index.buffer().path().to_path_buf(),
            index,
            events,
            filters,
            viewport: Viewport::new(),
            search: None,
            info: None,
            settings,
        };
        session.apply_filters();
        session
    }

    /// Index the whole file, then refresh the view
    pub fn parse_all(&mut self, progress: &mut dyn Progress) {
        self.index.parse_all(progress);
        self.apply_filters();
    }

    pub fn index(&self) -> &Arc<LineIndex> {
        &self.index
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn filters(&self) -> &FilterSlots {
        &self.filters
    }

    /// Edit filter slot `slot`; a rejected expression is reported in `info`
    pub fn set_filter(&mut self, slot: usize, text: &str) -> Result<SlotUpdate> {
        let update = self.filters.set(slot, text)?;
        match &update {
            SlotUpdate::Cleared | SlotUpdate::Cached => self.apply_filters(),
            SlotUpdate::Rejected(message) => {
                self.info = Some(format!("{} : {}", text, message));
                self.apply_filters();
            }
            // a pending slot drops out of the intersection until it is ready
            SlotUpdate::Started => self.apply_filters(),
            SlotUpdate::Unchanged => {}
        }
        Ok(update)
    }

    pub fn clear_filter(&mut self, slot: usize) -> Result<()> {
        self.filters.clear(slot)?;
        self.apply_filters();
        Ok(())
    }

    /// Drain the event channel
    ///
    /// # Returns
    /// * `true` if a filter became ready and the view was recomputed
    pub fn poll_events(&mut self) -> bool {
        let mut changed = false;
        while self.events.pending() {
            let Ok(event) = self.events.try_pop() else {
                break;
            };
            match self.filters.handle_event(event) {
                Handled::Info(text) => self.info = Some(text),
                Handled::FilterReady(_) => changed = true,
                Handled::Stale => {}
            }
        }
        if changed {
            self.apply_filters();
        }
        changed
    }

    /// Recompute the displayed lines from the ready filters
    pub fn apply_filters(&mut self) {
        let sets = self.filters.active_sets();
        let filters: Vec<&dyn Intersectable> = sets
            .iter()
            .map(|set| set.as_ref() as &dyn Intersectable)
            .collect();
        let sequence = intersect(self.index.as_ref(), &filters);
        self.viewport.assign(sequence);
    }

    /// Poll until no filter is pending or `timeout` passes
    ///
    /// # Returns
    /// * `true` if every filter finished
    pub fn wait_for_filters(&mut self, timeout: Duration) -> bool {
        let started = Instant::now();
        loop {
            self.poll_events();
            if !self.filters.has_pending() {
                return true;
            }
            if started.elapsed() >= timeout {
                return false;
            }
            std::thread::sleep(self.settings.poll_interval());
        }
    }

    /// Up to `rows` displayed lines starting at the view top
    ///
    /// Leaves the viewport's read cursor on the last returned line, so a
    /// following `page_down` continues from there.
    pub fn page(&mut self, rows: usize) -> Result<Vec<PageLine>> {
        let mut lines = Vec::new();
        if rows == 0 || !self.viewport.start() {
            return Ok(lines);
        }
        loop {
            let number = self.viewport.current();
            let text = self.index.line_text(number)?.into_owned();
            lines.push(PageLine { number, text });
            if lines.len() == rows || !self.viewport.next() {
                break;
            }
        }
        Ok(lines)
    }

    /// Compile and remember a search expression; empty text clears it
    pub fn set_search(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            self.search = None;
            return Ok(());
        }
        match SearchPattern::compile(text) {
            Ok(pattern) => {
                self.search = Some(pattern);
                Ok(())
            }
            Err(e) => {
                self.info = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn search_next(&mut self) -> Result<bool> {
        self.run_search(search::SearchDirection::Forward)
    }

    pub fn search_prev(&mut self) -> Result<bool> {
        self.run_search(search::SearchDirection::Backward)
    }

    fn run_search(&mut self, direction: search::SearchDirection) -> Result<bool> {
        let Some(pattern) = &self.search else {
            self.info = Some("no search pattern".to_string());
            return Ok(false);
        };
        let found = search::search(pattern, &mut self.viewport, &self.index, direction)?;
        if !found {
            self.info = Some(format!("pattern not found: {}", pattern.text()));
        }
        Ok(found)
    }

    /// Put line `n` at the top; status text explains a failure
    pub fn go_to_line(&mut self, n: u64) -> bool {
        let found = LineNumber::try_from(n)
            .map(|n| self.viewport.go_to(n))
            .unwrap_or(false);
        if !found {
            self.info = Some(format!("line number {} not currently displayed", n));
        }
        found
    }

    pub fn go_to_percent(&mut self, percent: u64) -> bool {
        self.viewport.go_to_percent(percent)
    }

    /// Latest status text
    pub fn info(&self) -> Option<&str> {
        self.info.as_deref()
    }

    pub fn take_info(&mut self) -> Option<String> {
        self.info.take()
    }

    /// A command line that reopens this file with the same filters and search
    pub fn command_line(&self) -> String {
        let mut parts = vec!["rfewer".to_string()];
        for (_, text) in self.filters.expressions() {
            parts.push("--regex".to_string());
            parts.push(shell_quote(text));
        }
        if let Some(pattern) = &self.search {
            parts.push("--search".to_string());
            parts.push(shell_quote(pattern.text()));
        }
        parts.push(shell_quote(&self.path.to_string_lossy()));
        parts.join(" ")
    }
}

/// Single-quote `text` for a POSIX shell
fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "'\\''"))
}
