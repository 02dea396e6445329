use parking_lot::{Mutex, MutexGuard, RwLock};

use super::TerminalEmulator;

/// Bytes fed to the backend between two scroll flushes.
pub(super) const PROCESS_CHUNK: usize = 256;

/// Index of a line that has left the visible grid, 0 being the oldest not yet reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrolledLine(pub usize);

/// Invoked once per scrolled-off line, oldest first, with the emulator lock held.
pub type ScrollCallback = Box<dyn Fn(ScrolledLine, &LockedTerminal<'_>) + Send + Sync>;

/// A terminal emulator behind its lock.
///
/// Lock order: anything that also needs another lock (the history buffer)
/// must take this one first. The scroll callback already runs under it, and
/// [`LockedTerminal`] only exists while it is held.
pub struct Emulator {
    backend: Mutex<Box<dyn TerminalEmulator>>,
    on_scroll: RwLock<Option<ScrollCallback>>,
}

/// Rendering context available only while the emulator lock is held.
pub struct LockedTerminal<'a> {
    backend: MutexGuard<'a, Box<dyn TerminalEmulator>>,
    /// Scrolled line currently being reported, if a flush is in progress.
    reporting: Option<usize>,
}

impl Emulator {
    pub fn new(backend: Box<dyn TerminalEmulator>) -> Self {
        Self {
            backend: Mutex::new(backend),
            on_scroll: RwLock::new(None),
        }
    }

    /// Replaces the scroll callback.
    pub fn register_scroll_callback(
        &self,
        callback: impl Fn(ScrolledLine, &LockedTerminal<'_>) + Send + Sync + 'static,
    ) {
        *self.on_scroll.write() = Some(Box::new(callback));
    }

    pub fn lock(&self) -> LockedTerminal<'_> {
        LockedTerminal {
            backend: self.backend.lock(),
            reporting: None,
        }
    }

    /// Feeds output to the emulator, reporting scrolled lines as they appear.
    pub fn write(&self, bytes: &[u8]) {
        for chunk in bytes.chunks(PROCESS_CHUNK) {
            let mut term = self.lock();
            term.backend.process(chunk);
            self.report_scrolled(&mut term);
        }
    }

    /// Reshapes the grid. Lines pushed out by shrinking are reported like any other.
    pub fn resize(&self, rows: u16, cols: u16) {
        let mut term = self.lock();
        term.backend.set_size(rows, cols);
        self.report_scrolled(&mut term);
    }

    fn report_scrolled(&self, term: &mut LockedTerminal<'_>) {
        let count = term.backend.scrolled_len();
        if count == 0 {
            return;
        }
        if let Some(callback) = self.on_scroll.read().as_ref() {
            for index in 0..count {
                term.reporting = Some(index);
                callback(ScrolledLine(index), term);
            }
            term.reporting = None;
        }
        term.backend.clear_scrolled();
    }
}

impl LockedTerminal<'_> {
    pub fn size(&self) -> (u16, u16) {
        self.backend.size()
    }

    /// Plain text of visible row `row`.
    pub fn render_line(&self, row: usize) -> Option<String> {
        self.backend.render_line(row)
    }

    /// Plain text of a scrolled-off line; empty if the index is stale.
    pub fn render_scrolled(&self, line: ScrolledLine) -> String {
        self.backend.render_scrolled(line.0).unwrap_or_default()
    }

    /// Every visible row, top to bottom.
    ///
    /// While a scrolled line is being reported, the screen is rendered as it
    /// stood before that line left it: the not-yet-reported scrolled lines
    /// come first and the newest rows are cut to keep the row count.
    pub fn render_all(&self) -> Vec<String> {
        let (rows, _) = self.backend.size();
        let rows = usize::from(rows);
        let mut screen = Vec::with_capacity(rows);

        if let Some(first) = self.reporting {
            let scrolled = self.backend.scrolled_len();
            screen.extend((first..scrolled).filter_map(|i| self.backend.render_scrolled(i)));
        }

        let remaining = rows.saturating_sub(screen.len());
        screen.extend((0..remaining).filter_map(|row| self.backend.render_line(row)));
        screen.truncate(rows);
        screen
    }
}
