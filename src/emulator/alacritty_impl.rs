use super::shared::PROCESS_CHUNK;
use super::TerminalEmulator;
use crate::pty::PtyWriter;
use alacritty_terminal::event::{Event, EventListener};
use alacritty_terminal::grid::{Dimensions, Row};
use alacritty_terminal::index::Line;
use alacritty_terminal::term::cell::{Cell, Flags};
use alacritty_terminal::term::Config;
use alacritty_terminal::vte::ansi::{Processor, Timeout};
use std::time::Duration;

/// Lines alacritty may hold between two `clear_scrolled` calls.
///
/// A single scroll moves at most one screenful and takes at least one byte,
/// so a chunk of [`PROCESS_CHUNK`] bytes can't push out more than
/// `PROCESS_CHUNK * rows` lines. Storage grows lazily, the bound costs nothing
/// until it is used.
fn scrolled_window(rows: usize) -> usize {
    PROCESS_CHUNK * rows.max(1)
}

fn term_config(rows: usize) -> Config {
    Config {
        scrolling_history: scrolled_window(rows),
        ..Config::default()
    }
}

/// Forwards terminal replies (`Event::PtyWrite`) back to the child.
struct ResponseForwarder {
    writer: PtyWriter,
}

impl EventListener for ResponseForwarder {
    fn send_event(&self, event: Event) {
        match event {
            Event::PtyWrite(text) => {
                if !self.writer.is_attached() {
                    tracing::trace!("Dropping terminal reply, pty writer detached");
                    return;
                }
                if let Err(e) = self.writer.write(text.as_bytes()) {
                    tracing::warn!(error = %e, "Failed to forward terminal reply");
                }
            }
            other => tracing::trace!(event = ?other, "Ignoring terminal event"),
        }
    }
}

/// Timeout that never arms.
///
/// Synchronized updates (CSI ?2026h) are applied as soon as they arrive;
/// rows are read back as text right after each chunk.
#[derive(Default)]
struct NoSyncTimeout;

impl Timeout for NoSyncTimeout {
    fn set_timeout(&mut self, _duration: Duration) {}
    fn clear_timeout(&mut self) {}
    fn pending_timeout(&self) -> bool {
        false
    }
}

/// Terminal dimensions for alacritty's `Dimensions` trait.
struct GridSize {
    lines: usize,
    cols: usize,
}

impl GridSize {
    fn new(rows: u16, cols: u16) -> Self {
        Self {
            lines: usize::from(rows.max(1)),
            cols: usize::from(cols.max(1)),
        }
    }
}

impl Dimensions for GridSize {
    fn total_lines(&self) -> usize {
        self.lines
    }

    fn screen_lines(&self) -> usize {
        self.lines
    }

    fn columns(&self) -> usize {
        self.cols
    }
}

pub(super) struct AlacrittyEmulator {
    term: alacritty_terminal::Term<ResponseForwarder>,
    processor: Processor<NoSyncTimeout>,
}

impl AlacrittyEmulator {
    pub(super) fn new(rows: u16, cols: u16, responses: PtyWriter) -> Self {
        let size = GridSize::new(rows, cols);
        let term = alacritty_terminal::Term::new(
            term_config(size.lines),
            &size,
            ResponseForwarder { writer: responses },
        );
        let processor = Processor::default();

        Self { term, processor }
    }
}

impl TerminalEmulator for AlacrittyEmulator {
    fn process(&mut self, bytes: &[u8]) {
        self.processor.advance(&mut self.term, bytes);
    }

    fn set_size(&mut self, rows: u16, cols: u16) {
        let size = GridSize::new(rows, cols);
        // Shrinking pushes up to the old row count into history, so the
        // window must fit both heights.
        let tallest = size.lines.max(self.term.grid().screen_lines());
        self.term.set_options(term_config(tallest));
        self.term.resize(size);
    }

    fn size(&self) -> (u16, u16) {
        let grid = self.term.grid();
        (grid.screen_lines() as u16, grid.columns() as u16)
    }

    fn render_line(&self, row: usize) -> Option<String> {
        let grid = self.term.grid();
        if row >= grid.screen_lines() {
            return None;
        }
        Some(plain_text(&grid[Line(row as i32)]))
    }

    fn scrolled_len(&self) -> usize {
        self.term.grid().history_size()
    }

    fn render_scrolled(&self, index: usize) -> Option<String> {
        let grid = self.term.grid();
        let scrolled = grid.history_size();
        if index >= scrolled {
            return None;
        }
        // Line(-1) is the most recent history line.
        let line = Line(-((scrolled - index) as i32));
        Some(plain_text(&grid[line]))
    }

    fn clear_scrolled(&mut self) {
        self.term.grid_mut().clear_history();
    }
}

/// Renders a row as plain text, keeping trailing blanks.
fn plain_text(row: &Row<Cell>) -> String {
    let mut text = String::with_capacity(row.len());
    for cell in row {
        if cell
            .flags
            .intersects(Flags::WIDE_CHAR_SPACER | Flags::LEADING_WIDE_CHAR_SPACER)
        {
            continue;
        }
        text.push(if cell.c == '\0' { ' ' } else { cell.c });
        if let Some(zerowidth) = cell.zerowidth() {
            text.extend(zerowidth.iter());
        }
    }
    text
}
