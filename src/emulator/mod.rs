//! Terminal emulation behind a single lock.
//!
//! [`TerminalEmulator`] is the backend-agnostic interface; only
//! `alacritty_impl` depends on the emulation library. [`Emulator`] owns the
//! lock around a backend and reports every line that leaves the top of the
//! visible grid to the registered scroll callback while that lock is held.

mod alacritty_impl;
mod shared;

pub use shared::{Emulator, LockedTerminal, ScrollCallback, ScrolledLine};

use crate::pty::{PtyWriter, TermSize};

/// Backend-agnostic terminal emulator interface.
///
/// Scrolled-off lines accumulate in the backend until
/// [`clear_scrolled`](Self::clear_scrolled); index 0 is the oldest.
pub trait TerminalEmulator: Send {
    /// Feed raw bytes from the PTY into the emulator.
    fn process(&mut self, bytes: &[u8]);

    /// Resize the virtual terminal.
    fn set_size(&mut self, rows: u16, cols: u16);

    /// Current `(rows, cols)`.
    fn size(&self) -> (u16, u16);

    /// Plain text of visible row `row`, full width. `None` if out of bounds.
    fn render_line(&self, row: usize) -> Option<String>;

    /// Number of lines that scrolled off since the last clear.
    fn scrolled_len(&self) -> usize;

    /// Plain text of scrolled line `index`, oldest first.
    fn render_scrolled(&self, index: usize) -> Option<String>;

    /// Forget all scrolled lines.
    fn clear_scrolled(&mut self);
}

/// Create a terminal emulator backed by the default implementation.
///
/// Replies the emulator generates (cursor position reports and the like) are
/// written to `responses`.
pub fn create(size: TermSize, responses: PtyWriter) -> Box<dyn TerminalEmulator> {
    Box::new(alacritty_impl::AlacrittyEmulator::new(
        size.rows, size.cols, responses,
    ))
}
