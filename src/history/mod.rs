//! Scrollback history synchronized with the screen.
//!
//! [`History`] keeps the ring buffer behind its own lock and is fed by the
//! emulator's scroll callback. Every operation that needs both the screen and
//! the buffer takes a [`LockedTerminal`], so the emulator lock is always
//! acquired first.

mod ring;
mod snapshot;
mod threshold;

pub use ring::{HistoryBuffer, LINE_TERMINATOR};
pub use snapshot::Snapshot;
pub use threshold::{NormalizedHistory, ThresholdTrigger};

use parking_lot::Mutex;

use crate::config::HistoryConfig;
use crate::emulator::{Emulator, LockedTerminal, ScrolledLine};

pub struct History {
    buffer: Mutex<HistoryBuffer>,
    trigger: ThresholdTrigger,
}

impl History {
    pub fn new(capacity: usize, trigger: ThresholdTrigger) -> Self {
        Self {
            buffer: Mutex::new(HistoryBuffer::new(capacity)),
            trigger,
        }
    }

    pub fn from_config(config: HistoryConfig) -> Self {
        let NormalizedHistory { capacity, trigger } = config.normalize();
        Self::new(capacity, trigger)
    }

    /// Records one scrolled-off line.
    ///
    /// Occupancy is checked before the line is stored, so a snapshot taken
    /// here ends right above the line the screen (rendered under the same
    /// lock) still shows at its top.
    pub fn on_scroll(&self, line: ScrolledLine, term: &LockedTerminal<'_>) {
        let mut buffer = self.buffer.lock();

        let occupied = buffer.len();
        if self.trigger.is_crossed(occupied) {
            tracing::debug!(
                occupied,
                trigger_bytes = self.trigger.trigger_bytes(),
                "History threshold crossed"
            );
            self.trigger.notify();
            if self.trigger.wants_fetch() {
                let snapshot = Self::drain(&mut buffer, term);
                self.trigger.dispatch(snapshot);
            }
        }

        let mut entry = term.render_scrolled(line).into_bytes();
        entry.extend_from_slice(LINE_TERMINATOR);
        buffer.append(&entry);
    }

    /// Drains history and renders the screen through an already locked terminal.
    pub fn snapshot(&self, term: &LockedTerminal<'_>) -> Snapshot {
        let mut buffer = self.buffer.lock();
        Self::drain(&mut buffer, term)
    }

    /// Locks the emulator, then the buffer, and drains.
    pub fn fetch(&self, emulator: &Emulator) -> Snapshot {
        let term = emulator.lock();
        self.snapshot(&term)
    }

    /// Discards history and the missed count without rendering anything.
    pub fn drop_history(&self) {
        self.buffer.lock().clear();
    }

    /// Occupied bytes right now.
    pub fn occupied(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn missed(&self) -> usize {
        self.buffer.lock().missed()
    }

    fn drain(buffer: &mut HistoryBuffer, term: &LockedTerminal<'_>) -> Snapshot {
        let history = buffer.drain();
        let missed = buffer.take_missed();
        Snapshot {
            screen: term.render_all(),
            history,
            missed,
        }
    }
}
