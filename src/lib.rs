//! Bounded, line-oriented scrollback history for a process running in a pty.
//!
//! A [`Session`] runs a command on a pseudo-terminal, feeds its output into a
//! terminal emulator and keeps every line that scrolls off the top of the
//! screen in a fixed-size ring buffer. [`Session::fetch`] returns the screen
//! together with the history recorded so far and clears that history.
//! Optional callbacks report when the buffer fills past a threshold.
//!
//! ```no_run
//! use scrollterm::{CommandConfig, HistoryConfig, Session, TermSize};
//!
//! let session = Session::start(
//!     CommandConfig::new(["ls", "-l"]).with_size(TermSize::new(24, 80)),
//!     HistoryConfig::default().on_threshold_with_fetch(|snapshot| {
//!         for line in snapshot.history_lines() {
//!             println!("{}", line.trim_end());
//!         }
//!     }),
//! )?;
//! session.wait()?;
//! let snapshot = session.fetch();
//! println!("{} lines missed", snapshot.missed);
//! # Ok::<(), scrollterm::Error>(())
//! ```

pub mod config;
pub mod emulator;
pub mod error;
pub mod history;
pub mod logging;
pub mod pty;
pub mod session;

pub use config::{HistoryConfig, Settings};
pub use error::{CloseError, CopyError, Error, Result};
pub use history::Snapshot;
pub use pty::{CloseConfig, CommandConfig, TermSize};
pub use session::{Session, SessionState, WaitOutcome};
