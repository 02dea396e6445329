//! A process running in a pty, with its screen and scrollback history.
//!
//! # Architecture
//!
//! ```text
//! pty output → copy loop → Emulator (lock) → scroll callback → History (lock)
//!                                                 └─ threshold callbacks
//! ```
//!
//! One background thread pumps output; every public method may be called
//! from any thread at the same time.

mod copy;
mod state;

pub use state::SessionState;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::HistoryConfig;
use crate::emulator::{self, Emulator};
use crate::error::{CopyError, Error, Result};
use crate::history::{History, NormalizedHistory, Snapshot};
use crate::pty::{CloseConfig, CommandConfig, PtyProcess, PtyWriter, TermSize};
use copy::CopyLoop;

/// What [`Session::wait`] observed.
#[derive(Debug, Clone)]
pub struct WaitOutcome {
    pub exit_code: u32,
    /// Failure of the background copy loop, if any.
    pub copy_error: Option<CopyError>,
}

pub struct Session {
    id: Uuid,
    emulator: Arc<Emulator>,
    history: Arc<History>,
    process: PtyProcess,
    copy_loop: CopyLoop,
    state: AtomicU8,
}

impl Session {
    /// Starts `command` on a new pty and begins recording its scrollback.
    ///
    /// Fails without leaving anything running if the process can't be started.
    pub fn start(command: CommandConfig, history: HistoryConfig) -> Result<Self> {
        let command = command.normalize()?;
        let NormalizedHistory { capacity, trigger } = history.normalize();
        let id = Uuid::new_v4();

        let responses = PtyWriter::detached();
        let emulator = Arc::new(Emulator::new(emulator::create(
            command.size,
            responses.clone(),
        )));
        let history = Arc::new(History::new(capacity, trigger));
        let sink = Arc::clone(&history);
        emulator.register_scroll_callback(move |line, term| sink.on_scroll(line, term));

        let (process, reader) = PtyProcess::start(&command, responses)?;
        let copy_loop = match CopyLoop::spawn(id.to_string(), reader, Arc::clone(&emulator)) {
            Ok(copy_loop) => copy_loop,
            Err(e) => {
                let _ = process.close();
                return Err(Error::Io(e));
            }
        };

        let session = Self {
            id,
            emulator,
            history,
            process,
            copy_loop,
            state: AtomicU8::new(SessionState::Created as u8),
        };
        session.advance(SessionState::Running);

        tracing::info!(
            session = %session.id,
            pid = ?session.process.process_id(),
            program = command.program(),
            rows = command.size.rows,
            cols = command.size.cols,
            history_bytes = capacity,
            "Session started"
        );
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn process_id(&self) -> Option<u32> {
        self.process.process_id()
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Sends input to the process.
    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        self.process.write(bytes)
    }

    /// Resizes the pty, then the emulator grid.
    pub fn resize(&self, size: TermSize) -> Result<()> {
        self.process.resize(size)?;
        self.emulator.resize(size.rows, size.cols);
        tracing::debug!(session = %self.id, rows = size.rows, cols = size.cols, "Session resized");
        Ok(())
    }

    /// Screen and history as of now. Clears history.
    pub fn fetch(&self) -> Snapshot {
        self.history.fetch(&self.emulator)
    }

    /// Clears history and the missed count.
    pub fn drop_history(&self) {
        self.history.drop_history();
    }

    /// Blocks until the process exits and all of its output has been consumed.
    pub fn wait(&self) -> Result<WaitOutcome> {
        let exit_code = self.process.wait()?;
        let copy_error = self.copy_loop.wait();
        tracing::info!(
            session = %self.id,
            exit_code,
            copy_failed = copy_error.is_some(),
            "Session process exited"
        );
        Ok(WaitOutcome {
            exit_code,
            copy_error,
        })
    }

    /// Sets how [`close`](Self::close) treats a child that is still running.
    pub fn set_close_config(&self, config: CloseConfig) -> Result<()> {
        self.process.set_close_config(config)
    }

    /// Stops the process and releases the pty. Safe to call repeatedly and
    /// concurrently, including during [`wait`](Self::wait).
    pub fn close(&self) -> Result<()> {
        let result = self.process.close();
        if self.advance(SessionState::Closed) {
            tracing::info!(session = %self.id, "Session closed");
        }
        result.map_err(Error::from)
    }

    /// Moves to `next`; returns false if already there.
    fn advance(&self, next: SessionState) -> bool {
        self.state.swap(next as u8, Ordering::SeqCst) != next as u8
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn state_moves_from_running_to_closed() {
        let session = Session::start(
            CommandConfig::new(["sleep", "30"]),
            HistoryConfig::default(),
        )
        .unwrap();
        assert_eq!(session.state(), SessionState::Running);
        assert!(session.process_id().is_some());

        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);

        let outcome = session.wait().unwrap();
        assert_ne!(outcome.exit_code, 0);
        assert!(outcome.copy_error.is_none());
    }

    #[test]
    fn empty_command_fails_before_anything_starts() {
        let result = Session::start(CommandConfig::default(), HistoryConfig::default());
        assert!(matches!(result, Err(Error::EmptyCommand)));
    }

    #[test]
    fn writes_after_close_fail() {
        let session =
            Session::start(CommandConfig::new(["cat"]), HistoryConfig::default()).unwrap();
        assert_eq!(session.write(b"hi\n").unwrap(), 3);
        session.close().unwrap();
        assert!(matches!(session.write(b"x"), Err(Error::Closed)));
        assert!(matches!(
            session.resize(TermSize::new(10, 10)),
            Err(Error::Closed)
        ));
    }
}
