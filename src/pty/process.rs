use parking_lot::Mutex;
use portable_pty::{native_pty_system, Child, ChildKiller, MasterPty};
use std::io::{self, Read};
use std::sync::{Once, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{CloseError, Error, Result};
use crate::pty::command::{CommandConfig, TermSize};
use crate::pty::writer::PtyWriter;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long a child gets to act on SIGHUP before its process group is killed.
const HANGUP_GRACE: Duration = Duration::from_millis(250);

/// How [`PtyProcess::close`] treats a child that is still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseConfig {
    /// Time the child gets to exit on its own after input is closed.
    /// Zero kills it right away.
    pub grace_period: Duration,
}

/// A child process attached to a pty.
pub struct PtyProcess {
    master: Mutex<Option<Box<dyn MasterPty + Send>>>,
    writer: PtyWriter,
    child: Mutex<Box<dyn Child + Send + Sync>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    pid: Option<u32>,
    exit_code: OnceLock<u32>,
    close_config: Mutex<CloseConfig>,
    closer: Once,
}

impl PtyProcess {
    /// Opens a pty, spawns the command on it and attaches `writer` to its input.
    ///
    /// Returns the process and the reader for its output.
    pub fn start(
        config: &CommandConfig,
        writer: PtyWriter,
    ) -> Result<(Self, Box<dyn Read + Send>)> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(config.size.to_pty_size())
            .map_err(|e| Error::OpenPty { source: e.into() })?;

        let mut child = pair
            .slave
            .spawn_command(config.to_command_builder())
            .map_err(|e| Error::Spawn {
                program: config.program().to_string(),
                source: e.into(),
            })?;
        drop(pair.slave);

        let master = pair.master;
        let io = master
            .try_clone_reader()
            .and_then(|reader| Ok((reader, master.take_writer()?)));
        let (reader, raw_writer) = match io {
            Ok(io) => io,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::OpenPty { source: e.into() });
            }
        };
        writer.attach(raw_writer);

        let pid = child.process_id();
        let killer = child.clone_killer();
        tracing::debug!(?pid, program = config.program(), "Child spawned on pty");

        let process = Self {
            master: Mutex::new(Some(master)),
            writer,
            child: Mutex::new(child),
            killer: Mutex::new(killer),
            pid,
            exit_code: OnceLock::new(),
            close_config: Mutex::new(CloseConfig::default()),
            closer: Once::new(),
        };
        Ok((process, reader))
    }

    pub fn process_id(&self) -> Option<u32> {
        self.pid
    }

    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        self.writer.write(bytes)
    }

    pub fn resize(&self, size: TermSize) -> Result<()> {
        let master = self.master.lock();
        let Some(master) = master.as_ref() else {
            return Err(Error::Closed);
        };
        master
            .resize(size.to_pty_size())
            .map_err(|e| Error::Resize {
                rows: size.rows,
                cols: size.cols,
                source: e.into(),
            })
    }

    /// Blocks until the child exits. Later calls return the same code.
    pub fn wait(&self) -> Result<u32> {
        if let Some(code) = self.exit_code.get() {
            return Ok(*code);
        }
        let mut child = self.child.lock();
        if let Some(code) = self.exit_code.get() {
            return Ok(*code);
        }
        let status = child.wait().map_err(Error::Wait)?;
        Ok(*self.exit_code.get_or_init(|| status.exit_code()))
    }

    /// Sets how a later [`close`](Self::close) treats a running child.
    pub fn set_close_config(&self, config: CloseConfig) -> Result<()> {
        if self.closer.is_completed() {
            return Err(Error::Closed);
        }
        *self.close_config.lock() = config;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_completed()
    }

    /// Closes input, stops the child and releases the pty.
    ///
    /// Runs once; concurrent callers block until it is done. Only the caller
    /// that ran it can see an error.
    pub fn close(&self) -> Result<(), CloseError> {
        let mut result = Ok(());
        self.closer.call_once(|| result = self.close_once());
        result
    }

    fn close_once(&self) -> Result<(), CloseError> {
        let config = *self.close_config.lock();
        drop(self.writer.detach());

        let exited = !config.grace_period.is_zero() && self.wait_for_exit(config.grace_period);
        let result = if exited || self.exit_code.get().is_some() {
            Ok(())
        } else {
            self.terminate()
        };

        drop(self.master.lock().take());
        tracing::debug!(pid = ?self.pid, ok = result.is_ok(), "Pty closed");
        result
    }

    /// SIGHUP first; a child still alive after [`HANGUP_GRACE`] gets its
    /// whole process group killed so nothing keeps the pty slave open.
    fn terminate(&self) -> Result<(), CloseError> {
        match self.killer.lock().kill() {
            Ok(()) => {}
            Err(e) if already_gone(&e) => return Ok(()),
            Err(e) => return Err(CloseError(e.into())),
        }
        if self.wait_for_exit(HANGUP_GRACE) {
            return Ok(());
        }
        match self.pid {
            Some(pid) => {
                tracing::debug!(pid, "Child ignored SIGHUP, sending SIGKILL");
                force_kill(pid).map_err(|e| CloseError(e.into()))
            }
            None => Ok(()),
        }
    }

    /// Polls for exit until `grace` elapses without blocking a concurrent `wait`.
    fn wait_for_exit(&self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        loop {
            if self.exit_code.get().is_some() {
                return true;
            }
            if let Some(mut child) = self.child.try_lock() {
                if let Ok(Some(status)) = child.try_wait() {
                    let _ = self.exit_code.set(status.exit_code());
                    return true;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }
}

#[cfg(unix)]
fn already_gone(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::ESRCH)
}

#[cfg(not(unix))]
fn already_gone(_e: &io::Error) -> bool {
    false
}

/// SIGKILL to the child's process group (it leads its own session), then to
/// the child alone in case the group is already gone.
#[cfg(unix)]
fn force_kill(pid: u32) -> io::Result<()> {
    let pid = pid as libc::pid_t;
    // SAFETY: plain signal delivery, no memory is shared with the target.
    if unsafe { libc::killpg(pid, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    if unsafe { libc::kill(pid, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    let e = io::Error::last_os_error();
    if already_gone(&e) {
        Ok(())
    } else {
        Err(e)
    }
}

#[cfg(not(unix))]
fn force_kill(_pid: u32) -> io::Result<()> {
    Ok(())
}
