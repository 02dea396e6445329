use parking_lot::{Condvar, Mutex};
use std::io::{self, Read};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crate::emulator::Emulator;
use crate::error::CopyError;

const READ_BUFFER: usize = 8192;

enum CopyStatus {
    Running,
    Finished(Option<CopyError>),
}

/// Background worker pumping pty output into the emulator.
///
/// Any number of callers may [`wait`](Self::wait) for it; all of them see
/// the same outcome.
pub(crate) struct CopyLoop {
    status: Arc<(Mutex<CopyStatus>, Condvar)>,
}

impl CopyLoop {
    pub(crate) fn spawn(
        session: String,
        reader: Box<dyn Read + Send>,
        emulator: Arc<Emulator>,
    ) -> io::Result<Self> {
        let status = Arc::new((Mutex::new(CopyStatus::Running), Condvar::new()));
        let done = Arc::clone(&status);

        thread::Builder::new()
            .name("scrollterm-copy".to_string())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| copy(reader, &emulator)));
                let error = match outcome {
                    Ok(Ok(bytes)) => {
                        tracing::debug!(%session, bytes, "Copy loop reached end of output");
                        None
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(%session, error = %e, "Copy loop stopped on read error");
                        Some(CopyError::Io(Arc::new(e)))
                    }
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        tracing::error!(%session, %message, "Copy loop panicked");
                        Some(CopyError::Panicked(message))
                    }
                };

                let (lock, finished) = &*done;
                *lock.lock() = CopyStatus::Finished(error);
                finished.notify_all();
            })?;

        Ok(Self { status })
    }

    /// Blocks until the loop has stopped and returns what it captured.
    pub(crate) fn wait(&self) -> Option<CopyError> {
        let (lock, finished) = &*self.status;
        let mut status = lock.lock();
        loop {
            if let CopyStatus::Finished(error) = &*status {
                return error.clone();
            }
            finished.wait(&mut status);
        }
    }
}

/// Copies until end of stream; returns the number of bytes fed.
fn copy(mut reader: Box<dyn Read + Send>, emulator: &Emulator) -> io::Result<u64> {
    let mut buffer = [0u8; READ_BUFFER];
    let mut total = 0u64;
    loop {
        let count = match reader.read(&mut buffer) {
            Ok(0) => return Ok(total),
            Ok(count) => count,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_hangup(&e) => return Ok(total),
            Err(e) => return Err(e),
        };
        tracing::trace!(count, "Pty output");
        emulator.write(&buffer[..count]);
        total += count as u64;
    }
}

/// Linux reports a closed slave side as `EIO` on the master.
#[cfg(unix)]
fn is_hangup(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EIO)
}

#[cfg(not(unix))]
fn is_hangup(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::BrokenPipe
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::create;
    use crate::pty::{PtyWriter, TermSize};
    use std::io::Cursor;

    fn emulator() -> Arc<Emulator> {
        Arc::new(Emulator::new(create(TermSize::new(4, 20), PtyWriter::detached())))
    }

    struct FailingReader {
        served: bool,
        error: fn() -> io::Error,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.served {
                self.served = true;
                buf[..5].copy_from_slice(b"hello");
                return Ok(5);
            }
            Err((self.error)())
        }
    }

    struct PanickingReader;

    impl Read for PanickingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            panic!("reader exploded");
        }
    }

    #[test]
    fn copies_until_eof() {
        let emulator = emulator();
        let reader = Box::new(Cursor::new(b"abc\r\ndef".to_vec()));
        let copy = CopyLoop::spawn("test".into(), reader, Arc::clone(&emulator)).unwrap();

        assert!(copy.wait().is_none());
        assert!(copy.wait().is_none());
        let screen = emulator.lock().render_all();
        assert_eq!(screen[0].trim_end(), "abc");
        assert_eq!(screen[1].trim_end(), "def");
    }

    #[test]
    fn read_error_is_captured_for_every_waiter() {
        let emulator = emulator();
        let reader = Box::new(FailingReader {
            served: false,
            error: || io::Error::new(io::ErrorKind::ConnectionReset, "gone"),
        });
        let copy = Arc::new(CopyLoop::spawn("test".into(), reader, Arc::clone(&emulator)).unwrap());

        let other = {
            let copy = Arc::clone(&copy);
            thread::spawn(move || copy.wait())
        };
        let mine = copy.wait();
        let theirs = other.join().unwrap();

        assert!(matches!(mine, Some(CopyError::Io(ref e)) if e.kind() == io::ErrorKind::ConnectionReset));
        assert!(matches!(theirs, Some(CopyError::Io(_))));
        assert_eq!(emulator.lock().render_all()[0].trim_end(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn eio_counts_as_end_of_stream() {
        let reader = Box::new(FailingReader {
            served: false,
            error: || io::Error::from_raw_os_error(libc::EIO),
        });
        let copy = CopyLoop::spawn("test".into(), reader, emulator()).unwrap();
        assert!(copy.wait().is_none());
    }

    #[test]
    fn panic_is_recovered() {
        let copy = CopyLoop::spawn("test".into(), Box::new(PanickingReader), emulator()).unwrap();
        match copy.wait() {
            Some(CopyError::Panicked(message)) => assert_eq!(message, "reader exploded"),
            other => panic!("expected panic capture, got {other:?}"),
        }
    }
}
