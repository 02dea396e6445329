use parking_lot::Mutex;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Shared handle to the pty input side.
///
/// Starts detached; the process attaches the real writer once the pty is
/// open and detaches it on close. Session input and terminal replies both go
/// through here.
#[derive(Clone, Default)]
pub struct PtyWriter {
    inner: Arc<Mutex<Option<Box<dyn Write + Send>>>>,
}

impl PtyWriter {
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn attach(&self, writer: Box<dyn Write + Send>) {
        *self.inner.lock() = Some(writer);
    }

    /// Takes the writer out; dropping it signals end of input to the child.
    pub fn detach(&self) -> Option<Box<dyn Write + Send>> {
        self.inner.lock().take()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Writes all of `bytes` and flushes. Fails with [`Error::Closed`] when detached.
    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        let mut writer = self.inner.lock();
        let Some(writer) = writer.as_mut() else {
            return Err(Error::Closed);
        };
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(bytes.len())
    }
}

impl fmt::Debug for PtyWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtyWriter")
            .field("attached", &self.is_attached())
            .finish()
    }
}
