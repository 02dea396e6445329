use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by session lifecycle and pty operations.
///
/// History bookkeeping never produces errors; lost lines are reported
/// through the `missed` counter of a [`Snapshot`](crate::history::Snapshot).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Command is empty: at least a program name is required")]
    EmptyCommand,

    #[error("Failed to open pty: {source}")]
    OpenPty {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to resize pty to {rows}x{cols}: {source}")]
    Resize {
        rows: u16,
        cols: u16,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to wait for child process: {0}")]
    Wait(#[source] io::Error),

    #[error("Session is closed")]
    Closed,

    #[error(transparent)]
    Close(#[from] CloseError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result of the one-time close action, shared by every caller that raced into it.
#[derive(Debug, Clone, Error)]
#[error("Failed to close pty: {0}")]
pub struct CloseError(pub Arc<io::Error>);

/// Failure captured by the background copy loop, reported by `Session::wait`.
#[derive(Debug, Clone, Error)]
pub enum CopyError {
    #[error("Reading pty output failed: {0}")]
    Io(Arc<io::Error>),

    #[error("Copy loop panicked: {0}")]
    Panicked(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
