use portable_pty::{CommandBuilder, PtySize};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TermSize {
    pub rows: u16,
    pub cols: u16,
}

impl TermSize {
    pub const DEFAULT: TermSize = TermSize { rows: 24, cols: 80 };

    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    /// Replaces a zero dimension with the default.
    pub fn or_default(self) -> Self {
        if self.rows == 0 || self.cols == 0 {
            Self::DEFAULT
        } else {
            self
        }
    }

    pub(crate) fn to_pty_size(self) -> PtySize {
        PtySize {
            rows: self.rows,
            cols: self.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

/// What to run inside the pty.
#[derive(Debug, Clone, Default)]
pub struct CommandConfig {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// Extra environment variables, applied on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// Working directory; the current directory when unset.
    pub cwd: Option<PathBuf>,
    /// Initial terminal size; 24x80 when either dimension is zero.
    pub size: TermSize,
}

impl CommandConfig {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_size(mut self, size: TermSize) -> Self {
        self.size = size;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    /// Fills in defaults. An empty argv is the only hard failure.
    pub fn normalize(mut self) -> Result<Self> {
        if self.argv.is_empty() || self.argv[0].is_empty() {
            return Err(Error::EmptyCommand);
        }

        self.size = self.size.or_default();

        if !self.env.iter().any(|(key, _)| key == "TERM") {
            self.env
                .push(("TERM".to_string(), "xterm-256color".to_string()));
        }

        if self.cwd.is_none() {
            self.cwd = std::env::current_dir().ok();
        }

        Ok(self)
    }

    pub(crate) fn to_command_builder(&self) -> CommandBuilder {
        let mut cmd = CommandBuilder::from_argv(self.argv.iter().map(OsString::from).collect());
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &self.cwd {
            cmd.cwd(cwd);
        }
        cmd
    }
}
