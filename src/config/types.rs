use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::history::Snapshot;
use crate::pty::{CloseConfig, TermSize};

pub const DEFAULT_HISTORY_SIZE: usize = 4096;
pub const DEFAULT_HISTORY_THRESHOLD: f32 = 0.6;

/// Called on the output path when history occupancy crosses the threshold.
pub type OnThreshold = Arc<dyn Fn() + Send + Sync>;

/// Receives a drained snapshot on its own thread when occupancy crosses the threshold.
pub type OnThresholdWithFetch = Arc<dyn Fn(Snapshot) + Send + Sync>;

/// History options for a session.
///
/// Nothing here is ever rejected: a zero size, or a threshold that is zero,
/// negative or NaN, falls back to the defaults. A threshold at or above 1.0
/// disables both callbacks.
#[derive(Clone)]
pub struct HistoryConfig {
    /// Maximum number of bytes kept in the history buffer.
    pub size: usize,

    /// Buffer usage fraction (0.0 - 1.0) that triggers the callbacks.
    pub threshold: f32,

    /// Runs synchronously and blocks terminal output processing until it
    /// returns. It fires again for every scrolled line while occupancy stays
    /// above the threshold, so consume history soon. Must not call back into
    /// the session.
    pub on_threshold: Option<OnThreshold>,

    /// Runs on a fresh thread with a snapshot that already drained history.
    pub on_threshold_with_fetch: Option<OnThresholdWithFetch>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_HISTORY_SIZE,
            threshold: DEFAULT_HISTORY_THRESHOLD,
            on_threshold: None,
            on_threshold_with_fetch: None,
        }
    }
}

impl fmt::Debug for HistoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryConfig")
            .field("size", &self.size)
            .field("threshold", &self.threshold)
            .field("on_threshold", &self.on_threshold.is_some())
            .field("on_threshold_with_fetch", &self.on_threshold_with_fetch.is_some())
            .finish()
    }
}

impl HistoryConfig {
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn on_threshold(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_threshold = Some(Arc::new(callback));
        self
    }

    pub fn on_threshold_with_fetch(
        mut self,
        callback: impl Fn(Snapshot) + Send + Sync + 'static,
    ) -> Self {
        self.on_threshold_with_fetch = Some(Arc::new(callback));
        self
    }
}

impl From<&HistorySettings> for HistoryConfig {
    fn from(settings: &HistorySettings) -> Self {
        Self {
            size: settings.size,
            threshold: settings.threshold,
            ..Self::default()
        }
    }
}

/// Root of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub history: HistorySettings,
    pub terminal: TerminalSettings,
    pub close: CloseSettings,
}

/// `[history]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// History buffer size in bytes.
    pub size: usize,
    /// Buffer usage fraction that triggers delivery.
    pub threshold: f32,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            size: DEFAULT_HISTORY_SIZE,
            threshold: DEFAULT_HISTORY_THRESHOLD,
        }
    }
}

/// `[terminal]` table. Zero means "use the default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalSettings {
    pub rows: u16,
    pub cols: u16,
}

impl TerminalSettings {
    pub fn size(&self) -> TermSize {
        TermSize {
            rows: self.rows,
            cols: self.cols,
        }
    }
}

/// `[close]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloseSettings {
    /// How long the child may take to exit after input is closed before it is killed.
    pub grace_period_ms: u64,
}

impl From<&CloseSettings> for CloseConfig {
    fn from(settings: &CloseSettings) -> Self {
        CloseConfig {
            grace_period: Duration::from_millis(settings.grace_period_ms),
        }
    }
}
