mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{
    CloseSettings, HistoryConfig, HistorySettings, OnThreshold, OnThresholdWithFetch, Settings,
    TerminalSettings, DEFAULT_HISTORY_SIZE, DEFAULT_HISTORY_THRESHOLD,
};
