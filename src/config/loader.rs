use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::Settings;

/// Errors that can occur when loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Settings {
    /// Returns the path to the settings file.
    ///
    /// Uses `~/.config/scrollterm/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("scrollterm").join("config.toml")
    }

    /// Loads settings from the default file, or defaults if it doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Settings::default());
        }
        Self::load_from(&path)
    }

    /// Loads and validates settings from `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let settings: Settings = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Out-of-range sizes are normalized later; only a non-finite threshold is refused.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.history.threshold.is_finite() {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "history.threshold must be a finite number, got {}",
                    self.history.threshold
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{CloseSettings, HistorySettings, TerminalSettings};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn full_file_parses() {
        let file = write_config(
            r#"
[history]
size = 8192
threshold = 0.75

[terminal]
rows = 40
cols = 120

[close]
grace_period_ms = 250
"#,
        );

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(
            settings,
            Settings {
                history: HistorySettings {
                    size: 8192,
                    threshold: 0.75,
                },
                terminal: TerminalSettings { rows: 40, cols: 120 },
                close: CloseSettings {
                    grace_period_ms: 250
                },
            }
        );
    }

    #[test]
    fn missing_tables_use_defaults() {
        let file = write_config("[history]\nsize = 1024\n");

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.history.size, 1024);
        assert_eq!(settings.history.threshold, 0.6);
        assert_eq!(settings.terminal, TerminalSettings::default());
        assert_eq!(settings.close.grace_period_ms, 0);
    }

    #[test]
    fn empty_file_is_default() {
        let file = write_config("");
        assert_eq!(Settings::load_from(file.path()).unwrap(), Settings::default());
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let file = write_config("[history\nsize = ");
        let err = Settings::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn wrong_type_is_parse_error() {
        let file = write_config("[history]\nsize = \"big\"\n");
        let err = Settings::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn non_finite_threshold_fails_validation() {
        let file = write_config("[history]\nthreshold = nan\n");
        let err = Settings::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn config_path_ends_with_app_dir() {
        let path = Settings::config_path();
        assert!(path.ends_with("scrollterm/config.toml"));
    }
}
