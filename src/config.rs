//! Configuration for the vitals agent.

use crate::core::baseline::BaselineConfig;
use crate::core::classifier::Thresholds;
use crate::core::events::EventRules;
use crate::core::report::DEFAULT_REPORT_HISTORY;
use crate::explain::DEFAULT_CAPACITY;
use crate::notify::NotifyConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Baseline learning and adaptation
    pub baseline: BaselineConfig,

    /// Classification cut-offs
    pub thresholds: Thresholds,

    /// Event trigger levels
    pub events: EventRules,

    /// Number of events kept in the timeline
    pub event_log_capacity: usize,

    /// Readings and events kept in memory for the exported report
    pub report_history: usize,

    /// IANA timezone used when printing timestamps
    pub timezone: String,

    /// Path for exporting session reports
    pub export_path: PathBuf,

    /// Path for storing stats
    pub data_path: PathBuf,

    /// Alert webhook, if any
    pub notify: Option<NotifyConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-vitals-agent");

        Self {
            baseline: BaselineConfig::default(),
            thresholds: Thresholds::default(),
            events: EventRules::default(),
            event_log_capacity: DEFAULT_CAPACITY,
            report_history: DEFAULT_REPORT_HISTORY,
            timezone: "UTC".to_string(),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
            notify: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-vitals-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Path of the persisted run statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }

    /// Parsed display timezone; UTC if the name is unknown.
    pub fn display_timezone(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!(timezone = %self.timezone, "unknown timezone, using UTC");
            chrono_tz::Tz::UTC
        })
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.baseline;
        if b.window == 0 {
            return Err(ConfigError::Invalid("baseline.window must be at least 1".into()));
        }
        if !(b.alpha > 0.0 && b.alpha <= 1.0) {
            return Err(ConfigError::Invalid("baseline.alpha must be in (0, 1]".into()));
        }
        let t = &self.thresholds;
        if !(t.mild > 0.0 && t.mild < t.strong) {
            return Err(ConfigError::Invalid(
                "thresholds must satisfy 0 < mild < strong".into(),
            ));
        }
        if let Some(ref notify) = self.notify {
            notify
                .validate()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::baseline::Baseline;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.baseline.window, 15);
        assert_eq!(config.baseline.adapt_start, 10);
        assert_eq!(config.baseline.alpha, 0.1);
        assert_eq!(config.baseline.fallback, Baseline::FALLBACK);
        assert_eq!(config.thresholds.mild, 0.10);
        assert_eq!(config.thresholds.strong, 0.25);
        assert_eq!(config.events.sweat_spike_delta, 100.0);
        assert_eq!(config.event_log_capacity, 50);
        assert_eq!(config.report_history, 1_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"event_log_capacity": 10}"#).unwrap();
        assert_eq!(config.event_log_capacity, 10);
        assert_eq!(config.report_history, DEFAULT_REPORT_HISTORY);
        assert_eq!(config.baseline.window, 15);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.thresholds.mild = 0.3;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.baseline.window = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.notify = Some(NotifyConfig::new("ftp://example.org"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("synheart-vitals-cfg-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.json");

        let mut config = Config::default();
        config.timezone = "Europe/Berlin".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.timezone, "Europe/Berlin");
        assert_eq!(loaded.display_timezone(), chrono_tz::Europe::Berlin);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_unknown_timezone_falls_back() {
        let mut config = Config::default();
        config.timezone = "Mars/Olympus".to_string();
        assert_eq!(config.display_timezone(), chrono_tz::Tz::UTC);
    }
}
