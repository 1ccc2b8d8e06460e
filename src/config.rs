//! Configuration management for the telemetry engine
//!
//! Provides persistent configuration that is saved to and loaded from a
//! platform-specific config file.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/typing-telemetry/config.toml` |
//! | macOS | `~/Library/Application Support/typing-telemetry/config.toml` |
//! | Windows | `%APPDATA%\typing-telemetry\config.toml` |
//!
//! ## Example
//!
//! ```no_run
//! use typing_telemetry::EngineConfig;
//!
//! // Load existing config or use defaults
//! let mut config = EngineConfig::load().unwrap_or_default();
//!
//! // Modify settings
//! config.analysis.top_digraphs = 5;
//!
//! // Save to disk
//! config.save().expect("Failed to save config");
//! ```

use crate::error::ConfigRejection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration file operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to determine config directory
    #[error("Could not determine config directory")]
    NoConfigDir,
    /// IO error reading or writing config file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Failed to parse config file
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Failed to serialize config
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// Parsed values are out of range
    #[error("Invalid value: {0}")]
    Invalid(#[from] ConfigRejection),
}

/// Returns the path to the config file.
///
/// Creates the config directory if it doesn't exist.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    let app_dir = config_dir.join("typing-telemetry");

    if !app_dir.exists() {
        fs::create_dir_all(&app_dir)?;
    }

    Ok(app_dir.join("config.toml"))
}

/// Main engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Live metric settings
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Combo tracking settings
    #[serde(default)]
    pub combo: ComboConfig,
    /// Error and digraph analysis settings
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Report layout settings
    #[serde(default)]
    pub report: ReportConfig,
    /// Thresholds for report recommendations
    #[serde(default)]
    pub recommendations: RecommendationThresholds,
}

/// Live metric configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Trailing window for WPM and consistency, in seconds
    pub window_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { window_secs: 60 }
    }
}

/// Combo configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComboConfig {
    /// Combo lengths that are announced once per combo run
    pub milestones: Vec<u32>,
}

impl Default for ComboConfig {
    fn default() -> Self {
        Self {
            milestones: vec![10, 25, 50, 100, 200],
        }
    }
}

/// Error and digraph analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of slow digraphs surfaced in the report
    pub top_digraphs: usize,
    /// Minimum relative slowness for a digraph to be surfaced (0.08 = 8% slower)
    pub slowness_threshold: f64,
    /// Samples a digraph needs before it is ranked
    pub min_digraph_samples: u64,
    /// Latencies at or above this are pauses, not rhythm
    pub max_digraph_latency_ms: u64,
    /// Number of ranked mistakes in the report
    pub top_mistakes: usize,
    /// Number of problem keys in the report
    pub top_problem_keys: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_digraphs: 3,
            slowness_threshold: 0.08,
            min_digraph_samples: 2,
            max_digraph_latency_ms: 2000,
            top_mistakes: 5,
            top_problem_keys: 5,
        }
    }
}

/// Report layout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Width of each WPM timeline bucket, in seconds
    pub wpm_bucket_secs: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { wpm_bucket_secs: 5 }
    }
}

/// Thresholds driving report recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecommendationThresholds {
    /// Accuracy (percent) below which speed is considered too high
    pub accuracy_floor: f64,
    /// Consistency score below which rhythm practice is suggested
    pub consistency_floor: f64,
    /// Per-key error rate (0..1) that marks a key for drilling
    pub problem_key_error_rate: f64,
    /// Accuracy (percent) at or above which pushing speed is suggested
    pub precision_ceiling: f64,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            accuracy_floor: 95.0,
            consistency_floor: 6.0,
            problem_key_error_rate: 0.10,
            precision_ceiling: 98.0,
        }
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigRejection> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigRejection::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}

impl EngineConfig {
    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed or validated.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default config file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check every value is usable before a session is built from it
    pub fn validate(&self) -> Result<(), ConfigRejection> {
        if self.metrics.window_secs == 0 {
            return Err(ConfigRejection::EmptyWindow);
        }
        if self.report.wpm_bucket_secs == 0 {
            return Err(ConfigRejection::EmptyBucket);
        }
        if self.analysis.top_digraphs == 0 {
            return Err(ConfigRejection::ZeroCount {
                name: "analysis.top_digraphs",
            });
        }
        if self.analysis.min_digraph_samples == 0 {
            return Err(ConfigRejection::ZeroCount {
                name: "analysis.min_digraph_samples",
            });
        }
        if self.analysis.max_digraph_latency_ms == 0 {
            return Err(ConfigRejection::ZeroCount {
                name: "analysis.max_digraph_latency_ms",
            });
        }
        if self.combo.milestones.contains(&0) {
            return Err(ConfigRejection::ZeroCount {
                name: "combo.milestones",
            });
        }
        check_range(
            "analysis.slowness_threshold",
            self.analysis.slowness_threshold,
            0.0,
            f64::MAX,
        )?;

        let t = &self.recommendations;
        check_range("recommendations.accuracy_floor", t.accuracy_floor, 0.0, 100.0)?;
        check_range(
            "recommendations.consistency_floor",
            t.consistency_floor,
            0.0,
            10.0,
        )?;
        check_range(
            "recommendations.problem_key_error_rate",
            t.problem_key_error_rate,
            0.0,
            1.0,
        )?;
        check_range(
            "recommendations.precision_ceiling",
            t.precision_ceiling,
            0.0,
            100.0,
        )?;
        Ok(())
    }

    /// Trailing metrics window as Duration
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.metrics.window_secs)
    }

    /// WPM timeline bucket width as Duration
    pub fn wpm_bucket(&self) -> Duration {
        Duration::from_secs(self.report.wpm_bucket_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_config_path(tag: &str) -> PathBuf {
        env::temp_dir().join(format!(
            "typing-telemetry-test-{}-{}.toml",
            tag,
            std::process::id()
        ))
    }

    #[test]
    fn config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.metrics.window_secs, 60);
        assert_eq!(config.combo.milestones, vec![10, 25, 50, 100, 200]);
        assert_eq!(config.analysis.top_digraphs, 3);
        assert_eq!(config.analysis.slowness_threshold, 0.08);
        assert_eq!(config.analysis.min_digraph_samples, 2);
        assert_eq!(config.report.wpm_bucket_secs, 5);
        assert_eq!(config.recommendations.accuracy_floor, 95.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_window_duration() {
        let mut config = EngineConfig::default();
        assert_eq!(config.window(), Duration::from_secs(60));
        config.metrics.window_secs = 15;
        assert_eq!(config.window(), Duration::from_secs(15));
    }

    #[test]
    fn config_save_and_load_roundtrip() {
        let path = temp_config_path("roundtrip");

        let mut config = EngineConfig::default();
        config.metrics.window_secs = 30;
        config.analysis.slowness_threshold = 0.15;

        config.save_to(&path).expect("Failed to save config");
        let loaded = EngineConfig::load_from(&path).expect("Failed to load config");

        assert_eq!(loaded, config);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn config_load_missing_file_fails() {
        let path = PathBuf::from("/nonexistent/path/config.toml");
        let result = EngineConfig::load_from(&path);
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn config_partial_toml_uses_defaults() {
        let toml_str = r#"
[metrics]
window_secs = 20
"#;
        let config: EngineConfig = toml::from_str(toml_str).expect("Failed to deserialize");
        assert_eq!(config.metrics.window_secs, 20);
        assert_eq!(config.analysis, AnalysisConfig::default());
        assert_eq!(config.recommendations, RecommendationThresholds::default());
    }

    #[test]
    fn config_rejects_unknown_threshold() {
        let toml_str = r#"
[recommendations]
accuracy_floor = 90.0
consistency_floor = 5.0
problem_key_error_rate = 0.2
precision_ceiling = 99.0
typo_budget = 3
"#;
        let result: Result<EngineConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn config_rejects_out_of_range_values() {
        let mut config = EngineConfig::default();
        config.recommendations.accuracy_floor = 120.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigRejection::OutOfRange {
                name: "recommendations.accuracy_floor",
                ..
            })
        ));

        let mut config = EngineConfig::default();
        config.metrics.window_secs = 0;
        assert_eq!(config.validate(), Err(ConfigRejection::EmptyWindow));

        let mut config = EngineConfig::default();
        config.analysis.slowness_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_load_rejects_invalid_file() {
        let path = temp_config_path("invalid");
        fs::write(&path, "[report]\nwpm_bucket_secs = 0\n").unwrap();

        let result = EngineConfig::load_from(&path);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid(ConfigRejection::EmptyBucket))
        ));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn config_serializes_to_toml() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("Failed to serialize");

        assert!(toml_str.contains("[metrics]"));
        assert!(toml_str.contains("[analysis]"));
        assert!(toml_str.contains("[recommendations]"));
        assert!(toml_str.contains("window_secs = 60"));
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::NoConfigDir;
        assert_eq!(err.to_string(), "Could not determine config directory");

        let io_err = ConfigError::Io(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        assert!(io_err.to_string().contains("IO error"));
    }
}
