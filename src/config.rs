//! Configuration management for flowmeter.

use serde::{Deserialize, Serialize};

use crate::error::{FlowmeterError, Result};
use crate::schedule::SchedulePolicy;
use crate::shaper::{DEFAULT_LIMIT, DEFAULT_RATE};
use crate::stats::DEFAULT_INTERVAL_SECS;

/// Prefix of environment variables overriding file settings,
/// e.g. `FLOWMETER__SHAPER__RATE=50`.
pub const ENV_PREFIX: &str = "FLOWMETER";

/// Main configuration for flowmeter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowmeterConfig {
    /// Token bucket configuration
    #[serde(default)]
    pub shaper: ShaperConfig,

    /// Statistics configuration
    #[serde(default)]
    pub stats: StatsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Token bucket configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaperConfig {
    /// Refill events per second
    #[serde(default = "default_rate")]
    pub rate: u32,

    /// Bucket capacity in tokens
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Refill schedule policy
    #[serde(default)]
    pub schedule: SchedulePolicy,
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            limit: default_limit(),
            schedule: SchedulePolicy::default(),
        }
    }
}

fn default_rate() -> u32 {
    DEFAULT_RATE
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

/// Statistics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Seconds between report rows
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Longest window, in seconds, each counter keeps history for
    #[serde(default = "default_window")]
    pub window_secs: usize,

    /// Report schedule policy
    #[serde(default)]
    pub schedule: SchedulePolicy,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            window_secs: default_window(),
            schedule: SchedulePolicy::default(),
        }
    }
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_window() -> usize {
    60
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `flowmeter=debug`
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl FlowmeterConfig {
    /// Load configuration from a YAML file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: FlowmeterConfig =
            serde_yaml::from_str(yaml).map_err(|e| FlowmeterError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from defaults, an optional YAML file and
    /// `FLOWMETER__*` environment variables, later sources winning.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::with_name(path).format(::config::FileFormat::Yaml),
            );
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: FlowmeterConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the shaper and reporter cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.shaper.rate == 0 {
            return Err(FlowmeterError::Config(
                "shaper.rate must be greater than 0".to_string(),
            ));
        }
        if self.stats.interval_secs == 0 {
            return Err(FlowmeterError::Config(
                "stats.interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FlowmeterConfig::default();

        assert_eq!(config.shaper.rate, 100);
        assert_eq!(config.shaper.limit, 100_000_000);
        assert_eq!(config.shaper.schedule, SchedulePolicy::Drift);
        assert_eq!(config.stats.interval_secs, 5);
        assert_eq!(config.stats.window_secs, 60);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
shaper:
  rate: 50
  schedule: fixed_phase
stats:
  interval_secs: 1
"#;
        let config = FlowmeterConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.shaper.rate, 50);
        assert_eq!(config.shaper.limit, DEFAULT_LIMIT);
        assert_eq!(config.shaper.schedule, SchedulePolicy::FixedPhase);
        assert_eq!(config.stats.interval_secs, 1);
        assert_eq!(config.stats.window_secs, 60);
    }

    #[test]
    fn test_zero_rate_rejected() {
        let err = FlowmeterConfig::from_yaml("shaper:\n  rate: 0\n").unwrap_err();
        assert!(matches!(err, FlowmeterError::Config(ref msg) if msg.contains("shaper.rate")));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = FlowmeterConfig::from_yaml("stats:\n  interval_secs: 0\n").unwrap_err();
        assert!(matches!(err, FlowmeterError::Config(ref msg) if msg.contains("interval_secs")));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = FlowmeterConfig::from_yaml("shaper: [unclosed").unwrap_err();
        assert!(matches!(err, FlowmeterError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = FlowmeterConfig::from_file("/nonexistent/flowmeter.yaml").unwrap_err();
        assert!(matches!(err, FlowmeterError::Io(_)));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("flowmeter-test-{}.yaml", std::process::id()));
        std::fs::write(&path, "shaper:\n  limit: 4096\nstats:\n  window_secs: 10\n").unwrap();

        let config = FlowmeterConfig::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.shaper.limit, 4096);
        assert_eq!(config.shaper.rate, DEFAULT_RATE);
        assert_eq!(config.stats.window_secs, 10);
    }
}
