use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::stats::StatsConfig;

/// Smallest and largest accepted bucket length.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_INTERVAL: Duration = Duration::from_secs(60);

/// Accepted ring lengths.
pub const MIN_INTERVALS_COUNT: usize = 2;
pub const MAX_INTERVALS_COUNT: usize = 360;

/// Top-level configuration for the errwindow service.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Logging verbosity (debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Sliding-window geometry.
    #[serde(default)]
    pub stats: WindowConfig,

    /// HTTP query and metrics server.
    #[serde(default)]
    pub server: ServerConfig,

    /// Log line input.
    #[serde(default)]
    pub source: SourceConfig,
}

/// Sliding-window geometry.
#[derive(Debug, Deserialize)]
pub struct WindowConfig {
    /// Length of one bucket. Default: 5s.
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Number of buckets in the long window. Default: 120.
    #[serde(default = "default_intervals_count")]
    pub intervals_count: usize,
}

/// HTTP query and metrics server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Listen address. Default: ":9187".
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

/// Log line input configuration.
#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    /// Read log lines from stdin. Default: true.
    #[serde(default = "default_true")]
    pub stdin: bool,

    /// Message fragment marking a slow-statement line. Default: "duration:".
    #[serde(default = "default_slow_marker")]
    pub slow_marker: String,
}

// --- Default value functions ---

fn default_log_level() -> String {
    "info".to_string()
}

fn default_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_intervals_count() -> usize {
    120
}

fn default_server_addr() -> String {
    ":9187".to_string()
}

fn default_true() -> bool {
    true
}

fn default_slow_marker() -> String {
    "duration:".to_string()
}

// --- Default trait impls ---

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            stats: WindowConfig::default(),
            server: ServerConfig::default(),
            source: SourceConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            intervals_count: default_intervals_count(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            stdin: default_true(),
            slow_marker: default_slow_marker(),
        }
    }
}

// --- Validation and loading ---

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Validate the configuration for bounds and required fields.
    pub fn validate(&self) -> Result<()> {
        let interval = self.stats.interval;
        if interval < MIN_INTERVAL || interval > MAX_INTERVAL {
            bail!(
                "stats.interval must be between {}s and {}s, got {:?}",
                MIN_INTERVAL.as_secs(),
                MAX_INTERVAL.as_secs(),
                interval
            );
        }
        if interval.subsec_nanos() % 1_000_000 != 0 {
            bail!("stats.interval must be a whole number of milliseconds, got {interval:?}");
        }

        let count = self.stats.intervals_count;
        if !(MIN_INTERVALS_COUNT..=MAX_INTERVALS_COUNT).contains(&count) {
            bail!(
                "stats.intervals_count must be between {MIN_INTERVALS_COUNT} and \
                 {MAX_INTERVALS_COUNT}, got {count}"
            );
        }

        if self.server.addr.is_empty() {
            bail!("server.addr is required");
        }

        if self.source.slow_marker.is_empty() {
            bail!("source.slow_marker must not be empty");
        }

        Ok(())
    }

    /// Window geometry for the statistics service.
    pub fn stats_config(&self) -> StatsConfig {
        StatsConfig {
            interval: self.stats.interval,
            intervals_count: self.stats.intervals_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.stats.interval, Duration::from_secs(5));
        assert_eq!(cfg.stats.intervals_count, 120);
        assert_eq!(cfg.server.addr, ":9187");
        assert!(cfg.source.stdin);
        assert_eq!(cfg.source.slow_marker, "duration:");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_stats_config_conversion() {
        let cfg = Config::default();
        let stats = cfg.stats_config();
        assert_eq!(stats.interval, Duration::from_secs(5));
        assert_eq!(stats.intervals_count, 120);
    }

    #[test]
    fn test_validation_interval_bounds() {
        let mut cfg = Config::default();
        cfg.stats.interval = Duration::from_millis(999);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("stats.interval"));

        cfg.stats.interval = Duration::from_secs(61);
        assert!(cfg.validate().is_err());

        cfg.stats.interval = Duration::from_secs(60);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validation_sub_millisecond_interval() {
        let mut cfg = Config::default();
        cfg.stats.interval = Duration::from_micros(1_500_500);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("whole number of milliseconds"));
    }

    #[test]
    fn test_validation_intervals_count_bounds() {
        let mut cfg = Config::default();
        cfg.stats.intervals_count = 1;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("stats.intervals_count"));

        cfg.stats.intervals_count = 361;
        assert!(cfg.validate().is_err());

        cfg.stats.intervals_count = 2;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validation_empty_fields() {
        let mut cfg = Config::default();
        cfg.server.addr.clear();
        assert!(cfg
            .validate()
            .unwrap_err()
            .to_string()
            .contains("server.addr"));

        let mut cfg = Config::default();
        cfg.source.slow_marker.clear();
        assert!(cfg
            .validate()
            .unwrap_err()
            .to_string()
            .contains("slow_marker"));
    }

    #[test]
    fn test_parse_yaml_with_defaults() {
        let yaml = r#"
stats:
  interval: 10s
server:
  addr: "127.0.0.1:9000"
"#;
        let cfg: Config = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(cfg.stats.interval, Duration::from_secs(10));
        assert_eq!(cfg.stats.intervals_count, 120);
        assert_eq!(cfg.server.addr, "127.0.0.1:9000");
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.source.stdin);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "log_level: debug\nstats:\n  interval: 2s\n  intervals_count: 30\nsource:\n  stdin: false"
        )
        .expect("write");

        let cfg = Config::load(file.path()).expect("load");
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.stats.interval, Duration::from_secs(2));
        assert_eq!(cfg.stats.intervals_count, 30);
        assert!(!cfg.source.stdin);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "stats:\n  intervals_count: 1000").expect("write");

        let err = Config::load(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("intervals_count"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/errwindow.yaml")).unwrap_err();
        assert!(err.to_string().contains("reading config file"));
    }

    #[test]
    fn test_load_or_default_without_path() {
        let cfg = Config::load_or_default(None).expect("defaults");
        assert_eq!(cfg.server.addr, ":9187");
    }
}
