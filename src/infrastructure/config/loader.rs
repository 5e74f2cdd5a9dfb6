use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project config file, relative to the working directory.
pub const PROJECT_CONFIG_FILE: &str = "airtrack.yaml";
/// Local overrides, relative to the working directory.
pub const LOCAL_CONFIG_FILE: &str = ".airtrack/local.yaml";
/// Prefix of environment overrides; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "AIRTRACK_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database URL cannot be empty")]
    EmptyDatabaseUrl,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid {name}: {value}. Must be positive")]
    InvalidWindow { name: &'static str, value: i64 },

    #[error("Invalid {name}: {value}. Must be at most {max}")]
    WindowTooLarge { name: &'static str, value: i64, max: i64 },

    #[error("Invalid phase window: {0}. Must be at least 2")]
    InvalidPhaseWindow(usize),

    #[error("Invalid lookup timeout: {0}s. Must be at least 1")]
    InvalidLookupTimeout(u64),

    #[error("Invalid max_concurrent_lookups: {0}. Must be at least 1")]
    InvalidLookupConcurrency(usize),

    #[error("Invalid cache_capacity: {0}. Must be at least 1 when set")]
    InvalidCacheCapacity(u64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
/// Longest accepted window in minutes (366 days).
pub const MAX_WINDOW_MINUTES: i64 = 366 * 24 * 60;

/// Longest accepted window in hours (366 days).
pub const MAX_WINDOW_HOURS: i64 = 366 * 24;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. airtrack.yaml (project config)
    /// 3. .airtrack/local.yaml (local overrides, optional)
    /// 4. Environment variables (AIRTRACK_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_layered(&[
            PathBuf::from(PROJECT_CONFIG_FILE),
            PathBuf::from(LOCAL_CONFIG_FILE),
        ])
    }

    /// Load with an explicit list of YAML layers, later files winning.
    ///
    /// Missing files are skipped. Environment overrides are applied last.
    pub fn load_layered(files: &[PathBuf]) -> Result<Config> {
        let figment = files
            .iter()
            .fold(Figment::new().merge(Serialized::defaults(Config::default())), |f, path| {
                f.merge(Yaml::file(path))
            })
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, without environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.url.trim().is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let windows = [
            ("active_window_minutes", config.aggregator.active_window_minutes, MAX_WINDOW_MINUTES),
            (
                "inactivity_window_minutes",
                config.aggregator.inactivity_window_minutes,
                MAX_WINDOW_MINUTES,
            ),
            ("retention_hours", config.aggregator.retention_hours, MAX_WINDOW_HOURS),
            (
                "continuity_window_hours",
                config.persistence.continuity_window_hours,
                MAX_WINDOW_HOURS,
            ),
        ];
        for (name, value, max) in windows {
            if value <= 0 {
                return Err(ConfigError::InvalidWindow { name, value });
            }
            if value > max {
                return Err(ConfigError::WindowTooLarge { name, value, max });
            }
        }

        let phase = &config.aggregator.phase;
        if phase.window < 2 {
            return Err(ConfigError::InvalidPhaseWindow(phase.window));
        }
        if !(phase.low_altitude_ceiling.is_finite() && phase.climb_threshold.is_finite())
            || phase.climb_threshold < 0.0
        {
            return Err(ConfigError::ValidationFailed(
                "phase thresholds must be finite and climb_threshold non-negative".to_string(),
            ));
        }

        if config.metadata.timeout_secs == 0 {
            return Err(ConfigError::InvalidLookupTimeout(config.metadata.timeout_secs));
        }

        if config.metadata.max_concurrent_lookups == 0 {
            return Err(ConfigError::InvalidLookupConcurrency(
                config.metadata.max_concurrent_lookups,
            ));
        }

        if config.metadata.cache_capacity == Some(0) {
            return Err(ConfigError::InvalidCacheCapacity(0));
        }

        if config.routes.cache_ttl_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "routes cache_ttl_secs must be positive".to_string(),
            ));
        }

        if config.metadata.external_lookup && config.metadata.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "metadata base_url cannot be empty when external_lookup is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.database.enabled);
        assert_eq!(config.database.url, "sqlite:.airtrack/airtrack.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.aggregator.active_window_minutes, 30);
        assert_eq!(config.persistence.continuity_window_hours, 4);
        assert_eq!(config.aggregator.phase.window, 5);
        assert!(!config.metadata.external_lookup);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  url: sqlite:/var/lib/airtrack/flights.db
  max_connections: 8
logging:
  level: debug
  format: pretty
aggregator:
  retention_hours: 12
  phase:
    low_altitude_ceiling: 1500.0
metadata:
  external_lookup: true
  cache_capacity: 50000
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.url, "sqlite:/var/lib/airtrack/flights.db");
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.aggregator.retention_hours, 12);
        assert_eq!(config.aggregator.inactivity_window_minutes, 60);
        assert!((config.aggregator.phase.low_altitude_ceiling - 1500.0).abs() < f64::EPSILON);
        assert_eq!(config.aggregator.phase.window, 5);
        assert_eq!(config.metadata.cache_capacity, Some(50_000));

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "verbose"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn test_validate_database() {
        let mut config = Config::default();
        config.database.url = "  ".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyDatabaseUrl)
        ));

        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxConnections(0))
        ));
    }

    #[test]
    fn test_validate_oversized_windows() {
        let mut config = Config::default();
        config.persistence.continuity_window_hours = 10_000_000_000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::WindowTooLarge {
                name: "continuity_window_hours",
                max: MAX_WINDOW_HOURS,
                ..
            })
        ));

        let mut config = Config::default();
        config.aggregator.active_window_minutes = MAX_WINDOW_MINUTES + 1;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::WindowTooLarge { name: "active_window_minutes", .. })
        ));

        let mut config = Config::default();
        config.aggregator.retention_hours = MAX_WINDOW_HOURS;
        config.aggregator.inactivity_window_minutes = MAX_WINDOW_MINUTES;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_route_cache_ttl() {
        let mut config = Config::default();
        config.routes.cache_ttl_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_validate_zero_windows() {
        let mut config = Config::default();
        config.aggregator.retention_hours = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidWindow { name: "retention_hours", value: 0 })
        ));

        let mut config = Config::default();
        config.persistence.continuity_window_hours = -1;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidWindow { name: "continuity_window_hours", .. })
        ));

        let mut config = Config::default();
        config.aggregator.phase.window = 1;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidPhaseWindow(1))
        ));
    }

    #[test]
    fn test_validate_metadata() {
        let mut config = Config::default();
        config.metadata.timeout_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLookupTimeout(0))
        ));

        let mut config = Config::default();
        config.metadata.max_concurrent_lookups = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLookupConcurrency(0))
        ));

        let mut config = Config::default();
        config.metadata.cache_capacity = Some(0);
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidCacheCapacity(0))
        ));
    }

    #[test]
    fn test_hierarchical_merging() {
        let base = yaml_file("logging:\n  level: info\n  format: json\naggregator:\n  retention_hours: 6\n");
        let local = yaml_file("logging:\n  level: debug\n");

        let config = temp_env::with_vars_unset(["AIRTRACK_LOGGING__LEVEL"], || {
            ConfigLoader::load_layered(&[base.path().to_path_buf(), local.path().to_path_buf()])
        })
        .unwrap();

        assert_eq!(config.logging.level, "debug", "Override should win");
        assert_eq!(config.logging.format, "json", "Base value should persist");
        assert_eq!(config.aggregator.retention_hours, 6);
    }

    #[test]
    fn test_env_override_wins_over_files() {
        let base = yaml_file("logging:\n  level: info\ndatabase:\n  max_connections: 3\n");

        let config = temp_env::with_vars(
            [
                ("AIRTRACK_LOGGING__LEVEL", Some("warn")),
                ("AIRTRACK_DATABASE__MAX_CONNECTIONS", Some("12")),
                ("AIRTRACK_METADATA__EXTERNAL_LOOKUP", Some("true")),
            ],
            || ConfigLoader::load_layered(&[base.path().to_path_buf()]),
        )
        .unwrap();

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.database.max_connections, 12);
        assert!(config.metadata.external_lookup);
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let config = temp_env::with_vars_unset(["AIRTRACK_LOGGING__LEVEL"], || {
            ConfigLoader::load_layered(&[PathBuf::from("/nonexistent/airtrack.yaml")])
        })
        .unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_file_values_are_rejected() {
        let file = yaml_file("metadata:\n  max_concurrent_lookups: 0\n");
        let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("max_concurrent_lookups"));
    }
}
