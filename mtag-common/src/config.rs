//! Configuration loading
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (applied by the binary on top of [`EditorConfig`])
//! 2. Environment variables (`MTAG_*`)
//! 3. TOML configuration file
//! 4. Built-in defaults
//!
//! The TOML file is looked up at the path given on the command line, then
//! `$MTAG_CONFIG`, then `<config dir>/mtag/config.toml`. A missing file is not
//! an error; a malformed one is.

use crate::schema::Schema;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "MTAG_CONFIG";

const DEFAULT_MAX_FILE_SIZE: u64 = 500 * 1024 * 1024;
const DEFAULT_BACKUP_RETRY_LIMIT: u32 = 10;
const DEFAULT_MIN_FILES_FOR_PARALLEL: usize = 10;

/// Editor configuration
///
/// Built once before any file is dispatched and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    /// Files larger than this fail validation (bytes)
    pub max_file_size: u64,

    /// Numbered backup names tried before giving up when `force` is set
    pub backup_retry_limit: u32,

    /// Worker count; `None` uses available parallelism
    pub max_workers: Option<usize>,

    /// Batches smaller than this run sequentially
    pub min_files_for_parallel: usize,

    /// Schema used for reads when none is given
    pub default_schema: Schema,

    /// Item delimiter for list values
    pub delimiter: String,

    /// Re-read files after writing
    pub verify: bool,

    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (logs to stderr only if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            backup_retry_limit: DEFAULT_BACKUP_RETRY_LIMIT,
            max_workers: None,
            min_files_for_parallel: DEFAULT_MIN_FILES_FOR_PARALLEL,
            default_schema: Schema::Extended,
            delimiter: ";".to_string(),
            verify: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl EditorConfig {
    /// Resolve configuration from file, environment and defaults
    ///
    /// `explicit` is the `--config` argument. An explicit path that does not
    /// exist is an error; the fallback locations are optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            }
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                Some(path) => {
                    debug!(path = %path.display(), "No config file, using defaults");
                    Self::default()
                }
                None => {
                    warn!("Could not determine config directory, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file (no environment overrides)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {}", path.display(), e)))?;
        let config = Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Overlay `MTAG_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_parse::<u64>("MTAG_MAX_FILE_SIZE")? {
            self.max_file_size = v;
        }
        if let Some(v) = env_parse::<u32>("MTAG_BACKUP_RETRY_LIMIT")? {
            self.backup_retry_limit = v;
        }
        if let Some(v) = env_parse::<usize>("MTAG_MAX_WORKERS")? {
            self.max_workers = Some(v);
        }
        if let Some(v) = env_parse::<usize>("MTAG_MIN_PARALLEL")? {
            self.min_files_for_parallel = v;
        }
        if let Ok(v) = std::env::var("MTAG_SCHEMA") {
            self.default_schema = v
                .parse()
                .map_err(|e| Error::Config(format!("MTAG_SCHEMA: {}", e)))?;
        }
        if let Ok(v) = std::env::var("MTAG_DELIMITER") {
            self.delimiter = v;
        }
        if let Ok(v) = std::env::var("MTAG_LOG_LEVEL") {
            self.logging.level = v;
        }
        Ok(())
    }

    /// Reject values no run could use
    pub fn validate(&self) -> Result<()> {
        if self.max_file_size == 0 {
            return Err(Error::Config("max_file_size must be greater than 0".to_string()));
        }
        if self.max_workers == Some(0) {
            return Err(Error::Config("max_workers must be at least 1".to_string()));
        }
        if self.delimiter.is_empty() {
            return Err(Error::Config("delimiter must not be empty".to_string()));
        }
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" | "off" => Ok(()),
            other => Err(Error::Config(format!("unknown log level '{}'", other))),
        }
    }
}

/// `$MTAG_CONFIG`, else `<config dir>/mtag/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("mtag").join("config.toml"))
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}={:?}: {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        for name in [
            CONFIG_ENV,
            "MTAG_MAX_FILE_SIZE",
            "MTAG_BACKUP_RETRY_LIMIT",
            "MTAG_MAX_WORKERS",
            "MTAG_MIN_PARALLEL",
            "MTAG_SCHEMA",
            "MTAG_DELIMITER",
            "MTAG_LOG_LEVEL",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.max_file_size, 500 * 1024 * 1024);
        assert_eq!(config.backup_retry_limit, 10);
        assert_eq!(config.default_schema, Schema::Extended);
        assert_eq!(config.delimiter, ";");
        assert!(config.verify);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EditorConfig::from_toml(
            r#"
            max_workers = 4
            default_schema = "raw"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_workers, Some(4));
        assert_eq!(config.default_schema, Schema::Raw);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.min_files_for_parallel, 10);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        assert!(matches!(
            EditorConfig::from_toml("max_workers = \"many\""),
            Err(Error::Config(_))
        ));
        assert!(EditorConfig::from_toml("no_such_key = 1").is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = EditorConfig {
            max_workers: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_workers = 2\ndelimiter = \"|\"").unwrap();

        std::env::set_var("MTAG_MAX_WORKERS", "6");
        let config = EditorConfig::load(Some(file.path())).unwrap();
        clear_env();

        assert_eq!(config.max_workers, Some(6));
        assert_eq!(config.delimiter, "|");
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_error() {
        clear_env();
        std::env::set_var("MTAG_MAX_FILE_SIZE", "big");
        let result = EditorConfig::load(Some(Path::new("/nonexistent/mtag.toml")));
        assert!(result.is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "verify = false").unwrap();
        let result = EditorConfig::load(Some(file.path()));
        clear_env();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn test_missing_default_file_uses_defaults() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var(CONFIG_ENV, dir.path().join("absent.toml"));
        let config = EditorConfig::load(None).unwrap();
        clear_env();
        assert_eq!(config, EditorConfig::default());
    }
}
