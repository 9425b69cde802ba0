//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::call::Optimizer;
use crate::error::TransformResult;
use crate::sample::parse_duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transform engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Unit used when derivative or integral omit one
    #[serde(default = "default_unit")]
    pub default_unit: String,

    #[serde(default)]
    pub holt_winters: HoltWintersConfig,
}

fn default_unit() -> String {
    "1s".to_string()
}

impl EngineConfig {
    /// Default unit in nanoseconds
    pub fn default_unit_nanos(&self) -> TransformResult<i64> {
        parse_duration(&self.default_unit)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_unit: default_unit(),
            holt_winters: HoltWintersConfig::default(),
        }
    }
}

/// Holt-Winters optimiser configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HoltWintersConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_max_iterations() -> usize {
    1000
}

fn default_epsilon() -> f64 {
    1e-4
}

impl HoltWintersConfig {
    pub fn optimizer(&self) -> Optimizer {
        Optimizer::new()
            .max_iterations(self.max_iterations)
            .epsilon(self.epsilon)
    }
}

impl Default for HoltWintersConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            epsilon: default_epsilon(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        // Try default config locations
        let config_paths = [
            dirs::config_dir().map(|p| p.join("chronicle").join("transform.toml")),
            Some(PathBuf::from("/etc/chronicle/transform.toml")),
            Some(PathBuf::from("./transform.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = self
            .engine
            .default_unit_nanos()
            .map_err(|e| ConfigError::Invalid {
                field: "engine.default_unit",
                error: e.to_string(),
            })?;
        if unit <= 0 {
            return Err(ConfigError::Invalid {
                field: "engine.default_unit",
                error: "must be greater than zero".to_string(),
            });
        }
        let epsilon = self.engine.holt_winters.epsilon;
        if epsilon.is_nan() || epsilon <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "engine.holt_winters.epsilon",
                error: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // Engine overrides
        if let Ok(unit) = std::env::var("CHRONICLE_DEFAULT_UNIT") {
            self.engine.default_unit = unit;
        }
        if let Ok(iterations) = std::env::var("CHRONICLE_HW_MAX_ITERATIONS") {
            if let Ok(n) = iterations.parse() {
                self.engine.holt_winters.max_iterations = n;
            }
        }
        if let Ok(epsilon) = std::env::var("CHRONICLE_HW_EPSILON") {
            if let Ok(e) = epsilon.parse() {
                self.engine.holt_winters.epsilon = e;
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("CHRONICLE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CHRONICLE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid value for {field}: {error}")]
    Invalid { field: &'static str, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Chronicle Transform Configuration
#
# Environment variables override these settings:
# - CHRONICLE_DEFAULT_UNIT
# - CHRONICLE_HW_MAX_ITERATIONS
# - CHRONICLE_HW_EPSILON
# - CHRONICLE_LOG_LEVEL
# - CHRONICLE_LOG_FORMAT

[engine]
# Unit used by derivative() and integral() when the call omits one
default_unit = "1s"

[engine.holt_winters]
# Nelder-Mead iteration cap per starting point
max_iterations = 1000

# Convergence threshold on the spread of the simplex
epsilon = 0.0001

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::MILLISECOND;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.engine.default_unit, "1s");
        assert_eq!(config.engine.default_unit_nanos().unwrap(), 1_000_000_000);
        assert_eq!(config.engine.holt_winters.max_iterations, 1000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.engine.holt_winters.optimizer(), Optimizer::default());
    }

    #[test]
    fn test_generated_config_parses() {
        let file = write_config(&generate_default_config());
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.engine.default_unit, "1s");
        assert_eq!(config.engine.holt_winters.epsilon, 1e-4);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let file = write_config(
            r#"
[engine]
default_unit = "500ms"
"#,
        );
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.engine.default_unit_nanos().unwrap(), 500 * MILLISECOND);
        assert_eq!(config.engine.holt_winters.max_iterations, 1000);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_invalid_unit_rejected() {
        let file = write_config("[engine]\ndefault_unit = \"soon\"\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "engine.default_unit", .. }));
    }

    #[test]
    fn test_parse_errors() {
        let file = write_config("[engine\n");
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));

        assert!(matches!(
            Config::load(Path::new("/nonexistent/transform.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("CHRONICLE_HW_MAX_ITERATIONS", "250");
        std::env::set_var("CHRONICLE_LOG_FORMAT", "json");

        let config = Config::from_env();

        std::env::remove_var("CHRONICLE_HW_MAX_ITERATIONS");
        std::env::remove_var("CHRONICLE_LOG_FORMAT");

        assert_eq!(config.engine.holt_winters.max_iterations, 250);
        assert_eq!(config.logging.format, "json");
    }
}
