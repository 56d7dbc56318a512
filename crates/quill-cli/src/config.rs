//! Configuration for the quill command
//!
//! Loads settings from an optional YAML file, then applies environment
//! variable overrides. Variables from a `.env` file are already in the
//! environment by the time this runs.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: String, value: String },
}

/// Parse and decode limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Deepest nesting accepted when parsing text or decoding documents
    pub max_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_depth: quill_parser::DEFAULT_MAX_DEPTH,
        }
    }
}

/// Document output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Indent documents instead of one per line
    pub pretty: bool,

    /// Attach a SHA-256 fingerprint to every document
    pub fingerprint: bool,

    /// Derive display names before encoding
    pub names: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stderr, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
            output: "stderr".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub parser: ParserConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Defaults plus environment variable overrides, for runs without a file
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides from `var`, which looks up a variable by name.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(depth) = var("QUILL_MAX_DEPTH") {
            self.parser.max_depth = parse_var("QUILL_MAX_DEPTH", &depth)?;
        }
        if let Some(pretty) = var("QUILL_PRETTY") {
            self.output.pretty = parse_var("QUILL_PRETTY", &pretty)?;
        }
        if let Some(fingerprint) = var("QUILL_FINGERPRINT") {
            self.output.fingerprint = parse_var("QUILL_FINGERPRINT", &fingerprint)?;
        }

        if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Some(format) = var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(output) = var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Some(dir) = var("LOG_DIR") {
            self.logging.directory = dir;
        }

        if self.parser.max_depth == 0 {
            return Err(ConfigError::Invalid {
                name: "parser.max_depth".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn parse_options(&self) -> quill_parser::ParseOptions {
        quill_parser::ParseOptions {
            max_depth: self.parser.max_depth,
        }
    }

    pub fn decode_options(&self) -> quill_ast::DecodeOptions {
        quill_ast::DecodeOptions {
            max_depth: self.parser.max_depth,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name: name.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.parser.max_depth, 128);
        assert!(!config.output.pretty);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.output, "stderr");
    }

    #[test]
    fn test_partial_yaml() {
        let config: Config = serde_yaml::from_str("parser:\n  max_depth: 32\n").unwrap();
        assert_eq!(config.parser.max_depth, 32);
        assert_eq!(config.logging.format, "compact");
    }

    #[test]
    fn test_env_var_override() {
        let mut config = Config::default();
        config
            .apply_overrides(vars(&[("QUILL_MAX_DEPTH", "64"), ("QUILL_PRETTY", "true"), ("LOG_FORMAT", "json")]))
            .unwrap();
        assert_eq!(config.parser.max_depth, 64);
        assert!(config.output.pretty);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.parse_options().max_depth, 64);
        assert_eq!(config.decode_options().max_depth, 64);
    }

    #[test]
    fn test_invalid_override() {
        let mut config = Config::default();
        assert!(matches!(
            config.apply_overrides(vars(&[("QUILL_MAX_DEPTH", "deep")])),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config.apply_overrides(vars(&[("QUILL_MAX_DEPTH", "0")])),
            Err(ConfigError::Invalid { .. })
        ));
        let mut config: Config = serde_yaml::from_str("parser:\n  max_depth: 0\n").unwrap();
        assert!(matches!(
            config.apply_overrides(vars(&[])),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_load_file() {
        let yaml = "parser:\n  max_depth: 40\noutput:\n  fingerprint: true\nlogging:\n  level: debug\n";
        let path = std::env::temp_dir().join(format!("quill_config_{}.yaml", std::process::id()));
        std::fs::write(&path, yaml).unwrap();

        let mut config: Config = serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        config.apply_overrides(vars(&[])).unwrap();
        assert_eq!(config.parser.max_depth, 40);
        assert!(config.output.fingerprint);
        assert_eq!(config.logging.level, "debug");

        assert!(Config::load(&path).is_ok());
        std::fs::remove_file(path).ok();
    }
}
