//! Configuration file management for conncheck.
//!
//! A checker can be described in a TOML file instead of code: the target URL,
//! extra CA bundles to trust, and which layers [`Checker::diagnose_layers`]
//! should check.
//!
//! # Configuration Precedence
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file
//! 3. Values merged in by the caller with [`Config::merge_with`]
//!
//! # Example Configuration File
//!
//! ```toml
//! url = "https://example.com:8443/health"
//! ca_files = ["/etc/ssl/internal-ca.pem"]
//! checks = ["tcp", "tls", "name", "http"]
//! ```
//!
//! [`Checker::diagnose_layers`]: crate::Checker::diagnose_layers

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use strum::IntoEnumIterator;

use crate::Layer;

/// Main configuration structure.
///
/// All fields are optional to support partial configuration and merging.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Target URL
    pub url: Option<String>,
    /// PEM files whose certificates are appended to the trust pool
    pub ca_files: Option<Vec<String>>,
    /// Layers to check: tcp, tls, name, http
    pub checks: Option<Vec<String>>,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use conncheck::config::Config;
    /// let config = Config::from_file("conncheck.toml")?;
    /// # Ok::<(), conncheck::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// `ca_files` are concatenated rather than replaced, since the trust pool
    /// only ever grows.
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.url.is_some() {
            self.url = other.url;
        }
        if let Some(other_files) = other.ca_files {
            match self.ca_files {
                Some(ref mut files) => {
                    for file in other_files {
                        if !files.contains(&file) {
                            files.push(file);
                        }
                    }
                }
                None => self.ca_files = Some(other_files),
            }
        }
        if other.checks.is_some() {
            self.checks = other.checks;
        }
        self
    }

    /// The layers to check, in the order they are listed.
    ///
    /// Returns every layer when `checks` is unset.
    pub fn layers(&self) -> Result<Vec<Layer>, ConfigError> {
        match &self.checks {
            None => Ok(Layer::iter().collect()),
            Some(names) => names
                .iter()
                .map(|name| {
                    Layer::from_str(name.trim()).map_err(|_| {
                        ConfigError::Validation(format!(
                            "unknown check {:?}, expected one of tcp, tls, name, http",
                            name
                        ))
                    })
                })
                .collect(),
        }
    }

    /// Checks that the configuration can build a checker.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.url.as_deref() {
            None => return Err(ConfigError::Validation("url is required".to_string())),
            Some(url) if url.trim().is_empty() => {
                return Err(ConfigError::Validation("url cannot be empty".to_string()))
            }
            Some(_) => {}
        }
        self.layers()?;
        Ok(())
    }

    /// Generates an example configuration file in TOML format.
    pub fn example_toml() -> String {
        let example = Config {
            url: Some("https://example.com:8443/health".to_string()),
            ca_files: Some(vec!["/etc/ssl/internal-ca.pem".to_string()]),
            checks: Some(Layer::iter().map(|layer| layer.to_string()).collect()),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

impl Default for Config {
    /// No url, no extra CA files, every layer checked.
    fn default() -> Self {
        Config {
            url: None,
            ca_files: Some(Vec::new()),
            checks: Some(Layer::iter().map(|layer| layer.to_string()).collect()),
        }
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    Parse(String),
    /// Validation error (missing required fields, invalid values, etc.)
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO Error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse Error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
