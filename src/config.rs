//! Configuration System
//!
//! Layered configuration for the publisher: where the content root lives, whether entries
//! are watched, and how logging is set up. Sources are merged by
//! [`ConfigLoader`] with environment variable overrides and validated before use.

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod facade;
mod merge;
pub mod paths;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Content root location
    #[serde(default)]
    pub content: ContentConfig,

    /// Change observation
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Category of well-known directory the content root lives in
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPath {
    #[default]
    Data,
    Config,
    Cache,
    Documents,
    Desktop,
    Home,
    /// Exactly this directory
    Custom(PathBuf),
}

/// Whether per-user data may roam or stays on this machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    #[default]
    User,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default)]
    pub search_path: SearchPath,

    #[serde(default)]
    pub domain: Domain,

    #[serde(default = "default_qualifier")]
    pub qualifier: String,

    #[serde(default = "default_organization")]
    pub organization: String,

    #[serde(default = "default_application")]
    pub application: String,
}

fn default_qualifier() -> String {
    "org".to_string()
}

fn default_organization() -> String {
    "mirrorfs".to_string()
}

fn default_application() -> String {
    "mirrorfs".to_string()
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            search_path: SearchPath::default(),
            domain: Domain::default(),
            qualifier: default_qualifier(),
            organization: default_organization(),
            application: default_application(),
        }
    }
}

impl ContentConfig {
    /// Content rooted at exactly `directory`
    pub fn custom(directory: impl Into<PathBuf>) -> Self {
        Self {
            search_path: SearchPath::Custom(directory.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.application.trim().is_empty() {
            return Err("Application name cannot be empty".to_string());
        }
        if let SearchPath::Custom(path) = &self.search_path {
            if path.as_os_str().is_empty() {
                return Err("Custom content root cannot be empty".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Register OS watches for observable entries
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Events for paths ending in any of these suffixes are ignored
    #[serde(default = "default_ignore_suffixes")]
    pub ignore_suffixes: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_ignore_suffixes() -> Vec<String> {
    vec![crate::fs::TEMP_SUFFIX.to_string()]
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ignore_suffixes: default_ignore_suffixes(),
        }
    }
}

impl ObserverConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.ignore_suffixes.iter().any(|suffix| suffix.is_empty()) {
            return Err("Ignore suffixes cannot be empty strings".to_string());
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Content(String),
    Observer(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Content(msg) => write!(f, "Content: {}", msg),
            ValidationError::Observer(msg) => write!(f, "Observer: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

impl MirrorConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.content.validate() {
            errors.push(ValidationError::Content(e));
        }

        if let Err(e) = self.observer.validate() {
            errors.push(ValidationError::Observer(e));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::Logging(format!(
                "Unknown log level '{}'",
                self.logging.level
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
