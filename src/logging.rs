//! Logging
//!
//! Structured logging through `tracing`. The subscriber is built from a [`LoggingConfig`],
//! with environment variables taking precedence:
//!
//! 1. `MIRRORFS_LOG`, `MIRRORFS_LOG_FORMAT`, `MIRRORFS_LOG_OUTPUT`, `MIRRORFS_LOG_MODULES`
//! 2. configuration file
//! 3. defaults (`info`, text, stdout)

use crate::error::MirrorError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = MirrorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(MirrorError::Config(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

impl FromStr for LogOutput {
    type Err = MirrorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            other => Err(MirrorError::Config(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', or 'file')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file used when `output` is `file`
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// ANSI colors for text output on a terminal
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-module levels, e.g. `mirrorfs::observer = "debug"`
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("mirrorfs.log")
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file: default_log_file(),
            color: default_true(),
            modules: BTreeMap::new(),
        }
    }
}

/// Install the global subscriber.
///
/// Fails with a configuration error if a subscriber is already installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), MirrorError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);

    let filter = build_env_filter(config)?;
    let format = match std::env::var("MIRRORFS_LOG_FORMAT") {
        Ok(value) => value.parse()?,
        Err(_) => config.format,
    };
    let output = match std::env::var("MIRRORFS_LOG_OUTPUT") {
        Ok(value) => value.parse()?,
        Err(_) => config.output,
    };

    let registry = Registry::default().with(filter);
    let ansi = config.color && output != LogOutput::File && format == LogFormat::Text;

    let result = match (format, output) {
        (LogFormat::Json, LogOutput::Stdout) => registry
            .with(json_layer().with_writer(std::io::stdout))
            .try_init(),
        (LogFormat::Json, LogOutput::Stderr) => registry
            .with(json_layer().with_writer(std::io::stderr))
            .try_init(),
        (LogFormat::Json, LogOutput::File) => {
            let file = open_log_file(config)?;
            registry.with(json_layer().with_writer(file)).try_init()
        }
        (LogFormat::Text, LogOutput::Stdout) => registry
            .with(text_layer(ansi).with_writer(std::io::stdout))
            .try_init(),
        (LogFormat::Text, LogOutput::Stderr) => registry
            .with(text_layer(ansi).with_writer(std::io::stderr))
            .try_init(),
        (LogFormat::Text, LogOutput::File) => {
            let file = open_log_file(config)?;
            registry.with(text_layer(false).with_writer(file)).try_init()
        }
    };

    result.map_err(|e| MirrorError::Config(format!("Failed to install logger: {}", e)))
}

fn json_layer<S>() -> fmt::Layer<S, fmt::format::JsonFields, fmt::format::Format<fmt::format::Json, ChronoUtc>>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    fmt::layer()
        .json()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
}

fn text_layer<S>(ansi: bool) -> fmt::Layer<S, fmt::format::DefaultFields, fmt::format::Format<fmt::format::Full, ChronoUtc>>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(ansi)
}

fn open_log_file(config: &LoggingConfig) -> Result<std::fs::File, MirrorError> {
    if let Some(parent) = config.file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MirrorError::io("create log directory", parent, e))?;
        }
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)
        .map_err(|e| MirrorError::io("open log file", &config.file, e))
}

/// Build the level filter from `MIRRORFS_LOG`, or from config plus module overrides
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, MirrorError> {
    if let Ok(filter) = EnvFilter::try_from_env("MIRRORFS_LOG") {
        return Ok(filter);
    }

    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(&config.level);
    for (module, level) in &config.modules {
        filter = filter.add_directive(parse_directive(module, level)?);
    }

    if let Ok(modules) = std::env::var("MIRRORFS_LOG_MODULES") {
        for (module, level) in parse_module_levels(&modules) {
            filter = filter.add_directive(parse_directive(&module, &level)?);
        }
    }

    Ok(filter)
}

fn parse_directive(
    module: &str,
    level: &str,
) -> Result<tracing_subscriber::filter::Directive, MirrorError> {
    format!("{}={}", module, level)
        .parse()
        .map_err(|e| MirrorError::Config(format!("Invalid log directive: {}", e)))
}

/// Parse `module=level` pairs separated by commas; malformed pairs are skipped
fn parse_module_levels(pairs: &str) -> Vec<(String, String)> {
    pairs.split(',')
        .filter_map(|pair| {
            let (module, level) = pair.split_once('=')?;
            let (module, level) = (module.trim(), level.trim());
            (!module.is_empty() && !level.is_empty()).then(|| (module.to_string(), level.to_string()))
        })
        .collect()
}
