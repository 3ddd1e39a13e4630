//! Merge rules: defaults, override order, conflict handling.
//!
//! Later sources win key by key: defaults, then the global file, then workspace files, then
//! the environment.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("content.search_path", "data")?
        .set_default("content.domain", "user")?
        .set_default("content.qualifier", "org")?
        .set_default("content.organization", "mirrorfs")?
        .set_default("content.application", "mirrorfs")?
        .set_default("observer.enabled", true)?
        .set_default("logging.level", "info")
}
