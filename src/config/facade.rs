//! Configuration loading entry point.

use super::merge::merge_policy;
use super::sources::{environment, global_file, workspace_file};
use super::MirrorConfig;
use config::{ConfigError, File};
use std::path::Path;
use tracing::debug;

/// Loads [`MirrorConfig`] from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for `workspace_root`.
    ///
    /// Precedence, lowest first: defaults, global file, `config/config.toml`,
    /// `config/{MIRRORFS_ENV}.toml`, `MIRRORFS__*` environment variables.
    pub fn load(workspace_root: &Path) -> Result<MirrorConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        let config: MirrorConfig = builder.build()?.try_deserialize()?;
        debug!(workspace = %workspace_root.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load configuration from a single file layered over the defaults
    pub fn load_from_file(path: &Path) -> Result<MirrorConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()
    }

    /// Built-in defaults only
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> MirrorConfig {
        MirrorConfig::default()
    }
}
