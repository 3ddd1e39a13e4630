//! Per-workspace mirror settings: `config/config.toml`, then `config/<env>.toml`

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment selecting the overlay file; `development` when unset
pub const ENV_VAR: &str = "MIRRORFS_ENV";

/// Files layered for `workspace_root`, lowest precedence first
pub fn candidates(workspace_root: &Path) -> Vec<PathBuf> {
    let directory = workspace_root.join("config");
    let overlay = std::env::var(ENV_VAR).unwrap_or_else(|_| "development".to_string());
    vec![
        directory.join("config.toml"),
        directory.join(overlay).with_extension("toml"),
    ]
}

pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    for path in candidates(workspace_root).into_iter().filter(|p| p.is_file()) {
        debug!(path = %path.display(), "Layering workspace mirror config");
        builder = builder.add_source(File::from(path).format(FileFormat::Toml));
    }
    Ok(builder)
}
