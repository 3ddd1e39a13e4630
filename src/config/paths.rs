//! Content root resolution.
//!
//! The content root is a function of the search path category, the domain, and the
//! application identity. Application-scoped categories resolve through
//! `directories::ProjectDirs`; document-like categories resolve through
//! `directories::UserDirs` and get a folder named after the application.

use super::{ContentConfig, Domain, SearchPath};
use crate::error::MirrorError;
use directories::{ProjectDirs, UserDirs};
use std::path::PathBuf;

/// Resolve the directory content is mirrored into
pub fn resolve_content_root(config: &ContentConfig) -> Result<PathBuf, MirrorError> {
    match &config.search_path {
        SearchPath::Custom(path) => Ok(path.clone()),
        SearchPath::Data | SearchPath::Config | SearchPath::Cache => {
            let dirs = project_dirs(config)?;
            let root = match (&config.search_path, config.domain) {
                (SearchPath::Data, Domain::User) => dirs.data_dir(),
                (SearchPath::Data, Domain::Local) => dirs.data_local_dir(),
                (SearchPath::Config, Domain::User) => dirs.config_dir(),
                (SearchPath::Config, Domain::Local) => dirs.config_local_dir(),
                _ => dirs.cache_dir(),
            };
            Ok(root.to_path_buf())
        }
        SearchPath::Documents | SearchPath::Desktop | SearchPath::Home => {
            let dirs = UserDirs::new().ok_or_else(|| {
                MirrorError::Config("No home directory for the current user".to_string())
            })?;
            let base = match &config.search_path {
                SearchPath::Documents => dirs.document_dir(),
                SearchPath::Desktop => dirs.desktop_dir(),
                _ => Some(dirs.home_dir()),
            }
            .ok_or_else(|| {
                MirrorError::Config(format!(
                    "No {:?} directory for the current user",
                    config.search_path
                ))
            })?;
            Ok(base.join(&config.application))
        }
    }
}

fn project_dirs(config: &ContentConfig) -> Result<ProjectDirs, MirrorError> {
    ProjectDirs::from(&config.qualifier, &config.organization, &config.application).ok_or_else(
        || {
            MirrorError::Config(format!(
                "No project directories for application '{}'",
                config.application
            ))
        },
    )
}
