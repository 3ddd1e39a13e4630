//! Resources: read-only OS facts about an entry.
//!
//! Resources are refreshed from disk and cannot be set by callers.

use super::{Bag, Inheritance, Key, Scope};
use crate::fs::FileSystem;
use std::path::Path;
use tracing::debug;

pub enum ResourceScope {}

impl Scope for ResourceScope {
    const NAME: &'static str = "Resources";
}

pub type Resources = Bag<ResourceScope>;

macro_rules! resource_key {
    ($key:ident, $name:literal, $value:ty, $default:expr) => {
        pub struct $key;
        impl Key for $key {
            type Scope = ResourceScope;
            type Value = $value;
            const NAME: &'static str = $name;
            const INHERITANCE: Inheritance = Inheritance::Local;
            fn default_value() -> $value {
                $default
            }
        }
    };
}

resource_key!(IsDirectoryKey, "is_directory", bool, false);
resource_key!(IsHiddenKey, "is_hidden", bool, false);
resource_key!(IsExecutableKey, "is_executable", bool, false);
resource_key!(ContentTypeKey, "content_type", Option<String>, None);
resource_key!(TagNamesKey, "tag_names", Option<Vec<String>>, None);

impl Bag<ResourceScope> {
    pub fn is_directory(&self) -> bool {
        self.get::<IsDirectoryKey>()
    }

    pub fn is_hidden(&self) -> bool {
        self.get::<IsHiddenKey>()
    }

    pub fn is_executable(&self) -> bool {
        self.get::<IsExecutableKey>()
    }

    pub fn content_type(&self) -> Option<String> {
        self.get::<ContentTypeKey>()
    }

    pub fn tag_names(&self) -> Option<Vec<String>> {
        self.get::<TagNamesKey>()
    }

    /// Read fresh values for every resource key. Missing entries leave the bag untouched.
    pub(crate) fn refresh(&mut self, fs: &dyn FileSystem, path: &Path) {
        let metadata = match fs.metadata(path) {
            Ok(metadata) => metadata,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "Skipping resource refresh");
                return;
            }
        };

        let hidden = path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with('.'))
            .unwrap_or(false);
        let executable = !metadata.is_dir
            && metadata
                .permissions
                .map(|mode| mode & 0o111 != 0)
                .unwrap_or(false);
        let content_type = if metadata.is_dir {
            Some("inode/directory".to_string())
        } else {
            mime_guess::from_path(path)
                .first()
                .map(|mime| mime.essence_str().to_string())
        };
        let tags = fs.tags(path).unwrap_or_else(|err| {
            debug!(path = %path.display(), error = %err, "Tags unavailable");
            None
        });

        self.record::<IsDirectoryKey>(metadata.is_dir);
        self.record::<IsHiddenKey>(hidden);
        self.record::<IsExecutableKey>(executable);
        self.record::<ContentTypeKey>(content_type);
        self.record::<TagNamesKey>(tags);
    }
}
