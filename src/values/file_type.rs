//! Declared file types
//!
//! A declared type names the kind of content a leaf holds and carries the preferred
//! filename extension used to derive the leaf's path.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileType {
    identifier: Cow<'static, str>,
    extension: Option<Cow<'static, str>>,
}

impl FileType {
    pub const MARKDOWN: FileType = FileType::builtin("net.daringfireball.markdown", Some("md"));
    pub const JSON: FileType = FileType::builtin("public.json", Some("json"));
    pub const TOML: FileType = FileType::builtin("public.toml", Some("toml"));
    pub const PLAIN_TEXT: FileType = FileType::builtin("public.plain-text", Some("txt"));
    pub const RUST_SOURCE: FileType = FileType::builtin("public.rust-source", Some("rs"));
    pub const SHELL_SCRIPT: FileType = FileType::builtin("public.shell-script", Some("sh"));
    pub const BINARY: FileType = FileType::builtin("public.binary", Some("bin"));
    /// Raw data without a preferred extension
    pub const DATA: FileType = FileType::builtin("public.data", None);
    pub const FOLDER: FileType = FileType::builtin("public.folder", None);

    const fn builtin(identifier: &'static str, extension: Option<&'static str>) -> Self {
        let extension = match extension {
            Some(ext) => Some(Cow::Borrowed(ext)),
            None => None,
        };
        Self {
            identifier: Cow::Borrowed(identifier),
            extension,
        }
    }

    /// A caller-defined type, e.g. `FileType::new("com.example.log", Some("log"))`
    pub fn new(identifier: impl Into<String>, extension: Option<&str>) -> Self {
        Self {
            identifier: Cow::Owned(identifier.into()),
            extension: extension.map(|ext| Cow::Owned(ext.trim_start_matches('.').to_string())),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn preferred_extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// MIME type for the preferred extension, if one is known
    pub fn mime_type(&self) -> Option<String> {
        let extension = self.preferred_extension()?;
        mime_guess::from_ext(extension)
            .first()
            .map(|mime| mime.essence_str().to_string())
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.preferred_extension() {
            Some(ext) => write!(f, "{} (.{})", self.identifier, ext),
            None => write!(f, "{}", self.identifier),
        }
    }
}
