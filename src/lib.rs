//! Mirrorfs: Declarative Content Trees Mirrored onto the Filesystem
//!
//! Callers describe the files and folders they want as a tree of typed content nodes. A
//! [`Publisher`] materializes that tree under a content root, caches the bound result so
//! repeated materialization does no work, resolves inheritable configuration down the
//! tree, and watches materialized entries for external changes.

pub mod config;
pub mod content;
pub mod error;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod mirror;
pub mod observer;
pub mod publisher;
pub mod reflection;
pub mod trash;
pub mod values;

pub use config::{ConfigLoader, ContentConfig, MirrorConfig, SearchPath};
pub use content::{
    Alias, BincodeCodec, BytesCodec, Codec, Content, Folder, Group, JsonCodec, Modifiers,
    PublicContent, Repeater, TextCodec, TomlCodec, Value,
};
pub use error::{CodecError, ErrorHandler, MirrorError};
pub use mirror::{CacheKey, Reflected};
pub use publisher::{ChangeNotice, Publisher};
pub use reflection::{ChangeKind, Reflection, ReflectionId, ReflectionKind};
pub use values::{FileType, RemovalMethod};
