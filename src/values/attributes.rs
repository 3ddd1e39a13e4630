//! Attributes: filesystem-backed facts about an entry.
//!
//! Name and extension drive path construction. Permissions and modification date are
//! written back to disk when set locally; the remaining keys are read from the OS.

use super::{Bag, Inheritance, Key, Scope, Writable};
use crate::fs::EntryMetadata;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

pub enum AttributeScope {}

impl Scope for AttributeScope {
    const NAME: &'static str = "Attributes";
}

impl Writable for AttributeScope {}

pub type Attributes = Bag<AttributeScope>;

macro_rules! attribute_key {
    ($key:ident, $name:literal, $value:ty, $inheritance:expr, $default:expr) => {
        pub struct $key;
        impl Key for $key {
            type Scope = AttributeScope;
            type Value = $value;
            const NAME: &'static str = $name;
            const INHERITANCE: Inheritance = $inheritance;
            fn default_value() -> $value {
                $default
            }
        }
    };
}

attribute_key!(NameKey, "name", Option<String>, Inheritance::Local, None);
attribute_key!(ExtensionKey, "extension", Option<String>, Inheritance::Local, None);
attribute_key!(PathKey, "path", Option<PathBuf>, Inheritance::Local, None);
attribute_key!(PermissionsKey, "permissions", Option<u32>, Inheritance::Transparent, None);
attribute_key!(SizeKey, "size", u64, Inheritance::Local, 0);
attribute_key!(
    DateCreatedKey,
    "date_created",
    Option<DateTime<Utc>>,
    Inheritance::Local,
    None
);
attribute_key!(
    DateModifiedKey,
    "date_modified",
    Option<DateTime<Utc>>,
    Inheritance::Local,
    None
);
attribute_key!(FileNumberKey, "file_number", Option<u64>, Inheritance::Local, None);

impl Bag<AttributeScope> {
    pub fn name(&self) -> Option<String> {
        self.get::<NameKey>()
    }

    pub fn extension(&self) -> Option<String> {
        self.get::<ExtensionKey>()
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.get::<PathKey>()
    }

    pub fn permissions(&self) -> Option<u32> {
        self.get::<PermissionsKey>()
    }

    pub fn size(&self) -> u64 {
        self.get::<SizeKey>()
    }

    pub fn date_created(&self) -> Option<DateTime<Utc>> {
        self.get::<DateCreatedKey>()
    }

    pub fn date_modified(&self) -> Option<DateTime<Utc>> {
        self.get::<DateModifiedKey>()
    }

    pub fn file_number(&self) -> Option<u64> {
        self.get::<FileNumberKey>()
    }

    /// Record the OS-reported facts of an entry
    pub(crate) fn record_metadata(&mut self, metadata: &EntryMetadata) {
        self.record::<SizeKey>(metadata.len);
        self.record::<DateCreatedKey>(metadata.created);
        self.record::<DateModifiedKey>(metadata.modified);
        self.record::<FileNumberKey>(metadata.file_number);
        if metadata.permissions.is_some() {
            self.record::<PermissionsKey>(metadata.permissions);
        }
    }
}
