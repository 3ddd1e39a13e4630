//! Traits: in-memory policy that governs how content is mirrored.
//!
//! Traits are never read from or written to disk.

use super::{Bag, FileType, Inheritance, Key, Scope, Writable};
use serde::{Deserialize, Serialize};

pub enum TraitScope {}

impl Scope for TraitScope {
    const NAME: &'static str = "Traits";
}

impl Writable for TraitScope {}

pub type Traits = Bag<TraitScope>;

/// How an entry is removed when its value is cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalMethod {
    Delete,
    #[default]
    Trash,
}

/// How an entry is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreateMethod {
    /// Write the default value when the entry doesn't exist yet
    #[default]
    Automatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    File,
    Folder,
}

pub struct ObservableKey;
impl Key for ObservableKey {
    type Scope = TraitScope;
    type Value = bool;
    const NAME: &'static str = "observable";
    fn default_value() -> bool {
        true
    }
}

pub struct RecursiveKey;
impl Key for RecursiveKey {
    type Scope = TraitScope;
    type Value = bool;
    const NAME: &'static str = "recursive";
    fn default_value() -> bool {
        false
    }
}

pub struct DeclaredTypeKey;
impl Key for DeclaredTypeKey {
    type Scope = TraitScope;
    type Value = Option<FileType>;
    const NAME: &'static str = "declared_type";
    fn default_value() -> Option<FileType> {
        None
    }
}

pub struct RemovalMethodKey;
impl Key for RemovalMethodKey {
    type Scope = TraitScope;
    type Value = RemovalMethod;
    const NAME: &'static str = "removal_method";
    fn default_value() -> RemovalMethod {
        RemovalMethod::default()
    }
}

pub struct CreateMethodKey;
impl Key for CreateMethodKey {
    type Scope = TraitScope;
    type Value = CreateMethod;
    const NAME: &'static str = "create_method";
    fn default_value() -> CreateMethod {
        CreateMethod::default()
    }
}

pub struct EntryKindKey;
impl Key for EntryKindKey {
    type Scope = TraitScope;
    type Value = EntryKind;
    const NAME: &'static str = "entry_kind";
    const INHERITANCE: Inheritance = Inheritance::Local;
    fn default_value() -> EntryKind {
        EntryKind::default()
    }
}

impl Bag<TraitScope> {
    /// Kind defaults of a leaf value
    pub fn observable() -> Self {
        Self::new().with::<ObservableKey>(true)
    }

    /// Kind defaults of path-less containers (groups and repeaters)
    pub fn variadic() -> Self {
        Self::new().with::<ObservableKey>(false)
    }

    pub fn recursive() -> Self {
        Self::variadic().with::<RecursiveKey>(true)
    }

    /// Kind defaults of folders
    pub fn directory() -> Self {
        Self::recursive().with::<EntryKindKey>(EntryKind::Folder)
    }

    pub fn is_observable(&self) -> bool {
        self.get::<ObservableKey>()
    }

    pub fn is_recursive(&self) -> bool {
        self.get::<RecursiveKey>()
    }

    pub fn declared_type(&self) -> Option<FileType> {
        self.get::<DeclaredTypeKey>()
    }

    pub fn removal_method(&self) -> RemovalMethod {
        self.get::<RemovalMethodKey>()
    }

    pub fn create_method(&self) -> CreateMethod {
        self.get::<CreateMethodKey>()
    }

    pub fn entry_kind(&self) -> EntryKind {
        self.get::<EntryKindKey>()
    }
}
