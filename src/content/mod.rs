//! Content Tree Model
//!
//! A pure, side-effect-free description of the desired filesystem shape. Builders in
//! [`nodes`] produce [`Content`] values; the mirror walks them and binds each one to a
//! reflection. Child lists are produced by thunks so the mirror can re-evaluate a tree on
//! every cache miss without the description itself doing any work.

pub mod alias;
pub mod codec;
pub mod nodes;

pub use alias::Alias;
pub use codec::{BincodeCodec, BytesCodec, Codec, JsonCodec, TextCodec, TomlCodec};
pub use nodes::{Folder, Group, Repeater, Value};

use crate::error::{CodecError, ErrorHandler, MirrorError};
use crate::values::attributes::{AttributeScope, DateModifiedKey, PermissionsKey};
use crate::values::traits::{
    CreateMethodKey, DeclaredTypeKey, ObservableKey, RecursiveKey, RemovalMethodKey, TraitScope,
};
use crate::values::{Attributes, CreateMethod, FileType, Key, RemovalMethod, Traits};
use alias::AliasSlot;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Deferred production of child nodes
pub type Thunk = Arc<dyn Fn() -> Vec<Content> + Send + Sync>;

/// Types that describe a complete content tree rooted at a publisher
pub trait PublicContent: Send + Sync + 'static {
    fn content(&self) -> Vec<Content>;
}

/// Type-erased view of a leaf's codec and default value
pub trait Structure: Send + Sync {
    /// Name of the leaf's value type
    fn type_name(&self) -> &'static str;

    /// Encoded default value, if the leaf declares one
    fn encode_default(&self) -> Option<Result<Vec<u8>, CodecError>>;
}

/// One node of the content tree
#[derive(Clone)]
pub struct Content {
    pub(crate) kind: ContentKind,
    pub(crate) config: NodeConfig,
    pub(crate) identity: Option<String>,
}

#[derive(Clone)]
pub enum ContentKind {
    Value(Leaf),
    Folder { name: String, children: Thunk },
    Repeater(Elements),
    Group(Thunk),
    /// The selected branch of a conditional; the other branch is never built
    Conditional(Box<Content>),
    Empty,
}

#[derive(Clone)]
pub struct Leaf {
    pub(crate) name: Option<String>,
    pub(crate) structure: Arc<dyn Structure>,
    pub(crate) alias: Option<AliasSlot>,
}

/// Elements of a repeater, each keyed by its projected identity
#[derive(Clone)]
pub struct Elements {
    pub(crate) produce: Arc<dyn Fn() -> Vec<(String, Content)> + Send + Sync>,
    pub(crate) alias: Option<AliasSlot>,
}

/// Per-node modifiers
#[derive(Clone, Default)]
pub struct NodeConfig {
    pub(crate) traits: Traits,
    /// Traits of the node kind, used where neither the node nor an ancestor sets them
    pub(crate) defaults: Traits,
    pub(crate) attributes: Attributes,
    pub(crate) on_error: Option<ErrorHandler>,
    pub(crate) non_materializing: bool,
}

impl NodeConfig {
    /// Layer `outer` beneath this config; values set here win
    pub(crate) fn absorb(&mut self, outer: &NodeConfig) {
        let mut traits = outer.traits.clone();
        traits.apply(&self.traits);
        self.traits = traits;

        let mut attributes = outer.attributes.clone();
        attributes.apply(&self.attributes);
        self.attributes = attributes;

        if self.on_error.is_none() {
            self.on_error = outer.on_error.clone();
        }
        self.non_materializing |= outer.non_materializing;
    }
}

impl Content {
    pub(crate) fn new(kind: ContentKind) -> Self {
        Self {
            kind,
            config: NodeConfig::default(),
            identity: None,
        }
    }

    /// A node that produces nothing
    pub fn empty() -> Self {
        Self::new(ContentKind::Empty)
    }

    /// Choose one of two branches. Only the chosen branch is constructed.
    pub fn either<A, B>(condition: bool, first: A, second: B) -> Self
    where
        A: FnOnce() -> Content,
        B: FnOnce() -> Content,
    {
        let chosen = if condition { first() } else { second() };
        Self::new(ContentKind::Conditional(Box::new(chosen)))
    }

    /// Include `content` only when `condition` holds
    pub fn when<A>(condition: bool, content: A) -> Self
    where
        A: FnOnce() -> Content,
    {
        Self::either(condition, content, Content::empty)
    }

    pub fn kind(&self) -> &ContentKind {
        &self.kind
    }

    /// Declared name of a leaf or folder
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            ContentKind::Value(leaf) => leaf.name.as_deref(),
            ContentKind::Folder { name, .. } => Some(name),
            ContentKind::Conditional(inner) => inner.name(),
            _ => None,
        }
    }

    pub fn is_materializing(&self) -> bool {
        !self.config.non_materializing
    }

    /// Traits set on this node
    pub fn traits(&self) -> &Traits {
        &self.config.traits
    }

    pub fn kind_defaults(&self) -> &Traits {
        &self.config.defaults
    }

    pub fn attributes(&self) -> &Attributes {
        &self.config.attributes
    }

    /// Segment of the identity path contributed by this node at `offset` among its siblings
    pub(crate) fn identity_segment(&self, offset: usize) -> String {
        if let Some(identity) = &self.identity {
            return identity.clone();
        }
        match &self.kind {
            ContentKind::Value(Leaf { name: Some(name), .. }) => name.clone(),
            ContentKind::Folder { name, .. } => name.clone(),
            other => format!("{}[{}]", kind_label(other), offset),
        }
    }

    /// Pin the identity of a repeater element. Leaves and folders are renamed to match.
    pub(crate) fn with_identity(mut self, identity: String) -> Self {
        match &mut self.kind {
            ContentKind::Value(leaf) => leaf.name = Some(identity.clone()),
            ContentKind::Folder { name, .. } => *name = identity.clone(),
            ContentKind::Conditional(inner) => {
                let chosen = std::mem::replace(inner.as_mut(), Content::empty());
                **inner = chosen.with_identity(identity.clone());
            }
            _ => {}
        }
        self.identity = Some(identity);
        self
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct(kind_label(&self.kind));
        if let Some(name) = self.name() {
            out.field("name", &name);
        }
        if let Some(identity) = &self.identity {
            out.field("identity", identity);
        }
        if let ContentKind::Conditional(inner) = &self.kind {
            out.field("chosen", inner);
        }
        out.field("traits", &self.config.traits);
        out.finish()
    }
}

pub(crate) fn kind_label(kind: &ContentKind) -> &'static str {
    match kind {
        ContentKind::Value(_) => "Value",
        ContentKind::Folder { .. } => "Folder",
        ContentKind::Repeater(_) => "Repeater",
        ContentKind::Group(_) => "Group",
        ContentKind::Conditional(_) => "Conditional",
        ContentKind::Empty => "Empty",
    }
}

impl Elements {
    /// Produce the keyed elements. Elements whose key was already produced are returned
    /// separately and never materialized.
    pub(crate) fn expand(&self) -> (Vec<Content>, Vec<String>) {
        let mut seen = HashSet::new();
        let mut children = Vec::new();
        let mut duplicates = Vec::new();
        for (key, content) in (self.produce)() {
            if seen.insert(key.clone()) {
                children.push(content.with_identity(key));
            } else {
                duplicates.push(key);
            }
        }
        (children, duplicates)
    }
}

/// Drop empty nodes and unwrap conditionals. The conditional's modifiers are layered
/// beneath the chosen branch's own.
pub fn flatten(contents: Vec<Content>) -> Vec<Content> {
    let mut flat = Vec::with_capacity(contents.len());
    let mut pending: Vec<Content> = contents.into_iter().rev().collect();
    while let Some(content) = pending.pop() {
        match content.kind {
            ContentKind::Empty => {}
            ContentKind::Conditional(inner) => {
                let mut chosen = *inner;
                chosen.config.absorb(&content.config);
                if chosen.identity.is_none() {
                    chosen.identity = content.identity;
                }
                pending.push(chosen);
            }
            _ => flat.push(content),
        }
    }
    flat
}

/// Modifiers available on every node builder
pub trait Modifiers: Sized {
    fn config_mut(&mut self) -> &mut NodeConfig;

    /// Override any trait locally
    fn with_trait<K: Key<Scope = TraitScope>>(mut self, value: K::Value) -> Self {
        self.config_mut().traits.set::<K>(value);
        self
    }

    /// Override any writable attribute locally
    fn with_attribute<K: Key<Scope = AttributeScope>>(mut self, value: K::Value) -> Self {
        self.config_mut().attributes.set::<K>(value);
        self
    }

    fn declared_type(self, file_type: FileType) -> Self {
        self.with_trait::<DeclaredTypeKey>(Some(file_type))
    }

    fn observable(self, observable: bool) -> Self {
        self.with_trait::<ObservableKey>(observable)
    }

    fn recursive(self, recursive: bool) -> Self {
        self.with_trait::<RecursiveKey>(recursive)
    }

    fn removal(self, method: RemovalMethod) -> Self {
        self.with_trait::<RemovalMethodKey>(method)
    }

    fn creation(self, method: CreateMethod) -> Self {
        self.with_trait::<CreateMethodKey>(method)
    }

    fn permissions(self, mode: u32) -> Self {
        self.with_attribute::<PermissionsKey>(Some(mode))
    }

    fn modified(self, when: DateTime<Utc>) -> Self {
        self.with_attribute::<DateModifiedKey>(Some(when))
    }

    fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&MirrorError) + Send + Sync + 'static,
    {
        self.config_mut().on_error = Some(Arc::new(handler));
        self
    }

    /// Carry the node as data only: no reflection, no children, no filesystem effect
    fn non_materializing(mut self) -> Self {
        self.config_mut().non_materializing = true;
        self
    }
}

impl Modifiers for Content {
    fn config_mut(&mut self) -> &mut NodeConfig {
        &mut self.config
    }
}
