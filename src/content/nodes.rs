//! Node builders: `Value`, `Folder`, `Group`, `Repeater`.
//!
//! ```ignore
//! Folder::new("Static", || {
//!     vec![Value::named("README", TextCodec)
//!         .default_value("# Contents".to_string())
//!         .declared_type(FileType::MARKDOWN)
//!         .into()]
//! })
//! ```

use super::alias::AliasSlot;
use super::{Alias, Codec, Content, ContentKind, Elements, Leaf, Modifiers, NodeConfig, Structure};
use crate::error::CodecError;
use crate::values::Traits;
use std::sync::Arc;

struct ValueStructure<C: Codec> {
    codec: Arc<C>,
    default: Option<C::Value>,
}

impl<C: Codec> Structure for ValueStructure<C> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<C::Value>()
    }

    fn encode_default(&self) -> Option<Result<Vec<u8>, CodecError>> {
        self.default.as_ref().map(|value| self.codec.encode(value))
    }
}

/// A single codec-bound leaf stored as one file
pub struct Value<C: Codec> {
    name: Option<String>,
    codec: Arc<C>,
    default: Option<C::Value>,
    alias: Option<AliasSlot>,
    config: NodeConfig,
}

impl<C: Codec> Value<C> {
    /// An unnamed leaf; repeaters name their elements by key
    pub fn new(codec: C) -> Self {
        Self {
            name: None,
            codec: Arc::new(codec),
            default: None,
            alias: None,
            config: NodeConfig {
                defaults: Traits::observable(),
                ..NodeConfig::default()
            },
        }
    }

    pub fn named(name: impl Into<String>, codec: C) -> Self {
        let mut value = Self::new(codec);
        value.name = Some(name.into());
        value
    }

    /// Value written when the entry is created
    pub fn default_value(mut self, value: C::Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Bind `alias` to this leaf's reflection on materialization
    pub fn alias(mut self, alias: &Alias<C>) -> Self {
        self.alias = Some(alias.slot());
        self
    }
}

impl<C: Codec> Modifiers for Value<C> {
    fn config_mut(&mut self) -> &mut NodeConfig {
        &mut self.config
    }
}

impl<C: Codec> From<Value<C>> for Content {
    fn from(value: Value<C>) -> Self {
        let structure = ValueStructure {
            codec: value.codec,
            default: value.default,
        };
        let mut content = Content::new(ContentKind::Value(Leaf {
            name: value.name,
            structure: Arc::new(structure),
            alias: value.alias,
        }));
        content.config = value.config;
        content
    }
}

/// A directory whose children come from a thunk
pub struct Folder {
    name: String,
    children: super::Thunk,
    config: NodeConfig,
}

impl Folder {
    pub fn new<F>(name: impl Into<String>, children: F) -> Self
    where
        F: Fn() -> Vec<Content> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            children: Arc::new(children),
            config: NodeConfig {
                defaults: Traits::directory(),
                ..NodeConfig::default()
            },
        }
    }
}

impl Modifiers for Folder {
    fn config_mut(&mut self) -> &mut NodeConfig {
        &mut self.config
    }
}

impl From<Folder> for Content {
    fn from(folder: Folder) -> Self {
        let mut content = Content::new(ContentKind::Folder {
            name: folder.name,
            children: folder.children,
        });
        content.config = folder.config;
        content
    }
}

/// Path-less container; its modifiers flow to every child
pub struct Group {
    children: super::Thunk,
    config: NodeConfig,
}

impl Group {
    pub fn new<F>(children: F) -> Self
    where
        F: Fn() -> Vec<Content> + Send + Sync + 'static,
    {
        Self {
            children: Arc::new(children),
            config: NodeConfig {
                defaults: Traits::variadic(),
                ..NodeConfig::default()
            },
        }
    }
}

impl Modifiers for Group {
    fn config_mut(&mut self) -> &mut NodeConfig {
        &mut self.config
    }
}

impl From<Group> for Content {
    fn from(group: Group) -> Self {
        let mut content = Content::new(ContentKind::Group(group.children));
        content.config = group.config;
        content
    }
}

/// One child per collection element, named by the element's projected key
pub struct Repeater {
    elements: Elements,
    config: NodeConfig,
}

impl Repeater {
    pub fn new<T, I, K, F>(items: I, key: K, child: F) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Send + Sync + 'static,
        K: Fn(&T) -> String + Send + Sync + 'static,
        F: Fn(&T) -> Content + Send + Sync + 'static,
    {
        let items: Vec<T> = items.into_iter().collect();
        let produce = move || -> Vec<(String, Content)> {
            items.iter().map(|item| (key(item), child(item))).collect()
        };
        Self {
            elements: Elements {
                produce: Arc::new(produce),
                alias: None,
            },
            config: NodeConfig {
                defaults: Traits::variadic(),
                ..NodeConfig::default()
            },
        }
    }

    /// Bind `alias` to the repeater for identity-addressed access to its elements
    pub fn alias<C: Codec>(mut self, alias: &Alias<C>) -> Self {
        self.elements.alias = Some(alias.slot());
        self
    }
}

impl Modifiers for Repeater {
    fn config_mut(&mut self) -> &mut NodeConfig {
        &mut self.config
    }
}

impl From<Repeater> for Content {
    fn from(repeater: Repeater) -> Self {
        let mut content = Content::new(ContentKind::Repeater(repeater.elements));
        content.config = repeater.config;
        content
    }
}
