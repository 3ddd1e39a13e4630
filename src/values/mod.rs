//! Configuration Bags
//!
//! Typed key/value stores attached to every reflection. A bag maps a key name to a value
//! whose type is declared by the key. Keys also declare their default and how they flow
//! from ancestors:
//!
//! 1. explicit local override (`set`)
//! 2. nearest ancestor's resolved value (`merge`)
//! 3. the node kind's default (`fill`), which never flows to descendants
//! 4. the key's documented default
//!
//! Once a key has been set or resolved it is marked used; later merges never replace a used
//! key, so resolution is monotonic across re-entry.

pub mod attributes;
pub mod file_type;
pub mod resources;
pub mod traits;

pub use attributes::Attributes;
pub use file_type::FileType;
pub use resources::Resources;
pub use traits::{CreateMethod, EntryKind, RemovalMethod, Traits};

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// How a key flows from a parent bag into a child bag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inheritance {
    /// Always inherited from the nearest ancestor
    Inherited,
    /// Inherited only through path-less parents (groups and repeaters)
    Transparent,
    /// Never inherited
    Local,
}

/// Marker for the family a bag belongs to
pub trait Scope: Send + Sync + 'static {
    const NAME: &'static str;
}

/// Scopes whose values may be set by callers
pub trait Writable: Scope {}

/// A typed key within a scope
pub trait Key: 'static {
    type Scope: Scope;
    type Value: Clone + fmt::Debug + PartialEq + Send + Sync + 'static;

    const NAME: &'static str;
    const INHERITANCE: Inheritance = Inheritance::Inherited;

    fn default_value() -> Self::Value;
}

trait StoredValue: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn eq_stored(&self, other: &dyn StoredValue) -> bool;
}

impl<T> StoredValue for T
where
    T: Any + fmt::Debug + PartialEq + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_stored(&self, other: &dyn StoredValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map(|other| other == self)
            .unwrap_or(false)
    }
}

#[derive(Clone)]
struct Slot {
    value: Arc<dyn StoredValue>,
    inheritance: Inheritance,
    /// Filled from a node kind default rather than set or inherited
    fallback: bool,
}

/// A typed key/value store for one scope
pub struct Bag<S: Scope> {
    values: BTreeMap<&'static str, Slot>,
    used: BTreeSet<&'static str>,
    _scope: PhantomData<fn() -> S>,
}

impl<S: Scope> Bag<S> {
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
            used: BTreeSet::new(),
            _scope: PhantomData,
        }
    }

    /// Value for `K`: the stored value, or the key's default
    pub fn get<K: Key<Scope = S>>(&self) -> K::Value {
        self.stored::<K>().unwrap_or_else(K::default_value)
    }

    /// Whether a value for `K` is held by this bag (set, resolved, or merged)
    pub fn contains<K: Key<Scope = S>>(&self) -> bool {
        self.values.contains_key(K::NAME)
    }

    /// Whether `K` has been set or resolved locally
    pub fn is_used<K: Key<Scope = S>>(&self) -> bool {
        self.used.contains(K::NAME)
    }

    /// Resolve `K`, pinning the result so it never reverts to a newer default
    pub fn resolve<K: Key<Scope = S>>(&mut self) -> K::Value {
        let value = self.get::<K>();
        if !self.values.contains_key(K::NAME) {
            self.insert::<K>(value.clone());
        }
        self.used.insert(K::NAME);
        value
    }

    /// Copy inheritable keys the bag does not use locally from `parent`.
    ///
    /// `transparent` admits keys marked [`Inheritance::Transparent`], which only flow
    /// through parents that contribute no path segment.
    pub fn merge(&mut self, parent: &Bag<S>, transparent: bool) {
        for (name, slot) in &parent.values {
            if slot.fallback || self.used.contains(name) {
                continue;
            }
            let admitted = match slot.inheritance {
                Inheritance::Inherited => true,
                Inheritance::Transparent => transparent,
                Inheritance::Local => false,
            };
            if admitted {
                self.values.insert(name, slot.clone());
            }
        }
    }

    /// Take every key of `defaults` this bag holds no value for.
    ///
    /// Filled values apply to this bag only; [`Bag::merge`] never passes them on.
    pub fn fill(&mut self, defaults: &Bag<S>) {
        for (name, slot) in &defaults.values {
            if !self.values.contains_key(name) {
                self.values.insert(
                    name,
                    Slot {
                        fallback: true,
                        ..slot.clone()
                    },
                );
            }
        }
    }

    /// Set every key held by `overrides`, marking each one used
    pub(crate) fn apply(&mut self, overrides: &Bag<S>) {
        for (name, slot) in &overrides.values {
            self.values.insert(name, slot.clone());
            self.used.insert(name);
        }
    }

    /// Record a value without exposing a public setter (used for OS-reported facts)
    pub(crate) fn record<K: Key<Scope = S>>(&mut self, value: K::Value) {
        self.insert::<K>(value);
        self.used.insert(K::NAME);
    }

    /// Names of keys that have been set or resolved
    pub fn used_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.used.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn stored<K: Key<Scope = S>>(&self) -> Option<K::Value> {
        let slot = self.values.get(K::NAME)?;
        match slot.value.as_any().downcast_ref::<K::Value>() {
            Some(value) => Some(value.clone()),
            None => panic!(
                "{} key {} holds a value of the wrong type",
                S::NAME,
                K::NAME
            ),
        }
    }

    fn insert<K: Key<Scope = S>>(&mut self, value: K::Value) {
        self.values.insert(
            K::NAME,
            Slot {
                value: Arc::new(value),
                inheritance: K::INHERITANCE,
                fallback: false,
            },
        );
    }
}

impl<S: Writable> Bag<S> {
    /// Explicit local override for `K`
    pub fn set<K: Key<Scope = S>>(&mut self, value: K::Value) {
        self.record::<K>(value);
    }

    /// Builder form of [`Bag::set`]
    pub fn with<K: Key<Scope = S>>(mut self, value: K::Value) -> Self {
        self.set::<K>(value);
        self
    }
}

impl<S: Scope> Default for Bag<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Scope> Clone for Bag<S> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            used: self.used.clone(),
            _scope: PhantomData,
        }
    }
}

impl<S: Scope> PartialEq for Bag<S> {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self.values.iter().all(|(name, slot)| {
                other
                    .values
                    .get(name)
                    .map(|theirs| slot.value.eq_stored(theirs.value.as_ref()))
                    .unwrap_or(false)
            })
    }
}

impl<S: Scope> fmt::Debug for Bag<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, slot) in &self.values {
            map.entry(name, &slot.value);
        }
        map.finish()
    }
}

impl<S: Scope> fmt::Display for Bag<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", S::NAME)?;
        for (name, slot) in &self.values {
            let marker = if slot.fallback {
                " (kind default)"
            } else if self.used.contains(name) {
                ""
            } else {
                " (inherited)"
            };
            write!(f, "\n  {} = {:?}{}", name, slot.value, marker)?;
        }
        Ok(())
    }
}
