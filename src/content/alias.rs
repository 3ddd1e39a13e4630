//! Alias handles
//!
//! An [`Alias`] is created by the caller, passed into a leaf or repeater builder, and bound
//! to that node's reflection when the tree is materialized. Reads and writes through the
//! publisher then go through the alias' codec.

use super::codec::Codec;
use crate::reflection::ReflectionId;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

pub(crate) type AliasSlot = Arc<RwLock<Option<ReflectionId>>>;

pub struct Alias<C: Codec> {
    codec: Arc<C>,
    slot: AliasSlot,
}

impl<C: Codec> Alias<C> {
    pub fn new(codec: C) -> Self {
        Self {
            codec: Arc::new(codec),
            slot: Arc::new(RwLock::new(None)),
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn is_bound(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Reflection the alias is bound to, if any
    pub fn reflection(&self) -> Option<ReflectionId> {
        *self.slot.read()
    }

    pub(crate) fn slot(&self) -> AliasSlot {
        self.slot.clone()
    }

    /// Bound reflection. Using an alias that was never materialized is a programmer error.
    #[track_caller]
    pub(crate) fn target(&self) -> ReflectionId {
        match *self.slot.read() {
            Some(id) => id,
            None => crate::error::path_resolution(format!(
                "alias of {} is not bound to a materialized reflection",
                std::any::type_name::<C::Value>()
            )),
        }
    }
}

impl<C: Codec + Default> Default for Alias<C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<C: Codec> Clone for Alias<C> {
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
            slot: self.slot.clone(),
        }
    }
}

impl<C: Codec> fmt::Debug for Alias<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alias")
            .field("value", &std::any::type_name::<C::Value>())
            .field("reflection", &*self.slot.read())
            .finish()
    }
}
