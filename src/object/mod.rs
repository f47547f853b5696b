//! # Inspectable Objects
//!
//! How live objects in the target process are addressed and touched.
//!
//! ## Components
//! - **Inspectable**: the trait an object implements to be visible to the inspector
//! - **Registry**: OID to object resolution with non-owning entries
//! - **Owner**: the single thread allowed to mutate inspected objects
//!
//! Objects are shared as `Arc<dyn Inspectable>` and keep their mutable state behind
//! interior mutability. Mutation itself only ever happens inside jobs running on the
//! owning thread.

pub mod owner;
pub mod registry;

use crate::snapshot::hierarchy::AttributesGroup;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub use owner::{OwnerExecutor, OwnerHandle, OwnerLoop};
pub use registry::ObjectRegistry;

/// Opaque 64-bit handle for a live object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Oid(u64);

impl Oid {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub(crate) fn from_parts(generation: u32, slot: u32) -> Self {
        Self((u64::from(generation) << 32) | u64::from(slot))
    }

    pub(crate) fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub(crate) fn slot(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oid:{}", self.0)
    }
}

/// An object the inspector can address, describe and mutate.
pub trait Inspectable: Any + Send + Sync {
    /// Type names from most derived to most general.
    ///
    /// Capabilities are looked up along this chain, so an operation registered for a
    /// base type applies to every subtype that lists it.
    fn class_chain(&self) -> &'static [&'static str];

    /// Direct children in the display hierarchy
    fn children(&self) -> Vec<Arc<dyn Inspectable>> {
        Vec::new()
    }

    /// Current attributes, grouped for display
    fn describe(&self) -> Vec<AttributesGroup> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;
}

impl dyn Inspectable {
    /// Most derived type name
    pub fn class_name(&self) -> &'static str {
        self.class_chain().first().copied().unwrap_or("Object")
    }
}
