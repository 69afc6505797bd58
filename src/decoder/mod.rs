//! Decoding tree nodes into typed values.
//!
//! A [`Decoder`] advertises which target types it handles through
//! [`Decoder::matches`]. The [`DecoderRegistry`] picks the highest-priority
//! candidate for a [`TypeCapture`] at dispatch time and hands it a
//! [`DecoderContext`] so composite decoders can recurse back into the
//! registry.

pub mod leaf;
pub mod registry;

pub use leaf::{BoolDecoder, FromStrDecoder, StringDecoder};
pub use registry::DecoderRegistry;

use crate::config::EngineSettings;
use crate::node::ConfigNode;
use crate::tags::Tags;
use crate::validated::Validated;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Decoder precedence; the derived ordering is lowest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    VeryLow,
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

/// Runtime descriptor of a decode target.
#[derive(Debug, Clone, Copy)]
pub struct TypeCapture {
    id: TypeId,
    name: &'static str,
}

impl TypeCapture {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeCapture {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeCapture {}

impl Hash for TypeCapture {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type-erased decoder output; the registry downcasts it to the target.
pub type DecodedValue = Box<dyn Any + Send>;

/// Read access to the resolved configuration, for decoders that follow
/// references to other paths.
pub trait ConfigLookup: Send + Sync {
    fn lookup_node(&self, path: &str, tags: &Tags) -> Validated<ConfigNode>;
}

/// Everything a decoder may call back into while decoding.
#[derive(Clone, Copy)]
pub struct DecoderContext<'a> {
    pub registry: &'a DecoderRegistry,
    pub facade: Option<&'a dyn ConfigLookup>,
    pub settings: &'a EngineSettings,
}

impl<'a> DecoderContext<'a> {
    pub fn with_facade(mut self, facade: &'a dyn ConfigLookup) -> Self {
        self.facade = Some(facade);
        self
    }
}

pub trait Decoder: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> Priority {
        Priority::Medium
    }

    /// Whether this decoder produces values of `target`.
    fn matches(&self, target: &TypeCapture) -> bool;

    /// Finer-grained check with the node in hand. Defaults to [`matches`].
    ///
    /// [`matches`]: Decoder::matches
    fn can_decode(&self, _path: &str, _tags: &Tags, _node: Option<&ConfigNode>, target: &TypeCapture) -> bool {
        self.matches(target)
    }

    /// Decode `node`, which is `None` when nothing exists at `path`.
    fn decode(
        &self,
        path: &str,
        tags: &Tags,
        node: Option<&ConfigNode>,
        target: &TypeCapture,
        ctx: &DecoderContext<'_>,
    ) -> Validated<DecodedValue>;
}
