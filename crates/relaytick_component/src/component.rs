//! The [`Component`] trait, per-type codecs, and the [`ComponentRegistry`]
//! that assigns each registered type a dense, monotone [`ComponentId`].
//!
//! Every piece of data stored in the ECS must implement [`Component`]. The
//! trait requires `Send + Sync + 'static` so components can safely live in
//! columnar storage, plus `Serialize`/`Deserialize` so they can cross the
//! wire.
//!
//! Unlike a `TypeId`-keyed scheme, [`ComponentId`] is assigned in
//! **registration order** — the first type registered in a world gets id 0,
//! the second gets id 1, and so on. This matches what replicated peers need:
//! ids must be small and dense enough to varint-encode cheaply, and they
//! only need to agree *within* a world/peer pair, not globally.

use std::any::TypeId;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::Entity;

/// A dense integer identifier for a registered component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u32);

/// Errors raised while encoding or decoding a single component's payload.
#[derive(Debug, Error)]
pub enum ComponentError {
    /// The registry has no entry for this component id.
    #[error("unknown component id {0:?}")]
    UnknownId(ComponentId),
    /// The codec failed to serialise a live value.
    #[error("failed to encode component '{name}': {source}")]
    Encode {
        name: &'static str,
        #[source]
        source: rmp_serde::encode::Error,
    },
    /// The codec failed to deserialise wire bytes.
    #[error("failed to decode component '{name}': {source}")]
    Decode {
        name: &'static str,
        #[source]
        source: rmp_serde::decode::Error,
    },
}

/// Metadata the registry keeps about one component type.
///
/// `encode_fn`/`decode_fn` operate on the component's in-memory
/// representation: `encode_fn` takes `item_size` raw bytes (as stored in an
/// archetype column) and returns MessagePack bytes; `decode_fn` is the
/// inverse. Tag components (`is_tag == true`) have `item_size == 0` and
/// their codec functions are never called — a tag's presence *is* its
/// payload.
#[derive(Clone)]
pub struct ComponentMeta {
    /// This type's assigned id.
    pub id: ComponentId,
    /// Human-readable name (e.g. `"Position"`), used in logs and errors.
    pub name: &'static str,
    /// `true` for zero-payload marker components.
    pub is_tag: bool,
    /// Size in bytes of one live value, as stored in a column. Zero for tags.
    pub item_size: usize,
    /// Serialise `item_size` raw bytes of a live value to wire bytes.
    pub encode_fn: fn(&[u8]) -> Result<Vec<u8>, ComponentError>,
    /// Deserialise wire bytes into `item_size` raw bytes of a live value.
    pub decode_fn: fn(&[u8]) -> Result<Vec<u8>, ComponentError>,
}

/// The core component trait. All data stored in the ECS implements this.
///
/// # Examples
///
/// ```rust
/// use serde::{Serialize, Deserialize};
/// use relaytick_component::Component;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Component: Send + Sync + 'static + Serialize + for<'de> Deserialize<'de> {
    /// A human-readable name for this component type.
    fn type_name() -> &'static str;

    /// `true` if this component carries no payload and exists purely for
    /// set-membership (see spec §3, "A **tag** is a component with empty
    /// payload used purely for set-membership").
    fn is_tag() -> bool {
        false
    }

    /// Build the [`ComponentMeta`] this type would register under, given
    /// the id the registry has assigned it.
    fn meta(id: ComponentId) -> ComponentMeta {
        let item_size = if Self::is_tag() {
            0
        } else {
            std::mem::size_of::<Self>()
        };
        ComponentMeta {
            id,
            name: Self::type_name(),
            is_tag: Self::is_tag(),
            item_size,
            encode_fn: |bytes: &[u8]| {
                assert!(bytes.len() >= std::mem::size_of::<Self>());
                // SAFETY: caller guarantees `bytes` holds a valid, initialised `Self`.
                let value = unsafe { &*(bytes.as_ptr() as *const Self) };
                rmp_serde::to_vec(value).map_err(|source| ComponentError::Encode {
                    name: Self::type_name(),
                    source,
                })
            },
            decode_fn: |bytes: &[u8]| {
                let value: Self =
                    rmp_serde::from_slice(bytes).map_err(|source| ComponentError::Decode {
                        name: Self::type_name(),
                        source,
                    })?;
                let mut result = vec![0u8; std::mem::size_of::<Self>()];
                // SAFETY: `result` is sized for exactly one `Self` and nothing
                // else aliases it yet.
                unsafe {
                    std::ptr::write(result.as_mut_ptr() as *mut Self, value);
                }
                Ok(result)
            },
        }
    }
}

/// Maps registered component types to dense [`ComponentId`]s and remembers
/// their codec. Registration is idempotent: registering the same Rust type
/// twice returns the id assigned the first time.
#[derive(Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentId>,
    metas: Vec<ComponentMeta>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`, returning its [`ComponentId`]. Allocates a fresh,
    /// monotone id on first registration; returns the existing id
    /// otherwise.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.by_type.get(&type_id) {
            return id;
        }
        let id = ComponentId(self.metas.len() as u32);
        self.metas.push(T::meta(id));
        self.by_type.insert(type_id, id);
        id
    }

    /// Look up the id already assigned to `T`, if registered.
    #[must_use]
    pub fn id_of<T: Component>(&self) -> Option<ComponentId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Allocate a fresh [`ComponentId`] with no backing Rust type.
    ///
    /// Used by the relation registry: a relation instance's virtual
    /// component id lives in the same id space as ordinary components (an
    /// archetype's sorted id vector doesn't distinguish the two), but has
    /// no payload — it behaves exactly like a tag.
    pub fn register_virtual(&mut self, name: &'static str) -> ComponentId {
        let id = ComponentId(self.metas.len() as u32);
        self.metas.push(ComponentMeta {
            id,
            name,
            is_tag: true,
            item_size: 0,
            encode_fn: |_| Ok(Vec::new()),
            decode_fn: |_| Ok(Vec::new()),
        });
        id
    }

    /// Look up metadata by id.
    #[must_use]
    pub fn meta(&self, id: ComponentId) -> Option<&ComponentMeta> {
        self.metas.get(id.0 as usize)
    }

    /// Iterate all registered component metadata, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentMeta> {
        self.metas.iter()
    }

    /// The number of distinct component types registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.metas.len()
    }

    /// `true` if nothing has been registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }
}

/// A record pairing an [`Entity`] with a single component's encoded
/// payload. Used by snapshot blocks and by `Spawn`/`Set`/`Add` transaction
/// operations on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// The entity this component belongs to.
    pub entity: Entity,
    /// Wire-encoded component bytes (empty for tags).
    pub data: Vec<u8>,
}
