//! Entity identifiers and per-domain allocation.
//!
//! An [`Entity`] is a 32-bit identifier partitioned into an 8-bit **domain**
//! tag and a 24-bit **local ordinal**. Domain 0 is the authoritative
//! producer world; every other domain is a prediction-consumer world. The
//! pair `(domain, local)` is globally unique across every world in the
//! system — two entities with the same domain and local ordinal, minted in
//! two different worlds, refer to the same logical object once the
//! consumer's reconciliation engine re-binds them (see `relaytick_replication`).

use serde::{Deserialize, Serialize};

/// Number of bits reserved for the local ordinal within an [`Entity`].
const LOCAL_BITS: u32 = 24;
/// Mask selecting the local-ordinal bits of a packed entity ID.
const LOCAL_MASK: u32 = (1 << LOCAL_BITS) - 1;

/// The domain tag identifying which world minted an entity.
///
/// Domain `0` is reserved for the authoritative producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Domain(pub u8);

impl Domain {
    /// The authoritative producer's domain.
    pub const PRODUCER: Domain = Domain(0);

    /// Returns `true` if this domain is the authoritative producer.
    #[must_use]
    pub const fn is_producer(self) -> bool {
        self.0 == 0
    }
}

/// A unique entity identifier: an 8-bit [`Domain`] packed with a 24-bit
/// local ordinal into a single `u32`.
///
/// Entities carry no data of their own — components attached through a
/// world give them meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(u32);

impl Entity {
    /// The null / invalid entity sentinel: domain 0, local ordinal 0.
    pub const INVALID: Entity = Entity(0);

    /// Pack a `(domain, local)` pair into an [`Entity`].
    ///
    /// # Panics
    ///
    /// Panics if `local` does not fit in 24 bits.
    #[must_use]
    pub fn new(domain: Domain, local: u32) -> Self {
        assert!(local <= LOCAL_MASK, "local ordinal {local} exceeds 24 bits");
        Self(((domain.0 as u32) << LOCAL_BITS) | local)
    }

    /// Construct an [`Entity`] from its already-packed raw `u32` form, as
    /// seen on the wire.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the packed raw `u32` identifier, as written on the wire.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the domain that minted this entity.
    #[must_use]
    pub const fn domain(self) -> Domain {
        Domain((self.0 >> LOCAL_BITS) as u8)
    }

    /// Returns the local ordinal, unique within `self.domain()`.
    #[must_use]
    pub const fn local(self) -> u32 {
        self.0 & LOCAL_MASK
    }

    /// Returns `true` if this is a valid (non-zero) entity.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Returns a copy of this entity re-tagged into a different domain,
    /// keeping the same local ordinal. Used by tests; the reconciliation
    /// engine's ghost map does something stronger — it allocates a *fresh*
    /// local entity in the consumer's domain rather than reusing the
    /// foreign ordinal.
    #[must_use]
    pub fn retagged(self, domain: Domain) -> Self {
        Self::new(domain, self.local())
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}:{})", self.domain().0, self.local())
    }
}

/// Allocates monotonically increasing local ordinals for a single domain.
///
/// Each world owns exactly one allocator, tagged with that world's domain.
/// A free-list for recycling despawned ordinals can be added later without
/// affecting the wire format (ordinals need not be dense).
#[derive(Debug)]
pub struct EntityAllocator {
    domain: Domain,
    next_local: u32,
}

impl EntityAllocator {
    /// Creates a new allocator for the given domain. Local ordinals start
    /// at 1 (0 is reserved for [`Entity::INVALID`]).
    #[must_use]
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            next_local: 1,
        }
    }

    /// The domain this allocator mints entities for.
    #[must_use]
    pub const fn domain(&self) -> Domain {
        self.domain
    }

    /// Allocates a fresh entity in this allocator's domain.
    pub fn allocate(&mut self) -> Entity {
        let entity = Entity::new(self.domain, self.next_local);
        self.next_local += 1;
        entity
    }

    /// Returns the number of entities allocated so far.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.next_local - 1
    }
}
