//! Marker types a world registers to participate in replication: the
//! `Replicated` tag selecting which entities a producer streams, and the
//! `CommandOf` relation plus data components an ephemeral command entity
//! carries.

use relaytick_component::{Component, Relation};

/// Tags an entity as eligible for producer-side replication. Only
/// mutations to entities carrying this tag are appended to the outbound
/// transaction stream.
pub struct Replicated;
impl Component for Replicated {
    fn type_name() -> &'static str {
        "Replicated"
    }
    fn is_tag() -> bool {
        true
    }
}
impl serde::Serialize for Replicated {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_unit()
    }
}
impl<'de> serde::Deserialize<'de> for Replicated {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        <()>::deserialize(d).map(|_| Replicated)
    }
}

/// Relates an ephemeral command entity to the player entity whose intent
/// it carries.
pub struct CommandOf;
impl Relation for CommandOf {
    fn name() -> &'static str {
        "CommandOf"
    }
}

/// The tick a command was issued at by its originating domain, carried on
/// the ephemeral command entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IntentTick(pub u64);
impl Component for IntentTick {
    fn type_name() -> &'static str {
        "IntentTick"
    }
}

/// The causal key stamped on a command so its eventual echo in a producer
/// transaction can be recognised and suppressed rather than re-applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CausalKey(pub u32);
impl Component for CausalKey {
    fn type_name() -> &'static str {
        "CausalKey"
    }
}

/// Derives a causal key from `(originating domain, tick, sequence)` —
/// deterministic within one consumer instance, which is all that's needed
/// since the producer only ever passes the value through unchanged.
#[must_use]
pub fn causal_key(domain: u8, tick: u64, seq: u32) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in domain
        .to_le_bytes()
        .into_iter()
        .chain(tick.to_le_bytes())
        .chain(seq.to_le_bytes())
    {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_causal_key_is_deterministic() {
        assert_eq!(causal_key(1, 100, 3), causal_key(1, 100, 3));
    }

    #[test]
    fn test_causal_key_distinguishes_inputs() {
        assert_ne!(causal_key(1, 100, 3), causal_key(1, 100, 4));
        assert_ne!(causal_key(1, 100, 3), causal_key(2, 100, 3));
    }
}
