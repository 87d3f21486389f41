//! Wire-layer error types.

use relaytick_component::ComponentId;

/// Errors raised while framing or parsing a wire message.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A component ID on the wire has no registered counterpart locally —
    /// a protocol mismatch, fatal per connection.
    #[error("unknown component id {0:?} on the wire")]
    UnknownComponentId(ComponentId),

    /// The buffer ended before a fixed-size or length-prefixed field could
    /// be fully read.
    #[error("buffer truncated while decoding")]
    Truncated,

    /// A varint ran past the maximum continuation-byte count without
    /// terminating.
    #[error("invalid varint encoding")]
    InvalidVarint,

    /// A string field was not valid UTF-8.
    #[error("invalid utf-8 in wire message: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}
