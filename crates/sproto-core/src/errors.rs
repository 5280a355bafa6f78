//! Error kinds surfaced by schema loading, record encode/decode, and pack/unpack.

use thiserror::Error;

/// Every fallible operation in this crate returns one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SprotoError {
    /// A schema bundle failed structural validation: size mismatch, non-monotonic
    /// tags, an unknown meta-tag, or a dangling type-id.
    #[error("malformed schema: {reason}")]
    MalformedSchema { reason: String },

    /// A record or array body failed structural validation during decode.
    #[error("malformed payload at byte offset {offset}: {reason}")]
    MalformedPayload { offset: usize, reason: String },

    /// A value handed to the encoder is not assignable to the field's declared type.
    #[error("type mismatch on field '{field_name}' (tag {tag}): expected {expected}, got {actual}")]
    TypeMismatch {
        tag: i32,
        field_name: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Recursive encode/decode exceeded the depth cap (64).
    #[error("recursion exceeded depth cap of {limit} at tag {tag}")]
    TooDeep { tag: i32, limit: u32 },

    /// A tag gap did not fit in 16 bits, or an integer did not fit in 64 bits.
    #[error("encoding overflow on field tag {tag}: {reason}")]
    EncodingOverflow { tag: i32, reason: String },
}
