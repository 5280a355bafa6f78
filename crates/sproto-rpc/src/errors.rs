//! Error kinds surfaced by the RPC envelope/session layer.

use sproto_core::errors::SprotoError;
use thiserror::Error;

/// Every fallible operation in this crate returns one of these. Codec-level
/// failures (malformed schema, malformed payload, type mismatch, ...) are
/// forwarded from [`sproto_core`] unchanged via `#[from]`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error(transparent)]
    Codec(#[from] SprotoError),

    /// An envelope's protocol tag (from the wire) is not in the catalogue.
    #[error("unknown protocol tag {tag}")]
    UnknownProtocol { tag: i32 },

    /// A caller asked to send/respond to a protocol name not in the catalogue.
    #[error("unknown protocol '{name}'")]
    UnknownProtocolName { name: String },

    /// A response envelope references a session not in the session table.
    #[error("unknown session {session}")]
    UnknownSession { session: i64 },
}
