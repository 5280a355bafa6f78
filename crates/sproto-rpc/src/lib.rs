//! # sproto-rpc
//!
//! Session-multiplexed RPC envelope layer on top of [`sproto_core`]'s record
//! codec: a package header carrying a protocol tag and an optional session
//! id, routed requests and responses, and an outstanding-session table.

pub mod errors;
pub mod host;

pub use errors::RpcError;
pub use host::{Dispatched, RpcHost};
