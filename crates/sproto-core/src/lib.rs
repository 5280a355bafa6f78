//! # sproto-core
//!
//! A *sproto*-compatible binary wire-format codec: a schema bundle loader, a
//! tag-sparse record encoder/decoder, and a zero-run byte framer ("pack/unpack").
//!
//! Load a bundle once into a [`Catalogue`], then encode and decode [`Value`]
//! trees against the [`Type`]s it contains:
//!
//! ```
//! use sproto_core::{bundle, record, value::Value};
//! use std::collections::BTreeMap;
//!
//! # fn example(bundle_bytes: &[u8]) -> Result<(), sproto_core::errors::SprotoError> {
//! let catalogue = bundle::parse(bundle_bytes)?;
//! let ty = catalogue.get_type_by_name("Ping").expect("schema defines Ping");
//!
//! let mut fields = BTreeMap::new();
//! fields.insert("id".to_string(), Value::Integer(7));
//! let encoded = record::encode(&catalogue, ty, &Value::Struct(fields))?;
//!
//! let (decoded, _consumed) = record::decode(&catalogue, ty, &encoded)?;
//! # let _ = decoded;
//! # Ok(())
//! # }
//! ```
//!
//! Pack the encoded bytes for transport with [`pack::pack`] / [`pack::unpack`].

pub mod bundle;
pub mod catalogue;
pub mod errors;
pub mod field;
pub mod pack;
pub mod record;
pub mod value;
pub mod wire;

pub use catalogue::{Catalogue, Protocol, Type, TypeRef};
pub use errors::SprotoError;
pub use value::Value;
