//! RPC host (C7): package envelope + session table over the record codec.
//!
//! The package type is a regular `sproto_core` type, resolved by name at
//! [`RpcHost::attach`] time, carrying exactly two fields named `"type"` (the
//! protocol tag, present only on requests) and `"session"` (present whenever
//! the caller wants a matching response correlated back).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use sproto_core::catalogue::{Catalogue, Type};
use sproto_core::errors::SprotoError;
use sproto_core::value::Value;
use sproto_core::{pack, record};

use crate::errors::RpcError;

const TYPE_FIELD: &str = "type";
const SESSION_FIELD: &str = "session";

/// What a live session entry is waiting for.
enum SessionEntry {
    /// Response type to decode the payload against, by index into `Catalogue::types`.
    Expect(usize),
    /// Protocol has `confirm != 0` but no declared response type: dispatch yields
    /// a bare acknowledgment with no payload.
    ConfirmOnly,
}

/// The outcome of [`RpcHost::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    Request {
        protocol_name: String,
        result: Option<Value>,
        session: Option<i64>,
    },
    Response {
        session: i64,
        result: Option<Value>,
    },
}

/// Multiplexes requests and responses over a single schema-bound catalogue.
///
/// `Send + Sync`: the catalogue is immutable and the session table is guarded
/// by a [`parking_lot::Mutex`] taken only for the span of the table mutation
/// itself (§4.6) — encode/decode happen outside the lock.
pub struct RpcHost {
    catalogue: Arc<Catalogue>,
    package_type: usize,
    sessions: Mutex<HashMap<i64, SessionEntry>>,
}

impl RpcHost {
    /// Binds a host to `catalogue`, resolving `package_type_name` (default `"package"`
    /// at the call site's discretion) as the envelope type.
    pub fn attach(catalogue: Arc<Catalogue>, package_type_name: &str) -> Result<Self, RpcError> {
        let package_type = catalogue
            .types
            .iter()
            .position(|t| t.name == package_type_name)
            .ok_or_else(|| SprotoError::MalformedSchema {
                reason: format!("package type '{package_type_name}' not found in catalogue"),
            })?;

        log::debug!("rpc host attached with package type '{package_type_name}'");
        Ok(RpcHost {
            catalogue,
            package_type,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    fn package_type(&self) -> &Type {
        &self.catalogue.types[self.package_type]
    }

    /// Encodes a request (or a fire-and-forget message, if `session` is `None`)
    /// and packs it for the wire.
    pub fn send(&self, proto_name: &str, args: Option<&Value>, session: Option<i64>) -> Result<Vec<u8>, RpcError> {
        let protocol = self
            .catalogue
            .get_protocol_by_name(proto_name)
            .ok_or_else(|| RpcError::UnknownProtocolName { name: proto_name.to_string() })?;

        let mut envelope = BTreeMap::new();
        envelope.insert(TYPE_FIELD.to_string(), Value::Integer(protocol.tag as i64));
        if let Some(session) = session {
            envelope.insert(SESSION_FIELD.to_string(), Value::Integer(session));
        }
        let mut combined = record::encode(&self.catalogue, self.package_type(), &Value::Struct(envelope))?;

        if let Some(args) = args {
            let request_type = self.catalogue.request_type(protocol).ok_or_else(|| SprotoError::MalformedSchema {
                reason: format!("protocol '{proto_name}' has no request type but args were provided"),
            })?;
            let payload = record::encode(&self.catalogue, request_type, args)?;
            combined.extend_from_slice(&payload);
        }

        if let Some(session) = session {
            if session != 0 {
                let entry = if let Some(response_idx) = protocol.response {
                    Some(SessionEntry::Expect(response_idx))
                } else if protocol.confirm != 0 {
                    Some(SessionEntry::ConfirmOnly)
                } else {
                    None
                };
                if let Some(entry) = entry {
                    self.sessions.lock().insert(session, entry);
                    log::trace!("rpc host: session {session} registered, awaiting response");
                }
            }
        }

        Ok(pack::pack(&combined))
    }

    /// Unpacks and decodes an incoming frame, classifying it as a request or response.
    pub fn dispatch(&self, bytes: &[u8]) -> Result<Dispatched, RpcError> {
        let unpacked = pack::unpack(bytes)?;
        let (envelope, consumed) = record::decode(&self.catalogue, self.package_type(), &unpacked)?;
        let payload = &unpacked[consumed..];

        let fields = match &envelope {
            Value::Struct(m) => m,
            _ => unreachable!("record::decode always yields Value::Struct for a struct type"),
        };

        let proto_tag = match fields.get(TYPE_FIELD) {
            Some(Value::Integer(tag)) => Some(*tag),
            Some(_) | None => None,
        };
        let session = match fields.get(SESSION_FIELD) {
            Some(Value::Integer(session)) => Some(*session),
            Some(_) | None => None,
        };

        match proto_tag {
            Some(tag) => {
                let protocol = self
                    .catalogue
                    .get_protocol_by_tag(tag as i32)
                    .ok_or(RpcError::UnknownProtocol { tag: tag as i32 })?;

                let result = match self.catalogue.request_type(protocol) {
                    Some(req_ty) if !payload.is_empty() => Some(record::decode(&self.catalogue, req_ty, payload)?.0),
                    _ => None,
                };

                Ok(Dispatched::Request {
                    protocol_name: protocol.name.clone(),
                    result,
                    session,
                })
            }
            None => {
                let session = session.ok_or_else(|| SprotoError::MalformedPayload {
                    offset: 0,
                    reason: "response envelope is missing a session".to_string(),
                })?;

                let entry = self
                    .sessions
                    .lock()
                    .remove(&session)
                    .ok_or(RpcError::UnknownSession { session })?;
                log::trace!("rpc host: session {session} resolved");

                match entry {
                    SessionEntry::ConfirmOnly => Ok(Dispatched::Response { session, result: None }),
                    SessionEntry::Expect(type_idx) => {
                        let response_type = &self.catalogue.types[type_idx];
                        let (value, _) = record::decode(&self.catalogue, response_type, payload)?;
                        Ok(Dispatched::Response { session, result: Some(value) })
                    }
                }
            }
        }
    }

    /// Encodes a response envelope (`type` absent, `session` carried through) and packs it.
    pub fn respond(&self, proto_name: &str, session: Option<i64>, args: Option<&Value>) -> Result<Vec<u8>, RpcError> {
        let protocol = self
            .catalogue
            .get_protocol_by_name(proto_name)
            .ok_or_else(|| RpcError::UnknownProtocolName { name: proto_name.to_string() })?;

        let mut envelope = BTreeMap::new();
        if let Some(session) = session {
            envelope.insert(SESSION_FIELD.to_string(), Value::Integer(session));
        }
        let mut combined = record::encode(&self.catalogue, self.package_type(), &Value::Struct(envelope))?;

        if let Some(args) = args {
            let response_type = self.catalogue.response_type(protocol).ok_or_else(|| SprotoError::MalformedSchema {
                reason: format!("protocol '{proto_name}' has no response type but args were provided"),
            })?;
            let payload = record::encode(&self.catalogue, response_type, args)?;
            combined.extend_from_slice(&payload);
        }

        Ok(pack::pack(&combined))
    }

    /// Escape hatch for callers implementing their own timeout policy (§5): drops a
    /// session entry without a matching response ever having arrived.
    pub fn forget_session(&self, session: i64) {
        if self.sessions.lock().remove(&session).is_some() {
            log::trace!("rpc host: session {session} forgotten without a response");
        }
    }
}
