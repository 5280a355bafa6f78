//! Bundle parser (C2): turns a precompiled binary schema bundle into a [`Catalogue`].
//!
//! The bundle is itself just a `struct` in the generic wire sense (§6): an
//! outer record with up to two fields (`types` at tag 0, `protocols` at tag
//! 1), each a `count:u32 | child[count]` array of length-prefixed child
//! structs. Parsing a child struct means walking its header the same way
//! [`crate::record`] does, but the field meanings (name, type-code, ...) are
//! fixed by the meta-schema in §6 rather than looked up in a `Type` — there
//! is no catalogue yet to look one up in.

use std::collections::BTreeMap;

use crate::catalogue::{Catalogue, Protocol, Type};
use crate::errors::SprotoError;
use crate::field::{FieldDescriptor, FieldType};
use crate::record::decode_integer_body;
use crate::wire::Reader;

/// One resolved header slot, keyed by tag, generic over what it means.
enum Slot<'a> {
    Inline(i64),
    Bytes(&'a [u8]),
}

fn malformed(reason: impl Into<String>) -> SprotoError {
    SprotoError::MalformedSchema { reason: reason.into() }
}

/// Walks a struct's header/data region into a tag → slot map, mirroring the
/// `current_tag` walk in [`crate::record::decode`] without needing a `Type`.
fn read_slots<'a>(reader: &mut Reader<'a>) -> Result<BTreeMap<i32, Slot<'a>>, SprotoError> {
    let header_count = reader.read_u16()? as usize;
    let mut header = Vec::new();
    for _ in 0..header_count {
        header.push(reader.read_u16()?);
    }

    let mut slots = BTreeMap::new();
    let mut current_tag: i32 = -1;

    for entry in header {
        current_tag += 1;

        if entry % 2 == 1 {
            let extra = ((entry - 1) / 2) as i32;
            current_tag += extra;
            continue;
        }

        if entry == 0 {
            let bytes = reader.read_len_prefixed()?;
            slots.insert(current_tag, Slot::Bytes(bytes));
        } else {
            slots.insert(current_tag, Slot::Inline((entry / 2) as i64 - 1));
        }
    }

    Ok(slots)
}

fn check_known_tags(slots: &BTreeMap<i32, Slot<'_>>, max_tag: i32, context: &str) -> Result<(), SprotoError> {
    if let Some(bad) = slots.keys().find(|&&t| t > max_tag) {
        return Err(malformed(format!("unknown meta-tag {bad} in {context}")));
    }
    Ok(())
}

fn slot_as_int(slot: &Slot<'_>) -> Result<i64, SprotoError> {
    match slot {
        Slot::Inline(v) => Ok(*v),
        Slot::Bytes(b) => decode_integer_body(b),
    }
}

fn get_int(slots: &BTreeMap<i32, Slot<'_>>, tag: i32) -> Result<Option<i64>, SprotoError> {
    slots.get(&tag).map(slot_as_int).transpose()
}

fn get_bytes<'a>(slots: &BTreeMap<i32, Slot<'a>>, tag: i32) -> Result<Option<&'a [u8]>, SprotoError> {
    match slots.get(&tag) {
        None => Ok(None),
        Some(Slot::Bytes(b)) => Ok(Some(b)),
        Some(Slot::Inline(_)) => Err(malformed(format!("expected a length-prefixed body at tag {tag}, got an inline value"))),
    }
}

fn get_string(slots: &BTreeMap<i32, Slot<'_>>, tag: i32, context: &str) -> Result<Option<String>, SprotoError> {
    match get_bytes(slots, tag)? {
        None => Ok(None),
        Some(bytes) => {
            let s = std::str::from_utf8(bytes).map_err(|e| malformed(format!("{context}: tag {tag} is not valid UTF-8: {e}")))?;
            Ok(Some(s.to_string()))
        }
    }
}

/// Parses a precompiled schema bundle into a read-only [`Catalogue`].
pub fn parse(bytes: &[u8]) -> Result<Catalogue, SprotoError> {
    let mut reader = Reader::new(bytes);
    let slots = read_slots(&mut reader)?;
    check_known_tags(&slots, 1, "bundle")?;

    let mut types = Vec::new();
    if let Some(array) = get_bytes(&slots, 0)? {
        let mut r = Reader::new(array);
        let count = r.read_u32()?;
        for _ in 0..count {
            let child = r.read_len_prefixed()?;
            let ty = parse_type(child, types.len())?;
            types.push(ty);
        }
    }

    let mut protocols = Vec::new();
    if let Some(array) = get_bytes(&slots, 1)? {
        let mut r = Reader::new(array);
        let count = r.read_u32()?;
        for _ in 0..count {
            let child = r.read_len_prefixed()?;
            protocols.push(parse_protocol(child, types.len())?);
        }
    }

    log::debug!("bundle parsed: {} types, {} protocols", types.len(), protocols.len());
    Ok(Catalogue::new(types, protocols))
}

fn parse_type(body: &[u8], types_registered: usize) -> Result<Type, SprotoError> {
    let mut reader = Reader::new(body);
    let slots = read_slots(&mut reader)?;
    check_known_tags(&slots, 1, "type")?;

    let name = get_string(&slots, 0, "type")?.unwrap_or_default();
    let fields = match get_bytes(&slots, 1)? {
        Some(array) => parse_field_array(array, types_registered)?,
        None => Vec::new(),
    };

    Ok(Type::compile(name, fields))
}

fn parse_field_array(array: &[u8], types_registered: usize) -> Result<Vec<FieldDescriptor>, SprotoError> {
    let mut r = Reader::new(array);
    let count = r.read_u32()?;
    let mut fields = Vec::new();
    for _ in 0..count {
        let child = r.read_len_prefixed()?;
        fields.push(parse_field(child, types_registered)?);
    }
    Ok(fields)
}

fn parse_field(body: &[u8], types_registered: usize) -> Result<FieldDescriptor, SprotoError> {
    let mut reader = Reader::new(body);
    let slots = read_slots(&mut reader)?;
    check_known_tags(&slots, 5, "field")?;

    let name = get_string(&slots, 0, "field")?.ok_or_else(|| malformed("field missing name (tag 0)"))?;
    let tag = get_int(&slots, 3)?.ok_or_else(|| malformed(format!("field '{name}' missing tag (meta-tag 3)")))? as i32;
    let is_array = get_int(&slots, 4)?.map(|v| v != 0).unwrap_or(false);
    let key = get_int(&slots, 5)?.map(|v| v as i32);

    match get_int(&slots, 1)? {
        Some(code) => {
            let field_type = match code {
                0 => FieldType::Integer,
                1 => FieldType::Boolean,
                2 => FieldType::String,
                3 => FieldType::Double,
                other => return Err(malformed(format!("field '{name}': unknown type-code {other}"))),
            };
            let extra = get_int(&slots, 2)?.unwrap_or(0) as i32;
            match field_type {
                FieldType::Boolean | FieldType::Double if extra != 0 => {
                    return Err(malformed(format!(
                        "field '{name}': {} fields must have extra absent or zero, got {extra}",
                        field_type.name()
                    )));
                }
                FieldType::Integer if extra < 0 => {
                    return Err(malformed(format!("field '{name}': integer extra must be non-negative, got {extra}")));
                }
                _ => {}
            }
            Ok(FieldDescriptor {
                tag,
                name,
                field_type,
                subtype_ref: None,
                key,
                extra,
                is_array,
            })
        }
        None => {
            let subtype_ref = get_int(&slots, 2)?
                .ok_or_else(|| malformed(format!("struct field '{name}' missing subtype_ref (meta-tag 2)")))?;
            if subtype_ref < 0 || subtype_ref as usize >= types_registered {
                return Err(malformed(format!(
                    "field '{name}': subtype_ref {subtype_ref} is not a type registered before this one"
                )));
            }
            Ok(FieldDescriptor {
                tag,
                name,
                field_type: FieldType::Struct,
                subtype_ref: Some(subtype_ref as usize),
                key,
                extra: 0,
                is_array,
            })
        }
    }
}

fn parse_protocol(body: &[u8], types_registered: usize) -> Result<Protocol, SprotoError> {
    let mut reader = Reader::new(body);
    let slots = read_slots(&mut reader)?;
    check_known_tags(&slots, 4, "protocol")?;

    let name = get_string(&slots, 0, "protocol")?.ok_or_else(|| malformed("protocol missing name (tag 0)"))?;
    let tag = get_int(&slots, 1)?.ok_or_else(|| malformed(format!("protocol '{name}' missing tag (meta-tag 1)")))? as i32;
    let request = get_int(&slots, 2)?.map(|v| v as i64);
    let response = get_int(&slots, 3)?.map(|v| v as i64);
    let confirm = get_int(&slots, 4)?.unwrap_or(0) as i32;

    for id in [request, response].into_iter().flatten() {
        if id < 0 || id as usize >= types_registered {
            return Err(malformed(format!("protocol '{name}': type id {id} is not a registered type")));
        }
    }

    Ok(Protocol {
        name,
        tag,
        request: request.map(|v| v as usize),
        response: response.map(|v| v as usize),
        confirm,
    })
}
