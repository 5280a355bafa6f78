//! Record encoder (C4) and decoder (C5): tag-sparse struct bodies with a
//! tag-gap-compressed header, per §4.3/§4.4.
//!
//! Header entries are `u16`s. An entry is either:
//! - odd: a tag-gap marker `(gap-1)*2 + 1` that, combined with the implicit
//!   +1 advance every header entry carries, skips `gap` tag positions; or
//! - `0`: "this field's value lives in the data region as `len:u32 | bytes`"; or
//! - even and non-zero: an inlined small non-negative integer `entry/2 - 1`.

use std::collections::BTreeMap;

use crate::catalogue::{Catalogue, Type};
use crate::errors::SprotoError;
use crate::field::{FieldDescriptor, FieldType};
use crate::value::Value;
use crate::wire::{self, Reader};

/// Matches the hard recursion cap in §4.3/§5.
const MAX_DEPTH: u32 = 64;

fn fits_i32(v: i64) -> bool {
    v >= i32::MIN as i64 && v <= i32::MAX as i64
}

fn round_half_away_from_zero(v: f64) -> f64 {
    if v >= 0.0 { v.floor() + if v - v.floor() >= 0.5 { 1.0 } else { 0.0 } } else { -round_half_away_from_zero(-v) }
}

fn type_mismatch(field: &FieldDescriptor, expected: &'static str, actual: &'static str) -> SprotoError {
    SprotoError::TypeMismatch {
        tag: field.tag,
        field_name: field.name.clone(),
        expected,
        actual,
    }
}

fn too_deep(tag: i32) -> SprotoError {
    SprotoError::TooDeep { tag, limit: MAX_DEPTH }
}

// ---------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------

/// Encodes `value` (must be `Value::Struct`) against `ty`, returning the full
/// `header_count | header | data` record per §6.
pub fn encode(catalogue: &Catalogue, ty: &Type, value: &Value) -> Result<Vec<u8>, SprotoError> {
    encode_depth(catalogue, ty, value, 0)
}

fn encode_depth(catalogue: &Catalogue, ty: &Type, value: &Value, depth: u32) -> Result<Vec<u8>, SprotoError> {
    if depth >= MAX_DEPTH {
        return Err(too_deep(-1));
    }

    let map = match value {
        Value::Struct(m) => m,
        other => {
            return Err(SprotoError::TypeMismatch {
                tag: -1,
                field_name: ty.name.clone(),
                expected: "struct",
                actual: other.kind_name(),
            });
        }
    };

    let mut header: Vec<u16> = Vec::with_capacity(ty.maxn.min(64));
    let mut data: Vec<u8> = Vec::new();
    let mut last_emitted_tag: i32 = -1;

    for field in &ty.fields {
        let Some(v) = map.get(&field.name) else {
            continue;
        };

        let gap = field.tag - last_emitted_tag - 1;
        if gap > 0 {
            if gap > 0x8000 {
                return Err(SprotoError::EncodingOverflow {
                    tag: field.tag,
                    reason: format!("tag gap of {gap} does not fit in a 16-bit header entry"),
                });
            }
            let marker = ((gap - 1) as u32) * 2 + 1;
            header.push(marker as u16);
        }

        encode_field(catalogue, field, v, &mut header, &mut data, depth)?;
        last_emitted_tag = field.tag;
    }

    let mut out = Vec::with_capacity(2 + header.len() * 2 + data.len());
    wire::write_u16(&mut out, header.len() as u16);
    for h in &header {
        wire::write_u16(&mut out, *h);
    }
    out.extend_from_slice(&data);
    Ok(out)
}

fn push_inline(header: &mut Vec<u16>, field: &FieldDescriptor, v: i64) -> Result<(), SprotoError> {
    if !(0..=0x7FFE).contains(&v) {
        return Err(SprotoError::EncodingOverflow {
            tag: field.tag,
            reason: format!("inline value {v} out of the [0, 0x7FFE] inline range"),
        });
    }
    let entry = 2 * (v as u32 + 1);
    header.push(entry as u16);
    Ok(())
}

// Scalar integer bodies carry no width byte (unlike array bodies): the
// reader infers 4- vs 8-byte width from the data-region length prefix itself.
fn encode_integer_body(v: i64, out: &mut Vec<u8>) {
    if fits_i32(v) {
        wire::write_i32(out, v as i32);
    } else {
        wire::write_u64(out, v as u64);
    }
}

fn scaled_integer_value(field: &FieldDescriptor, value: &Value) -> Result<i64, SprotoError> {
    if field.extra > 0 {
        let f = match value {
            Value::Double(f) => *f,
            Value::Integer(i) => *i as f64,
            other => return Err(type_mismatch(field, "double", other.kind_name())),
        };
        let scaled = round_half_away_from_zero(f * field.decimal_scale() as f64);
        if !scaled.is_finite() || scaled.abs() > i64::MAX as f64 {
            return Err(SprotoError::EncodingOverflow {
                tag: field.tag,
                reason: format!("scaled value {scaled} does not fit in 64 bits"),
            });
        }
        Ok(scaled as i64)
    } else {
        match value {
            Value::Integer(i) => Ok(*i),
            other => Err(type_mismatch(field, "integer", other.kind_name())),
        }
    }
}

fn encode_field(
    catalogue: &Catalogue,
    field: &FieldDescriptor,
    value: &Value,
    header: &mut Vec<u16>,
    data: &mut Vec<u8>,
    depth: u32,
) -> Result<(), SprotoError> {
    if field.is_array {
        let items = match value {
            Value::Array(items) => items,
            other => return Err(type_mismatch(field, "array", other.kind_name())),
        };
        let body = encode_array_body(catalogue, field, items, depth)?;
        header.push(0);
        wire::write_len_prefixed(data, &body);
        return Ok(());
    }

    match field.field_type {
        FieldType::Integer => {
            let v = scaled_integer_value(field, value)?;
            if (0..=0x7FFE).contains(&v) {
                push_inline(header, field, v)?;
            } else {
                header.push(0);
                let mut body = Vec::with_capacity(9);
                encode_integer_body(v, &mut body);
                wire::write_len_prefixed(data, &body);
            }
        }
        FieldType::Boolean => {
            let b = match value {
                Value::Boolean(b) => *b,
                other => return Err(type_mismatch(field, "boolean", other.kind_name())),
            };
            push_inline(header, field, if b { 1 } else { 0 })?;
        }
        FieldType::Double => {
            let d = match value {
                Value::Double(d) => *d,
                other => return Err(type_mismatch(field, "double", other.kind_name())),
            };
            header.push(0);
            let mut body = Vec::with_capacity(8);
            wire::write_f64(&mut body, d);
            wire::write_len_prefixed(data, &body);
        }
        FieldType::String => {
            let bytes: Vec<u8> = if field.is_binary_string() {
                match value {
                    Value::Binary(b) => b.clone(),
                    other => return Err(type_mismatch(field, "binary", other.kind_name())),
                }
            } else {
                match value {
                    Value::String(s) => s.clone().into_bytes(),
                    other => return Err(type_mismatch(field, "string", other.kind_name())),
                }
            };
            header.push(0);
            wire::write_len_prefixed(data, &bytes);
        }
        FieldType::Struct => {
            let subtype_idx = field
                .subtype_ref
                .expect("struct field always carries a subtype_ref (invariant enforced at parse time)");
            let subtype = &catalogue.types[subtype_idx];
            let nested = encode_depth(catalogue, subtype, value, depth + 1)?;
            header.push(0);
            wire::write_len_prefixed(data, &nested);
        }
    }

    Ok(())
}

/// Encodes an array's body (the bytes wrapped by the outer `len:u32` entry).
/// Empty arrays encode to an empty body regardless of element type (§4.3).
fn encode_array_body(
    catalogue: &Catalogue,
    field: &FieldDescriptor,
    items: &[Value],
    depth: u32,
) -> Result<Vec<u8>, SprotoError> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    match field.field_type {
        FieldType::Integer => {
            let scaled: Vec<i64> = items
                .iter()
                .map(|v| scaled_integer_value(field, v))
                .collect::<Result<_, _>>()?;

            let width: u8 = if scaled.iter().all(|&v| fits_i32(v)) { 4 } else { 8 };
            let mut body = Vec::with_capacity(1 + scaled.len() * width as usize);
            body.push(width);
            for v in scaled {
                if width == 4 {
                    wire::write_i32(&mut body, v as i32);
                } else {
                    wire::write_u64(&mut body, v as u64);
                }
            }
            Ok(body)
        }
        FieldType::Boolean => {
            let mut body = Vec::with_capacity(items.len());
            for item in items {
                let b = match item {
                    Value::Boolean(b) => *b,
                    other => return Err(type_mismatch(field, "boolean", other.kind_name())),
                };
                body.push(if b { 1 } else { 0 });
            }
            Ok(body)
        }
        FieldType::Double => {
            let mut body = Vec::with_capacity(items.len() * 8);
            for item in items {
                let d = match item {
                    Value::Double(d) => *d,
                    other => return Err(type_mismatch(field, "double", other.kind_name())),
                };
                wire::write_f64(&mut body, d);
            }
            Ok(body)
        }
        FieldType::String => {
            let mut body = Vec::new();
            for item in items {
                let bytes: Vec<u8> = if field.is_binary_string() {
                    match item {
                        Value::Binary(b) => b.clone(),
                        other => return Err(type_mismatch(field, "binary", other.kind_name())),
                    }
                } else {
                    match item {
                        Value::String(s) => s.clone().into_bytes(),
                        other => return Err(type_mismatch(field, "string", other.kind_name())),
                    }
                };
                wire::write_len_prefixed(&mut body, &bytes);
            }
            Ok(body)
        }
        FieldType::Struct => {
            let subtype_idx = field
                .subtype_ref
                .expect("struct field always carries a subtype_ref (invariant enforced at parse time)");
            let subtype = &catalogue.types[subtype_idx];
            let mut body = Vec::new();
            for item in items {
                let nested = encode_depth(catalogue, subtype, item, depth + 1)?;
                wire::write_len_prefixed(&mut body, &nested);
            }
            Ok(body)
        }
    }
}

// ---------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------

/// Decodes a record against `ty`. Returns the decoded `Value::Struct` and the
/// number of bytes of `bytes` consumed, so callers embedding records inside a
/// larger framed buffer (the RPC envelope) know where the next record starts.
pub fn decode(catalogue: &Catalogue, ty: &Type, bytes: &[u8]) -> Result<(Value, usize), SprotoError> {
    decode_depth(catalogue, ty, bytes, 0)
}

fn decode_depth(catalogue: &Catalogue, ty: &Type, bytes: &[u8], depth: u32) -> Result<(Value, usize), SprotoError> {
    if depth >= MAX_DEPTH {
        return Err(too_deep(-1));
    }

    let mut reader = Reader::new(bytes);
    let header_count = reader.read_u16()? as usize;
    let mut header = Vec::with_capacity(header_count);
    for _ in 0..header_count {
        header.push(reader.read_u16()?);
    }

    let mut map = BTreeMap::new();
    let mut current_tag: i32 = -1;

    for entry in header {
        current_tag += 1;

        if entry % 2 == 1 {
            let extra = ((entry - 1) / 2) as i32;
            current_tag += extra;
            continue;
        }

        let field = ty.field_by_tag(current_tag);

        if entry == 0 {
            let body = reader.read_len_prefixed()?;
            match field {
                Some(field) => {
                    let v = decode_body(catalogue, field, body, depth)?;
                    map.insert(field.name.clone(), v);
                }
                None => {
                    log::trace!("skipping unknown field at tag {current_tag} ({} bytes)", body.len());
                }
            }
            continue;
        }

        // Inline value: entry/2 - 1, field must be INTEGER or BOOLEAN.
        let inline = (entry / 2) as i64 - 1;
        let Some(field) = field else {
            continue; // unknown field, nothing in the data region to skip
        };

        let v = match field.field_type {
            FieldType::Boolean => Value::Boolean(inline != 0),
            FieldType::Integer => {
                if field.extra > 0 {
                    Value::Double(inline as f64 / field.decimal_scale() as f64)
                } else {
                    Value::Integer(inline)
                }
            }
            other => {
                return Err(SprotoError::MalformedPayload {
                    offset: reader.position(),
                    reason: format!(
                        "field '{}' (tag {current_tag}) is {} but header carried an inline scalar",
                        field.name,
                        other.name()
                    ),
                });
            }
        };
        map.insert(field.name.clone(), v);
    }

    Ok((Value::Struct(map), reader.position()))
}

fn decode_body(catalogue: &Catalogue, field: &FieldDescriptor, body: &[u8], depth: u32) -> Result<Value, SprotoError> {
    if field.is_array {
        return decode_array_body(catalogue, field, body, depth);
    }

    match field.field_type {
        FieldType::Integer => {
            let raw = decode_integer_body(body)?;
            Ok(if field.extra > 0 {
                Value::Double(raw as f64 / field.decimal_scale() as f64)
            } else {
                Value::Integer(raw)
            })
        }
        FieldType::Double => {
            if body.len() != 8 {
                return Err(SprotoError::MalformedPayload {
                    offset: 0,
                    reason: format!("double body must be 8 bytes, got {}", body.len()),
                });
            }
            let bytes: [u8; 8] = body.try_into().unwrap();
            Ok(Value::Double(f64::from_le_bytes(bytes)))
        }
        FieldType::String => {
            if field.is_binary_string() {
                Ok(Value::Binary(body.to_vec()))
            } else {
                let s = std::str::from_utf8(body).map_err(|e| SprotoError::MalformedPayload {
                    offset: 0,
                    reason: format!("field '{}' is not valid UTF-8: {e}", field.name),
                })?;
                Ok(Value::String(s.to_string()))
            }
        }
        FieldType::Struct => {
            let subtype_idx = field
                .subtype_ref
                .expect("struct field always carries a subtype_ref (invariant enforced at parse time)");
            let subtype = &catalogue.types[subtype_idx];
            let (value, _) = decode_depth(catalogue, subtype, body, depth + 1)?;
            Ok(value)
        }
        FieldType::Boolean => Err(SprotoError::MalformedPayload {
            offset: 0,
            reason: format!("boolean field '{}' carried a data-region body; booleans are always inline", field.name),
        }),
    }
}

pub(crate) fn decode_integer_body(body: &[u8]) -> Result<i64, SprotoError> {
    let mut reader = wire::Reader::new(body);
    match body.len() {
        4 => Ok(reader.read_i32()? as i64),
        8 => Ok(reader.read_u64()? as i64),
        n => Err(SprotoError::MalformedPayload {
            offset: 0,
            reason: format!("integer body must be 4 or 8 bytes, got {n}"),
        }),
    }
}

fn decode_array_body(catalogue: &Catalogue, field: &FieldDescriptor, body: &[u8], depth: u32) -> Result<Value, SprotoError> {
    if body.is_empty() {
        return Ok(Value::Array(Vec::new()));
    }

    match field.field_type {
        FieldType::Integer => {
            let width = body[0] as usize;
            if width != 4 && width != 8 {
                return Err(SprotoError::MalformedPayload {
                    offset: 0,
                    reason: format!("integer array width byte must be 4 or 8, got {width}"),
                });
            }
            let elems = &body[1..];
            if elems.len() % width != 0 {
                return Err(SprotoError::MalformedPayload {
                    offset: 1,
                    reason: format!("integer array body length {} is not a multiple of width {width}", elems.len()),
                });
            }
            let mut out = Vec::with_capacity(elems.len() / width);
            for chunk in elems.chunks_exact(width) {
                let raw = if width == 4 {
                    i32::from_le_bytes(chunk.try_into().unwrap()) as i64
                } else {
                    i64::from_le_bytes(chunk.try_into().unwrap())
                };
                out.push(if field.extra > 0 {
                    Value::Double(raw as f64 / field.decimal_scale() as f64)
                } else {
                    Value::Integer(raw)
                });
            }
            Ok(Value::Array(out))
        }
        FieldType::Boolean => {
            let mut out = Vec::with_capacity(body.len());
            for &b in body {
                if b > 1 {
                    return Err(SprotoError::MalformedPayload {
                        offset: 0,
                        reason: format!("boolean array element must be 0 or 1, got {b}"),
                    });
                }
                out.push(Value::Boolean(b == 1));
            }
            Ok(Value::Array(out))
        }
        FieldType::Double => {
            if body.len() % 8 != 0 {
                return Err(SprotoError::MalformedPayload {
                    offset: 0,
                    reason: format!("double array body length {} is not a multiple of 8", body.len()),
                });
            }
            let out = body
                .chunks_exact(8)
                .map(|c| Value::Double(f64::from_le_bytes(c.try_into().unwrap())))
                .collect();
            Ok(Value::Array(out))
        }
        FieldType::String => {
            let mut reader = Reader::new(body);
            let mut out = Vec::new();
            while !reader.is_empty() {
                let bytes = reader.read_len_prefixed()?;
                out.push(if field.is_binary_string() {
                    Value::Binary(bytes.to_vec())
                } else {
                    let s = std::str::from_utf8(bytes).map_err(|e| SprotoError::MalformedPayload {
                        offset: reader.position(),
                        reason: format!("array element of field '{}' is not valid UTF-8: {e}", field.name),
                    })?;
                    Value::String(s.to_string())
                });
            }
            Ok(Value::Array(out))
        }
        FieldType::Struct => {
            let subtype_idx = field
                .subtype_ref
                .expect("struct field always carries a subtype_ref (invariant enforced at parse time)");
            let subtype = &catalogue.types[subtype_idx];
            let mut reader = Reader::new(body);
            let mut out = Vec::new();
            while !reader.is_empty() {
                let bytes = reader.read_len_prefixed()?;
                let (value, _) = decode_depth(catalogue, subtype, bytes, depth + 1)?;
                out.push(value);
            }
            Ok(Value::Array(out))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{Catalogue, Type};
    use crate::field::FieldDescriptor;

    fn int_field(tag: i32, name: &str) -> FieldDescriptor {
        FieldDescriptor {
            tag,
            name: name.to_string(),
            field_type: FieldType::Integer,
            subtype_ref: None,
            key: None,
            extra: 0,
            is_array: false,
        }
    }

    fn single_type_catalogue(ty: Type) -> Catalogue {
        Catalogue::new(vec![ty], vec![])
    }

    fn svalue(pairs: &[(&str, Value)]) -> Value {
        Value::Struct(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn empty_struct_encodes_to_two_zero_bytes() {
        let ty = Type::compile("Empty".into(), vec![]);
        let cat = single_type_catalogue(ty.clone());
        let bytes = encode(&cat, &ty, &svalue(&[])).unwrap();
        assert_eq!(bytes, vec![0x00, 0x00]);
        let (value, consumed) = decode(&cat, &ty, &bytes).unwrap();
        assert_eq!(value, svalue(&[]));
        assert_eq!(consumed, 2);
    }

    #[test]
    fn small_integer_inlines() {
        let ty = Type::compile("P".into(), vec![int_field(0, "x")]);
        let cat = single_type_catalogue(ty.clone());
        let bytes = encode(&cat, &ty, &svalue(&[("x", Value::Integer(5))])).unwrap();
        assert_eq!(bytes, vec![0x01, 0x00, 0x0C, 0x00]);
        let (value, _) = decode(&cat, &ty, &bytes).unwrap();
        assert_eq!(value, svalue(&[("x", Value::Integer(5))]));
    }

    #[test]
    fn negative_integer_goes_through_data_area() {
        let ty = Type::compile("P".into(), vec![int_field(0, "x")]);
        let cat = single_type_catalogue(ty.clone());
        let bytes = encode(&cat, &ty, &svalue(&[("x", Value::Integer(-1))])).unwrap();
        assert_eq!(
            bytes,
            vec![0x01, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        let (value, _) = decode(&cat, &ty, &bytes).unwrap();
        assert_eq!(value, svalue(&[("x", Value::Integer(-1))]));
    }

    #[test]
    fn tag_gap_is_compressed() {
        let ty = Type::compile("P".into(), vec![int_field(0, "a"), int_field(3, "b")]);
        let cat = single_type_catalogue(ty.clone());
        let bytes = encode(
            &cat,
            &ty,
            &svalue(&[("a", Value::Integer(1)), ("b", Value::Integer(2))]),
        )
        .unwrap();
        assert_eq!(
            bytes,
            vec![0x03, 0x00, 0x04, 0x00, 0x03, 0x00, 0x06, 0x00]
        );
        let (value, _) = decode(&cat, &ty, &bytes).unwrap();
        assert_eq!(value, svalue(&[("a", Value::Integer(1)), ("b", Value::Integer(2))]));
    }

    #[test]
    fn string_round_trip() {
        let field = FieldDescriptor {
            tag: 0,
            name: "s".into(),
            field_type: FieldType::String,
            subtype_ref: None,
            key: None,
            extra: 0,
            is_array: false,
        };
        let ty = Type::compile("P".into(), vec![field]);
        let cat = single_type_catalogue(ty.clone());
        let bytes = encode(&cat, &ty, &svalue(&[("s", Value::String("hi".into()))])).unwrap();
        assert_eq!(
            bytes,
            vec![0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, b'h', b'i']
        );
        let (value, _) = decode(&cat, &ty, &bytes).unwrap();
        assert_eq!(value, svalue(&[("s", Value::String("hi".into()))]));
    }

    #[test]
    fn missing_field_is_absent_not_error() {
        let ty = Type::compile("P".into(), vec![int_field(0, "a"), int_field(1, "b")]);
        let cat = single_type_catalogue(ty.clone());
        let bytes = encode(&cat, &ty, &svalue(&[("a", Value::Integer(1))])).unwrap();
        let (value, _) = decode(&cat, &ty, &bytes).unwrap();
        assert_eq!(value, svalue(&[("a", Value::Integer(1))]));
    }

    #[test]
    fn integer_array_promotes_width_and_sign_extends() {
        let field = FieldDescriptor {
            tag: 0,
            name: "xs".into(),
            field_type: FieldType::Integer,
            subtype_ref: None,
            key: None,
            extra: 0,
            is_array: true,
        };
        let ty = Type::compile("P".into(), vec![field]);
        let cat = single_type_catalogue(ty.clone());
        let items = Value::Array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(1i64 << 40)]);
        let bytes = encode(&cat, &ty, &svalue(&[("xs", items.clone())])).unwrap();

        // Width byte (8) must show up right after the len prefix in the data region.
        assert_eq!(bytes[8], 8);

        let (value, _) = decode(&cat, &ty, &bytes).unwrap();
        assert_eq!(value, svalue(&[("xs", items)]));
    }

    #[test]
    fn empty_array_has_no_width_byte() {
        let field = FieldDescriptor {
            tag: 0,
            name: "xs".into(),
            field_type: FieldType::Integer,
            subtype_ref: None,
            key: None,
            extra: 0,
            is_array: true,
        };
        let ty = Type::compile("P".into(), vec![field]);
        let cat = single_type_catalogue(ty.clone());
        let bytes = encode(&cat, &ty, &svalue(&[("xs", Value::Array(vec![]))])).unwrap();
        // header_count(2) + entry(2) + len-prefix(4) == 8, no trailing width byte.
        assert_eq!(bytes.len(), 8);
        let (value, _) = decode(&cat, &ty, &bytes).unwrap();
        assert_eq!(value, svalue(&[("xs", Value::Array(vec![]))]));
    }

    #[test]
    fn nested_struct_round_trips() {
        let inner = Type::compile("Inner".into(), vec![int_field(0, "n")]);
        let outer_field = FieldDescriptor {
            tag: 0,
            name: "inner".into(),
            field_type: FieldType::Struct,
            subtype_ref: Some(0),
            key: None,
            extra: 0,
            is_array: false,
        };
        let outer = Type::compile("Outer".into(), vec![outer_field]);
        let cat = Catalogue::new(vec![inner, outer.clone()], vec![]);

        let value = svalue(&[("inner", svalue(&[("n", Value::Integer(7))]))]);
        let bytes = encode(&cat, &outer, &value).unwrap();
        let (decoded, _) = decode(&cat, &outer, &bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn unknown_field_is_skipped_for_forward_compatibility() {
        // s2 has fields a@0, b@1; s1 only knows about a@0.
        let s2 = Type::compile("P".into(), vec![int_field(0, "a"), int_field(1, "b")]);
        let s1 = Type::compile("P".into(), vec![int_field(0, "a")]);
        let cat2 = single_type_catalogue(s2.clone());
        let cat1 = single_type_catalogue(s1.clone());

        let bytes = encode(
            &cat2,
            &s2,
            &svalue(&[("a", Value::Integer(1)), ("b", Value::String("extra".into()))]),
        )
        .unwrap();

        let (decoded, _) = decode(&cat1, &s1, &bytes).unwrap();
        assert_eq!(decoded, svalue(&[("a", Value::Integer(1))]));
    }

    #[test]
    fn fixed_point_scaling_round_trips() {
        let field = FieldDescriptor {
            tag: 0,
            name: "price".into(),
            field_type: FieldType::Integer,
            subtype_ref: None,
            key: None,
            extra: 2, // scale 10^2
            is_array: false,
        };
        let ty = Type::compile("P".into(), vec![field]);
        let cat = single_type_catalogue(ty.clone());
        let bytes = encode(&cat, &ty, &svalue(&[("price", Value::Double(19.99))])).unwrap();
        let (value, _) = decode(&cat, &ty, &bytes).unwrap();
        assert_eq!(value, svalue(&[("price", Value::Double(19.99))]));
    }

    #[test]
    fn too_deep_recursion_is_rejected() {
        // Build a chain of MAX_DEPTH+1 nested struct types, each wrapping the next.
        let mut types = Vec::new();
        types.push(Type::compile("Leaf".into(), vec![int_field(0, "n")]));
        for i in 1..=MAX_DEPTH {
            let field = FieldDescriptor {
                tag: 0,
                name: "inner".into(),
                field_type: FieldType::Struct,
                subtype_ref: Some((i - 1) as usize),
                key: None,
                extra: 0,
                is_array: false,
            };
            types.push(Type::compile(format!("Wrap{i}"), vec![field]));
        }
        let top_index = types.len() - 1;
        let cat = Catalogue::new(types, vec![]);

        let mut value = svalue(&[("n", Value::Integer(1))]);
        for _ in 0..MAX_DEPTH {
            value = svalue(&[("inner", value)]);
        }

        let result = encode(&cat, &cat.types[top_index], &value);
        assert!(matches!(result, Err(SprotoError::TooDeep { .. })));
    }
}
