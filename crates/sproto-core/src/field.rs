//! Field descriptor: the per-field shape a [`crate::catalogue::Type`] is built from.

/// Scalar type a field can carry. `Struct` is only reachable via `subtype_ref`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Boolean,
    String,
    Double,
    Struct,
}

impl FieldType {
    pub fn name(self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::String => "string",
            FieldType::Double => "double",
            FieldType::Struct => "struct",
        }
    }
}

/// A single field in a [`crate::catalogue::Type`], per §3 "Field descriptor".
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub tag: i32,
    pub name: String,
    pub field_type: FieldType,
    /// Index into the catalogue's `types` vector; set iff `field_type == Struct`.
    pub subtype_ref: Option<usize>,
    /// Index tag for main-index arrays of structs; `None` if the field has no main index.
    /// Only sequence semantics are implemented for array decode (§9 open question iii);
    /// this is retained for forward compatibility with a future keyed-map extension.
    pub key: Option<i32>,
    /// Decimal scaling power (`10^extra`) for `Integer` fields, or the binary-string
    /// marker for `String` fields (non-zero means opaque bytes, no UTF-8 decode).
    pub extra: i32,
    pub is_array: bool,
}

impl FieldDescriptor {
    /// True when this is a `String` field flagged as opaque binary rather than UTF-8 text.
    pub fn is_binary_string(&self) -> bool {
        self.field_type == FieldType::String && self.extra != 0
    }

    /// `10^extra` scaling factor for fixed-point `Integer` fields (1 when `extra == 0`).
    pub fn decimal_scale(&self) -> i64 {
        debug_assert!(self.extra >= 0, "extra must be non-negative for integer scaling");
        10i64.pow(self.extra.max(0) as u32)
    }
}
