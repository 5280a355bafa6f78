//! In-memory catalogue of types and protocols parsed from a bundle (C3).
//!
//! Built once by [`crate::bundle::parse`] and read-only thereafter: every
//! lookup table here is populated eagerly at construction time rather than
//! lazily, so the catalogue needs no interior mutability and is `Send + Sync`
//! for free (see DESIGN.md, "eager vs. lazy lookup caches").

use std::collections::HashMap;

use crate::field::FieldDescriptor;

/// A compiled record type: fields sorted ascending by tag.
#[derive(Debug, Clone)]
pub struct Type {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    /// `Some(first_tag)` when the tag sequence is dense (every integer from
    /// `fields[0].tag` to `fields[n-1].tag` present), enabling direct indexing.
    pub base: Option<i32>,
    /// Effective field-count reservation including implicit tag gaps; used by
    /// the encoder to size its header-slot scratch buffer.
    pub maxn: usize,
}

impl Type {
    pub fn compile(name: String, mut fields: Vec<FieldDescriptor>) -> Self {
        fields.sort_by_key(|f| f.tag);

        let base = is_dense(&fields).then(|| fields[0].tag);
        let maxn = fields.last().map(|f| (f.tag + 1) as usize).unwrap_or(0);

        Type {
            name,
            fields,
            base,
            maxn,
        }
    }

    /// Looks up a field by tag: direct index when `base` is set, else binary search.
    pub fn field_by_tag(&self, tag: i32) -> Option<&FieldDescriptor> {
        if let Some(base) = self.base {
            let idx = tag - base;
            if idx < 0 {
                return None;
            }
            return self.fields.get(idx as usize).filter(|f| f.tag == tag);
        }

        self.fields
            .binary_search_by_key(&tag, |f| f.tag)
            .ok()
            .map(|i| &self.fields[i])
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

fn is_dense(fields: &[FieldDescriptor]) -> bool {
    match fields.split_first() {
        None => false,
        Some((first, rest)) => rest
            .iter()
            .enumerate()
            .all(|(i, f)| f.tag == first.tag + 1 + i as i32),
    }
}

/// A resolvable RPC protocol entry: request/response reference types by index.
#[derive(Debug, Clone)]
pub struct Protocol {
    pub name: String,
    pub tag: i32,
    /// Index into `Catalogue::types`.
    pub request: Option<usize>,
    /// Index into `Catalogue::types`.
    pub response: Option<usize>,
    pub confirm: i32,
}

impl Protocol {
    /// A protocol is "responded" iff it has a declared response type or a confirm flag.
    pub fn is_responded(&self) -> bool {
        self.response.is_some() || self.confirm != 0
    }
}

/// Reference used to look up a type: by bundle index or by name.
#[derive(Debug, Clone, Copy)]
pub enum TypeRef<'a> {
    Id(usize),
    Name(&'a str),
}

/// The parsed, read-only form of a schema bundle.
pub struct Catalogue {
    pub types: Vec<Type>,
    /// Sorted ascending by tag.
    pub protocols: Vec<Protocol>,
    type_name_cache: HashMap<String, usize>,
    protocol_name_cache: HashMap<String, usize>,
}

impl Catalogue {
    pub(crate) fn new(types: Vec<Type>, mut protocols: Vec<Protocol>) -> Self {
        protocols.sort_by_key(|p| p.tag);

        let type_name_cache = types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        let protocol_name_cache = protocols
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();

        log::debug!(
            "catalogue built: {} types, {} protocols",
            types.len(),
            protocols.len()
        );

        Catalogue {
            types,
            protocols,
            type_name_cache,
            protocol_name_cache,
        }
    }

    pub fn get_type(&self, reference: TypeRef<'_>) -> Option<&Type> {
        match reference {
            TypeRef::Id(id) => self.types.get(id),
            TypeRef::Name(name) => self
                .type_name_cache
                .get(name)
                .and_then(|&i| self.types.get(i)),
        }
    }

    pub fn get_type_by_name(&self, name: &str) -> Option<&Type> {
        self.get_type(TypeRef::Name(name))
    }

    pub fn get_protocol_by_name(&self, name: &str) -> Option<&Protocol> {
        self.protocol_name_cache
            .get(name)
            .and_then(|&i| self.protocols.get(i))
    }

    /// Binary search over the sorted `protocols` vector.
    pub fn get_protocol_by_tag(&self, tag: i32) -> Option<&Protocol> {
        self.protocols
            .binary_search_by_key(&tag, |p| p.tag)
            .ok()
            .map(|i| &self.protocols[i])
    }

    pub fn request_type(&self, protocol: &Protocol) -> Option<&Type> {
        protocol.request.and_then(|i| self.types.get(i))
    }

    pub fn response_type(&self, protocol: &Protocol) -> Option<&Type> {
        protocol.response.and_then(|i| self.types.get(i))
    }
}
