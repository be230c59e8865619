//! The recovered-type language.

use std::fmt;

use itertools::Itertools;

/// Shape of a recovered type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    /// An opaque scalar of `n ≥ 1` bytes. Nothing is known about its
    /// interior.
    Int(i64),
    /// `count` contiguous copies of the element type.
    Array(Box<AsiType>, i64),
    /// An ordered concatenation of fields.
    Struct(Vec<AsiType>),
    /// `n` bytes whose structure turned out to be contradictory.
    Impossible(i64),
}

/// A recovered aggregate type annotated with a buffer-overflow diagnostic.
///
/// The flag records that some access used to infer this type spanned past
/// its natural element boundary; it is informational and excluded from
/// equality, which is structural over the shape alone.
#[derive(Debug, Clone, Eq)]
pub struct AsiType {
    kind: TypeKind,
    buffer_overflow: bool,
}

impl AsiType {
    /// An opaque `bytes`-byte scalar.
    pub fn int(bytes: i64) -> Self {
        debug_assert!(bytes >= 1);
        Self {
            kind: TypeKind::Int(bytes),
            buffer_overflow: false,
        }
    }

    /// `count` contiguous copies of `element`. A single copy is just the
    /// element itself.
    pub fn array(element: AsiType, count: i64) -> Self {
        debug_assert!(count >= 1);
        if count == 1 {
            return element;
        }

        Self {
            kind: TypeKind::Array(Box::new(element), count),
            buffer_overflow: false,
        }
    }

    /// A record of the given fields. A single field is just the field.
    pub fn struct_of(fields: Vec<AsiType>) -> Self {
        debug_assert!(!fields.is_empty());
        if fields.len() == 1 {
            let mut fields = fields;
            return fields.remove(0);
        }

        Self {
            kind: TypeKind::Struct(fields),
            buffer_overflow: false,
        }
    }

    /// A tombstone for `bytes` bytes of contradictory structure.
    pub fn impossible(bytes: i64) -> Self {
        debug_assert!(bytes >= 1);
        Self {
            kind: TypeKind::Impossible(bytes),
            buffer_overflow: false,
        }
    }

    pub(crate) fn from_parts(kind: TypeKind, buffer_overflow: bool) -> Self {
        Self {
            kind,
            buffer_overflow,
        }
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn into_kind(self) -> TypeKind {
        self.kind
    }

    /// Total number of bytes the type covers.
    pub fn size(&self) -> i64 {
        match &self.kind {
            TypeKind::Int(bytes) | TypeKind::Impossible(bytes) => *bytes,
            TypeKind::Array(element, count) => element.size() * count,
            TypeKind::Struct(fields) => fields.iter().map(AsiType::size).sum(),
        }
    }

    pub fn buffer_overflow(&self) -> bool {
        self.buffer_overflow
    }

    pub fn set_buffer_overflow(&mut self, flag: bool) {
        self.buffer_overflow = flag;
    }
}

impl PartialEq for AsiType {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for AsiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Int(bytes) => write!(f, "i{}", bytes * 8),
            TypeKind::Array(element, count) => write!(f, "{element}[{count}]"),
            TypeKind::Struct(fields) => {
                write!(f, "{{{}}}", fields.iter().map(AsiType::to_string).join(", "))
            }
            TypeKind::Impossible(bytes) => write!(f, "imp{bytes}"),
        }
    }
}
