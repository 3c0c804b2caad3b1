//! Structural model for SQL type descriptors.

use std::fmt;
use std::str::FromStr;

use udflare_common::UdflareError;

/// Largest precision representable as a 128-bit decimal column.
pub const MAX_DECIMAL128_PRECISION: u8 = 38;
/// Largest precision accepted for a decimal type.
pub const MAX_DECIMAL256_PRECISION: u8 = 76;

/// Physical kind of a type descriptor.
///
/// `Variant` is a flag over the binary physical kind: it shares the binary
/// column layout and is distinguished only by extension metadata on the
/// field, never by a distinct physical type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    /// Days since the unix epoch.
    Date,
    /// Microseconds since the unix epoch, no timezone.
    Timestamp,
    Text,
    Binary,
    /// JSON-like dynamic value stored as raw bytes.
    Variant,
    Decimal {
        precision: u8,
        scale: u8,
    },
    List(Box<TypeDescriptor>),
    Tuple(Vec<TypeDescriptor>),
    Map(Box<TypeDescriptor>, Box<TypeDescriptor>),
}

/// A type descriptor: physical kind plus nullability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub kind: TypeKind,
    pub nullable: bool,
}

impl TypeDescriptor {
    /// A non-nullable descriptor of `kind` (the nested-position default).
    pub fn required(kind: TypeKind) -> Self {
        Self {
            kind,
            nullable: false,
        }
    }

    /// A nullable descriptor of `kind` (the top-level default).
    pub fn nullable(kind: TypeKind) -> Self {
        Self {
            kind,
            nullable: true,
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Validate the decimal bounds invariant for this kind.
    pub fn validate(&self) -> udflare_common::Result<()> {
        match &self.kind {
            TypeKind::Decimal { precision, scale } => {
                if *precision < 1 || *precision > MAX_DECIMAL256_PRECISION {
                    return Err(UdflareError::InvalidDecimalSpec(format!(
                        "precision must be between 1 and {MAX_DECIMAL256_PRECISION}, got {precision}"
                    )));
                }
                if scale > precision {
                    return Err(UdflareError::InvalidDecimalSpec(format!(
                        "scale must be between 0 and precision {precision}, got {scale}"
                    )));
                }
                Ok(())
            }
            TypeKind::List(elem) => elem.validate(),
            TypeKind::Tuple(fields) => fields.iter().try_for_each(TypeDescriptor::validate),
            TypeKind::Map(key, value) => {
                key.validate()?;
                value.validate()
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::format::format(self))
    }
}

impl FromStr for TypeDescriptor {
    type Err = UdflareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parse::parse(s)
    }
}
