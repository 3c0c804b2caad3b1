//! SQL type descriptor translation for the udflare server core.
//!
//! Architecture role:
//! - parses textual type descriptors from the catalog into [`TypeDescriptor`] trees
//! - renders descriptors back to canonical SQL text for advertised signatures
//! - maps descriptors onto arrow fields/schemas used by the batch layer
//!
//! Key modules:
//! - [`descriptor`]
//! - [`parse`]
//! - [`format`]
//! - [`arrow`]

pub mod arrow;
pub mod descriptor;
pub mod format;
pub mod parse;

pub use arrow::{
    build_input_schema, build_output_schema, from_arrow_field, to_arrow_field, to_arrow_type,
    ARROW_EXT_TYPE_VARIANT, EXTENSION_KEY, OUTPUT_FIELD_NAME,
};
pub use descriptor::{
    TypeDescriptor, TypeKind, MAX_DECIMAL128_PRECISION, MAX_DECIMAL256_PRECISION,
};
pub use format::format;
pub use parse::parse;
