//! [`TypeDescriptor`] to arrow [`Field`]/[`Schema`] mapping and schema builders.
//!
//! Variant is not a distinct arrow type: it is `LargeBinary` tagged with the
//! `Extension => Variant` metadata pair on the field, which the catalog uses
//! to tell JSON payloads from plain binary columns.

use std::collections::HashMap;
use std::sync::Arc;

use arrow_schema::{DataType, Field, Fields, Schema, TimeUnit};
use udflare_common::{Result, UdflareError};

use crate::descriptor::{TypeDescriptor, TypeKind, MAX_DECIMAL128_PRECISION};

/// Field metadata key marking extension types.
pub const EXTENSION_KEY: &str = "Extension";
/// Extension marker for variant (JSON) columns.
pub const ARROW_EXT_TYPE_VARIANT: &str = "Variant";

/// Name of the sole output field of every function.
pub const OUTPUT_FIELD_NAME: &str = "output";

/// Build the arrow field for a descriptor.
pub fn to_arrow_field(name: &str, descriptor: &TypeDescriptor) -> Field {
    let field = Field::new(name, to_arrow_type(&descriptor.kind), descriptor.nullable);
    if matches!(descriptor.kind, TypeKind::Variant) {
        field.with_metadata(HashMap::from([(
            EXTENSION_KEY.to_string(),
            ARROW_EXT_TYPE_VARIANT.to_string(),
        )]))
    } else {
        field
    }
}

/// Arrow physical type for a descriptor kind.
pub fn to_arrow_type(kind: &TypeKind) -> DataType {
    match kind {
        TypeKind::Boolean => DataType::Boolean,
        TypeKind::Int8 => DataType::Int8,
        TypeKind::Int16 => DataType::Int16,
        TypeKind::Int32 => DataType::Int32,
        TypeKind::Int64 => DataType::Int64,
        TypeKind::UInt8 => DataType::UInt8,
        TypeKind::UInt16 => DataType::UInt16,
        TypeKind::UInt32 => DataType::UInt32,
        TypeKind::UInt64 => DataType::UInt64,
        TypeKind::Float32 => DataType::Float32,
        TypeKind::Float64 => DataType::Float64,
        TypeKind::Date => DataType::Date32,
        TypeKind::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        TypeKind::Text => DataType::LargeUtf8,
        TypeKind::Binary | TypeKind::Variant => DataType::LargeBinary,
        TypeKind::Decimal { precision, scale } => {
            if *precision < MAX_DECIMAL128_PRECISION {
                DataType::Decimal128(*precision, *scale as i8)
            } else {
                DataType::Decimal256(*precision, *scale as i8)
            }
        }
        TypeKind::List(elem) => DataType::List(Arc::new(to_arrow_field("item", elem))),
        TypeKind::Tuple(fields) => DataType::Struct(Fields::from(
            fields
                .iter()
                .map(|f| to_arrow_field("", f))
                .collect::<Vec<_>>(),
        )),
        TypeKind::Map(key, value) => {
            // Map keys are always physically non-nullable.
            let key_field = to_arrow_field("key", key).with_nullable(false);
            let value_field = to_arrow_field("value", value);
            let entries = Field::new(
                "entries",
                DataType::Struct(Fields::from(vec![key_field, value_field])),
                false,
            );
            DataType::Map(Arc::new(entries), false)
        }
    }
}

/// Recover a descriptor from an arrow field, including the variant flag.
pub fn from_arrow_field(field: &Field) -> Result<TypeDescriptor> {
    let kind = match field.data_type() {
        DataType::Boolean => TypeKind::Boolean,
        DataType::Int8 => TypeKind::Int8,
        DataType::Int16 => TypeKind::Int16,
        DataType::Int32 => TypeKind::Int32,
        DataType::Int64 => TypeKind::Int64,
        DataType::UInt8 => TypeKind::UInt8,
        DataType::UInt16 => TypeKind::UInt16,
        DataType::UInt32 => TypeKind::UInt32,
        DataType::UInt64 => TypeKind::UInt64,
        DataType::Float32 => TypeKind::Float32,
        DataType::Float64 => TypeKind::Float64,
        DataType::Date32 => TypeKind::Date,
        DataType::Timestamp(_, _) => TypeKind::Timestamp,
        DataType::Utf8 | DataType::LargeUtf8 => TypeKind::Text,
        DataType::Binary | DataType::LargeBinary => {
            if field_is_variant(field) {
                TypeKind::Variant
            } else {
                TypeKind::Binary
            }
        }
        DataType::Decimal128(precision, scale) | DataType::Decimal256(precision, scale) => {
            if *scale < 0 {
                return Err(UdflareError::UnsupportedType(format!(
                    "negative decimal scale: {}",
                    field.data_type()
                )));
            }
            TypeKind::Decimal {
                precision: *precision,
                scale: *scale as u8,
            }
        }
        DataType::List(elem) | DataType::LargeList(elem) => {
            TypeKind::List(Box::new(from_arrow_field(elem)?))
        }
        DataType::Struct(fields) => TypeKind::Tuple(
            fields
                .iter()
                .map(|f| from_arrow_field(f))
                .collect::<Result<Vec<_>>>()?,
        ),
        DataType::Map(entries, _) => {
            let DataType::Struct(entry_fields) = entries.data_type() else {
                return Err(UdflareError::UnsupportedType(format!(
                    "map entries must be a struct: {}",
                    field.data_type()
                )));
            };
            if entry_fields.len() != 2 {
                return Err(UdflareError::UnsupportedType(format!(
                    "map entries must carry exactly key and value fields: {}",
                    field.data_type()
                )));
            }
            TypeKind::Map(
                Box::new(from_arrow_field(&entry_fields[0])?),
                Box::new(from_arrow_field(&entry_fields[1])?),
            )
        }
        other => {
            return Err(UdflareError::UnsupportedType(other.to_string()));
        }
    };
    let descriptor = TypeDescriptor {
        kind,
        nullable: field.is_nullable(),
    };
    descriptor.validate()?;
    Ok(descriptor)
}

fn field_is_variant(field: &Field) -> bool {
    field
        .metadata()
        .get(EXTENSION_KEY)
        .map(|v| v == ARROW_EXT_TYPE_VARIANT)
        .unwrap_or(false)
}

/// Zip declared argument names with parsed input types, preserving call order.
pub fn build_input_schema(arg_names: &[String], descriptors: &[TypeDescriptor]) -> Result<Schema> {
    if arg_names.len() != descriptors.len() {
        return Err(UdflareError::InvalidConfig(format!(
            "{} argument names declared for {} input types",
            arg_names.len(),
            descriptors.len()
        )));
    }
    let fields = arg_names
        .iter()
        .zip(descriptors)
        .map(|(name, descriptor)| to_arrow_field(name, descriptor))
        .collect::<Vec<_>>();
    Ok(Schema::new(fields))
}

/// Single-field output schema; the field is always named `output`.
pub fn build_output_schema(descriptor: &TypeDescriptor) -> Schema {
    Schema::new(vec![to_arrow_field(OUTPUT_FIELD_NAME, descriptor)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    #[test]
    fn variant_maps_to_tagged_large_binary() {
        let descriptor = parse("VARIANT").expect("variant");
        let field = to_arrow_field("v", &descriptor);
        assert_eq!(field.data_type(), &DataType::LargeBinary);
        assert_eq!(
            field.metadata().get(EXTENSION_KEY).map(String::as_str),
            Some(ARROW_EXT_TYPE_VARIANT)
        );

        let recovered = from_arrow_field(&field).expect("roundtrip");
        assert_eq!(recovered.kind, TypeKind::Variant);
    }

    #[test]
    fn decimal_precision_splits_physical_width_at_38() {
        let narrow = parse("DECIMAL(37, 2)").expect("narrow");
        assert_eq!(to_arrow_type(&narrow.kind), DataType::Decimal128(37, 2));
        let wide = parse("DECIMAL(38, 2)").expect("wide");
        assert_eq!(to_arrow_type(&wide.kind), DataType::Decimal256(38, 2));
    }

    #[test]
    fn nested_types_roundtrip_through_arrow_fields() {
        for input in [
            "ARRAY(INT NULL)",
            "MAP(VARCHAR, ARRAY(BIGINT))",
            "TUPLE(INT, VARIANT NULL, DATE) NOT NULL",
        ] {
            let descriptor = parse(input).expect(input);
            let field = to_arrow_field("x", &descriptor);
            let recovered = from_arrow_field(&field).expect(input);
            assert_eq!(recovered, descriptor, "{input}");
        }
    }

    #[test]
    fn input_schema_zips_names_with_types() {
        let names = vec!["x".to_string(), "y".to_string()];
        let descriptors = vec![
            parse("INT").expect("int"),
            parse("VARCHAR NOT NULL").expect("varchar"),
        ];
        let schema = build_input_schema(&names, &descriptors).expect("schema");
        assert_eq!(schema.field(0).name(), "x");
        assert_eq!(schema.field(1).name(), "y");
        assert!(!schema.field(1).is_nullable());

        let err = build_input_schema(&names[..1].to_vec(), &descriptors);
        assert!(matches!(err, Err(UdflareError::InvalidConfig(_))));
    }

    #[test]
    fn output_schema_has_single_output_field() {
        let schema = build_output_schema(&parse("DOUBLE").expect("double"));
        assert_eq!(schema.fields().len(), 1);
        assert_eq!(schema.field(0).name(), OUTPUT_FIELD_NAME);
    }
}
