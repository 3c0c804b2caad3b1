//! Compile-once value codecs.
//!
//! [`compile_decoder`] / [`compile_encoder`] walk a [`TypeDescriptor`] once,
//! at registration, and return closure trees bound to that shape. The row
//! hot path then moves values without re-deriving types: nested columns are
//! decoded wholesale and sliced by offsets rather than inspected per value.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Decimal128Array, Decimal256Array, Float32Array,
    Float64Array, Int16Array, Int32Array, Int64Array, Int8Array, LargeBinaryArray,
    LargeStringArray, ListArray, MapArray, StructArray, TimestampMicrosecondArray, UInt16Array,
    UInt32Array, UInt64Array, UInt8Array,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::{DataType, Field, FieldRef, Fields};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};
use udflare_common::{Result, UdflareError};
use udflare_types::{to_arrow_field, TypeDescriptor, TypeKind, MAX_DECIMAL128_PRECISION};

use crate::value::Value;

/// Columnar-to-native decode function compiled from one descriptor.
pub type ColumnDecodeFn = Arc<dyn Fn(&ArrayRef) -> Result<Vec<Value>> + Send + Sync>;
/// Native-to-columnar encode function compiled from one descriptor.
pub type ColumnEncodeFn = Arc<dyn Fn(Vec<Value>) -> Result<ArrayRef> + Send + Sync>;

macro_rules! primitive_decoder {
    ($array_ty:ty, $variant:ident, $sql:literal) => {
        Arc::new(|array: &ArrayRef| {
            let a = downcast::<$array_ty>(array, $sql)?;
            Ok((0..a.len())
                .map(|i| {
                    if a.is_null(i) {
                        Value::Null
                    } else {
                        Value::$variant(a.value(i))
                    }
                })
                .collect())
        })
    };
}

macro_rules! primitive_encoder {
    ($array_ty:ty, $variant:ident, $sql:literal) => {
        Arc::new(|values: Vec<Value>| {
            let options = values
                .into_iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::$variant(x) => Ok(Some(x)),
                    other => Err(kind_mismatch($sql, &other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Arc::new(<$array_ty>::from(options)) as ArrayRef)
        })
    };
}

/// Compile the decode side of a codec for `descriptor`.
pub fn compile_decoder(descriptor: &TypeDescriptor) -> Result<ColumnDecodeFn> {
    Ok(match &descriptor.kind {
        TypeKind::Boolean => primitive_decoder!(BooleanArray, Boolean, "BOOLEAN"),
        TypeKind::Int8 => primitive_decoder!(Int8Array, Int8, "TINYINT"),
        TypeKind::Int16 => primitive_decoder!(Int16Array, Int16, "SMALLINT"),
        TypeKind::Int32 => primitive_decoder!(Int32Array, Int32, "INT"),
        TypeKind::Int64 => primitive_decoder!(Int64Array, Int64, "BIGINT"),
        TypeKind::UInt8 => primitive_decoder!(UInt8Array, UInt8, "TINYINT UNSIGNED"),
        TypeKind::UInt16 => primitive_decoder!(UInt16Array, UInt16, "SMALLINT UNSIGNED"),
        TypeKind::UInt32 => primitive_decoder!(UInt32Array, UInt32, "INT UNSIGNED"),
        TypeKind::UInt64 => primitive_decoder!(UInt64Array, UInt64, "BIGINT UNSIGNED"),
        TypeKind::Float32 => primitive_decoder!(Float32Array, Float32, "FLOAT"),
        TypeKind::Float64 => primitive_decoder!(Float64Array, Float64, "DOUBLE"),
        TypeKind::Date => primitive_decoder!(Date32Array, Date, "DATE"),
        TypeKind::Timestamp => {
            primitive_decoder!(TimestampMicrosecondArray, Timestamp, "TIMESTAMP")
        }
        TypeKind::Decimal { precision, .. } => {
            if *precision < MAX_DECIMAL128_PRECISION {
                primitive_decoder!(Decimal128Array, Decimal128, "DECIMAL")
            } else {
                primitive_decoder!(Decimal256Array, Decimal256, "DECIMAL")
            }
        }
        TypeKind::Text => Arc::new(|array: &ArrayRef| {
            let a = downcast::<LargeStringArray>(array, "VARCHAR")?;
            Ok((0..a.len())
                .map(|i| {
                    if a.is_null(i) {
                        Value::Null
                    } else {
                        Value::Text(a.value(i).to_string())
                    }
                })
                .collect())
        }),
        TypeKind::Binary => Arc::new(|array: &ArrayRef| {
            let a = downcast::<LargeBinaryArray>(array, "BINARY")?;
            Ok((0..a.len())
                .map(|i| {
                    if a.is_null(i) {
                        Value::Null
                    } else {
                        Value::Binary(a.value(i).to_vec())
                    }
                })
                .collect())
        }),
        TypeKind::Variant => Arc::new(|array: &ArrayRef| {
            let a = downcast::<LargeBinaryArray>(array, "VARIANT")?;
            (0..a.len())
                .map(|i| {
                    if a.is_null(i) {
                        Ok(Value::Null)
                    } else {
                        serde_json::from_slice::<JsonValue>(a.value(i))
                            .map(Value::Variant)
                            .map_err(|e| {
                                UdflareError::Serialization(format!(
                                    "malformed variant payload at row {i}: {e}"
                                ))
                            })
                    }
                })
                .collect()
        }),
        TypeKind::List(elem) => {
            let child = compile_decoder(elem)?;
            Arc::new(move |array: &ArrayRef| {
                let a = downcast::<ListArray>(array, "ARRAY")?;
                let child_values = child(a.values())?;
                let offsets = a.value_offsets();
                Ok((0..a.len())
                    .map(|i| {
                        if a.is_null(i) {
                            Value::Null
                        } else {
                            let start = offsets[i] as usize;
                            let end = offsets[i + 1] as usize;
                            Value::List(child_values[start..end].to_vec())
                        }
                    })
                    .collect())
            })
        }
        TypeKind::Tuple(field_descriptors) => {
            let children = field_descriptors
                .iter()
                .map(compile_decoder)
                .collect::<Result<Vec<_>>>()?;
            Arc::new(move |array: &ArrayRef| {
                let a = downcast::<StructArray>(array, "TUPLE")?;
                if a.num_columns() != children.len() {
                    return Err(UdflareError::Serialization(format!(
                        "expected TUPLE column with {} fields, got {}",
                        children.len(),
                        a.num_columns()
                    )));
                }
                let columns = children
                    .iter()
                    .zip(a.columns())
                    .map(|(decode, column)| decode(column))
                    .collect::<Result<Vec<_>>>()?;
                Ok((0..a.len())
                    .map(|i| {
                        if a.is_null(i) {
                            Value::Null
                        } else {
                            Value::Tuple(columns.iter().map(|c| c[i].clone()).collect())
                        }
                    })
                    .collect())
            })
        }
        TypeKind::Map(key, value) => {
            let decode_key = compile_decoder(key)?;
            let decode_value = compile_decoder(value)?;
            Arc::new(move |array: &ArrayRef| {
                let a = downcast::<MapArray>(array, "MAP")?;
                let keys = decode_key(a.keys())?;
                let values = decode_value(a.values())?;
                let offsets = a.value_offsets();
                Ok((0..a.len())
                    .map(|i| {
                        if a.is_null(i) {
                            Value::Null
                        } else {
                            let start = offsets[i] as usize;
                            let end = offsets[i + 1] as usize;
                            Value::Map(
                                keys[start..end]
                                    .iter()
                                    .cloned()
                                    .zip(values[start..end].iter().cloned())
                                    .collect(),
                            )
                        }
                    })
                    .collect())
            })
        }
    })
}

/// Compile the encode side of a codec for `descriptor`.
pub fn compile_encoder(descriptor: &TypeDescriptor) -> Result<ColumnEncodeFn> {
    Ok(match &descriptor.kind {
        TypeKind::Boolean => primitive_encoder!(BooleanArray, Boolean, "BOOLEAN"),
        TypeKind::Int8 => primitive_encoder!(Int8Array, Int8, "TINYINT"),
        TypeKind::Int16 => primitive_encoder!(Int16Array, Int16, "SMALLINT"),
        TypeKind::Int32 => primitive_encoder!(Int32Array, Int32, "INT"),
        TypeKind::Int64 => primitive_encoder!(Int64Array, Int64, "BIGINT"),
        TypeKind::UInt8 => primitive_encoder!(UInt8Array, UInt8, "TINYINT UNSIGNED"),
        TypeKind::UInt16 => primitive_encoder!(UInt16Array, UInt16, "SMALLINT UNSIGNED"),
        TypeKind::UInt32 => primitive_encoder!(UInt32Array, UInt32, "INT UNSIGNED"),
        TypeKind::UInt64 => primitive_encoder!(UInt64Array, UInt64, "BIGINT UNSIGNED"),
        TypeKind::Float32 => primitive_encoder!(Float32Array, Float32, "FLOAT"),
        TypeKind::Float64 => primitive_encoder!(Float64Array, Float64, "DOUBLE"),
        TypeKind::Date => primitive_encoder!(Date32Array, Date, "DATE"),
        TypeKind::Timestamp => {
            primitive_encoder!(TimestampMicrosecondArray, Timestamp, "TIMESTAMP")
        }
        TypeKind::Decimal { precision, scale } => {
            let precision = *precision;
            let scale = *scale as i8;
            if precision < MAX_DECIMAL128_PRECISION {
                Arc::new(move |values: Vec<Value>| {
                    let options = values
                        .into_iter()
                        .map(|v| match v {
                            Value::Null => Ok(None),
                            Value::Decimal128(x) => Ok(Some(x)),
                            other => Err(kind_mismatch("DECIMAL", &other)),
                        })
                        .collect::<Result<Vec<_>>>()?;
                    let array = options
                        .into_iter()
                        .collect::<Decimal128Array>()
                        .with_precision_and_scale(precision, scale)
                        .map_err(|e| {
                            UdflareError::Serialization(format!("decimal column build failed: {e}"))
                        })?;
                    Ok(Arc::new(array) as ArrayRef)
                })
            } else {
                Arc::new(move |values: Vec<Value>| {
                    let options = values
                        .into_iter()
                        .map(|v| match v {
                            Value::Null => Ok(None),
                            Value::Decimal256(x) => Ok(Some(x)),
                            other => Err(kind_mismatch("DECIMAL", &other)),
                        })
                        .collect::<Result<Vec<_>>>()?;
                    let array = options
                        .into_iter()
                        .collect::<Decimal256Array>()
                        .with_precision_and_scale(precision, scale)
                        .map_err(|e| {
                            UdflareError::Serialization(format!("decimal column build failed: {e}"))
                        })?;
                    Ok(Arc::new(array) as ArrayRef)
                })
            }
        }
        TypeKind::Text => Arc::new(|values: Vec<Value>| {
            let options = values
                .into_iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Text(s) => Ok(Some(s)),
                    other => Err(kind_mismatch("VARCHAR", &other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Arc::new(options.into_iter().collect::<LargeStringArray>()) as ArrayRef)
        }),
        TypeKind::Binary => Arc::new(|values: Vec<Value>| {
            let options = values
                .into_iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Binary(bytes) => Ok(Some(bytes)),
                    // text results are accepted for binary outputs, UTF-8 encoded
                    Value::Text(s) => Ok(Some(s.into_bytes())),
                    other => Err(kind_mismatch("BINARY", &other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Arc::new(options.into_iter().collect::<LargeBinaryArray>()) as ArrayRef)
        }),
        TypeKind::Variant => Arc::new(|values: Vec<Value>| {
            let options = values
                .into_iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    other => {
                        let json = value_to_json(other)?;
                        serde_json::to_vec(&json).map(Some).map_err(|e| {
                            UdflareError::Serialization(format!(
                                "variant payload serialization failed: {e}"
                            ))
                        })
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Arc::new(options.into_iter().collect::<LargeBinaryArray>()) as ArrayRef)
        }),
        TypeKind::List(elem) => {
            let child = compile_encoder(elem)?;
            let child_field: FieldRef = Arc::new(to_arrow_field("item", elem));
            Arc::new(move |values: Vec<Value>| {
                let mut offsets = Vec::with_capacity(values.len() + 1);
                let mut validity = Vec::with_capacity(values.len());
                let mut flat = Vec::new();
                let mut end = 0i32;
                offsets.push(end);
                for v in values {
                    match v {
                        Value::Null => {
                            validity.push(false);
                            offsets.push(end);
                        }
                        Value::List(items) => {
                            end += items.len() as i32;
                            validity.push(true);
                            flat.extend(items);
                            offsets.push(end);
                        }
                        other => return Err(kind_mismatch("ARRAY", &other)),
                    }
                }
                let child_array = child(flat)?;
                let array = ListArray::try_new(
                    Arc::clone(&child_field),
                    OffsetBuffer::new(offsets.into()),
                    child_array,
                    validity_buffer(validity),
                )
                .map_err(|e| {
                    UdflareError::Serialization(format!("list column build failed: {e}"))
                })?;
                Ok(Arc::new(array) as ArrayRef)
            })
        }
        TypeKind::Tuple(field_descriptors) => {
            let children = field_descriptors
                .iter()
                .map(compile_encoder)
                .collect::<Result<Vec<_>>>()?;
            let fields = Fields::from(
                field_descriptors
                    .iter()
                    .map(|f| to_arrow_field("", f))
                    .collect::<Vec<_>>(),
            );
            let arity = children.len();
            Arc::new(move |values: Vec<Value>| {
                let mut columns: Vec<Vec<Value>> =
                    (0..arity).map(|_| Vec::with_capacity(values.len())).collect();
                let mut validity = Vec::with_capacity(values.len());
                for v in values {
                    match v {
                        Value::Null => {
                            validity.push(false);
                            for column in &mut columns {
                                column.push(Value::Null);
                            }
                        }
                        Value::Tuple(items) => {
                            if items.len() != arity {
                                return Err(UdflareError::Serialization(format!(
                                    "expected TUPLE value with {arity} elements, got {}",
                                    items.len()
                                )));
                            }
                            validity.push(true);
                            for (column, item) in columns.iter_mut().zip(items) {
                                column.push(item);
                            }
                        }
                        other => return Err(kind_mismatch("TUPLE", &other)),
                    }
                }
                let arrays = children
                    .iter()
                    .zip(columns)
                    .map(|(encode, column)| encode(column))
                    .collect::<Result<Vec<_>>>()?;
                let array = StructArray::try_new(fields.clone(), arrays, validity_buffer(validity))
                    .map_err(|e| {
                        UdflareError::Serialization(format!("tuple column build failed: {e}"))
                    })?;
                Ok(Arc::new(array) as ArrayRef)
            })
        }
        TypeKind::Map(key_descriptor, value_descriptor) => {
            let encode_key = compile_encoder(key_descriptor)?;
            let encode_value = compile_encoder(value_descriptor)?;
            let entry_fields = Fields::from(vec![
                to_arrow_field("key", key_descriptor).with_nullable(false),
                to_arrow_field("value", value_descriptor),
            ]);
            let entries_field: FieldRef = Arc::new(Field::new(
                "entries",
                DataType::Struct(entry_fields.clone()),
                false,
            ));
            Arc::new(move |values: Vec<Value>| {
                let mut offsets = Vec::with_capacity(values.len() + 1);
                let mut validity = Vec::with_capacity(values.len());
                let mut keys = Vec::new();
                let mut vals = Vec::new();
                let mut end = 0i32;
                offsets.push(end);
                for v in values {
                    match v {
                        Value::Null => {
                            validity.push(false);
                            offsets.push(end);
                        }
                        Value::Map(pairs) => {
                            end += pairs.len() as i32;
                            validity.push(true);
                            for (k, val) in pairs {
                                if k.is_null() {
                                    return Err(UdflareError::Serialization(
                                        "map keys must not be null".to_string(),
                                    ));
                                }
                                keys.push(k);
                                vals.push(val);
                            }
                            offsets.push(end);
                        }
                        other => return Err(kind_mismatch("MAP", &other)),
                    }
                }
                let key_array = encode_key(keys)?;
                let value_array = encode_value(vals)?;
                let entries =
                    StructArray::try_new(entry_fields.clone(), vec![key_array, value_array], None)
                        .map_err(|e| {
                            UdflareError::Serialization(format!(
                                "map entries build failed: {e}"
                            ))
                        })?;
                let array = MapArray::try_new(
                    Arc::clone(&entries_field),
                    OffsetBuffer::new(offsets.into()),
                    entries,
                    validity_buffer(validity),
                    false,
                )
                .map_err(|e| {
                    UdflareError::Serialization(format!("map column build failed: {e}"))
                })?;
                Ok(Arc::new(array) as ArrayRef)
            })
        }
    })
}

fn downcast<'a, T: Array + 'static>(array: &'a ArrayRef, expected: &str) -> Result<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        UdflareError::Serialization(format!(
            "expected {expected} column, got {}",
            array.data_type()
        ))
    })
}

fn kind_mismatch(expected: &str, got: &Value) -> UdflareError {
    UdflareError::Serialization(format!(
        "expected {expected} value, got {}",
        got.kind_name()
    ))
}

fn validity_buffer(validity: Vec<bool>) -> Option<NullBuffer> {
    if validity.iter().all(|valid| *valid) {
        None
    } else {
        Some(NullBuffer::from(validity))
    }
}

/// Convert a native value into JSON for a variant output column.
///
/// Raw byte strings anywhere in the structure are decoded as UTF-8 text so
/// the serialized form is valid JSON text.
fn value_to_json(value: Value) -> Result<JsonValue> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(b),
        Value::Int8(v) => JsonValue::from(v),
        Value::Int16(v) => JsonValue::from(v),
        Value::Int32(v) => JsonValue::from(v),
        Value::Int64(v) => JsonValue::from(v),
        Value::UInt8(v) => JsonValue::from(v),
        Value::UInt16(v) => JsonValue::from(v),
        Value::UInt32(v) => JsonValue::from(v),
        Value::UInt64(v) => JsonValue::from(v),
        Value::Float32(v) => float_to_json(v as f64)?,
        Value::Float64(v) => float_to_json(v)?,
        Value::Text(s) => JsonValue::String(s),
        Value::Binary(bytes) => JsonValue::String(utf8_text(bytes)?),
        Value::Variant(json) => json,
        Value::List(items) | Value::Tuple(items) => JsonValue::Array(
            items
                .into_iter()
                .map(value_to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Map(pairs) => {
            let mut object = JsonMap::with_capacity(pairs.len());
            for (key, value) in pairs {
                object.insert(json_object_key(key)?, value_to_json(value)?);
            }
            JsonValue::Object(object)
        }
        other => {
            return Err(UdflareError::Serialization(format!(
                "{} value is not representable as JSON",
                other.kind_name()
            )))
        }
    })
}

fn float_to_json(v: f64) -> Result<JsonValue> {
    JsonNumber::from_f64(v)
        .map(JsonValue::Number)
        .ok_or_else(|| {
            UdflareError::Serialization(
                "non-finite float is not representable as JSON".to_string(),
            )
        })
}

fn json_object_key(key: Value) -> Result<String> {
    Ok(match key {
        Value::Text(s) => s,
        Value::Binary(bytes) => utf8_text(bytes)?,
        Value::Boolean(b) => b.to_string(),
        Value::Int8(v) => v.to_string(),
        Value::Int16(v) => v.to_string(),
        Value::Int32(v) => v.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::UInt8(v) => v.to_string(),
        Value::UInt16(v) => v.to_string(),
        Value::UInt32(v) => v.to_string(),
        Value::UInt64(v) => v.to_string(),
        other => {
            return Err(UdflareError::Serialization(format!(
                "{} value cannot be used as a JSON object key",
                other.kind_name()
            )))
        }
    })
}

fn utf8_text(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| {
        UdflareError::Serialization(format!("binary value is not valid UTF-8 text: {e}"))
    })
}
