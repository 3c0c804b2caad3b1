//! Dynamic native values exchanged with user functions.

use arrow::datatypes::i256;
use serde_json::Value as JsonValue;

/// One native value, the per-row currency between compiled codecs and user
/// functions. Nested kinds own their children; `Map` keeps insertion order
/// as a pair sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    /// Days since the unix epoch.
    Date(i32),
    /// Microseconds since the unix epoch.
    Timestamp(i64),
    Text(String),
    Binary(Vec<u8>),
    Decimal128(i128),
    Decimal256(i256),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Map(Vec<(Value, Value)>),
    /// Parsed JSON payload of a variant column.
    Variant(JsonValue),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Human-readable kind label used in marshalling errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Boolean(_) => "BOOLEAN",
            Value::Int8(_) => "TINYINT",
            Value::Int16(_) => "SMALLINT",
            Value::Int32(_) => "INT",
            Value::Int64(_) => "BIGINT",
            Value::UInt8(_) => "TINYINT UNSIGNED",
            Value::UInt16(_) => "SMALLINT UNSIGNED",
            Value::UInt32(_) => "INT UNSIGNED",
            Value::UInt64(_) => "BIGINT UNSIGNED",
            Value::Float32(_) => "FLOAT",
            Value::Float64(_) => "DOUBLE",
            Value::Date(_) => "DATE",
            Value::Timestamp(_) => "TIMESTAMP",
            Value::Text(_) => "VARCHAR",
            Value::Binary(_) => "BINARY",
            Value::Decimal128(_) | Value::Decimal256(_) => "DECIMAL",
            Value::List(_) => "ARRAY",
            Value::Tuple(_) => "TUPLE",
            Value::Map(_) => "MAP",
            Value::Variant(_) => "VARIANT",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
