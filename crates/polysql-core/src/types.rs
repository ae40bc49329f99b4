// SPDX-License-Identifier: Apache-2.0

//! Universal data types shared by every engine
//!
//! `Value` is the cell/parameter representation exchanged with transports,
//! `DbType` the engine-neutral column classification and `HostType` the
//! Rust-side representation a native type decodes into.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Universal value representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
    Json(serde_json::Value),
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Renders scalar values as text; `None` for NULL and binary data.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null | Value::Bytes(_) => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Json(j) => Some(j.to_string()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interprets catalog-style flags (`YES`/`NO`, `Y`/`N`, bits, booleans).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::Text(s) => match s.trim().to_ascii_uppercase().as_str() {
                "Y" | "YES" | "T" | "TRUE" | "1" => Some(true),
                "N" | "NO" | "F" | "FALSE" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Engine-neutral classification of a column's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DbType {
    AnsiString,
    AnsiStringFixedLength,
    String,
    StringFixedLength,
    Binary,
    Boolean,
    Byte,
    SByte,
    Int16,
    Int32,
    Int64,
    UInt16,
    UInt32,
    UInt64,
    Single,
    Double,
    Decimal,
    Currency,
    VarNumeric,
    Date,
    Time,
    DateTime,
    DateTime2,
    DateTimeOffset,
    Guid,
    Xml,
    Json,
    Object,
}

impl DbType {
    pub fn is_text(self) -> bool {
        matches!(
            self,
            DbType::AnsiString
                | DbType::AnsiStringFixedLength
                | DbType::String
                | DbType::StringFixedLength
                | DbType::Xml
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DbType::Byte
                | DbType::SByte
                | DbType::Int16
                | DbType::Int32
                | DbType::Int64
                | DbType::UInt16
                | DbType::UInt32
                | DbType::UInt64
        )
    }

    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            DbType::Date
                | DbType::Time
                | DbType::DateTime
                | DbType::DateTime2
                | DbType::DateTimeOffset
        )
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Rust-side representation a native column type decodes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Decimal,
    String,
    Bytes,
    Date,
    Time,
    DateTime,
    DateTimeOffset,
    Duration,
    Uuid,
    Json,
    Object,
}

/// Native parameter attached to a transport command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub db_type: DbType,
    pub value: Value,
}

impl Parameter {
    pub fn new(name: impl Into<String>, db_type: DbType, value: Value) -> Self {
        Self {
            name: name.into(),
            db_type,
            value,
        }
    }
}

/// Logical, positional command parameter.
///
/// Native names and placeholders are generated by the dialect from the
/// parameter's position; `None` becomes [`Value::Null`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlParameter {
    pub db_type: DbType,
    pub value: Option<Value>,
}

impl SqlParameter {
    pub fn new(db_type: DbType, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            db_type,
            value: (!value.is_null()).then_some(value),
        }
    }

    pub fn null(db_type: DbType) -> Self {
        Self {
            db_type,
            value: None,
        }
    }

    /// Text parameter typed for catalog lookups.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(DbType::AnsiString, Value::Text(value.into()))
    }

    /// The value a transport should send, with NULL made explicit.
    pub fn native_value(&self) -> Value {
        self.value.clone().unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_flags_parse_as_bool() {
        assert_eq!(Value::from("YES").as_bool(), Some(true));
        assert_eq!(Value::from(" n ").as_bool(), Some(false));
        assert_eq!(Value::Int(0).as_bool(), Some(false));
        assert_eq!(Value::from("maybe").as_bool(), None);
    }

    #[test]
    fn numeric_text_parses_as_i64() {
        assert_eq!(Value::from("42").as_i64(), Some(42));
        assert_eq!(Value::Float(7.0).as_i64(), Some(7));
        assert_eq!(Value::Float(7.5).as_i64(), None);
        assert_eq!(Value::Null.as_i64(), None);
    }

    #[test]
    fn null_parameter_uses_null_sentinel() {
        let param = SqlParameter::new(DbType::Int32, Option::<i64>::None);
        assert!(param.value.is_none());
        assert_eq!(param.native_value(), Value::Null);
        assert_eq!(SqlParameter::text("SCOTT").native_value(), Value::from("SCOTT"));
    }

    #[test]
    fn bytes_serialize_as_base64() {
        let json = serde_json::to_string(&Value::Bytes(vec![1, 2, 3])).expect("serialize");
        assert_eq!(json, "\"AQID\"");
    }
}
