use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::reflection::RecordType;

pub mod handler;

pub use handler::{TypeHandler, TypeHandlerRegistry};

/// Values that can be stored in a database row or bound as statement parameters.
///
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// The value type this runtime value belongs to.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            RowValues::Int(_) => ValueType::Int,
            RowValues::Float(_) => ValueType::Float,
            RowValues::Text(_) => ValueType::Text,
            RowValues::Bool(_) => ValueType::Bool,
            RowValues::Timestamp(_) => ValueType::Timestamp,
            RowValues::Null => ValueType::Object,
            RowValues::JSON(_) => ValueType::Json,
            RowValues::Blob(_) => ValueType::Blob,
        }
    }
}

/// Text rendering used when a value is substituted into SQL text with `${}`.
impl fmt::Display for RowValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowValues::Int(i) => write!(f, "{i}"),
            RowValues::Float(v) => write!(f, "{v}"),
            RowValues::Text(s) => f.write_str(s),
            RowValues::Bool(b) => write!(f, "{b}"),
            RowValues::Timestamp(dt) => write!(f, "{}", dt.format("%F %T%.f")),
            RowValues::Null => f.write_str("null"),
            RowValues::JSON(json) => write!(f, "{json}"),
            RowValues::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// The declared type of a parameter value, resolved when a placeholder is compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Int,
    Float,
    Text,
    Bool,
    Timestamp,
    Json,
    Blob,
    /// Result type of a `CURSOR` out parameter.
    Cursor,
    /// Generic key-value bag.
    Map,
    List,
    /// Generic object: nothing more specific is known.
    Object,
    Record(Arc<RecordType>),
}

impl ValueType {
    /// Resolve a value type from its alias, as written in a `javaType=` option.
    #[must_use]
    pub fn from_alias(alias: &str) -> Option<ValueType> {
        let resolved = match alias.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" | "long" | "short" | "byte" | "i32" | "i64" => ValueType::Int,
            "double" | "float" | "decimal" | "bigdecimal" | "f64" => ValueType::Float,
            "string" | "text" | "str" => ValueType::Text,
            "boolean" | "bool" => ValueType::Bool,
            "timestamp" | "date" | "datetime" => ValueType::Timestamp,
            "json" => ValueType::Json,
            "bytes" | "blob" | "byte[]" => ValueType::Blob,
            "resultset" | "cursor" => ValueType::Cursor,
            "map" | "hashmap" => ValueType::Map,
            "list" | "arraylist" | "collection" => ValueType::List,
            "object" => ValueType::Object,
            _ => return None,
        };
        Some(resolved)
    }

    /// Scalar types always have a built-in type handler.
    #[must_use]
    pub fn is_simple(&self) -> bool {
        matches!(
            self,
            ValueType::Int
                | ValueType::Float
                | ValueType::Text
                | ValueType::Bool
                | ValueType::Timestamp
                | ValueType::Json
                | ValueType::Blob
        )
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ValueType::Int => "int",
            ValueType::Float => "double",
            ValueType::Text => "string",
            ValueType::Bool => "boolean",
            ValueType::Timestamp => "timestamp",
            ValueType::Json => "json",
            ValueType::Blob => "bytes",
            ValueType::Cursor => "resultset",
            ValueType::Map => "map",
            ValueType::List => "list",
            ValueType::Object => "object",
            ValueType::Record(ty) => ty.name(),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Driver-level column/parameter types (`jdbcType=` option).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DriverType {
    Array,
    Bigint,
    Binary,
    Bit,
    Blob,
    Boolean,
    Char,
    Clob,
    Cursor,
    Date,
    Decimal,
    Double,
    Float,
    Integer,
    Json,
    Longvarchar,
    Null,
    Numeric,
    Other,
    Real,
    Smallint,
    Time,
    Timestamp,
    Tinyint,
    Undefined,
    Varbinary,
    Varchar,
}

impl fmt::Display for DriverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(&value.get_name().to_ascii_uppercase()),
            None => write!(f, "{self:?}"),
        }
    }
}

/// Direction of a placeholder: plain input, or an output of a stored-procedure call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParameterMode {
    #[default]
    In,
    Out,
    #[value(name = "inout")]
    InOut,
}

impl ParameterMode {
    #[must_use]
    pub fn is_output(self) -> bool {
        !matches!(self, ParameterMode::In)
    }
}
