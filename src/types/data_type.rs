//! The closed set of scalar data types understood by the compiler

use super::value::Value;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar data types, mirroring the backend's field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Str,
    Long,
    Int,
    Float,
    Double,
    Bool,
    Date,
}

impl DataType {
    /// The backend's name for this type, as it appears in schema mappings.
    pub fn backend_type(&self) -> &'static str {
        match self {
            DataType::Str => "string",
            DataType::Long => "long",
            DataType::Int => "integer",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Bool => "boolean",
            DataType::Date => "date",
        }
    }

    /// Maps a backend type name back to a `DataType`.
    pub fn from_backend_type(name: &str) -> Result<Self> {
        match name {
            "string" => Ok(DataType::Str),
            "long" => Ok(DataType::Long),
            "integer" => Ok(DataType::Int),
            "float" => Ok(DataType::Float),
            "double" => Ok(DataType::Double),
            "boolean" => Ok(DataType::Bool),
            "date" => Ok(DataType::Date),
            other => Err(Error::UnsupportedDataType(other.to_string())),
        }
    }

    /// Infers the data type of a native value. NULL carries no type.
    pub fn of(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Err(Error::UnsupportedDataType("null".into())),
            Value::Bool(_) => Ok(DataType::Bool),
            Value::Int(_) => Ok(DataType::Int),
            Value::Long(_) => Ok(DataType::Long),
            Value::Float(_) => Ok(DataType::Float),
            Value::Double(_) => Ok(DataType::Double),
            Value::Str(_) => Ok(DataType::Str),
            Value::Date(_) => Ok(DataType::Date),
        }
    }

    /// Maximum rendered width, for result set metadata.
    pub fn display_size(&self) -> usize {
        match self {
            DataType::Str => 255,
            DataType::Long => 20,
            DataType::Int => 11,
            DataType::Float => 15,
            DataType::Double => 25,
            DataType::Bool => 5,
            DataType::Date => 24,
        }
    }

    /// Canonical in-memory size hint in bytes.
    pub fn value_size(&self) -> usize {
        match self {
            DataType::Str => 8,
            DataType::Long => 8,
            DataType::Int => 4,
            DataType::Float => 4,
            DataType::Double => 8,
            DataType::Bool => 1,
            DataType::Date => 8,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Long | DataType::Int | DataType::Float | DataType::Double
        )
    }

    /// Parses a textual value into this type. `Date` requires the format
    /// pattern; the other types ignore it.
    pub fn parse(&self, text: &str, pattern: Option<&str>) -> Result<Value> {
        match self {
            DataType::Str => Ok(Value::Str(text.to_string())),
            DataType::Long => text
                .parse::<i64>()
                .map(Value::Long)
                .map_err(|e| Error::InvalidValue(format!("invalid long '{}': {}", text, e))),
            DataType::Int => text
                .parse::<i32>()
                .map(Value::Int)
                .map_err(|e| Error::InvalidValue(format!("invalid integer '{}': {}", text, e))),
            DataType::Float => text
                .parse::<f32>()
                .map(Value::Float)
                .map_err(|e| Error::InvalidValue(format!("invalid float '{}': {}", text, e))),
            DataType::Double => text
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|e| Error::InvalidValue(format!("invalid double '{}': {}", text, e))),
            DataType::Bool => match text.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(Error::InvalidValue(format!("invalid boolean '{}'", text))),
            },
            DataType::Date => {
                let pattern = pattern.ok_or_else(|| {
                    Error::InvalidValue("date parsing requires a format pattern".into())
                })?;
                Value::parse_date(text, pattern)
            }
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Str => write!(f, "STRING"),
            DataType::Long => write!(f, "LONG"),
            DataType::Int => write!(f, "INTEGER"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Bool => write!(f, "BOOLEAN"),
            DataType::Date => write!(f, "DATE"),
        }
    }
}
