//! Runtime values flowing through documents, literals, and result rows

use super::data_type::DataType;
use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A row of values in field order.
pub type Row = Vec<Value>;

/// Formats tried when a date arrives as text without a matching field format.
const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d",
];

/// A scalar runtime value.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Date(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Long(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Int(_) | Value::Long(_) | Value::Float(_) | Value::Double(_)
        )
    }

    /// Widens any integer value to i64.
    pub fn to_long(&self) -> Result<i64> {
        match self {
            Value::Int(v) => Ok(*v as i64),
            Value::Long(v) => Ok(*v),
            _ => Err(Error::TypeMismatch {
                expected: "integer".into(),
                found: self.data_type_name(),
            }),
        }
    }

    /// Widens any numeric value to f64.
    pub fn to_double(&self) -> Result<f64> {
        match self {
            Value::Int(v) => Ok(*v as f64),
            Value::Long(v) => Ok(*v as f64),
            Value::Float(v) => Ok(*v as f64),
            Value::Double(v) => Ok(*v),
            _ => Err(Error::TypeMismatch {
                expected: "numeric".into(),
                found: self.data_type_name(),
            }),
        }
    }

    /// Converts to a boolean. Strings parse as "true"/"false",
    /// case-insensitively.
    pub fn to_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Str(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(Error::InvalidValue(format!("invalid boolean '{}'", s))),
            },
            _ => Err(Error::TypeMismatch {
                expected: "boolean".into(),
                found: self.data_type_name(),
            }),
        }
    }

    /// Converts to a date. Longs are taken as epoch milliseconds; strings are
    /// parsed with the primary pattern first, then the fallback patterns.
    pub fn to_date(&self, primary: Option<&str>) -> Result<NaiveDateTime> {
        match self {
            Value::Date(d) => Ok(*d),
            Value::Long(millis) => chrono::DateTime::from_timestamp_millis(*millis)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| Error::InvalidValue(format!("invalid epoch millis {}", millis))),
            Value::Str(s) => {
                if let Some(pattern) = primary
                    && let Ok(Value::Date(d)) = Value::parse_date(s, pattern)
                {
                    return Ok(d);
                }
                for pattern in FALLBACK_DATE_FORMATS {
                    if let Ok(Value::Date(d)) = Value::parse_date(s, pattern) {
                        return Ok(d);
                    }
                }
                Err(Error::InvalidValue(format!("invalid date '{}'", s)))
            }
            _ => Err(Error::TypeMismatch {
                expected: "date".into(),
                found: self.data_type_name(),
            }),
        }
    }

    /// Parses a date from text with the given chrono pattern, accepting both
    /// date-time and date-only patterns.
    pub fn parse_date(text: &str, pattern: &str) -> Result<Value> {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, pattern) {
            return Ok(Value::Date(dt));
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, pattern)
            && let Some(dt) = date.and_hms_opt(0, 0, 0)
        {
            return Ok(Value::Date(dt));
        }
        Err(Error::InvalidValue(format!(
            "date '{}' does not match pattern '{}'",
            text, pattern
        )))
    }

    /// Coerces this value to the given data type, per the document model:
    /// numeric widening, boolean from string, date from string/epoch-millis.
    /// NULL passes through untouched.
    pub fn coerce_to(&self, target: DataType, date_format: Option<&str>) -> Result<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        match target {
            DataType::Str => match self {
                Value::Str(s) => Ok(Value::Str(s.clone())),
                _ => self.mismatch(target),
            },
            DataType::Int => match self {
                Value::Int(v) => Ok(Value::Int(*v)),
                _ => self.mismatch(target),
            },
            DataType::Long => match self {
                Value::Int(_) | Value::Long(_) => Ok(Value::Long(self.to_long()?)),
                _ => self.mismatch(target),
            },
            DataType::Float => match self {
                Value::Float(v) => Ok(Value::Float(*v)),
                Value::Int(_) | Value::Long(_) => Ok(Value::Float(self.to_long()? as f32)),
                _ => self.mismatch(target),
            },
            DataType::Double => match self {
                Value::Int(_) | Value::Long(_) | Value::Float(_) | Value::Double(_) => {
                    Ok(Value::Double(self.to_double()?))
                }
                _ => self.mismatch(target),
            },
            DataType::Bool => match self {
                Value::Bool(_) | Value::Str(_) => Ok(Value::Bool(self.to_bool()?)),
                _ => self.mismatch(target),
            },
            DataType::Date => Ok(Value::Date(self.to_date(date_format)?)),
        }
    }

    fn mismatch<T>(&self, expected: DataType) -> Result<T> {
        Err(Error::TypeMismatch {
            expected: expected.to_string(),
            found: self.data_type_name(),
        })
    }

    fn data_type_name(&self) -> String {
        match self {
            Value::Null => "NULL".into(),
            other => DataType::of(other)
                .map(|dt| dt.to_string())
                .unwrap_or_else(|_| "NULL".into()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "'{}'", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(v) => write!(f, "Int({})", v),
            Value::Long(v) => write!(f, "Long({})", v),
            Value::Float(v) => write!(f, "Float({})", v),
            Value::Double(v) => write!(f, "Double({})", v),
            Value::Str(s) => write!(f, "Str({})", s),
            Value::Date(d) => write!(f, "Date({})", d),
        }
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Long(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,

            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),

            // Cross-numeric comparison widens to f64; pure integers compare
            // exactly as i64.
            (a, b) if a.is_integer() && b.is_integer() => match (a.to_long(), b.to_long()) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => Ordering::Equal,
            },
            (a, b) if a.is_numeric() && b.is_numeric() => {
                match (a.to_double(), b.to_double()) {
                    (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                }
            }

            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),

            // Different, incomparable kinds: treat as equal for total order.
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widens_integers() {
        assert_eq!(Value::Int(7).to_long().unwrap(), 7);
        assert_eq!(Value::Int(7).to_double().unwrap(), 7.0);
        assert!(Value::Str("7".into()).to_long().is_err());
    }

    #[test]
    fn parses_booleans_from_strings() {
        assert!(Value::Str("TRUE".into()).to_bool().unwrap());
        assert!(!Value::Str("false".into()).to_bool().unwrap());
        assert!(Value::Str("yes".into()).to_bool().is_err());
    }

    #[test]
    fn date_coercion_prefers_primary_pattern_then_falls_back() {
        let v = Value::Str("2024/03/05".into());
        let parsed = v.to_date(Some("%Y/%m/%d")).unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2024-03-05");

        // Primary pattern does not match, fallback does.
        let v = Value::Str("2024-03-05 10:30:00".into());
        assert!(v.to_date(Some("%Y/%m/%d")).is_ok());

        // Epoch millis.
        let v = Value::Long(0);
        assert_eq!(
            v.to_date(None).unwrap().format("%Y-%m-%d").to_string(),
            "1970-01-01"
        );
    }

    #[test]
    fn cross_numeric_ordering() {
        assert!(Value::Int(2) < Value::Long(3));
        assert!(Value::Double(2.5) > Value::Int(2));
        assert!(Value::Null < Value::Int(0));
    }
}
