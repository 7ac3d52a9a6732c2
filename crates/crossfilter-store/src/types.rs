#![forbid(unsafe_code)]

use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use std::fmt;
use std::sync::Arc;

pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Largest magnitude an integer field accepts: every integer up to 2^53 has an exact `f64`.
pub const MAX_EXACT_INTEGER: u64 = 1 << 53;

/// The declared type of a schema field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    /// Any finite decimal number.
    Number,
    /// A whole number within ±[`MAX_EXACT_INTEGER`]. Stored as [`Value::Number`].
    Integer,
    Text,
    /// A calendar date parsed with a `chrono` format string.
    Date { format: Arc<str> },
}

impl FieldType {
    pub fn iso_date() -> Self {
        FieldType::Date {
            format: Arc::from(ISO_DATE_FORMAT),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Text => "text",
            FieldType::Date { .. } => "date",
        }
    }

    pub(crate) fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (FieldType::Number | FieldType::Integer, Value::Number(_))
                | (FieldType::Text, Value::Text(_))
                | (FieldType::Date { .. }, Value::Date(_))
        )
    }
}

/// A single typed cell of a record.
///
/// Values are totally ordered (`Null < Number < Text < Date`, numbers by `OrderedFloat`) so they
/// can be used directly as dimension keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Value {
    #[default]
    Null,
    Number(OrderedFloat<f64>),
    Text(Arc<str>),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(n.0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Number(n) => {
                let n = n.0;
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format(ISO_DATE_FORMAT)),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(OrderedFloat(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(OrderedFloat(value as f64))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(OrderedFloat(value as f64))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(Arc::from(value))
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}
