//! Dynamic values crossing the record and store boundaries.
//!
//! Every field read from a record, every bound parameter and every column
//! returned by a store is a `SqlValue`. Conversions to and from plain Rust
//! types are provided for the field types records are expected to carry.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A single column or parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

/// Value conversion errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    /// Stored value has a different type than the field
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Value has the right type but is outside the field's domain
    #[error("value out of range: {0}")]
    OutOfRange(String),
}

impl From<Infallible> for ValueError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

impl SqlValue {
    /// Type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Int(_) => "int",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::Uuid(_) => "uuid",
            SqlValue::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// A value that callers must not use as a lookup argument:
    /// null, the nil uuid, or blank text.
    pub fn is_blank(&self) -> bool {
        match self {
            SqlValue::Null => true,
            SqlValue::Uuid(id) => id.is_nil(),
            SqlValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Plain text form, without quoting
    pub fn to_plain_string(&self) -> String {
        match self {
            SqlValue::Null => String::new(),
            SqlValue::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Text(s) => s.clone(),
            SqlValue::Uuid(id) => id.to_string(),
            SqlValue::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        }
    }

    /// Quoted literal with quote characters stripped from the payload.
    ///
    /// Only used by the legacy inline rendering; parameter binding is the
    /// default everywhere else.
    pub fn to_inline_literal(&self) -> String {
        match self {
            SqlValue::Null => "null".to_string(),
            other => format!("'{}'", other.to_plain_string().replace('\'', "")),
        }
    }

    /// Lowercased copy for case-insensitive comparison; non-text values are
    /// returned unchanged
    pub fn to_lowercase(&self) -> SqlValue {
        match self {
            SqlValue::Text(s) => SqlValue::Text(s.to_lowercase()),
            other => other.clone(),
        }
    }

    /// Ordering used by the in-memory store. Nulls sort first; values of
    /// unrelated types are compared by their text form.
    pub fn compare(&self, other: &SqlValue) -> Ordering {
        match (self, other) {
            (SqlValue::Null, SqlValue::Null) => Ordering::Equal,
            (SqlValue::Null, _) => Ordering::Less,
            (_, SqlValue::Null) => Ordering::Greater,
            (SqlValue::Int(a), SqlValue::Int(b)) => a.cmp(b),
            (SqlValue::Float(a), SqlValue::Float(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (SqlValue::Int(a), SqlValue::Float(b)) => {
                (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (SqlValue::Float(a), SqlValue::Int(b)) => {
                a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal)
            }
            (SqlValue::Bool(a), SqlValue::Bool(b)) => a.cmp(b),
            (SqlValue::Timestamp(a), SqlValue::Timestamp(b)) => a.cmp(b),
            (SqlValue::Uuid(a), SqlValue::Uuid(b)) => a.cmp(b),
            (a, b) => a.to_plain_string().cmp(&b.to_plain_string()),
        }
    }

    /// Loose equality used when matching stored rows against arguments:
    /// uuids match their text form and ints match equal floats.
    pub fn loosely_equals(&self, other: &SqlValue) -> bool {
        match (self, other) {
            (SqlValue::Null, _) | (_, SqlValue::Null) => false,
            (SqlValue::Uuid(a), SqlValue::Text(b)) | (SqlValue::Text(b), SqlValue::Uuid(a)) => {
                Uuid::parse_str(b).map(|b| *a == b).unwrap_or(false)
            }
            (a, b) if a.type_name() == b.type_name() => a == b,
            (a, b) => a.compare(b) == Ordering::Equal,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "null"),
            other => write!(f, "{}", other.to_plain_string()),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

fn mismatch(expected: &'static str, found: &SqlValue) -> ValueError {
    ValueError::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}

impl TryFrom<SqlValue> for bool {
    type Error = ValueError;

    fn try_from(v: SqlValue) -> Result<Self, Self::Error> {
        match v {
            SqlValue::Bool(b) => Ok(b),
            SqlValue::Int(i) => Ok(i != 0),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl TryFrom<SqlValue> for i64 {
    type Error = ValueError;

    fn try_from(v: SqlValue) -> Result<Self, Self::Error> {
        match v {
            SqlValue::Int(i) => Ok(i),
            other => Err(mismatch("int", &other)),
        }
    }
}

impl TryFrom<SqlValue> for i32 {
    type Error = ValueError;

    fn try_from(v: SqlValue) -> Result<Self, Self::Error> {
        let wide = i64::try_from(v)?;
        i32::try_from(wide).map_err(|_| ValueError::OutOfRange(wide.to_string()))
    }
}

impl TryFrom<SqlValue> for f64 {
    type Error = ValueError;

    fn try_from(v: SqlValue) -> Result<Self, Self::Error> {
        match v {
            SqlValue::Float(f) => Ok(f),
            SqlValue::Int(i) => Ok(i as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl TryFrom<SqlValue> for String {
    type Error = ValueError;

    fn try_from(v: SqlValue) -> Result<Self, Self::Error> {
        match v {
            SqlValue::Text(s) => Ok(s),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl TryFrom<SqlValue> for Uuid {
    type Error = ValueError;

    fn try_from(v: SqlValue) -> Result<Self, Self::Error> {
        match v {
            SqlValue::Uuid(id) => Ok(id),
            SqlValue::Text(s) => Uuid::parse_str(&s).map_err(|e| ValueError::OutOfRange(e.to_string())),
            other => Err(mismatch("uuid", &other)),
        }
    }
}

impl TryFrom<SqlValue> for DateTime<Utc> {
    type Error = ValueError;

    fn try_from(v: SqlValue) -> Result<Self, Self::Error> {
        match v {
            SqlValue::Timestamp(ts) => Ok(ts),
            SqlValue::Text(s) => DateTime::parse_from_rfc3339(&s)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| ValueError::OutOfRange(e.to_string())),
            other => Err(mismatch("timestamp", &other)),
        }
    }
}

// Nullable columns. Implemented per type: a blanket impl over Option<T>
// would overlap with core's reflexive TryFrom for Option<SqlValue>.
macro_rules! nullable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl TryFrom<SqlValue> for Option<$ty> {
                type Error = ValueError;

                fn try_from(v: SqlValue) -> Result<Self, Self::Error> {
                    match v {
                        SqlValue::Null => Ok(None),
                        other => <$ty>::try_from(other).map(Some),
                    }
                }
            }
        )*
    };
}

nullable!(bool, i32, i64, f64, String, Uuid, DateTime<Utc>);
