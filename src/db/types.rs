//! Shared type definitions for the storage layer.

use std::collections::BTreeMap;
use std::fmt;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to storage operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation in {collection}: {message}")]
    ConstraintViolation { collection: String, message: String },

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Cannot insert an empty record into {collection}")]
    EmptyRecord { collection: String },

    #[error("Collection {collection} needs at least one column")]
    NoColumns { collection: String },

    #[error("Refusing to {operation} every row of {collection}: no filters given")]
    MissingFilter {
        collection: String,
        operation: &'static str,
    },

    #[error("Column {column} does not hold {expected}")]
    Decode {
        column: String,
        expected: &'static str,
    },

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),
}

impl DbError {
    /// Translate a write failure, lifting SQLite constraint errors into
    /// [`DbError::ConstraintViolation`].
    pub(crate) fn from_write(collection: &str, err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ffi, message)
                if ffi.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                DbError::ConstraintViolation {
                    collection: collection.to_string(),
                    message: message.unwrap_or_else(|| ffi.to_string()),
                }
            }
            other => DbError::Sqlite(other),
        }
    }
}

/// A single scalar column value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
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

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(r) => ToSqlOutput::from(*r),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Value::Null),
            ValueRef::Integer(i) => Ok(Value::Integer(i)),
            ValueRef::Real(r) => Ok(Value::Real(r)),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .map(|s| Value::Text(s.to_string()))
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

/// One row of a collection: column name to scalar.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `set`.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Text column that may be absent or NULL.
    pub fn opt_text(&self, column: &str) -> Result<Option<String>, DbError> {
        match self.0.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_text()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| decode(column, "text")),
        }
    }

    pub fn text(&self, column: &str) -> Result<String, DbError> {
        self.opt_text(column)?
            .ok_or_else(|| decode(column, "non-null text"))
    }

    /// Integer column that may be absent or NULL.
    pub fn opt_integer(&self, column: &str) -> Result<Option<i64>, DbError> {
        match self.0.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_integer()
                .map(Some)
                .ok_or_else(|| decode(column, "an integer")),
        }
    }

    pub fn integer(&self, column: &str) -> Result<i64, DbError> {
        self.opt_integer(column)?
            .ok_or_else(|| decode(column, "a non-null integer"))
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Record(iter.into_iter().collect())
    }
}

fn decode(column: &str, expected: &'static str) -> DbError {
    DbError::Decode {
        column: column.to_string(),
        expected,
    }
}

/// Something that names a column. Implemented by `&'static str` and by the
/// per-collection field enums, so column names never come from runtime input.
pub trait Column: Copy {
    fn name(&self) -> &'static str;
}

impl Column for &'static str {
    fn name(&self) -> &'static str {
        *self
    }
}

/// Comparison operator for a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// `column <op> value`. Multiple filters are ANDed together.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter<C = &'static str> {
    pub column: C,
    pub op: CmpOp,
    pub value: Value,
}

impl<C: Column> Filter<C> {
    pub fn new(column: C, op: CmpOp, value: impl Into<Value>) -> Self {
        Self {
            column,
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: C, value: impl Into<Value>) -> Self {
        Self::new(column, CmpOp::Eq, value)
    }

    pub fn ne(column: C, value: impl Into<Value>) -> Self {
        Self::new(column, CmpOp::Ne, value)
    }

    pub fn lt(column: C, value: impl Into<Value>) -> Self {
        Self::new(column, CmpOp::Lt, value)
    }

    pub fn le(column: C, value: impl Into<Value>) -> Self {
        Self::new(column, CmpOp::Le, value)
    }

    pub fn gt(column: C, value: impl Into<Value>) -> Self {
        Self::new(column, CmpOp::Gt, value)
    }

    pub fn ge(column: C, value: impl Into<Value>) -> Self {
        Self::new(column, CmpOp::Ge, value)
    }
}

/// Sort key for `get`. Without one, rows come back in rowid order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy<C = &'static str> {
    pub column: C,
    pub descending: bool,
}

impl<C: Column> OrderBy<C> {
    pub fn asc(column: C) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    pub fn desc(column: C) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}
