//! Bound query inputs and their SQL types.

use crate::error::{QbError, QbResult};
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt;
use tokio_postgres::types::{IsNull, ToSql, Type};

/// Declared SQL type of a bound input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Bit,
    Int,
    Float,
    NVarChar,
    VarBinary,
    DateTime,
}

impl SqlType {
    /// The Postgres type a parameter of this kind is prepared with.
    pub fn pg_type(self) -> Type {
        match self {
            SqlType::Bit => Type::BOOL,
            SqlType::Int => Type::INT8,
            SqlType::Float => Type::FLOAT8,
            SqlType::NVarChar => Type::TEXT,
            SqlType::VarBinary => Type::BYTEA,
            SqlType::DateTime => Type::TIMESTAMPTZ,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlType::Bit => "Bit",
            SqlType::Int => "Int",
            SqlType::Float => "Float",
            SqlType::NVarChar => "NVarChar",
            SqlType::VarBinary => "VarBinary",
            SqlType::DateTime => "DateTime",
        };
        f.write_str(name)
    }
}

/// A value that can be bound as a query input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
}

impl InputValue {
    /// Infer the SQL type from the value kind.
    pub fn sql_type(&self) -> SqlType {
        match self {
            InputValue::Bool(_) => SqlType::Bit,
            InputValue::Int(_) => SqlType::Int,
            InputValue::Float(_) => SqlType::Float,
            InputValue::String(_) => SqlType::NVarChar,
            InputValue::Bytes(_) => SqlType::VarBinary,
            InputValue::DateTime(_) => SqlType::DateTime,
        }
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        InputValue::Bool(value)
    }
}

impl From<i32> for InputValue {
    fn from(value: i32) -> Self {
        InputValue::Int(i64::from(value))
    }
}

impl From<i64> for InputValue {
    fn from(value: i64) -> Self {
        InputValue::Int(value)
    }
}

impl From<f64> for InputValue {
    fn from(value: f64) -> Self {
        InputValue::Float(value)
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        InputValue::String(value.to_string())
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        InputValue::String(value)
    }
}

impl From<Vec<u8>> for InputValue {
    fn from(value: Vec<u8>) -> Self {
        InputValue::Bytes(value)
    }
}

impl From<&[u8]> for InputValue {
    fn from(value: &[u8]) -> Self {
        InputValue::Bytes(value.to_vec())
    }
}

impl From<DateTime<Utc>> for InputValue {
    fn from(value: DateTime<Utc>) -> Self {
        InputValue::DateTime(value)
    }
}

impl TryFrom<serde_json::Value> for InputValue {
    type Error = QbError;

    /// Infer an input from a dynamic JSON value.
    ///
    /// Null, arrays and objects have no SQL input type and are rejected.
    fn try_from(value: serde_json::Value) -> QbResult<Self> {
        match value {
            serde_json::Value::Bool(b) => Ok(InputValue::Bool(b)),
            serde_json::Value::String(s) => Ok(InputValue::String(s)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(InputValue::Int(i)),
                None => n.as_f64().map(InputValue::Float).ok_or_else(|| {
                    QbError::unsupported_input(format!("number {n} is out of range"))
                }),
            },
            other => Err(QbError::unsupported_input(format!(
                "Only boolean, number, string, bytes, and date-time inputs are allowed, got {other}"
            ))),
        }
    }
}

impl ToSql for InputValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            InputValue::Bool(v) => v.to_sql_checked(ty, out),
            InputValue::Int(v) => v.to_sql_checked(ty, out),
            InputValue::Float(v) => v.to_sql_checked(ty, out),
            InputValue::String(v) => v.to_sql_checked(ty, out),
            InputValue::Bytes(v) => v.to_sql_checked(ty, out),
            InputValue::DateTime(v) => v.to_sql_checked(ty, out),
        }
    }

    // The concrete variant decides; see `to_sql`.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

/// A bound input: its declared type and value.
#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    pub ty: SqlType,
    pub value: InputValue,
}

/// Ordered parameter name → input bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputMap {
    entries: Vec<(String, Input)>,
}

impl InputMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite the binding for `name`.
    pub fn insert(&mut self, name: impl Into<String>, input: Input) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = input,
            None => self.entries.push((name, input)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Input> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, i)| i)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Input)> {
        self.entries.iter().map(|(n, i)| (n.as_str(), i))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}
