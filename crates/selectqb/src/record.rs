//! Result records and mapping traits

use crate::error::{QbError, QbResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::error::Error;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Type};

/// A single column value of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Json(serde_json::Value),
    Uuid(uuid::Uuid),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl<'a> FromSql<'a> for SqlValue {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        let value = match *ty {
            Type::BOOL => SqlValue::Bool(bool::from_sql(ty, raw)?),
            Type::INT2 => SqlValue::Int(i16::from_sql(ty, raw)?.into()),
            Type::INT4 => SqlValue::Int(i32::from_sql(ty, raw)?.into()),
            Type::INT8 => SqlValue::Int(i64::from_sql(ty, raw)?),
            Type::FLOAT4 => SqlValue::Float(f32::from_sql(ty, raw)?.into()),
            Type::FLOAT8 => SqlValue::Float(f64::from_sql(ty, raw)?),
            Type::NUMERIC => SqlValue::Decimal(Decimal::from_sql(ty, raw)?),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                SqlValue::Text(String::from_sql(ty, raw)?)
            }
            Type::BYTEA => SqlValue::Bytes(Vec::<u8>::from_sql(ty, raw)?),
            Type::TIMESTAMPTZ => SqlValue::DateTime(DateTime::<Utc>::from_sql(ty, raw)?),
            Type::TIMESTAMP => SqlValue::DateTime(NaiveDateTime::from_sql(ty, raw)?.and_utc()),
            Type::DATE => SqlValue::Date(NaiveDate::from_sql(ty, raw)?),
            Type::TIME => SqlValue::Time(NaiveTime::from_sql(ty, raw)?),
            Type::JSON | Type::JSONB => SqlValue::Json(serde_json::Value::from_sql(ty, raw)?),
            Type::UUID => SqlValue::Uuid(uuid::Uuid::from_sql(ty, raw)?),
            _ => return Err(format!("unsupported column type: {ty}").into()),
        };
        Ok(value)
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(SqlValue::Null)
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::BOOL
                | Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::NUMERIC
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::UNKNOWN
                | Type::BYTEA
                | Type::TIMESTAMPTZ
                | Type::TIMESTAMP
                | Type::DATE
                | Type::TIME
                | Type::JSON
                | Type::JSONB
                | Type::UUID
        )
    }
}

/// Extract a Rust value from a [`SqlValue`].
pub trait FromValue: Sized {
    /// Returns `None` when the value has a different kind.
    fn from_value(value: &SqlValue) -> Option<Self>;
}

impl FromValue for SqlValue {
    fn from_value(value: &SqlValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Float(v) => Some(*v),
            SqlValue::Int(v) => Some(*v as f64),
            SqlValue::Decimal(v) => v.to_f64(),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Bytes(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::DateTime(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Decimal(v) => Some(*v),
            SqlValue::Int(v) => Some(Decimal::from(*v)),
            _ => None,
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Date(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Time(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Json(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromValue for uuid::Uuid {
    fn from_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Uuid(v) => Some(*v),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// One result row: column names and values in select-list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, SqlValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column.
    pub fn with(mut self, column: impl Into<String>, value: SqlValue) -> Self {
        self.columns.push((column.into(), value));
        self
    }

    /// Decode a driver row column by column.
    pub fn from_row(row: &Row) -> QbResult<Self> {
        let mut columns = Vec::with_capacity(row.len());
        for (idx, column) in row.columns().iter().enumerate() {
            let value: SqlValue = row
                .try_get(idx)
                .map_err(|e| QbError::decode(column.name(), e.to_string()))?;
            columns.push((column.name().to_string(), value));
        }
        Ok(Self { columns })
    }

    /// Value of the named column, if present.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    /// Typed value of the named column.
    pub fn try_get<T: FromValue>(&self, column: &str) -> QbResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| QbError::decode(column, "column not found"))?;
        T::from_value(value)
            .ok_or_else(|| QbError::decode(column, format!("unexpected value {value:?}")))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// Map a [`Record`] into a Rust type.
///
/// ```ignore
/// struct User { id: i64, name: String }
///
/// impl FromRecord for User {
///     fn from_record(record: &Record) -> QbResult<Self> {
///         Ok(User { id: record.try_get("id")?, name: record.try_get("name")? })
///     }
/// }
/// ```
pub trait FromRecord: Sized {
    fn from_record(record: &Record) -> QbResult<Self>;
}

impl FromRecord for Record {
    fn from_record(record: &Record) -> QbResult<Self> {
        Ok(record.clone())
    }
}
