//! ORDER BY directives and the de-duplicating order list.

use crate::error::{QbError, QbResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort direction of an ORDER BY entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured `{ by, order }` sort directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub by: String,
    pub order: SortOrder,
}

impl OrderBy {
    pub fn asc(by: impl Into<String>) -> Self {
        Self {
            by: by.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(by: impl Into<String>) -> Self {
        Self {
            by: by.into(),
            order: SortOrder::Desc,
        }
    }

    /// Render as an order list entry, e.g. `created_at DESC`.
    pub fn to_clause(&self) -> String {
        format!("{} {}", self.by, self.order)
    }
}

/// Returns `true` if `value` has the shape of a sort directive:
/// an object with a string `by` and an `order` of exactly `"ASC"` or `"DESC"`.
pub fn is_order_spec(value: &serde_json::Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let by_ok = obj.get("by").is_some_and(serde_json::Value::is_string);
    let order_ok = obj
        .get("order")
        .and_then(serde_json::Value::as_str)
        .is_some_and(|o| o == "ASC" || o == "DESC");
    by_ok && order_ok
}

/// Anything `order_by` accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderByInput {
    /// A raw `expr [ASC|DESC]` fragment.
    Expr(String),
    /// A structured directive.
    Spec(OrderBy),
    /// A list of inputs, applied in order.
    List(Vec<OrderByInput>),
}

impl From<&str> for OrderByInput {
    fn from(value: &str) -> Self {
        OrderByInput::Expr(value.to_string())
    }
}

impl From<String> for OrderByInput {
    fn from(value: String) -> Self {
        OrderByInput::Expr(value)
    }
}

impl From<OrderBy> for OrderByInput {
    fn from(value: OrderBy) -> Self {
        OrderByInput::Spec(value)
    }
}

impl<T: Into<OrderByInput>> From<Vec<T>> for OrderByInput {
    fn from(values: Vec<T>) -> Self {
        OrderByInput::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<OrderByInput>, const N: usize> From<[T; N]> for OrderByInput {
    fn from(values: [T; N]) -> Self {
        OrderByInput::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<OrderByInput> + Clone> From<&[T]> for OrderByInput {
    fn from(values: &[T]) -> Self {
        OrderByInput::List(values.iter().cloned().map(Into::into).collect())
    }
}

impl TryFrom<serde_json::Value> for OrderByInput {
    type Error = QbError;

    fn try_from(value: serde_json::Value) -> QbResult<Self> {
        match value {
            serde_json::Value::String(s) => Ok(OrderByInput::Expr(s)),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(OrderByInput::try_from)
                .collect::<QbResult<Vec<_>>>()
                .map(OrderByInput::List),
            other if is_order_spec(&other) => serde_json::from_value(other)
                .map(OrderByInput::Spec)
                .map_err(|e| QbError::validation(e.to_string())),
            _ => Err(QbError::validation(
                "Invalid ORDER BY clause object supplied to method `order_by`",
            )),
        }
    }
}

/// Ordered ORDER BY entries holding at most one entry per expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderList {
    entries: Vec<String>,
}

impl OrderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry`, dropping any earlier entry for the same expression.
    pub fn push(&mut self, entry: impl Into<String>) {
        let entry = entry.into();
        let key = strip_direction(&entry);
        self.entries.retain(|existing| strip_direction(existing) != key);
        self.entries.push(entry);
    }

    /// Flatten `input` into the list.
    pub fn apply(&mut self, input: OrderByInput) {
        match input {
            OrderByInput::Expr(expr) => self.push(expr),
            OrderByInput::Spec(spec) => self.push(spec.to_clause()),
            OrderByInput::List(items) => {
                for item in items {
                    self.apply(item);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.entries
    }
}

fn strip_direction(entry: &str) -> &str {
    entry
        .strip_suffix(" ASC")
        .or_else(|| entry.strip_suffix(" DESC"))
        .unwrap_or(entry)
}
