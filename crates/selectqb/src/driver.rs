//! Driver traits the builder executes through.
//!
//! A [`Driver`] hands out a fresh [`RequestHandle`] per execution. The handle
//! collects named parameter bindings and then runs one finished SQL string.

use crate::error::QbResult;
use crate::input::{InputValue, SqlType};
use crate::record::Record;
use std::future::Future;

/// Rows produced by one query round trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    /// The first (or only) row set.
    pub primary: Vec<Record>,
    /// Every row set the statement produced, in order.
    pub all: Vec<Vec<Record>>,
}

impl QueryOutput {
    /// Output of a single-statement query.
    pub fn single(rows: Vec<Record>) -> Self {
        Self {
            all: vec![rows.clone()],
            primary: rows,
        }
    }
}

/// A request-capable handle bound to one connection for one execution.
pub trait RequestHandle: Send {
    /// Bind a named parameter, referenced in SQL as `@name`.
    fn bind(&mut self, name: &str, ty: SqlType, value: &InputValue);

    /// Run `sql` with the bound parameters.
    fn run_query(&mut self, sql: &str) -> impl Future<Output = QbResult<QueryOutput>> + Send;
}

/// Source of request handles (usually a connection pool).
pub trait Driver: Clone + Send + Sync {
    type Handle: RequestHandle;

    /// Acquire a ready-to-use request handle.
    fn acquire(&self) -> impl Future<Output = QbResult<Self::Handle>> + Send;
}
