//! # selectqb
//!
//! A fluent SELECT builder that works in both directions:
//!
//! - **Compose**: accumulate SELECT/FROM/WHERE/GROUP BY/HAVING/ORDER BY/paging state
//!   through chained mutators and render canonical SQL with quoted aliases.
//! - **Decompose**: load a full statement back into the same state.
//!
//! The select-list tokenizer ([`scan_aliases`]) understands nested parentheses,
//! quoted literals and escaped quotes, so `select("MAX(a, b) AS m, 'x, y' AS pair")`
//! yields two columns, not four.
//!
//! Execution goes through the [`Driver`] / [`RequestHandle`] traits. With the
//! default `pool` feature, [`PgDriver`] runs queries on a process-wide
//! `deadpool-postgres` pool cache.
//!
//! ## Example
//!
//! ```ignore
//! use selectqb::{OrderBy, QueryBuilder};
//!
//! let mut qb = QueryBuilder::from_env()?;
//! qb.select("id, UPPER(name) AS name")?
//!     .from("users")
//!     .where_in("id", [1, 2, 3])
//!     .order_by(OrderBy::desc("id"));
//!
//! let rows = qb.execute().await?;
//! let total = qb.row_count().await?;
//! ```

pub mod alias;
pub mod builder;
pub mod config;
pub mod driver;
pub mod error;
pub mod input;
pub mod monitor;
pub mod order;
#[cfg(feature = "pool")]
pub mod pg;
#[cfg(feature = "pool")]
pub mod pool;
pub mod record;

pub use alias::{SelectMap, scan_aliases};
pub use builder::{QueryBuilder, RecordSet, SelectInput, WhereInValue};
pub use config::{ConnectionConfig, PoolOptions};
pub use driver::{Driver, QueryOutput, RequestHandle};
pub use error::{QbError, QbResult};
pub use input::{Input, InputMap, InputValue, SqlType};
pub use monitor::{
    LoggingMonitor, NoopMonitor, QueryContext, QueryMonitor, QueryResult, QueryStats,
    StatsMonitor, TracingMonitor,
};
pub use order::{OrderBy, OrderByInput, OrderList, SortOrder, is_order_spec};
#[cfg(feature = "pool")]
pub use pg::PgDriver;
#[cfg(feature = "pool")]
pub use pool::{cached_pool, create_pool};
pub use record::{FromRecord, FromValue, Record, SqlValue};

// Re-export for convenience
pub use tokio_postgres;
