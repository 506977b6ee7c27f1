//! Query observers.
//!
//! A [`QueryBuilder`](crate::QueryBuilder) can carry any number of
//! [`QueryMonitor`]s. Each is told when execution starts, when it completes
//! (successfully or not), and when it crossed the builder's slow-query threshold.
//!
//! # Example
//!
//! ```rust,ignore
//! use selectqb::monitor::{LoggingMonitor, StatsMonitor};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let stats = Arc::new(StatsMonitor::new());
//! let mut qb = QueryBuilder::new(driver);
//! qb.with_monitor(LoggingMonitor::new().min_duration(Duration::from_millis(50)))
//!     .with_monitor_arc(stats.clone())
//!     .with_slow_query_threshold(Duration::from_secs(1));
//! ```

mod monitors;
mod tracing_monitor;
mod types;


pub use monitors::{LoggingMonitor, NoopMonitor, QueryStats, StatsMonitor};
pub use tracing_monitor::TracingMonitor;
pub use types::{QueryContext, QueryMonitor, QueryResult};

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
