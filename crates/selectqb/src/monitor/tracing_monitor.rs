use super::truncate_sql_bytes;
use super::types::{QueryContext, QueryMonitor, QueryResult};
use std::time::Duration;
use tracing::Level;

/// Dispatch a tracing event at a runtime-determined level.
macro_rules! emit_at_level {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN  => tracing::warn!($($field)*),
            Level::INFO  => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            Level::TRACE => tracing::trace!($($field)*),
        }
    };
}

/// A `tracing`-based monitor emitting the executed SQL under target `selectqb.sql`.
///
/// Start events carry the SQL and parameter count; completion events add the
/// duration and outcome. Slow queries are always emitted at `WARN`.
#[derive(Debug, Clone)]
pub struct TracingMonitor {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for TracingMonitor {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl TracingMonitor {
    /// Create a new monitor with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

impl QueryMonitor for TracingMonitor {
    fn on_query_start(&self, ctx: &QueryContext) {
        let sql = self.truncate_sql(&ctx.sql);
        let tag = ctx.tag.as_deref().unwrap_or("-");
        emit_at_level!(
            self.level,
            target: "selectqb.sql",
            tag,
            param_count = ctx.param_count,
            sql = %sql,
            "executing query"
        );
    }

    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        let tag = ctx.tag.as_deref().unwrap_or("-");
        let elapsed_us = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        match result {
            QueryResult::Rows(rows) => emit_at_level!(
                self.level,
                target: "selectqb.sql",
                tag,
                elapsed_us,
                rows,
                "query complete"
            ),
            QueryResult::Error(error) => tracing::warn!(
                target: "selectqb.sql",
                tag,
                elapsed_us,
                error = %error,
                "query failed"
            ),
        }
    }

    fn on_slow_query(&self, ctx: &QueryContext, duration: Duration) {
        tracing::warn!(
            target: "selectqb.sql",
            elapsed_us = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX),
            sql = %self.truncate_sql(&ctx.sql),
            "slow query"
        );
    }
}
