use std::fmt;
use std::time::Duration;

/// What is known about a statement while it runs.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// The rendered SQL handed to the driver.
    pub sql: String,
    /// Number of bound inputs.
    pub param_count: usize,
    /// Optional name identifying the query in logs and metrics.
    pub tag: Option<String>,
}

impl QueryContext {
    /// Create a new query context.
    pub fn new(sql: &str, param_count: usize) -> Self {
        Self {
            sql: sql.to_string(),
            param_count,
            tag: None,
        }
    }

    /// Add a tag to identify this query.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Maximum length for error messages in `QueryResult::Error`.
const MAX_ERROR_LEN: usize = 512;

/// Outcome of an execution, for monitoring purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// Number of rows in the primary row set.
    Rows(usize),
    /// The execution failed (message truncated to 512 bytes).
    Error(String),
}

impl QueryResult {
    /// Create an error result, truncating the message to avoid monitoring data explosion.
    pub fn error(msg: String) -> Self {
        if msg.len() > MAX_ERROR_LEN {
            let truncated = super::truncate_sql_bytes(&msg, MAX_ERROR_LEN);
            Self::Error(format!("{truncated}..."))
        } else {
            Self::Error(msg)
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::Error(_))
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Rows(n) => write!(f, "{n} rows"),
            QueryResult::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Observer of query execution.
///
/// Implement this trait to collect metrics, log queries, or integrate
/// with observability systems.
pub trait QueryMonitor: Send + Sync {
    /// Called right before the query is sent to the driver.
    fn on_query_start(&self, _ctx: &QueryContext) {}

    /// Called after a query completes (success or failure).
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult);

    /// Called when a query took at least the builder's slow-query threshold.
    fn on_slow_query(&self, _ctx: &QueryContext, _duration: Duration) {}
}
