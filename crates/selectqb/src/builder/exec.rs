//! Execution and result shaping.

use super::QueryBuilder;
use crate::driver::{Driver, QueryOutput, RequestHandle};
use crate::error::{QbError, QbResult};
use crate::monitor::{QueryContext, QueryResult};
use crate::record::{FromRecord, Record, SqlValue};
use futures_util::future::try_join_all;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

type Transform = Arc<dyn Fn(Vec<Record>) -> Vec<Record> + Send + Sync>;

/// Which rows [`QueryBuilder::execute`] returns.
#[derive(Clone, Default)]
pub enum RecordSet {
    /// The first (or only) row set.
    #[default]
    Primary,
    /// The nth row set of a multi-statement response.
    Index(usize),
    /// The primary row set passed through a function.
    Transform(Transform),
}

impl RecordSet {
    /// Shape the primary row set with `f`.
    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(Vec<Record>) -> Vec<Record> + Send + Sync + 'static,
    {
        RecordSet::Transform(Arc::new(f))
    }

    fn shape(&self, output: QueryOutput) -> QbResult<Vec<Record>> {
        match self {
            RecordSet::Primary => Ok(output.primary),
            RecordSet::Index(n) => {
                let available = output.all.len();
                output.all.into_iter().nth(*n).ok_or_else(|| {
                    QbError::not_found(format!("record set {n} (query returned {available})"))
                })
            }
            RecordSet::Transform(f) => Ok(f(output.primary)),
        }
    }
}

impl fmt::Debug for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSet::Primary => f.write_str("Primary"),
            RecordSet::Index(n) => f.debug_tuple("Index").field(n).finish(),
            RecordSet::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

impl<D: Driver> QueryBuilder<D> {
    /// Render, bind every input, run, and shape the result.
    ///
    /// The end instant is recorded whether the round trip succeeds or fails; a
    /// failed round trip surfaces as [`QbError::Driver`] with the driver's message.
    pub async fn execute(&mut self) -> QbResult<Vec<Record>> {
        let sql = self.build_query()?;
        let mut ctx = QueryContext::new(&sql, self.inputs.len());
        ctx.tag = self.tag.clone();

        let mut handle = self.driver.acquire().await?;
        for (name, input) in self.inputs.iter() {
            handle.bind(name, input.ty, &input.value);
        }

        tracing::debug!(
            target: "selectqb.sql",
            sql = %sql,
            param_count = ctx.param_count,
            "executing query"
        );
        for monitor in &self.monitors {
            monitor.on_query_start(&ctx);
        }

        let start = Instant::now();
        self.time_start = Some(start);
        self.time_end = None;
        let outcome = handle.run_query(&sql).await;
        let end = Instant::now();
        self.time_end = Some(end);
        let duration = end.saturating_duration_since(start);

        let outcome = outcome.map_err(into_driver_error);
        let result = match &outcome {
            Ok(output) => QueryResult::Rows(output.primary.len()),
            Err(err) => {
                tracing::warn!(
                    target: "selectqb.sql",
                    sql = %sql,
                    error = %err,
                    "query failed"
                );
                QueryResult::error(err.to_string())
            }
        };
        for monitor in &self.monitors {
            monitor.on_query_complete(&ctx, duration, &result);
        }
        if self.slow_query_threshold.is_some_and(|t| duration >= t) {
            for monitor in &self.monitors {
                monitor.on_slow_query(&ctx, duration);
            }
        }

        self.record_set.shape(outcome?)
    }

    /// Decompose `sql` into this builder, then [`execute`](Self::execute).
    pub async fn execute_sql(&mut self, sql: &str) -> QbResult<Vec<Record>> {
        self.parse(sql)?;
        self.execute().await
    }

    /// Execute and map every returned record into `T`.
    pub async fn fetch_all<T: FromRecord>(&mut self) -> QbResult<Vec<T>> {
        self.execute().await?.iter().map(T::from_record).collect()
    }

    /// Values of `expr` (an alias or expression) across the filtered rows.
    ///
    /// Runs a derived query; this builder's state is left untouched.
    pub async fn distinct_values(&self, expr: &str) -> QbResult<Vec<SqlValue>> {
        let mut child = self.distinct_child(expr);
        let rows = child.execute().await?;
        Ok(rows
            .into_iter()
            .map(|row| row.get("distinct").cloned().unwrap_or(SqlValue::Null))
            .collect())
    }

    /// [`distinct_values`](Self::distinct_values) for several expressions at once.
    ///
    /// The queries run concurrently; results keep the order of `exprs` and the
    /// first failure fails the whole call.
    pub async fn distinct_values_many<I, S>(&self, exprs: I) -> QbResult<Vec<Vec<SqlValue>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        try_join_all(
            exprs
                .into_iter()
                .map(move |expr| async move { self.distinct_values(expr.as_ref()).await }),
        )
        .await
    }

    /// Number of rows the current filters match, ignoring paging.
    pub async fn row_count(&self) -> QbResult<i64> {
        let mut child = self.row_count_child();
        let rows = child.execute().await?;
        let first = rows
            .first()
            .ok_or_else(|| QbError::not_found("row count query returned no rows"))?;
        first.try_get("rows")
    }
}

/// Round-trip failures become `Driver` errors carrying the message. Row decode
/// errors are raised locally and keep their column.
fn into_driver_error(err: QbError) -> QbError {
    match err {
        QbError::Driver(_) | QbError::Decode { .. } => err,
        other => QbError::Driver(other.to_string()),
    }
}
