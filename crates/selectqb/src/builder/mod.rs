//! Fluent SELECT builder.
//!
//! [`QueryBuilder`] accumulates clause state through `&mut self` mutators, renders
//! it with [`QueryBuilder::build_query`], and executes it through a [`Driver`].
//!
//! ```ignore
//! let mut qb = QueryBuilder::new(driver);
//! qb.select("id, UPPER(name) AS name")?
//!     .from("users")
//!     .where_in("status", ["active", "invited"])
//!     .order_by(OrderBy::desc("id"))
//!     .offset(20)
//!     .fetch(10);
//!
//! assert_eq!(
//!     qb.build_query()?,
//!     "SELECT ALL id AS \"id\", UPPER(name) AS \"name\" FROM users \
//!      WHERE status IN (@__QB_INPUT_1__, @__QB_INPUT_2__) \
//!      ORDER BY id DESC OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY;"
//! );
//! let rows = qb.execute().await?;
//! ```

mod exec;
mod parse;
mod render;

#[cfg(test)]
mod tests;

pub use exec::RecordSet;

use crate::alias::{SelectMap, scan_aliases};
use crate::driver::Driver;
use crate::error::QbResult;
use crate::input::{Input, InputMap, InputValue, SqlType};
use crate::monitor::QueryMonitor;
use crate::order::{OrderByInput, OrderList};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Argument accepted by [`QueryBuilder::select`].
#[derive(Debug, Clone, PartialEq)]
pub enum SelectInput {
    /// A raw `expr [AS alias], ...` list, tokenized on the way in.
    Expr(String),
    /// Explicit alias → expression pairs, merged without tokenizing.
    Aliases(SelectMap),
    /// Several inputs applied in order; later aliases override earlier ones.
    List(Vec<SelectInput>),
}

impl From<&str> for SelectInput {
    fn from(s: &str) -> Self {
        SelectInput::Expr(s.to_string())
    }
}

impl From<String> for SelectInput {
    fn from(s: String) -> Self {
        SelectInput::Expr(s)
    }
}

impl From<SelectMap> for SelectInput {
    fn from(map: SelectMap) -> Self {
        SelectInput::Aliases(map)
    }
}

impl<T: Into<SelectInput>> From<Vec<T>> for SelectInput {
    fn from(items: Vec<T>) -> Self {
        SelectInput::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<SelectInput>, const N: usize> From<[T; N]> for SelectInput {
    fn from(items: [T; N]) -> Self {
        SelectInput::List(items.into_iter().map(Into::into).collect())
    }
}

/// Argument accepted by [`QueryBuilder::where_in`]: one value or a list.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereInValue {
    One(InputValue),
    Many(Vec<InputValue>),
}

macro_rules! where_in_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for WhereInValue {
                fn from(v: $t) -> Self {
                    WhereInValue::One(v.into())
                }
            }
        )*
    };
}

where_in_scalar!(bool, i32, i64, f64, &str, String, DateTime<Utc>, InputValue);

impl<T: Into<InputValue>> From<Vec<T>> for WhereInValue {
    fn from(values: Vec<T>) -> Self {
        WhereInValue::Many(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<InputValue>, const N: usize> From<[T; N]> for WhereInValue {
    fn from(values: [T; N]) -> Self {
        WhereInValue::Many(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<InputValue> + Clone> From<&[T]> for WhereInValue {
    fn from(values: &[T]) -> Self {
        WhereInValue::Many(values.iter().cloned().map(Into::into).collect())
    }
}

/// Fluent SELECT statement builder bound to a driver.
#[derive(Clone)]
pub struct QueryBuilder<D: Driver> {
    driver: D,
    all: bool,
    top: u64,
    offset: u64,
    fetch: u64,
    from: Option<String>,
    select: SelectMap,
    where_: Vec<String>,
    group_by: Vec<String>,
    having: Vec<String>,
    order: OrderList,
    inputs: InputMap,
    vars: u64,
    record_set: RecordSet,
    time_start: Option<Instant>,
    time_end: Option<Instant>,
    monitors: Vec<Arc<dyn QueryMonitor>>,
    slow_query_threshold: Option<Duration>,
    tag: Option<String>,
}

impl<D: Driver> fmt::Debug for QueryBuilder<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("all", &self.all)
            .field("top", &self.top)
            .field("offset", &self.offset)
            .field("fetch", &self.fetch)
            .field("from", &self.from)
            .field("select", &self.select)
            .field("where", &self.where_)
            .field("group_by", &self.group_by)
            .field("having", &self.having)
            .field("order", &self.order)
            .field("inputs", &self.inputs)
            .field("record_set", &self.record_set)
            .field("monitors", &self.monitors.len())
            .finish()
    }
}

impl<D: Driver> QueryBuilder<D> {
    /// Create an empty builder executing through `driver`.
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            all: true,
            top: 0,
            offset: 0,
            fetch: 0,
            from: None,
            select: SelectMap::new(),
            where_: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order: OrderList::new(),
            inputs: InputMap::new(),
            vars: 0,
            record_set: RecordSet::Primary,
            time_start: None,
            time_end: None,
            monitors: Vec::new(),
            slow_query_threshold: None,
            tag: None,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    // ==================== SELECT list ====================

    /// Add columns to the SELECT list.
    ///
    /// Strings are tokenized into `alias → expression` pairs; an alias that is
    /// already present keeps its position and takes the new expression.
    pub fn select(&mut self, input: impl Into<SelectInput>) -> QbResult<&mut Self> {
        self.apply_select(input.into())?;
        Ok(self)
    }

    fn apply_select(&mut self, input: SelectInput) -> QbResult<()> {
        match input {
            SelectInput::Expr(text) => self.select.extend(scan_aliases(&text)?),
            SelectInput::Aliases(map) => self.select.extend(map),
            SelectInput::List(items) => {
                for item in items {
                    self.apply_select(item)?;
                }
            }
        }
        Ok(())
    }

    /// `SELECT ALL` (true) or `SELECT DISTINCT` (false).
    pub fn all(&mut self, all: bool) -> &mut Self {
        self.all = all;
        self
    }

    /// `SELECT DISTINCT` (true) or `SELECT ALL` (false).
    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.all = !distinct;
        self
    }

    /// `TOP n`; zero clears it.
    pub fn top(&mut self, n: u64) -> &mut Self {
        self.top = n;
        self
    }

    /// The expression stored for `alias`, or `alias` itself when it is not a known alias.
    pub fn expression_for_alias<'a>(&'a self, alias: &'a str) -> &'a str {
        self.select.get(alias).unwrap_or(alias)
    }

    pub fn select_map(&self) -> &SelectMap {
        &self.select
    }

    // ==================== FROM / WHERE / GROUP BY / HAVING ====================

    /// Set the table source.
    pub fn from(&mut self, source: impl Into<String>) -> &mut Self {
        self.from = Some(source.into());
        self
    }

    /// Append a WHERE predicate (AND-joined with the others).
    pub fn where_(&mut self, predicate: impl Into<String>) -> &mut Self {
        self.where_.push(predicate.into());
        self
    }

    /// Append several WHERE predicates.
    pub fn where_all<I, S>(&mut self, predicates: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.where_.extend(predicates.into_iter().map(Into::into));
        self
    }

    /// `expr = @p` for one value, `expr IN (@p1, @p2, ...)` for a list.
    ///
    /// Each value is bound as its own auto-named input. An empty list matches no
    /// rows and renders as `1 = 0`.
    pub fn where_in(&mut self, expr: &str, value: impl Into<WhereInValue>) -> &mut Self {
        let predicate = match value.into() {
            WhereInValue::One(v) => format!("{expr} = {}", self.input(v)),
            WhereInValue::Many(values) if values.is_empty() => "1 = 0".to_string(),
            WhereInValue::Many(values) => {
                let refs: Vec<String> = values.into_iter().map(|v| self.input(v)).collect();
                format!("{expr} IN ({})", refs.join(", "))
            }
        };
        self.where_(predicate)
    }

    /// Append a GROUP BY entry; select-list aliases stand in for their expression.
    pub fn group_by(&mut self, expr: impl Into<String>) -> &mut Self {
        self.group_by.push(expr.into());
        self
    }

    pub fn group_by_all<I, S>(&mut self, exprs: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(exprs.into_iter().map(Into::into));
        self
    }

    /// Append a HAVING predicate (AND-joined with the others).
    pub fn having(&mut self, predicate: impl Into<String>) -> &mut Self {
        self.having.push(predicate.into());
        self
    }

    pub fn having_all<I, S>(&mut self, predicates: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.having.extend(predicates.into_iter().map(Into::into));
        self
    }

    // ==================== ORDER BY & paging ====================

    /// Append ORDER BY entries.
    ///
    /// Re-ordering by an expression that is already present moves it to the end
    /// with the new direction.
    pub fn order_by(&mut self, input: impl Into<OrderByInput>) -> &mut Self {
        self.order.apply(input.into());
        self
    }

    /// Append ORDER BY entries from a dynamic value: a string, a `{by, order}`
    /// object, or an array of either.
    pub fn order_by_json(&mut self, value: serde_json::Value) -> QbResult<&mut Self> {
        let input = OrderByInput::try_from(value)?;
        Ok(self.order_by(input))
    }

    pub fn order_list(&self) -> &OrderList {
        &self.order
    }

    /// Rows to skip. Needs ORDER BY and excludes TOP at render time.
    pub fn offset(&mut self, n: u64) -> &mut Self {
        self.offset = n;
        self
    }

    /// Rows to return after OFFSET. Needs ORDER BY and excludes TOP at render time.
    pub fn fetch(&mut self, n: u64) -> &mut Self {
        self.fetch = n;
        self
    }

    // ==================== Inputs ====================

    /// Bind `value` under a generated name and return its `@name` reference.
    pub fn input(&mut self, value: impl Into<InputValue>) -> String {
        self.vars += 1;
        let name = format!("__QB_INPUT_{}__", self.vars);
        let reference = format!("@{name}");
        self.input_named(value, name);
        reference
    }

    /// Bind a dynamic value under a generated name.
    ///
    /// Null, arrays and objects are rejected before anything is bound.
    pub fn input_json(&mut self, value: serde_json::Value) -> QbResult<String> {
        let value = InputValue::try_from(value)?;
        Ok(self.input(value))
    }

    /// Store or overwrite the binding `name`, inferring its SQL type.
    pub fn input_named(&mut self, value: impl Into<InputValue>, name: impl Into<String>) -> &mut Self {
        let value = value.into();
        let ty = value.sql_type();
        self.input_typed(value, name, ty)
    }

    /// Store or overwrite the binding `name` with an explicit SQL type.
    pub fn input_typed(
        &mut self,
        value: impl Into<InputValue>,
        name: impl Into<String>,
        ty: SqlType,
    ) -> &mut Self {
        self.inputs.insert(
            name,
            Input {
                ty,
                value: value.into(),
            },
        );
        self
    }

    pub fn input_bool(&mut self, value: bool, name: impl Into<String>) -> &mut Self {
        self.input_typed(value, name, SqlType::Bit)
    }

    pub fn input_int(&mut self, value: i64, name: impl Into<String>) -> &mut Self {
        self.input_typed(value, name, SqlType::Int)
    }

    pub fn input_float(&mut self, value: f64, name: impl Into<String>) -> &mut Self {
        self.input_typed(value, name, SqlType::Float)
    }

    pub fn input_string(&mut self, value: impl Into<String>, name: impl Into<String>) -> &mut Self {
        self.input_typed(value.into(), name, SqlType::NVarChar)
    }

    pub fn input_bytes(&mut self, value: impl Into<Vec<u8>>, name: impl Into<String>) -> &mut Self {
        self.input_typed(value.into(), name, SqlType::VarBinary)
    }

    pub fn input_date_time(&mut self, value: DateTime<Utc>, name: impl Into<String>) -> &mut Self {
        self.input_typed(value, name, SqlType::DateTime)
    }

    pub fn inputs(&self) -> &InputMap {
        &self.inputs
    }

    // ==================== Result shaping & observation ====================

    /// Choose which rows [`execute`](Self::execute) returns.
    pub fn record_set(&mut self, record_set: RecordSet) -> &mut Self {
        self.record_set = record_set;
        self
    }

    /// Attach a monitor. Child builders derived from this one inherit it.
    pub fn with_monitor(&mut self, monitor: impl QueryMonitor + 'static) -> &mut Self {
        self.monitors.push(Arc::new(monitor));
        self
    }

    /// Attach a shared monitor, e.g. a [`StatsMonitor`](crate::monitor::StatsMonitor)
    /// that is read after execution.
    pub fn with_monitor_arc(&mut self, monitor: Arc<dyn QueryMonitor>) -> &mut Self {
        self.monitors.push(monitor);
        self
    }

    /// Report executions at least this long through `on_slow_query`.
    pub fn with_slow_query_threshold(&mut self, threshold: Duration) -> &mut Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    /// Name this query in monitor and log output.
    pub fn tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.tag = Some(tag.into());
        self
    }

    /// How long the last execution took; zero if nothing has run yet.
    pub fn elapsed(&self) -> Duration {
        match (self.time_start, self.time_end) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }

    // ==================== Child builders ====================

    /// A fresh builder sharing this one's driver, monitors and a copy of its inputs.
    fn derive(&self) -> Self {
        let mut child = Self::new(self.driver.clone());
        child.inputs = self.inputs.clone();
        child.vars = self.vars;
        child.monitors = self.monitors.clone();
        child.slow_query_threshold = self.slow_query_threshold;
        child.tag = self.tag.clone();
        child
    }

    /// GROUP BY entries with this builder's aliases resolved.
    fn resolved_group_by(&self) -> Vec<String> {
        self.group_by
            .iter()
            .map(|g| self.expression_for_alias(g).to_string())
            .collect()
    }

    /// The query behind [`distinct_values`](Self::distinct_values).
    ///
    /// Selects the resolved `expr` as `"distinct"` with DISTINCT set, keeping FROM,
    /// WHERE, GROUP BY (plus `expr`), HAVING and paging, ordered by `"distinct"`.
    pub(crate) fn distinct_child(&self, expr: &str) -> Self {
        let resolved = self.expression_for_alias(expr).to_string();
        let mut child = self.derive();
        child.all = false;
        child.select.insert("distinct", resolved.clone());
        child.from = self.from.clone();
        child.where_ = self.where_.clone();
        child.group_by = self.resolved_group_by();
        if !child.group_by.contains(&resolved) {
            child.group_by.push(resolved);
        }
        child.having = self.having.clone();
        child.order.push("\"distinct\"");
        child.offset = self.offset;
        child.fetch = self.fetch;
        child
    }

    /// The query behind [`row_count`](Self::row_count).
    ///
    /// Selects `COUNT(*)` as `"rows"` with this builder's ALL/DISTINCT flag, FROM,
    /// WHERE, GROUP BY and HAVING. Paging and ordering are dropped.
    pub(crate) fn row_count_child(&self) -> Self {
        let mut child = self.derive();
        child.all = self.all;
        child.select.insert("rows", "COUNT(*)");
        child.from = self.from.clone();
        child.where_ = self.where_.clone();
        child.group_by = self.resolved_group_by();
        child.having = self.having.clone();
        child
    }
}

#[cfg(feature = "pool")]
impl QueryBuilder<crate::pg::PgDriver> {
    /// Builder over the cached Postgres pool for `config`.
    pub fn connect(config: &crate::config::ConnectionConfig) -> QbResult<Self> {
        Ok(Self::new(crate::pg::PgDriver::connect(config)?))
    }

    /// Builder over the cached Postgres pool for the environment configuration.
    pub fn from_env() -> QbResult<Self> {
        Ok(Self::new(crate::pg::PgDriver::from_env()?))
    }
}
