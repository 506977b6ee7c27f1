//! Postgres driver over a deadpool connection pool.
//!
//! The builder references inputs by name (`@__QB_INPUT_1__`); Postgres wants
//! positional `$n` placeholders. [`PgRequest`] rewrites bound `@name`
//! references outside string literals before preparing the statement with the
//! declared parameter types.

use crate::config::ConnectionConfig;
use crate::driver::{Driver, QueryOutput, RequestHandle};
use crate::error::QbResult;
use crate::input::{InputValue, SqlType};
use crate::pool::cached_pool;
use crate::record::Record;
use deadpool_postgres::{Object, Pool};
use tokio_postgres::types::{ToSql, Type};

/// [`Driver`] backed by a Postgres pool.
#[derive(Clone)]
pub struct PgDriver {
    pool: Pool,
}

impl std::fmt::Debug for PgDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgDriver")
            .field("status", &self.pool.status())
            .finish()
    }
}

impl PgDriver {
    /// Wrap an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Use the process-wide cached pool for `config`.
    pub fn connect(config: &ConnectionConfig) -> QbResult<Self> {
        Ok(Self::new(cached_pool(config)?))
    }

    /// Use the cached pool for the environment-derived configuration.
    pub fn from_env() -> QbResult<Self> {
        Self::connect(&ConnectionConfig::from_env())
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

impl Driver for PgDriver {
    type Handle = PgRequest;

    async fn acquire(&self) -> QbResult<PgRequest> {
        let client = self.pool.get().await?;
        Ok(PgRequest {
            client,
            params: Vec::new(),
        })
    }
}

/// One pooled connection plus the parameters bound for the next query.
pub struct PgRequest {
    client: Object,
    params: Vec<(String, SqlType, InputValue)>,
}

impl RequestHandle for PgRequest {
    fn bind(&mut self, name: &str, ty: SqlType, value: &InputValue) {
        match self.params.iter_mut().find(|(n, _, _)| n == name) {
            Some(slot) => {
                slot.1 = ty;
                slot.2 = value.clone();
            }
            None => self.params.push((name.to_string(), ty, value.clone())),
        }
    }

    async fn run_query(&mut self, sql: &str) -> QbResult<QueryOutput> {
        let (exec_sql, names) =
            rewrite_named_params(sql, |name| self.params.iter().any(|(n, _, _)| n == name));

        let mut types: Vec<Type> = Vec::with_capacity(names.len());
        let mut values: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(names.len());
        for name in &names {
            if let Some((_, ty, value)) = self.params.iter().find(|(n, _, _)| n == name) {
                types.push(ty.pg_type());
                values.push(value);
            }
        }

        let stmt = self.client.prepare_typed_cached(&exec_sql, &types).await?;
        let rows = self.client.query(&stmt, &values).await?;
        let records = rows.iter().map(Record::from_row).collect::<QbResult<Vec<_>>>()?;
        Ok(QueryOutput::single(records))
    }
}

/// Replace bound `@name` references with `$n` placeholders.
///
/// Returns the rewritten SQL and the bound names in placeholder order. A name
/// referenced twice reuses its placeholder. Text inside quotes, `@@globals`, and
/// names for which `is_bound` is false are left untouched.
pub(crate) fn rewrite_named_params(sql: &str, is_bound: impl Fn(&str) -> bool) -> (String, Vec<String>) {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut names: Vec<String> = Vec::new();
    let mut open_quote: Option<u8> = None;
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match (open_quote, c) {
            (Some(q), _) if c == q => open_quote = None,
            (None, b'\'' | b'"') => open_quote = Some(c),
            (None, b'@') if i == 0 || bytes[i - 1] != b'@' => {
                let start = i + 1;
                let end = start
                    + bytes[start..]
                        .iter()
                        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
                        .count();
                let name = &sql[start..end];
                if !name.is_empty() && is_bound(name) {
                    let position = match names.iter().position(|n| n == name) {
                        Some(p) => p + 1,
                        None => {
                            names.push(name.to_string());
                            names.len()
                        }
                    };
                    out.push_str(&sql[copied..i]);
                    out.push('$');
                    out.push_str(&position.to_string());
                    copied = end;
                    i = end;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    out.push_str(&sql[copied..]);
    (out, names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(sql: &str) -> (String, Vec<String>) {
        rewrite_named_params(sql, |name| name.starts_with("p"))
    }

    #[test]
    fn test_rewrite_in_order() {
        let (sql, names) = rewrite("SELECT ALL a AS \"a\" WHERE a = @p2 AND b IN (@p1, @p2);");
        assert_eq!(sql, "SELECT ALL a AS \"a\" WHERE a = $1 AND b IN ($2, $1);");
        assert_eq!(names, vec!["p2", "p1"]);
    }

    #[test]
    fn test_rewrite_skips_literals_and_unknown_names() {
        let (sql, names) = rewrite("WHERE a = '@p1' AND \"@p1\" = @x AND c = @@p1 AND d = @p1");
        assert_eq!(sql, "WHERE a = '@p1' AND \"@p1\" = @x AND c = @@p1 AND d = $1");
        assert_eq!(names, vec!["p1"]);
    }

    #[test]
    fn test_rewrite_multibyte_text() {
        let (sql, names) = rewrite("WHERE name = 'größe' AND id = @p1;");
        assert_eq!(sql, "WHERE name = 'größe' AND id = $1;");
        assert_eq!(names, vec!["p1"]);
    }
}
