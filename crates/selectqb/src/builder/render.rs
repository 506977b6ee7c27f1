//! Clause state → SQL text.

use super::QueryBuilder;
use crate::driver::Driver;
use crate::error::{QbError, QbResult};

impl<D: Driver> QueryBuilder<D> {
    /// Render the accumulated clauses as one `;`-terminated statement.
    ///
    /// Clauses that hold no state are omitted. OFFSET/FETCH is checked here rather
    /// than in the mutators, so `top`, `offset` and `order_by` may be called in any
    /// order as long as the final state is consistent.
    pub fn build_query(&self) -> QbResult<String> {
        let mut sql = String::new();
        self.build_select(&mut sql);
        self.build_from(&mut sql);
        self.build_where(&mut sql);
        self.build_group_by(&mut sql);
        self.build_having(&mut sql);
        self.build_order_by(&mut sql);
        self.build_offset(&mut sql)?;
        sql.push(';');
        Ok(sql)
    }

    fn build_select(&self, sql: &mut String) {
        if self.select.is_empty() {
            return;
        }
        sql.push_str(if self.all { "SELECT ALL" } else { "SELECT DISTINCT" });
        if self.top != 0 {
            sql.push_str(&format!(" TOP {}", self.top));
        }
        let columns: Vec<String> = self
            .select
            .iter()
            .map(|(alias, expression)| format!("{expression} AS \"{}\"", escape_alias(alias)))
            .collect();
        sql.push(' ');
        sql.push_str(&columns.join(", "));
    }

    fn build_from(&self, sql: &mut String) {
        if let Some(from) = &self.from {
            sql.push_str(" FROM ");
            sql.push_str(from);
        }
    }

    fn build_where(&self, sql: &mut String) {
        if !self.where_.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_.join(" AND "));
        }
    }

    fn build_group_by(&self, sql: &mut String) {
        if !self.group_by.is_empty() {
            let entries: Vec<&str> = self
                .group_by
                .iter()
                .map(|g| self.expression_for_alias(g))
                .collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&entries.join(", "));
        }
    }

    fn build_having(&self, sql: &mut String) {
        if !self.having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&self.having.join(" AND "));
        }
    }

    fn build_order_by(&self, sql: &mut String) {
        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order.as_slice().join(", "));
        }
    }

    fn build_offset(&self, sql: &mut String) -> QbResult<()> {
        if self.offset == 0 && self.fetch == 0 {
            return Ok(());
        }
        if self.order.is_empty() {
            return Err(QbError::validation(
                "ORDER BY is mandatory to use OFFSET and FETCH clause",
            ));
        }
        if self.top != 0 {
            return Err(QbError::validation(
                "TOP cannot be combined with OFFSET and FETCH in the same query expression",
            ));
        }
        sql.push_str(&format!(" OFFSET {} ROWS", self.offset));
        if self.fetch > 0 {
            sql.push_str(&format!(" FETCH NEXT {} ROWS ONLY", self.fetch));
        }
        Ok(())
    }
}

/// Backslash-escape the double quotes of an alias. A quote that is already escaped
/// (preceded by an odd run of backslashes, as the scanner keeps it) is left as is,
/// so rendering a parsed statement reproduces it.
fn escape_alias(alias: &str) -> String {
    let mut out = String::with_capacity(alias.len() + 2);
    let mut backslashes = 0usize;
    for c in alias.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' if backslashes % 2 == 0 => {
                out.push('\\');
                backslashes = 0;
            }
            _ => backslashes = 0,
        }
        out.push(c);
    }
    out
}
