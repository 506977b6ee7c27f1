//! SQL text → clause state.
//!
//! A statement is matched against one regex assembled from [`CLAUSES`]. Every
//! clause is optional and captures lazily, so each capture ends where the next
//! clause keyword begins. Captured fragments are replayed through the builder's
//! own mutators.

use super::QueryBuilder;
use crate::driver::Driver;
use crate::error::{QbError, QbResult};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// One clause of the statement pattern: its regex fragment and the named groups it
/// captures.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Clause {
    #[allow(dead_code)]
    pub(crate) name: &'static str,
    pub(crate) pattern: &'static str,
    #[allow(dead_code)]
    pub(crate) groups: &'static [&'static str],
}

pub(crate) static CLAUSES: [Clause; 7] = [
    Clause {
        name: "SELECT",
        pattern: r"SELECT(?: (?P<all>ALL|DISTINCT))?(?: TOP (?P<top>\d+))? (?P<select>.+?)",
        groups: &["all", "top", "select"],
    },
    Clause {
        name: "FROM",
        pattern: r"FROM (?P<from>.+?)",
        groups: &["from"],
    },
    Clause {
        name: "WHERE",
        pattern: r"WHERE (?P<where>.+?)",
        groups: &["where"],
    },
    Clause {
        name: "GROUP BY",
        pattern: r"GROUP BY (?P<group_by>.+?)",
        groups: &["group_by"],
    },
    Clause {
        name: "HAVING",
        pattern: r"HAVING (?P<having>.+?)",
        groups: &["having"],
    },
    Clause {
        name: "ORDER BY",
        pattern: r"ORDER BY (?P<order_by>.+?)",
        groups: &["order_by"],
    },
    Clause {
        name: "OFFSET",
        pattern: r"OFFSET (?P<offset>\d+) ROWS?(?: FETCH (?:FIRST|NEXT) (?P<fetch>\d+) ROWS? ONLY)?",
        groups: &["offset", "fetch"],
    },
];

#[cfg(test)]
impl Clause {
    /// This clause alone, matching a whole string.
    pub(crate) fn regex(&self) -> Regex {
        Regex::new(&format!("^(?:{})$", self.pattern)).expect("invalid built-in clause regex")
    }
}

fn statement_re() -> &'static Regex {
    static STATEMENT_RE: OnceLock<Regex> = OnceLock::new();
    STATEMENT_RE.get_or_init(|| {
        let clauses: String = CLAUSES
            .iter()
            .map(|c| format!("(?:(?:^| )?{})?", c.pattern))
            .collect();
        Regex::new(&format!("^{clauses} ?;? ?$")).expect("invalid built-in statement regex")
    })
}

fn whitespace_re() -> &'static Regex {
    static WS_RE: OnceLock<Regex> = OnceLock::new();
    WS_RE.get_or_init(|| Regex::new(r"\s+").expect("invalid built-in whitespace regex"))
}

/// Captured fragments of one statement, in clause order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Statement {
    pub(crate) all: Option<String>,
    pub(crate) top: Option<u64>,
    pub(crate) select: Option<String>,
    pub(crate) from: Option<String>,
    pub(crate) where_: Option<String>,
    pub(crate) group_by: Option<String>,
    pub(crate) having: Option<String>,
    pub(crate) order_by: Option<String>,
    pub(crate) offset: Option<u64>,
    pub(crate) fetch: Option<u64>,
}

/// Split `sql` into its clauses.
///
/// Whitespace runs collapse to one space first. A statement the pattern does not
/// cover is a parse error carrying `sql` as given.
pub(crate) fn decompose(sql: &str) -> QbResult<Statement> {
    let normalized = whitespace_re().replace_all(sql, " ");
    let caps = statement_re()
        .captures(&normalized)
        .ok_or_else(|| QbError::parse("Invalid query provided to QueryBuilder", sql))?;

    let text = |name: &str| {
        caps.name(name)
            .map(|m| m.as_str().to_string())
            .filter(|s| !s.is_empty())
    };

    Ok(Statement {
        all: text("all"),
        top: number(&caps, "top", sql)?,
        select: text("select"),
        from: text("from"),
        where_: text("where"),
        group_by: text("group_by"),
        having: text("having"),
        order_by: text("order_by"),
        offset: number(&caps, "offset", sql)?,
        fetch: number(&caps, "fetch", sql)?,
    })
}

fn number(caps: &Captures<'_>, name: &str, sql: &str) -> QbResult<Option<u64>> {
    caps.name(name)
        .map(|m| {
            m.as_str()
                .parse::<u64>()
                .map_err(|e| QbError::parse(format!("{name} value {}: {e}", m.as_str()), sql))
        })
        .transpose()
}

impl<D: Driver> QueryBuilder<D> {
    /// Load a full SELECT statement into this builder.
    ///
    /// Fragments are added to the existing state the same way the mutators would
    /// add them: the ALL/DISTINCT keyword and TOP are applied before the select
    /// list is scanned, and OFFSET before FETCH.
    ///
    /// Clause boundaries are found by keyword alone. A keyword inside a string
    /// literal or subquery (`'x FROM y' AS s`) ends the clause there, so such
    /// statements split in the wrong place; build them through the mutators instead.
    pub fn parse(&mut self, sql: &str) -> QbResult<&mut Self> {
        let statement = decompose(sql)?;

        if let Some(select) = statement.select {
            match statement.all.as_deref() {
                Some("ALL") => {
                    self.all(true);
                }
                Some("DISTINCT") => {
                    self.distinct(true);
                }
                _ => {}
            }
            if let Some(top) = statement.top {
                self.top(top);
            }
            self.select(select)?;
        }
        if let Some(from) = statement.from {
            self.from(from);
        }
        if let Some(predicate) = statement.where_ {
            self.where_(predicate);
        }
        if let Some(group_by) = statement.group_by {
            self.group_by(group_by);
        }
        if let Some(predicate) = statement.having {
            self.having(predicate);
        }
        if let Some(order_by) = statement.order_by {
            self.order_by(order_by);
        }
        if let Some(offset) = statement.offset {
            self.offset(offset);
            if let Some(fetch) = statement.fetch {
                self.fetch(fetch);
            }
        }
        Ok(self)
    }
}
