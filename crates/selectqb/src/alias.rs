//! Select-list tokenizer.
//!
//! Splits `expr [AS alias], ...` into an ordered alias → expression map without
//! being fooled by commas, spaces or `AS` inside parentheses and string literals.
//!
//! ```ignore
//! let map = selectqb::scan_aliases("MAX(a, b) AS top, 'x, y' AS pair, c")?;
//! assert_eq!(map.get("top"), Some("MAX(a, b)"));
//! assert_eq!(map.get("pair"), Some("'x, y'"));
//! assert_eq!(map.get("c"), Some("c"));
//! ```

use crate::error::{QbError, QbResult};
use std::sync::OnceLock;

/// Ordered alias → expression mapping.
///
/// Insertion order is the column order of the rendered SELECT list. Inserting an
/// alias that already exists replaces its expression in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectMap {
    entries: Vec<(String, String)>,
}

impl SelectMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the expression for `alias`.
    pub fn insert(&mut self, alias: impl Into<String>, expression: impl Into<String>) {
        let alias = alias.into();
        let expression = expression.into();
        match self.entries.iter_mut().find(|(a, _)| *a == alias) {
            Some(entry) => entry.1 = expression,
            None => self.entries.push((alias, expression)),
        }
    }

    /// Merge every entry of `other` into this map, in order.
    pub fn extend(&mut self, other: SelectMap) {
        for (alias, expression) in other.entries {
            self.insert(alias, expression);
        }
    }

    /// Look up the expression stored for `alias`.
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, e)| e.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(alias, expression)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(a, e)| (a.as_str(), e.as_str()))
    }
}

impl<A, E> FromIterator<(A, E)> for SelectMap
where
    A: Into<String>,
    E: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (A, E)>>(iter: I) -> Self {
        let mut map = SelectMap::new();
        for (alias, expression) in iter {
            map.insert(alias, expression);
        }
        map
    }
}

fn alias_re() -> &'static regex::Regex {
    static ALIAS_RE: OnceLock<regex::Regex> = OnceLock::new();
    ALIAS_RE.get_or_init(|| {
        regex::Regex::new(r#"^\s*(?:"((?:[^"\\]|\\.)*)"|(\w+))"#)
            .expect("invalid built-in alias regex")
    })
}

fn list_separator_re() -> &'static regex::Regex {
    static SEP_RE: OnceLock<regex::Regex> = OnceLock::new();
    SEP_RE.get_or_init(|| regex::Regex::new(r"^\s*,\s*").expect("invalid built-in separator regex"))
}

/// Scan a comma-separated select list into an ordered alias → expression map.
///
/// Bare expressions are keyed by themselves. An ` AS ` that is not followed by a
/// `"quoted"` or `\w+` alias is a parse error carrying the unscanned remainder.
pub fn scan_aliases(text: &str) -> QbResult<SelectMap> {
    let mut map = SelectMap::new();
    let mut rest = text;
    let mut open_parens: i32 = 0;
    let mut open_quote: Option<u8> = None;
    let mut x = 0;

    loop {
        let bytes = rest.as_bytes();

        // End of input flushes whatever is left, balanced or not.
        let Some(&c) = bytes.get(x) else {
            push_bare(&mut map, &rest[..x]);
            break;
        };

        match c {
            b'\'' | b'"' => {
                let escaped = x > 0 && bytes[x - 1] == b'\\';
                if !escaped {
                    match open_quote {
                        Some(q) if q == c => open_quote = None,
                        None => open_quote = Some(c),
                        Some(_) => {}
                    }
                }
            }
            b'(' if open_quote.is_none() => open_parens += 1,
            b')' if open_quote.is_none() => open_parens -= 1,
            b',' if open_parens == 0 && open_quote.is_none() => {
                push_bare(&mut map, &rest[..x]);
                rest = &rest[x + 1..];
                x = 0;
                continue;
            }
            b' ' if open_parens == 0 && open_quote.is_none() && is_as_keyword(&rest[x..]) => {
                let tail = &rest[x + 4..];
                let Some(caps) = alias_re().captures(tail) else {
                    return Err(QbError::parse("Invalid column alias detected", rest));
                };
                let alias = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map_or("", |m| m.as_str());
                map.insert(alias, rest[..x].trim());

                let after = &tail[caps.get(0).map_or(0, |m| m.end())..];
                rest = match list_separator_re().find(after) {
                    Some(sep) => &after[sep.end()..],
                    None => after,
                };
                x = 0;
                continue;
            }
            _ => {}
        }
        x += 1;
    }

    Ok(map)
}

fn push_bare(map: &mut SelectMap, fragment: &str) {
    let expression = fragment.trim();
    if !expression.is_empty() {
        map.insert(expression, expression);
    }
}

fn is_as_keyword(s: &str) -> bool {
    s.get(..4).is_some_and(|head| head.eq_ignore_ascii_case(" AS "))
}
