//! Query filters over top-level document fields.
//!
//! Filters compile to a SQL predicate over the JSON `body` column; every
//! value reaches SQLite as a bound parameter.

use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite};

/// Predicate evaluated against a stored document.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document.
    All,
    /// Field equals the value exactly.
    Eq(String, Value),
    /// String field contains the needle, ignoring case.
    ContainsIgnoreCase(String, String),
    /// Every inner filter matches. Empty matches everything.
    And(Vec<Filter>),
    /// At least one inner filter matches. Empty matches nothing.
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn contains_ignore_case(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Filter::ContainsIgnoreCase(field.into(), needle.into().to_lowercase())
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    /// Append this filter as a parenthesised SQL predicate.
    pub(crate) fn push_sql(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Filter::All => {
                qb.push("(1 = 1)");
            }
            Filter::Eq(field, Value::String(expected)) => {
                qb.push("(json_type(body, ")
                    .push_bind(json_path(field))
                    .push(") = 'text' AND json_extract(body, ")
                    .push_bind(json_path(field))
                    .push(") = ")
                    .push_bind(expected.clone())
                    .push(")");
            }
            Filter::Eq(field, expected) => {
                // Non-string values compare in their minified JSON form.
                qb.push("((body -> ")
                    .push_bind(json_path(field))
                    .push(") = ")
                    .push_bind(expected.to_string())
                    .push(")");
            }
            Filter::ContainsIgnoreCase(field, needle) => {
                qb.push("(json_type(body, ")
                    .push_bind(json_path(field))
                    .push(") = 'text' AND instr(lower(json_extract(body, ")
                    .push_bind(json_path(field))
                    .push(")), ")
                    .push_bind(needle.clone())
                    .push(") > 0)");
            }
            Filter::And(filters) => push_joined(qb, filters, " AND ", "(1 = 1)"),
            Filter::Or(filters) => push_joined(qb, filters, " OR ", "(1 = 0)"),
        }
    }
}

fn push_joined(qb: &mut QueryBuilder<'_, Sqlite>, filters: &[Filter], op: &str, empty: &str) {
    if filters.is_empty() {
        qb.push(empty);
        return;
    }
    qb.push("(");
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            qb.push(op);
        }
        filter.push_sql(qb);
    }
    qb.push(")");
}

/// `$."field"`, so field names never need escaping rules of their own.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', ""))
}
