//! Conjunctive equality filters.
//!
//! Every statement relsync issues is scoped by a conjunction of column
//! equalities and `IN` lists (owner key, related keys, delete scope), so
//! the filter model stays deliberately flat.

use relsync_core::{Dialect, Value};

/// A single filter term.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// `column = value`, or `column IS NULL` when the value is NULL.
    Eq(String, Value),
    /// `column IN (values...)`; an empty list matches nothing.
    In(String, Vec<Value>),
}

impl Term {
    /// Column this term constrains.
    pub fn column(&self) -> &str {
        match self {
            Term::Eq(column, _) | Term::In(column, _) => column,
        }
    }

    fn matches(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return matches!(self, Term::Eq(_, Value::Null));
        };
        match self {
            Term::Eq(_, expected) => value.loosely_equals(expected),
            Term::In(_, candidates) => {
                !value.is_null() && candidates.iter().any(|c| value.loosely_equals(c))
            }
        }
    }
}

/// A conjunction of [`Term`]s. The empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    terms: Vec<Term>,
}

impl Filter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `column = value`.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.push(Term::Eq(column.into(), value.into()));
        self
    }

    /// Add `column IN (values...)`.
    pub fn any_of(mut self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.terms.push(Term::In(column.into(), values));
        self
    }

    /// Add a hash-style condition: arrays become `IN`, anything else equality.
    pub fn condition(self, column: impl Into<String>, value: &Value) -> Self {
        match value {
            Value::Array(items) => self.any_of(column, items.clone()),
            other => self.eq(column, other.clone()),
        }
    }

    /// Append all terms of another filter.
    pub fn and(mut self, other: Filter) -> Self {
        self.terms.extend(other.terms);
        self
    }

    /// Terms in this filter.
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Whether this filter has no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluate this filter against a row, given a column lookup.
    pub fn matches<'a>(&self, lookup: impl Fn(&str) -> Option<&'a Value>) -> bool {
        self.terms.iter().all(|term| term.matches(lookup(term.column())))
    }

    /// Render ` WHERE ...` (with a leading space), or nothing for an empty filter.
    ///
    /// Placeholders continue numbering after the parameters already in `params`.
    pub fn render(&self, dialect: Dialect, params: &mut Vec<Value>) -> String {
        if self.terms.is_empty() {
            return String::new();
        }

        let clauses: Vec<String> = self
            .terms
            .iter()
            .map(|term| match term {
                Term::Eq(column, Value::Null) => {
                    format!("{} IS NULL", dialect.quote_identifier(column))
                }
                Term::Eq(column, value) => {
                    params.push(value.clone());
                    format!(
                        "{} = {}",
                        dialect.quote_identifier(column),
                        dialect.placeholder(params.len())
                    )
                }
                Term::In(_, values) if values.is_empty() => "1 = 0".to_string(),
                Term::In(column, values) => {
                    let placeholders: Vec<String> = values
                        .iter()
                        .map(|v| {
                            params.push(v.clone());
                            dialect.placeholder(params.len())
                        })
                        .collect();
                    format!(
                        "{} IN ({})",
                        dialect.quote_identifier(column),
                        placeholders.join(", ")
                    )
                }
            })
            .collect();

        format!(" WHERE {}", clauses.join(" AND "))
    }
}
