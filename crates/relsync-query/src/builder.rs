//! Structured SELECT, INSERT, UPDATE and DELETE commands.
//!
//! Commands carry table and column names plus bound values. They are
//! rendered to SQL only at execution time, with the dialect of the
//! connection that runs them, and stay inspectable for executors that do
//! not speak SQL at all.

use crate::filter::Filter;
use relsync_core::{Dialect, Error, QueryError, QueryErrorKind, Result, Value};

/// Statement class of a write, as recorded by executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// SELECT
    Select,
    /// INSERT
    Insert,
    /// UPDATE
    Update,
    /// DELETE
    Delete,
}

impl CommandKind {
    /// SQL keyword for this statement class.
    pub const fn as_sql(self) -> &'static str {
        match self {
            CommandKind::Select => "SELECT",
            CommandKind::Insert => "INSERT",
            CommandKind::Update => "UPDATE",
            CommandKind::Delete => "DELETE",
        }
    }
}

/// SELECT builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    table: String,
    columns: Vec<String>,
    filter: Filter,
}

impl Select {
    /// Select from the given table.
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filter: Filter::new(),
        }
    }

    /// Project the given columns (all columns if never called).
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Restrict the selected rows.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = self.filter.and(filter);
        self
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Projected columns (empty means all).
    pub fn selected_columns(&self) -> &[String] {
        &self.columns
    }

    /// Row filter.
    pub fn where_filter(&self) -> &Filter {
        &self.filter
    }

    /// Build the SELECT SQL and parameters with specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let projection = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| dialect.quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut params = Vec::new();
        let where_sql = self.filter.render(dialect, &mut params);
        let sql = format!(
            "SELECT {} FROM {}{}",
            projection,
            dialect.quote_identifier(&self.table),
            where_sql
        );
        (sql, params)
    }
}

/// Multi-row INSERT builder.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertMany {
    table: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl InsertMany {
    /// Insert into the given table and columns.
    pub fn into_table<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row of values, in column order.
    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(values);
        self
    }

    /// Append a row of values in place.
    pub fn push_row(&mut self, values: Vec<Value>) {
        self.rows.push(values);
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows to insert.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Whether there is nothing to insert.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check that every row has one value per column.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        if let Some((index, row)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.columns.len())
        {
            return Err(Error::Query(QueryError {
                kind: QueryErrorKind::Database,
                sql: None,
                message: format!(
                    "insert into '{}': row {} has {} values for {} columns",
                    self.table,
                    index,
                    row.len(),
                    self.columns.len()
                ),
                source: None,
            }));
        }
        Ok(())
    }

    /// Build the INSERT SQL and parameters with specific dialect.
    ///
    /// All rows go into a single `INSERT ... VALUES (..), (..)` statement.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| dialect.quote_identifier(c))
            .collect();

        let mut params = Vec::with_capacity(self.rows.len() * self.columns.len());
        let tuples: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let placeholders: Vec<String> = row
                    .iter()
                    .map(|value| {
                        params.push(value.clone());
                        dialect.placeholder(params.len())
                    })
                    .collect();
                format!("({})", placeholders.join(", "))
            })
            .collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            dialect.quote_identifier(&self.table),
            columns.join(", "),
            tuples.join(", ")
        );
        (sql, params)
    }
}

/// UPDATE builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    table: String,
    set: Vec<(String, Value)>,
    filter: Filter,
}

impl Update {
    /// Update the given table.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            set: Vec::new(),
            filter: Filter::new(),
        }
    }

    /// Assign a column.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((column.into(), value.into()));
        self
    }

    /// Restrict the updated rows.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = self.filter.and(filter);
        self
    }

    /// Table name.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Column assignments.
    pub fn assignments(&self) -> &[(String, Value)] {
        &self.set
    }

    /// Row filter.
    pub fn where_filter(&self) -> &Filter {
        &self.filter
    }

    /// Build the UPDATE SQL and parameters with specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let set_clauses: Vec<String> = self
            .set
            .iter()
            .map(|(column, value)| {
                params.push(value.clone());
                format!(
                    "{} = {}",
                    dialect.quote_identifier(column),
                    dialect.placeholder(params.len())
                )
            })
            .collect();

        let where_sql = self.filter.render(dialect, &mut params);
        let sql = format!(
            "UPDATE {} SET {}{}",
            dialect.quote_identifier(&self.table),
            set_clauses.join(", "),
            where_sql
        );
        (sql, params)
    }
}

/// DELETE builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    table: String,
    filter: Filter,
}

impl Delete {
    /// Delete from the given table.
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: Filter::new(),
        }
    }

    /// Restrict the deleted rows.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = self.filter.and(filter);
        self
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Row filter.
    pub fn where_filter(&self) -> &Filter {
        &self.filter
    }

    /// Build the DELETE SQL and parameters with specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let where_sql = self.filter.render(dialect, &mut params);
        let sql = format!(
            "DELETE FROM {}{}",
            dialect.quote_identifier(&self.table),
            where_sql
        );
        (sql, params)
    }
}
