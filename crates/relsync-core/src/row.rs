//! Rows read back from a store.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column names of a result set, with a name lookup.
#[derive(Debug, Clone, Default)]
pub struct ColumnInfo {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Index the given column names. A repeated name resolves to its first position.
    pub fn new(names: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self { names, index }
    }

    /// Position of a column.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Column names in result order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// One junction or related-table row.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<ColumnInfo>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            columns: Arc::new(ColumnInfo::new(column_names)),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a column position.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of a named column, if the row carries it.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .index_of(name)
            .and_then(|i| self.values.get(i))
    }

    /// Value of a named column; a missing column is a type error naming it.
    #[allow(clippy::result_large_err)]
    pub fn get_named(&self, name: &str) -> Result<&Value> {
        self.get_by_name(name).ok_or_else(|| {
            Error::Type(TypeError {
                expected: "column",
                actual: format!("row without column {name:?}"),
                column: Some(name.to_string()),
            })
        })
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::new(
            vec!["book_id".into(), "author_id".into(), "position".into()],
            vec![Value::BigInt(5), Value::BigInt(7), Value::Int(1)],
        )
    }

    #[test]
    fn test_access_by_name_and_index() {
        let row = sample();
        assert_eq!(row.len(), 3);
        assert_eq!(row.get(1), Some(&Value::BigInt(7)));
        assert_eq!(row.get_by_name("position"), Some(&Value::Int(1)));
        assert!(row.get_by_name("missing").is_none());
        let names: Vec<_> = row.column_names().collect();
        assert_eq!(names, vec!["book_id", "author_id", "position"]);
    }

    #[test]
    fn test_get_named_missing_column() {
        let row = sample();
        let err = row.get_named("missing").unwrap_err();
        assert!(matches!(err, Error::Type(TypeError { column: Some(ref c), .. }) if c == "missing"));
    }

    #[test]
    fn test_repeated_column_resolves_to_first() {
        let row = Row::new(
            vec!["id".into(), "id".into()],
            vec![Value::BigInt(1), Value::BigInt(2)],
        );
        assert_eq!(row.get_by_name("id"), Some(&Value::BigInt(1)));
    }
}
