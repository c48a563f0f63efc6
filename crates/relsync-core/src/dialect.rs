//! SQL dialects.

/// SQL dialect for generating dialect-specific SQL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL dialect (uses $1, $2 placeholders)
    #[default]
    Postgres,
    /// SQLite dialect (uses ?1, ?2 placeholders)
    Sqlite,
    /// MySQL dialect (uses ? placeholders)
    Mysql,
}

impl Dialect {
    /// Generate a placeholder for the given parameter index (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    /// Quote an identifier for this dialect.
    ///
    /// A dotted name (`schema.table`) is quoted part by part. Embedded quote
    /// characters are doubled.
    pub fn quote_identifier(self, name: &str) -> String {
        name.split('.')
            .map(|part| match self {
                Dialect::Postgres | Dialect::Sqlite => crate::identifiers::quote_ident(part),
                Dialect::Mysql => crate::identifiers::quote_ident_mysql(part),
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::Sqlite.placeholder(3), "?3");
        assert_eq!(Dialect::Mysql.placeholder(3), "?");
    }

    #[test]
    fn test_quote_dotted_identifier() {
        assert_eq!(
            Dialect::Postgres.quote_identifier("public.book_has_author"),
            "\"public\".\"book_has_author\""
        );
        assert_eq!(Dialect::Mysql.quote_identifier("book"), "`book`");
    }
}
