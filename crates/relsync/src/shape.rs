//! The primary record and the physical shape of its relations.
//!
//! The data-access layer describes each relation once, as plain table and
//! column names. Nothing here talks to storage; the descriptor module turns
//! a shape plus configuration into something an updater can execute.

use relsync_core::Value;

/// A persisted row that owns relation attributes.
///
/// Implemented by the surrounding data-access layer for each model that
/// participates in relation synchronization.
pub trait PrimaryRecord: Send + Sync {
    /// Table the record lives in.
    fn table_name(&self) -> &str;

    /// Primary key value(s). A single element for a scalar key.
    fn primary_key_value(&self) -> Vec<Value>;

    /// Shape of the named relation, if the record declares it.
    fn relation(&self, name: &str) -> Option<RelationShape>;

    /// Current value of an ordinary column, for computed value providers.
    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// How the related table is reached from the primary record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationLink {
    /// The related table holds a column pointing at the primary record.
    ForeignKey {
        /// Column on the related table (e.g. `"book_id"`). It stores the
        /// owner's primary key value.
        column: String,
    },
    /// Rows are linked through a junction table.
    Junction(LinkTableInfo),
    /// No link the engine understands.
    None,
}

/// Junction table definition for many-to-many relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTableInfo {
    /// The junction table name (e.g. `"book_has_author"`).
    pub table_name: String,

    /// Column in the junction table pointing to the primary record.
    pub local_column: String,

    /// Column in the junction table pointing to the related record.
    pub remote_column: String,

    /// Composite local key columns. Set only for composite links.
    pub local_columns: Option<Vec<String>>,

    /// Composite remote key columns. Set only for composite links.
    pub remote_columns: Option<Vec<String>>,
}

impl LinkTableInfo {
    /// Create a single-column junction definition.
    #[must_use]
    pub fn new(
        table_name: impl Into<String>,
        local_column: impl Into<String>,
        remote_column: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            local_column: local_column.into(),
            remote_column: remote_column.into(),
            local_columns: None,
            remote_columns: None,
        }
    }

    /// Create a composite junction definition.
    ///
    /// The engine rejects these at resolution time; the constructor exists so
    /// data-access layers can describe every shape they have.
    #[must_use]
    pub fn composite(
        table_name: impl Into<String>,
        local_columns: Vec<String>,
        remote_columns: Vec<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            local_column: String::new(),
            remote_column: String::new(),
            local_columns: Some(local_columns),
            remote_columns: Some(remote_columns),
        }
    }

    /// Whether either side uses more than one column.
    pub fn is_composite(&self) -> bool {
        self.local_columns.is_some() || self.remote_columns.is_some()
    }
}

/// Physical description of one relation, as reported by the data-access layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationShape {
    /// Relation name on the primary record (e.g. `"authors"`).
    pub name: String,
    /// Table of the related records.
    pub related_table: String,
    /// Primary key column(s) of the related table.
    pub related_primary_key: Vec<String>,
    /// Whether the relation yields many records.
    pub multiple: bool,
    /// How the related table is reached.
    pub link: RelationLink,
}

impl RelationShape {
    /// A many-to-many relation through a junction table.
    pub fn many_to_many(
        name: impl Into<String>,
        related_table: impl Into<String>,
        related_primary_key: impl Into<String>,
        junction: LinkTableInfo,
    ) -> Self {
        Self {
            name: name.into(),
            related_table: related_table.into(),
            related_primary_key: vec![related_primary_key.into()],
            multiple: true,
            link: RelationLink::Junction(junction),
        }
    }

    /// A one-to-many relation where the related table holds the foreign key.
    pub fn one_to_many(
        name: impl Into<String>,
        related_table: impl Into<String>,
        related_primary_key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            related_table: related_table.into(),
            related_primary_key: vec![related_primary_key.into()],
            multiple: true,
            link: RelationLink::ForeignKey {
                column: foreign_key.into(),
            },
        }
    }

    /// Replace the related primary key columns.
    #[must_use]
    pub fn with_related_primary_key(mut self, columns: Vec<String>) -> Self {
        self.related_primary_key = columns;
        self
    }

    /// Mark the relation as yielding a single record.
    #[must_use]
    pub fn single(mut self) -> Self {
        self.multiple = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_table_composite_flag() {
        let simple = LinkTableInfo::new("book_has_author", "book_id", "author_id");
        assert!(!simple.is_composite());

        let composite = LinkTableInfo::composite(
            "book_has_author",
            vec!["book_id".into(), "edition".into()],
            vec!["author_id".into()],
        );
        assert!(composite.is_composite());
        assert!(composite.local_column.is_empty());
    }

    #[test]
    fn test_shape_constructors() {
        let m2m = RelationShape::many_to_many(
            "authors",
            "author",
            "id",
            LinkTableInfo::new("book_has_author", "book_id", "author_id"),
        );
        assert!(m2m.multiple);
        assert_eq!(m2m.related_primary_key, vec!["id".to_string()]);

        let o2m = RelationShape::one_to_many("reviews", "review", "id", "book_id").single();
        assert!(!o2m.multiple);
        assert_eq!(
            o2m.link,
            RelationLink::ForeignKey {
                column: "book_id".into()
            }
        );
    }
}
