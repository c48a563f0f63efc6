//! Relation descriptors: configuration plus shape, resolved once per save.

use crate::config::{ColumnValue, DefaultValue, RelationConfig};
use crate::shape::{PrimaryRecord, RelationLink, RelationShape};
use relsync_core::{ConfigErrorKind, Error, Result, Value, validate_identifier};
use relsync_query::{Filter, Select};

/// Which updater a relation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Links live in a junction table.
    ManyToMany,
    /// Links live in a foreign key column of the related table.
    OneToMany,
}

/// Junction layout of a many-to-many relation.
#[derive(Debug, Clone)]
pub struct ManyToManyDescriptor {
    /// Junction table.
    pub junction_table: String,
    /// Junction column referencing the primary record.
    pub junction_column: String,
    /// Junction column referencing the related record.
    pub related_column: String,
    /// Extra junction columns and their providers.
    pub extra_columns: Vec<(String, ColumnValue)>,
    /// Additional filter applied when reading and deleting links.
    pub delete_scope: Vec<(String, Value)>,
}

impl ManyToManyDescriptor {
    /// `junction_column = owner_key` plus the delete scope.
    pub fn scope_filter(&self, owner_key: &Value) -> Filter {
        self.delete_scope.iter().fold(
            Filter::new().eq(self.junction_column.clone(), owner_key.clone()),
            |filter, (column, value)| filter.condition(column.clone(), value),
        )
    }

    /// Current links: the related column and every extra column.
    pub fn current_rows(&self, owner_key: &Value) -> Select {
        Select::from(self.junction_table.clone())
            .columns(std::iter::once(self.related_column.clone()))
            .columns(self.extra_columns.iter().map(|(column, _)| column.clone()))
            .filter(self.scope_filter(owner_key))
    }

    /// Current related keys only.
    pub fn related_keys(&self, owner_key: &Value) -> Select {
        Select::from(self.junction_table.clone())
            .columns([self.related_column.clone()])
            .filter(self.scope_filter(owner_key))
    }
}

/// Foreign key layout of a one-to-many relation.
#[derive(Debug, Clone)]
pub struct OneToManyDescriptor {
    /// Table of the related records.
    pub foreign_table: String,
    /// Column on the related table referencing the primary record.
    pub foreign_key_column: String,
    /// Primary key column of the related table.
    pub foreign_primary_key_column: String,
    /// Value written to detached rows.
    pub default_value: DefaultValue,
}

impl OneToManyDescriptor {
    /// Current related keys: rows whose foreign key points at the owner.
    pub fn related_keys(&self, owner_key: &Value) -> Select {
        Select::from(self.foreign_table.clone())
            .columns([self.foreign_primary_key_column.clone()])
            .filter(Filter::new().eq(self.foreign_key_column.clone(), owner_key.clone()))
    }
}

/// Kind-specific part of a descriptor.
#[derive(Debug, Clone)]
pub enum DescriptorLayout {
    /// Junction table layout.
    ManyToMany(ManyToManyDescriptor),
    /// Foreign key layout.
    OneToMany(OneToManyDescriptor),
}

/// A relation attribute ready to be read or reconciled.
#[derive(Debug, Clone)]
pub struct RelationDescriptor {
    /// Configured attribute name.
    pub attribute_name: String,
    /// Relation name on the primary record.
    pub relation_name: String,
    /// Physical layout.
    pub layout: DescriptorLayout,
}

impl RelationDescriptor {
    /// Relation kind.
    pub fn kind(&self) -> RelationKind {
        match self.layout {
            DescriptorLayout::ManyToMany(_) => RelationKind::ManyToMany,
            DescriptorLayout::OneToMany(_) => RelationKind::OneToMany,
        }
    }

    /// Query returning the current related keys in its first column.
    pub fn related_keys(&self, owner_key: &Value) -> Select {
        match &self.layout {
            DescriptorLayout::ManyToMany(m2m) => m2m.related_keys(owner_key),
            DescriptorLayout::OneToMany(o2m) => o2m.related_keys(owner_key),
        }
    }

    /// Column holding the related key in [`RelationDescriptor::related_keys`] rows.
    pub fn related_key_column(&self) -> &str {
        match &self.layout {
            DescriptorLayout::ManyToMany(m2m) => &m2m.related_column,
            DescriptorLayout::OneToMany(o2m) => &o2m.foreign_primary_key_column,
        }
    }

    /// Resolve an attribute against the owner's declared relations.
    #[allow(clippy::result_large_err)]
    pub fn for_owner(
        owner: &dyn PrimaryRecord,
        attribute: &str,
        config: &RelationConfig,
    ) -> Result<Self> {
        let shape = owner.relation(config.relation_name()).ok_or_else(|| {
            Error::config(
                ConfigErrorKind::UnknownRelation,
                format!(
                    "relation {:?} is not declared on {:?}",
                    config.relation_name(),
                    owner.table_name()
                ),
            )
        })?;
        Self::resolve(attribute, config, &shape)
    }

    /// Classify a relation shape and validate every identifier it names.
    #[allow(clippy::result_large_err)]
    pub fn resolve(attribute: &str, config: &RelationConfig, shape: &RelationShape) -> Result<Self> {
        let layout = match (&shape.link, shape.multiple) {
            (RelationLink::Junction(link), true) => {
                if link.is_composite() {
                    return Err(Error::config(
                        ConfigErrorKind::UnsupportedRelation,
                        format!("relation {:?} uses a composite junction link", shape.name),
                    ));
                }
                validate_identifier("junction table", &link.table_name)?;
                validate_identifier("junction column", &link.local_column)?;
                validate_identifier("junction column", &link.remote_column)?;
                for (column, _) in config.via_table_values() {
                    validate_identifier("junction column", column)?;
                }
                for (column, _) in config.delete_conditions() {
                    validate_identifier("junction column", column)?;
                }
                DescriptorLayout::ManyToMany(ManyToManyDescriptor {
                    junction_table: link.table_name.clone(),
                    junction_column: link.local_column.clone(),
                    related_column: link.remote_column.clone(),
                    extra_columns: config.via_table_values().to_vec(),
                    delete_scope: config.delete_conditions().to_vec(),
                })
            }
            (RelationLink::ForeignKey { column }, true) => {
                let [primary_key] = shape.related_primary_key.as_slice() else {
                    return Err(Error::config(
                        ConfigErrorKind::CompositePrimaryKey,
                        format!(
                            "related table {:?} must have a single-column primary key",
                            shape.related_table
                        ),
                    ));
                };
                validate_identifier("table", &shape.related_table)?;
                validate_identifier("foreign key column", column)?;
                validate_identifier("primary key column", primary_key)?;
                DescriptorLayout::OneToMany(OneToManyDescriptor {
                    foreign_table: shape.related_table.clone(),
                    foreign_key_column: column.clone(),
                    foreign_primary_key_column: primary_key.clone(),
                    default_value: config.default().clone(),
                })
            }
            _ => {
                return Err(Error::config(
                    ConfigErrorKind::UnsupportedRelation,
                    format!("relationship type not supported: {:?}", shape.name),
                ));
            }
        };

        tracing::trace!(
            attribute = attribute,
            relation = %shape.name,
            "Resolved relation descriptor"
        );

        Ok(Self {
            attribute_name: attribute.to_string(),
            relation_name: shape.name.clone(),
            layout,
        })
    }
}

/// The record and attribute a reconciliation runs for.
#[derive(Clone, Copy)]
pub struct SyncTarget<'a> {
    /// Owner of the relation.
    pub owner: &'a dyn PrimaryRecord,
    /// Owner's scalar primary key.
    pub owner_key: &'a Value,
    /// Configured attribute name.
    pub attribute_name: &'a str,
    /// Relation name on the owner.
    pub relation_name: &'a str,
}

impl<'a> SyncTarget<'a> {
    /// Target for a resolved descriptor.
    pub fn new(owner: &'a dyn PrimaryRecord, owner_key: &'a Value, descriptor: &'a RelationDescriptor) -> Self {
        Self {
            owner,
            owner_key,
            attribute_name: &descriptor.attribute_name,
            relation_name: &descriptor.relation_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::LinkTableInfo;

    fn authors() -> RelationShape {
        RelationShape::many_to_many(
            "authors",
            "author",
            "id",
            LinkTableInfo::new("book_has_author", "book_id", "author_id"),
        )
    }

    fn reviews() -> RelationShape {
        RelationShape::one_to_many("reviews", "review", "id", "book_id")
    }

    #[test]
    fn test_junction_resolves_many_to_many() {
        let config = RelationConfig::new("authors")
            .via_table_value("position", Value::BigInt(1))
            .delete_condition("kind", "main");
        let descriptor = RelationDescriptor::resolve("author_ids", &config, &authors()).unwrap();
        assert_eq!(descriptor.kind(), RelationKind::ManyToMany);
        assert_eq!(descriptor.related_key_column(), "author_id");

        let DescriptorLayout::ManyToMany(m2m) = &descriptor.layout else {
            panic!("expected many-to-many layout");
        };
        let (sql, params) = m2m
            .current_rows(&Value::BigInt(5))
            .build_with_dialect(relsync_core::Dialect::Postgres);
        assert_eq!(
            sql,
            "SELECT \"author_id\", \"position\" FROM \"book_has_author\" WHERE \"book_id\" = $1 AND \"kind\" = $2"
        );
        assert_eq!(params, vec![Value::BigInt(5), Value::from("main")]);
    }

    #[test]
    fn test_foreign_key_resolves_one_to_many() {
        let config = RelationConfig::new("reviews").default_value(Value::BigInt(7));
        let descriptor = RelationDescriptor::resolve("review_ids", &config, &reviews()).unwrap();
        assert_eq!(descriptor.kind(), RelationKind::OneToMany);
        let DescriptorLayout::OneToMany(o2m) = &descriptor.layout else {
            panic!("expected one-to-many layout");
        };
        assert_eq!(o2m.foreign_key_column, "book_id");
        assert!(matches!(
            o2m.default_value,
            DefaultValue::Constant(Value::BigInt(7))
        ));
    }

    #[test]
    fn test_singular_relation_unsupported() {
        let config = RelationConfig::new("reviews");
        let err = RelationDescriptor::resolve("review_ids", &config, &reviews().single()).unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnsupportedRelation));
        assert!(err.to_string().contains("relationship type not supported"));
    }

    #[test]
    fn test_composite_shapes_rejected() {
        let config = RelationConfig::new("reviews");
        let shape = reviews().with_related_primary_key(vec!["id".into(), "rev".into()]);
        let err = RelationDescriptor::resolve("review_ids", &config, &shape).unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::CompositePrimaryKey));

        let mut shape = authors();
        shape.link = RelationLink::Junction(LinkTableInfo::composite(
            "book_has_author",
            vec!["book_id".into(), "edition".into()],
            vec!["author_id".into()],
        ));
        let err = RelationDescriptor::resolve("author_ids", &RelationConfig::new("authors"), &shape)
            .unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnsupportedRelation));
    }

    #[test]
    fn test_bad_identifiers_rejected() {
        let config = RelationConfig::new("authors").via_table_value("pos; DROP", Value::BigInt(1));
        let err = RelationDescriptor::resolve("author_ids", &config, &authors()).unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::InvalidIdentifier));
    }
}
