//! Relation attributes of one primary record.
//!
//! [`RelationBehavior`] is the registry the surrounding layer talks to:
//! `set` records desired keys, `get` returns them (or reads through to
//! storage), and `save_relations` flushes every dirty attribute after the
//! primary record has been inserted or updated.

use crate::config::{FieldConfig, RelationsConfig};
use crate::descriptor::{DescriptorLayout, RelationDescriptor, RelationKind, SyncTarget};
use crate::many_to_many::{ManyToManySync, sync_many_to_many};
use crate::one_to_many::{OneToManySync, sync_one_to_many};
use crate::pending::{PendingValues, keys_from_value};
use crate::shape::PrimaryRecord;
use crate::store::RelationStore;
use relsync_core::{ConfigErrorKind, Cx, Error, Outcome, Result, Value, validate_identifier};
use std::collections::HashMap;

/// Counts of one flushed relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCounts {
    /// Junction rows written.
    ManyToMany(ManyToManySync),
    /// Foreign keys rewritten.
    OneToMany(OneToManySync),
}

/// One flushed attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSync {
    /// Configured attribute name.
    pub attribute: String,
    /// Relation name on the owner.
    pub relation: String,
    /// Rows written.
    pub counts: SyncCounts,
}

impl RelationSync {
    /// Kind of the flushed relation.
    pub fn kind(&self) -> RelationKind {
        match self.counts {
            SyncCounts::ManyToMany(_) => RelationKind::ManyToMany,
            SyncCounts::OneToMany(_) => RelationKind::OneToMany,
        }
    }
}

/// Result of [`RelationBehavior::save_relations`], in save order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Flushed attributes.
    pub relations: Vec<RelationSync>,
}

impl SaveReport {
    /// Whether nothing was flushed.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Entry of one attribute.
    pub fn get(&self, attribute: &str) -> Option<&RelationSync> {
        self.relations.iter().find(|r| r.attribute == attribute)
    }
}

#[derive(Debug, Clone)]
struct FieldBinding {
    attribute: String,
    accessor: FieldConfig,
}

/// Relation attributes of a primary record, and their pending values.
#[derive(Debug)]
pub struct RelationBehavior {
    config: RelationsConfig,
    fields: HashMap<String, FieldBinding>,
    pending: PendingValues,
}

impl RelationBehavior {
    /// Register every configured attribute and derived field.
    ///
    /// Fails on derived-name collisions and on column names that are not
    /// plain identifiers.
    #[allow(clippy::result_large_err)]
    pub fn new(config: RelationsConfig) -> Result<Self> {
        let mut fields: HashMap<String, FieldBinding> = HashMap::new();
        let mut register = |name: String, binding: FieldBinding| {
            if fields.contains_key(&name) {
                return Err(Error::config(
                    ConfigErrorKind::AmbiguousField,
                    format!("ambiguous field name definition: {name}"),
                ));
            }
            fields.insert(name, binding);
            Ok(())
        };

        for (attribute, relation) in config.iter() {
            for (column, _) in relation.via_table_values() {
                validate_identifier("junction column", column)?;
            }
            for (column, _) in relation.delete_conditions() {
                validate_identifier("junction column", column)?;
            }

            register(
                attribute.to_string(),
                FieldBinding {
                    attribute: attribute.to_string(),
                    accessor: relation.accessor.clone(),
                },
            )?;
            for (suffix, field) in &relation.fields {
                register(
                    format!("{attribute}_{suffix}"),
                    FieldBinding {
                        attribute: attribute.to_string(),
                        accessor: field.clone(),
                    },
                )?;
            }
        }

        tracing::debug!(
            attributes = config.len(),
            fields = fields.len(),
            "Registered relation attributes"
        );

        Ok(Self {
            config,
            fields,
            pending: PendingValues::new(),
        })
    }

    /// The configuration this behavior was built from.
    pub fn config(&self) -> &RelationsConfig {
        &self.config
    }

    /// Whether `name` is a registered attribute or derived field.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    #[allow(clippy::result_large_err)]
    fn binding(&self, name: &str) -> Result<&FieldBinding> {
        self.fields.get(name).ok_or_else(|| {
            Error::config(
                ConfigErrorKind::UnknownAttribute,
                format!("parameter {name:?} does not exist"),
            )
        })
    }

    /// Assign desired keys through an attribute or derived field.
    ///
    /// Nothing touches storage until [`save_relations`](Self::save_relations).
    #[allow(clippy::result_large_err)]
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let binding = self.binding(name)?;
        let value = match &binding.accessor.set {
            Some(transform) => transform.apply(value.into())?,
            None => value.into(),
        };
        let keys = keys_from_value(value)?;
        let attribute = binding.attribute.clone();

        tracing::debug!(field = name, attribute = %attribute, keys = keys.len(), "Set relation value");
        self.pending.set(attribute, keys);
        Ok(())
    }

    /// Read an attribute or derived field.
    ///
    /// A pending value wins; otherwise the current keys are read from the
    /// store. The field's get transform is applied to the key list.
    pub async fn get<S: RelationStore>(
        &self,
        cx: &Cx,
        store: &S,
        owner: &dyn PrimaryRecord,
        name: &str,
    ) -> Outcome<Value, Error> {
        let binding = match self.binding(name) {
            Ok(binding) => binding,
            Err(e) => return Outcome::Err(e),
        };

        let value = if let Some(keys) = self.pending.get(&binding.attribute) {
            Value::Array(keys.to_values())
        } else {
            match self.read_current(cx, store, owner, &binding.attribute).await {
                Outcome::Ok(value) => value,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        };

        match &binding.accessor.get {
            Some(transform) => match transform.apply(value) {
                Ok(value) => Outcome::Ok(value),
                Err(e) => Outcome::Err(e),
            },
            None => Outcome::Ok(value),
        }
    }

    async fn read_current<S: RelationStore>(
        &self,
        cx: &Cx,
        store: &S,
        owner: &dyn PrimaryRecord,
        attribute: &str,
    ) -> Outcome<Value, Error> {
        let Some(relation) = self.config.get(attribute) else {
            return Outcome::Err(Error::config(
                ConfigErrorKind::UnknownAttribute,
                format!("parameter {attribute:?} does not exist"),
            ));
        };
        let descriptor = match RelationDescriptor::for_owner(owner, attribute, relation) {
            Ok(descriptor) => descriptor,
            Err(e) => return Outcome::Err(e),
        };
        let owner_key = match scalar_primary_key(owner) {
            Ok(Value::Null) => return Outcome::Ok(Value::Array(Vec::new())),
            Ok(key) => key,
            Err(e) => return Outcome::Err(e),
        };

        let rows = match store.select(cx, &descriptor.related_keys(&owner_key)).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let column = descriptor.related_key_column();
        let mut keys = Vec::with_capacity(rows.len());
        for row in &rows {
            match row.get_named(column) {
                Ok(value) => keys.push(value.clone()),
                Err(e) => return Outcome::Err(e),
            }
        }
        tracing::trace!(attribute = attribute, keys = keys.len(), "Read current relation keys");
        Outcome::Ok(Value::Array(keys))
    }

    /// Whether an attribute has a pending value.
    pub fn is_dirty(&self, attribute: &str) -> bool {
        self.pending.contains(attribute)
    }

    /// Attributes with pending values, in save order.
    pub fn pending_attributes(&self) -> Vec<&str> {
        self.config
            .iter()
            .map(|(attribute, _)| attribute)
            .filter(|attribute| self.pending.contains(attribute))
            .collect()
    }

    /// Drop the pending value of one attribute (or of the attribute behind a
    /// derived field). Returns whether anything was pending.
    #[allow(clippy::result_large_err)]
    pub fn discard(&mut self, name: &str) -> Result<bool> {
        let attribute = self.binding(name)?.attribute.clone();
        Ok(self.pending.remove(&attribute).is_some())
    }

    /// Drop every pending value.
    pub fn reset(&mut self) {
        if !self.pending.is_empty() {
            tracing::warn!(dropped = self.pending.len(), "Discarding pending relation values");
        }
        self.pending.clear();
    }

    /// Flush every dirty attribute, one transaction per relation, in
    /// configuration order.
    ///
    /// A composite primary key fails before anything is read or written. On
    /// a failure, relations flushed earlier stay committed and the failing
    /// attribute keeps its pending value.
    #[tracing::instrument(level = "debug", skip_all, fields(table = owner.table_name()))]
    pub async fn save_relations<S: RelationStore>(
        &mut self,
        cx: &Cx,
        store: &S,
        owner: &dyn PrimaryRecord,
    ) -> Outcome<SaveReport, Error> {
        let owner_key = match scalar_primary_key(owner) {
            Ok(key) => key,
            Err(e) => return Outcome::Err(e),
        };

        let mut report = SaveReport::default();
        if self.pending.is_empty() {
            return Outcome::Ok(report);
        }
        if owner_key.is_null() {
            return Outcome::Err(Error::config(
                ConfigErrorKind::MissingPrimaryKey,
                format!("{:?} record has no primary key value", owner.table_name()),
            ));
        }

        for (attribute, relation) in self.config.iter() {
            let Some(desired) = self.pending.get(attribute) else {
                continue;
            };

            let descriptor = match RelationDescriptor::for_owner(owner, attribute, relation) {
                Ok(descriptor) => descriptor,
                Err(e) => return Outcome::Err(e),
            };
            let target = SyncTarget::new(owner, &owner_key, &descriptor);

            let counts = match &descriptor.layout {
                DescriptorLayout::ManyToMany(m2m) => {
                    match sync_many_to_many(cx, store, target, m2m, desired).await {
                        Outcome::Ok(sync) => SyncCounts::ManyToMany(sync),
                        Outcome::Err(e) => return Outcome::Err(e),
                        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                        Outcome::Panicked(p) => return Outcome::Panicked(p),
                    }
                }
                DescriptorLayout::OneToMany(o2m) => {
                    match sync_one_to_many(cx, store, target, o2m, desired).await {
                        Outcome::Ok(sync) => SyncCounts::OneToMany(sync),
                        Outcome::Err(e) => return Outcome::Err(e),
                        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                        Outcome::Panicked(p) => return Outcome::Panicked(p),
                    }
                }
            };

            tracing::info!(
                attribute = attribute,
                relation = %descriptor.relation_name,
                counts = ?counts,
                "Saved relation"
            );
            self.pending.remove(attribute);
            report.relations.push(RelationSync {
                attribute: attribute.to_string(),
                relation: descriptor.relation_name.clone(),
                counts,
            });
        }

        Outcome::Ok(report)
    }
}

/// The owner's single key value; NULL when it has not been assigned yet.
#[allow(clippy::result_large_err)]
fn scalar_primary_key(owner: &dyn PrimaryRecord) -> Result<Value> {
    let mut key = owner.primary_key_value();
    if key.len() != 1 {
        return Err(Error::config(
            ConfigErrorKind::CompositePrimaryKey,
            format!(
                "composite primary keys are not supported ({:?} has {} key columns)",
                owner.table_name(),
                key.len()
            ),
        ));
    }
    Ok(key.remove(0))
}
