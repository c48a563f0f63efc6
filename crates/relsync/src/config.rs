//! Relation attribute configuration.
//!
//! Two surfaces produce the same [`RelationsConfig`]:
//!
//! - the builder API, where transforms and value providers are closures;
//! - [`RawRelationsConfig`], deserialized with serde, where transforms are
//!   names looked up in a [`TransformRegistry`] and values are JSON constants.
//!
//! Attribute order is preserved on both surfaces. It decides the order in
//! which relations are saved and in which derived field names are checked
//! for collisions.

use crate::shape::PrimaryRecord;
use relsync_core::{ConfigErrorKind, Error, Result, TypeError, Value};
use serde::Deserialize;
use serde::de::{Deserializer, MapAccess, Visitor};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

type TransformFn = dyn Fn(Value) -> Result<Value> + Send + Sync;
type DefaultFn = dyn Fn(&ProviderContext<'_>) -> Result<Value> + Send + Sync;
type ColumnFn = dyn Fn(&ColumnContext<'_>) -> Result<Value> + Send + Sync;

/// A get or set transform applied to an attribute value.
#[derive(Clone)]
pub struct Transform(Arc<TransformFn>);

impl Transform {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Apply the transform.
    #[allow(clippy::result_large_err)]
    pub fn apply(&self, value: Value) -> Result<Value> {
        (self.0)(value)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform(<fn>)")
    }
}

/// What a one-to-many default provider can see.
pub struct ProviderContext<'a> {
    /// The record whose relation is being saved.
    pub owner: &'a dyn PrimaryRecord,
    /// Relation name on the owner.
    pub relation_name: &'a str,
    /// Configured attribute name.
    pub attribute_name: &'a str,
}

/// What a junction extra-column provider can see.
pub struct ColumnContext<'a> {
    /// The record whose relation is being saved.
    pub owner: &'a dyn PrimaryRecord,
    /// Relation name on the owner.
    pub relation_name: &'a str,
    /// Configured attribute name.
    pub attribute_name: &'a str,
    /// Junction column being computed.
    pub column: &'a str,
    /// Related key of the junction row.
    pub related_key: &'a Value,
    /// `true` when the row is about to be inserted, `false` when refreshed.
    pub is_new_record: bool,
}

/// Value written to a one-to-many foreign key when a row is detached.
#[derive(Clone, Default)]
pub enum DefaultValue {
    /// NULL.
    #[default]
    Null,
    /// A fixed value.
    Constant(Value),
    /// Computed from the owner, relation and attribute.
    Computed(Arc<DefaultFn>),
}

impl DefaultValue {
    /// A computed default.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&ProviderContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        DefaultValue::Computed(Arc::new(f))
    }

    /// Produce the value for a save.
    #[allow(clippy::result_large_err)]
    pub fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Value> {
        match self {
            DefaultValue::Null => Ok(Value::Null),
            DefaultValue::Constant(value) => Ok(value.clone()),
            DefaultValue::Computed(f) => f(ctx),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Null => f.write_str("Null"),
            DefaultValue::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            DefaultValue::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

impl From<Value> for DefaultValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => DefaultValue::Null,
            other => DefaultValue::Constant(other),
        }
    }
}

/// Value of an extra junction column.
#[derive(Clone)]
pub enum ColumnValue {
    /// A fixed value.
    Constant(Value),
    /// Computed per junction row.
    Computed(Arc<ColumnFn>),
}

impl ColumnValue {
    /// A computed column value.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&ColumnContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        ColumnValue::Computed(Arc::new(f))
    }

    /// Produce the value for one junction row.
    #[allow(clippy::result_large_err)]
    pub fn resolve(&self, ctx: &ColumnContext<'_>) -> Result<Value> {
        match self {
            ColumnValue::Constant(value) => Ok(value.clone()),
            ColumnValue::Computed(f) => f(ctx),
        }
    }
}

impl fmt::Debug for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            ColumnValue::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

impl From<Value> for ColumnValue {
    fn from(value: Value) -> Self {
        ColumnValue::Constant(value)
    }
}

/// Transforms of one accessor (the primary attribute or a derived field).
#[derive(Debug, Clone, Default)]
pub struct FieldConfig {
    pub(crate) get: Option<Transform>,
    pub(crate) set: Option<Transform>,
}

impl FieldConfig {
    /// No transforms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform applied to the key list on read.
    pub fn get<F>(self, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.get_transform(Transform::new(f))
    }

    /// Transform applied to the assigned value on write.
    pub fn set<F>(self, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.set_transform(Transform::new(f))
    }

    /// Use an existing transform on read.
    pub fn get_transform(mut self, transform: Transform) -> Self {
        self.get = Some(transform);
        self
    }

    /// Use an existing transform on write.
    pub fn set_transform(mut self, transform: Transform) -> Self {
        self.set = Some(transform);
        self
    }
}

/// Configuration of one relation attribute.
#[derive(Debug, Clone)]
pub struct RelationConfig {
    pub(crate) relation: String,
    pub(crate) accessor: FieldConfig,
    pub(crate) default: DefaultValue,
    pub(crate) via_table_values: Vec<(String, ColumnValue)>,
    pub(crate) delete_condition: Vec<(String, Value)>,
    pub(crate) fields: Vec<(String, FieldConfig)>,
}

impl RelationConfig {
    /// Bind an attribute to the named relation of the primary record.
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            accessor: FieldConfig::default(),
            default: DefaultValue::Null,
            via_table_values: Vec::new(),
            delete_condition: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Read transform of the attribute itself.
    pub fn get<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.accessor = self.accessor.get(f);
        self
    }

    /// Write transform of the attribute itself.
    pub fn set<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.accessor = self.accessor.set(f);
        self
    }

    /// Foreign key value for detached one-to-many rows.
    pub fn default_value(mut self, default: impl Into<DefaultValue>) -> Self {
        self.default = default.into();
        self
    }

    /// Extra junction column written alongside each many-to-many link.
    pub fn via_table_value(mut self, column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.via_table_values.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.via_table_values.push((column, value)),
        }
        self
    }

    /// Additional junction filter applied when reading and deleting links.
    ///
    /// Arrays match any of their elements; NULL matches `IS NULL`.
    pub fn delete_condition(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.delete_condition.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.delete_condition.push((column, value)),
        }
        self
    }

    /// Register `<attribute>_<suffix>` as another accessor of this relation.
    pub fn field(mut self, suffix: impl Into<String>, field: FieldConfig) -> Self {
        self.fields.push((suffix.into(), field));
        self
    }

    /// Relation name on the primary record.
    pub fn relation_name(&self) -> &str {
        &self.relation
    }

    /// Configured one-to-many default.
    pub fn default(&self) -> &DefaultValue {
        &self.default
    }

    /// Extra junction columns, in configuration order.
    pub fn via_table_values(&self) -> &[(String, ColumnValue)] {
        &self.via_table_values
    }

    /// Junction scope filter, in configuration order.
    pub fn delete_conditions(&self) -> &[(String, Value)] {
        &self.delete_condition
    }
}

impl From<&str> for RelationConfig {
    fn from(relation: &str) -> Self {
        RelationConfig::new(relation)
    }
}

impl From<String> for RelationConfig {
    fn from(relation: String) -> Self {
        RelationConfig::new(relation)
    }
}

/// All relation attributes of a model, in save order.
#[derive(Debug, Clone, Default)]
pub struct RelationsConfig {
    relations: Vec<(String, RelationConfig)>,
}

impl RelationsConfig {
    /// Empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure an attribute. Re-configuring an attribute replaces it in place.
    pub fn relation(mut self, attribute: impl Into<String>, config: impl Into<RelationConfig>) -> Self {
        let attribute = attribute.into();
        let config = config.into();
        match self.relations.iter_mut().find(|(a, _)| *a == attribute) {
            Some(slot) => slot.1 = config,
            None => self.relations.push((attribute, config)),
        }
        self
    }

    /// Configuration of one attribute.
    pub fn get(&self, attribute: &str) -> Option<&RelationConfig> {
        self.relations
            .iter()
            .find(|(a, _)| a == attribute)
            .map(|(_, c)| c)
    }

    /// Attributes and their configuration, in save order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RelationConfig)> {
        self.relations.iter().map(|(a, c)| (a.as_str(), c))
    }

    /// Number of configured attributes.
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// Whether nothing is configured.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

// ============================================================================
// Named transforms
// ============================================================================

/// Transforms addressable by name from deserialized configuration.
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    transforms: HashMap<String, Transform>,
}

impl TransformRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `json_encode`, `json_decode`, `implode` and `explode`.
    pub fn with_builtins() -> Self {
        Self::new()
            .register("json_encode", json_encode)
            .register("json_decode", json_decode)
            .register("implode", implode)
            .register("explode", explode)
    }

    /// Register (or replace) a named transform.
    pub fn register<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.transforms.insert(name.into(), Transform::new(f));
        self
    }

    /// Look up a transform.
    pub fn get(&self, name: &str) -> Option<&Transform> {
        self.transforms.get(name)
    }

    /// Look up a transform, failing for unknown names.
    #[allow(clippy::result_large_err)]
    pub fn resolve(&self, name: &str) -> Result<Transform> {
        self.get(name).cloned().ok_or_else(|| {
            Error::config(
                ConfigErrorKind::NotCallable,
                format!("value is not a function: {name:?}"),
            )
        })
    }
}

fn key_text(value: &Value) -> Result<String> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        Value::Int(v) => Ok(v.to_string()),
        Value::BigInt(v) => Ok(v.to_string()),
        Value::Bool(b) => Ok(i64::from(*b).to_string()),
        other => Err(Error::Type(TypeError {
            expected: "integer or text",
            actual: other.type_name().to_string(),
            column: None,
        })),
    }
}

/// Encode any value as a JSON string.
#[allow(clippy::result_large_err, clippy::needless_pass_by_value)]
pub fn json_encode(value: Value) -> Result<Value> {
    Ok(Value::Text(serde_json::to_string(&value.to_json())?))
}

/// Decode a JSON string. NULL passes through.
#[allow(clippy::result_large_err)]
pub fn json_decode(value: Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Text(s) => {
            let json: serde_json::Value = serde_json::from_str(&s)?;
            Ok(Value::from_json(&json))
        }
        other => Err(Error::Type(TypeError {
            expected: "JSON text",
            actual: other.type_name().to_string(),
            column: None,
        })),
    }
}

/// Join a key list with commas.
#[allow(clippy::result_large_err)]
pub fn implode(value: Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Text(String::new())),
        Value::Array(items) => {
            let parts = items.iter().map(key_text).collect::<Result<Vec<_>>>()?;
            Ok(Value::Text(parts.join(",")))
        }
        other => key_text(&other).map(Value::Text),
    }
}

/// Split comma-separated text into a key list. The empty string is the empty list.
#[allow(clippy::result_large_err)]
pub fn explode(value: Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Array(Vec::new())),
        Value::Text(s) if s.is_empty() => Ok(Value::Array(Vec::new())),
        Value::Text(s) => Ok(Value::Array(
            s.split(',').map(|part| Value::Text(part.to_string())).collect(),
        )),
        Value::Array(items) => Ok(Value::Array(items)),
        other => Err(Error::Type(TypeError {
            expected: "comma-separated text",
            actual: other.type_name().to_string(),
            column: None,
        })),
    }
}

// ============================================================================
// Serde surface
// ============================================================================

/// A JSON object kept in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries: Vec<(String, V)> = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    if entries.iter().any(|(k, _)| *k == key) {
                        return Err(serde::de::Error::custom(format!("duplicate key {key:?}")));
                    }
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// Deserialized accessor transforms, by name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawFieldConfig {
    #[serde(default)]
    pub get: Option<String>,
    #[serde(default)]
    pub set: Option<String>,
}

/// Deserialized configuration of one attribute.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRelationConfig {
    pub relation: String,
    #[serde(default)]
    pub get: Option<String>,
    #[serde(default)]
    pub set: Option<String>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub via_table_values: OrderedMap<serde_json::Value>,
    #[serde(default)]
    pub custom_delete_condition: OrderedMap<serde_json::Value>,
    #[serde(default)]
    pub fields: OrderedMap<RawFieldConfig>,
}

/// An attribute bound either by relation name alone or with options.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawRelation {
    /// `"attribute": "relation"`
    Name(String),
    /// `"attribute": { "relation": ..., ... }`
    Detailed(RawRelationConfig),
}

/// Deserializable relation configuration.
///
/// ```rust,ignore
/// let raw: RawRelationsConfig = serde_json::from_str(r#"{
///     "author_ids": { "relation": "authors", "fields": { "list": { "get": "implode", "set": "explode" } } },
///     "review_ids": "reviews"
/// }"#)?;
/// let config = raw.resolve(&TransformRegistry::with_builtins())?;
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RawRelationsConfig {
    pub relations: OrderedMap<RawRelation>,
}

impl RawRelationsConfig {
    /// Parse from a JSON document.
    #[allow(clippy::result_large_err)]
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve transform names and JSON constants.
    #[allow(clippy::result_large_err)]
    pub fn resolve(&self, registry: &TransformRegistry) -> Result<RelationsConfig> {
        let mut config = RelationsConfig::new();
        for (attribute, raw) in &self.relations.0 {
            let relation = match raw {
                RawRelation::Name(name) => RelationConfig::new(name.clone()),
                RawRelation::Detailed(detailed) => resolve_relation(detailed, registry)?,
            };
            config = config.relation(attribute.clone(), relation);
        }
        Ok(config)
    }
}

fn resolve_field(
    get: Option<&String>,
    set: Option<&String>,
    registry: &TransformRegistry,
) -> Result<FieldConfig> {
    let mut field = FieldConfig::new();
    if let Some(name) = get {
        field = field.get_transform(registry.resolve(name)?);
    }
    if let Some(name) = set {
        field = field.set_transform(registry.resolve(name)?);
    }
    Ok(field)
}

fn resolve_relation(raw: &RawRelationConfig, registry: &TransformRegistry) -> Result<RelationConfig> {
    let mut relation = RelationConfig::new(raw.relation.clone());
    relation.accessor = resolve_field(raw.get.as_ref(), raw.set.as_ref(), registry)?;

    if let Some(default) = &raw.default {
        relation.default = DefaultValue::from(Value::from_json(default));
    }
    for (column, value) in &raw.via_table_values.0 {
        relation = relation.via_table_value(column.clone(), Value::from_json(value));
    }
    for (column, value) in &raw.custom_delete_condition.0 {
        relation = relation.delete_condition(column.clone(), Value::from_json(value));
    }
    for (suffix, field) in &raw.fields.0 {
        relation = relation.field(
            suffix.clone(),
            resolve_field(field.get.as_ref(), field.set.as_ref(), registry)?,
        );
    }
    Ok(relation)
}
