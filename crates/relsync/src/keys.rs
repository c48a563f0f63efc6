//! Related primary keys and ordered key sets.

use relsync_core::{Error, Result, TypeError, Value};
use std::collections::HashSet;

/// Hashable identity of a key.
///
/// Integers of every width, booleans and canonical integer text collapse to
/// `Int`, so `7`, `7_i32` and `"7"` name the same related row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyRepr {
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl KeyRepr {
    fn of(value: &Value) -> Option<Self> {
        if let Some(i) = value.as_canonical_i64() {
            return Some(KeyRepr::Int(i));
        }
        match value {
            Value::Bool(b) => Some(KeyRepr::Int(i64::from(*b))),
            Value::Text(s) => Some(KeyRepr::Text(s.clone())),
            Value::Bytes(b) => Some(KeyRepr::Bytes(b.clone())),
            _ => None,
        }
    }
}

/// A related record's primary key value.
///
/// Equality and hashing use the normalized identity; [`RelatedKey::value`]
/// keeps the value exactly as supplied so statements bind what the caller
/// or the database handed in.
#[derive(Debug, Clone)]
pub struct RelatedKey {
    value: Value,
    repr: KeyRepr,
}

impl RelatedKey {
    /// Wrap a scalar key. NULL, floats, JSON and arrays are rejected.
    #[allow(clippy::result_large_err)]
    pub fn new(value: Value) -> Result<Self> {
        match KeyRepr::of(&value) {
            Some(repr) => Ok(Self { value, repr }),
            None => Err(Error::Type(TypeError {
                expected: "integer, text or bytes key",
                actual: value.type_name().to_string(),
                column: None,
            })),
        }
    }

    /// The key as supplied.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl PartialEq for RelatedKey {
    fn eq(&self, other: &Self) -> bool {
        self.repr == other.repr
    }
}

impl Eq for RelatedKey {}

impl std::hash::Hash for RelatedKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.repr.hash(state);
    }
}

/// An insertion-ordered set of related keys.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<RelatedKey>,
    index: HashSet<KeyRepr>,
}

impl KeySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from raw values; duplicates collapse to the first occurrence.
    #[allow(clippy::result_large_err)]
    pub fn from_values<I>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut set = Self::new();
        for value in values {
            set.insert(RelatedKey::new(value)?);
        }
        Ok(set)
    }

    /// Add a key. Returns `false` if an equal key was already present.
    pub fn insert(&mut self, key: RelatedKey) -> bool {
        if self.index.insert(key.repr.clone()) {
            self.keys.push(key);
            true
        } else {
            false
        }
    }

    /// Whether an equal key is present.
    pub fn contains(&self, key: &RelatedKey) -> bool {
        self.index.contains(&key.repr)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &RelatedKey> {
        self.keys.iter()
    }

    /// Keys of `self` not in `other`, in `self`'s order.
    pub fn difference(&self, other: &KeySet) -> KeySet {
        self.filtered(|key| !other.contains(key))
    }

    /// Keys of `self` also in `other`, in `self`'s order.
    pub fn intersection(&self, other: &KeySet) -> KeySet {
        self.filtered(|key| other.contains(key))
    }

    /// Whether both sets hold the same keys, ignoring order.
    pub fn same_keys(&self, other: &KeySet) -> bool {
        self.len() == other.len() && self.keys.iter().all(|key| other.contains(key))
    }

    /// Cloned values in insertion order.
    pub fn to_values(&self) -> Vec<Value> {
        self.keys.iter().map(|key| key.value.clone()).collect()
    }

    fn filtered(&self, keep: impl Fn(&RelatedKey) -> bool) -> KeySet {
        let mut out = KeySet::new();
        for key in self.keys.iter().filter(|&key| keep(key)) {
            out.insert(key.clone());
        }
        out
    }
}

impl IntoIterator for KeySet {
    type Item = RelatedKey;
    type IntoIter = std::vec::IntoIter<RelatedKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.into_iter()
    }
}
