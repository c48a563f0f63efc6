//! Pending relation values.
//!
//! An attribute with an entry here is dirty and will be flushed on the next
//! save. An entry holding an empty [`KeySet`] clears the relation; no entry
//! leaves it alone.

use crate::keys::KeySet;
use relsync_core::{Result, Value};
use std::collections::HashMap;

/// Desired key sets per attribute.
#[derive(Debug, Clone, Default)]
pub struct PendingValues {
    values: HashMap<String, KeySet>,
}

impl PendingValues {
    /// No pending values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the desired keys for an attribute, replacing any earlier value.
    pub fn set(&mut self, attribute: impl Into<String>, keys: KeySet) {
        self.values.insert(attribute.into(), keys);
    }

    /// Desired keys for an attribute, if it is dirty.
    pub fn get(&self, attribute: &str) -> Option<&KeySet> {
        self.values.get(attribute)
    }

    /// Whether the attribute is dirty.
    pub fn contains(&self, attribute: &str) -> bool {
        self.values.contains_key(attribute)
    }

    /// Drop and return the pending value of an attribute.
    pub fn remove(&mut self, attribute: &str) -> Option<KeySet> {
        self.values.remove(attribute)
    }

    /// Drop every pending value.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Number of dirty attributes.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is dirty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Interpret an assigned attribute value as a key list.
///
/// Arrays yield their elements; NULL and the empty string clear the
/// relation; any other scalar is a single key.
#[allow(clippy::result_large_err)]
pub fn keys_from_value(value: Value) -> Result<KeySet> {
    match value {
        Value::Array(items) => KeySet::from_values(items),
        Value::Null => Ok(KeySet::new()),
        Value::Text(s) if s.is_empty() => Ok(KeySet::new()),
        scalar => KeySet::from_values([scalar]),
    }
}
