//! An ordered attribute bag with change tracking.
//!
//! Models with an open-ended set of fields can embed [`Attributes`] with
//! `#[serde(flatten)]`. Attribute order is preserved, and the values seen at
//! load time are kept so callers can tell which attributes changed.

use serde::de::{DeserializeOwned, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered attribute values plus the snapshot taken when they were loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: Map<String, Value>,
    original: Map<String, Value>,
}

impl Attributes {
    /// Creates an empty, clean attribute bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bag whose values all count as changed.
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self {
            values,
            original: Map::new(),
        }
    }

    /// Creates a bag whose values count as loaded from the store.
    pub fn loaded(values: Map<String, Value>) -> Self {
        Self {
            original: values.clone(),
            values,
        }
    }

    /// Returns a raw value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns a value deserialized into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Returns a string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    /// Returns an integer value.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(|v| v.as_i64())
    }

    /// Returns a floating-point value.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(|v| v.as_f64())
    }

    /// Returns a boolean value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(|v| v.as_bool())
    }

    /// Sets a value, returning the previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    /// Removes a value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Copies every entry of `other` over the current values.
    pub fn fill(&mut self, other: &Map<String, Value>) {
        for (key, value) in other {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Returns true if the key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the number of attributes.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the attribute map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Consumes the bag, returning the attribute map.
    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    /// Returns the value of an attribute at load time.
    pub fn original(&self, key: &str) -> Option<&Value> {
        self.original.get(key)
    }

    /// Returns true if any attribute was added, changed or removed.
    pub fn is_dirty(&self) -> bool {
        self.values != self.original
    }

    /// Returns true if the given attribute differs from its loaded value.
    pub fn is_field_dirty(&self, key: &str) -> bool {
        self.values.get(key) != self.original.get(key)
    }

    /// Returns the added or changed attributes.
    pub fn get_dirty(&self) -> Map<String, Value> {
        self.values
            .iter()
            .filter(|(key, value)| self.original.get(key.as_str()) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Marks the current values as persisted.
    pub fn sync_original(&mut self) {
        self.original = self.values.clone();
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Attributes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::deserialize(deserializer).map(Attributes::loaded)
    }
}

impl From<Map<String, Value>> for Attributes {
    fn from(values: Map<String, Value>) -> Self {
        Attributes::from_map(values)
    }
}
