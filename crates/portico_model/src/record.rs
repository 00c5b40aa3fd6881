//! Attribute records, the exchange format between entities and storage.

use std::collections::BTreeMap;

use crate::error::{ModelError, ModelResult};
use crate::types::{Key, Timestamp};
use crate::value::Value;

const NULL: Value = Value::Null;

/// A flat attribute map for one entity row.
///
/// Records are what crosses the storage seam in both directions: entities
/// lower themselves into records through their accessor tables, and
/// hydrate back with [`Persistent::from_record`](crate::Persistent).
/// The entity name is the concrete level of the row's hierarchy (its tag),
/// never a base level.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    entity: String,
    key: Option<Key>,
    values: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record for the given concrete entity type.
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            key: None,
            values: BTreeMap::new(),
        }
    }

    /// Sets the row key.
    #[must_use]
    pub fn with_key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }

    /// Concrete entity type name (the row tag).
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Row key, if assigned.
    #[must_use]
    pub fn key(&self) -> Option<Key> {
        self.key
    }

    /// Sets the row key in place.
    pub fn set_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    /// Stores an attribute value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Looks an attribute up; absent attributes read as null.
    #[must_use]
    pub fn value(&self, name: &str) -> &Value {
        self.values.get(name).unwrap_or(&NULL)
    }

    /// Looks an attribute up, distinguishing absent from null.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Iterates attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of stored attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record holds no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The row key, or a hydration error when absent.
    pub fn require_key(&self) -> ModelResult<Key> {
        self.key.ok_or_else(|| ModelError::missing_key(&self.entity))
    }

    /// A required text attribute.
    pub fn text(&self, name: &str) -> ModelResult<String> {
        match self.value(name) {
            Value::Text(s) => Ok(s.clone()),
            Value::Null => Err(ModelError::missing_attribute(&self.entity, name)),
            other => Err(self.mismatch(name, "text", other)),
        }
    }

    /// An optional text attribute.
    pub fn opt_text(&self, name: &str) -> ModelResult<Option<String>> {
        match self.value(name) {
            Value::Text(s) => Ok(Some(s.clone())),
            Value::Null => Ok(None),
            other => Err(self.mismatch(name, "text", other)),
        }
    }

    /// A required integer attribute (also enums and references).
    pub fn int(&self, name: &str) -> ModelResult<i64> {
        match self.value(name) {
            Value::Int(n) => Ok(*n),
            Value::Null => Err(ModelError::missing_attribute(&self.entity, name)),
            other => Err(self.mismatch(name, "int", other)),
        }
    }

    /// An optional integer attribute.
    pub fn opt_int(&self, name: &str) -> ModelResult<Option<i64>> {
        match self.value(name) {
            Value::Int(n) => Ok(Some(*n)),
            Value::Null => Ok(None),
            other => Err(self.mismatch(name, "int", other)),
        }
    }

    /// A required float attribute.
    pub fn float(&self, name: &str) -> ModelResult<f64> {
        match self.value(name) {
            Value::Float(x) => Ok(*x),
            Value::Null => Err(ModelError::missing_attribute(&self.entity, name)),
            other => Err(self.mismatch(name, "float", other)),
        }
    }

    /// A required boolean attribute.
    pub fn bool(&self, name: &str) -> ModelResult<bool> {
        match self.value(name) {
            Value::Bool(b) => Ok(*b),
            Value::Null => Err(ModelError::missing_attribute(&self.entity, name)),
            other => Err(self.mismatch(name, "bool", other)),
        }
    }

    /// An optional timestamp attribute.
    pub fn opt_timestamp(&self, name: &str) -> ModelResult<Option<Timestamp>> {
        match self.value(name) {
            Value::Timestamp(t) => Ok(Some(*t)),
            Value::Null => Ok(None),
            other => Err(self.mismatch(name, "timestamp", other)),
        }
    }

    /// An optional reference attribute, read as the target key.
    pub fn opt_reference(&self, name: &str) -> ModelResult<Option<Key>> {
        match self.value(name) {
            value @ Value::Int(_) => match value.as_key() {
                Some(key) => Ok(Some(key)),
                None => Err(self.mismatch(name, "reference", value)),
            },
            Value::Null => Ok(None),
            other => Err(self.mismatch(name, "reference", other)),
        }
    }

    fn mismatch(&self, name: &str, expected: &'static str, found: &Value) -> ModelError {
        ModelError::type_mismatch(&self.entity, name, expected, found.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        let mut rec = Record::new("Gadget").with_key(Key::new(7));
        rec.set("label", "widget");
        rec.set("rank", 3i64);
        rec.set("note", Value::Null);
        rec.set("owner", Key::new(2));
        rec
    }

    #[test]
    fn absent_reads_as_null() {
        let rec = sample();
        assert_eq!(rec.value("nope"), &Value::Null);
        assert_eq!(rec.get("nope"), None);
        assert_eq!(rec.get("note"), Some(&Value::Null));
    }

    #[test]
    fn typed_extraction() {
        let rec = sample();
        assert_eq!(rec.require_key().unwrap(), Key::new(7));
        assert_eq!(rec.text("label").unwrap(), "widget");
        assert_eq!(rec.int("rank").unwrap(), 3);
        assert_eq!(rec.opt_text("note").unwrap(), None);
        assert_eq!(rec.opt_reference("owner").unwrap(), Some(Key::new(2)));
    }

    #[test]
    fn missing_required_attribute_errors() {
        let rec = sample();
        let err = rec.text("note").unwrap_err();
        assert_eq!(err, ModelError::missing_attribute("Gadget", "note"));
    }

    #[test]
    fn mismatch_reports_shapes() {
        let rec = sample();
        let err = rec.text("rank").unwrap_err();
        assert_eq!(
            err,
            ModelError::type_mismatch("Gadget", "rank", "text", "int")
        );
    }

    #[test]
    fn missing_key_errors() {
        let rec = Record::new("Gadget");
        assert_eq!(
            rec.require_key().unwrap_err(),
            ModelError::missing_key("Gadget")
        );
    }
}
