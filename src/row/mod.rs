//! # Rows
//!
//! An ordered field-name → value record as produced by a row source.
//! Rows from one query are not required to share a field set.

mod value;

pub use value::{Value, ValueKind};

use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// An immutable, ordered record.
///
/// Field names are `Arc<str>` so sources that produce many rows with the same
/// columns can share one allocation per column name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    fields: Vec<(Arc<str>, Value)>,
}

impl Row {
    pub fn new(fields: Vec<(Arc<str>, Value)>) -> Self {
        Self { fields }
    }

    /// Build a row from string keys. Mostly useful in tests and demos.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (Arc::from(k.as_ref()), v.into()))
                .collect(),
        }
    }

    pub fn fields(&self) -> &[(Arc<str>, Value)] {
        &self.fields
    }

    /// Look up a field by name (first match).
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name.as_ref(), value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_preserves_order() {
        let row = Row::from_pairs([("b", Value::from(1i64)), ("a", Value::from("x"))]);
        let names: Vec<&str> = row.fields().iter().map(|(n, _)| n.as_ref()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(row.get("a"), Some(&Value::from("x")));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_serialize_row() {
        let row = Row::from_pairs([("a", Value::from(1i64)), ("b", Value::Null)]);
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"a":1,"b":null}"#);
    }
}
