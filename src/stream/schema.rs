//! Output schema inference.
//!
//! The schema is derived once from the first non-empty batch and frozen.
//! Field order is order of first appearance across that batch; a field's type
//! is the kind of its first non-null value, or `Null` if it never had one.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::accumulator::Batch;
use crate::row::ValueKind;

/// One named, typed column of the output schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: Arc<str>,
    pub kind: ValueKind,
}

impl Serialize for SchemaField {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("SchemaField", 2)?;
        s.serialize_field("name", self.name.as_ref())?;
        s.serialize_field("kind", self.kind.as_str())?;
        s.end()
    }
}

/// Ordered, immutable output schema.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Schema {
    fields: Vec<SchemaField>,
    #[serde(skip)]
    positions: HashMap<Arc<str>, usize>,
}

impl Schema {
    pub fn new(fields: Vec<SchemaField>) -> Self {
        let mut positions = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            positions.entry(Arc::clone(&field.name)).or_insert(i);
        }
        Self { fields, positions }
    }

    /// The zero-field schema used for streams that never produced a row
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column position of `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for Schema {}

/// Derives a [`Schema`] from a batch.
pub struct SchemaInferencer;

impl SchemaInferencer {
    pub fn infer(batch: &Batch) -> Schema {
        let mut fields: Vec<SchemaField> = Vec::new();
        let mut positions: HashMap<Arc<str>, usize> = HashMap::new();

        for row in batch.rows() {
            for (name, value) in row.fields() {
                let kind = value.kind();
                match positions.get(name.as_ref()) {
                    Some(&i) => {
                        if fields[i].kind == ValueKind::Null {
                            fields[i].kind = kind;
                        }
                    }
                    None => {
                        positions.insert(Arc::clone(name), fields.len());
                        fields.push(SchemaField {
                            name: Arc::clone(name),
                            kind,
                        });
                    }
                }
            }
        }

        Schema { fields, positions }
    }
}
