//! Schema descriptors and the relation map.

use crate::DomainModel;
use std::collections::HashMap;

/// A declared field of a domain entity, as seen by the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// The serialized field name.
    pub name: &'static str,
    /// The model name of the referenced entity, for relation fields.
    pub reference: Option<&'static str>,
}

/// Per-type schema introspection, generated by `#[derive(DomainModel)]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// The model name, used as the reference target by other schemas.
    pub model: &'static str,
    /// The backing collection name.
    pub collection: &'static str,
    /// Declared fields in declaration order.
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    /// Iterates the `(field, target model)` pairs of the relation fields.
    pub fn references(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.fields
            .iter()
            .filter_map(|field| field.reference.map(|target| (field.name, target)))
    }
}

/// Registers one domain type with a data context.
#[derive(Debug, Clone)]
pub struct Binding {
    schema: Schema,
}

impl Binding {
    /// Captures the schema of a domain type.
    pub fn of<T: DomainModel>() -> Self {
        Self { schema: T::schema() }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Field name → target collection name, for one registered collection.
///
/// Built once during context construction by matching every declared
/// reference target against the registered bindings; targets that are not
/// registered are skipped and never appear here.
#[derive(Debug, Clone, Default)]
pub struct RelationMap {
    targets: HashMap<&'static str, &'static str>,
}

impl RelationMap {
    pub(crate) fn insert(&mut self, field: &'static str, collection: &'static str) {
        self.targets.insert(field, collection);
    }

    /// The target collection a relation field resolves to, if registered.
    pub fn target(&self, field: &str) -> Option<&'static str> {
        self.targets.get(field).copied()
    }

    /// The registered relation field names, in no particular order.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.targets.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
