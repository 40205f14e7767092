//! Tagged relation values.

use crate::{DomainModel, Error, Result};
use mongodb::bson::{self, Bson, oid::ObjectId};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// A declared relation field of a domain entity.
///
/// A relation is either still a raw foreign-key reference (`Key`/`Keys`) or
/// already materialized as domain entities (`One`/`Many`). `Empty` means
/// there is nothing to resolve; population leaves it untouched.
///
/// On the wire a relation is stored as its foreign key(s): serializing a
/// resolved variant collapses it back to the referenced ids, so saving an
/// entity never persists populated sub-documents.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Relation<T> {
    /// Absent or null; nothing to resolve.
    #[default]
    Empty,
    /// A single unresolved reference.
    Key(ObjectId),
    /// A list of unresolved references.
    Keys(Vec<ObjectId>),
    /// A resolved single-valued relation.
    One(Box<T>),
    /// A resolved multi-valued relation.
    Many(Vec<T>),
}

impl<T> Relation<T> {
    /// Returns `true` for the `One` and `Many` variants.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::One(_) | Self::Many(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The resolved entity of a single-valued relation, if materialized.
    pub fn as_one(&self) -> Option<&T> {
        match self {
            Self::One(entity) => Some(entity),
            _ => None,
        }
    }

    /// The resolved entities of a multi-valued relation, if materialized.
    pub fn as_many(&self) -> Option<&[T]> {
        match self {
            Self::Many(entities) => Some(entities),
            _ => None,
        }
    }

    /// The resolution state consumed by the population engine.
    pub fn state(&self) -> RelationState {
        match self {
            Self::Empty => RelationState::Empty,
            Self::Key(id) => RelationState::Unresolved {
                keys: vec![*id],
                many: false,
            },
            Self::Keys(ids) => RelationState::Unresolved {
                keys: ids.clone(),
                many: true,
            },
            Self::One(_) | Self::Many(_) => RelationState::Resolved,
        }
    }
}

impl<T: DomainModel> Relation<T> {
    /// Interprets a raw BSON value as a relation.
    ///
    /// An ObjectId is an unresolved key, a document a resolved entity, an
    /// array either a key list or a resolved entity list. An array mixing
    /// keys and documents collapses to `Keys` (ids lifted from the embedded
    /// documents), so a partially resolved list reads as unresolved as a
    /// whole field.
    pub fn from_bson(value: Bson) -> Result<Self> {
        match value {
            Bson::Null | Bson::Undefined => Ok(Self::Empty),
            Bson::ObjectId(id) => Ok(Self::Key(id)),
            Bson::Document(document) => Ok(Self::One(Box::new(bson::from_document(document)?))),
            Bson::Array(items) => Self::from_items(items),
            other => Err(Error::validation(format!(
                "relation value has unsupported BSON type {:?}",
                other.element_type()
            ))),
        }
    }

    fn from_items(items: Vec<Bson>) -> Result<Self> {
        if items.iter().all(|item| matches!(item, Bson::Document(_))) {
            let mut entities = Vec::with_capacity(items.len());
            for item in items {
                if let Bson::Document(document) = item {
                    entities.push(bson::from_document(document)?);
                }
            }
            return Ok(Self::Many(entities));
        }

        let keys = items
            .iter()
            .map(|item| match item {
                Bson::ObjectId(id) => Ok(*id),
                Bson::Document(document) => document.get_object_id("_id").map_err(|_| {
                    Error::validation("relation array element has no `_id`".to_owned())
                }),
                other => Err(Error::validation(format!(
                    "relation array element has unsupported BSON type {:?}",
                    other.element_type()
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::Keys(keys))
    }
}

impl<T: DomainModel> Serialize for Relation<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_none(),
            Self::Key(id) => id.serialize(serializer),
            Self::Keys(ids) => ids.serialize(serializer),
            Self::One(entity) => entity.id().serialize(serializer),
            Self::Many(entities) => entities
                .iter()
                .map(DomainModel::id)
                .collect::<Vec<_>>()
                .serialize(serializer),
        }
    }
}

impl<'de, T: DomainModel> Deserialize<'de> for Relation<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Bson::deserialize(deserializer)?;
        Self::from_bson(value).map_err(de::Error::custom)
    }
}

/// The resolution state of one relation field, as seen by the population
/// engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationState {
    /// Nothing to resolve.
    Empty,
    /// Raw foreign keys in need of a fetch. `many` distinguishes a lone key
    /// from a key list so the engine can splice the right shape back.
    Unresolved {
        keys: Vec<ObjectId>,
        many: bool,
    },
    /// Already materialized; population is a no-op at this level.
    Resolved,
}

impl RelationState {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved { .. })
    }
}
