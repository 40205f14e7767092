//! The population engine.
//!
//! Stateless functions that resolve declared relation fields on loaded
//! entities (typed plane) or on raw documents (document plane). The typed
//! entry points determine unresolved fields through
//! [`DomainModel::relation_state`], fetch each unresolved field's documents
//! in one batched round trip, and splice the results back through
//! [`DomainModel::set_relation`]. Deep specs are resolved on the document
//! plane *before* splicing, so a single deserialization pass materializes
//! the whole sub-graph; fields that were already resolved at entry are
//! re-walked through [`Relation::populate_nested`] instead.

use crate::{
    DomainModel, Error, Result,
    backend::QueryOptions,
    context::DataContext,
    error::query_failed,
    path::PathSpec,
    relation::{Relation, RelationState},
};
use futures_util::{FutureExt, future::BoxFuture};
use mongodb::bson::{Bson, Document, doc, oid::ObjectId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

impl<T: DomainModel> Relation<T> {
    /// Recursively populates the entities of an already-materialized
    /// relation. Unresolved and empty relations are left untouched; this
    /// walk never fetches the relation itself, only its nested fields.
    pub fn populate_nested<'a>(
        &'a mut self,
        context: &'a Arc<DataContext>,
        spec: &'a PathSpec,
    ) -> BoxFuture<'a, Result<()>> {
        match self {
            Self::One(entity) => populate_batch(context, std::slice::from_mut(&mut **entity), spec),
            Self::Many(entities) => populate_batch(context, entities.as_mut_slice(), spec),
            Self::Empty | Self::Key(_) | Self::Keys(_) => {
                std::future::ready(Ok(())).boxed()
            }
        }
    }
}

/// Resolves `spec` on a batch of loaded entities, in place. Input order is
/// preserved; `entities[i]` is mutated, never replaced.
pub(crate) fn populate_batch<'a, T: DomainModel>(
    context: &'a Arc<DataContext>,
    entities: &'a mut [T],
    spec: &'a PathSpec,
) -> BoxFuture<'a, Result<()>> {
    async move {
        if entities.is_empty() {
            return Ok(());
        }

        let targets = resolve_targets(context, T::COLLECTION_NAME, spec)?;

        // A field counts as resolved only if it is resolved for every entity
        // in the batch; one unresolved occurrence marks the whole field.
        let unresolved: Vec<(&str, &'static str)> = targets
            .iter()
            .filter(|&&(field, _)| {
                entities.iter().any(|entity| {
                    entity
                        .relation_state(field)
                        .is_some_and(|state| state.is_unresolved())
                })
            })
            .copied()
            .collect();

        if spec.nested().is_none() && unresolved.is_empty() {
            tracing::trace!(
                collection = T::COLLECTION_NAME,
                "all relation fields resolved, skipping fetch"
            );
            return Ok(());
        }

        // Remember which entities were already resolved per field before
        // splicing, for the deep re-walk below.
        let resolved_at_entry: Vec<Vec<bool>> = targets
            .iter()
            .map(|&(field, _)| {
                entities
                    .iter()
                    .map(|entity| {
                        matches!(entity.relation_state(field), Some(RelationState::Resolved))
                    })
                    .collect()
            })
            .collect();

        for &(field, target) in &unresolved {
            let mut keys = Vec::new();
            let mut seen = HashSet::new();

            for entity in entities.iter() {
                if let Some(RelationState::Unresolved { keys: entity_keys, .. }) =
                    entity.relation_state(field)
                {
                    for key in entity_keys {
                        if seen.insert(key) {
                            keys.push(key);
                        }
                    }
                }
            }

            if keys.is_empty() {
                continue;
            }

            let mut documents = fetch_by_ids(context, target, &keys).await?;

            if let Some(nested) = spec.nested() {
                populate_documents(context, target, &mut documents, nested).await?;
            }

            let by_id = index_by_id(documents);

            for entity in entities.iter_mut() {
                let Some(RelationState::Unresolved {
                    keys: entity_keys,
                    many,
                }) = entity.relation_state(field)
                else {
                    continue;
                };

                let value = if many {
                    // 1:1 with the key order; keys whose document is gone
                    // are dropped.
                    Bson::Array(
                        entity_keys
                            .iter()
                            .filter_map(|key| by_id.get(key).cloned())
                            .map(Bson::Document)
                            .collect(),
                    )
                } else {
                    match entity_keys.first().and_then(|key| by_id.get(key)) {
                        Some(document) => Bson::Document(document.clone()),
                        // A lone missing document leaves the field untouched.
                        None => continue,
                    }
                };

                entity.set_relation(field, value)?;
            }
        }

        // Deep mode: fields resolved at entry are no-ops at this level, but
        // their nested specs are still walked.
        if let Some(nested) = spec.nested() {
            for (&(field, _), resolved) in targets.iter().zip(&resolved_at_entry) {
                for (entity, was_resolved) in entities.iter_mut().zip(resolved) {
                    if *was_resolved {
                        entity.populate_nested(field, context, nested).await?;
                    }
                }
            }
        }

        Ok(())
    }
    .boxed()
}

/// Queries `T`'s collection and resolves `spec` on every result.
pub(crate) async fn find_and_populate<T: DomainModel>(
    context: &Arc<DataContext>,
    filter: Document,
    spec: &PathSpec,
) -> Result<Vec<T>> {
    let mut documents = context
        .backend()
        .find_many(T::COLLECTION_NAME, filter, None, QueryOptions::default())
        .await
        .map_err(|err| query_failed("populate", err))?;

    populate_documents(context, T::COLLECTION_NAME, &mut documents, spec).await?;

    documents
        .into_iter()
        .map(|document| mongodb::bson::from_document(document).map_err(Error::from))
        .collect()
}

/// Single-result form of [`find_and_populate`].
pub(crate) async fn find_one_and_populate<T: DomainModel>(
    context: &Arc<DataContext>,
    filter: Document,
    spec: &PathSpec,
) -> Result<Option<T>> {
    let document = context
        .backend()
        .find_one(T::COLLECTION_NAME, filter, None)
        .await
        .map_err(|err| query_failed("populate", err))?;

    let Some(document) = document else {
        return Ok(None);
    };

    let mut batch = vec![document];
    populate_documents(context, T::COLLECTION_NAME, &mut batch, spec).await?;

    batch
        .pop()
        .map(|document| mongodb::bson::from_document(document).map_err(Error::from))
        .transpose()
}

/// The document-plane engine: resolves `spec` on raw documents of
/// `collection`, splicing fetched sub-documents directly into the BSON so a
/// later typed wrap sees a fully resolved tree.
pub(crate) fn populate_documents<'a>(
    context: &'a Arc<DataContext>,
    collection: &'a str,
    documents: &'a mut [Document],
    spec: &'a PathSpec,
) -> BoxFuture<'a, Result<()>> {
    async move {
        if documents.is_empty() {
            return Ok(());
        }

        let targets = resolve_targets(context, collection, spec)?;

        for (field, target) in targets {
            let mut keys = Vec::new();
            let mut seen = HashSet::new();

            for document in documents.iter() {
                match classify(document.get(field)) {
                    RawRelation::SingleKey(key) => {
                        if seen.insert(key) {
                            keys.push(key);
                        }
                    }
                    RawRelation::ManyKeys(document_keys) => {
                        for key in document_keys {
                            if seen.insert(key) {
                                keys.push(key);
                            }
                        }
                    }
                    RawRelation::Missing | RawRelation::Resolved => {}
                }
            }

            let by_id = if keys.is_empty() {
                HashMap::new()
            } else {
                let mut fetched = fetch_by_ids(context, target, &keys).await?;

                if let Some(nested) = spec.nested() {
                    populate_documents(context, target, &mut fetched, nested).await?;
                }

                index_by_id(fetched)
            };

            for document in documents.iter_mut() {
                match classify(document.get(field)) {
                    RawRelation::SingleKey(key) => {
                        if let Some(resolved) = by_id.get(&key) {
                            document.insert(field, resolved.clone());
                        }
                    }
                    RawRelation::ManyKeys(document_keys) => {
                        let resolved: Vec<Bson> = document_keys
                            .iter()
                            .filter_map(|key| by_id.get(key).cloned())
                            .map(Bson::Document)
                            .collect();
                        document.insert(field, Bson::Array(resolved));
                    }
                    RawRelation::Resolved => {
                        // Embedded sub-documents are final at this level, but
                        // a deep spec still walks their nested fields.
                        if let Some(nested) = spec.nested() {
                            rewalk_embedded(context, target, document, field, nested).await?;
                        }
                    }
                    RawRelation::Missing => {}
                }
            }
        }

        Ok(())
    }
    .boxed()
}

/// Re-walks an already-embedded relation value under a deep spec.
async fn rewalk_embedded(
    context: &Arc<DataContext>,
    target: &str,
    document: &mut Document,
    field: &str,
    nested: &PathSpec,
) -> Result<()> {
    match document.remove(field) {
        Some(Bson::Document(embedded)) => {
            let mut batch = vec![embedded];
            populate_documents(context, target, &mut batch, nested).await?;
            if let Some(embedded) = batch.pop() {
                document.insert(field, embedded);
            }
            Ok(())
        }
        Some(Bson::Array(items)) => {
            let mut batch = Vec::with_capacity(items.len());
            for item in items {
                if let Bson::Document(embedded) = item {
                    batch.push(embedded);
                }
            }
            populate_documents(context, target, &mut batch, nested).await?;
            document.insert(
                field,
                Bson::Array(batch.into_iter().map(Bson::Document).collect()),
            );
            Ok(())
        }
        Some(other) => {
            document.insert(field, other);
            Ok(())
        }
        None => Ok(()),
    }
}

/// Validates every level of `spec` against the relation maps, before any
/// I/O, and returns the `(field, target collection)` pairs of the current
/// level. Nested levels are checked against each field's target collection,
/// so an invalid deep spec is rejected even when nothing at the current
/// level needs a fetch.
fn resolve_targets<'a>(
    context: &Arc<DataContext>,
    collection: &str,
    spec: &'a PathSpec,
) -> Result<Vec<(&'a str, &'static str)>> {
    let refs = context.relations(collection)?;

    let targets = spec
        .fields()
        .iter()
        .map(|field| {
            let target = refs.target(field).ok_or_else(|| {
                Error::validation(format!(
                    "populate options are invalid: `{field}` is not a relation field of `{collection}`"
                ))
            })?;

            // The relation map only ever points at registered collections,
            // but the lookup also yields the target's map for recursion.
            context.relations(target)?;

            Ok((field.as_str(), target))
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(nested) = spec.nested() {
        for &(_, target) in &targets {
            resolve_targets(context, target, nested)?;
        }
    }

    Ok(targets)
}

async fn fetch_by_ids(
    context: &Arc<DataContext>,
    collection: &str,
    keys: &[ObjectId],
) -> Result<Vec<Document>> {
    tracing::debug!(collection, keys = keys.len(), "fetching relation documents");

    context
        .backend()
        .find_many(
            collection,
            doc! { "_id": { "$in": keys.to_vec() } },
            None,
            QueryOptions::default(),
        )
        .await
        .map_err(|err| query_failed("populate", err))
}

fn index_by_id(documents: Vec<Document>) -> HashMap<ObjectId, Document> {
    documents
        .into_iter()
        .filter_map(|document| {
            let id = document.get_object_id("_id").ok()?;
            Some((id, document))
        })
        .collect()
}

/// The shape of a raw relation value on the document plane.
enum RawRelation {
    /// Absent, null, or not relation-shaped; left untouched.
    Missing,
    SingleKey(ObjectId),
    /// Unresolved or partially resolved list; a mix of keys and documents
    /// is re-resolved as a whole field.
    ManyKeys(Vec<ObjectId>),
    /// An embedded document, or a list of only documents.
    Resolved,
}

fn classify(value: Option<&Bson>) -> RawRelation {
    match value {
        None | Some(Bson::Null | Bson::Undefined) => RawRelation::Missing,
        Some(Bson::ObjectId(id)) => RawRelation::SingleKey(*id),
        Some(Bson::Document(_)) => RawRelation::Resolved,
        Some(Bson::Array(items)) => {
            if items
                .iter()
                .all(|item| matches!(item, Bson::Document(_)))
            {
                return RawRelation::Resolved;
            }

            RawRelation::ManyKeys(
                items
                    .iter()
                    .filter_map(|item| match item {
                        Bson::ObjectId(id) => Some(*id),
                        Bson::Document(document) => document.get_object_id("_id").ok(),
                        _ => None,
                    })
                    .collect(),
            )
        }
        Some(_) => RawRelation::Missing,
    }
}
