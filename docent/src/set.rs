//! Typed entity sets (repositories).

use crate::{
    DomainModel, Error, PathSpec, Result,
    backend::{Backend, QueryOptions},
    context::DataContext,
    error::query_failed,
    populate,
    schema::RelationMap,
};
use mongodb::bson::{self, Bson, Document, doc};
use std::{marker::PhantomData, sync::Arc};

/// The repository for one registered domain type.
///
/// Binds the context's backend handle and the relation-map subset for `T`'s
/// collection. Created through [`DataContext::entity_set`], immutable, and
/// cheap to clone.
pub struct EntitySet<T: DomainModel> {
    context: Arc<DataContext>,
    refs: Arc<RelationMap>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DomainModel> std::fmt::Debug for EntitySet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySet")
            .field("context", &self.context)
            .field("refs", &self.refs)
            .finish()
    }
}

impl<T: DomainModel> Clone for EntitySet<T> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            refs: self.refs.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: DomainModel> EntitySet<T> {
    pub(crate) fn new(context: Arc<DataContext>, refs: Arc<RelationMap>) -> Self {
        Self {
            context,
            refs,
            _marker: PhantomData,
        }
    }

    pub fn collection_name(&self) -> &'static str {
        T::COLLECTION_NAME
    }

    /// The relation fields this set can populate.
    pub fn relations(&self) -> &RelationMap {
        &self.refs
    }

    /// The context this set belongs to.
    pub fn context(&self) -> &Arc<DataContext> {
        &self.context
    }

    fn backend(&self) -> &Arc<dyn Backend> {
        self.context.backend()
    }

    /// Fetches at most one entity. Absence is `None`, not an error.
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        let document = self
            .backend()
            .find_one(T::COLLECTION_NAME, filter, None)
            .await
            .map_err(|err| query_failed("find", err))?;

        document
            .map(|document| bson::from_document(document).map_err(Error::from))
            .transpose()
    }

    /// Fetches at most one raw document, projected. A requested projection
    /// returns the raw document rather than a wrapped entity.
    pub async fn find_one_projected(
        &self,
        filter: Document,
        projection: Document,
    ) -> Result<Option<Document>> {
        self.backend()
            .find_one(T::COLLECTION_NAME, filter, Some(projection))
            .await
            .map_err(|err| query_failed("find", err))
    }

    /// Fetches every entity matching `filter`.
    pub async fn find(&self, filter: Document) -> Result<Vec<T>> {
        self.find_with_opts(filter, QueryOptions::default()).await
    }

    /// Fetches every entity matching `filter`, with cursor modifiers.
    pub async fn find_with_opts(&self, filter: Document, options: QueryOptions) -> Result<Vec<T>> {
        let documents = self
            .backend()
            .find_many(T::COLLECTION_NAME, filter, None, options)
            .await
            .map_err(|err| query_failed("find", err))?;

        documents
            .into_iter()
            .map(|document| bson::from_document(document).map_err(Error::from))
            .collect()
    }

    /// Upserts the entity by id, writing exactly its declared fields.
    pub async fn save(&self, entity: &T) -> Result<()> {
        let record = bson::to_document(entity)?;

        tracing::trace!(collection = T::COLLECTION_NAME, id = %entity.id(), "saving entity");

        self.backend()
            .update(
                T::COLLECTION_NAME,
                doc! { "_id": entity.id() },
                doc! { "$set": record },
                true,
            )
            .await
            .map_err(|err| query_failed("save", err))?;

        Ok(())
    }

    /// Deletes the entity by id.
    pub async fn remove(&self, entity: &T) -> Result<()> {
        self.backend()
            .delete(T::COLLECTION_NAME, doc! { "_id": entity.id() })
            .await
            .map_err(|err| query_failed("remove", err))?;

        Ok(())
    }

    /// Applies an update document (`$set` and friends) to every match,
    /// returning the matched count.
    pub async fn find_and_update(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> Result<u64> {
        self.backend()
            .update(T::COLLECTION_NAME, filter, update, upsert)
            .await
            .map_err(|err| query_failed("update", err))
    }

    /// Deletes every match, returning the deleted count.
    pub async fn find_and_remove(&self, filter: Document) -> Result<u64> {
        self.backend()
            .delete(T::COLLECTION_NAME, filter)
            .await
            .map_err(|err| query_failed("remove", err))
    }

    pub async fn count(&self, filter: Document) -> Result<u64> {
        self.backend()
            .count(T::COLLECTION_NAME, filter)
            .await
            .map_err(|err| query_failed("count", err))
    }

    pub async fn distinct(&self, field: &str, filter: Document) -> Result<Vec<Bson>> {
        self.backend()
            .distinct(T::COLLECTION_NAME, field, filter)
            .await
            .map_err(|err| query_failed("distinct", err))
    }

    pub async fn insert_many(&self, entities: &[T]) -> Result<()> {
        let documents = entities
            .iter()
            .map(|entity| bson::to_document(entity).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;

        self.backend()
            .insert_many(T::COLLECTION_NAME, documents)
            .await
            .map_err(|err| query_failed("insert", err))?;

        Ok(())
    }

    /// Resolves the relation fields named by `spec` on an already-loaded
    /// entity, in place. Fields that are already resolved are left
    /// untouched; a shallow spec with nothing to resolve issues no I/O.
    pub async fn populate(&self, entity: &mut T, spec: &PathSpec) -> Result<()> {
        populate::populate_batch(&self.context, std::slice::from_mut(entity), spec).await
    }

    /// Batch form of [`populate`](Self::populate): one fetch per unresolved
    /// field covers the whole batch, and input order is preserved.
    pub async fn populate_many(&self, entities: &mut [T], spec: &PathSpec) -> Result<()> {
        populate::populate_batch(&self.context, entities, spec).await
    }

    /// Queries and populates in one step.
    pub async fn find_and_populate(&self, filter: Document, spec: &PathSpec) -> Result<Vec<T>> {
        populate::find_and_populate(&self.context, filter, spec).await
    }

    /// Single-result form of [`find_and_populate`](Self::find_and_populate).
    pub async fn find_one_and_populate(
        &self,
        filter: Document,
        spec: &PathSpec,
    ) -> Result<Option<T>> {
        populate::find_one_and_populate(&self.context, filter, spec).await
    }
}
