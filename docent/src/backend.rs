//! The document-store collaborator contract.

use futures_util::{FutureExt, TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database,
    bson::{Bson, Document},
};
use thiserror::Error;

/// A driver-level failure. Translated into the uniform query error at the
/// entity-set boundary; never part of the public API surface beyond that.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl From<mongodb::error::Error> for BackendError {
    fn from(err: mongodb::error::Error) -> Self {
        Self(err.to_string())
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Cursor modifiers for multi-document reads.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    pub sort: Option<Document>,
}

/// The primitives the entity sets and the population engine need from the
/// underlying document store, in terms of collection names and raw BSON.
///
/// Implemented by [`MongoBackend`] for production use; tests provide an
/// in-memory implementation with a fetch counter.
pub trait Backend: Send + Sync + 'static {
    /// Fetches every document matching `filter`.
    fn find_many<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        projection: Option<Document>,
        options: QueryOptions,
    ) -> BoxFuture<'a, BackendResult<Vec<Document>>>;

    /// Fetches at most one document matching `filter`.
    fn find_one<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        projection: Option<Document>,
    ) -> BoxFuture<'a, BackendResult<Option<Document>>>;

    /// Applies an update document to every match, optionally inserting on
    /// no match. Returns the matched (or upserted) count.
    fn update<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> BoxFuture<'a, BackendResult<u64>>;

    /// Deletes every document matching `filter`, returning the count.
    fn delete<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
    ) -> BoxFuture<'a, BackendResult<u64>>;

    fn insert_many<'a>(
        &'a self,
        collection: &'a str,
        documents: Vec<Document>,
    ) -> BoxFuture<'a, BackendResult<()>>;

    fn count<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
    ) -> BoxFuture<'a, BackendResult<u64>>;

    fn distinct<'a>(
        &'a self,
        collection: &'a str,
        field: &'a str,
        filter: Document,
    ) -> BoxFuture<'a, BackendResult<Vec<Bson>>>;
}

/// [`Backend`] implementation over a [`mongodb::Database`].
#[derive(Debug, Clone)]
pub struct MongoBackend {
    db: Database,
}

impl MongoBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }
}

impl Backend for MongoBackend {
    fn find_many<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        projection: Option<Document>,
        options: QueryOptions,
    ) -> BoxFuture<'a, BackendResult<Vec<Document>>> {
        async move {
            // The find action borrows the collection handle, so it has to
            // outlive the builder chain.
            let handle = self.collection(collection);
            let mut query = handle.find(filter);

            if let Some(projection) = projection {
                query = query.projection(projection);
            }

            if let Some(skip) = options.skip {
                query = query.skip(skip);
            }

            if let Some(limit) = options.limit {
                query = query.limit(limit);
            }

            if let Some(sort) = options.sort {
                query = query.sort(sort);
            }

            let documents = query.await?.try_collect().await?;

            Ok(documents)
        }
        .boxed()
    }

    fn find_one<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        projection: Option<Document>,
    ) -> BoxFuture<'a, BackendResult<Option<Document>>> {
        async move {
            let handle = self.collection(collection);
            let mut query = handle.find_one(filter);

            if let Some(projection) = projection {
                query = query.projection(projection);
            }

            let document = query.await?;

            Ok(document)
        }
        .boxed()
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> BoxFuture<'a, BackendResult<u64>> {
        async move {
            let result = self
                .collection(collection)
                .update_many(filter, update)
                .upsert(upsert)
                .await?;

            let matched = if result.upserted_id.is_some() {
                1
            } else {
                result.matched_count
            };

            Ok(matched)
        }
        .boxed()
    }

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
    ) -> BoxFuture<'a, BackendResult<u64>> {
        async move {
            let result = self.collection(collection).delete_many(filter).await?;

            Ok(result.deleted_count)
        }
        .boxed()
    }

    fn insert_many<'a>(
        &'a self,
        collection: &'a str,
        documents: Vec<Document>,
    ) -> BoxFuture<'a, BackendResult<()>> {
        async move {
            self.collection(collection).insert_many(documents).await?;

            Ok(())
        }
        .boxed()
    }

    fn count<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
    ) -> BoxFuture<'a, BackendResult<u64>> {
        async move {
            let count = self.collection(collection).count_documents(filter).await?;

            Ok(count)
        }
        .boxed()
    }

    fn distinct<'a>(
        &'a self,
        collection: &'a str,
        field: &'a str,
        filter: Document,
    ) -> BoxFuture<'a, BackendResult<Vec<Bson>>> {
        async move {
            let values = self.collection(collection).distinct(field, filter).await?;

            Ok(values)
        }
        .boxed()
    }
}
