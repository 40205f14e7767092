#![allow(dead_code)]

use docent::{
    Backend, BackendError, BackendResult, BoxFuture, DomainModel, QueryOptions, Relation,
    mongodb::bson::{Bson, Document, oid::ObjectId},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, DomainModel)]
#[domain(collection = "users")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    #[domain(reference = "Book")]
    pub books: Relation<Book>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, DomainModel)]
#[domain(collection = "books")]
pub struct Book {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    #[serde(default)]
    #[domain(reference = "User")]
    pub author: Relation<User>,
    // Publisher is deliberately left unregistered by the test contexts.
    #[serde(default)]
    #[domain(reference = "Publisher")]
    pub publisher: Relation<Publisher>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, DomainModel)]
#[domain(collection = "publishers")]
pub struct Publisher {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
}

/// Declares a context type registering `User` and `Book`. Each test uses its
/// own context type so that every test gets its own backend: contexts are
/// memoized process-wide by name.
#[macro_export]
macro_rules! context_fixture {
    ($name:ident) => {
        struct $name;

        impl ::docent::Context for $name {
            const NAME: &'static str = stringify!($name);

            fn init() -> Vec<::docent::Binding> {
                vec![
                    ::docent::Binding::of::<$crate::common::User>(),
                    ::docent::Binding::of::<$crate::common::Book>(),
                ]
            }
        }
    };
}

/// In-memory [`Backend`] with a read counter and failure injection, enough
/// query support for what the entity sets and the population engine issue.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    fetches: AtomicUsize,
    fail_reads: AtomicBool,
}

impl MemoryBackend {
    pub fn seed(&self, collection: &str, documents: Vec<Document>) {
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_owned())
            .or_default()
            .extend(documents);
    }

    /// Number of read (`find_many`/`find_one`) calls issued so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn guard_reads(&self) -> BackendResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BackendError("simulated read failure".to_owned()));
        }

        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(
        &self,
        collection: &str,
        filter: &Document,
        options: &QueryOptions,
    ) -> BackendResult<Vec<Document>> {
        self.guard_reads()?;

        let collections = self.collections.lock().unwrap();
        let mut matched: Vec<Document> = collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| matches(document, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(skip) = options.skip {
            matched.drain(..matched.len().min(skip as usize));
        }

        if let Some(limit) = options.limit {
            matched.truncate(limit as usize);
        }

        Ok(matched)
    }
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| match expected {
        Bson::Document(condition) if condition.contains_key("$in") => {
            let Some(Bson::Array(allowed)) = condition.get("$in") else {
                return false;
            };

            match document.get(key) {
                Some(Bson::Array(values)) => values.iter().any(|value| allowed.contains(value)),
                Some(value) => allowed.contains(value),
                None => false,
            }
        }
        expected => document.get(key) == Some(expected),
    })
}

fn project(document: &Document, projection: &Document) -> Document {
    let mut projected = Document::new();

    let exclude_id = matches!(
        projection.get("_id"),
        Some(Bson::Int32(0) | Bson::Int64(0))
    );

    if !exclude_id {
        if let Some(id) = document.get("_id") {
            projected.insert("_id", id.clone());
        }
    }

    for (key, value) in projection {
        if key == "_id" || matches!(value, Bson::Int32(0) | Bson::Int64(0)) {
            continue;
        }

        if let Some(value) = document.get(key) {
            projected.insert(key, value.clone());
        }
    }

    projected
}

impl Backend for MemoryBackend {
    fn find_many<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        _projection: Option<Document>,
        options: QueryOptions,
    ) -> BoxFuture<'a, BackendResult<Vec<Document>>> {
        let result = self.read(collection, &filter, &options);
        Box::pin(std::future::ready(result))
    }

    fn find_one<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        projection: Option<Document>,
    ) -> BoxFuture<'a, BackendResult<Option<Document>>> {
        let result = self
            .read(collection, &filter, &QueryOptions::default())
            .map(|documents| {
                let document = documents.into_iter().next();
                match (document, projection) {
                    (Some(document), Some(projection)) => Some(project(&document, &projection)),
                    (document, _) => document,
                }
            });
        Box::pin(std::future::ready(result))
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> BoxFuture<'a, BackendResult<u64>> {
        let mut collections = self.collections.lock().unwrap();
        let documents = collections.entry(collection.to_owned()).or_default();
        let set = update.get_document("$set").cloned().unwrap_or_default();

        let mut matched = 0;

        for document in documents
            .iter_mut()
            .filter(|document| matches(document, &filter))
        {
            matched += 1;
            for (key, value) in &set {
                document.insert(key, value.clone());
            }
        }

        if matched == 0 && upsert {
            let mut document = Document::new();

            for (key, value) in &filter {
                if !key.starts_with('$') && !matches!(value, Bson::Document(_)) {
                    document.insert(key, value.clone());
                }
            }

            for (key, value) in &set {
                document.insert(key, value.clone());
            }

            documents.push(document);
            matched = 1;
        }

        Box::pin(std::future::ready(Ok(matched)))
    }

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
    ) -> BoxFuture<'a, BackendResult<u64>> {
        let mut collections = self.collections.lock().unwrap();
        let documents = collections.entry(collection.to_owned()).or_default();

        let before = documents.len();
        documents.retain(|document| !matches(document, &filter));
        let deleted = (before - documents.len()) as u64;

        Box::pin(std::future::ready(Ok(deleted)))
    }

    fn insert_many<'a>(
        &'a self,
        collection: &'a str,
        documents: Vec<Document>,
    ) -> BoxFuture<'a, BackendResult<()>> {
        self.seed(collection, documents);
        Box::pin(std::future::ready(Ok(())))
    }

    fn count<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
    ) -> BoxFuture<'a, BackendResult<u64>> {
        let collections = self.collections.lock().unwrap();
        let count = collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| matches(document, &filter))
                    .count() as u64
            })
            .unwrap_or_default();

        Box::pin(std::future::ready(Ok(count)))
    }

    fn distinct<'a>(
        &'a self,
        collection: &'a str,
        field: &'a str,
        filter: Document,
    ) -> BoxFuture<'a, BackendResult<Vec<Bson>>> {
        let collections = self.collections.lock().unwrap();
        let mut values: Vec<Bson> = Vec::new();

        for document in collections.get(collection).into_iter().flatten() {
            if !matches(document, &filter) {
                continue;
            }

            if let Some(value) = document.get(field) {
                if !values.contains(value) {
                    values.push(value.clone());
                }
            }
        }

        Box::pin(std::future::ready(Ok(values)))
    }
}

pub fn attach<C: docent::Context>() -> (
    std::sync::Arc<MemoryBackend>,
    std::sync::Arc<docent::DataContext>,
) {
    let backend = std::sync::Arc::new(MemoryBackend::default());
    let context = docent::DataContext::attach::<C>(backend.clone()).unwrap();
    (backend, context)
}
