//! Docent maps plain Rust structs onto `MongoDB` collections and resolves
//! declared relations between them ("population").
//!
//! ## Example
//!
//! ```rust,ignore
//! // Define entities; relation fields are tagged with their target model.
//! #[derive(Serialize, Deserialize, DomainModel)]
//! #[domain(collection = "users")]
//! struct User {
//!   #[serde(rename = "_id")]
//!   id: ObjectId,
//!   name: String,
//!   #[serde(default)]
//!   #[domain(reference = "Book")]
//!   books: Relation<Book>,
//! }
//!
//! // Declare a context registering the entities.
//! struct Library;
//!
//! impl Context for Library {
//!   const NAME: &'static str = "library";
//!
//!   fn init() -> Vec<Binding> {
//!     vec![Binding::of::<User>(), Binding::of::<Book>()]
//!   }
//! }
//!
//! // Attach it (memoized per context type) and get typed entity sets.
//! let context = DataContext::attach::<Library>(backend)?;
//! let users = context.entity_set::<User>()?;
//!
//! // CRUD returning domain objects instead of raw documents.
//! users.save(&user).await?;
//! let mut found = users.find_one(doc! { "name": "x" }).await?.unwrap();
//!
//! // Resolve the `books` references into Book entities, in place.
//! users.populate(&mut found, &"books".parse()?).await?;
//!
//! // Deep population walks nested paths recursively.
//! let spec = PathSpec::deep("books", PathSpec::deep("author", "books".parse()?)?)?;
//! users.populate(&mut found, &spec).await?;
//! ```
//!
//! See the [`guides`] module to learn more!

#![warn(clippy::pedantic)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc
)]

use mongodb::bson::{Bson, oid::ObjectId};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;

pub use futures_util::future::BoxFuture;
pub use mongodb;

pub use docent_macros::DomainModel;

mod backend;
mod context;
mod error;
mod path;
mod populate;
mod relation;
mod schema;
mod set;

pub mod guides;

pub use backend::{Backend, BackendError, BackendResult, MongoBackend, QueryOptions};
pub use context::{Context, DataContext};
pub use error::{Error, Result};
pub use path::PathSpec;
pub use relation::{Relation, RelationState};
pub use schema::{Binding, FieldSpec, RelationMap, Schema};
pub use set::EntitySet;

/// A domain entity mapped onto a `MongoDB` collection.
///
/// Implemented with `#[derive(DomainModel)]`. A deriving type must:
/// - be a struct with named fields implementing [`Serialize`] and
///   [`serde::Deserialize`];
/// - have an `id: ObjectId` field annotated with `#[serde(rename = "_id")]`;
/// - declare relation fields as [`Relation<T>`] with
///   `#[domain(reference = "TargetModel")]` (and `#[serde(default)]` so an
///   absent field reads as [`Relation::Empty`]).
///
/// The relation accessors are the reflection surface of the population
/// engine: `relation_state` reports whether a field still holds raw foreign
/// keys, `set_relation` splices a resolved BSON sub-tree back into the
/// field, and `populate_nested` recurses into an already-materialized
/// sub-graph for deep path specs.
pub trait DomainModel: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The model name; other schemas reference this entity by it.
    const MODEL_NAME: &'static str;

    /// The backing collection name.
    const COLLECTION_NAME: &'static str;

    /// Field descriptors used for relation-map construction.
    fn schema() -> Schema;

    /// The immutable identifier.
    fn id(&self) -> ObjectId;

    /// The resolution state of a relation field, or `None` for a field
    /// that is not a declared relation.
    fn relation_state(&self, field: &str) -> Option<RelationState>;

    /// Replaces a relation field with a resolved BSON value.
    fn set_relation(&mut self, field: &str, value: Bson) -> Result<()>;

    /// Recursively populates the nested fields of an already-resolved
    /// relation field.
    fn populate_nested<'a>(
        &'a mut self,
        field: &'a str,
        context: &'a Arc<DataContext>,
        spec: &'a PathSpec,
    ) -> BoxFuture<'a, Result<()>>;
}
