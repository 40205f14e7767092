//! Long-form documentation.

/// ## Getting started
///
/// The [`DomainModel`](crate::DomainModel) trait maps a Rust type to a
/// `MongoDB` collection. A type that derives
/// [`DomainModel`](crate::DomainModel) must:
/// - be a struct with named fields
/// - implement [`Serialize`](serde::Serialize) and `Deserialize`
/// - have a field named `id`, annotated with `#[serde(rename = "_id")]`,
///   of type [`ObjectId`](mongodb::bson::oid::ObjectId)
///
/// By default, the collection name is the snake-cased form of the struct
/// name (e.g. `User` → `user`). You can override this with the
/// `#[domain(collection = "custom_name")]` attribute; the model name, used
/// as the reference target by other entities, defaults to the struct name
/// and can be overridden with `#[domain(model = "CustomName")]`.
///
/// ### Example
///
/// ```rust,ignore
/// use serde::{Serialize, Deserialize};
/// use docent::{DomainModel, Relation};
/// use mongodb::bson::oid::ObjectId;
///
/// #[derive(Serialize, Deserialize, DomainModel)]
/// #[domain(collection = "users")]
/// struct User {
///   #[serde(rename = "_id")]
///   id: ObjectId,
///   name: String,
///   #[serde(default)]
///   #[domain(reference = "Book")]
///   books: Relation<Book>,
/// }
/// ```
pub mod defining_entities {}

/// ## Relations and population
///
/// A relation field holds a [`Relation<T>`](crate::Relation): either raw
/// foreign keys (`Key`/`Keys`), materialized entities (`One`/`Many`), or
/// `Empty`. On the wire a relation is always stored as its foreign key(s);
/// saving an entity never persists populated sub-documents.
///
/// Population resolves keys into entities, in place:
///
/// ```rust,ignore
/// let mut user = users.find_one(doc! { "name": "x" }).await?.unwrap();
///
/// // `user.books` is Relation::Keys(...) here; after the call it is
/// // Relation::Many(vec![Book, ...]).
/// users.populate(&mut user, &"books".parse()?).await?;
/// ```
///
/// Population is idempotent: fields that already hold entities are left
/// untouched, and a shallow spec with nothing left to resolve issues no
/// queries at all. `Empty` fields are skipped, never an error.
///
/// A deep spec recurses into the resolved entities:
///
/// ```rust,ignore
/// let spec = PathSpec::deep("books", PathSpec::deep("author", "books".parse()?)?)?;
/// users.populate(&mut user, &spec).await?;
///
/// // user.books[i].author.books is now a list of User-wrapped entities.
/// ```
///
/// Nested levels are always re-walked, even beneath fields that were
/// already resolved at the top: nested freshness is never assumed.
pub mod population {}

/// ## Contexts and entity sets
///
/// A [`Context`](crate::Context) declares which entity types belong
/// together; [`DataContext::attach`](crate::DataContext::attach) builds the
/// relation maps from their schemas and memoizes the result per context
/// name, so attaching the same context twice yields the identical instance.
///
/// Reference targets that are not registered in the context are skipped
/// when the relation map is built; populating such a field is a per-call
/// validation error.
///
/// [`EntitySet`](crate::EntitySet) is the per-type repository:
/// `find`/`find_one` wrap raw documents into entities, `save` upserts by
/// id, and the `populate` family resolves relations. Driver failures are
/// uniformly reported as `failed to <action> data`; the underlying cause is
/// logged at debug level and never surfaced.
pub mod contexts {}
