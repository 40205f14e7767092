//! Storage contexts: the process-wide registry of entity sets.

use crate::{
    Binding, DomainModel, EntitySet, Error, Result,
    backend::Backend,
    schema::RelationMap,
};
use dashmap::DashMap;
use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{Arc, LazyLock},
};

static CONTEXTS: LazyLock<DashMap<&'static str, Arc<DataContext>>> = LazyLock::new(DashMap::new);

/// A declared storage context: a name plus the set of entity types it
/// registers.
///
/// ```rust,ignore
/// use docent::{Binding, Context};
///
/// struct Library;
///
/// impl Context for Library {
///     const NAME: &'static str = "library";
///
///     fn init() -> Vec<Binding> {
///         vec![Binding::of::<User>(), Binding::of::<Book>()]
///     }
/// }
/// ```
pub trait Context: 'static {
    /// Identifies the context in the process-wide registry.
    const NAME: &'static str;

    /// The bindings this context registers. Must be non-empty.
    fn init() -> Vec<Binding>;
}

/// A constructed storage context.
///
/// Built at most once per [`Context`] type: [`DataContext::attach`] memoizes
/// instances by context name, so attaching the same context twice yields the
/// identical `Arc`. Immutable after construction; entity sets, relation maps
/// and the backend handle are shared read-only state.
pub struct DataContext {
    backend: Arc<dyn Backend>,
    relations: HashMap<&'static str, Arc<RelationMap>>,
}

impl DataContext {
    /// Attaches a declared context to a backend, returning the memoized
    /// instance when the context was already attached.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error when `init` returns no bindings or
    /// bindings with duplicate model or collection names.
    pub fn attach<C: Context>(backend: Arc<dyn Backend>) -> Result<Arc<Self>> {
        if let Some(existing) = CONTEXTS.get(C::NAME) {
            return Ok(existing.clone());
        }

        let context = Arc::new(Self::build::<C>(backend)?);

        Ok(CONTEXTS.entry(C::NAME).or_insert(context).clone())
    }

    fn build<C: Context>(backend: Arc<dyn Backend>) -> Result<Self> {
        let bindings = C::init();

        if bindings.is_empty() {
            return Err(Error::configuration(format!(
                "context `{}` init returned no bindings",
                C::NAME
            )));
        }

        let mut models: HashMap<&'static str, &'static str> = HashMap::new();
        let mut collections: HashSet<&'static str> = HashSet::new();

        for binding in &bindings {
            let schema = binding.schema();

            if models.insert(schema.model, schema.collection).is_some() {
                return Err(Error::configuration(format!(
                    "model `{}` is bound twice in context `{}`",
                    schema.model,
                    C::NAME
                )));
            }

            if !collections.insert(schema.collection) {
                return Err(Error::configuration(format!(
                    "collection `{}` is bound twice in context `{}`",
                    schema.collection,
                    C::NAME
                )));
            }
        }

        let mut relations = HashMap::new();

        for binding in &bindings {
            let schema = binding.schema();
            let mut map = RelationMap::default();

            for (field, target) in schema.references() {
                match models.get(target) {
                    Some(collection) => map.insert(field, collection),
                    // A reference to a model outside this context is not an
                    // error here; populating that field later is.
                    None => tracing::trace!(
                        collection = schema.collection,
                        field,
                        target,
                        "reference target is not registered, skipping"
                    ),
                }
            }

            relations.insert(schema.collection, Arc::new(map));
        }

        tracing::debug!(
            context = C::NAME,
            collections = ?relations.keys().collect::<Vec<_>>(),
            "data context initialized"
        );

        Ok(Self { backend, relations })
    }

    /// The entity set for a registered domain type.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error when `T` was not registered by the
    /// context's `init`.
    pub fn entity_set<T: DomainModel>(self: &Arc<Self>) -> Result<EntitySet<T>> {
        let refs = self.relations.get(T::COLLECTION_NAME).ok_or_else(|| {
            Error::configuration(format!(
                "collection `{}` is not registered in this context",
                T::COLLECTION_NAME
            ))
        })?;

        Ok(EntitySet::new(self.clone(), refs.clone()))
    }

    /// The registered collection names.
    pub fn collections(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.relations.keys().copied()
    }

    pub(crate) fn relations(&self, collection: &str) -> Result<&Arc<RelationMap>> {
        self.relations.get(collection).ok_or_else(|| {
            Error::validation(format!(
                "populate options are invalid: collection `{collection}` is not registered"
            ))
        })
    }

    pub(crate) fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }
}

impl fmt::Debug for DataContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataContext")
            .field("collections", &self.relations.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
