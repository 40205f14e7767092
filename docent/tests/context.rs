mod common;

use common::{Book, MemoryBackend, Publisher, User, attach};
use docent::{
    Binding, Context, DataContext, DomainModel, Error, QueryOptions, Relation,
    mongodb::bson::{Bson, doc, oid::ObjectId},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn user(name: &str) -> User {
    User {
        id: ObjectId::new(),
        name: name.to_owned(),
        books: Relation::Empty,
    }
}

#[tokio::test]
async fn attach_is_memoized_per_context() {
    crate::context_fixture!(Memoized);

    let first = DataContext::attach::<Memoized>(Arc::new(MemoryBackend::default())).unwrap();
    let second = DataContext::attach::<Memoized>(Arc::new(MemoryBackend::default())).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn empty_context_is_rejected() {
    struct Empty;

    impl Context for Empty {
        const NAME: &'static str = "Empty";

        fn init() -> Vec<Binding> {
            vec![]
        }
    }

    let err = DataContext::attach::<Empty>(Arc::new(MemoryBackend::default())).unwrap_err();

    assert!(matches!(err, Error::Configuration { .. }));
    assert!(err.to_string().contains("no bindings"));
}

#[tokio::test]
async fn duplicate_model_is_rejected() {
    struct Doubled;

    impl Context for Doubled {
        const NAME: &'static str = "Doubled";

        fn init() -> Vec<Binding> {
            vec![Binding::of::<User>(), Binding::of::<User>()]
        }
    }

    let err = DataContext::attach::<Doubled>(Arc::new(MemoryBackend::default())).unwrap_err();

    assert!(matches!(err, Error::Configuration { .. }));
    assert!(err.to_string().contains("`User`"));
}

#[tokio::test]
async fn duplicate_collection_is_rejected() {
    #[derive(Debug, Serialize, Deserialize, DomainModel)]
    #[domain(collection = "users", model = "Account")]
    struct Account {
        #[serde(rename = "_id")]
        id: ObjectId,
        name: String,
    }

    struct Clashing;

    impl Context for Clashing {
        const NAME: &'static str = "Clashing";

        fn init() -> Vec<Binding> {
            vec![Binding::of::<User>(), Binding::of::<Account>()]
        }
    }

    let err = DataContext::attach::<Clashing>(Arc::new(MemoryBackend::default())).unwrap_err();

    assert!(matches!(err, Error::Configuration { .. }));
    assert!(err.to_string().contains("`users`"));
}

#[tokio::test]
async fn unregistered_type_has_no_entity_set() {
    crate::context_fixture!(NoPublishers);
    let (_, context) = attach::<NoPublishers>();

    let err = context.entity_set::<Publisher>().unwrap_err();

    assert!(matches!(err, Error::Configuration { .. }));
    assert!(err.to_string().contains("`publishers`"));
}

#[tokio::test]
async fn relation_maps_reflect_registered_targets() {
    crate::context_fixture!(RelationMaps);
    let (_, context) = attach::<RelationMaps>();

    let mut collections: Vec<&str> = context.collections().collect();
    collections.sort_unstable();
    assert_eq!(collections, ["books", "users"]);

    let users = context.entity_set::<User>().unwrap();
    assert_eq!(users.relations().target("books"), Some("books"));
    assert_eq!(users.relations().len(), 1);

    // Publisher is not bound, so Book's publisher reference is dropped
    // from the map.
    let books = context.entity_set::<Book>().unwrap();
    assert_eq!(books.relations().target("author"), Some("users"));
    assert_eq!(books.relations().target("publisher"), None);
    assert_eq!(books.relations().len(), 1);
}

#[tokio::test]
async fn save_upserts_and_updates() {
    crate::context_fixture!(SaveUpserts);
    let (_, context) = attach::<SaveUpserts>();

    let users = context.entity_set::<User>().unwrap();

    let mut entity = user("before");
    users.save(&entity).await.unwrap();

    let found = users.find_one(doc! { "_id": entity.id }).await.unwrap().unwrap();
    assert_eq!(found.name, "before");

    entity.name = "after".to_owned();
    users.save(&entity).await.unwrap();

    let found = users.find_one(doc! { "_id": entity.id }).await.unwrap().unwrap();
    assert_eq!(found.name, "after");
    assert_eq!(users.count(doc! {}).await.unwrap(), 1, "save by id never duplicates");
}

#[tokio::test]
async fn remove_deletes_by_id() {
    crate::context_fixture!(RemoveById);
    let (_, context) = attach::<RemoveById>();

    let users = context.entity_set::<User>().unwrap();

    let keep = user("keep");
    let drop = user("drop");
    users.insert_many(&[keep.clone(), drop.clone()]).await.unwrap();

    users.remove(&drop).await.unwrap();

    assert!(users.find_one(doc! { "_id": drop.id }).await.unwrap().is_none());
    assert!(users.find_one(doc! { "_id": keep.id }).await.unwrap().is_some());
}

#[tokio::test]
async fn find_and_update_reports_matches() {
    crate::context_fixture!(FindAndUpdate);
    let (_, context) = attach::<FindAndUpdate>();

    let users = context.entity_set::<User>().unwrap();

    users
        .insert_many(&[user("twin"), user("twin"), user("other")])
        .await
        .unwrap();

    let matched = users
        .find_and_update(
            doc! { "name": "twin" },
            doc! { "$set": { "name": "renamed" } },
            false,
        )
        .await
        .unwrap();

    assert_eq!(matched, 2);
    assert_eq!(users.count(doc! { "name": "renamed" }).await.unwrap(), 2);

    let removed = users.find_and_remove(doc! { "name": "renamed" }).await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(users.count(doc! {}).await.unwrap(), 1);
}

#[tokio::test]
async fn distinct_collects_unique_values() {
    crate::context_fixture!(Distinct);
    let (_, context) = attach::<Distinct>();

    let users = context.entity_set::<User>().unwrap();

    users
        .insert_many(&[user("ada"), user("ada"), user("grace")])
        .await
        .unwrap();

    let names = users.distinct("name", doc! {}).await.unwrap();
    assert_eq!(
        names,
        vec![Bson::String("ada".to_owned()), Bson::String("grace".to_owned())]
    );
}

#[tokio::test]
async fn find_with_opts_applies_cursor_modifiers() {
    crate::context_fixture!(CursorOpts);
    let (_, context) = attach::<CursorOpts>();

    let users = context.entity_set::<User>().unwrap();

    users
        .insert_many(&[user("a"), user("b"), user("c"), user("d")])
        .await
        .unwrap();

    let page = users
        .find_with_opts(
            doc! {},
            QueryOptions {
                skip: Some(1),
                limit: Some(2),
                sort: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page[0].name, "b");
    assert_eq!(page[1].name, "c");
}

#[tokio::test]
async fn projected_queries_return_raw_documents() {
    crate::context_fixture!(Projected);
    let (_, context) = attach::<Projected>();

    let users = context.entity_set::<User>().unwrap();

    let entity = user("partial");
    users.save(&entity).await.unwrap();

    let document = users
        .find_one_projected(doc! { "_id": entity.id }, doc! { "name": 1 })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(document.get_str("name").unwrap(), "partial");
    assert_eq!(document.get_object_id("_id").unwrap(), entity.id);
    assert!(!document.contains_key("books"));
}

#[tokio::test]
async fn query_failures_use_the_uniform_message() {
    crate::context_fixture!(FailedFind);
    let (backend, context) = attach::<FailedFind>();

    let users = context.entity_set::<User>().unwrap();

    backend.set_fail_reads(true);
    let err = users.find(doc! {}).await.unwrap_err();

    assert!(matches!(err, Error::Query { action: "find" }));
    assert_eq!(err.to_string(), "failed to find data");
}
