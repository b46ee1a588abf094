use bson::{Bson, doc, oid::ObjectId};
use docgraph::{
    BackendKind, Connection, DocGraphError, DocumentStore, Filter, FindOptions, SortDirection,
    SqliteStore, StoreConfig, Update,
};

fn store() -> SqliteStore {
    SqliteStore::open_in_memory("test_db").expect("store")
}

#[test]
fn test_insert_assigns_object_id_first() {
    let store = store();
    let id = store
        .insert_one("things", doc! { "name": "lamp" })
        .expect("insert");
    assert!(matches!(id, Bson::ObjectId(_)));
    let found = store
        .find_one("things", &Filter::eq("name", "lamp"))
        .expect("find")
        .expect("present");
    assert_eq!(found.keys().next().map(String::as_str), Some("_id"));
    assert_eq!(found.get("_id"), Some(&id));
}

#[test]
fn test_duplicate_identifier_is_rejected() {
    let store = store();
    let id = ObjectId::new();
    store
        .insert_one("things", doc! { "_id": id, "n": 1 })
        .expect("insert");
    let err = store
        .insert_one("things", doc! { "_id": id, "n": 2 })
        .unwrap_err();
    assert!(matches!(err, DocGraphError::QueryError(_)));

    let err = store
        .insert_many(
            "fresh",
            vec![doc! { "_id": 1 }, doc! { "_id": 2 }, doc! { "_id": 1 }],
        )
        .unwrap_err();
    assert!(matches!(err, DocGraphError::QueryError(_)));
    assert_eq!(store.count_documents("fresh", &Filter::All).expect("count"), 0);
}

#[test]
fn test_collections_are_created_on_first_insert() {
    let store = store();
    assert!(store.list_collection_names().expect("names").is_empty());
    store.insert_one("b", doc! { "x": 1 }).expect("b");
    store
        .insert_many("a", vec![doc! { "x": 1 }, doc! { "x": 2 }])
        .expect("a");
    assert_eq!(store.list_collection_names().expect("names"), vec!["a", "b"]);
    assert_eq!(store.delete_many("a", &Filter::All).expect("delete"), 2);
    assert_eq!(store.list_collection_names().expect("names"), vec!["a", "b"]);
}

#[test]
fn test_find_with_filter_sort_and_limit() {
    let store = store();
    store
        .insert_many(
            "scores",
            vec![
                doc! { "who": "x", "score": 3 },
                doc! { "who": "y", "score": 10_i64 },
                doc! { "who": "z", "score": 7.5 },
                doc! { "who": "w" },
            ],
        )
        .expect("insert");

    let ranked = store
        .find(
            "scores",
            &Filter::All,
            &FindOptions::sorted("score", SortDirection::Descending).with_limit(3),
        )
        .expect("find");
    let order: Vec<&str> = ranked
        .iter()
        .map(|d| d.get_str("who").expect("who"))
        .collect();
    assert_eq!(order, vec!["y", "z", "x"]);

    let exact = store
        .find("scores", &Filter::eq("score", 10), &FindOptions::default())
        .expect("find");
    assert_eq!(exact.len(), 1);
    assert_eq!(
        store
            .count_documents("scores", &Filter::eq("score", Bson::Null))
            .expect("count"),
        1
    );
}

#[test]
fn test_push_pull_and_set_updates() {
    let store = store();
    let id = store
        .insert_one("nodes", doc! { "name": "n" })
        .expect("insert");
    let by_id = Filter::eq("_id", id.clone());

    let pushed = store
        .update_one(
            "nodes",
            &by_id,
            &Update::Push {
                field: "tags".into(),
                value: Bson::Document(doc! { "k": 1 }),
            },
        )
        .expect("push");
    assert_eq!((pushed.matched, pushed.modified), (1, 1));

    let pulled = store
        .update_one(
            "nodes",
            &by_id,
            &Update::Pull {
                field: "tags".into(),
                matching: doc! { "k": 2 },
            },
        )
        .expect("pull");
    assert_eq!((pulled.matched, pulled.modified), (1, 0));

    let err = store
        .update_one("nodes", &by_id, &Update::Set(doc! { "_id": ObjectId::new() }))
        .unwrap_err();
    assert!(matches!(err, DocGraphError::QueryError(_)));

    let err = store
        .update_one(
            "nodes",
            &by_id,
            &Update::Push {
                field: "name".into(),
                value: Bson::Int32(1),
            },
        )
        .unwrap_err();
    assert!(matches!(err, DocGraphError::QueryError(_)));
}

#[test]
fn test_replace_keeps_identifier() {
    let store = store();
    let id = store
        .insert_one("nodes", doc! { "name": "old", "extra": true })
        .expect("insert");
    let outcome = store
        .replace_one("nodes", &Filter::eq("name", "old"), doc! { "name": "new" })
        .expect("replace");
    assert_eq!(outcome.modified, 1);
    let replaced = store
        .find_one("nodes", &Filter::eq("_id", id.clone()))
        .expect("find")
        .expect("present");
    assert_eq!(replaced, doc! { "_id": id, "name": "new" });
}

#[test]
fn test_databases_share_a_file_but_not_documents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("docs.sqlite");
    let first = SqliteStore::open(&path, "first").expect("first");
    let second = SqliteStore::open(&path, "second").expect("second");
    first.insert_one("nodes", doc! { "name": "a" }).expect("insert");
    second.insert_one("nodes", doc! { "name": "b" }).expect("insert");

    assert_eq!(first.count_documents("nodes", &Filter::All).expect("count"), 1);
    second.drop_database("second").expect("drop");
    assert_eq!(second.count_documents("nodes", &Filter::All).expect("count"), 0);
    assert_eq!(first.count_documents("nodes", &Filter::All).expect("count"), 1);
}

#[test]
fn test_file_store_persists_across_connections() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("docs.sqlite");
    let config = StoreConfig::sqlite()
        .with_database("campaign")
        .with_sqlite_path(&path);
    {
        let conn = Connection::open(&config).expect("open");
        assert_eq!(conn.backend(), BackendKind::Sqlite);
        conn.collection("nodes")
            .insert_one(doc! { "name": "kept" })
            .expect("insert");
        conn.close().expect("close");
    }
    let conn = Connection::open(&config).expect("reopen");
    assert_eq!(conn.database_name(), "campaign");
    assert!(
        conn.collection("nodes")
            .find_one(&Filter::eq("name", "kept"))
            .expect("find")
            .is_some()
    );
}

#[test]
fn test_schema_version_is_recorded() {
    let store = store();
    assert_eq!(
        store.schema_version().expect("version"),
        Some(docgraph::schema::SCHEMA_VERSION)
    );
    let conn = Connection::from_store(store);
    assert_eq!(
        conn.schema_version().expect("version"),
        Some(docgraph::schema::SCHEMA_VERSION)
    );
}
