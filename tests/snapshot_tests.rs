use bson::{Bson, DateTime, doc, oid::ObjectId};
use docgraph::{
    Connection, DocGraphError, EdgeRepository, NodeRepository, SnapshotOptions,
    clear_all_collections, clear_collection, create_snapshot, database_stats, drop_database,
    restore_snapshot,
};
use serde_json::Value;

fn seeded() -> (Connection, ObjectId, ObjectId) {
    let conn = Connection::in_memory("test_db").expect("conn");
    let nodes = NodeRepository::new(&conn);
    let a = nodes
        .add(doc! {
            "name": "A",
            "created": DateTime::from_millis(1_700_000_000_123),
            "properties": { "hp": 7_i64, "ratio": 0.5 },
        })
        .expect("a")
        .as_object_id()
        .expect("oid");
    let b = nodes
        .add(doc! { "name": "B" })
        .expect("b")
        .as_object_id()
        .expect("oid");
    EdgeRepository::new(&conn)
        .add_edge(a, b, Some(doc! { "type": "path" }))
        .expect("edge");
    conn.collection("events")
        .insert_one(doc! { "kind": "spawn", "node": a })
        .expect("event");
    (conn, a, b)
}

#[test]
fn test_snapshot_round_trip_preserves_bson_types() {
    let (conn, a, b) = seeded();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = create_snapshot(&conn, dir.path(), &SnapshotOptions::default()).expect("snapshot");
    let before = conn
        .collection("nodes")
        .find(&docgraph::Filter::All, &docgraph::FindOptions::default())
        .expect("find");

    NodeRepository::new(&conn).delete_by_name("A").expect("delete");
    NodeRepository::new(&conn)
        .add(doc! { "name": "intruder" })
        .expect("add");

    let report = restore_snapshot(&conn, &path).expect("restore");
    assert_eq!(report.collections.get("nodes"), Some(&2));
    assert_eq!(report.collections.get("events"), Some(&1));
    assert_eq!(report.documents(), 3);

    let after = conn
        .collection("nodes")
        .find(&docgraph::Filter::All, &docgraph::FindOptions::default())
        .expect("find");
    assert_eq!(after, before);

    let restored = NodeRepository::new(&conn)
        .get_by_id(a)
        .expect("get")
        .expect("A restored");
    assert!(matches!(restored.get("_id"), Some(Bson::ObjectId(_))));
    assert!(matches!(restored.get("created"), Some(Bson::DateTime(_))));
    let properties = restored.get_document("properties").expect("properties");
    assert!(matches!(properties.get("hp"), Some(Bson::Int64(7))));
    let edge = restored.get_array("connections").expect("connections")[0]
        .as_document()
        .expect("edge");
    assert_eq!(edge.get("to_node"), Some(&Bson::ObjectId(b)));
    assert!(
        NodeRepository::new(&conn)
            .get_by_name("intruder")
            .expect("get")
            .is_none()
    );
}

#[test]
fn test_snapshot_file_uses_prefix_and_canonical_encoding() {
    let (conn, a, _) = seeded();
    let dir = tempfile::tempdir().expect("tempdir");
    let nested = dir.path().join("backups").join("daily");
    let path = create_snapshot(&conn, &nested, &SnapshotOptions::with_prefix("campaign"))
        .expect("snapshot");

    assert_eq!(path.parent(), Some(nested.as_path()));
    let file_name = path.file_name().and_then(|n| n.to_str()).expect("name");
    assert!(file_name.starts_with("campaign_"));
    assert!(file_name.ends_with(".json"));
    // campaign_YYYYMMDD_HHMMSS.json
    assert_eq!(file_name.len(), "campaign_".len() + 15 + ".json".len());

    let raw: Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
    let first = &raw["nodes"][0];
    assert_eq!(first["_id"]["$oid"], Value::String(a.to_hex()));
    assert_eq!(first["created"]["$date"]["$numberLong"], "1700000000123");
    assert_eq!(first["properties"]["hp"]["$numberLong"], "7");
    assert_eq!(raw["events"][0]["node"]["$oid"], Value::String(a.to_hex()));
}

#[test]
fn test_restore_missing_file_leaves_database_untouched() {
    let (conn, _, _) = seeded();
    let dir = tempfile::tempdir().expect("tempdir");
    let err = restore_snapshot(&conn, dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, DocGraphError::SnapshotNotFound(_)));
    assert_eq!(database_stats(&conn).expect("stats").total(), 3);
}

#[test]
fn test_restore_rejects_malformed_snapshot_before_clearing() {
    let (conn, _, _) = seeded();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{ "nodes": "not an array" }"#).expect("write");
    let err = restore_snapshot(&conn, &path).unwrap_err();
    assert!(matches!(err, DocGraphError::InvalidInput(_)));
    assert_eq!(NodeRepository::new(&conn).count().expect("count"), 2);
}

#[test]
fn test_restore_leaves_unlisted_collections_alone() {
    let (conn, _, _) = seeded();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("partial.json");
    std::fs::write(&path, r#"{ "nodes": [ { "name": "solo" } ] }"#).expect("write");
    let report = restore_snapshot(&conn, &path).expect("restore");
    assert_eq!(report.documents(), 1);

    let stats = database_stats(&conn).expect("stats");
    assert_eq!(stats.counts.get("nodes"), Some(&1));
    assert_eq!(stats.counts.get("events"), Some(&1));
}

#[test]
fn test_stats_clear_and_drop() {
    let (conn, _, _) = seeded();
    let stats = database_stats(&conn).expect("stats");
    assert_eq!(stats.collections, vec!["events", "nodes"]);
    assert_eq!(stats.counts.get("nodes"), Some(&2));
    assert_eq!(stats.total(), 3);

    assert_eq!(clear_collection(&conn, "events").expect("clear"), 1);
    assert_eq!(clear_collection(&conn, "events").expect("clear again"), 0);
    let cleared = clear_all_collections(&conn).expect("clear all");
    assert_eq!(cleared.get("nodes"), Some(&2));
    assert_eq!(database_stats(&conn).expect("stats").total(), 0);

    NodeRepository::new(&conn)
        .add(doc! { "name": "again" })
        .expect("add");
    drop_database(&conn, "test_db").expect("drop");
    let stats = database_stats(&conn).expect("stats");
    assert!(stats.collections.is_empty());
    assert_eq!(stats.total(), 0);
}

#[test]
fn test_snapshot_of_empty_database() {
    let conn = Connection::in_memory("empty").expect("conn");
    let dir = tempfile::tempdir().expect("tempdir");
    let path = create_snapshot(&conn, dir.path(), &SnapshotOptions::default()).expect("snapshot");
    let raw: Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(raw, serde_json::json!({}));
    assert_eq!(restore_snapshot(&conn, &path).expect("restore").documents(), 0);
}
