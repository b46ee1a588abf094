use bson::{Bson, doc, oid::ObjectId};
use docgraph::{
    Connection, DocGraphError, ListOptions, NodeRepository, SortDirection, parse_object_id,
};
use serde_json::json;

fn names(nodes: &[bson::Document]) -> Vec<&str> {
    nodes
        .iter()
        .map(|node| node.get_str("name").expect("name"))
        .collect()
}

#[test]
fn test_add_defaults_connections_and_notes() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let nodes = NodeRepository::new(&conn);
    let id = nodes
        .add(doc! { "name": "Village", "type": "location" })
        .expect("add");
    assert!(matches!(id, Bson::ObjectId(_)));

    let node = nodes.get_by_name("Village").expect("get").expect("present");
    assert_eq!(node.get("_id"), Some(&id));
    assert!(node.get_array("connections").expect("connections").is_empty());
    assert!(
        node.get_array("next_interaction_notes")
            .expect("notes")
            .is_empty()
    );
}

#[test]
fn test_add_keeps_supplied_lists() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let nodes = NodeRepository::new(&conn);
    nodes
        .add(doc! { "name": "npc", "next_interaction_notes": ["hello"] })
        .expect("add");
    let node = nodes.get_by_name("npc").expect("get").expect("present");
    assert_eq!(
        node.get_array("next_interaction_notes").expect("notes"),
        &vec![Bson::String("hello".into())]
    );
}

#[test]
fn test_add_without_name_is_validation_error() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let nodes = NodeRepository::new(&conn);
    let err = nodes.add(doc! { "type": "location" }).unwrap_err();
    assert!(matches!(err, DocGraphError::ValidationError(_)));
    assert_eq!(nodes.count().expect("count"), 0);
}

#[test]
fn test_add_value_rejects_non_objects() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let nodes = NodeRepository::new(&conn);
    let err = nodes.add_value(json!("just a string")).unwrap_err();
    assert!(matches!(err, DocGraphError::TypeError(_)));
    nodes
        .add_value(json!({ "name": "Forest", "properties": { "danger": 3 } }))
        .expect("add object");
    let node = nodes.get_by_name("Forest").expect("get").expect("present");
    assert_eq!(
        node.get_document("properties")
            .expect("properties")
            .get_i32("danger")
            .expect("danger"),
        3
    );
}

#[test]
fn test_lookups_return_none_when_absent() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let nodes = NodeRepository::new(&conn);
    assert!(nodes.get_by_name("ghost").expect("get").is_none());
    assert!(nodes.get_by_id(ObjectId::new()).expect("get").is_none());
}

#[test]
fn test_get_by_id_finds_inserted_node() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let nodes = NodeRepository::new(&conn);
    let id = nodes.add(doc! { "name": "Castle" }).expect("add");
    let oid = parse_object_id(&id.as_object_id().expect("oid").to_hex()).expect("parse");
    let node = nodes.get_by_id(oid).expect("get").expect("present");
    assert_eq!(node.get_str("name").expect("name"), "Castle");
}

#[test]
fn test_malformed_identifier_is_rejected() {
    let err = parse_object_id("12345").unwrap_err();
    assert!(matches!(err, DocGraphError::InvalidId(_)));
}

#[test]
fn test_update_merges_fields_and_reports_modifications() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let nodes = NodeRepository::new(&conn);
    let id = nodes
        .add(doc! { "name": "Tavern", "type": "location", "properties": { "rooms": 4 } })
        .expect("add")
        .as_object_id()
        .expect("oid");

    let modified = nodes
        .update(id, doc! { "properties.rooms": 6, "owner": "Mara" })
        .expect("update");
    assert_eq!(modified, 1);
    let node = nodes.get_by_id(id).expect("get").expect("present");
    assert_eq!(node.get_str("type").expect("type"), "location");
    assert_eq!(node.get_str("owner").expect("owner"), "Mara");
    assert_eq!(
        node.get_document("properties")
            .expect("properties")
            .get_i32("rooms")
            .expect("rooms"),
        6
    );

    let unchanged = nodes.update(id, doc! { "owner": "Mara" }).expect("update");
    assert_eq!(unchanged, 0);
    assert_eq!(
        nodes
            .update(ObjectId::new(), doc! { "owner": "x" })
            .expect("update missing"),
        0
    );
}

#[test]
fn test_update_with_no_fields_is_rejected() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let nodes = NodeRepository::new(&conn);
    let err = nodes.update(ObjectId::new(), doc! {}).unwrap_err();
    assert!(matches!(err, DocGraphError::ValidationError(_)));
}

#[test]
fn test_delete_by_name_removes_one_node() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let nodes = NodeRepository::new(&conn);
    nodes.add(doc! { "name": "Bridge" }).expect("add");
    assert_eq!(nodes.delete_by_name("Bridge").expect("delete"), 1);
    assert_eq!(nodes.delete_by_name("Bridge").expect("delete again"), 0);
    assert!(nodes.get_by_name("Bridge").expect("get").is_none());
}

#[test]
fn test_list_sorts_descending_with_limit() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let nodes = NodeRepository::new(&conn);
    for name in ["b", "a", "c"] {
        nodes.add(doc! { "name": name }).expect("add");
    }
    let listed = nodes
        .list(&ListOptions::sorted_by("name", SortDirection::from_flag(-1)).with_limit(2))
        .expect("list");
    assert_eq!(names(&listed), vec!["c", "b"]);
}

#[test]
fn test_list_defaults_to_insertion_order_and_ascending_sort() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let nodes = NodeRepository::new(&conn);
    for name in ["b", "a", "c"] {
        nodes.add(doc! { "name": name }).expect("add");
    }
    let all = nodes.list(&ListOptions::default()).expect("list");
    assert_eq!(names(&all), vec!["b", "a", "c"]);

    let sorted = nodes
        .list(&ListOptions {
            sort_field: Some("name".into()),
            ..ListOptions::default()
        })
        .expect("list");
    assert_eq!(names(&sorted), vec!["a", "b", "c"]);
}
