use bson::{Bson, doc, oid::ObjectId};
use docgraph::{Connection, EdgeRepository, NodeRepository};

fn add_node(nodes: &NodeRepository<'_>, name: &str) -> ObjectId {
    nodes
        .add(doc! { "name": name })
        .expect("add")
        .as_object_id()
        .expect("oid")
}

#[test]
fn test_add_edge_embeds_target_and_properties() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let nodes = NodeRepository::new(&conn);
    let edges = EdgeRepository::new(&conn);
    let a = add_node(&nodes, "A");
    let b = add_node(&nodes, "B");

    assert!(
        edges
            .add_edge(a, b, Some(doc! { "type": "path", "distance": 5 }))
            .expect("add edge")
    );
    assert_eq!(
        edges.get_connections(a).expect("connections"),
        vec![doc! { "to_node": b, "type": "path", "distance": 5 }]
    );
    assert!(edges.get_connections(b).expect("connections").is_empty());
}

#[test]
fn test_add_edge_does_not_validate_target() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let nodes = NodeRepository::new(&conn);
    let edges = EdgeRepository::new(&conn);
    let a = add_node(&nodes, "A");
    let dangling = ObjectId::new();

    assert!(edges.add_edge(a, dangling, None).expect("add edge"));
    let connections = edges.get_connections(a).expect("connections");
    assert_eq!(connections.len(), 1);
    assert_eq!(
        connections[0].get_object_id("to_node").expect("to_node"),
        dangling
    );
}

#[test]
fn test_add_edge_from_missing_node_returns_false() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let edges = EdgeRepository::new(&conn);
    assert!(
        !edges
            .add_edge(ObjectId::new(), ObjectId::new(), None)
            .expect("add edge")
    );
}

#[test]
fn test_edges_keep_insertion_order_and_allow_duplicates() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let nodes = NodeRepository::new(&conn);
    let edges = EdgeRepository::new(&conn);
    let a = add_node(&nodes, "A");
    let b = add_node(&nodes, "B");
    let c = add_node(&nodes, "C");

    edges.add_edge(a, b, Some(doc! { "type": "road" })).expect("ab");
    edges.add_edge(a, c, None).expect("ac");
    edges.add_edge(a, b, Some(doc! { "type": "river" })).expect("ab again");

    let targets: Vec<Bson> = edges
        .get_connections(a)
        .expect("connections")
        .into_iter()
        .map(|edge| edge.get("to_node").cloned().expect("to_node"))
        .collect();
    assert_eq!(
        targets,
        vec![Bson::ObjectId(b), Bson::ObjectId(c), Bson::ObjectId(b)]
    );
}

#[test]
fn test_remove_edge_pulls_every_match_and_is_idempotent() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let nodes = NodeRepository::new(&conn);
    let edges = EdgeRepository::new(&conn);
    let a = add_node(&nodes, "A");
    let b = add_node(&nodes, "B");
    let c = add_node(&nodes, "C");
    edges.add_edge(a, b, None).expect("ab");
    edges.add_edge(a, c, None).expect("ac");
    edges.add_edge(a, b, Some(doc! { "type": "shortcut" })).expect("ab again");

    assert!(edges.remove_edge(a, b).expect("remove"));
    assert!(!edges.remove_edge(a, b).expect("remove again"));
    let remaining = edges.get_connections(a).expect("connections");
    assert_eq!(remaining, vec![doc! { "to_node": c }]);
}

#[test]
fn test_get_connections_of_missing_node_is_empty() {
    let conn = Connection::in_memory("test_db").expect("conn");
    let edges = EdgeRepository::new(&conn);
    assert!(
        edges
            .get_connections(ObjectId::new())
            .expect("connections")
            .is_empty()
    );
}
