use std::collections::{BTreeMap, BTreeSet};

use docgraph::{GraphStore, IdKey, Marker, Node, TraversalRow};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Doc {
    id: String,
    data: String,
}

impl Node for Doc {
    type Id = String;

    fn id(&self) -> String {
        self.id.clone()
    }
}

fn doc(id: &str) -> Doc {
    Doc {
        id: id.to_string(),
        data: format!("{id} body"),
    }
}

fn body(id: &str) -> String {
    serde_json::to_string(&doc(id)).expect("body")
}

/// A -> B -> C, both edges carrying the properties document `"some data"`.
fn chain_store() -> GraphStore {
    let store = GraphStore::open_in_memory().expect("store");
    for id in ["A", "B", "C"] {
        store.insert_node(&doc(id)).expect("node");
    }
    store.insert_edge_with_properties("A", "B", "some data").expect("A->B");
    store.insert_edge_with_properties("B", "C", "some data").expect("B->C");
    store
}

fn keys(ids: &[&str]) -> Vec<IdKey> {
    ids.iter().map(|id| IdKey::from_canonical(*id)).collect()
}

#[test]
fn test_outbound_traversal_reports_seed_then_targets() {
    let store = chain_store();
    assert_eq!(store.traverse("B", false, true).expect("traverse"), keys(&["B", "C"]));
    assert_eq!(
        store.traverse("A", false, true).expect("traverse"),
        keys(&["A", "B", "C"])
    );
}

#[test]
fn test_inbound_traversal_follows_edges_backwards() {
    let store = chain_store();
    assert_eq!(store.traverse("B", true, false).expect("traverse"), keys(&["B", "A"]));
    assert_eq!(
        store.traverse("C", true, false).expect("traverse"),
        keys(&["C", "B", "A"])
    );
}

#[test]
fn test_both_directions_reach_whole_component() {
    let store = chain_store();
    let ids = store.traverse("B", true, true).expect("traverse");
    assert_eq!(ids[0], IdKey::from_canonical("B"));
    let set: BTreeSet<_> = ids.iter().map(IdKey::as_str).collect();
    assert_eq!(set, BTreeSet::from(["A", "B", "C"]));
    assert_eq!(ids.len(), 3);
}

#[test]
fn test_no_direction_reports_only_the_seed() {
    let store = chain_store();
    assert_eq!(store.traverse("B", false, false).expect("traverse"), keys(&["B"]));
}

#[test]
fn test_unknown_seed_is_still_reported() {
    let store = chain_store();
    assert_eq!(store.traverse("Z", true, true).expect("traverse"), keys(&["Z"]));
    let rows = store.traverse_with_bodies("Z", true, true).expect("bodies");
    assert_eq!(
        rows,
        vec![TraversalRow {
            id: IdKey::from_canonical("Z"),
            marker: Marker::Node,
            document: None,
        }]
    );
}

#[test]
fn test_cycles_terminate_and_report_each_id_once() {
    let store = chain_store();
    store.insert_edge("C", "A").expect("C->A");
    store.insert_edge("C", "C").expect("C->C");
    assert_eq!(
        store.traverse("A", false, true).expect("traverse"),
        keys(&["A", "B", "C"])
    );
    let both = store.traverse("A", true, true).expect("traverse");
    assert_eq!(both.len(), 3);
}

#[test]
fn test_traversal_with_bodies_outbound() {
    let store = chain_store();
    let rows = store.traverse_with_bodies("B", false, true).expect("bodies");
    assert_eq!(
        rows,
        vec![
            TraversalRow {
                id: IdKey::from_canonical("B"),
                marker: Marker::Node,
                document: Some(body("B")),
            },
            TraversalRow {
                id: IdKey::from_canonical("C"),
                marker: Marker::Outbound,
                document: Some("\"some data\"".to_string()),
            },
            TraversalRow {
                id: IdKey::from_canonical("C"),
                marker: Marker::Node,
                document: Some(body("C")),
            },
        ]
    );
}

#[test]
fn test_traversal_with_bodies_inbound_uses_inbound_marker() {
    let store = chain_store();
    let rows = store.traverse_with_bodies("B", true, false).expect("bodies");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1].id.as_str(), "A");
    assert_eq!(rows[1].marker, Marker::Inbound);
    let props: Option<String> = rows[1].decode(store.codec()).expect("props");
    assert_eq!(props.as_deref(), Some("some data"));
    let node: Option<Doc> = rows[2].decode(store.codec()).expect("node");
    assert_eq!(node, Some(doc("A")));
}

#[test]
fn test_traversal_with_bodies_both_directions() {
    let store = chain_store();
    let rows = store.traverse_with_bodies("B", true, true).expect("bodies");
    assert_eq!(rows.len(), 5);

    assert_eq!(rows[0].id.as_str(), "B");
    assert_eq!(rows[0].marker, Marker::Node);
    assert_eq!(rows[0].document.as_deref(), Some(body("B").as_str()));

    let discovery: Vec<_> = rows[1..3]
        .iter()
        .map(|row| (row.id.as_str(), row.marker.as_str()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    assert_eq!(discovery, vec![("A", "<-"), ("C", "->")]);

    for row in &rows[3..] {
        assert_eq!(row.marker, Marker::Node);
        assert_eq!(row.document.as_deref(), Some(body(row.id.as_str()).as_str()));
    }
    assert_eq!(rows.iter().filter(|row| row.id.as_str() == "B").count(), 1);
}

#[test]
fn test_traversal_body_of_missing_node_is_null() {
    let store = chain_store();
    store.insert_edge("C", "ghost").expect("dangling");
    let rows = store.traverse_with_bodies("C", false, true).expect("bodies");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1].marker, Marker::Outbound);
    assert_eq!(rows[1].document, None);
    assert_eq!(rows[2].id.as_str(), "ghost");
    assert_eq!(rows[2].document, None);
}

#[test]
fn test_traverse_from_node_value() {
    let store = chain_store();
    assert_eq!(
        store.traverse_from(&doc("A"), false, true).expect("traverse"),
        keys(&["A", "B", "C"])
    );
}

#[test]
fn test_structured_ids_traverse_by_canonical_text() {
    #[derive(Serialize, Deserialize)]
    struct FileNode {
        id: (String, u32),
    }
    impl Node for FileNode {
        type Id = (String, u32);
        fn id(&self) -> (String, u32) {
            self.id.clone()
        }
    }

    let store = GraphStore::open_in_memory().expect("store");
    let a = FileNode {
        id: ("lib.rs".into(), 1),
    };
    let b = FileNode {
        id: ("main.rs".into(), 2),
    };
    store.insert_node(&a).expect("a");
    store.insert_node(&b).expect("b");
    store.insert_edge_between(&a, &b).expect("edge");

    let ids = store.traverse(&a.id, false, true).expect("traverse");
    assert_eq!(ids, keys(&[r#"["lib.rs",1]"#, r#"["main.rs",2]"#]));
    let decoded: (String, u32) = ids[1].decode(store.codec()).expect("decode");
    assert_eq!(decoded, ("main.rs".to_string(), 2));
}

/// A <-> B, B -> C, C -> A, C -> B; every edge carries its own properties.
fn cyclic_store() -> GraphStore {
    let store = GraphStore::open_in_memory().expect("store");
    for id in ["A", "B", "C"] {
        store.insert_node(&doc(id)).expect("node");
    }
    for (source, target) in [("A", "B"), ("B", "A"), ("B", "C"), ("C", "A"), ("C", "B")] {
        store
            .insert_edge_with_properties(source, target, &json!({ "edge": format!("{source}{target}") }))
            .expect("edge");
    }
    store
}

fn edge_doc(name: &str) -> Option<String> {
    Some(format!(r#"{{"edge":"{name}"}}"#))
}

#[test]
fn test_traversal_with_bodies_on_cycles() {
    let store = cyclic_store();
    let cases = [
        (
            false,
            true,
            BTreeMap::from([("B", (Marker::Outbound, "AB")), ("C", (Marker::Outbound, "BC"))]),
        ),
        (
            true,
            false,
            BTreeMap::from([("B", (Marker::Inbound, "BA")), ("C", (Marker::Inbound, "CA"))]),
        ),
        (
            true,
            true,
            BTreeMap::from([("B", (Marker::Outbound, "AB")), ("C", (Marker::Inbound, "CA"))]),
        ),
    ];

    for (inbound, outbound, expected) in cases {
        let ids = store.traverse("A", inbound, outbound).expect("traverse");
        let rows = store.traverse_with_bodies("A", inbound, outbound).expect("bodies");
        let mode = (inbound, outbound);
        assert_eq!(rows.len(), 5, "{mode:?}");

        assert_eq!(rows[0].id.as_str(), "A", "{mode:?}");
        assert_eq!(rows[0].marker, Marker::Node, "{mode:?}");
        assert_eq!(rows.iter().filter(|row| row.id.as_str() == "A").count(), 1, "{mode:?}");
        for id in ["B", "C"] {
            assert_eq!(rows.iter().filter(|row| row.id.as_str() == id).count(), 2, "{mode:?}");
        }

        let discovery: Vec<&IdKey> = rows[1..3].iter().map(|row| &row.id).collect();
        let bodies: Vec<&IdKey> = rows[3..].iter().map(|row| &row.id).collect();
        let reached: Vec<&IdKey> = ids[1..].iter().collect();
        assert_eq!(discovery, reached, "{mode:?}");
        assert_eq!(bodies, reached, "{mode:?}");

        for row in &rows[1..3] {
            let (marker, edge) = expected[row.id.as_str()];
            assert_eq!(row.marker, marker, "{mode:?} {}", row.id);
            assert_eq!(row.document, edge_doc(edge), "{mode:?} {}", row.id);
        }
        for row in &rows[3..] {
            assert_eq!(row.marker, Marker::Node);
            assert_eq!(row.document.as_deref(), Some(body(row.id.as_str()).as_str()));
        }
    }
}

#[test]
fn test_traversal_with_bodies_on_dense_graph() {
    let store = GraphStore::open_in_memory().expect("store");
    let width = 40;
    for source in 0..width {
        for target in 0..width {
            if source != target {
                store
                    .insert_edge_with_properties(
                        &format!("n{source}"),
                        &format!("n{target}"),
                        &json!({ "from": source, "to": target }),
                    )
                    .expect("edge");
            }
        }
    }

    let ids = store.traverse("n0", true, true).expect("traverse");
    assert_eq!(ids.len(), width);
    let rows = store.traverse_with_bodies("n0", true, true).expect("bodies");
    assert_eq!(rows.len(), 2 * width - 1);
    for row in &rows[1..width] {
        assert_eq!(row.marker, Marker::Outbound, "{}", row.id);
        let props: serde_json::Value = row
            .decode(store.codec())
            .expect("props")
            .expect("present");
        assert_eq!(props["from"], 0, "{}", row.id);
    }
}
