#![allow(dead_code)]

use proptest::prelude::*;

use strategic_map::map::{Link, MapGraph, MapMeta, Node};

const TYPES: [&str; 6] = ["macro", "trend", "risk", "issue", "satellite", "signal"];
const STRENGTHS: [f64; 4] = [0.5, 1.0, 2.0, 3.0];

pub fn node_id(index: usize) -> String {
    format!("n{index}")
}

pub fn map(nodes: Vec<Node>, links: Vec<Link>) -> MapGraph {
    MapGraph {
        meta: MapMeta {
            title: "Test Map".to_owned(),
            ..MapMeta::default()
        },
        nodes,
        links,
    }
}

/// A → B, A → C, C → D.
pub fn abcd() -> MapGraph {
    map(
        vec![
            Node::new("A", "A", "macro"),
            Node::new("B", "B", "trend"),
            Node::new("C", "C", "trend"),
            Node::new("D", "D", "issue"),
        ],
        vec![
            Link::new("A", "B", "drives"),
            Link::new("A", "C", "drives"),
            Link::new("C", "D", "drives"),
        ],
    )
}

/// Valid maps of 1..`max_nodes` nodes with arbitrary links between distinct nodes.
pub fn arb_map(max_nodes: usize) -> impl Strategy<Value = MapGraph> {
    (1..=max_nodes).prop_flat_map(|count| {
        let nodes = proptest::collection::vec((0..TYPES.len(), any::<bool>()), count);
        let links = proptest::collection::vec(
            (0..count, 0..count, 0..STRENGTHS.len()),
            0..count * 3,
        );
        (nodes, links).prop_map(move |(nodes, links)| {
            let nodes = nodes
                .into_iter()
                .enumerate()
                .map(|(index, (kind, summary))| {
                    let node = Node::new(node_id(index), format!("Node {index}"), TYPES[kind]);
                    if summary {
                        node.with_summary(format!("About node {index}"))
                    } else {
                        node
                    }
                })
                .collect();
            let links = links
                .into_iter()
                .filter(|(source, target, _)| source != target)
                .map(|(source, target, strength)| {
                    Link::new(node_id(source), node_id(target), "relates")
                        .with_strength(STRENGTHS[strength])
                })
                .collect();
            map(nodes, links)
        })
    })
}

/// A map plus two node indices inside it.
pub fn arb_map_with_pair(max_nodes: usize) -> impl Strategy<Value = (MapGraph, String, String)> {
    arb_map(max_nodes).prop_flat_map(|graph| {
        let count = graph.node_count();
        (Just(graph), 0..count, 0..count)
            .prop_map(|(graph, a, b)| (graph, node_id(a), node_id(b)))
    })
}
