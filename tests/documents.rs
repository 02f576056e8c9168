mod common;

use std::fs;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{Value, json};

use strategic_map::engine::{EngineConfig, MapEngine};
use strategic_map::map::{
    MapError, Position, export_document, load_map_file, parse_document, parse_expansion,
    parse_synthesized_map, write_map_file,
};

use common::{abcd, arb_map};

#[test]
fn schema_errors_name_the_offending_field() {
    let text = r#"{"meta":{"title":"t"},"nodes":[{"id":"a","label":"A","type":"macro"},{"id":"b","type":"trend"}],"links":[]}"#;
    match parse_document(text) {
        Err(MapError::Schema(error)) => assert!(error.mentions("nodes[1].label"), "{error}"),
        other => panic!("expected a schema error, got {other:?}"),
    }
}

#[test]
fn rich_content_survives_import_and_export() {
    let document = json!({
        "meta": { "title": "Energy", "description": "Outlook", "version": "2.0" },
        "nodes": [
            {
                "id": "core", "label": "Energy", "type": "macro", "color": "#fff",
                "content": {
                    "summary": "Root",
                    "metrics": [{ "label": "GDP", "value": "3%", "trend": "up" }],
                    "quotes": [{ "quote": "Prices will rise", "author": "A", "source": "Reuters" }],
                    "sub_topics": ["storage", { "name": "grid", "weight": 2 }],
                    "challenges": [{ "title": "permits" }],
                    "related_reports": [{ "title": "IEA", "url": "https://example.org", "year": 2024 }],
                    "confidence": "high"
                }
            },
            { "id": "grid", "label": "Grid", "type": "trend" }
        ],
        "links": [
            { "source": "core", "target": "grid", "relation": "drives", "strength": 2.0, "weight": 2 }
        ]
    });

    let graph = parse_document(&document.to_string()).expect("document is valid");
    assert_eq!(graph.nodes[0].content.sub_topics[1].text(), "grid");
    assert_eq!(graph.nodes[0].content.all_quotes().count(), 1);

    let exported: Value =
        serde_json::from_str(&export_document(&graph).expect("serializable")).expect("valid JSON");
    assert_eq!(exported, document);
}

#[test]
fn mistyped_content_reports_its_path() {
    let text = r#"{"meta":{"title":"t"},"nodes":[{"id":"a","label":"A","type":"macro","content":{"sub_topics":[3]}}],"links":[]}"#;
    match parse_document(text) {
        Err(MapError::Schema(error)) => {
            assert!(error.mentions("nodes[0].content.sub_topics[0]"), "{error}");
        }
        other => panic!("expected a schema error, got {other:?}"),
    }
}

#[test]
fn exported_pins_reload_as_fixed_positions() {
    let mut engine = MapEngine::new(abcd(), EngineConfig::default()).expect("valid map");
    engine.pin("C", eframe::egui::vec2(-12.0, 48.0));
    let text = engine.export_document().expect("serializable");

    let reloaded = parse_document(&text).expect("exported map is valid");
    let c = reloaded.node("C").expect("C survives");
    assert!(c.pinned);
    assert_eq!(c.fixed_position(), Some(Position { x: -12.0, y: 48.0 }));

    let engine = MapEngine::new(reloaded, EngineConfig::default()).expect("valid map");
    assert!(engine.is_pinned("C"));
    assert_eq!(engine.position("C"), Some(eframe::egui::vec2(-12.0, 48.0)));
}

#[test]
fn files_round_trip_through_disk() {
    let path = std::env::temp_dir().join(format!("strategic-map-{}.json", std::process::id()));
    let text = export_document(&abcd()).expect("serializable");
    write_map_file(&path, &text).expect("temp dir is writable");
    let loaded = load_map_file(&path).expect("written map loads");
    let _ = fs::remove_file(&path);
    assert_eq!(loaded, abcd());
}

#[test]
fn missing_file_reports_its_path() {
    let path = std::env::temp_dir().join("strategic-map-does-not-exist.json");
    let error = load_map_file(&path).expect_err("file is missing");
    assert!(format!("{error:#}").contains("strategic-map-does-not-exist.json"));
}

#[test]
fn synthesized_reply_is_repaired_before_validation() {
    let reply = r#"Here is your map:
```json
{
  "nodes": [
    {"id": "grid", "label": "Grid", "type": "trend", "content": "Aging assets"},
    {"id": "energy", "label": "Energy", "type": "macro"}
  ],
  "links": [{"source": {"id": "energy"}, "target": {"id": "grid"}, "relation": "drives"}]
}
```"#;
    let (graph, focus) = parse_synthesized_map(reply).expect("repairable reply");
    assert_eq!(focus, "energy");
    assert_eq!(graph.meta.title, "Synthesized Map");
    assert_eq!(
        (graph.links[0].source.as_str(), graph.links[0].target.as_str()),
        ("energy", "grid")
    );
    assert_eq!(
        graph.node("grid").and_then(|node| node.content.summary.as_deref()),
        Some("Aging assets")
    );
}

#[test]
fn expansion_merges_under_parent_without_moving_focus() {
    let reply = r#"{"nodes":[{"id":"E","label":"E","type":"issue"},{"id":"A","label":"dup","type":"issue"}],
                   "links":[{"source":"E","target":"nowhere","relation":"x"}]}"#;
    let expansion = parse_expansion(reply).expect("well-formed reply");
    let mut engine = MapEngine::new(abcd(), EngineConfig::default()).expect("valid map");
    engine.merge_expansion("D", expansion).expect("D exists");

    assert_eq!(engine.focus(), "A");
    assert!(engine.graph().has_link_between("D", "E"));
    assert_eq!(engine.graph().node("A").map(|node| node.label.as_str()), Some("A"));
    assert_eq!(engine.graph().node_count(), 5);
}

proptest! {
    #[test]
    fn export_then_parse_is_identity(graph in arb_map(12)) {
        let text = export_document(&graph).expect("serializable");
        let parsed = parse_document(&text).expect("exported map is valid");
        prop_assert_eq!(parsed, graph);
    }
}
