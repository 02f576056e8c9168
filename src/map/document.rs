use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use super::error::MapError;
use super::graph::MapGraph;
use super::validate::{decode_document, document_shape, validate};

/// Decodes and validates a `{meta, nodes, links}` document.
pub fn parse_document(text: &str) -> Result<MapGraph, MapError> {
    let value: Value = serde_json::from_str(text)?;
    graph_from_value(value)
}

pub(crate) fn graph_from_value(value: Value) -> Result<MapGraph, MapError> {
    document_shape(&value)?;
    let mut graph = decode_document(&value)?;
    for link in &mut graph.links {
        link.is_history_pointer = false;
    }
    validate(&graph)?;
    Ok(graph)
}

/// Pretty JSON in the input document shape.
pub fn export_document(graph: &MapGraph) -> Result<String, MapError> {
    Ok(serde_json::to_string_pretty(graph)?)
}

pub fn load_map_file(path: &Path) -> Result<MapGraph> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read map document {}", path.display()))?;
    let graph = parse_document(&text)
        .with_context(|| format!("rejected map document {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        nodes = graph.node_count(),
        links = graph.link_count(),
        "loaded map document"
    );
    Ok(graph)
}

pub fn write_map_file(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text)
        .with_context(|| format!("failed to write map document {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = text.len(), "exported map document");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r##"{
        "meta": { "title": "Energy", "version": "2.0" },
        "nodes": [
            { "id": "core", "label": "Energy", "type": "macro",
              "content": { "summary": "Root", "quotes": [{ "quote": "q", "author": "a" }] },
              "color": "#fff" },
            { "id": "grid", "label": "Grid", "type": "trend" }
        ],
        "links": [
            { "source": "core", "target": { "id": "grid" }, "relation": "drives",
              "isHistoryPointer": true, "weight": 2 }
        ]
    }"##;

    #[test]
    fn parses_and_normalizes_links() {
        let graph = parse_document(DOC).expect("document is valid");
        assert_eq!(graph.meta.title, "Energy");
        assert_eq!(graph.links[0].target, "grid");
        assert_eq!(graph.links[0].strength, 1.0);
        assert!(!graph.links[0].is_history_pointer);
        assert_eq!(graph.nodes[0].content.quotes.len(), 1);
        assert_eq!(graph.nodes[0].content.all_quotes().count(), 1);
        assert!(graph.nodes[0].extra.contains_key("color"));
    }

    #[test]
    fn export_keeps_unknown_keys_and_drops_synthetic_flags() {
        let graph = parse_document(DOC).expect("document is valid");
        let text = export_document(&graph).expect("serializable");
        assert!(text.contains("\"color\""));
        assert!(text.contains("\"weight\""));
        assert!(text.contains("\"version\""));
        assert!(!text.contains("isHistoryPointer"));
        assert_eq!(parse_document(&text).expect("round trip"), graph);
    }

    #[test]
    fn invalid_json_is_a_json_error() {
        assert!(matches!(parse_document("{ nope"), Err(MapError::Json(_))));
    }

    #[test]
    fn dangling_link_is_a_schema_error() {
        let doc = r#"{ "meta": { "title": "t" },
            "nodes": [{ "id": "a", "label": "A", "type": "macro" }],
            "links": [{ "source": "a", "target": "b" }] }"#;
        match parse_document(doc) {
            Err(MapError::Schema(error)) => assert!(error.mentions("links[0].target")),
            other => panic!("expected schema error, got {other:?}"),
        }
    }
}
