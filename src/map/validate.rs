use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::error::{SchemaError, SchemaIssue};
use super::graph::{Link, MapGraph, MapMeta, Metric, Node, Position, Quote, Report, TopicItem};

/// Checks referential integrity and required fields, collecting every issue.
pub fn validate(graph: &MapGraph) -> Result<(), SchemaError> {
    let mut issues = Vec::new();

    if graph.meta.title.trim().is_empty() {
        issues.push(SchemaIssue::new("meta.title", "is required"));
    }

    let mut ids = HashSet::with_capacity(graph.nodes.len());
    for (index, node) in graph.nodes.iter().enumerate() {
        let path = format!("nodes[{index}]");
        issues.extend(node_issues(node, &path));
        if !node.id.is_empty() && !ids.insert(node.id.as_str()) {
            issues.push(SchemaIssue::new(
                format!("{path}.id"),
                format!("duplicate node id `{}`", node.id),
            ));
        }
    }

    for (index, link) in graph.links.iter().enumerate() {
        for (field, endpoint) in [("source", &link.source), ("target", &link.target)] {
            let path = format!("links[{index}].{field}");
            if endpoint.is_empty() {
                issues.push(SchemaIssue::new(path, "is required"));
            } else if !ids.contains(endpoint.as_str()) {
                issues.push(SchemaIssue::new(
                    path,
                    format!("references unknown node `{endpoint}`"),
                ));
            }
        }
        if !link.strength.is_finite() {
            issues.push(SchemaIssue::new(
                format!("links[{index}].strength"),
                "must be a finite number",
            ));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(SchemaError { issues })
    }
}

/// Required-field checks for one node, reported under `path`.
pub(crate) fn node_issues(node: &Node, path: &str) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();
    for (field, value) in [
        ("id", &node.id),
        ("label", &node.label),
        ("type", &node.node_type),
    ] {
        if value.trim().is_empty() {
            issues.push(SchemaIssue::new(format!("{path}.{field}"), "is required"));
        }
    }
    if let Some(position) = node.position
        && !(position.x.is_finite() && position.y.is_finite())
    {
        issues.push(SchemaIssue::new(
            format!("{path}.position"),
            "must hold finite coordinates",
        ));
    }
    issues
}

/// Shape checks on the raw document before it is decoded into typed values.
///
/// Catches the structural mistakes serde would otherwise report with a less
/// useful location, such as `nodes` being an object or a node being a string.
pub(crate) fn document_shape(value: &Value) -> Result<(), SchemaError> {
    let Some(root) = value.as_object() else {
        return Err(SchemaError::single("$", "document must be a JSON object"));
    };

    let mut issues = Vec::new();
    match root.get("meta") {
        Some(Value::Object(_)) => {}
        Some(_) => issues.push(SchemaIssue::new("meta", "must be an object")),
        None => issues.push(SchemaIssue::new("meta", "is required")),
    }

    for key in ["nodes", "links"] {
        match root.get(key) {
            Some(Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    if !item.is_object() {
                        issues.push(SchemaIssue::new(
                            format!("{key}[{index}]"),
                            "must be an object",
                        ));
                    }
                }
            }
            Some(_) => issues.push(SchemaIssue::new(key, "must be an array")),
            None => issues.push(SchemaIssue::new(key, "is required")),
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(SchemaError { issues })
    }
}

fn array_items<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Decodes `value` into `T`, recording a failure at `path`.
fn decode<T: DeserializeOwned>(value: &Value, path: &str, issues: &mut Vec<SchemaIssue>) -> Option<T> {
    match T::deserialize(value) {
        Ok(decoded) => Some(decoded),
        Err(error) => {
            issues.push(SchemaIssue::new(path, error.to_string()));
            None
        }
    }
}

fn check_field<T: DeserializeOwned>(
    object: &Map<String, Value>,
    key: &str,
    path: &str,
    issues: &mut Vec<SchemaIssue>,
) {
    if let Some(value) = object.get(key) {
        decode::<T>(value, &format!("{path}.{key}"), issues);
    }
}

fn check_items<T: DeserializeOwned>(
    object: &Map<String, Value>,
    key: &str,
    path: &str,
    issues: &mut Vec<SchemaIssue>,
) {
    let path = format!("{path}.{key}");
    match object.get(key) {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for (index, item) in items.iter().enumerate() {
                decode::<T>(item, &format!("{path}[{index}]"), issues);
            }
        }
        Some(_) => issues.push(SchemaIssue::new(path, "must be an array")),
    }
}

fn node_field_issues(node: &Map<String, Value>, path: &str) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();
    for key in ["id", "label", "type"] {
        check_field::<String>(node, key, path, &mut issues);
    }
    check_field::<Option<i64>>(node, "group", path, &mut issues);
    check_field::<Option<f64>>(node, "size", path, &mut issues);
    check_field::<Option<Position>>(node, "position", path, &mut issues);
    check_field::<bool>(node, "pinned", path, &mut issues);

    match node.get("content") {
        None | Some(Value::Null) => {}
        Some(Value::Object(content)) => {
            let path = format!("{path}.content");
            for key in ["summary", "key_insight", "notes"] {
                check_field::<Option<String>>(content, key, &path, &mut issues);
            }
            check_items::<Metric>(content, "metrics", &path, &mut issues);
            check_items::<TopicItem>(content, "sub_topics", &path, &mut issues);
            check_items::<TopicItem>(content, "challenges", &path, &mut issues);
            check_items::<Quote>(content, "expert_quotes", &path, &mut issues);
            check_items::<Quote>(content, "quotes", &path, &mut issues);
            check_items::<Report>(content, "related_reports", &path, &mut issues);
        }
        Some(_) => issues.push(SchemaIssue::new(format!("{path}.content"), "must be an object")),
    }
    issues
}

/// Decodes a document that passed [`document_shape`], addressing type errors
/// by the field they occur in.
pub(crate) fn decode_document(value: &Value) -> Result<MapGraph, SchemaError> {
    let mut issues = Vec::new();

    let meta = match value.get("meta").and_then(Value::as_object) {
        Some(meta) => {
            check_field::<String>(meta, "title", "meta", &mut issues);
            check_field::<Option<String>>(meta, "description", "meta", &mut issues);
            decode::<MapMeta>(&value["meta"], "meta", &mut issues)
        }
        None => None,
    };

    let mut nodes = Vec::new();
    for (index, item) in array_items(value, "nodes").iter().enumerate() {
        let path = format!("nodes[{index}]");
        let field_issues = item
            .as_object()
            .map(|node| node_field_issues(node, &path))
            .unwrap_or_default();
        if field_issues.is_empty() {
            nodes.extend(decode::<Node>(item, &path, &mut issues));
        } else {
            issues.extend(field_issues);
        }
    }

    let mut links = Vec::new();
    for (index, item) in array_items(value, "links").iter().enumerate() {
        let path = format!("links[{index}]");
        let before = issues.len();
        if let Some(link) = item.as_object() {
            check_field::<String>(link, "relation", &path, &mut issues);
            check_field::<f64>(link, "strength", &path, &mut issues);
        }
        if issues.len() == before {
            links.extend(decode::<Link>(item, &path, &mut issues));
        }
    }

    match meta {
        Some(meta) if issues.is_empty() => Ok(MapGraph { meta, nodes, links }),
        _ => Err(SchemaError { issues }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::map::graph::{Link, MapMeta};

    fn graph(nodes: Vec<Node>, links: Vec<Link>) -> MapGraph {
        MapGraph {
            meta: MapMeta {
                title: "Test".to_owned(),
                ..MapMeta::default()
            },
            nodes,
            links,
        }
    }

    #[test]
    fn valid_graph_passes() {
        let graph = graph(
            vec![Node::new("a", "A", "macro"), Node::new("b", "B", "trend")],
            vec![Link::new("a", "b", "drives")],
        );
        assert!(validate(&graph).is_ok());
    }

    #[test]
    fn reports_every_issue_with_its_path() {
        let mut missing_title = graph(
            vec![
                Node::new("a", "A", "macro"),
                Node::new("a", "Again", "trend"),
                Node::new("", "Nameless", ""),
            ],
            vec![Link::new("a", "ghost", "x"), Link::new("", "a", "y")],
        );
        missing_title.meta.title.clear();

        let error = validate(&missing_title).expect_err("graph is invalid");
        for path in [
            "meta.title",
            "nodes[1].id",
            "nodes[2].id",
            "nodes[2].type",
            "links[0].target",
            "links[1].source",
        ] {
            assert!(error.mentions(path), "missing issue at {path}: {error:?}");
        }
        assert_eq!(error.issues.len(), 6);
    }

    #[test]
    fn shape_check_rejects_wrong_containers() {
        let error = document_shape(&json!({ "meta": {}, "nodes": {}, "links": [1] }))
            .expect_err("shape is wrong");
        assert!(error.mentions("nodes"));
        assert!(error.mentions("links[0]"));

        assert!(document_shape(&json!([])).is_err());
        assert!(document_shape(&json!({ "meta": {}, "nodes": [], "links": [] })).is_ok());
    }

    #[test]
    fn wrong_field_types_are_addressed_by_path() {
        let document = json!({
            "meta": { "title": "t" },
            "nodes": [
                { "id": "a", "label": "A", "type": "macro" },
                { "id": "b", "label": 5, "type": "trend", "group": 1.5 },
                { "id": "c", "label": "C", "type": "issue",
                  "content": { "sub_topics": ["ok", { "name": "fine" }, 7],
                               "metrics": [{ "label": "GDP", "value": "3%" }, "loose"] } }
            ],
            "links": [{ "source": "a", "target": "b", "strength": "high" }]
        });
        let error = decode_document(&document).expect_err("types are wrong");
        for path in [
            "nodes[1].label",
            "nodes[1].group",
            "nodes[2].content.sub_topics[2]",
            "nodes[2].content.metrics[1]",
            "links[0].strength",
        ] {
            assert!(error.mentions(path), "missing issue at {path}: {error:?}");
        }
        assert_eq!(error.issues.len(), 5);
    }

    #[test]
    fn well_typed_document_decodes() {
        let document = json!({
            "meta": { "title": "t" },
            "nodes": [{ "id": "a", "label": "A", "type": "macro",
                        "content": { "sub_topics": [{ "name": "x" }] } }],
            "links": []
        });
        let graph = decode_document(&document).expect("document is well typed");
        assert_eq!(graph.nodes[0].content.sub_topics[0].text(), "x");
    }
}
