//! Turning free-form language-model replies into map documents.
//!
//! The model is treated as an opaque text completion. Replies are cleaned up,
//! shape-repaired, and validated like any other document before they reach a
//! [`MapGraph`].

use std::collections::HashSet;
use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, anyhow};
use serde_json::{Map, Value};

use super::document::graph_from_value;
use super::error::MapError;
use super::graph::{Link, MapGraph, Node};

const JSON_ONLY: &str = "Return ONLY one valid JSON object. No markdown fences, no commentary. \
Start with { and end with }.";

const SYNTHESIS_PROMPT: &str = "You are an intelligence analyst. Produce a strategic \
intelligence map as JSON with keys `meta` ({title, description}), `nodes` \
([{id, label, type, content: {summary, key_insight, metrics, sub_topics, challenges}}]) and \
`links` ([{source, target, relation, strength}]). Use exactly one `macro` node for the core \
topic, 3 to 5 `trend` nodes linked to it, and `peripheral_topic` nodes linked to the trends. \
Use snake_case ids and make every link endpoint match a node id.";

const EXPANSION_PROMPT: &str = "You are an intelligence analyst extending an existing map. \
Return JSON with keys `nodes` and `links` describing 2 to 5 new nodes that elaborate the \
given parent node. Use snake_case ids that do not collide with the listed existing ids. \
Links may point at the parent id or at other new nodes.";

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("reply does not contain a JSON object")]
    NoJsonObject,

    #[error("reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reply must be an object with `nodes` and `links` arrays")]
    MissingCollections,

    #[error(transparent)]
    Map(#[from] MapError),
}

/// An opaque text completion backend.
pub trait CompletionService: Send + Sync {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> anyhow::Result<String>;
}

/// Runs an external command, writing the prompts to stdin and reading the reply from stdout.
#[derive(Clone, Debug)]
pub struct CommandCompletion {
    program: String,
    args: Vec<String>,
}

impl CommandCompletion {
    /// Splits a shell-like command line on whitespace.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_owned);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl CompletionService for CommandCompletion {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> anyhow::Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn completion command {}", self.program))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("completion command has no stdin"))?;
        write!(stdin, "{system_prompt}\n\n{user_prompt}\n")
            .context("failed to send prompt to completion command")?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .context("completion command did not finish")?;
        if output.status.success() {
            String::from_utf8(output.stdout).context("completion output was not valid UTF-8")
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(anyhow!("completion command {} failed: {stderr}", self.program))
        }
    }
}

/// Strips markdown fences and keeps the text from the first `{` to the last `}`.
pub fn extract_json_object(reply: &str) -> Option<&str> {
    let mut text = reply.trim();
    text = text.strip_prefix("```json").unwrap_or(text);
    text = text.strip_prefix("```").unwrap_or(text);
    text = text.strip_suffix("```").unwrap_or(text);

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn reply_object(reply: &str) -> Result<Map<String, Value>, SynthesisError> {
    let json = extract_json_object(reply).ok_or(SynthesisError::NoJsonObject)?;
    match serde_json::from_str(json)? {
        Value::Object(object) => Ok(object),
        _ => Err(SynthesisError::NoJsonObject),
    }
}

/// Link endpoints as objects become ids; missing titles and content get defaults.
fn repair_shape(object: &mut Map<String, Value>) -> Result<(), SynthesisError> {
    if !matches!(object.get("nodes"), Some(Value::Array(_)))
        || !matches!(object.get("links"), Some(Value::Array(_)))
    {
        return Err(SynthesisError::MissingCollections);
    }

    let meta = object
        .entry("meta")
        .or_insert_with(|| Value::Object(Map::new()));
    if !meta.is_object() {
        *meta = Value::Object(Map::new());
    }
    if let Some(meta) = meta.as_object_mut() {
        let has_title = meta
            .get("title")
            .and_then(Value::as_str)
            .is_some_and(|title| !title.trim().is_empty());
        if !has_title {
            meta.insert(
                "title".to_owned(),
                Value::String("Synthesized Map".to_owned()),
            );
        }
    }

    if let Some(Value::Array(nodes)) = object.get_mut("nodes") {
        for node in nodes.iter_mut().filter_map(Value::as_object_mut) {
            let content = match node.remove("content") {
                Some(Value::Object(content)) => content,
                Some(Value::String(summary)) => {
                    Map::from_iter([("summary".to_owned(), Value::String(summary))])
                }
                _ => Map::new(),
            };
            node.insert("content".to_owned(), Value::Object(content));
            if !node.contains_key("label")
                && let Some(id) = node.get("id").cloned()
            {
                node.insert("label".to_owned(), id);
            }
        }
    }

    if let Some(Value::Array(links)) = object.get_mut("links") {
        for link in links.iter_mut().filter_map(Value::as_object_mut) {
            for key in ["source", "target"] {
                if let Some(Value::Object(endpoint)) = link.get(key)
                    && let Some(id) = endpoint.get("id").cloned()
                {
                    link.insert(key.to_owned(), id);
                }
            }
        }
    }

    Ok(())
}

/// Parses a full-map reply into a validated graph and the node to center on.
pub fn parse_synthesized_map(reply: &str) -> Result<(MapGraph, String), SynthesisError> {
    let mut object = reply_object(reply)?;
    repair_shape(&mut object)?;
    let graph = graph_from_value(Value::Object(object))?;

    let focus = graph
        .nodes
        .iter()
        .find(|node| node.kind().is_root())
        .or_else(|| graph.nodes.first())
        .map(|node| node.id.clone())
        .ok_or(MapError::EmptyGraph)?;
    Ok((graph, focus))
}

/// New nodes and links proposed for one parent node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Expansion {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

pub fn parse_expansion(reply: &str) -> Result<Expansion, SynthesisError> {
    let mut object = reply_object(reply)?;
    repair_shape(&mut object)?;

    let nodes = match object.remove("nodes") {
        Some(value) => serde_json::from_value(value)?,
        None => Vec::new(),
    };
    let links = match object.remove("links") {
        Some(value) => serde_json::from_value(value)?,
        None => Vec::new(),
    };
    Ok(Expansion { nodes, links })
}

/// Merges an expansion under `parent`.
///
/// Nodes whose id already exists or that fail validation are skipped and links
/// touching unknown ids are dropped. New nodes left without any link are
/// linked from `parent`, and if the fragment as a whole does not touch the
/// existing map its first node is linked from `parent` too. The focus is
/// never changed here.
pub fn merge_expansion(
    graph: &MapGraph,
    parent: &str,
    expansion: Expansion,
) -> Result<MapGraph, MapError> {
    if !graph.contains(parent) {
        return Err(MapError::UnknownNode {
            id: parent.to_owned(),
        });
    }

    let mut merged = graph.clone();
    let mut added = Vec::new();
    for node in expansion.nodes {
        let id = node.id.clone();
        match merged.add_node(node) {
            Ok(next) => {
                merged = next;
                added.push(id);
            }
            Err(error) => tracing::debug!(node = %id, %error, "skipped expansion node"),
        }
    }

    for link in expansion.links {
        match merged.add_link(link) {
            Ok(next) => merged = next,
            Err(error) => tracing::debug!(%error, "skipped expansion link"),
        }
    }

    for id in &added {
        if merged.degree_of(id) == 0 {
            merged = merged.add_link(Link::new(parent, id.as_str(), "expands"))?;
        }
    }

    let added_set: HashSet<&str> = added.iter().map(String::as_str).collect();
    let anchored = merged.links.iter().any(|link| {
        added_set.contains(link.source.as_str()) != added_set.contains(link.target.as_str())
    });
    if !anchored && let Some(first) = added.first() {
        merged = merged.add_link(Link::new(parent, first.as_str(), "expands"))?;
    }

    tracing::info!(parent, added = added.len(), "merged expansion into map");
    Ok(merged)
}

/// Asks `service` for a complete map about `topic`.
pub fn synthesize_map(
    service: &dyn CompletionService,
    topic: &str,
) -> anyhow::Result<(MapGraph, String)> {
    let system_prompt = format!("{SYNTHESIS_PROMPT}\n\n{JSON_ONLY}");
    let reply = service
        .complete(&system_prompt, topic)
        .context("map synthesis request failed")?;
    parse_synthesized_map(&reply).context("map synthesis reply was rejected")
}

/// Asks `service` for new nodes elaborating `parent`.
pub fn expand_node(
    service: &dyn CompletionService,
    graph: &MapGraph,
    parent: &str,
) -> anyhow::Result<Expansion> {
    let node = graph
        .node(parent)
        .ok_or_else(|| anyhow!("node `{parent}` does not exist in the map"))?;
    let existing = graph
        .nodes
        .iter()
        .map(|node| node.id.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let user_prompt = format!(
        "Map: {}\nParent id: {}\nParent label: {}\nParent summary: {}\nExisting ids: {existing}",
        graph.meta.title,
        node.id,
        node.label,
        node.content.summary.as_deref().unwrap_or(""),
    );
    let system_prompt = format!("{EXPANSION_PROMPT}\n\n{JSON_ONLY}");
    let reply = service
        .complete(&system_prompt, &user_prompt)
        .context("node expansion request failed")?;
    parse_expansion(&reply).context("node expansion reply was rejected")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    impl CompletionService for Canned {
        fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            Ok(self.0.to_owned())
        }
    }

    const FENCED: &str = "Sure! Here it is:\n```json\n{\n  \"nodes\": [\
        {\"id\": \"t\", \"label\": \"T\", \"type\": \"trend\"},\
        {\"id\": \"core\", \"label\": \"Core\", \"type\": \"macro\"}],\n\
        \"links\": [{\"source\": {\"id\": \"core\"}, \"target\": \"t\"}]\n}\n```";

    #[test]
    fn extracts_object_from_fenced_reply() {
        assert_eq!(extract_json_object("```json\n{\"a\": 1}\n```"), Some("{\"a\": 1}"));
        assert_eq!(extract_json_object("noise {\"a\": {}} tail"), Some("{\"a\": {}}"));
        assert_eq!(extract_json_object("no braces here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn synthesized_map_is_repaired_and_focused_on_root() {
        let (graph, focus) = parse_synthesized_map(FENCED).expect("repairable reply");
        assert_eq!(focus, "core");
        assert_eq!(graph.meta.title, "Synthesized Map");
        assert_eq!(graph.links[0].source, "core");
    }

    #[test]
    fn synthesized_map_without_root_focuses_first_node() {
        let reply = r#"{"meta": {"title": "x"}, "nodes": [{"id": "a", "label": "A", "type": "trend"}], "links": []}"#;
        let (_, focus) = parse_synthesized_map(reply).expect("valid reply");
        assert_eq!(focus, "a");
    }

    #[test]
    fn reply_without_collections_is_rejected() {
        assert!(matches!(
            parse_synthesized_map(r#"{"title": "nothing"}"#),
            Err(SynthesisError::MissingCollections)
        ));
        assert!(matches!(
            parse_synthesized_map("plain prose"),
            Err(SynthesisError::NoJsonObject)
        ));
    }

    #[test]
    fn dangling_links_fail_validation() {
        let reply = r#"{"nodes": [{"id": "a", "label": "A", "type": "macro"}], "links": [{"source": "a", "target": "b"}]}"#;
        assert!(matches!(
            parse_synthesized_map(reply),
            Err(SynthesisError::Map(MapError::Schema(_)))
        ));
    }

    #[test]
    fn merge_skips_duplicates_and_anchors_orphans() {
        let graph = MapGraph::blank();
        let expansion = parse_expansion(
            r#"{"nodes": [
                {"id": "central_hub", "label": "Dup", "type": "macro"},
                {"id": "x", "label": "X", "type": "trend"},
                {"id": "y", "label": "Y", "type": "issue"}],
              "links": [{"source": "x", "target": "y"}, {"source": "y", "target": "ghost"}]}"#,
        )
        .expect("valid expansion");

        let merged = merge_expansion(&graph, "central_hub", expansion).expect("parent exists");
        assert_eq!(merged.node_count(), 3);
        assert_eq!(merged.node("central_hub").map(|n| n.label.as_str()), Some("Core Topic"));
        assert!(merged.has_link_between("x", "y"));
        assert!(merged.has_link_between("central_hub", "x"));
        assert!(!merged.has_link_between("central_hub", "y"));
        assert_eq!(merged.link_count(), 2);
    }

    #[test]
    fn merge_links_unconnected_nodes_to_parent() {
        let graph = MapGraph::blank();
        let expansion = Expansion {
            nodes: vec![Node::new("solo", "Solo", "issue")],
            links: Vec::new(),
        };
        let merged = merge_expansion(&graph, "central_hub", expansion).expect("parent exists");
        assert!(merged.has_link_between("central_hub", "solo"));
    }

    #[test]
    fn synthesize_map_goes_through_the_service() {
        let (graph, focus) = synthesize_map(&Canned(FENCED), "energy").expect("canned reply");
        assert_eq!(graph.node_count(), 2);
        assert_eq!(focus, "core");
    }
}
