use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::error::{MapError, SchemaError};
use super::validate::node_issues;

/// Structural category derived from a node's `type` string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Driver,
    Risk,
    Issue,
    Peripheral,
    Other,
}

impl NodeKind {
    pub fn from_type(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "macro" | "central_hub" => Self::Root,
            "trend" | "key_driver" | "concept" => Self::Driver,
            "risk" => Self::Risk,
            "issue" | "detail" => Self::Issue,
            "peripheral_topic" | "satellite" => Self::Peripheral,
            _ => Self::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Root => "macro",
            Self::Driver => "trend",
            Self::Risk => "risk",
            Self::Issue => "issue",
            Self::Peripheral => "peripheral",
            Self::Other => "other",
        }
    }

    pub fn is_root(self) -> bool {
        self == Self::Root
    }

    /// World-space radius a fully grown node of this kind is drawn with.
    pub fn base_size(self) -> f32 {
        match self {
            Self::Root => 19.0,
            Self::Driver => 12.0,
            Self::Risk => 9.0,
            Self::Issue => 7.5,
            Self::Peripheral | Self::Other => 5.0,
        }
    }

    /// Paint tier; higher tiers are drawn later and occlude lower ones.
    pub fn tier(self) -> u8 {
        match self {
            Self::Peripheral | Self::Issue | Self::Risk | Self::Other => 1,
            Self::Driver => 3,
            Self::Root => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub quote: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A sub-topic or challenge: plain text, or an object carrying its own fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopicItem {
    Text(String),
    Detail(Map<String, Value>),
}

impl TopicItem {
    /// Display text: the string itself, else the first of `name`, `title`,
    /// `label` or `topic`, else the object as JSON.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Detail(fields) => ["name", "title", "label", "topic"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(Value::as_str))
                .map_or_else(|| Value::Object(fields.clone()).to_string(), str::to_owned),
        }
    }
}

impl From<&str> for TopicItem {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

/// Free-form intelligence payload shown in the details panel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_insight: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Metric>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_topics: Vec<TopicItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub challenges: Vec<TopicItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expert_quotes: Vec<Quote>,
    /// Older documents name the quote list `quotes`; it is written back under that key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quotes: Vec<Quote>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_reports: Vec<Report>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeContent {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Quotes from either list, `expert_quotes` first.
    pub fn all_quotes(&self) -> impl Iterator<Item = &Quote> {
        self.expert_quotes.iter().chain(&self.quotes)
    }

    pub fn has_summary(&self) -> bool {
        self.summary
            .as_deref()
            .is_some_and(|summary| !summary.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "NodeContent::is_empty")]
    pub content: NodeContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pinned: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type: node_type.into(),
            group: None,
            size: None,
            content: NodeContent::default(),
            position: None,
            pinned: false,
            extra: Map::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.content.summary = Some(summary.into());
        self
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::from_type(&self.node_type)
    }

    /// The coordinate this node is held at, if the document fixes it.
    pub fn fixed_position(&self) -> Option<Position> {
        if self.pinned { self.position } else { None }
    }
}

fn default_strength() -> f64 {
    1.0
}

/// Accepts `"id"`, a bare number, or an object carrying an `id` field.
fn endpoint_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(id) => id,
        Value::Number(number) => number.to_string(),
        Value::Object(object) => match object.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(number)) => number.to_string(),
            _ => String::new(),
        },
        _ => String::new(),
    })
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default, deserialize_with = "endpoint_id")]
    pub source: String,
    #[serde(default, deserialize_with = "endpoint_id")]
    pub target: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub relation: String,
    #[serde(default = "default_strength")]
    pub strength: f64,
    /// Set only on the synthetic breadcrumb link a view adds; never serialized.
    #[serde(default, rename = "isHistoryPointer", skip_serializing)]
    pub is_history_pointer: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Link {
    pub fn new(source: impl Into<String>, target: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            strength: default_strength(),
            is_history_pointer: false,
            extra: Map::new(),
        }
    }

    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }

    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }

    /// Undirected pair match.
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }

    /// The other endpoint when `id` is one of them.
    pub fn opposite(&self, id: &str) -> Option<&str> {
        if self.source == id {
            Some(self.target.as_str())
        } else if self.target == id {
            Some(self.source.as_str())
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The authoritative map. Edits never mutate in place; each returns a new value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapGraph {
    #[serde(default)]
    pub meta: MapMeta,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl MapGraph {
    /// A fresh single-node map to start building from.
    pub fn blank() -> Self {
        let mut meta = MapMeta {
            title: "New Strategic Map".to_owned(),
            ..MapMeta::default()
        };
        meta.extra
            .insert("version".to_owned(), Value::String("2.0".to_owned()));

        let mut hub = Node::new("central_hub", "Core Topic", "macro")
            .with_summary("This is a new strategic map. Define your core topic here.");
        hub.content.key_insight = Some("Everything starts from the center.".to_owned());

        Self {
            meta,
            nodes: vec![hub],
            links: Vec::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn degree_of(&self, id: &str) -> usize {
        self.links.iter().filter(|link| link.touches(id)).count()
    }

    pub fn has_link_between(&self, a: &str, b: &str) -> bool {
        self.links.iter().any(|link| link.connects(a, b))
    }

    /// Direct neighbours in link order, without duplicates.
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.links
            .iter()
            .filter_map(|link| link.opposite(id))
            .filter(|other| *other != id && seen.insert(*other))
            .collect()
    }

    /// An id derived from `label` that no node of this map uses yet.
    pub fn fresh_id(&self, label: &str) -> String {
        let mut stem = String::new();
        for ch in label.trim().chars() {
            if ch.is_alphanumeric() {
                stem.extend(ch.to_lowercase());
            } else if !stem.is_empty() && !stem.ends_with('_') {
                stem.push('_');
            }
        }
        let stem = stem.trim_end_matches('_');
        let stem = if stem.is_empty() { "node" } else { stem };

        if !self.contains(stem) {
            return stem.to_owned();
        }
        (2..)
            .map(|suffix| format!("{stem}_{suffix}"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| stem.to_owned())
    }

    /// The node a freshly loaded map centers on.
    ///
    /// Prefers the first root-kind node, then the highest-degree node (earliest
    /// wins ties), then the first node.
    pub fn find_default_focus(&self) -> Result<&str, MapError> {
        let first = self.nodes.first().ok_or(MapError::EmptyGraph)?;

        if let Some(root) = self.nodes.iter().find(|node| node.kind().is_root()) {
            return Ok(root.id.as_str());
        }

        let mut best = first;
        let mut best_degree = self.degree_of(&first.id);
        for node in self.nodes.iter().skip(1) {
            let degree = self.degree_of(&node.id);
            if degree > best_degree {
                best = node;
                best_degree = degree;
            }
        }
        Ok(best.id.as_str())
    }

    pub fn add_node(&self, node: Node) -> Result<Self, MapError> {
        let issues = node_issues(&node, "node");
        if !issues.is_empty() {
            return Err(SchemaError { issues }.into());
        }
        if self.contains(&node.id) {
            return Err(MapError::DuplicateNode { id: node.id });
        }

        let mut next = self.clone();
        next.nodes.push(node);
        Ok(next)
    }

    /// Removes the node together with every link touching it.
    pub fn remove_node(&self, id: &str) -> Result<Self, MapError> {
        if !self.contains(id) {
            return Err(MapError::UnknownNode { id: id.to_owned() });
        }

        Ok(Self {
            meta: self.meta.clone(),
            nodes: self
                .nodes
                .iter()
                .filter(|node| node.id != id)
                .cloned()
                .collect(),
            links: self
                .links
                .iter()
                .filter(|link| !link.touches(id))
                .cloned()
                .collect(),
        })
    }

    /// Adds a relation; a second link between an already linked pair is a no-op.
    pub fn add_link(&self, link: Link) -> Result<Self, MapError> {
        for endpoint in [&link.source, &link.target] {
            if !self.contains(endpoint) {
                return Err(MapError::UnknownNode {
                    id: endpoint.clone(),
                });
            }
        }
        if link.source == link.target {
            return Err(MapError::SelfLink { id: link.source });
        }
        if self.has_link_between(&link.source, &link.target) {
            return Ok(self.clone());
        }

        let mut next = self.clone();
        next.links.push(Link {
            is_history_pointer: false,
            ..link
        });
        Ok(next)
    }

    /// Drops every link between the unordered pair; absent pairs leave the map as is.
    pub fn remove_link(&self, a: &str, b: &str) -> Result<Self, MapError> {
        for endpoint in [a, b] {
            if !self.contains(endpoint) {
                return Err(MapError::UnknownNode {
                    id: endpoint.to_owned(),
                });
            }
        }

        let mut next = self.clone();
        next.links.retain(|link| !link.connects(a, b));
        Ok(next)
    }

    pub fn update_node(&self, node: Node) -> Result<Self, MapError> {
        let Some(index) = self.nodes.iter().position(|existing| existing.id == node.id) else {
            return Err(MapError::UnknownNode { id: node.id });
        };
        let issues = node_issues(&node, &format!("nodes[{index}]"));
        if !issues.is_empty() {
            return Err(SchemaError { issues }.into());
        }

        let mut next = self.clone();
        next.nodes[index] = node;
        Ok(next)
    }

    /// Adds `node` and links it from `parent` in one edit.
    pub fn add_child(
        &self,
        parent: &str,
        node: Node,
        relation: &str,
        strength: f64,
    ) -> Result<Self, MapError> {
        if !self.contains(parent) {
            return Err(MapError::UnknownNode {
                id: parent.to_owned(),
            });
        }
        let child_id = node.id.clone();
        self.add_node(node)?
            .add_link(Link::new(parent, child_id, relation).with_strength(strength))
    }
}
