use std::collections::{HashMap, HashSet};

use crate::map::{Link, MapError, MapGraph, Node};

pub const HISTORY_RELATION: &str = "Previous Focus";

/// Why a node is part of the current view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewRole {
    Center,
    Inner,
    History,
    Outer,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewNode {
    pub node: Node,
    pub role: ViewRole,
}

/// The focus node's radius-1 neighbourhood, plus the previous focus as a breadcrumb.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewGraph {
    focus: String,
    previous: Option<String>,
    nodes: Vec<ViewNode>,
    links: Vec<Link>,
    index_by_id: HashMap<String, usize>,
}

impl ViewGraph {
    pub fn focus(&self) -> &str {
        &self.focus
    }

    /// The previous focus, when it was still part of the map at filter time.
    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn nodes(&self) -> &[ViewNode] {
        &self.nodes
    }

    /// Links in map order; a synthetic history link, if any, comes last.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_by_id.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&ViewNode> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    pub fn role_of(&self, id: &str) -> Option<ViewRole> {
        self.node(id).map(|view_node| view_node.role)
    }

    pub fn history_link(&self) -> Option<&Link> {
        self.links.last().filter(|link| link.is_history_pointer)
    }
}

/// Builds the view centered on `focus`.
///
/// Output order follows the map: nodes and links keep their insertion order,
/// and the synthetic breadcrumb link is appended last.
pub fn filter_view(
    graph: &MapGraph,
    focus: &str,
    previous: Option<&str>,
) -> Result<ViewGraph, MapError> {
    if !graph.contains(focus) {
        return Err(MapError::UnknownFocus {
            id: focus.to_owned(),
        });
    }

    let mut neighbours = HashSet::new();
    for link in &graph.links {
        if let Some(other) = link.opposite(focus)
            && other != focus
        {
            neighbours.insert(other);
        }
    }

    let previous = previous.filter(|&id| id != focus && graph.contains(id));

    let mut visible = neighbours.clone();
    visible.insert(focus);
    if let Some(previous) = previous {
        visible.insert(previous);
    }

    let mut nodes = Vec::with_capacity(visible.len());
    let mut index_by_id = HashMap::with_capacity(visible.len());
    for node in graph.nodes.iter().filter(|node| visible.contains(node.id.as_str())) {
        let role = if node.id == focus {
            ViewRole::Center
        } else if neighbours.contains(node.id.as_str()) {
            ViewRole::Inner
        } else if Some(node.id.as_str()) == previous {
            ViewRole::History
        } else {
            ViewRole::Outer
        };
        index_by_id.insert(node.id.clone(), nodes.len());
        nodes.push(ViewNode {
            node: node.clone(),
            role,
        });
    }

    let mut links = graph
        .links
        .iter()
        .filter(|link| {
            visible.contains(link.source.as_str()) && visible.contains(link.target.as_str())
        })
        .cloned()
        .collect::<Vec<_>>();

    if let Some(previous) = previous
        && !links.iter().any(|link| link.connects(focus, previous))
    {
        let mut breadcrumb = Link::new(previous, focus, HISTORY_RELATION);
        breadcrumb.is_history_pointer = true;
        links.push(breadcrumb);
    }

    Ok(ViewGraph {
        focus: focus.to_owned(),
        previous: previous.map(str::to_owned),
        nodes,
        links,
        index_by_id,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::map::MapMeta;

    fn abcd() -> MapGraph {
        MapGraph {
            meta: MapMeta {
                title: "abcd".to_owned(),
                ..MapMeta::default()
            },
            nodes: vec![
                Node::new("A", "A", "macro"),
                Node::new("B", "B", "trend"),
                Node::new("C", "C", "trend"),
                Node::new("D", "D", "issue"),
            ],
            links: vec![
                Link::new("A", "B", "x"),
                Link::new("A", "C", "x"),
                Link::new("C", "D", "x"),
            ],
        }
    }

    fn roles(view: &ViewGraph) -> Vec<(&str, ViewRole)> {
        view.nodes()
            .iter()
            .map(|view_node| (view_node.node.id.as_str(), view_node.role))
            .collect()
    }

    fn pairs(view: &ViewGraph) -> Vec<(&str, &str)> {
        view.links()
            .iter()
            .map(|link| (link.source.as_str(), link.target.as_str()))
            .collect()
    }

    #[test]
    fn focus_on_root_shows_direct_neighbours() {
        let view = filter_view(&abcd(), "A", None).expect("A exists");
        assert_eq!(
            roles(&view),
            vec![
                ("A", ViewRole::Center),
                ("B", ViewRole::Inner),
                ("C", ViewRole::Inner)
            ]
        );
        assert_eq!(pairs(&view), vec![("A", "B"), ("A", "C")]);
        assert!(!view.contains("D"));
    }

    #[test]
    fn previous_focus_inside_radius_is_inner() {
        let view = filter_view(&abcd(), "C", Some("A")).expect("C exists");
        assert_eq!(view.role_of("A"), Some(ViewRole::Inner));
        assert_eq!(view.role_of("D"), Some(ViewRole::Inner));
        assert_eq!(view.history_link(), None);
        assert_eq!(view.previous(), Some("A"));
    }

    #[test]
    fn leaf_pivot_needs_no_breadcrumb_link() {
        let view = filter_view(&abcd(), "B", Some("A")).expect("B exists");
        assert_eq!(
            roles(&view),
            vec![("A", ViewRole::Inner), ("B", ViewRole::Center)]
        );
        assert_eq!(pairs(&view), vec![("A", "B")]);
    }

    #[test]
    fn distant_previous_focus_becomes_history() {
        let view = filter_view(&abcd(), "D", Some("A")).expect("D exists");
        assert_eq!(view.role_of("A"), Some(ViewRole::History));
        let breadcrumb = view.history_link().expect("synthetic link");
        assert_eq!(breadcrumb.source, "A");
        assert_eq!(breadcrumb.target, "D");
        assert_eq!(breadcrumb.relation, HISTORY_RELATION);
        assert_eq!(breadcrumb.strength, 1.0);
    }

    #[test]
    fn history_node_brings_its_mesh_links() {
        let mut graph = abcd();
        graph.nodes.push(Node::new("E", "E", "issue"));
        graph.links.push(Link::new("D", "E", "x"));
        // B sits outside C's radius but shares a link with A.
        let view = filter_view(&graph, "C", Some("B")).expect("C exists");
        assert_eq!(view.role_of("B"), Some(ViewRole::History));
        assert!(pairs(&view).contains(&("A", "B")));
        assert_eq!(view.links().len(), 4);
    }

    #[test]
    fn unknown_focus_is_rejected() {
        assert!(matches!(
            filter_view(&abcd(), "Z", None),
            Err(MapError::UnknownFocus { id }) if id == "Z"
        ));
    }

    #[test]
    fn vanished_previous_focus_is_ignored() {
        let view = filter_view(&abcd(), "A", Some("gone")).expect("A exists");
        assert_eq!(view.previous(), None);
        assert_eq!(view.len(), 3);
    }

    #[test]
    fn filtering_is_deterministic() {
        let graph = abcd();
        assert_eq!(
            filter_view(&graph, "D", Some("B")).expect("D exists"),
            filter_view(&graph, "D", Some("B")).expect("D exists")
        );
    }
}
