use std::collections::HashMap;

use super::filter::{ViewGraph, ViewRole};
use crate::map::Link;

pub const NODE_BIRTH_SECS: f64 = 0.5;
pub const LINK_REVEAL_SECS: f64 = 0.6;

/// Render-only facts about a node, kept apart from the map itself.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderAnnotation {
    pub role: ViewRole,
    pub born_at: f64,
}

impl RenderAnnotation {
    /// Linear birth progress in `[0, 1]`; reaches 1 after [`NODE_BIRTH_SECS`].
    /// Easing is left to the style layer.
    pub fn birth(&self, now: f64) -> f32 {
        progress(self.born_at, now, NODE_BIRTH_SECS)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct LinkKey {
    low: String,
    high: String,
    history: bool,
}

impl LinkKey {
    fn of(link: &Link) -> Self {
        let (low, high) = if link.source <= link.target {
            (&link.source, &link.target)
        } else {
            (&link.target, &link.source)
        };
        Self {
            low: low.clone(),
            high: high.clone(),
            history: link.is_history_pointer,
        }
    }
}

/// Birth timestamps keyed by node id and by link endpoints.
#[derive(Clone, Debug, Default)]
pub struct RenderAnnotations {
    nodes: HashMap<String, RenderAnnotation>,
    links: HashMap<LinkKey, f64>,
}

impl RenderAnnotations {
    /// Stamps anything in `view` seen for the first time and refreshes roles.
    pub fn observe(&mut self, view: &ViewGraph, now: f64) {
        for view_node in view.nodes() {
            self.nodes
                .entry(view_node.node.id.clone())
                .and_modify(|annotation| annotation.role = view_node.role)
                .or_insert(RenderAnnotation {
                    role: view_node.role,
                    born_at: now,
                });
        }
        for link in view.links() {
            self.links.entry(LinkKey::of(link)).or_insert(now);
        }
    }

    pub fn node(&self, id: &str) -> Option<&RenderAnnotation> {
        self.nodes.get(id)
    }

    /// Growth of `id`; nodes never observed are drawn fully grown.
    pub fn node_birth(&self, id: &str, now: f64) -> f32 {
        self.nodes
            .get(id)
            .map_or(1.0, |annotation| annotation.birth(now))
    }

    pub fn link_reveal(&self, link: &Link, now: f64) -> f32 {
        self.links
            .get(&LinkKey::of(link))
            .map_or(1.0, |&born_at| progress(born_at, now, LINK_REVEAL_SECS))
    }

    /// Drops the annotations of a removed node and of every link touching it.
    pub fn forget(&mut self, id: &str) {
        self.nodes.remove(id);
        self.links.retain(|key, _| key.low != id && key.high != id);
    }

    pub fn forget_link(&mut self, a: &str, b: &str) {
        self.links
            .retain(|key, _| !((key.low == a && key.high == b) || (key.low == b && key.high == a)));
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
    }

    /// Whether any birth or reveal is still running at `now`.
    pub fn is_animating(&self, now: f64) -> bool {
        self.nodes
            .values()
            .any(|annotation| now - annotation.born_at < NODE_BIRTH_SECS)
            || self
                .links
                .values()
                .any(|&born_at| now - born_at < LINK_REVEAL_SECS)
    }
}

fn progress(born_at: f64, now: f64, duration: f64) -> f32 {
    ((now - born_at) / duration).clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::filter::filter_view;
    use crate::map::{MapGraph, MapMeta, Node};

    fn graph() -> MapGraph {
        MapGraph {
            meta: MapMeta {
                title: "t".to_owned(),
                ..MapMeta::default()
            },
            nodes: vec![
                Node::new("a", "A", "macro"),
                Node::new("b", "B", "trend"),
                Node::new("c", "C", "issue"),
            ],
            links: vec![Link::new("a", "b", "x"), Link::new("b", "c", "x")],
        }
    }

    #[test]
    fn first_sighting_is_stamped_once() {
        let graph = graph();
        let mut annotations = RenderAnnotations::default();
        annotations.observe(&filter_view(&graph, "a", None).expect("a exists"), 1.0);
        annotations.observe(&filter_view(&graph, "b", Some("a")).expect("b exists"), 5.0);

        assert_eq!(annotations.node("a").map(|a| a.born_at), Some(1.0));
        assert_eq!(annotations.node("c").map(|a| a.born_at), Some(5.0));
        assert_eq!(annotations.node("a").map(|a| a.role), Some(ViewRole::Inner));
    }

    #[test]
    fn birth_ramps_to_one_and_stays() {
        let graph = graph();
        let mut annotations = RenderAnnotations::default();
        annotations.observe(&filter_view(&graph, "a", None).expect("a exists"), 0.0);

        assert_eq!(annotations.node_birth("b", 0.0), 0.0);
        assert_eq!(annotations.node_birth("b", 0.25), 0.5);
        assert_eq!(annotations.node_birth("b", 0.5), 1.0);
        assert_eq!(annotations.node_birth("b", 50.0), 1.0);
        assert!(annotations.is_animating(0.55));
        assert!(!annotations.is_animating(0.6));
    }

    #[test]
    fn link_reveal_ignores_direction() {
        let graph = graph();
        let mut annotations = RenderAnnotations::default();
        annotations.observe(&filter_view(&graph, "a", None).expect("a exists"), 0.0);
        assert_eq!(annotations.link_reveal(&Link::new("b", "a", "y"), 0.3), 0.5);
    }

    #[test]
    fn forgetting_restarts_the_animation() {
        let graph = graph();
        let mut annotations = RenderAnnotations::default();
        let view = filter_view(&graph, "a", None).expect("a exists");
        annotations.observe(&view, 0.0);
        annotations.forget("b");
        assert!(annotations.node("b").is_none());
        annotations.observe(&view, 9.0);
        assert_eq!(annotations.node("b").map(|a| a.born_at), Some(9.0));
        assert_eq!(annotations.link_reveal(&Link::new("a", "b", "x"), 9.0), 0.0);
    }
}
