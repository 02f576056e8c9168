//! The graph view engine: view filtering, layout, render contracts, and navigation.
//!
//! [`MapEngine`] owns the map and everything derived from it. The canvas reads
//! a consistent [`ViewGraph`] snapshot plus positions each frame, and feeds
//! clicks and edits back through the engine.

pub mod annotations;
pub mod camera;
pub mod filter;
pub mod layout;
pub mod navigation;
pub mod style;

use std::sync::Arc;

use eframe::egui::{Pos2, Rect, Vec2};

use crate::map::{
    Expansion, Link, MapError, MapGraph, Node, Position, export_document, merge_expansion,
    validate,
};
use annotations::RenderAnnotations;
use camera::{Camera, FOCUS_DURATION, FOCUS_ZOOM};
use filter::{ViewGraph, filter_view};
use hit_test::HitTarget;
use layout::{Layout, LayoutConfig};
use navigation::{ClickOutcome, DEFAULT_SETTLE_DELAY, Navigator, Pivot};
use style::{HoverRelation, LinkState, NodeState};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub layout: LayoutConfig,
    /// Seconds between a click and the pivot it schedules.
    pub settle_delay: f64,
    pub focus_zoom: f32,
    pub camera_duration: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            focus_zoom: FOCUS_ZOOM,
            camera_duration: FOCUS_DURATION,
        }
    }
}

type PivotListener = Box<dyn FnMut(&Pivot)>;

pub struct MapEngine {
    config: EngineConfig,
    graph: Arc<MapGraph>,
    nav: Navigator,
    view: Arc<ViewGraph>,
    layout: Layout,
    annotations: RenderAnnotations,
    camera: Camera,
    hovered: Option<String>,
    edit_mode: bool,
    listeners: Vec<PivotListener>,
    now: f64,
}

impl MapEngine {
    /// Starts on `graph`, focused on its default focus.
    pub fn new(graph: MapGraph, config: EngineConfig) -> Result<Self, MapError> {
        validate(&graph)?;
        let focus = graph.find_default_focus()?.to_owned();
        let view = filter_view(&graph, &focus, None)?;

        let mut engine = Self {
            config,
            graph: Arc::new(graph),
            nav: Navigator::new(focus.as_str(), config.settle_delay),
            view: Arc::new(view),
            layout: Layout::new(config.layout),
            annotations: RenderAnnotations::default(),
            camera: Camera::default(),
            hovered: None,
            edit_mode: false,
            listeners: Vec::new(),
            now: 0.0,
        };
        engine.enter_fresh();
        Ok(engine)
    }

    /// Replaces the whole map and resets navigation, layout, and annotations.
    ///
    /// `focus` defaults to the map's default focus. On error nothing changes.
    pub fn load_graph(&mut self, graph: MapGraph, focus: Option<&str>) -> Result<(), MapError> {
        validate(&graph)?;
        let focus = match focus {
            Some(focus) => focus.to_owned(),
            None => graph.find_default_focus()?.to_owned(),
        };
        let view = filter_view(&graph, &focus, None)?;

        self.graph = Arc::new(graph);
        self.nav.reset(focus.as_str());
        self.view = Arc::new(view);
        self.hovered = None;
        self.layout.reset();
        self.annotations.clear();
        self.enter_fresh();
        tracing::info!(
            title = %self.graph.meta.title,
            nodes = self.graph.node_count(),
            links = self.graph.link_count(),
            focus = %focus,
            "map loaded"
        );
        Ok(())
    }

    fn enter_fresh(&mut self) {
        self.layout.enter(&self.view);
        self.annotations.observe(&self.view, self.now);
        let center = self.layout.position(self.view.focus()).unwrap_or(Vec2::ZERO);
        self.camera.look_at(center, 1.0);
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn graph(&self) -> &MapGraph {
        &self.graph
    }

    /// Shared handle to the map, e.g. for a worker thread.
    pub fn graph_handle(&self) -> Arc<MapGraph> {
        Arc::clone(&self.graph)
    }

    /// The current view. Focus and view always come from the same snapshot.
    pub fn view(&self) -> Arc<ViewGraph> {
        Arc::clone(&self.view)
    }

    pub fn focus(&self) -> &str {
        self.view.focus()
    }

    pub fn previous_focus(&self) -> Option<&str> {
        self.nav.previous()
    }

    pub fn selected(&self) -> Option<&str> {
        self.nav.selected()
    }

    pub fn set_selected(&mut self, id: Option<&str>) -> Result<(), MapError> {
        if let Some(id) = id
            && !self.graph.contains(id)
        {
            return Err(MapError::UnknownNode { id: id.to_owned() });
        }
        self.nav.set_selected(id.map(str::to_owned));
        Ok(())
    }

    pub fn is_pivoting(&self) -> bool {
        self.nav.is_pivoting()
    }

    /// Subscribes to applied focus changes.
    pub fn on_pivot(&mut self, listener: impl FnMut(&Pivot) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn hover(&mut self, id: Option<&str>) {
        self.hovered = id.filter(|id| self.view.contains(id)).map(str::to_owned);
    }

    pub fn edit_mode(&self) -> bool {
        self.edit_mode
    }

    pub fn set_edit_mode(&mut self, edit_mode: bool) {
        self.edit_mode = edit_mode;
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn annotations(&self) -> &RenderAnnotations {
        &self.annotations
    }

    pub fn set_layout_config(&mut self, config: LayoutConfig) {
        self.layout.set_config(config);
        self.config.layout = self.layout.config();
    }

    pub fn set_settle_delay(&mut self, seconds: f64) {
        self.nav.set_settle_delay(seconds);
        self.config.settle_delay = self.nav.settle_delay();
    }

    pub fn position(&self, id: &str) -> Option<Vec2> {
        self.layout.position(id)
    }

    pub fn click_node(&mut self, id: &str, now: f64) -> Result<ClickOutcome, MapError> {
        if !self.graph.contains(id) {
            return Err(MapError::UnknownNode { id: id.to_owned() });
        }
        self.now = now;
        Ok(self.nav.click_node(id, now))
    }

    pub fn go_back(&mut self, now: f64) -> Option<ClickOutcome> {
        self.now = now;
        self.nav.go_back(now)
    }

    /// Advances one frame. Returns whether anything is still in motion.
    pub fn tick(&mut self, now: f64) -> bool {
        self.now = now;
        if let Some(pivot) = self.nav.poll(now) {
            self.apply_pivot(pivot);
        }

        self.layout.step_frame();
        if self.camera.is_flying()
            && let Some(center) = self.layout.position(self.view.focus())
        {
            self.camera.retarget(center);
        }
        self.camera.advance(now);

        !self.layout.is_idle()
            || self.camera.is_flying()
            || self.nav.is_pivoting()
            || self.annotations.is_animating(now)
    }

    fn apply_pivot(&mut self, pivot: Pivot) {
        let view = match filter_view(&self.graph, &pivot.to, Some(&pivot.from)) {
            Ok(view) => view,
            Err(error) => {
                tracing::error!(%error, "pivot target missing from map");
                return;
            }
        };

        self.view = Arc::new(view);
        self.hovered = None;
        self.layout.enter(&self.view);
        self.annotations.observe(&self.view, self.now);
        if let Some(center) = self.layout.position(self.view.focus()) {
            self.camera.fly_to(
                center,
                self.config.focus_zoom,
                self.now,
                self.config.camera_duration,
            );
        }
        tracing::info!(from = %pivot.from, to = %pivot.to, "pivoted focus");
        self.notify(&pivot);
    }

    fn notify(&mut self, pivot: &Pivot) {
        for listener in &mut self.listeners {
            listener(pivot);
        }
    }

    /// Recomputes the view around the unchanged focus.
    fn refresh_view(&mut self) {
        let previous = self.nav.previous().map(str::to_owned);
        match filter_view(&self.graph, self.nav.focus(), previous.as_deref()) {
            Ok(view) => {
                self.view = Arc::new(view);
                if self
                    .hovered
                    .as_deref()
                    .is_some_and(|id| !self.view.contains(id))
                {
                    self.hovered = None;
                }
                self.layout.enter(&self.view);
                self.annotations.observe(&self.view, self.now);
            }
            Err(error) => tracing::error!(%error, "focus missing from map after edit"),
        }
    }

    fn touches_view(&self, ids: &[&str]) -> bool {
        ids.iter().any(|id| self.view.contains(id))
    }

    fn commit(&mut self, next: MapGraph, touched: &[&str]) {
        let refresh = self.touches_view(touched);
        self.graph = Arc::new(next);
        if refresh {
            self.refresh_view();
        }
    }

    fn rejected<T>(&self, action: &str, result: Result<T, MapError>) -> Result<T, MapError> {
        if let Err(error) = &result {
            tracing::warn!(action, %error, "edit rejected");
        }
        result
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), MapError> {
        let next = self.rejected("add node", self.graph.add_node(node))?;
        self.commit(next, &[]);
        Ok(())
    }

    pub fn add_child(
        &mut self,
        parent: &str,
        node: Node,
        relation: &str,
        strength: f64,
    ) -> Result<(), MapError> {
        let next = self.rejected(
            "add child",
            self.graph.add_child(parent, node, relation, strength),
        )?;
        self.commit(next, &[parent]);
        Ok(())
    }

    pub fn add_link(&mut self, link: Link) -> Result<(), MapError> {
        let (source, target) = (link.source.clone(), link.target.clone());
        let next = self.rejected("add link", self.graph.add_link(link))?;
        if next == *self.graph {
            return Ok(());
        }
        self.commit(next, &[source.as_str(), target.as_str()]);
        Ok(())
    }

    pub fn remove_link(&mut self, a: &str, b: &str) -> Result<(), MapError> {
        let next = self.rejected("remove link", self.graph.remove_link(a, b))?;
        if next == *self.graph {
            return Ok(());
        }
        self.annotations.forget_link(a, b);
        self.commit(next, &[a, b]);
        Ok(())
    }

    pub fn update_node(&mut self, node: Node) -> Result<(), MapError> {
        let id = node.id.clone();
        let next = self.rejected("update node", self.graph.update_node(node))?;
        self.commit(next, &[id.as_str()]);
        Ok(())
    }

    /// Merges proposed nodes under `parent`. The focus stays where it is.
    pub fn merge_expansion(&mut self, parent: &str, expansion: Expansion) -> Result<(), MapError> {
        let next = self.rejected(
            "merge expansion",
            merge_expansion(&self.graph, parent, expansion),
        )?;
        let touched = next
            .links
            .iter()
            .filter(|link| !self.graph.links.contains(link))
            .flat_map(|link| [link.source.clone(), link.target.clone()])
            .collect::<Vec<_>>();
        let touched = touched.iter().map(String::as_str).collect::<Vec<_>>();
        self.commit(next, &touched);
        Ok(())
    }

    /// Removes a node and its links.
    ///
    /// Removing the focus re-centers on the previous focus, else on the map's
    /// default focus. The last node of a map cannot be removed.
    pub fn remove_node(&mut self, id: &str) -> Result<(), MapError> {
        let next = self.rejected("remove node", self.graph.remove_node(id))?;
        if next.nodes.is_empty() {
            return self.rejected("remove node", Err(MapError::EmptyGraph));
        }

        let was_focus = self.nav.focus() == id;
        let in_view = self.view.contains(id);
        self.layout.forget(id);
        self.annotations.forget(id);
        self.nav.forget(id);
        self.graph = Arc::new(next);
        if self.hovered.as_deref() == Some(id) {
            self.hovered = None;
        }

        if was_focus {
            let fallback = match self.nav.previous() {
                Some(previous) if self.graph.contains(previous) => previous.to_owned(),
                _ => self.graph.find_default_focus()?.to_owned(),
            };
            tracing::info!(removed = id, focus = %fallback, "focus removed, re-centering");
            self.nav.force_focus(fallback.as_str(), None);
            self.refresh_view();
            if let Some(center) = self.layout.position(&fallback) {
                self.camera.fly_to(
                    center,
                    self.config.focus_zoom,
                    self.now,
                    self.config.camera_duration,
                );
            }
            self.notify(&Pivot {
                from: id.to_owned(),
                to: fallback,
            });
        } else if in_view {
            self.refresh_view();
        }
        Ok(())
    }

    pub fn pin(&mut self, id: &str, world: Vec2) {
        if self.view.contains(id) {
            self.layout.pin(id, world);
        }
    }

    pub fn unpin(&mut self, id: &str) -> bool {
        self.layout.unpin(id)
    }

    pub fn is_pinned(&self, id: &str) -> bool {
        self.layout.is_pinned(id)
    }

    pub fn hit_test(&self, rect: Rect, point: Pos2) -> Option<HitTarget> {
        hit_test::hit_test(
            &self.view,
            |id| self.layout.position(id),
            &self.camera,
            rect,
            point,
            self.edit_mode,
        )
    }

    /// Visual inputs for the node `id` of the current view.
    pub fn node_state(&self, id: &str, now: f64) -> Option<NodeState> {
        let view_node = self.view.node(id)?;
        Some(NodeState {
            role: view_node.role,
            kind: view_node.node.kind(),
            hover: HoverRelation::of(&self.view, id, self.hovered()),
            selected: self.selected() == Some(id),
            pinned: self.layout.is_pinned(id),
            birth: self.annotations.node_birth(id, now),
            has_summary: view_node.node.content.has_summary(),
            edit_mode: self.edit_mode,
        })
    }

    /// Visual inputs for a link of the current view; `None` if an endpoint is not in view.
    pub fn link_state(&self, link: &Link, now: f64) -> Option<LinkState> {
        let source = self.view.node(&link.source)?;
        let target = self.view.node(&link.target)?;
        let selected = self.selected();
        Some(LinkState {
            history: link.is_history_pointer,
            hover: LinkState::hover_of(link, self.hovered()),
            touches_selected: selected.is_some_and(|id| link.touches(id)),
            kinds: (source.node.kind(), target.node.kind()),
            reveal: self.annotations.link_reveal(link, now),
        })
    }

    /// The map as it would be saved, with user pins written back as fixed positions.
    pub fn export_graph(&self) -> MapGraph {
        let mut graph = (*self.graph).clone();
        for node in &mut graph.nodes {
            if let Some(pin) = self.layout.user_pins().get(&node.id) {
                node.position = Some(Position { x: pin.x, y: pin.y });
                node.pinned = true;
            }
        }
        graph
    }

    pub fn export_document(&self) -> Result<String, MapError> {
        export_document(&self.export_graph())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use eframe::egui::vec2;

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

    fn engine() -> MapEngine {
        MapEngine::new(abcd(), EngineConfig::default()).expect("valid map")
    }

    #[test]
    fn starts_on_default_focus() {
        let engine = engine();
        assert_eq!(engine.focus(), "A");
        assert_eq!(engine.previous_focus(), None);
        assert_eq!(engine.view().len(), 3);
    }

    #[test]
    fn empty_map_is_refused() {
        let mut graph = abcd();
        graph.nodes.clear();
        graph.links.clear();
        assert!(matches!(
            MapEngine::new(graph, EngineConfig::default()),
            Err(MapError::EmptyGraph)
        ));
    }

    #[test]
    fn pivot_lands_after_delay_and_notifies() {
        let mut engine = engine();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        engine.on_pivot(move |pivot| sink.borrow_mut().push(pivot.to.clone()));

        engine.click_node("C", 1.0).expect("C exists");
        engine.tick(1.05);
        assert_eq!(engine.focus(), "A");

        engine.tick(1.2);
        assert_eq!(engine.focus(), "C");
        assert_eq!(engine.previous_focus(), Some("A"));
        assert_eq!(engine.selected(), Some("C"));
        assert!(engine.camera().is_flying());
        assert_eq!(*seen.borrow(), vec!["C".to_owned()]);
    }

    #[test]
    fn clicking_focus_selects_without_recompute() {
        let mut engine = engine();
        let before = engine.view();
        engine.click_node("A", 0.0).expect("A exists");
        engine.tick(5.0);
        assert!(Arc::ptr_eq(&before, &engine.view()));
        assert_eq!(engine.selected(), Some("A"));
    }

    #[test]
    fn edits_outside_the_view_do_not_recompute() {
        let mut engine = engine();
        let before = engine.view();
        engine
            .add_child("D", Node::new("E", "E", "issue"), "x", 1.0)
            .expect("D exists");
        assert!(Arc::ptr_eq(&before, &engine.view()));

        engine
            .add_child("B", Node::new("F", "F", "issue"), "x", 1.0)
            .expect("B exists");
        assert!(!Arc::ptr_eq(&before, &engine.view()));
        assert!(engine.view().contains("B"));
        assert!(!engine.view().contains("F"));

        engine
            .add_child("A", Node::new("G", "G", "issue"), "x", 1.0)
            .expect("A exists");
        assert!(engine.view().contains("G"));
    }

    #[test]
    fn failed_edit_leaves_engine_unchanged() {
        let mut engine = engine();
        let graph = engine.graph().clone();
        let view = engine.view();
        assert!(engine.add_link(Link::new("A", "nope", "x")).is_err());
        assert!(engine.add_node(Node::new("B", "dup", "trend")).is_err());
        assert_eq!(*engine.graph(), graph);
        assert!(Arc::ptr_eq(&view, &engine.view()));
    }

    #[test]
    fn removing_the_focus_falls_back_to_previous() {
        let mut engine = engine();
        engine.click_node("C", 0.0).expect("C exists");
        engine.tick(1.0);
        engine.remove_node("C").expect("C exists");
        assert_eq!(engine.focus(), "A");
        assert!(!engine.graph().contains("C"));
        assert!(engine.graph().links.iter().all(|link| !link.touches("C")));
        assert!(!engine.view().contains("C"));
    }

    #[test]
    fn removing_focus_without_history_uses_default() {
        let mut engine = engine();
        engine.click_node("D", 0.0).expect("D exists");
        engine.tick(1.0);
        // D's previous focus was A; remove A first so no history remains.
        engine.remove_node("A").expect("A exists");
        assert_eq!(engine.previous_focus(), None);
        engine.remove_node("D").expect("D exists");
        assert!(engine.graph().contains(engine.focus()));
    }

    #[test]
    fn last_node_cannot_be_removed() {
        let mut engine = MapEngine::new(MapGraph::blank(), EngineConfig::default())
            .expect("blank map is valid");
        assert!(matches!(
            engine.remove_node("central_hub"),
            Err(MapError::EmptyGraph)
        ));
        assert_eq!(engine.graph().node_count(), 1);
    }

    #[test]
    fn load_graph_resets_navigation() {
        let mut engine = engine();
        engine.click_node("C", 0.0).expect("C exists");
        engine.tick(1.0);
        engine
            .load_graph(MapGraph::blank(), None)
            .expect("blank map is valid");
        assert_eq!(engine.focus(), "central_hub");
        assert_eq!(engine.previous_focus(), None);
        assert_eq!(engine.selected(), None);

        assert!(matches!(
            engine.load_graph(abcd(), Some("Z")),
            Err(MapError::UnknownFocus { .. })
        ));
        assert_eq!(engine.focus(), "central_hub");
    }

    #[test]
    fn export_writes_user_pins_back() {
        let mut engine = engine();
        engine.pin("B", vec2(10.0, 20.0));
        let exported = engine.export_graph();
        let node = exported.node("B").expect("B exists");
        assert!(node.pinned);
        assert_eq!(node.position, Some(Position { x: 10.0, y: 20.0 }));
        assert!(!engine.graph().node("B").expect("B exists").pinned);
    }

    #[test]
    fn expansion_keeps_focus_and_shows_new_children() {
        let mut engine = engine();
        let expansion = Expansion {
            nodes: vec![Node::new("X", "X", "issue"), Node::new("B", "dup", "issue")],
            links: Vec::new(),
        };
        engine.merge_expansion("A", expansion).expect("A exists");
        assert_eq!(engine.focus(), "A");
        assert!(engine.view().contains("X"));
        assert_eq!(engine.graph().node("B").map(|node| node.label.as_str()), Some("B"));
    }

    #[test]
    fn hover_only_accepts_visible_nodes() {
        let mut engine = engine();
        engine.hover(Some("D"));
        assert_eq!(engine.hovered(), None);
        engine.hover(Some("B"));
        assert_eq!(engine.hovered(), Some("B"));
    }
}
