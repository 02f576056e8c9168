use eframe::egui::{self, Pos2, Rect, Ui};

use crate::engine::hit_test::{HitTarget, NodeControl};
use crate::map::Node;

use super::super::{Status, Workspace};

const NEW_CHILD_LABEL: &str = "New Topic";

impl Workspace {
    pub(in crate::app) fn handle_graph_zoom(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
    ) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        self.engine.camera_mut().zoom_at(rect, pointer, zoom_factor);
    }

    pub(in crate::app) fn handle_graph_pan(&mut self, response: &egui::Response) {
        if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.engine.camera_mut().pan_by(response.drag_delta());
        }
    }

    /// Hover, clicks, control presses, and node dragging for one frame.
    pub(in crate::app) fn handle_graph_pointer(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
        now: f64,
    ) {
        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .filter(|pointer| rect.contains(*pointer));
        let target = pointer.and_then(|pointer| self.engine.hit_test(rect, pointer));
        self.engine.hover(target.as_ref().map(HitTarget::node_id));

        if target.is_some() {
            ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::PointingHand);
        }

        if response.drag_started_by(egui::PointerButton::Primary) {
            let origin = ui.input(|input| input.pointer.press_origin());
            self.dragging = origin.and_then(|origin| match self.engine.hit_test(rect, origin) {
                Some(HitTarget::Node(id)) => Some(id),
                _ => None,
            });
        }
        if let Some(id) = self.dragging.clone() {
            if response.dragged_by(egui::PointerButton::Primary)
                && let Some(pointer) = pointer
            {
                self.drag_node_to(&id, rect, pointer);
            }
            if response.drag_stopped() {
                tracing::debug!(node = %id, "pinned by drag");
                self.dragging = None;
            }
            return;
        }

        if response.double_clicked()
            && let Some(HitTarget::Node(id)) = &target
            && self.engine.unpin(id)
        {
            self.status = Some(Status::Info(format!("Released {id}")));
            return;
        }

        if !response.clicked_by(egui::PointerButton::Primary) {
            return;
        }
        match target {
            Some(HitTarget::Control { node, control }) => self.press_control(&node, control),
            Some(HitTarget::Node(id)) => {
                let outcome = self.engine.click_node(&id, now);
                self.report("Navigate", outcome);
            }
            None => {
                let _ = self.engine.set_selected(None);
            }
        }
    }

    fn drag_node_to(&mut self, id: &str, rect: Rect, pointer: Pos2) {
        let world = self.engine.camera().screen_to_world(rect, pointer);
        self.engine.pin(id, world);
    }

    fn press_control(&mut self, node: &str, control: NodeControl) {
        match control {
            NodeControl::AddChild => {
                let label = match self.new_child_label.trim() {
                    "" => NEW_CHILD_LABEL.to_owned(),
                    label => label.to_owned(),
                };
                self.add_child_under(node, &label);
            }
            NodeControl::Remove => {
                let removed = self.engine.remove_node(node);
                if self.report("Remove node", removed).is_some() {
                    self.status = Some(Status::Info(format!("Removed {node}")));
                }
            }
        }
    }

    /// Adds a child topic under `parent` and selects it.
    pub(in crate::app) fn add_child_under(&mut self, parent: &str, label: &str) {
        let id = self.engine.graph().fresh_id(label);
        let node = Node::new(id.as_str(), label, "issue");
        let added = self.engine.add_child(parent, node, &self.link_relation, 1.0);
        if self.report("Add child", added).is_some() {
            let _ = self.engine.set_selected(Some(&id));
            self.new_child_label.clear();
            self.status = Some(Status::Info(format!("Added {id} under {parent}")));
        }
    }
}
