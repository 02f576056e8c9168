use eframe::egui::{Align2, Color32, FontId, Painter, Rect, Sense, Stroke, Ui, vec2};

use crate::engine::camera::Camera;
use crate::engine::filter::ViewGraph;
use crate::engine::hit_test::{CONTROL_RADIUS, NodeControl, control_offset, controls_for, hit_radius};
use crate::engine::style::{
    BACKGROUND, CONTENT_DOT, GOLD, LabelStyle, draw_order, link_visual, node_visual,
};
use crate::util::truncate_label;

use super::super::Workspace;
use super::super::render_utils::{
    circle_visible, draw_background, draw_segment, label_size, partial_end, segment_visible,
};

impl Workspace {
    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let now = ui.input(|input| input.time);
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        self.handle_graph_zoom(ui, rect, &response);
        self.handle_graph_pan(&response);
        self.handle_graph_pointer(ui, rect, &response, now);

        let moving = self.engine.tick(now);
        if moving || response.dragged() || self.dragging.is_some() {
            ui.ctx().request_repaint();
        }

        let camera = *self.engine.camera();
        let view = self.engine.view();
        draw_background(&painter, rect, camera.pan(), camera.zoom());
        self.draw_links(&painter, rect, &camera, &view, now);
        self.draw_nodes(&painter, rect, &camera, &view, now);
        self.draw_readout(&painter, rect, &camera, &view);
    }

    fn draw_links(&self, painter: &Painter, rect: Rect, camera: &Camera, view: &ViewGraph, now: f64) {
        let width_scale = camera.zoom().sqrt().clamp(0.5, 2.0);
        for link in view.links() {
            let (Some(from), Some(to)) = (
                self.engine.position(&link.source),
                self.engine.position(&link.target),
            ) else {
                continue;
            };
            let Some(state) = self.engine.link_state(link, now) else {
                continue;
            };

            let start = camera.world_to_screen(rect, from);
            let end = camera.world_to_screen(rect, to);
            if !segment_visible(rect, start, end, 2.0) {
                continue;
            }

            let visual = link_visual(state);
            let end = partial_end(start, end, visual.reveal);
            let width = visual.width * width_scale;
            if visual.glow {
                painter.line_segment(
                    [start, end],
                    Stroke::new(width * 3.0, visual.color.gamma_multiply(0.25)),
                );
            }
            draw_segment(
                painter,
                start,
                end,
                Stroke::new(width, visual.color),
                visual.dash,
            );
        }
    }

    fn draw_nodes(&self, painter: &Painter, rect: Rect, camera: &Camera, view: &ViewGraph, now: f64) {
        let zoom = camera.zoom();
        for index in draw_order(view) {
            let view_node = &view.nodes()[index];
            let id = view_node.node.id.as_str();
            let Some(world) = self.engine.position(id) else {
                continue;
            };
            let Some(state) = self.engine.node_state(id, now) else {
                continue;
            };

            let visual = node_visual(state);
            let center = camera.world_to_screen(rect, world);
            let radius = visual.radius * zoom;
            if !circle_visible(rect, center, radius + CONTROL_RADIUS * 4.0) {
                continue;
            }

            if visual.halo {
                painter.circle_stroke(
                    center,
                    radius + 7.0 * zoom,
                    Stroke::new(1.0, GOLD.gamma_multiply(0.35)),
                );
            }
            if visual.glow {
                painter.circle_filled(center, radius + 4.0, visual.stroke.gamma_multiply(0.18));
            }
            painter.circle_filled(center, radius, visual.fill.unwrap_or(BACKGROUND));
            painter.circle_stroke(center, radius, Stroke::new(visual.stroke_width, visual.stroke));
            if visual.selection_ring {
                painter.circle_stroke(
                    center,
                    radius + 3.0,
                    Stroke::new(1.2, Color32::WHITE.gamma_multiply(0.8)),
                );
            }
            if visual.content_dot {
                painter.circle_filled(center + vec2(radius, -radius) * 0.7, 2.0, CONTENT_DOT);
            }
            if visual.pin_marker {
                let marker = Rect::from_center_size(center + vec2(0.0, radius + 5.0), vec2(4.0, 4.0));
                painter.rect_filled(marker, 0.0, GOLD);
            }

            match visual.label {
                LabelStyle::Hidden => {}
                LabelStyle::Inside => {
                    painter.text(
                        center,
                        Align2::CENTER_CENTER,
                        truncate_label(&view_node.node.label, 16),
                        FontId::proportional(label_size(12.0, zoom)),
                        Color32::WHITE,
                    );
                }
                LabelStyle::Above(color) => {
                    painter.text(
                        center - vec2(0.0, radius + 4.0),
                        Align2::CENTER_BOTTOM,
                        truncate_label(&view_node.node.label, 32),
                        FontId::proportional(label_size(11.0, zoom)),
                        color,
                    );
                }
            }

            if visual.controls {
                let hit = hit_radius(view_node.role, view_node.node.kind(), zoom);
                for &control in controls_for(view_node.role) {
                    let at = center + control_offset(control, hit);
                    let (color, glyph) = match control {
                        NodeControl::AddChild => (Color32::from_rgb(34, 197, 94), "+"),
                        NodeControl::Remove => (Color32::from_rgb(239, 68, 68), "×"),
                    };
                    painter.circle_filled(at, CONTROL_RADIUS, color.gamma_multiply(0.85));
                    painter.text(
                        at,
                        Align2::CENTER_CENTER,
                        glyph,
                        FontId::proportional(11.0),
                        Color32::WHITE,
                    );
                }
            }
        }
    }

    fn draw_readout(&self, painter: &Painter, rect: Rect, camera: &Camera, view: &ViewGraph) {
        let center = camera.center();
        let layout_state = if self.engine.layout().is_idle() {
            "settled"
        } else {
            "settling"
        };
        painter.text(
            rect.left_bottom() + vec2(10.0, -10.0),
            Align2::LEFT_BOTTOM,
            format!(
                "x {:.0}  y {:.0}  zoom {:.2}  |  {} nodes, {} links in view  |  {layout_state}",
                center.x,
                center.y,
                camera.zoom(),
                view.len(),
                view.links().len(),
            ),
            FontId::monospace(11.0),
            Color32::from_gray(150),
        );

        if let Some(node) = self.engine.hovered().and_then(|id| self.engine.graph().node(id)) {
            let pinned = if self.engine.is_pinned(&node.id) {
                "  |  pinned (double-click to release)"
            } else {
                ""
            };
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                format!("{}  |  {}{pinned}", node.label, node.kind().label()),
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
        }
    }
}
