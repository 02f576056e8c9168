use std::path::{Path, PathBuf};

use eframe::egui::{self, RichText, Ui};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::engine::layout::LayoutConfig;
use crate::map::{MapGraph, write_map_file};

use super::super::jobs::AiRequest;
use super::super::{Status, Workspace, WorkspaceRequest};

const SEARCH_RESULTS: usize = 12;

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_lowercase(), &query.to_lowercase()))
}

/// Ids of the nodes best matching `query` by label or id, best first.
pub(super) fn search_nodes<'a>(graph: &'a MapGraph, query: &str, limit: usize) -> Vec<&'a str> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    let matcher = SkimMatcherV2::default();
    let mut scored = graph
        .nodes
        .iter()
        .filter_map(|node| {
            let by_label = fuzzy_match_score(&matcher, &node.label, query);
            let by_id = fuzzy_match_score(&matcher, &node.id, query);
            by_label.max(by_id).map(|score| (score, node.id.as_str()))
        })
        .collect::<Vec<_>>();
    // Stable sort keeps document order among equal scores.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(limit).map(|(_, id)| id).collect()
}

impl Workspace {
    pub(in crate::app) fn draw_controls(
        &mut self,
        ui: &mut Ui,
        request: &mut Option<WorkspaceRequest>,
    ) {
        let now = ui.input(|input| input.time);
        egui::ScrollArea::vertical().show(ui, |ui| {
            self.draw_map_section(ui);
            ui.separator();
            self.draw_navigation_section(ui, now);
            ui.separator();
            self.draw_search_section(ui, now);
            ui.separator();
            self.draw_layout_section(ui);
            ui.separator();
            self.draw_file_section(ui, request);
            if self.ai.is_some() {
                ui.separator();
                self.draw_ai_section(ui);
            }
        });
    }

    fn draw_map_section(&mut self, ui: &mut Ui) {
        let meta = &self.engine.graph().meta;
        ui.heading(meta.title.as_str());
        if let Some(description) = meta.description.as_deref() {
            ui.label(description);
        }
        ui.add_space(4.0);

        let mut edit_mode = self.engine.edit_mode();
        if ui
            .checkbox(&mut edit_mode, "Edit mode")
            .on_hover_text("Show add/remove controls on nodes and edit fields in the details panel.")
            .changed()
        {
            self.engine.set_edit_mode(edit_mode);
        }
        if edit_mode {
            ui.horizontal(|ui| {
                ui.label("New topic");
                ui.text_edit_singleline(&mut self.new_child_label)
                    .on_hover_text("Label used by the + control. Empty means \"New Topic\".");
            });
            ui.horizontal(|ui| {
                ui.label("Relation");
                ui.text_edit_singleline(&mut self.link_relation);
            });
        }
    }

    fn draw_navigation_section(&mut self, ui: &mut Ui, now: f64) {
        ui.label(RichText::new("Focus").strong());
        let focus_label = self.label_of(self.engine.focus());
        ui.label(focus_label);
        if self.engine.is_pivoting() {
            ui.label(RichText::new("moving...").italics());
        }

        if let Some(previous) = self.engine.previous_focus() {
            let text = format!("Back to {}", self.label_of(previous));
            if ui
                .button(text)
                .on_hover_text("Pivot to the previous focus.")
                .clicked()
            {
                self.engine.go_back(now);
            }
        }

        let trail = self.trail.borrow().clone();
        if trail.len() > 1 {
            ui.add_space(4.0);
            ui.label(RichText::new("Trail").small());
            let mut jump = None;
            ui.horizontal_wrapped(|ui| {
                for (index, id) in trail.iter().enumerate() {
                    if index > 0 {
                        ui.label("›");
                    }
                    if !self.engine.graph().contains(id) {
                        ui.label(RichText::new(id.as_str()).strikethrough());
                    } else if ui.link(self.label_of(id)).clicked() {
                        jump = Some(id.clone());
                    }
                }
            });
            if let Some(id) = jump {
                let outcome = self.engine.click_node(&id, now);
                self.report("Navigate", outcome);
            }
        }
    }

    fn draw_search_section(&mut self, ui: &mut Ui, now: f64) {
        ui.label("Find a node")
            .on_hover_text("Fuzzy search over every node of the map, not just the view.");
        ui.text_edit_singleline(&mut self.search);

        let matches = search_nodes(self.engine.graph(), &self.search, SEARCH_RESULTS)
            .into_iter()
            .map(str::to_owned)
            .collect::<Vec<_>>();
        let mut jump = None;
        for id in &matches {
            let in_view = self.engine.view().contains(id);
            let text = if in_view {
                self.label_of(id)
            } else {
                format!("{}  (off view)", self.label_of(id))
            };
            if ui.link(text).on_hover_text(id.as_str()).clicked() {
                jump = Some(id.clone());
            }
        }
        if let Some(id) = jump {
            let outcome = self.engine.click_node(&id, now);
            if self.report("Navigate", outcome).is_some() {
                self.search.clear();
            }
        }
    }

    fn draw_layout_section(&mut self, ui: &mut Ui) {
        ui.collapsing("Layout", |ui| {
            let mut config = self.engine.config().layout;
            let mut changed = false;

            changed |= ui
                .add(egui::Slider::new(&mut config.repulsion, 20.0..=2_000.0).text("Repulsion"))
                .on_hover_text("How strongly nodes push each other apart.")
                .changed();
            changed |= ui
                .add(
                    egui::Slider::new(&mut config.link_distance, 20.0..=400.0)
                        .text("Link distance"),
                )
                .on_hover_text("Rest length of links.")
                .changed();
            changed |= ui
                .add(
                    egui::Slider::new(&mut config.link_stiffness, 0.0..=1.0)
                        .text("Link stiffness"),
                )
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut config.collision, 0.0..=1.0).text("Collision"))
                .on_hover_text("How hard overlapping bodies are separated.")
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut config.center_pull, 0.0..=0.2).text("Center pull"))
                .changed();
            changed |= ui
                .add(
                    egui::Slider::new(&mut config.velocity_decay, 0.05..=0.9)
                        .text("Velocity decay"),
                )
                .on_hover_text("Fraction of speed lost every step. Higher settles faster.")
                .changed();
            changed |= ui
                .add(
                    egui::Slider::new(&mut config.iterations_per_frame, 1..=16)
                        .text("Steps per frame"),
                )
                .changed();

            if changed {
                self.engine.set_layout_config(config);
            }
            if ui.button("Restore defaults").clicked() {
                self.engine.set_layout_config(LayoutConfig::default());
            }

            let mut delay_ms = (self.engine.config().settle_delay * 1000.0) as f32;
            if ui
                .add(egui::Slider::new(&mut delay_ms, 0.0..=1_000.0).text("Pivot delay (ms)"))
                .on_hover_text("Time between a click and the view re-centering.")
                .changed()
            {
                self.engine.set_settle_delay(f64::from(delay_ms) / 1000.0);
            }
        });
    }

    fn draw_file_section(&mut self, ui: &mut Ui, request: &mut Option<WorkspaceRequest>) {
        ui.label(RichText::new("File").strong());
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut self.save_path);
            if ui
                .button("Export")
                .on_hover_text("Write the map, including pinned positions, as JSON.")
                .clicked()
            {
                let path = PathBuf::from(self.save_path.trim());
                self.export_to(&path);
            }
        });
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut self.open_path);
            let path = self.open_path.trim();
            if ui
                .add_enabled(!path.is_empty(), egui::Button::new("Open"))
                .clicked()
            {
                *request = Some(WorkspaceRequest::Open(PathBuf::from(path)));
            }
        });
        if ui.button("New blank map").clicked() {
            *request = Some(WorkspaceRequest::Blank);
        }
    }

    fn draw_ai_section(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("AI").strong());
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut self.ai_topic)
                .on_hover_text("Topic for a brand new map.");
            let topic = self.ai_topic.trim().to_owned();
            if ui
                .add_enabled(!topic.is_empty(), egui::Button::new("Synthesize"))
                .clicked()
                && let Some(worker) = self.ai.as_mut()
                && !worker.submit(AiRequest::Synthesize { topic })
            {
                self.status = Some(Status::Error("An AI job is already running".to_owned()));
            }
        });
    }

    fn export_to(&mut self, path: &Path) {
        let written = self
            .engine
            .export_document()
            .map_err(anyhow::Error::from)
            .and_then(|text| write_map_file(path, &text));
        self.status = Some(match written {
            Ok(()) => {
                self.source = Some(path.to_path_buf());
                Status::Info(format!("Saved {}", path.display()))
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), error = %format!("{error:#}"), "export failed");
                Status::Error(format!("{error:#}"))
            }
        });
    }

    pub(in crate::app) fn label_of(&self, id: &str) -> String {
        self.engine
            .graph()
            .node(id)
            .map_or_else(|| id.to_owned(), |node| node.label.clone())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::map::{MapMeta, Node};

    fn graph() -> MapGraph {
        MapGraph {
            meta: MapMeta {
                title: "t".to_owned(),
                ..MapMeta::default()
            },
            nodes: vec![
                Node::new("energy_security", "Energy Security", "macro"),
                Node::new("grid", "Grid Resilience", "trend"),
                Node::new("lng", "LNG Imports", "issue"),
            ],
            links: Vec::new(),
        }
    }

    #[test]
    fn search_matches_labels_and_ids() {
        let graph = graph();
        assert_eq!(search_nodes(&graph, "resil", 5), vec!["grid"]);
        assert_eq!(search_nodes(&graph, "energy_sec", 5), vec!["energy_security"]);
        assert!(search_nodes(&graph, "   ", 5).is_empty());
    }

    #[test]
    fn search_respects_limit() {
        let graph = graph();
        assert!(search_nodes(&graph, "e", 1).len() <= 1);
    }
}
