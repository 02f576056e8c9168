use eframe::egui::{self, Color32, RichText, Ui};
use serde_json::Value;

use crate::map::{Link, Node};

use super::super::jobs::AiRequest;
use super::super::{NodeDraft, Status, Workspace};

fn metric_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "n/a".to_owned(),
        other => other.to_string(),
    }
}

/// Neighbours of `id` with the relation of the first link joining them.
fn connections<'a>(links: &'a [Link], id: &str) -> Vec<(&'a str, &'a str)> {
    let mut seen = Vec::new();
    for link in links {
        if let Some(other) = link.opposite(id)
            && other != id
            && !seen.iter().any(|(known, _)| *known == other)
        {
            seen.push((other, link.relation.as_str()));
        }
    }
    seen
}

impl Workspace {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        let id = self.inspected_id();
        let Some(node) = self.engine.graph().node(&id).cloned() else {
            ui.label("Nothing selected.");
            return;
        };
        if self.draft.id != node.id {
            self.draft = NodeDraft::from_node(&node);
        }

        egui::ScrollArea::vertical().show(ui, |ui| {
            self.draw_node_header(ui, &node);
            ui.separator();
            if self.engine.edit_mode() {
                self.draw_node_editor(ui, &node);
                ui.separator();
            }
            draw_content(ui, &node);
            ui.separator();
            self.draw_connections(ui, &node);
        });
    }

    fn draw_node_header(&mut self, ui: &mut Ui, node: &Node) {
        ui.heading(node.label.as_str());
        ui.horizontal_wrapped(|ui| {
            ui.label(RichText::new(node.kind().label()).small());
            if !node.node_type.is_empty() {
                ui.label(RichText::new(format!("type: {}", node.node_type)).small());
            }
            if let Some(group) = node.group {
                ui.label(RichText::new(format!("group {group}")).small());
            }
            ui.label(RichText::new(node.id.as_str()).small().weak());
        });

        let now = ui.input(|input| input.time);
        ui.horizontal(|ui| {
            if node.id != self.engine.focus()
                && ui
                    .button("Focus")
                    .on_hover_text("Re-center the view on this node.")
                    .clicked()
            {
                let outcome = self.engine.click_node(&node.id, now);
                self.report("Navigate", outcome);
            }
            if self.engine.is_pinned(&node.id)
                && ui
                    .button("Release pin")
                    .on_hover_text("Let the layout move this node again.")
                    .clicked()
            {
                self.engine.unpin(&node.id);
            }
            if let Some(worker) = self.ai.as_mut() {
                let busy = worker.busy_label().is_some();
                if ui
                    .add_enabled(!busy, egui::Button::new("Expand with AI"))
                    .on_hover_text("Ask the AI backend for sub-topics under this node.")
                    .clicked()
                {
                    worker.submit(AiRequest::Expand {
                        graph: self.engine.graph_handle(),
                        parent: node.id.clone(),
                    });
                }
            }
        });
    }

    fn draw_node_editor(&mut self, ui: &mut Ui, node: &Node) {
        ui.label(RichText::new("Edit").strong());
        egui::Grid::new("node_editor")
            .num_columns(2)
            .striped(true)
            .show(ui, |ui| {
                ui.label("Label");
                ui.text_edit_singleline(&mut self.draft.label);
                ui.end_row();
                ui.label("Type");
                ui.text_edit_singleline(&mut self.draft.node_type)
                    .on_hover_text("macro, trend, risk, issue, satellite...");
                ui.end_row();
            });
        ui.label("Summary");
        ui.text_edit_multiline(&mut self.draft.summary);
        ui.label("Key insight");
        ui.text_edit_multiline(&mut self.draft.key_insight);
        ui.label("Notes");
        ui.text_edit_multiline(&mut self.draft.notes);

        ui.horizontal(|ui| {
            if ui.button("Apply").clicked() {
                let updated = self.engine.update_node(self.draft.apply_to(node));
                if self.report("Update node", updated).is_some() {
                    self.status = Some(Status::Info(format!("Updated {}", node.id)));
                }
            }
            if ui.button("Revert").clicked() {
                self.draft = NodeDraft::from_node(node);
            }
        });

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut self.new_child_label);
            let label = self.new_child_label.trim().to_owned();
            if ui
                .add_enabled(!label.is_empty(), egui::Button::new("Add child"))
                .clicked()
            {
                self.add_child_under(&node.id, &label);
            }
        });

        ui.horizontal(|ui| {
            egui::ComboBox::from_id_salt("link_target")
                .selected_text(if self.link_target.is_empty() {
                    "Link to...".to_owned()
                } else {
                    self.label_of(&self.link_target)
                })
                .show_ui(ui, |ui| {
                    for candidate in &self.engine.graph().nodes {
                        if candidate.id == node.id
                            || self.engine.graph().has_link_between(&node.id, &candidate.id)
                        {
                            continue;
                        }
                        ui.selectable_value(
                            &mut self.link_target,
                            candidate.id.clone(),
                            candidate.label.as_str(),
                        );
                    }
                });
            if ui
                .add_enabled(!self.link_target.is_empty(), egui::Button::new("Link"))
                .clicked()
            {
                let link = Link::new(
                    node.id.as_str(),
                    self.link_target.as_str(),
                    self.link_relation.as_str(),
                );
                let added = self.engine.add_link(link);
                if self.report("Link", added).is_some() {
                    self.link_target.clear();
                }
            }
        });

        ui.add_space(6.0);
        let last_node = self.engine.graph().node_count() <= 1;
        if ui
            .add_enabled(
                !last_node,
                egui::Button::new(
                    RichText::new("Delete node").color(Color32::from_rgb(239, 68, 68)),
                ),
            )
            .on_hover_text("Remove this node and every link touching it.")
            .clicked()
        {
            let removed = self.engine.remove_node(&node.id);
            if self.report("Remove node", removed).is_some() {
                self.status = Some(Status::Info(format!("Removed {}", node.id)));
            }
        }
    }

    fn draw_connections(&mut self, ui: &mut Ui, node: &Node) {
        let graph = self.engine.graph_handle();
        let connections = connections(&graph.links, &node.id);
        ui.label(RichText::new(format!("Connections ({})", connections.len())).strong());

        let edit_mode = self.engine.edit_mode();
        let mut select = None;
        let mut unlink = None;
        for (other, relation) in &connections {
            ui.horizontal(|ui| {
                let label = graph
                    .node(other)
                    .map_or(*other, |other| other.label.as_str());
                if ui.link(label).on_hover_text(*relation).clicked() {
                    select = Some(other.to_string());
                }
                ui.label(RichText::new(*relation).small().weak());
                if edit_mode && ui.small_button("Unlink").clicked() {
                    unlink = Some(other.to_string());
                }
            });
        }

        if let Some(id) = select {
            let selected = self.engine.set_selected(Some(&id));
            self.report("Select", selected);
        }
        if let Some(other) = unlink {
            let removed = self.engine.remove_link(&node.id, &other);
            self.report("Unlink", removed);
        }
    }
}

fn draw_content(ui: &mut Ui, node: &Node) {
    let content = &node.content;
    if content.is_empty() {
        ui.label(RichText::new("No intelligence recorded for this node yet.").weak());
        return;
    }

    if let Some(summary) = content.summary.as_deref() {
        ui.label(summary);
    }
    if let Some(insight) = content.key_insight.as_deref() {
        ui.add_space(4.0);
        ui.label(RichText::new("Key insight").strong());
        ui.label(RichText::new(insight).italics());
    }

    if !content.metrics.is_empty() {
        ui.add_space(4.0);
        egui::Grid::new("metrics").num_columns(2).show(ui, |ui| {
            for metric in &content.metrics {
                ui.label(metric.label.as_str());
                ui.label(RichText::new(metric_text(&metric.value)).strong());
                ui.end_row();
            }
        });
    }

    for (title, items) in [
        ("Sub-topics", &content.sub_topics),
        ("Challenges", &content.challenges),
    ] {
        if items.is_empty() {
            continue;
        }
        ui.add_space(4.0);
        ui.label(RichText::new(title).strong());
        for item in items {
            ui.label(format!("• {}", item.text()));
        }
    }

    if content.all_quotes().next().is_some() {
        ui.add_space(4.0);
        ui.label(RichText::new("Expert views").strong());
        for quote in content.all_quotes() {
            ui.label(RichText::new(format!("\"{}\"", quote.quote)).italics());
            if let Some(author) = quote.author.as_deref() {
                ui.label(RichText::new(format!("— {author}")).small());
            }
        }
    }

    if !content.related_reports.is_empty() {
        ui.add_space(4.0);
        ui.label(RichText::new("Reports").strong());
        for report in &content.related_reports {
            match report.url.as_deref() {
                Some(url) => {
                    ui.hyperlink_to(report.title.as_str(), url);
                }
                None => {
                    ui.label(report.title.as_str());
                }
            }
        }
    }

    if let Some(notes) = content.notes.as_deref() {
        ui.add_space(4.0);
        ui.label(RichText::new("Notes").strong());
        ui.label(notes);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn connections_are_unique_per_neighbour() {
        let links = vec![
            Link::new("a", "b", "drives"),
            Link::new("c", "a", "feeds"),
            Link::new("b", "a", "echoes"),
            Link::new("a", "a", "self"),
        ];
        assert_eq!(connections(&links, "a"), vec![("b", "drives"), ("c", "feeds")]);
    }

    #[test]
    fn metric_values_render_plainly() {
        assert_eq!(metric_text(&Value::String("12%".to_owned())), "12%");
        assert_eq!(metric_text(&serde_json::json!(3.5)), "3.5");
        assert_eq!(metric_text(&Value::Null), "n/a");
    }
}
