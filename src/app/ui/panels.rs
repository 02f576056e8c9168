use std::path::PathBuf;

use eframe::egui::{self, Align, Color32, Context, Layout, RichText};

use super::super::jobs::AiReply;
use super::super::{LoadScreen, Status, Workspace, WorkspaceRequest};

pub(in crate::app) fn draw_load_screen(
    ctx: &Context,
    screen: &mut LoadScreen,
    request: &mut Option<WorkspaceRequest>,
) {
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(120.0);
            ui.heading("Strategic Map");
            ui.label("Open a map document or start from a blank map.");
            ui.add_space(12.0);

            let path_response = ui
                .add(
                    egui::TextEdit::singleline(&mut screen.path)
                        .hint_text("path/to/map.json")
                        .desired_width(420.0),
                )
                .on_hover_text("JSON document with meta, nodes and links.");
            let submitted =
                path_response.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));

            ui.horizontal(|ui| {
                ui.add_space((ui.available_width() - 180.0).max(0.0) / 2.0);
                let path = screen.path.trim();
                if (ui
                    .add_enabled(!path.is_empty(), egui::Button::new("Open"))
                    .clicked()
                    || submitted)
                    && !path.is_empty()
                {
                    *request = Some(WorkspaceRequest::Open(PathBuf::from(path)));
                }
                if ui.button("Blank map").clicked() {
                    *request = Some(WorkspaceRequest::Blank);
                }
            });

            if let Some(error) = &screen.last_error {
                ui.add_space(12.0);
                ui.label(RichText::new("The last map could not be loaded:").strong());
                ui.colored_label(Color32::from_rgb(239, 120, 120), error.as_str());
            }
        });
    });
}

impl Workspace {
    pub(in crate::app) fn show(
        &mut self,
        ctx: &Context,
        request: &mut Option<WorkspaceRequest>,
        is_reloading: bool,
    ) {
        self.poll_ai(ctx);

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading(self.engine.graph().meta.title.as_str());
                    ui.separator();
                    ui.label(format!("nodes: {}", self.engine.graph().node_count()));
                    ui.label(format!("links: {}", self.engine.graph().link_count()));
                    if let Some(source) = &self.source {
                        ui.label(format!("file: {}", source.display()));
                    } else {
                        ui.label("unsaved map");
                    }
                    if is_reloading {
                        ui.spinner();
                    }
                    if ui.button("Close").clicked() {
                        *request = Some(WorkspaceRequest::Close);
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if let Some(label) = self.ai.as_ref().and_then(|ai| ai.busy_label()) {
                            ui.label(label);
                            ui.spinner();
                        }
                        match &self.status {
                            Some(Status::Info(text)) => {
                                ui.label(text.as_str());
                            }
                            Some(Status::Error(text)) => {
                                ui.colored_label(Color32::from_rgb(239, 120, 120), text.as_str());
                            }
                            None => {}
                        }
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_controls(ui, request));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(360.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_graph(ui));
    }

    pub(in crate::app) fn poll_ai(&mut self, ctx: &Context) {
        let Some(worker) = self.ai.as_mut() else {
            return;
        };
        let Some(result) = worker.poll() else {
            if worker.busy_label().is_some() {
                ctx.request_repaint();
            }
            return;
        };

        match result {
            Ok(AiReply::Map { graph, focus }) => match self.engine.load_graph(graph, Some(&focus)) {
                Ok(()) => {
                    self.source = None;
                    self.reset_session();
                    self.status = Some(Status::Info(format!(
                        "Synthesized \"{}\"",
                        self.engine.graph().meta.title
                    )));
                }
                Err(error) => self.status = Some(Status::Error(error.to_string())),
            },
            Ok(AiReply::Expansion { parent, expansion }) => {
                let added = expansion.nodes.len();
                let merged = self.engine.merge_expansion(&parent, expansion);
                if self.report("Expand", merged).is_some() {
                    self.status = Some(Status::Info(format!(
                        "Expanded {parent} with up to {added} topics"
                    )));
                }
            }
            Err(error) => {
                tracing::warn!(%error, "AI job failed");
                self.status = Some(Status::Error(error));
            }
        }
    }
}
