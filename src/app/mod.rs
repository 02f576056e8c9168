use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use eframe::egui::{self, Context};

use crate::engine::{EngineConfig, MapEngine};
use crate::map::{CommandCompletion, CompletionService, MapGraph, Node, load_map_file};

mod graph;
mod jobs;
mod render_utils;
mod ui;

use jobs::AiWorker;

const TRAIL_LEN: usize = 12;

/// What to show first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum StartupMap {
    #[default]
    None,
    Blank,
    File(PathBuf),
}

#[derive(Clone, Debug, Default)]
pub struct LaunchOptions {
    pub startup: StartupMap,
    pub engine: EngineConfig,
    /// Command line of the completion backend, if AI features are enabled.
    pub ai_command: Option<String>,
}

pub struct StrategicMapApp {
    config: EngineConfig,
    ai: Option<Arc<dyn CompletionService>>,
    state: AppState,
    reload_rx: Option<Receiver<LoadResult>>,
}

type LoadResult = Result<LoadedMap, String>;

struct LoadedMap {
    graph: MapGraph,
    source: Option<PathBuf>,
}

enum AppState {
    Welcome(LoadScreen),
    Loading {
        rx: Receiver<LoadResult>,
        path: PathBuf,
    },
    Ready(Box<Workspace>),
}

#[derive(Default)]
struct LoadScreen {
    path: String,
    last_error: Option<String>,
}

/// Asked of the app by a workspace; applied after the frame is drawn.
enum WorkspaceRequest {
    Open(PathBuf),
    Blank,
    Close,
}

struct Workspace {
    engine: MapEngine,
    source: Option<PathBuf>,
    save_path: String,
    open_path: String,
    search: String,
    /// Foci visited in this session, oldest first.
    trail: Rc<RefCell<Vec<String>>>,
    dragging: Option<String>,
    draft: NodeDraft,
    new_child_label: String,
    link_target: String,
    link_relation: String,
    ai_topic: String,
    ai: Option<AiWorker>,
    status: Option<Status>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Status {
    Info(String),
    Error(String),
}

/// Edit buffers for the selected node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct NodeDraft {
    id: String,
    label: String,
    node_type: String,
    summary: String,
    key_insight: String,
    notes: String,
}

impl NodeDraft {
    fn from_node(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            label: node.label.clone(),
            node_type: node.node_type.clone(),
            summary: node.content.summary.clone().unwrap_or_default(),
            key_insight: node.content.key_insight.clone().unwrap_or_default(),
            notes: node.content.notes.clone().unwrap_or_default(),
        }
    }

    /// `node` with the edited fields written over it.
    fn apply_to(&self, node: &Node) -> Node {
        fn optional(text: &str) -> Option<String> {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_owned())
        }

        let mut node = node.clone();
        node.label = self.label.trim().to_owned();
        node.node_type = self.node_type.trim().to_owned();
        node.content.summary = optional(&self.summary);
        node.content.key_insight = optional(&self.key_insight);
        node.content.notes = optional(&self.notes);
        node
    }
}

impl StrategicMapApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, launch: LaunchOptions) -> Self {
        let ai = launch
            .ai_command
            .as_deref()
            .and_then(CommandCompletion::from_command_line)
            .map(|service| Arc::new(service) as Arc<dyn CompletionService>);
        if launch.ai_command.is_some() && ai.is_none() {
            tracing::warn!("ignoring empty AI command");
        }

        let state = match launch.startup {
            StartupMap::None => AppState::Welcome(LoadScreen::default()),
            StartupMap::Blank => Self::open(
                LoadedMap {
                    graph: MapGraph::blank(),
                    source: None,
                },
                launch.engine,
                ai.clone(),
            ),
            StartupMap::File(path) => Self::start_load(path),
        };
        Self {
            config: launch.engine,
            ai,
            state,
            reload_rx: None,
        }
    }

    fn spawn_load(path: PathBuf) -> Receiver<LoadResult> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = load_map_file(&path)
                .map(|graph| LoadedMap {
                    graph,
                    source: Some(path),
                })
                .map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(path: PathBuf) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(path.clone()),
            path,
        }
    }

    fn open(
        loaded: LoadedMap,
        config: EngineConfig,
        ai: Option<Arc<dyn CompletionService>>,
    ) -> AppState {
        match Workspace::new(loaded, config, ai) {
            Ok(workspace) => AppState::Ready(Box::new(workspace)),
            Err(error) => {
                tracing::error!(%error, "map rejected by the engine");
                AppState::Welcome(LoadScreen {
                    path: String::new(),
                    last_error: Some(error.to_string()),
                })
            }
        }
    }
}

impl eframe::App for StrategicMapApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Welcome(screen) => {
                let mut request = None;
                ui::draw_load_screen(ctx, screen, &mut request);
                match request {
                    Some(WorkspaceRequest::Open(path)) => {
                        transition = Some(Self::start_load(path));
                    }
                    Some(WorkspaceRequest::Blank) => {
                        transition = Some(Self::open(
                            LoadedMap {
                                graph: MapGraph::blank(),
                                source: None,
                            },
                            self.config,
                            self.ai.clone(),
                        ));
                    }
                    Some(WorkspaceRequest::Close) | None => {}
                }
            }
            AppState::Loading { rx, path } => {
                match rx.try_recv() {
                    Ok(Ok(loaded)) => {
                        transition = Some(Self::open(loaded, self.config, self.ai.clone()));
                    }
                    Ok(Err(error)) => {
                        tracing::warn!(path = %path.display(), %error, "map load failed");
                        transition = Some(AppState::Welcome(LoadScreen {
                            path: path.display().to_string(),
                            last_error: Some(error),
                        }));
                    }
                    Err(TryRecvError::Empty) => ctx.request_repaint(),
                    Err(TryRecvError::Disconnected) => {
                        transition = Some(AppState::Welcome(LoadScreen {
                            path: path.display().to_string(),
                            last_error: Some("Background load worker disconnected".to_owned()),
                        }));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading(format!("Loading {}...", path.display()));
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Ready(workspace) => {
                let mut request = None;
                let is_reloading = self.reload_rx.is_some();
                workspace.show(ctx, &mut request, is_reloading);

                match request {
                    Some(WorkspaceRequest::Open(path)) if self.reload_rx.is_none() => {
                        self.reload_rx = Some(Self::spawn_load(path));
                    }
                    Some(WorkspaceRequest::Blank) => {
                        workspace.replace_map(MapGraph::blank(), None);
                    }
                    Some(WorkspaceRequest::Close) => {
                        transition = Some(AppState::Welcome(LoadScreen::default()));
                    }
                    Some(WorkspaceRequest::Open(_)) | None => {}
                }

                if let Some(rx) = self.reload_rx.take() {
                    match rx.try_recv() {
                        Ok(Ok(loaded)) => workspace.replace_map(loaded.graph, loaded.source),
                        Ok(Err(error)) => {
                            tracing::warn!(%error, "map load failed, keeping current map");
                            workspace.status = Some(Status::Error(error));
                        }
                        Err(TryRecvError::Empty) => {
                            self.reload_rx = Some(rx);
                            ctx.request_repaint();
                        }
                        Err(TryRecvError::Disconnected) => {
                            workspace.status = Some(Status::Error(
                                "Background load worker disconnected".to_owned(),
                            ));
                        }
                    }
                }
            }
        }

        if let Some(next_state) = transition {
            self.reload_rx = None;
            self.state = next_state;
        }
    }
}

impl Workspace {
    fn new(
        loaded: LoadedMap,
        config: EngineConfig,
        ai: Option<Arc<dyn CompletionService>>,
    ) -> Result<Self, crate::map::MapError> {
        let mut engine = MapEngine::new(loaded.graph, config)?;
        let trail = Rc::new(RefCell::new(vec![engine.focus().to_owned()]));
        let sink = Rc::clone(&trail);
        engine.on_pivot(move |pivot| {
            let mut trail = sink.borrow_mut();
            trail.push(pivot.to.clone());
            if trail.len() > TRAIL_LEN {
                let overflow = trail.len() - TRAIL_LEN;
                trail.drain(..overflow);
            }
        });

        let save_path = loaded
            .source
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "strategic_map.json".to_owned());
        tracing::info!(
            title = %engine.graph().meta.title,
            nodes = engine.graph().node_count(),
            "workspace opened"
        );

        Ok(Self {
            engine,
            source: loaded.source,
            save_path,
            open_path: String::new(),
            search: String::new(),
            trail,
            dragging: None,
            draft: NodeDraft::default(),
            new_child_label: String::new(),
            link_target: String::new(),
            link_relation: "relates to".to_owned(),
            ai_topic: String::new(),
            ai: ai.map(AiWorker::new),
            status: None,
        })
    }

    /// Swaps in another map, keeping panels and tuning. A rejected map changes nothing.
    fn replace_map(&mut self, graph: MapGraph, source: Option<PathBuf>) {
        match self.engine.load_graph(graph, None) {
            Ok(()) => {
                if let Some(path) = &source {
                    self.save_path = path.display().to_string();
                }
                self.source = source;
                self.reset_session();
                self.status = Some(Status::Info(format!(
                    "Opened \"{}\"",
                    self.engine.graph().meta.title
                )));
            }
            Err(error) => self.status = Some(Status::Error(error.to_string())),
        }
    }

    fn reset_session(&mut self) {
        let mut trail = self.trail.borrow_mut();
        trail.clear();
        trail.push(self.engine.focus().to_owned());
        drop(trail);
        if let Some(ai) = self.ai.as_mut() {
            ai.abandon_expansion();
        }
        self.dragging = None;
        self.draft = NodeDraft::default();
        self.search.clear();
    }

    /// Node the details panel shows: the selection, else the focus.
    fn inspected_id(&self) -> String {
        self.engine
            .selected()
            .unwrap_or_else(|| self.engine.focus())
            .to_owned()
    }

    fn report<T>(&mut self, action: &str, result: Result<T, crate::map::MapError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.status = Some(Status::Error(format!("{action}: {error}")));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::map::TopicItem;
    use super::jobs::AiRequest;

    struct Canned(&'static str);

    impl CompletionService for Canned {
        fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.to_owned())
        }
    }

    #[test]
    fn expansion_from_a_replaced_map_is_discarded() {
        let reply = r#"{"nodes":[{"id":"stale","label":"Stale","type":"issue"}],"links":[]}"#;
        let loaded = LoadedMap {
            graph: MapGraph::blank(),
            source: None,
        };
        let service: Arc<dyn CompletionService> = Arc::new(Canned(reply));
        let mut workspace =
            Workspace::new(loaded, EngineConfig::default(), Some(service)).expect("blank map is valid");

        let request = AiRequest::Expand {
            graph: workspace.engine.graph_handle(),
            parent: "central_hub".to_owned(),
        };
        assert!(workspace.ai.as_mut().is_some_and(|ai| ai.submit(request)));
        workspace.replace_map(MapGraph::blank(), None);

        thread::sleep(Duration::from_millis(50));
        workspace.poll_ai(&Context::default());
        assert_eq!(workspace.engine.graph().node_count(), 1);
        assert!(!workspace.engine.graph().contains("stale"));
    }

    #[test]
    fn draft_round_trips_untouched_fields() {
        let mut node = Node::new("n", "Label", "trend").with_summary("Summary");
        node.content.sub_topics = vec!["kept".into()];
        let mut draft = NodeDraft::from_node(&node);
        assert_eq!(draft.apply_to(&node), node);

        draft.summary = "   ".to_owned();
        draft.key_insight = " insight ".to_owned();
        let edited = draft.apply_to(&node);
        assert_eq!(edited.content.summary, None);
        assert_eq!(edited.content.key_insight.as_deref(), Some("insight"));
        assert_eq!(edited.content.sub_topics, vec![TopicItem::from("kept")]);
    }
}
