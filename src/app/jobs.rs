use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use crate::map::{CompletionService, Expansion, MapGraph, expand_node, synthesize_map};

pub(super) enum AiRequest {
    Synthesize { topic: String },
    Expand { graph: Arc<MapGraph>, parent: String },
}

pub(super) enum AiReply {
    Map { graph: MapGraph, focus: String },
    Expansion { parent: String, expansion: Expansion },
}

struct PendingJob {
    label: String,
    /// Expansions graft onto the map they were asked about.
    expands: bool,
    rx: Receiver<Result<AiReply, String>>,
}

/// Runs one completion request at a time off the UI thread.
pub(super) struct AiWorker {
    service: Arc<dyn CompletionService>,
    pending: Option<PendingJob>,
}

impl AiWorker {
    pub(super) fn new(service: Arc<dyn CompletionService>) -> Self {
        Self {
            service,
            pending: None,
        }
    }

    pub(super) fn busy_label(&self) -> Option<&str> {
        self.pending.as_ref().map(|job| job.label.as_str())
    }

    /// Starts `request` unless a job is already running. Returns whether it started.
    pub(super) fn submit(&mut self, request: AiRequest) -> bool {
        if self.pending.is_some() {
            return false;
        }

        let (label, expands) = match &request {
            AiRequest::Synthesize { topic } => (format!("Synthesizing \"{topic}\""), false),
            AiRequest::Expand { parent, .. } => (format!("Expanding {parent}"), true),
        };
        tracing::info!(job = %label, "starting AI job");

        let (tx, rx) = mpsc::channel();
        let service = Arc::clone(&self.service);
        thread::spawn(move || {
            let result = match request {
                AiRequest::Synthesize { topic } => synthesize_map(service.as_ref(), &topic)
                    .map(|(graph, focus)| AiReply::Map { graph, focus }),
                AiRequest::Expand { graph, parent } => {
                    expand_node(service.as_ref(), &graph, &parent)
                        .map(|expansion| AiReply::Expansion { parent, expansion })
                }
            };
            let _ = tx.send(result.map_err(|error| format!("{error:#}")));
        });

        self.pending = Some(PendingJob { label, expands, rx });
        true
    }

    /// Drops a running expansion, whose reply would no longer match the map.
    /// Returns whether one was dropped.
    pub(super) fn abandon_expansion(&mut self) -> bool {
        if !self.pending.as_ref().is_some_and(|job| job.expands) {
            return false;
        }
        if let Some(job) = self.pending.take() {
            tracing::info!(job = %job.label, "abandoned AI expansion after map change");
        }
        true
    }

    /// The finished job's result, once there is one.
    pub(super) fn poll(&mut self) -> Option<Result<AiReply, String>> {
        let job = self.pending.take()?;
        match job.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => {
                self.pending = Some(job);
                None
            }
            Err(TryRecvError::Disconnected) => Some(Err("AI worker disconnected".to_owned())),
        }
    }
}
