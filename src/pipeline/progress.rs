use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::models::enums::StageName;

/// Emitted once a stage has finished for a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub document_id: Uuid,
    pub stage_name: StageName,
    /// 1-based position of the stage.
    pub stage_index: usize,
    pub total_stages: usize,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn stage_completed(document_id: Uuid, stage: StageName) -> Self {
        Self {
            document_id,
            stage_name: stage,
            stage_index: stage.index() + 1,
            total_stages: StageName::ALL.len(),
            timestamp: Utc::now(),
        }
    }

    /// Display line, e.g. "[3/6] FILTER".
    pub fn label(&self) -> String {
        format!(
            "[{}/{}] {}",
            self.stage_index, self.total_stages, self.stage_name
        )
    }
}

/// Receives progress events. Events for one document arrive in stage
/// order; events of different documents may interleave.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl ProgressSink for UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        // A dropped receiver only means nobody is watching.
        if self.send(event).is_err() {
            tracing::trace!("Progress receiver dropped");
        }
    }
}

/// Discards every event.
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn events_for(&self, document_id: Uuid) -> Vec<ProgressEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.document_id == document_id)
            .collect()
    }
}

impl ProgressSink for CollectingSink {
    fn emit(&self, event: ProgressEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
