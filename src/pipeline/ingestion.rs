//! Multi-document ingestion.
//!
//! Each document runs through its own [`DocumentPipeline`] pass on the
//! blocking pool; a semaphore bounds how many run at once. A failure in one
//! document never affects another.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::models::enums::StageName;
use crate::pipeline::cancel::CancellationToken;
use crate::pipeline::processor::{
    DocumentPipeline, DocumentReport, IngestJob, PipelineError, PipelineFailure,
};
use crate::pipeline::progress::ProgressSink;

pub type IngestResult = Result<DocumentReport, PipelineFailure>;

pub struct IngestionManager {
    pipeline: Arc<DocumentPipeline>,
    max_concurrent: usize,
    cancel: CancellationToken,
}

impl IngestionManager {
    pub fn new(pipeline: Arc<DocumentPipeline>, max_concurrent: usize) -> Self {
        Self {
            pipeline,
            max_concurrent: max_concurrent.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Share an externally owned token, e.g. one wired to Ctrl-C.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every job, returning one result per job in input order.
    pub async fn process_all(
        &self,
        jobs: Vec<IngestJob>,
        sink: Arc<dyn ProgressSink>,
    ) -> Vec<IngestResult> {
        let total = jobs.len();
        tracing::info!(
            documents = total,
            max_concurrent = self.max_concurrent,
            "Starting ingestion"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut set = JoinSet::new();
        let ids: Vec<Uuid> = jobs.iter().map(|j| j.document.id).collect();

        for (index, job) in jobs.into_iter().enumerate() {
            let pipeline = self.pipeline.clone();
            let sink = sink.clone();
            let cancel = self.cancel.clone();
            let semaphore = semaphore.clone();
            let document_id = job.document.id;

            set.spawn(async move {
                let permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (index, Err(task_failure(document_id, e.to_string()))),
                };
                let result = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    pipeline.run(&job, sink.as_ref(), &cancel)
                })
                .await
                .unwrap_or_else(|e| Err(task_failure(document_id, e.to_string())));
                (index, result)
            });
        }

        let mut slots: Vec<Option<IngestResult>> = (0..total).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => tracing::error!(error = %e, "Ingestion task aborted"),
            }
        }

        let results: Vec<IngestResult> = slots
            .into_iter()
            .zip(ids)
            .map(|(slot, document_id)| {
                slot.unwrap_or_else(|| {
                    Err(task_failure(document_id, "task did not complete".into()))
                })
            })
            .collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        tracing::info!(
            documents = total,
            succeeded = total - failed,
            failed,
            "Ingestion complete"
        );
        results
    }
}

fn task_failure(document_id: Uuid, reason: String) -> PipelineFailure {
    PipelineFailure {
        document_id,
        stage: StageName::Ingest,
        error: PipelineError::Task(reason),
    }
}
