//! Per-document orchestrator.
//!
//! Drives INGEST → EXTRACT → FILTER → CROSS_REFERENCE → CLASSIFY →
//! COST_ESTIMATE in order, checking for cancellation before each stage and
//! emitting a progress event after each one. Engines are held behind traits
//! so tests can swap them.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::intelligence::{ConflictClassifier, CostEstimator};
use crate::models::enums::{DocumentState, Severity, StageName};
use crate::models::{Conflict, Document, Money, ScopeFinding};
use crate::pipeline::cancel::CancellationToken;
use crate::pipeline::crossref::{BaselineStore, CrossReferenceError, CrossReferencer};
use crate::pipeline::extraction::{ExtractionError, SpecExtractor, VocabularyExtractor};
use crate::pipeline::progress::{ProgressEvent, ProgressSink};
use crate::pipeline::scope::ScopeFilter;
use crate::reference::ReferenceTables;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cancelled before {0}")]
    Cancelled(StageName),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Cross-reference failed: {0}")]
    CrossReference(#[from] CrossReferenceError),

    #[error("Invalid state transition from {from:?} to {to}")]
    InvalidTransition {
        from: Option<DocumentState>,
        to: DocumentState,
    },

    #[error("Pipeline task failed: {0}")]
    Task(String),
}

/// A pipeline error attributed to the document and stage it happened in.
#[derive(Debug, Error)]
#[error("Document {document_id} failed at {stage}: {error}")]
pub struct PipelineFailure {
    pub document_id: Uuid,
    pub stage: StageName,
    #[source]
    pub error: PipelineError,
}

// ---------------------------------------------------------------------------
// Job and report types
// ---------------------------------------------------------------------------

/// One document to run, scoped to the project whose baseline applies.
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub document: Document,
    pub project_id: String,
    /// Cancels this document alone; the batch token still applies.
    pub cancel: Option<CancellationToken>,
}

impl IngestJob {
    pub fn new(document: Document, project_id: impl Into<String>) -> Self {
        Self {
            document,
            project_id: project_id.into(),
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Element counts after each stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub pages: usize,
    pub extracted: usize,
    pub in_scope: usize,
    pub aligned: usize,
    pub conflicts: usize,
}

/// Everything one document's run produced.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub document_id: Uuid,
    pub source_filename: String,
    pub project_id: String,
    pub state: DocumentState,
    pub conflicts: Vec<Conflict>,
    pub uncoordinated: Vec<ScopeFinding>,
    pub needs_review: Vec<ScopeFinding>,
    pub counts: StageCounts,
}

impl DocumentReport {
    pub fn total_cost(&self) -> Money {
        self.conflicts.iter().map(|c| c.cost_impact).sum()
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.conflicts.iter().map(|c| c.severity).max()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct DocumentPipeline {
    extractor: Box<dyn SpecExtractor + Send + Sync>,
    scope: ScopeFilter,
    crossref: CrossReferencer,
    classifier: ConflictClassifier,
    estimator: CostEstimator,
}

impl DocumentPipeline {
    pub fn new(tables: Arc<ReferenceTables>, store: Arc<dyn BaselineStore>) -> Self {
        let settings = &tables.settings;
        Self {
            extractor: Box::new(VocabularyExtractor::new(
                Arc::new(tables.vocabulary.clone()),
                settings.max_page_workers,
            )),
            scope: ScopeFilter::from_table(&tables.scope_keywords),
            crossref: CrossReferencer::new(
                store,
                settings.location_similarity_threshold,
                settings.retry,
            ),
            classifier: ConflictClassifier::new(tables.clone()),
            estimator: CostEstimator::new(tables),
        }
    }

    /// Replace the extraction engine.
    pub fn with_extractor(mut self, extractor: Box<dyn SpecExtractor + Send + Sync>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn run(
        &self,
        job: &IngestJob,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<DocumentReport, PipelineFailure> {
        let document = &job.document;
        let linked = job.cancel.as_ref().map(|own| own.linked_to(cancel));
        let mut run = Run {
            document_id: document.id,
            state: None,
            sink,
            cancel: linked.as_ref().unwrap_or(cancel),
        };

        run.begin(StageName::Ingest)?;
        tracing::info!(
            document_id = %document.id,
            filename = %document.source_filename,
            size = %document.display_size(),
            pages = document.page_count(),
            project_id = %job.project_id,
            "Document ingested"
        );
        run.complete(StageName::Ingest)?;

        run.begin(StageName::Extract)?;
        let extracted = self
            .extractor
            .extract(document)
            .map_err(|e| run.fail(StageName::Extract, e.into()))?;
        let extracted_count = extracted.len();
        run.complete(StageName::Extract)?;

        run.begin(StageName::Filter)?;
        let in_scope = self.scope.apply(extracted);
        run.complete(StageName::Filter)?;

        run.begin(StageName::CrossReference)?;
        let report = self
            .crossref
            .cross_reference(&job.project_id, &in_scope)
            .map_err(|e| run.fail(StageName::CrossReference, e.into()))?;
        run.complete(StageName::CrossReference)?;

        run.begin(StageName::Classify)?;
        let conflicts = self.classifier.classify(&document.id, &report.aligned);
        run.complete(StageName::Classify)?;

        run.begin(StageName::CostEstimate)?;
        let conflicts = self.estimator.estimate(conflicts);
        run.complete(StageName::CostEstimate)?;

        let counts = StageCounts {
            pages: document.page_count(),
            extracted: extracted_count,
            in_scope: in_scope.len(),
            aligned: report.aligned.len(),
            conflicts: conflicts.len(),
        };
        tracing::info!(
            document_id = %document.id,
            conflicts = counts.conflicts,
            uncoordinated = report.uncoordinated.len(),
            needs_review = report.needs_review.len(),
            "Document pipeline complete"
        );

        Ok(DocumentReport {
            document_id: document.id,
            source_filename: document.source_filename.clone(),
            project_id: job.project_id.clone(),
            state: run.state.unwrap_or(DocumentState::Estimated),
            conflicts,
            uncoordinated: report.uncoordinated,
            needs_review: report.needs_review,
            counts,
        })
    }
}

/// Book-keeping for one run: state machine, cancellation, progress.
struct Run<'a> {
    document_id: Uuid,
    state: Option<DocumentState>,
    sink: &'a dyn ProgressSink,
    cancel: &'a CancellationToken,
}

impl Run<'_> {
    fn fail(&self, stage: StageName, error: PipelineError) -> PipelineFailure {
        tracing::error!(
            document_id = %self.document_id,
            stage = stage.as_str(),
            error = %error,
            "Stage failed"
        );
        PipelineFailure {
            document_id: self.document_id,
            stage,
            error,
        }
    }

    fn begin(&self, stage: StageName) -> Result<(), PipelineFailure> {
        if self.cancel.is_cancelled() {
            tracing::warn!(
                document_id = %self.document_id,
                stage = stage.as_str(),
                "Cancelled at stage boundary"
            );
            return Err(PipelineFailure {
                document_id: self.document_id,
                stage,
                error: PipelineError::Cancelled(stage),
            });
        }
        tracing::debug!(
            document_id = %self.document_id,
            stage = stage.as_str(),
            "Stage started"
        );
        Ok(())
    }

    fn complete(&mut self, stage: StageName) -> Result<(), PipelineFailure> {
        let to = DocumentState::after(stage);
        let advanced = match self.state {
            None => (to == DocumentState::Ingested).then_some(to),
            Some(current) => current.advance(to),
        };
        let Some(next) = advanced else {
            return Err(self.fail(
                stage,
                PipelineError::InvalidTransition {
                    from: self.state,
                    to,
                },
            ));
        };
        self.state = Some(next);
        self.sink
            .emit(ProgressEvent::stage_completed(self.document_id, stage));
        Ok(())
    }
}
