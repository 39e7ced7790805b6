pub mod cancel;
pub mod crossref;
pub mod extraction;
pub mod ingestion; // Bounded multi-document fan-out
pub mod processor; // Per-document stage orchestrator
pub mod progress;
pub mod scope;

pub use ingestion::{IngestResult, IngestionManager};
pub use processor::{
    DocumentPipeline, DocumentReport, IngestJob, PipelineError, PipelineFailure, StageCounts,
};
