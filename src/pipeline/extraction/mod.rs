pub mod confidence;
pub mod orchestrator;
pub mod page;

pub use orchestrator::*;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{Document, SpecificationElement};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Document {0} has no pages")]
    EmptyDocument(Uuid),

    #[error("Page worker {worker} panicked while extracting document {document_id}")]
    WorkerPanicked { document_id: Uuid, worker: usize },
}

/// Turns positioned text into specification elements.
pub trait SpecExtractor {
    /// Elements in page order, then reading order within the page.
    fn extract(&self, document: &Document) -> Result<Vec<SpecificationElement>, ExtractionError>;
}
