//! Aligns extracted elements with approved baseline records.

pub mod matcher;
pub mod store;

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use matcher::{location_similarity, normalize_location, select_baseline, Selection};
pub use store::{
    BaselineReader, BaselineStore, BaselineStoreError, InMemoryBaselineStore, RetryPolicy,
    SqliteBaselineStore,
};

use crate::models::{AlignedPair, MatchKey, ScopeFinding, SpecificationElement};

#[derive(Error, Debug)]
pub enum CrossReferenceError {
    #[error(
        "Ambiguous baseline for {category} at '{location}': {} submittals approved {approved_on} ({})",
        .submittals.len(),
        .submittals.join(", ")
    )]
    AmbiguousBaseline {
        category: String,
        location: String,
        approved_on: NaiveDate,
        submittals: Vec<String>,
    },

    #[error("Baseline store unavailable after {attempts} attempts: {source}")]
    BaselineUnavailable {
        attempts: u32,
        source: BaselineStoreError,
    },

    #[error("Baseline store error: {0}")]
    Store(BaselineStoreError),
}

/// Result of one document's cross-reference pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossReferenceReport {
    pub aligned: Vec<AlignedPair>,
    /// Elements with no baseline at all (`UNCOORDINATED_NEW_SCOPE`).
    pub uncoordinated: Vec<ScopeFinding>,
    /// Elements whose baseline could not be chosen unambiguously.
    pub needs_review: Vec<ScopeFinding>,
}

pub struct CrossReferencer {
    store: Arc<dyn BaselineStore>,
    threshold: f32,
    retry: RetryPolicy,
}

impl CrossReferencer {
    pub fn new(store: Arc<dyn BaselineStore>, threshold: f32, retry: RetryPolicy) -> Self {
        Self {
            store,
            threshold,
            retry,
        }
    }

    /// Align every element against the project's baseline.
    ///
    /// Ambiguity is per element and lands in `needs_review`; only a store
    /// failure fails the whole pass. Transient failures restart the pass on
    /// a fresh reader with exponential backoff.
    pub fn cross_reference(
        &self,
        project_id: &str,
        elements: &[SpecificationElement],
    ) -> Result<CrossReferenceReport, CrossReferenceError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(project_id, elements) {
                Ok(report) => {
                    tracing::info!(
                        project_id,
                        aligned = report.aligned.len(),
                        uncoordinated = report.uncoordinated.len(),
                        needs_review = report.needs_review.len(),
                        "Cross-reference complete"
                    );
                    return Ok(report);
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_before(attempt);
                    tracing::warn!(
                        project_id,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Baseline store unavailable, retrying"
                    );
                    std::thread::sleep(delay);
                }
                Err(e) if e.is_transient() => {
                    return Err(CrossReferenceError::BaselineUnavailable {
                        attempts: attempt,
                        source: e,
                    })
                }
                Err(e) => return Err(CrossReferenceError::Store(e)),
            }
        }
    }

    fn attempt(
        &self,
        project_id: &str,
        elements: &[SpecificationElement],
    ) -> Result<CrossReferenceReport, BaselineStoreError> {
        let reader = self.store.reader()?;
        let mut report = CrossReferenceReport::default();

        for element in elements {
            let candidates = reader.lookup(project_id, &element.category, &element.location)?;
            match self.resolve(element, &candidates) {
                Ok(Some(pair)) => report.aligned.push(pair),
                Ok(None) => {
                    tracing::info!(
                        project_id,
                        category = %element.category,
                        location = %element.location,
                        "Uncoordinated new scope"
                    );
                    report
                        .uncoordinated
                        .push(ScopeFinding::uncoordinated(element.clone()));
                }
                Err(e) => {
                    tracing::warn!(
                        project_id,
                        category = %element.category,
                        location = %element.location,
                        error = %e,
                        "Element needs manual review"
                    );
                    report
                        .needs_review
                        .push(ScopeFinding::ambiguous(element.clone(), e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Choose the baseline for one element from its candidates.
    ///
    /// `Ok(None)` means nothing was close enough. Equally recent candidates
    /// yield `AmbiguousBaseline`.
    pub fn resolve(
        &self,
        element: &SpecificationElement,
        candidates: &[crate::models::BaselineRecord],
    ) -> Result<Option<AlignedPair>, CrossReferenceError> {
        match select_baseline(element, candidates, self.threshold) {
            Selection::Matched { record, similarity } => Ok(Some(AlignedPair {
                baseline: record.clone(),
                element: element.clone(),
                match_confidence: similarity,
                key: MatchKey {
                    category: element.category.clone(),
                    location_key: normalize_location(&element.location),
                },
            })),
            Selection::NoMatch => Ok(None),
            Selection::Ambiguous {
                approved_on,
                candidates,
            } => Err(CrossReferenceError::AmbiguousBaseline {
                category: element.category.clone(),
                location: element.location.clone(),
                approved_on,
                submittals: candidates.iter().map(|r| r.submittal_id.clone()).collect(),
            }),
        }
    }
}
