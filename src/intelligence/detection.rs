use std::sync::Arc;

use uuid::Uuid;

use crate::models::enums::Severity;
use crate::models::{AlignedPair, BaselineRef, Conflict, Money};
use crate::reference::ReferenceTables;

use super::messages::MessageTemplates;

/// Compares aligned pairs field by field.
///
/// Severity is the highest configured weight among the differing
/// attributes. Attributes present on only one side are evolution, not
/// conflict, and are only logged.
pub struct ConflictClassifier {
    tables: Arc<ReferenceTables>,
}

impl ConflictClassifier {
    pub fn new(tables: Arc<ReferenceTables>) -> Self {
        Self { tables }
    }

    /// One conflict per pair with at least one differing shared attribute,
    /// in pair order.
    pub fn classify(&self, document_id: &Uuid, pairs: &[AlignedPair]) -> Vec<Conflict> {
        let conflicts: Vec<Conflict> = pairs
            .iter()
            .filter_map(|pair| self.classify_pair(document_id, pair))
            .collect();
        tracing::info!(
            document_id = %document_id,
            pairs = pairs.len(),
            conflicts = conflicts.len(),
            "Classification complete"
        );
        conflicts
    }

    /// Shared attributes whose normalized values differ, in name order.
    pub fn differing_attributes(&self, pair: &AlignedPair) -> Vec<String> {
        let vocabulary = &self.tables.vocabulary;
        let old_spec = &pair.baseline.attributes;
        let new_spec = &pair.element.attributes;

        old_spec
            .iter()
            .filter_map(|(name, old)| {
                let new = new_spec.get(name)?;
                (!vocabulary.values_equal(name, old, new)).then(|| name.clone())
            })
            .collect()
    }

    /// Highest weight among `attributes`; `None` when empty.
    pub fn severity_of(&self, attributes: &[String]) -> Option<Severity> {
        attributes
            .iter()
            .map(|a| self.tables.severity_weights.weight(a))
            .max()
    }

    /// Highest-weighted attribute. Equal weights resolve to the attribute
    /// declared first in the vocabulary, then by name.
    fn primary_attribute<'a>(&self, attributes: &'a [String]) -> Option<&'a String> {
        let weights = &self.tables.severity_weights;
        let order = self.tables.vocabulary.attribute_order();
        let position = |name: &str| order.iter().position(|a| *a == name).unwrap_or(usize::MAX);
        attributes.iter().max_by(|a, b| {
            weights
                .weight(a)
                .cmp(&weights.weight(b))
                .then_with(|| position(b.as_str()).cmp(&position(a.as_str())))
                .then_with(|| b.cmp(a))
        })
    }

    fn classify_pair(&self, document_id: &Uuid, pair: &AlignedPair) -> Option<Conflict> {
        self.log_evolution(document_id, pair);

        let differing = self.differing_attributes(pair);
        let severity = self.severity_of(&differing)?;
        let primary = self.primary_attribute(&differing)?.clone();

        let element = &pair.element;
        let baseline = &pair.baseline;
        let sheet_ref = element.source.to_string();

        let differences: Vec<(&str, &str, &str)> = differing
            .iter()
            .filter_map(|name| {
                Some((
                    name.as_str(),
                    baseline.attributes.get(name)?.as_str(),
                    element.attributes.get(name)?.as_str(),
                ))
            })
            .collect();
        let reasoning = MessageTemplates::reasoning(
            &sheet_ref,
            &baseline.submittal_id,
            baseline.approved_on,
            &differences,
        );

        let id = conflict_id(document_id, pair, &differing);
        tracing::info!(
            document_id = %document_id,
            conflict_id = %id,
            severity = severity.as_str(),
            location = %element.location,
            differing = ?differing,
            "Conflict detected"
        );

        Some(Conflict {
            id,
            document_id: *document_id,
            severity,
            category: element.category.clone(),
            location: element.location.clone(),
            old_spec: baseline.attributes.clone(),
            new_spec: element.attributes.clone(),
            differing_attributes: differing,
            primary_attribute: primary,
            sheet_ref,
            cost_impact: Money::ZERO,
            cost_breakdown: Vec::new(),
            reasoning,
            baseline: BaselineRef {
                submittal_id: baseline.submittal_id.clone(),
                approved_on: baseline.approved_on,
            },
            match_confidence: pair.match_confidence,
        })
    }

    fn log_evolution(&self, document_id: &Uuid, pair: &AlignedPair) {
        let old_spec = &pair.baseline.attributes;
        let new_spec = &pair.element.attributes;
        for name in old_spec.keys().filter(|k| !new_spec.contains_key(*k)) {
            tracing::info!(
                document_id = %document_id,
                location = %pair.element.location,
                attribute = %name,
                "Attribute only in baseline, not a conflict"
            );
        }
        for name in new_spec.keys().filter(|k| !old_spec.contains_key(*k)) {
            tracing::info!(
                document_id = %document_id,
                location = %pair.element.location,
                attribute = %name,
                "Attribute only in revision, not a conflict"
            );
        }
    }
}

/// Stable across runs. Page position and the matched baseline record keep
/// ids unique within a document.
fn conflict_id(document_id: &Uuid, pair: &AlignedPair, differing: &[String]) -> Uuid {
    let element = &pair.element;
    let name = format!(
        "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
        element.category,
        element.location,
        element.source.sheet_code,
        element.source.page_index,
        element.source.ordinal,
        pair.baseline.id,
        differing.join(",")
    );
    Uuid::new_v5(document_id, name.as_bytes())
}
