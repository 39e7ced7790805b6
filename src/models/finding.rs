use serde::{Deserialize, Serialize};

use super::enums::FindingKind;
use super::spec::SpecificationElement;

/// An element the cross-referencer could not turn into an aligned pair.
///
/// Findings are informational: they never produce a conflict or a cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeFinding {
    pub kind: FindingKind,
    pub element: SpecificationElement,
    pub detail: String,
}

impl ScopeFinding {
    pub fn uncoordinated(element: SpecificationElement) -> Self {
        let detail = format!(
            "No approved submittal covers {} at {}",
            element.category, element.location
        );
        Self {
            kind: FindingKind::UncoordinatedNewScope,
            element,
            detail,
        }
    }

    pub fn ambiguous(element: SpecificationElement, detail: impl Into<String>) -> Self {
        Self {
            kind: FindingKind::AmbiguousBaseline,
            element,
            detail: detail.into(),
        }
    }
}
