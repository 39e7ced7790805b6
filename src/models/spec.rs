use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Discipline;

/// Attribute name -> normalized value. Ordered so that serialized output and
/// field-by-field comparison are deterministic.
pub type AttributeMap = BTreeMap<String, String>;

/// Where on the revision set a fact was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRef {
    pub sheet_code: String,
    /// Discipline of the sheet the fact was printed on.
    #[serde(default)]
    pub discipline: Discipline,
    /// Zero-based index of the page within its document.
    pub page_index: usize,
    /// Position of the element among those extracted from its page.
    #[serde(default)]
    pub ordinal: usize,
    /// Nearest preceding sheet note, e.g. "Note 4".
    #[serde(default)]
    pub note: Option<String>,
}

impl fmt::Display for SheetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.note {
            Some(note) => write!(f, "{}, {}", self.sheet_code, note),
            None => f.write_str(&self.sheet_code),
        }
    }
}

/// A normalized engineering fact extracted from one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationElement {
    pub category: String,
    pub location: String,
    pub attributes: AttributeMap,
    pub source: SheetRef,
    /// Extraction confidence in [0, 1].
    pub confidence: f32,
}

/// An approved specification from a prior submittal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub id: Uuid,
    pub project_id: String,
    pub submittal_id: String,
    pub approved_on: NaiveDate,
    pub category: String,
    pub location: String,
    pub attributes: AttributeMap,
    #[serde(default)]
    pub sheet_ref: Option<String>,
}

/// The key two records were aligned on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchKey {
    pub category: String,
    /// Normalized location label (see `pipeline::crossref::normalize_location`).
    pub location_key: String,
}

/// A baseline record matched to a freshly extracted element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedPair {
    pub baseline: BaselineRecord,
    pub element: SpecificationElement,
    /// Location similarity of the match, in [0, 1].
    pub match_confidence: f32,
    pub key: MatchKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_ref_display_with_note() {
        let sheet = SheetRef {
            sheet_code: "E-501".into(),
            discipline: Discipline::Electrical,
            page_index: 1,
            ordinal: 0,
            note: Some("Note 4".into()),
        };
        assert_eq!(sheet.to_string(), "E-501, Note 4");
    }

    #[test]
    fn sheet_ref_display_without_note() {
        let sheet = SheetRef {
            sheet_code: "A-101".into(),
            discipline: Discipline::Electrical,
            page_index: 0,
            ordinal: 0,
            note: None,
        };
        assert_eq!(sheet.to_string(), "A-101");
    }

    #[test]
    fn attribute_map_serializes_sorted() {
        let mut attrs = AttributeMap::new();
        attrs.insert("voltage".into(), "208V".into());
        attrs.insert("phase".into(), "3-Phase".into());
        let json = serde_json::to_string(&attrs).unwrap();
        assert_eq!(json, r#"{"phase":"3-Phase","voltage":"208V"}"#);
    }

    #[test]
    fn baseline_record_round_trips_json() {
        let json = r#"{
            "id": "6f1c2a3e-7a55-4d4e-9d7b-1b7f3cde0a11",
            "project_id": "P-001",
            "submittal_id": "Submittal #14",
            "approved_on": "2024-08-15",
            "category": "ELECTRICAL_SCOPE",
            "location": "Pit 2 (Service Car)",
            "attributes": {"voltage": "120V", "phase": "1-Phase", "frequency": "60Hz"}
        }"#;
        let record: BaselineRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.approved_on, NaiveDate::from_ymd_opt(2024, 8, 15).unwrap());
        assert_eq!(record.attributes.len(), 3);
        assert!(record.sheet_ref.is_none());
    }
}
