use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Severity;
use super::money::Money;
use super::spec::AttributeMap;

/// A bulletin value that contradicts an approved submittal.
///
/// Field names are the contract consumed by the display layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: Uuid,
    pub document_id: Uuid,
    pub severity: Severity,
    pub category: String,
    pub location: String,
    pub old_spec: AttributeMap,
    pub new_spec: AttributeMap,
    /// Shared attributes whose normalized values differ, in name order.
    pub differing_attributes: Vec<String>,
    /// The differing attribute carrying the highest severity weight.
    pub primary_attribute: String,
    pub sheet_ref: String,
    pub cost_impact: Money,
    #[serde(default)]
    pub cost_breakdown: Vec<CostLineItem>,
    pub reasoning: String,
    pub baseline: BaselineRef,
    pub match_confidence: f32,
}

impl Conflict {
    /// Banner text, e.g. "VOLTAGE MISMATCH".
    pub fn headline(&self) -> String {
        format!(
            "{} MISMATCH",
            self.primary_attribute.replace('_', " ").to_uppercase()
        )
    }

    /// Value pairs for each differing attribute: (name, old, new).
    pub fn differences(&self) -> Vec<(&str, &str, &str)> {
        self.differing_attributes
            .iter()
            .filter_map(|name| {
                let old = self.old_spec.get(name)?;
                let new = self.new_spec.get(name)?;
                Some((name.as_str(), old.as_str(), new.as_str()))
            })
            .collect()
    }
}

/// The approved submittal a conflict was measured against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineRef {
    pub submittal_id: String,
    pub approved_on: NaiveDate,
}

/// One component of a conflict's estimated cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLineItem {
    pub description: String,
    pub amount: Money,
    /// The changed attribute this line prices; `None` for fixed overhead.
    #[serde(default)]
    pub attribute: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Conflict {
        let mut old_spec = AttributeMap::new();
        old_spec.insert("voltage".into(), "120V".into());
        old_spec.insert("phase".into(), "1-Phase".into());
        let mut new_spec = AttributeMap::new();
        new_spec.insert("voltage".into(), "208V".into());
        new_spec.insert("phase".into(), "3-Phase".into());

        Conflict {
            id: Uuid::nil(),
            document_id: Uuid::nil(),
            severity: Severity::Critical,
            category: "ELECTRICAL_SCOPE".into(),
            location: "Pit 2 (Service Car)".into(),
            old_spec,
            new_spec,
            differing_attributes: vec!["phase".into(), "voltage".into()],
            primary_attribute: "voltage".into(),
            sheet_ref: "E-501, Note 4".into(),
            cost_impact: Money::ZERO,
            cost_breakdown: vec![],
            reasoning: String::new(),
            baseline: BaselineRef {
                submittal_id: "Submittal #14".into(),
                approved_on: NaiveDate::from_ymd_opt(2024, 8, 15).unwrap(),
            },
            match_confidence: 1.0,
        }
    }

    #[test]
    fn headline_from_primary_attribute() {
        assert_eq!(sample().headline(), "VOLTAGE MISMATCH");
        let mut c = sample();
        c.primary_attribute = "pit_depth".into();
        assert_eq!(c.headline(), "PIT DEPTH MISMATCH");
    }

    #[test]
    fn differences_pairs_values() {
        let c = sample();
        assert_eq!(
            c.differences(),
            vec![("phase", "1-Phase", "3-Phase"), ("voltage", "120V", "208V")]
        );
    }

    #[test]
    fn serializes_contract_fields() {
        let value = serde_json::to_value(sample()).unwrap();
        for field in [
            "severity",
            "category",
            "location",
            "old_spec",
            "new_spec",
            "cost_impact",
            "sheet_ref",
        ] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert_eq!(value["severity"], "CRITICAL");
    }
}
