use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::models::{BaselineRecord, SpecificationElement};

/// Lowercase, punctuation to spaces, whitespace collapsed.
///
/// "Pit 2 (Service Car)" and "PIT 2 - SERVICE CAR" both become
/// "pit 2 service car".
pub fn normalize_location(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Dice coefficient over the word sets of two normalized labels.
pub fn location_similarity(a: &str, b: &str) -> f32 {
    let a = normalize_location(a);
    let b = normalize_location(b);
    if a == b {
        return 1.0;
    }
    let left: BTreeSet<&str> = a.split(' ').filter(|w| !w.is_empty()).collect();
    let right: BTreeSet<&str> = b.split(' ').filter(|w| !w.is_empty()).collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    (2 * shared) as f32 / (left.len() + right.len()) as f32
}

/// Outcome of picking one baseline record for an element.
#[derive(Debug, PartialEq)]
pub enum Selection<'a> {
    Matched {
        record: &'a BaselineRecord,
        similarity: f32,
    },
    NoMatch,
    /// Several equally good candidates approved on the same, latest date.
    Ambiguous {
        approved_on: NaiveDate,
        candidates: Vec<&'a BaselineRecord>,
    },
}

/// Pick the best candidate for `element`.
///
/// Candidates must share the element's category and reach `threshold`
/// location similarity. Of the most similar, the latest approval wins; a
/// tie on that date is reported rather than broken.
pub fn select_baseline<'a>(
    element: &SpecificationElement,
    candidates: &'a [BaselineRecord],
    threshold: f32,
) -> Selection<'a> {
    let scored: Vec<(&BaselineRecord, f32)> = candidates
        .iter()
        .filter(|r| r.category == element.category)
        .map(|r| (r, location_similarity(&element.location, &r.location)))
        .filter(|(_, s)| *s >= threshold)
        .collect();

    let Some(best) = scored.iter().map(|(_, s)| *s).reduce(f32::max) else {
        return Selection::NoMatch;
    };
    let closest: Vec<&BaselineRecord> = scored
        .iter()
        .filter(|(_, s)| *s == best)
        .map(|(r, _)| *r)
        .collect();

    let Some(latest) = closest.iter().map(|r| r.approved_on).max() else {
        return Selection::NoMatch;
    };
    let mut newest: Vec<&BaselineRecord> = closest
        .into_iter()
        .filter(|r| r.approved_on == latest)
        .collect();

    if newest.len() > 1 {
        newest.sort_by(|a, b| a.submittal_id.cmp(&b.submittal_id).then(a.id.cmp(&b.id)));
        return Selection::Ambiguous {
            approved_on: latest,
            candidates: newest,
        };
    }
    match newest.pop() {
        Some(record) => Selection::Matched {
            record,
            similarity: best,
        },
        None => Selection::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Discipline;
    use crate::models::{AttributeMap, SheetRef};
    use uuid::Uuid;

    fn element(location: &str) -> SpecificationElement {
        SpecificationElement {
            category: "ELECTRICAL_SCOPE".into(),
            location: location.into(),
            attributes: AttributeMap::new(),
            source: SheetRef {
                sheet_code: "E-501".into(),
                discipline: Discipline::Electrical,
                page_index: 0,
                ordinal: 0,
                note: None,
            },
            confidence: 1.0,
        }
    }

    fn record(submittal: &str, location: &str, date: (i32, u32, u32)) -> BaselineRecord {
        BaselineRecord {
            id: Uuid::new_v4(),
            project_id: "P-001".into(),
            submittal_id: submittal.into(),
            approved_on: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            category: "ELECTRICAL_SCOPE".into(),
            location: location.into(),
            attributes: AttributeMap::new(),
            sheet_ref: None,
        }
    }

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize_location("Pit 2 (Service Car)"), "pit 2 service car");
        assert_eq!(normalize_location("  PIT 2 - SERVICE   CAR "), "pit 2 service car");
        assert_eq!(normalize_location("---"), "");
    }

    #[test]
    fn similarity_bounds() {
        assert_eq!(location_similarity("Pit 2", "PIT-2"), 1.0);
        assert_eq!(location_similarity("Pit 2", "Machine Room"), 0.0);
        assert_eq!(location_similarity("Pit 2", "Pit 3"), 0.5);
        assert_eq!(location_similarity("", "Pit 3"), 0.0);
    }

    #[test]
    fn latest_approval_wins() {
        let candidates = vec![
            record("Submittal #9", "Pit 2 (Service Car)", (2024, 3, 1)),
            record("Submittal #14", "PIT 2 - SERVICE CAR", (2024, 8, 15)),
        ];
        match select_baseline(&element("Pit 2 (Service Car)"), &candidates, 0.8) {
            Selection::Matched { record, similarity } => {
                assert_eq!(record.submittal_id, "Submittal #14");
                assert_eq!(similarity, 1.0);
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn closer_location_beats_newer_approval() {
        let candidates = vec![
            record("Submittal #14", "Pit 2 (Service Car)", (2024, 3, 1)),
            record("Submittal #20", "Pit 2 Service Car Sump", (2025, 1, 10)),
        ];
        match select_baseline(&element("Pit 2 (Service Car)"), &candidates, 0.8) {
            Selection::Matched { record, .. } => assert_eq!(record.submittal_id, "Submittal #14"),
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn below_threshold_is_no_match() {
        let candidates = vec![record("Submittal #14", "Pit 3", (2024, 8, 15))];
        assert_eq!(
            select_baseline(&element("Pit 2"), &candidates, 0.8),
            Selection::NoMatch
        );
        assert_eq!(select_baseline(&element("Pit 2"), &[], 0.8), Selection::NoMatch);
    }

    #[test]
    fn same_date_tie_is_ambiguous() {
        let candidates = vec![
            record("Submittal #15", "Pit 2", (2024, 8, 15)),
            record("Submittal #14", "PIT 2", (2024, 8, 15)),
            record("Submittal #9", "Pit 2", (2024, 1, 2)),
        ];
        match select_baseline(&element("Pit 2"), &candidates, 0.8) {
            Selection::Ambiguous {
                approved_on,
                candidates,
            } => {
                assert_eq!(approved_on, NaiveDate::from_ymd_opt(2024, 8, 15).unwrap());
                let ids: Vec<&str> = candidates.iter().map(|r| r.submittal_id.as_str()).collect();
                assert_eq!(ids, vec!["Submittal #14", "Submittal #15"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn other_category_never_matches() {
        let mut rec = record("Submittal #14", "Pit 2", (2024, 8, 15));
        rec.category = "MECHANICAL_SCOPE".into();
        assert_eq!(
            select_baseline(&element("Pit 2"), &[rec], 0.8),
            Selection::NoMatch
        );
    }
}
