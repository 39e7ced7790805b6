use crate::models::{AttributeMap, Page, SheetRef, SpecificationElement};
use crate::reference::Vocabulary;

use super::confidence::element_confidence;

/// Location label for facts that appear before any marker on their page.
pub const UNLOCATED: &str = "(unlocated)";

struct PendingElement {
    category: String,
    location: String,
    note: Option<String>,
    attributes: AttributeMap,
    ambiguous: u32,
}

/// Walks one page's tokens in reading order.
///
/// A location marker sets the location for every fact after it on this page
/// only. Consecutive facts of one category under one marker form a single
/// element; a new marker, a new note or a category change closes it.
/// Every element carries the page's discipline and its position on the page.
pub fn extract_page(
    page_index: usize,
    page: &Page,
    vocabulary: &Vocabulary,
) -> Vec<SpecificationElement> {
    let penalty = vocabulary.ambiguity_penalty();
    let mut elements = Vec::new();
    let mut location: Option<String> = None;
    let mut note: Option<String> = None;
    let mut pending: Option<PendingElement> = None;

    let close = |pending: &mut Option<PendingElement>, out: &mut Vec<SpecificationElement>| {
        if let Some(p) = pending.take() {
            let ordinal = out.len();
            out.push(SpecificationElement {
                category: p.category,
                location: p.location,
                attributes: p.attributes,
                source: SheetRef {
                    sheet_code: page.sheet_code.clone(),
                    discipline: page.discipline,
                    page_index,
                    ordinal,
                    note: p.note,
                },
                confidence: element_confidence(p.ambiguous, penalty),
            });
        }
    };

    for token in &page.tokens {
        if let Some(label) = vocabulary.location_marker(&token.text) {
            close(&mut pending, &mut elements);
            location = Some(label);
            continue;
        }
        if let Some(label) = vocabulary.note_marker(&token.text) {
            close(&mut pending, &mut elements);
            note = Some(label);
        }

        let scan = vocabulary.scan(&token.text);
        let mut unassigned_ambiguity = scan.ambiguous;
        for m in scan.matches {
            if pending.as_ref().is_some_and(|p| p.category != m.category) {
                close(&mut pending, &mut elements);
            }
            let current = pending.get_or_insert_with(|| PendingElement {
                category: m.category.to_string(),
                location: location.clone().unwrap_or_else(|| UNLOCATED.to_string()),
                note: note.clone(),
                attributes: AttributeMap::new(),
                ambiguous: 0,
            });
            current.ambiguous += std::mem::take(&mut unassigned_ambiguity);

            match current.attributes.get(m.attribute) {
                Some(existing) if *existing != m.value => {
                    tracing::debug!(
                        sheet = %page.sheet_code,
                        attribute = m.attribute,
                        kept = %existing,
                        ignored = %m.value,
                        "Conflicting read within one element"
                    );
                    current.ambiguous += 1;
                }
                Some(_) => {}
                None => {
                    current
                        .attributes
                        .insert(m.attribute.to_string(), m.value);
                }
            }
        }
    }

    close(&mut pending, &mut elements);
    elements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Discipline;
    use crate::reference::ReferenceTables;

    fn vocabulary() -> Vocabulary {
        ReferenceTables::load_test().vocabulary
    }

    fn page(tokens: &[&str]) -> Page {
        Page::new("E-501", Discipline::Electrical).with_tokens(tokens.iter().copied())
    }

    #[test]
    fn facts_take_preceding_marker() {
        let v = vocabulary();
        let elements = extract_page(0, &page(&["Pit 2 (Service Car)", "208V", "3-Phase"]), &v);

        assert_eq!(elements.len(), 1);
        let e = &elements[0];
        assert_eq!(e.category, "ELECTRICAL_SCOPE");
        assert_eq!(e.location, "Pit 2 (Service Car)");
        assert_eq!(e.attributes.get("voltage").map(String::as_str), Some("208V"));
        assert_eq!(e.attributes.get("phase").map(String::as_str), Some("3-Phase"));
        assert_eq!(e.source.sheet_code, "E-501");
        assert_eq!(e.confidence, 1.0);
    }

    #[test]
    fn new_marker_starts_new_element() {
        let v = vocabulary();
        let elements = extract_page(
            0,
            &page(&["Pit 1", "120V", "Pit 2", "208V", "unrelated text"]),
            &v,
        );
        let summary: Vec<(&str, &str)> = elements
            .iter()
            .map(|e| (e.location.as_str(), e.attributes["voltage"].as_str()))
            .collect();
        assert_eq!(summary, vec![("Pit 1", "120V"), ("Pit 2", "208V")]);
    }

    #[test]
    fn facts_before_any_marker_are_unlocated() {
        let v = vocabulary();
        let elements = extract_page(0, &page(&["208V", "Pit 2"]), &v);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].location, UNLOCATED);
    }

    #[test]
    fn unrecognized_tokens_are_ignored() {
        let v = vocabulary();
        assert!(extract_page(0, &page(&["GENERAL NOTES", "See detail 3/E-601"]), &v).is_empty());
    }

    #[test]
    fn note_marker_attaches_to_sheet_ref() {
        let v = vocabulary();
        let elements = extract_page(
            0,
            &page(&["Pit 2 (Service Car)", "Note 4: Provide 208V/3-Phase feeder"]),
            &v,
        );
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].source.to_string(), "E-501, Note 4");
        assert_eq!(elements[0].attributes.len(), 2);
    }

    #[test]
    fn repeated_attribute_lowers_confidence() {
        let v = vocabulary();
        let elements = extract_page(0, &page(&["Pit 2", "208V", "120V"]), &v);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].attributes["voltage"], "208V");
        assert!((elements[0].confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn repeated_identical_value_is_not_ambiguous() {
        let v = vocabulary();
        let elements = extract_page(0, &page(&["Pit 2", "208V", "208 V"]), &v);
        assert_eq!(elements[0].confidence, 1.0);
    }

    #[test]
    fn elements_carry_discipline_and_page_position() {
        let v = vocabulary();
        let p = Page::new("VT-201", Discipline::Elevator)
            .with_tokens(["Pit 2", "208V", "Machine Room", "480V"]);
        let elements = extract_page(3, &p, &v);

        let positions: Vec<(usize, usize)> = elements
            .iter()
            .map(|e| (e.source.page_index, e.source.ordinal))
            .collect();
        assert_eq!(positions, vec![(3, 0), (3, 1)]);
        assert!(elements
            .iter()
            .all(|e| e.source.discipline == Discipline::Elevator));
    }
}
