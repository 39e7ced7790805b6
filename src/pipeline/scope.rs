use std::collections::BTreeSet;

use crate::models::enums::Discipline;
use crate::models::SpecificationElement;
use crate::reference::ScopeKeywords;

/// Keeps the elements that belong to the elevator scope.
///
/// An element is in scope when its sheet discipline is admitted and any
/// keyword occurs, ignoring case, inside its category or its location label.
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    keywords: Vec<String>,
    /// `None` admits every discipline.
    disciplines: Option<BTreeSet<Discipline>>,
}

impl ScopeFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            disciplines: None,
        }
    }

    /// Restrict to sheets of these disciplines.
    pub fn with_disciplines<I>(mut self, disciplines: I) -> Self
    where
        I: IntoIterator<Item = Discipline>,
    {
        self.disciplines = Some(disciplines.into_iter().collect());
        self
    }

    pub fn from_table(table: &ScopeKeywords) -> Self {
        let filter = Self::new(&table.keywords);
        if table.disciplines.is_empty() {
            filter
        } else {
            filter.with_disciplines(table.disciplines.iter().copied())
        }
    }

    pub fn admits(&self, discipline: Discipline) -> bool {
        self.disciplines
            .as_ref()
            .map_or(true, |set| set.contains(&discipline))
    }

    fn keyword_match(&self, element: &SpecificationElement) -> bool {
        let category = element.category.to_lowercase();
        let location = element.location.to_lowercase();
        self.keywords
            .iter()
            .any(|k| category.contains(k.as_str()) || location.contains(k.as_str()))
    }

    pub fn matches(&self, element: &SpecificationElement) -> bool {
        self.admits(element.source.discipline) && self.keyword_match(element)
    }

    /// One membership test per element against the configured disciplines;
    /// order is preserved.
    pub fn apply(&self, elements: Vec<SpecificationElement>) -> Vec<SpecificationElement> {
        self.apply_with(elements, |d| self.admits(d))
    }

    /// Same single pass, with the caller's discipline-inclusion predicate in
    /// place of the configured set.
    pub fn apply_with<F>(
        &self,
        elements: Vec<SpecificationElement>,
        include: F,
    ) -> Vec<SpecificationElement>
    where
        F: Fn(Discipline) -> bool,
    {
        let before = elements.len();
        let kept: Vec<SpecificationElement> = elements
            .into_iter()
            .filter(|e| include(e.source.discipline) && self.keyword_match(e))
            .collect();
        tracing::debug!(before, kept = kept.len(), "Scope filter applied");
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttributeMap, SheetRef};

    fn element(category: &str, location: &str) -> SpecificationElement {
        element_on(Discipline::Electrical, category, location)
    }

    fn element_on(discipline: Discipline, category: &str, location: &str) -> SpecificationElement {
        SpecificationElement {
            category: category.into(),
            location: location.into(),
            attributes: AttributeMap::new(),
            source: SheetRef {
                sheet_code: "E-501".into(),
                discipline,
                page_index: 0,
                ordinal: 0,
                note: None,
            },
            confidence: 1.0,
        }
    }

    #[test]
    fn matches_location_substring_case_insensitive() {
        let filter = ScopeFilter::new(["Sump Pump", "Pit"]);
        assert!(filter.matches(&element("ELECTRICAL_SCOPE", "PIT 2 (SERVICE CAR)")));
        assert!(filter.matches(&element("ELECTRICAL_SCOPE", "Duplex sump pump")));
        assert!(!filter.matches(&element("ELECTRICAL_SCOPE", "Lobby 1")));
    }

    #[test]
    fn matches_category() {
        let filter = ScopeFilter::new(["elevator"]);
        assert!(filter.matches(&element("ELEVATOR_SCOPE", "Lobby 1")));
    }

    #[test]
    fn element_matching_several_keywords_kept_once() {
        let filter = ScopeFilter::new(["Pit", "Pit Lighting", "Lighting"]);
        let out = filter.apply(vec![
            element("ELECTRICAL_SCOPE", "Pit Lighting"),
            element("ELECTRICAL_SCOPE", "Lobby 1"),
            element("ELECTRICAL_SCOPE", "Pit 2"),
        ]);
        let locations: Vec<&str> = out.iter().map(|e| e.location.as_str()).collect();
        assert_eq!(locations, vec!["Pit Lighting", "Pit 2"]);
    }

    #[test]
    fn empty_result_is_valid() {
        let filter = ScopeFilter::new(["Hoistway"]);
        assert!(filter.apply(vec![element("PLUMBING_SCOPE", "Toilet 3")]).is_empty());
        assert!(ScopeFilter::new(Vec::<String>::new())
            .apply(vec![element("ELECTRICAL_SCOPE", "Pit 2")])
            .is_empty());
    }

    #[test]
    fn excluded_discipline_dropped_even_when_keyword_matches() {
        let filter = ScopeFilter::new(["Pit"])
            .with_disciplines([Discipline::Electrical, Discipline::Elevator]);
        let out = filter.apply(vec![
            element_on(Discipline::Architectural, "ELECTRICAL_SCOPE", "Pit 2"),
            element_on(Discipline::Electrical, "ELECTRICAL_SCOPE", "Pit 2"),
            element_on(Discipline::Elevator, "EQUIPMENT_SCOPE", "Pit 1"),
        ]);
        let kept: Vec<Discipline> = out.iter().map(|e| e.source.discipline).collect();
        assert_eq!(kept, vec![Discipline::Electrical, Discipline::Elevator]);
    }

    #[test]
    fn caller_predicate_replaces_configured_set() {
        let filter = ScopeFilter::new(["Pit"]).with_disciplines([Discipline::Electrical]);
        let out = filter.apply_with(
            vec![
                element_on(Discipline::Electrical, "ELECTRICAL_SCOPE", "Pit 2"),
                element_on(Discipline::Plumbing, "PLUMBING_SCOPE", "Sump Pit"),
            ],
            |d| d == Discipline::Plumbing,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source.discipline, Discipline::Plumbing);
    }

    #[test]
    fn table_without_disciplines_admits_all() {
        let table = ScopeKeywords {
            version: "test".into(),
            keywords: vec!["Pit".into()],
            disciplines: Vec::new(),
        };
        let filter = ScopeFilter::from_table(&table);
        assert!(filter.admits(Discipline::Other));
        assert!(filter.matches(&element_on(Discipline::Other, "ELECTRICAL_SCOPE", "Pit 2")));

        let tables = crate::reference::ReferenceTables::load_test();
        let configured = ScopeFilter::from_table(&tables.scope_keywords);
        assert!(!configured.admits(Discipline::Architectural));
    }
}
