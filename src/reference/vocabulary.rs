use std::collections::BTreeSet;
use std::ops::Range;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::ReferenceError;
use crate::models::AttributeMap;

const TABLE: &str = "vocabulary.json";

fn default_ambiguity_penalty() -> f32 {
    0.2
}

/// Serialized form of the attribute vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyTable {
    pub version: String,
    /// Confidence multiplier lost per ambiguous read: `(1 - p)^n`.
    #[serde(default = "default_ambiguity_penalty")]
    pub ambiguity_penalty: f32,
    pub attributes: Vec<AttributePattern>,
    /// Whole-token patterns; capture group 1 is the location label.
    pub location_markers: Vec<String>,
    /// Token-prefix patterns; capture group 1 is the note label.
    #[serde(default)]
    pub note_markers: Vec<String>,
}

/// One way of writing one attribute.
///
/// `normalized` is a regex replacement template (`${1}V`), so `$1V` would
/// refer to a group named `1V`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributePattern {
    pub attribute: String,
    pub category: String,
    pub pattern: String,
    pub normalized: String,
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    attribute: String,
    category: String,
    regex: Regex,
    normalized: String,
}

/// A normalized attribute value found in a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMatch<'v> {
    pub attribute: &'v str,
    pub category: &'v str,
    pub value: String,
    pub span: Range<usize>,
}

/// Result of scanning one token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenScan<'v> {
    /// Accepted matches in reading order.
    pub matches: Vec<AttributeMatch<'v>>,
    /// Spans claimed by two different attributes.
    pub ambiguous: u32,
}

/// Compiled vocabulary. Pattern order is significant: earlier patterns win
/// overlapping spans, and attribute display order follows first appearance.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    version: String,
    ambiguity_penalty: f32,
    patterns: Vec<CompiledPattern>,
    location_markers: Vec<Regex>,
    note_markers: Vec<Regex>,
}

fn compile(pattern: &str) -> Result<Regex, ReferenceError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ReferenceError::InvalidPattern {
            table: TABLE.into(),
            pattern: pattern.into(),
            reason: e.to_string(),
        })
}

fn invalid(reason: impl Into<String>) -> ReferenceError {
    ReferenceError::Invalid {
        table: TABLE.into(),
        reason: reason.into(),
    }
}

impl Vocabulary {
    pub fn compile(table: VocabularyTable) -> Result<Self, ReferenceError> {
        if !(0.0..1.0).contains(&table.ambiguity_penalty) {
            return Err(invalid(format!(
                "ambiguity_penalty {} outside [0, 1)",
                table.ambiguity_penalty
            )));
        }
        if table.attributes.is_empty() {
            return Err(invalid("no attribute patterns"));
        }
        if table.location_markers.is_empty() {
            return Err(invalid("no location markers"));
        }

        let mut patterns = Vec::with_capacity(table.attributes.len());
        for def in table.attributes {
            if def.attribute.trim().is_empty() || def.category.trim().is_empty() {
                return Err(invalid(format!(
                    "pattern '{}' needs an attribute and a category",
                    def.pattern
                )));
            }
            if def.normalized.trim().is_empty() {
                return Err(invalid(format!(
                    "pattern '{}' has an empty normalized template",
                    def.pattern
                )));
            }
            patterns.push(CompiledPattern {
                regex: compile(&def.pattern)?,
                attribute: def.attribute,
                category: def.category,
                normalized: def.normalized,
            });
        }

        let location_markers = table
            .location_markers
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;
        let note_markers = table
            .note_markers
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            version: table.version,
            ambiguity_penalty: table.ambiguity_penalty,
            patterns,
            location_markers,
            note_markers,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn ambiguity_penalty(&self) -> f32 {
        self.ambiguity_penalty
    }

    /// All categories the vocabulary can emit.
    pub fn categories(&self) -> BTreeSet<&str> {
        self.patterns.iter().map(|p| p.category.as_str()).collect()
    }

    /// Attribute names in declaration order, without repeats.
    pub fn attribute_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = Vec::new();
        for p in &self.patterns {
            if !order.contains(&p.attribute.as_str()) {
                order.push(&p.attribute);
            }
        }
        order
    }

    /// Find every attribute value in a token.
    pub fn scan(&self, text: &str) -> TokenScan<'_> {
        let mut scan = TokenScan::default();
        let mut claimed: Vec<(Range<usize>, &str)> = Vec::new();

        for pattern in &self.patterns {
            for caps in pattern.regex.captures_iter(text) {
                let Some(whole) = caps.get(0) else { continue };
                let span = whole.range();
                if whole.is_empty() {
                    continue;
                }

                let overlap = claimed
                    .iter()
                    .find(|(r, _)| r.start < span.end && span.start < r.end);
                if let Some((_, owner)) = overlap {
                    if *owner != pattern.attribute {
                        scan.ambiguous += 1;
                    }
                    continue;
                }

                let mut value = String::new();
                caps.expand(&pattern.normalized, &mut value);
                claimed.push((span.clone(), &pattern.attribute));
                scan.matches.push(AttributeMatch {
                    attribute: &pattern.attribute,
                    category: &pattern.category,
                    value,
                    span,
                });
            }
        }

        scan.matches.sort_by_key(|m| m.span.start);
        scan
    }

    /// Location label if the whole token is a location marker.
    pub fn location_marker(&self, text: &str) -> Option<String> {
        first_capture(&self.location_markers, text.trim())
    }

    /// Note label if the token starts with a sheet note marker.
    pub fn note_marker(&self, text: &str) -> Option<String> {
        first_capture(&self.note_markers, text.trim())
    }

    /// Canonical spelling of a value, used to compare two records.
    ///
    /// Values the vocabulary recognizes are rewritten through their
    /// template; anything else is compared with whitespace collapsed.
    pub fn canonical_value(&self, attribute: &str, raw: &str) -> String {
        for pattern in self.patterns.iter().filter(|p| p.attribute == attribute) {
            if let Some(caps) = pattern.regex.captures(raw) {
                let mut value = String::new();
                caps.expand(&pattern.normalized, &mut value);
                return value;
            }
        }
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Whether two raw values mean the same thing for `attribute`.
    pub fn values_equal(&self, attribute: &str, a: &str, b: &str) -> bool {
        self.canonical_value(attribute, a)
            .eq_ignore_ascii_case(&self.canonical_value(attribute, b))
    }

    /// One-line summary such as "120V / 1-Phase / 60Hz".
    ///
    /// Known attributes come in vocabulary order, unknown ones after them in
    /// name order.
    pub fn format_summary(&self, attributes: &AttributeMap) -> String {
        let order = self.attribute_order();
        let mut parts: Vec<&str> = order
            .iter()
            .filter_map(|name| attributes.get(*name).map(String::as_str))
            .collect();
        parts.extend(
            attributes
                .iter()
                .filter(|(name, _)| !order.contains(&name.as_str()))
                .map(|(_, value)| value.as_str()),
        );
        parts.join(" / ")
    }
}

fn first_capture(regexes: &[Regex], text: &str) -> Option<String> {
    regexes.iter().find_map(|re| {
        let caps = re.captures(text)?;
        let label = caps.get(1).or_else(|| caps.get(0))?;
        Some(label.as_str().trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceTables;

    fn vocabulary() -> Vocabulary {
        ReferenceTables::bundled().unwrap().vocabulary
    }

    #[test]
    fn scan_reads_voltage_and_phase() {
        let v = vocabulary();
        let scan = v.scan("Provide 208V/3-Phase feeder");
        let found: Vec<(&str, &str)> = scan
            .matches
            .iter()
            .map(|m| (m.attribute, m.value.as_str()))
            .collect();
        assert_eq!(found, vec![("voltage", "208V"), ("phase", "3-Phase")]);
        assert_eq!(scan.ambiguous, 0);
    }

    #[test]
    fn scan_normalizes_spellings() {
        let v = vocabulary();
        let scan = v.scan("120 VOLTS single phase 60 hz");
        let values: Vec<&str> = scan.matches.iter().map(|m| m.value.as_str()).collect();
        assert_eq!(values, vec!["120V", "1-Phase", "60Hz"]);
    }

    #[test]
    fn overlapping_patterns_count_as_ambiguous() {
        let table = VocabularyTable {
            version: "t".into(),
            ambiguity_penalty: 0.2,
            attributes: vec![
                AttributePattern {
                    attribute: "voltage".into(),
                    category: "ELECTRICAL_SCOPE".into(),
                    pattern: r"\b(\d{3})\s*V\b".into(),
                    normalized: "${1}V".into(),
                },
                AttributePattern {
                    attribute: "rating".into(),
                    category: "ELECTRICAL_SCOPE".into(),
                    pattern: r"\b(\d{3})".into(),
                    normalized: "${1}".into(),
                },
            ],
            location_markers: vec![r"^(Pit\s+\d+)$".into()],
            note_markers: vec![],
        };
        let v = Vocabulary::compile(table).unwrap();
        let scan = v.scan("208V");
        assert_eq!(scan.matches.len(), 1);
        assert_eq!(scan.matches[0].attribute, "voltage");
        assert_eq!(scan.ambiguous, 1);
    }

    #[test]
    fn location_marker_must_be_whole_token() {
        let v = vocabulary();
        assert_eq!(
            v.location_marker("Pit 2 (Service Car)").as_deref(),
            Some("Pit 2 (Service Car)")
        );
        assert_eq!(v.location_marker("Machine Room:").as_deref(), Some("Machine Room"));
        assert_eq!(v.location_marker("Pit 2 gets a 208V feeder"), None);
        assert_eq!(v.location_marker("Pit Lighting"), None);
    }

    #[test]
    fn note_marker_is_prefix() {
        let v = vocabulary();
        assert_eq!(
            v.note_marker("Note 4: Provide 208V/3-Phase").as_deref(),
            Some("Note 4")
        );
        assert_eq!(v.note_marker("See Note 4"), None);
    }

    #[test]
    fn values_equal_across_spellings() {
        let v = vocabulary();
        assert!(v.values_equal("voltage", "120 V", "120V"));
        assert!(v.values_equal("phase", "single phase", "1-Phase"));
        assert!(!v.values_equal("voltage", "120V", "208V"));
        assert!(v.values_equal("finish", "Brushed  Steel", "brushed steel"));
    }

    #[test]
    fn summary_follows_vocabulary_order() {
        let v = vocabulary();
        let mut attrs = AttributeMap::new();
        attrs.insert("frequency".into(), "60Hz".into());
        attrs.insert("phase".into(), "1-Phase".into());
        attrs.insert("voltage".into(), "120V".into());
        attrs.insert("finish".into(), "Galvanized".into());
        assert_eq!(v.format_summary(&attrs), "120V / 1-Phase / 60Hz / Galvanized");
    }

    #[test]
    fn invalid_regex_rejected() {
        let table = VocabularyTable {
            version: "t".into(),
            ambiguity_penalty: 0.2,
            attributes: vec![AttributePattern {
                attribute: "voltage".into(),
                category: "ELECTRICAL_SCOPE".into(),
                pattern: r"(\d{3}".into(),
                normalized: "${1}V".into(),
            }],
            location_markers: vec![r"^(Pit\s+\d+)$".into()],
            note_markers: vec![],
        };
        assert!(matches!(
            Vocabulary::compile(table),
            Err(ReferenceError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn penalty_out_of_range_rejected() {
        let table = VocabularyTable {
            version: "t".into(),
            ambiguity_penalty: 1.0,
            attributes: vec![],
            location_markers: vec![],
            note_markers: vec![],
        };
        assert!(matches!(
            Vocabulary::compile(table),
            Err(ReferenceError::Invalid { .. })
        ));
    }
}
