//! Versionable reference tables: attribute vocabulary, scope keywords,
//! severity weights, cost rules and pipeline tunables.
//!
//! Tables are plain JSON so they can be revised without a rebuild. A copy
//! of each ships inside the binary (`bundled`).

pub mod tables;
pub mod vocabulary;

use std::path::Path;

use serde::de::DeserializeOwned;
use thiserror::Error;

pub use tables::{
    CostRule, CostRuleTable, OverheadItem, PipelineSettings, ScopeKeywords, SeverityWeights,
};
pub use vocabulary::{AttributeMatch, AttributePattern, TokenScan, Vocabulary, VocabularyTable};

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Failed to load reference table {0}: {1}")]
    Load(String, String),

    #[error("Failed to parse reference table {0}: {1}")]
    Parse(String, String),

    #[error("Invalid pattern in {table} ({pattern}): {reason}")]
    InvalidPattern {
        table: String,
        pattern: String,
        reason: String,
    },

    #[error("Invalid reference table {table}: {reason}")]
    Invalid { table: String, reason: String },
}

/// Everything the pipeline stages read but never write.
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    pub vocabulary: Vocabulary,
    pub scope_keywords: ScopeKeywords,
    pub severity_weights: SeverityWeights,
    pub cost_rules: CostRuleTable,
    pub settings: PipelineSettings,
}

const VOCABULARY: &str = "vocabulary.json";
const SCOPE_KEYWORDS: &str = "scope_keywords.json";
const SEVERITY_WEIGHTS: &str = "severity_weights.json";
const COST_RULES: &str = "cost_rules.json";
const PIPELINE: &str = "pipeline.json";

fn read_table<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T, ReferenceError> {
    let path = dir.join(name);
    let json = std::fs::read_to_string(&path)
        .map_err(|e| ReferenceError::Load(path.display().to_string(), e.to_string()))?;
    parse_table(name, &json)
}

fn parse_table<T: DeserializeOwned>(name: &str, json: &str) -> Result<T, ReferenceError> {
    serde_json::from_str(json).map_err(|e| ReferenceError::Parse(name.into(), e.to_string()))
}

impl ReferenceTables {
    /// Load tables from a directory. `pipeline.json` is optional.
    pub fn load(dir: &Path) -> Result<Self, ReferenceError> {
        let settings = if dir.join(PIPELINE).exists() {
            read_table(dir, PIPELINE)?
        } else {
            PipelineSettings::default()
        };

        let tables = Self::assemble(
            read_table(dir, VOCABULARY)?,
            read_table(dir, SCOPE_KEYWORDS)?,
            read_table(dir, SEVERITY_WEIGHTS)?,
            read_table(dir, COST_RULES)?,
            settings,
        )?;

        tracing::info!(
            dir = %dir.display(),
            vocabulary_version = %tables.vocabulary.version(),
            cost_rules = tables.cost_rules.rules.len(),
            "Reference tables loaded"
        );
        Ok(tables)
    }

    /// The defaults compiled into the binary.
    pub fn bundled() -> Result<Self, ReferenceError> {
        Self::assemble(
            parse_table(
                VOCABULARY,
                include_str!("../../resources/config/vocabulary.json"),
            )?,
            parse_table(
                SCOPE_KEYWORDS,
                include_str!("../../resources/config/scope_keywords.json"),
            )?,
            parse_table(
                SEVERITY_WEIGHTS,
                include_str!("../../resources/config/severity_weights.json"),
            )?,
            parse_table(
                COST_RULES,
                include_str!("../../resources/config/cost_rules.json"),
            )?,
            parse_table(PIPELINE, include_str!("../../resources/config/pipeline.json"))?,
        )
    }

    /// `load` when a directory is given, otherwise `bundled`.
    pub fn load_or_bundled(dir: Option<&Path>) -> Result<Self, ReferenceError> {
        match dir {
            Some(dir) => Self::load(dir),
            None => Self::bundled(),
        }
    }

    fn assemble(
        vocabulary: VocabularyTable,
        scope_keywords: ScopeKeywords,
        severity_weights: SeverityWeights,
        cost_rules: CostRuleTable,
        settings: PipelineSettings,
    ) -> Result<Self, ReferenceError> {
        let vocabulary = Vocabulary::compile(vocabulary)?;
        scope_keywords.validate()?;
        cost_rules.validate()?;
        settings.validate()?;
        Ok(Self {
            vocabulary,
            scope_keywords,
            severity_weights,
            cost_rules,
            settings,
        })
    }

    /// Small fixed tables for tests (no file I/O). Retry delays are 1ms.
    #[cfg(test)]
    pub fn load_test() -> Self {
        use crate::models::enums::{Discipline, Severity};
        use crate::models::Money;
        use crate::pipeline::crossref::RetryPolicy;
        use std::collections::BTreeMap;

        let pattern = |attribute: &str, pattern: &str, normalized: &str| AttributePattern {
            attribute: attribute.into(),
            category: "ELECTRICAL_SCOPE".into(),
            pattern: pattern.into(),
            normalized: normalized.into(),
        };
        let vocabulary = VocabularyTable {
            version: "test".into(),
            ambiguity_penalty: 0.2,
            attributes: vec![
                pattern("voltage", r"\b(\d{3})\s*-?\s*(?:V|VOLTS?)\b", "${1}V"),
                pattern("phase", r"\b([13])\s*-?\s*(?:PH|PHASE)\b", "${1}-Phase"),
                pattern("frequency", r"\b(50|60)\s*HZ\b", "${1}Hz"),
                pattern("amperage", r"\b(\d{1,3})\s*(?:A|AMPS?)\b", "${1}A"),
            ],
            location_markers: vec![
                r"^(Pit\s+\d+(?:\s*\([^)]*\))?)\s*:?$".into(),
                r"^(Machine\s+Room(?:\s+\d+)?)\s*:?$".into(),
                r"^(Lobby(?:\s+\d+)?)\s*:?$".into(),
            ],
            note_markers: vec![r"^(Note\s*\d+)\b".into()],
        };

        let mut weights = BTreeMap::new();
        weights.insert("voltage".to_string(), Severity::Critical);
        weights.insert("phase".to_string(), Severity::Critical);
        weights.insert("frequency".to_string(), Severity::Warning);
        weights.insert("amperage".to_string(), Severity::Warning);

        Self::assemble(
            vocabulary,
            ScopeKeywords {
                version: "test".into(),
                keywords: vec![
                    "Pit".into(),
                    "Machine Room".into(),
                    "Sump Pump".into(),
                    "Pit Lighting".into(),
                    "Feeder Circuit".into(),
                ],
                disciplines: vec![
                    Discipline::Electrical,
                    Discipline::Elevator,
                    Discipline::Mechanical,
                ],
            },
            SeverityWeights {
                version: "test".into(),
                default: Severity::Info,
                weights,
            },
            CostRuleTable {
                version: "test".into(),
                rules: vec![CostRule {
                    category: "ELECTRICAL_SCOPE".into(),
                    attribute: "voltage".into(),
                    description: "New pump motor for revised voltage".into(),
                    base_cost: Money::from_cents(185_000),
                }],
                critical_overhead: vec![
                    OverheadItem {
                        category: Some("ELECTRICAL_SCOPE".into()),
                        description: "Restocking fee for returned equipment".into(),
                        amount: Money::from_cents(65_000),
                    },
                    OverheadItem {
                        category: Some("ELECTRICAL_SCOPE".into()),
                        description: "Expedited shipping".into(),
                        amount: Money::from_cents(35_000),
                    },
                ],
            },
            PipelineSettings {
                location_similarity_threshold: 0.8,
                max_page_workers: 2,
                max_concurrent_documents: 2,
                retry: RetryPolicy {
                    max_attempts: 3,
                    initial_delay_ms: 1,
                    max_delay_ms: 4,
                },
            },
        )
        .expect("test reference tables are valid")
    }
}
