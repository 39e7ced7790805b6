use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ReferenceError;
use crate::models::enums::{Discipline, Severity};
use crate::models::Money;
use crate::pipeline::crossref::RetryPolicy;

// ---------------------------------------------------------------------------
// Scope keywords
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeKeywords {
    pub version: String,
    pub keywords: Vec<String>,
    /// Sheet disciplines whose facts may be in scope. Empty admits all.
    #[serde(default)]
    pub disciplines: Vec<Discipline>,
}

impl ScopeKeywords {
    pub(super) fn validate(&self) -> Result<(), ReferenceError> {
        if self.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ReferenceError::Invalid {
                table: "scope_keywords.json".into(),
                reason: "blank keyword".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Severity weights
// ---------------------------------------------------------------------------

fn default_severity() -> Severity {
    Severity::Info
}

/// Attribute name -> severity of a change to that attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityWeights {
    pub version: String,
    /// Weight for attributes the table does not name.
    #[serde(default = "default_severity")]
    pub default: Severity,
    pub weights: BTreeMap<String, Severity>,
}

impl SeverityWeights {
    pub fn weight(&self, attribute: &str) -> Severity {
        self.weights.get(attribute).copied().unwrap_or(self.default)
    }
}

// ---------------------------------------------------------------------------
// Cost rules
// ---------------------------------------------------------------------------

/// Base cost of changing one attribute within one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRule {
    pub category: String,
    pub attribute: String,
    pub description: String,
    pub base_cost: Money,
}

/// Fixed charge added once per category when a CRITICAL conflict is found
/// there. A missing category applies to every category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverheadItem {
    #[serde(default)]
    pub category: Option<String>,
    pub description: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRuleTable {
    pub version: String,
    pub rules: Vec<CostRule>,
    #[serde(default)]
    pub critical_overhead: Vec<OverheadItem>,
}

impl CostRuleTable {
    pub fn rule(&self, category: &str, attribute: &str) -> Option<&CostRule> {
        self.rules
            .iter()
            .find(|r| r.category == category && r.attribute == attribute)
    }

    pub fn overhead_for<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a OverheadItem> {
        self.critical_overhead
            .iter()
            .filter(move |o| o.category.as_deref().map_or(true, |c| c == category))
    }

    pub(super) fn validate(&self) -> Result<(), ReferenceError> {
        let invalid = |reason: String| ReferenceError::Invalid {
            table: "cost_rules.json".into(),
            reason,
        };
        for rule in &self.rules {
            if rule.base_cost.is_negative() {
                return Err(invalid(format!(
                    "negative base cost for {}/{}",
                    rule.category, rule.attribute
                )));
            }
        }
        for item in &self.critical_overhead {
            if item.amount.is_negative() {
                return Err(invalid(format!("negative overhead '{}'", item.description)));
            }
        }
        for (i, rule) in self.rules.iter().enumerate() {
            if self.rules[..i]
                .iter()
                .any(|r| r.category == rule.category && r.attribute == rule.attribute)
            {
                return Err(invalid(format!(
                    "duplicate rule for {}/{}",
                    rule.category, rule.attribute
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pipeline settings
// ---------------------------------------------------------------------------

/// Tunables read from `pipeline.json`. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Minimum location similarity for a baseline candidate to count.
    pub location_similarity_threshold: f32,
    pub max_page_workers: usize,
    pub max_concurrent_documents: usize,
    pub retry: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            location_similarity_threshold: 0.8,
            max_page_workers: 4,
            max_concurrent_documents: 4,
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineSettings {
    pub(super) fn validate(&self) -> Result<(), ReferenceError> {
        let invalid = |reason: &str| ReferenceError::Invalid {
            table: "pipeline.json".into(),
            reason: reason.into(),
        };
        if !(self.location_similarity_threshold > 0.0 && self.location_similarity_threshold <= 1.0)
        {
            return Err(invalid("location_similarity_threshold must be in (0, 1]"));
        }
        if self.max_page_workers == 0 || self.max_concurrent_documents == 0 {
            return Err(invalid("worker counts must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be at least 1"));
        }
        Ok(())
    }
}
