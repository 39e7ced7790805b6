use std::collections::BTreeSet;
use std::sync::Arc;

use crate::models::enums::Severity;
use crate::models::{Conflict, CostLineItem, Money};
use crate::reference::ReferenceTables;

/// Prices conflicts from the cost-rule table.
///
/// Total: a change with no rule costs zero and the conflict still comes
/// through. Category overhead is charged once, on the first CRITICAL
/// conflict of that category.
pub struct CostEstimator {
    tables: Arc<ReferenceTables>,
}

impl CostEstimator {
    pub fn new(tables: Arc<ReferenceTables>) -> Self {
        Self { tables }
    }

    pub fn estimate(&self, conflicts: Vec<Conflict>) -> Vec<Conflict> {
        let rules = &self.tables.cost_rules;
        let mut overhead_charged: BTreeSet<String> = BTreeSet::new();

        conflicts
            .into_iter()
            .map(|mut conflict| {
                let mut items = Vec::new();

                for attribute in &conflict.differing_attributes {
                    match rules.rule(&conflict.category, attribute) {
                        Some(rule) => items.push(CostLineItem {
                            description: rule.description.clone(),
                            amount: rule.base_cost,
                            attribute: Some(attribute.clone()),
                        }),
                        None => tracing::debug!(
                            conflict_id = %conflict.id,
                            category = %conflict.category,
                            attribute = %attribute,
                            "No cost rule, contributes zero"
                        ),
                    }
                }

                if conflict.severity == Severity::Critical
                    && overhead_charged.insert(conflict.category.clone())
                {
                    items.extend(rules.overhead_for(&conflict.category).map(|o| CostLineItem {
                        description: o.description.clone(),
                        amount: o.amount,
                        attribute: None,
                    }));
                }

                items.retain(|item| {
                    if item.amount.is_negative() {
                        tracing::warn!(
                            conflict_id = %conflict.id,
                            description = %item.description,
                            "Dropping negative cost line"
                        );
                    }
                    !item.amount.is_negative()
                });

                conflict.cost_impact = items.iter().map(|i| i.amount).sum::<Money>();
                conflict.cost_breakdown = items;
                conflict
            })
            .collect()
    }
}
