use chrono::NaiveDate;

use crate::models::{CostLineItem, Money};

/// Clarification questions asked in every RFI. `{attribute}` is the
/// lower-case name of the primary changed attribute.
pub const CLARIFICATION_QUESTIONS: [&str; 3] = [
    "Please confirm the intended {attribute} for this location.",
    "If the revised specification is correct, please issue a formal change order for the affected equipment.",
    "Please advise on schedule impact if the equipment specification changes.",
];

/// Fixed wording for conflict reasoning and RFI text. Values are only ever
/// substituted through `format!`.
pub struct MessageTemplates;

impl MessageTemplates {
    /// Reasoning stored on each conflict.
    pub fn reasoning(
        sheet_ref: &str,
        submittal_id: &str,
        approved_on: NaiveDate,
        differences: &[(&str, &str, &str)],
    ) -> String {
        let changes = differences
            .iter()
            .map(|(name, old, new)| format!("{} from {} to {}", humanize(name), old, new))
            .collect::<Vec<_>>()
            .join("; ");
        format!(
            "Sheet {} changes {}, contradicting {} approved {}.",
            sheet_ref,
            changes,
            submittal_id,
            approved_on.format("%Y-%m-%d"),
        )
    }

    /// "RFI - Bulletin 04 Voltage Conflict - Skyline Tower"
    pub fn rfi_subject(bulletin_id: &str, primary_attribute: &str, project_name: &str) -> String {
        format!(
            "RFI - {} {} Conflict - {}",
            bulletin_id,
            title_case(primary_attribute),
            project_name,
        )
    }

    pub fn rfi_greeting(first_name: &str) -> String {
        format!("Hi {},", first_name)
    }

    pub fn rfi_opening(sheet_ref: &str, bulletin_id: &str) -> String {
        format!(
            "ScopeGuard detected a discrepancy on Sheet {} of {} that requires clarification before we can proceed.",
            sheet_ref, bulletin_id,
        )
    }

    pub fn rfi_impact(total: Money, breakdown: &[CostLineItem]) -> String {
        if breakdown.is_empty() {
            return format!(
                "If the revised specification is confirmed: {} (no cost rule covers this change; estimate pending)",
                total
            );
        }
        let parts = breakdown
            .iter()
            .map(|item| format!("{} {}", item.description, item.amount))
            .collect::<Vec<_>>()
            .join(" + ");
        format!("If the revised specification is confirmed: {} ({})", total, parts)
    }

    pub fn rfi_deadline(respond_by: NaiveDate) -> String {
        format!(
            "Please respond by EOD {} to maintain schedule. We are holding installation at this location until this is resolved.",
            respond_by.format("%A, %B %-d, %Y"),
        )
    }

    pub fn question(template: &str, primary_attribute: &str) -> String {
        template.replace("{attribute}", &humanize(primary_attribute))
    }
}

/// "pit_depth" -> "pit depth"
pub fn humanize(attribute: &str) -> String {
    attribute.replace('_', " ")
}

/// "pit_depth" -> "Pit Depth"
pub fn title_case(attribute: &str) -> String {
    humanize(attribute)
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
