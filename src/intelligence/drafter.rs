use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::{Conflict, Contact, RfiDraft};
use crate::reference::Vocabulary;

use super::messages::{title_case, MessageTemplates, CLARIFICATION_QUESTIONS};

/// Caller-supplied metadata for an RFI. Nothing here is invented by the
/// drafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfiContext {
    pub project_name: String,
    /// Revision identifier as written on the document, e.g. "ASI #04".
    pub bulletin_id: String,
    pub recipient: Contact,
    #[serde(default)]
    pub cc: Vec<Contact>,
    pub sender_name: String,
    pub sender_title: String,
}

/// Strictly after `today`: a Friday `today` gets the following Friday.
pub fn next_friday(today: NaiveDate) -> NaiveDate {
    let today_index = i64::from(today.weekday().num_days_from_monday());
    let friday_index = i64::from(Weekday::Fri.num_days_from_monday());
    let mut days = (friday_index - today_index).rem_euclid(7);
    if days == 0 {
        days = 7;
    }
    today + Duration::days(days)
}

/// Renders one conflict into a formal request for information.
pub struct RfiDrafter {
    vocabulary: Arc<Vocabulary>,
}

impl RfiDrafter {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self { vocabulary }
    }

    pub fn draft(&self, conflict: &Conflict, context: &RfiContext, today: NaiveDate) -> RfiDraft {
        let respond_by = next_friday(today);
        let subject = MessageTemplates::rfi_subject(
            &context.bulletin_id,
            &conflict.primary_attribute,
            &context.project_name,
        );

        let mut body = Vec::new();
        body.push(MessageTemplates::rfi_greeting(context.recipient.first_name()));
        body.push(String::new());
        body.push(MessageTemplates::rfi_opening(
            &conflict.sheet_ref,
            &context.bulletin_id,
        ));
        body.push(String::new());

        body.push("CONFLICT SUMMARY:".to_string());
        body.push(format!("- Location: {}", conflict.location));
        body.push(format!(
            "- Approved {} ({}): {}",
            conflict.baseline.submittal_id,
            conflict.baseline.approved_on.format("%Y-%m-%d"),
            self.vocabulary.format_summary(&conflict.old_spec),
        ));
        body.push(format!(
            "- {} Revision: {}",
            context.bulletin_id,
            self.vocabulary.format_summary(&conflict.new_spec),
        ));
        body.push(String::new());

        body.push("CHANGED VALUES:".to_string());
        for (name, old, new) in conflict.differences() {
            body.push(format!("- {}: {} -> {}", title_case(name), old, new));
        }
        body.push(String::new());

        body.push("QUESTIONS:".to_string());
        for (i, template) in CLARIFICATION_QUESTIONS.iter().enumerate() {
            body.push(format!(
                "{}. {}",
                i + 1,
                MessageTemplates::question(template, &conflict.primary_attribute)
            ));
        }
        body.push(String::new());

        body.push("ESTIMATED IMPACT:".to_string());
        body.push(MessageTemplates::rfi_impact(
            conflict.cost_impact,
            &conflict.cost_breakdown,
        ));
        body.push(String::new());

        body.push(MessageTemplates::rfi_deadline(respond_by));
        body.push(String::new());
        body.push("Best regards,".to_string());
        body.push(context.sender_name.clone());
        body.push(context.sender_title.clone());

        tracing::info!(
            conflict_id = %conflict.id,
            respond_by = %respond_by,
            "RFI drafted"
        );

        RfiDraft {
            conflict_id: conflict.id,
            subject,
            to: context.recipient.clone(),
            cc: context.cc.clone(),
            body: body.join("\n"),
            respond_by,
        }
    }
}
