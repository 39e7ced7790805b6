use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named mailbox, rendered `Name <email>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
}

impl Contact {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// First word of the display name, used in the salutation.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// A rendered Request For Information referencing exactly one conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfiDraft {
    pub conflict_id: Uuid,
    pub subject: String,
    pub to: Contact,
    pub cc: Vec<Contact>,
    pub body: String,
    pub respond_by: NaiveDate,
}

impl RfiDraft {
    /// Header lines plus body, as copied to the clipboard.
    pub fn to_clipboard_text(&self) -> String {
        let cc = self
            .cc
            .iter()
            .map(Contact::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Subject: {}\nTo: {}\nCC: {}\n\n{}",
            self.subject, self.to, cc, self.body
        )
    }
}
