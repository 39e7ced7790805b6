use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Discipline;

/// An ingested revision artifact (bulletin, ASI, re-issued sheet set).
/// Immutable once assembled by the OCR collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub source_filename: String,
    pub byte_size: u64,
    pub pages: Vec<Page>,
}

impl Document {
    /// Assemble a document with a fresh identifier.
    pub fn new(source_filename: impl Into<String>, byte_size: u64, pages: Vec<Page>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_filename: source_filename.into(),
            byte_size,
            pages,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Human-readable size, e.g. "14.2 MB".
    pub fn display_size(&self) -> String {
        const KB: f64 = 1024.0;
        const MB: f64 = KB * 1024.0;
        let bytes = self.byte_size as f64;
        if bytes >= MB {
            format!("{:.1} MB", bytes / MB)
        } else if bytes >= KB {
            format!("{:.1} KB", bytes / KB)
        } else {
            format!("{} B", self.byte_size)
        }
    }
}

/// One sheet within a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Sheet code as printed in the title block, e.g. "E-501".
    pub sheet_code: String,
    pub discipline: Discipline,
    /// Text elements in reading order.
    pub tokens: Vec<TextToken>,
}

impl Page {
    pub fn new(sheet_code: impl Into<String>, discipline: Discipline) -> Self {
        Self {
            sheet_code: sheet_code.into(),
            discipline,
            tokens: Vec::new(),
        }
    }

    /// Builder-style helper for assembling pages from plain strings.
    pub fn with_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens.extend(tokens.into_iter().map(TextToken::plain));
        self
    }
}

/// A positioned text element produced by OCR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextToken {
    pub text: String,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
}

impl TextToken {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bounding_box: None,
        }
    }
}

/// Bounding box for a text region on the sheet (for highlighting)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_size_megabytes() {
        let doc = Document::new("Bulletin_04_Rev2.pdf", 14_889_779, vec![]);
        assert_eq!(doc.display_size(), "14.2 MB");
    }

    #[test]
    fn display_size_small() {
        let doc = Document::new("note.txt", 512, vec![]);
        assert_eq!(doc.display_size(), "512 B");
    }

    #[test]
    fn page_builder_keeps_order() {
        let page = Page::new("E-501", Discipline::Electrical).with_tokens(["A", "B", "C"]);
        let texts: Vec<&str> = page.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);
    }

    #[test]
    fn token_without_box_deserializes() {
        let token: TextToken = serde_json::from_str(r#"{"text":"208V"}"#).unwrap();
        assert_eq!(token.text, "208V");
        assert!(token.bounding_box.is_none());
    }
}
