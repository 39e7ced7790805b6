use std::sync::Arc;

use super::confidence;
use super::page::extract_page;
use super::{ExtractionError, SpecExtractor};
use crate::models::{Document, SpecificationElement};
use crate::reference::Vocabulary;

/// Vocabulary-driven extractor. Pages are read by a bounded pool of scoped
/// worker threads; each worker owns the pages it was dealt and shares
/// nothing mutable with the others.
pub struct VocabularyExtractor {
    vocabulary: Arc<Vocabulary>,
    max_workers: usize,
}

impl VocabularyExtractor {
    pub fn new(vocabulary: Arc<Vocabulary>, max_workers: usize) -> Self {
        Self {
            vocabulary,
            max_workers: max_workers.max(1),
        }
    }
}

impl SpecExtractor for VocabularyExtractor {
    fn extract(&self, document: &Document) -> Result<Vec<SpecificationElement>, ExtractionError> {
        if document.pages.is_empty() {
            return Err(ExtractionError::EmptyDocument(document.id));
        }

        let workers = self.max_workers.min(document.pages.len());
        tracing::debug!(
            document_id = %document.id,
            pages = document.pages.len(),
            workers,
            "Extracting pages"
        );

        let vocabulary = &*self.vocabulary;
        let mut per_page: Vec<Option<Vec<SpecificationElement>>> =
            vec![None; document.pages.len()];

        let outcome = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    scope.spawn(move || {
                        document
                            .pages
                            .iter()
                            .enumerate()
                            .skip(worker)
                            .step_by(workers)
                            .map(|(index, page)| (index, extract_page(index, page, vocabulary)))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            // Joined in spawn order; slots are filled by page index, so
            // completion order never shows up in the output.
            for (worker, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(batch) => {
                        for (index, elements) in batch {
                            per_page[index] = Some(elements);
                        }
                    }
                    Err(_) => {
                        return Err(ExtractionError::WorkerPanicked {
                            document_id: document.id,
                            worker,
                        })
                    }
                }
            }
            Ok(())
        });
        outcome?;

        let elements: Vec<SpecificationElement> = per_page.into_iter().flatten().flatten().collect();
        let low_confidence = elements
            .iter()
            .filter(|e| confidence::needs_review(e.confidence))
            .count();
        tracing::info!(
            document_id = %document.id,
            pages = document.pages.len(),
            elements = elements.len(),
            low_confidence,
            "Extraction complete"
        );
        Ok(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Discipline;
    use crate::models::Page;
    use crate::reference::ReferenceTables;

    fn extractor(workers: usize) -> VocabularyExtractor {
        VocabularyExtractor::new(Arc::new(ReferenceTables::load_test().vocabulary), workers)
    }

    fn many_pages(n: usize) -> Document {
        let pages = (0..n)
            .map(|i| {
                Page::new(format!("E-{}", 500 + i), Discipline::Electrical).with_tokens([
                    format!("Pit {i}"),
                    if i % 2 == 0 { "208V".to_string() } else { "120V".to_string() },
                    "3-Phase".to_string(),
                ])
            })
            .collect();
        Document::new("Bulletin_04.pdf", 1024, pages)
    }

    #[test]
    fn zero_pages_is_an_error() {
        let doc = Document::new("empty.pdf", 0, vec![]);
        let err = extractor(4).extract(&doc).unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyDocument(id) if id == doc.id));
    }

    #[test]
    fn output_is_in_page_order() {
        let doc = many_pages(9);
        let elements = extractor(4).extract(&doc).unwrap();
        let locations: Vec<String> = elements.iter().map(|e| e.location.clone()).collect();
        let expected: Vec<String> = (0..9).map(|i| format!("Pit {i}")).collect();
        assert_eq!(locations, expected);
        assert!(elements.iter().enumerate().all(|(i, e)| e.source.page_index == i));
    }

    #[test]
    fn worker_count_does_not_change_output() {
        let doc = many_pages(7);
        let single = extractor(1).extract(&doc).unwrap();
        for workers in [2, 3, 8] {
            assert_eq!(extractor(workers).extract(&doc).unwrap(), single);
        }
    }

    #[test]
    fn extraction_is_repeatable() {
        let doc = many_pages(5);
        let ex = extractor(3);
        assert_eq!(ex.extract(&doc).unwrap(), ex.extract(&doc).unwrap());
    }

    #[test]
    fn locations_never_cross_pages() {
        let doc = Document::new(
            "b.pdf",
            10,
            vec![
                Page::new("E-501", Discipline::Electrical).with_tokens(["Pit 2", "208V"]),
                Page::new("E-502", Discipline::Electrical).with_tokens(["120V"]),
            ],
        );
        let elements = extractor(2).extract(&doc).unwrap();
        assert_eq!(elements[0].location, "Pit 2");
        assert_eq!(elements[1].location, crate::pipeline::extraction::page::UNLOCATED);
    }
}
