/// Confidence bands used when reporting extracted elements.
pub mod thresholds {
    /// Below this an element's attributes should be checked by hand.
    pub const REVIEW: f32 = 0.60;

    /// No ambiguous reads were absorbed.
    pub const CLEAN: f32 = 1.0;
}

/// Confidence of an element that absorbed `ambiguous` conflicting reads.
///
/// Each ambiguous read keeps `1 - penalty` of the remaining confidence, so
/// the score only ever decreases and never leaves [0, 1].
pub fn element_confidence(ambiguous: u32, penalty: f32) -> f32 {
    let keep = (1.0 - penalty).clamp(0.0, 1.0);
    keep.powi(ambiguous.min(i32::MAX as u32) as i32)
}

pub fn needs_review(confidence: f32) -> bool {
    confidence < thresholds::REVIEW
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_ambiguity_is_full_confidence() {
        assert_eq!(element_confidence(0, 0.2), thresholds::CLEAN);
    }

    #[test]
    fn confidence_decreases_with_ambiguity() {
        let one = element_confidence(1, 0.2);
        let two = element_confidence(2, 0.2);
        assert!((one - 0.8).abs() < 1e-6);
        assert!((two - 0.64).abs() < 1e-6);
        assert!(two < one);
    }

    #[test]
    fn confidence_stays_in_range() {
        let c = element_confidence(1_000, 0.5);
        assert!((0.0..=1.0).contains(&c));
        assert!(needs_review(c));
    }
}
