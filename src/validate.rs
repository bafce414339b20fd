//! Answer normalization and the deterministic fast path of validation.
//!
//! The slow path (remote oracle query) is orchestrated by the room registry
//! so the oracle round-trip never runs under a room lock; this module only
//! covers the O(1) checks that do.

use crate::types::Category;
use std::collections::HashSet;

/// Fold a raw submission into its canonical form.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Outcome of the in-lock checks against the active round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FastVerdict {
    /// Already accepted this round; reject without penalty or reward.
    Duplicate,
    /// Present in the category's example set; accept without the oracle.
    Known,
    /// Inconclusive; the caller must consult the oracle (fail closed).
    Unknown,
}

pub fn fast_verdict(category: &Category, accepted: &HashSet<String>, normalized: &str) -> FastVerdict {
    if accepted.contains(normalized) {
        FastVerdict::Duplicate
    } else if category.examples.contains(normalized) {
        FastVerdict::Known
    } else {
        FastVerdict::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fruits() -> Category {
        Category::new("FRUITS", ["apple", "banana"], "#00f3ff")
    }

    #[test]
    fn normalize_trims_and_folds_case() {
        assert_eq!(normalize(" Apple "), "apple");
        assert_eq!(normalize("BANANA"), "banana");
    }

    #[test]
    fn known_example_is_a_fast_match() {
        let accepted = HashSet::new();
        assert_eq!(fast_verdict(&fruits(), &accepted, "apple"), FastVerdict::Known);
    }

    #[test]
    fn accepted_word_is_duplicate_even_if_known() {
        let accepted: HashSet<String> = ["apple".to_string()].into();
        assert_eq!(
            fast_verdict(&fruits(), &accepted, "apple"),
            FastVerdict::Duplicate
        );
    }

    #[test]
    fn unlisted_word_is_inconclusive() {
        let accepted = HashSet::new();
        assert_eq!(fast_verdict(&fruits(), &accepted, "kiwi"), FastVerdict::Unknown);
    }
}
