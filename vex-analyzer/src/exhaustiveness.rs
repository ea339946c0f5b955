//! Exhaustiveness checking for `match` over sum types (spec.md §4.5 edge
//! case: "every constructor must appear, or a wildcard must").

use std::collections::BTreeSet;

/// Returns the variant names of `all_variants` not covered by `covered`,
/// sorted for deterministic diagnostic text. Empty if `has_catch_all` is
/// set, since a wildcard/binding arm matches whatever's left over.
pub fn missing_variants(all_variants: &BTreeSet<String>, covered: &BTreeSet<String>, has_catch_all: bool) -> Vec<String> {
    if has_catch_all {
        return Vec::new();
    }
    all_variants.difference(covered).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_uncovered_variants_sorted() {
        let all: BTreeSet<String> = ["Some", "None"].into_iter().map(String::from).collect();
        let covered: BTreeSet<String> = ["Some"].into_iter().map(String::from).collect();
        assert_eq!(missing_variants(&all, &covered, false), vec!["None".to_string()]);
    }

    #[test]
    fn catch_all_suppresses_missing_variants() {
        let all: BTreeSet<String> = ["Some", "None"].into_iter().map(String::from).collect();
        let covered = BTreeSet::new();
        assert!(missing_variants(&all, &covered, true).is_empty());
    }

    #[test]
    fn fully_covered_reports_nothing() {
        let all: BTreeSet<String> = ["Ok", "Err"].into_iter().map(String::from).collect();
        assert!(missing_variants(&all, &all.clone(), false).is_empty());
    }
}
