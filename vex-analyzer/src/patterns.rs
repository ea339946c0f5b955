//! Pattern-level helpers shared by match-arm checking and pattern-assign
//! statements (spec.md §4.5).

use std::collections::BTreeSet;

use vex_ast::Pattern;

/// Every identifier a pattern binds, including nested bindings inside
/// tuples/structs/enums/arrays/records. `Or` alternatives are expected to
/// bind the same names (the analyzer doesn't enforce that beyond collecting
/// the first alternative's bindings — see DESIGN.md).
pub fn bound_names(pattern: &Pattern) -> Vec<String> {
    let mut names = Vec::new();
    collect(pattern, &mut names);
    names
}

fn collect(pattern: &Pattern, out: &mut Vec<String>) {
    match pattern {
        Pattern::Wildcard | Pattern::Literal(_) => {}
        Pattern::Ident(name) => out.push(name.clone()),
        Pattern::Tuple(elems) => elems.iter().for_each(|p| collect(p, out)),
        Pattern::Struct { fields, .. } => fields.iter().for_each(|(_, p)| collect(p, out)),
        Pattern::Enum { data, .. } => data.iter().for_each(|p| collect(p, out)),
        Pattern::Array { elements, rest } => {
            elements.iter().for_each(|p| collect(p, out));
            if let Some(rest_name) = rest {
                out.push(rest_name.clone());
            }
        }
        Pattern::Or(alts) => {
            if let Some(first) = alts.first() {
                collect(first, out);
            }
        }
        Pattern::Record { fields, .. } => fields.iter().for_each(|(_, p)| collect(p, out)),
    }
}

/// Is this pattern guaranteed to match any value of its scrutinee's type?
/// Used to restrict `PatternAssign` to irrefutable patterns (spec.md §4.5
/// edge case) and to short-circuit exhaustiveness checking.
pub fn is_irrefutable(pattern: &Pattern) -> bool {
    match pattern {
        Pattern::Wildcard | Pattern::Ident(_) => true,
        Pattern::Tuple(elems) => elems.iter().all(is_irrefutable),
        Pattern::Struct { fields, .. } => fields.iter().all(|(_, p)| is_irrefutable(p)),
        Pattern::Record { fields, open, .. } => *open || fields.iter().all(|(_, p)| is_irrefutable(p)),
        _ => false,
    }
}

/// The set of enum-variant names a list of match-arm patterns covers, plus
/// whether any arm is a catch-all (wildcard or bare identifier binding).
pub fn covered_variants(patterns: &[&Pattern]) -> (BTreeSet<String>, bool) {
    let mut covered = BTreeSet::new();
    let mut catch_all = false;
    for pattern in patterns {
        collect_variants(pattern, &mut covered, &mut catch_all);
    }
    (covered, catch_all)
}

fn collect_variants(pattern: &Pattern, covered: &mut BTreeSet<String>, catch_all: &mut bool) {
    match pattern {
        Pattern::Wildcard | Pattern::Ident(_) => *catch_all = true,
        Pattern::Enum { variant, .. } => {
            covered.insert(variant.clone());
        }
        Pattern::Or(alts) => alts.iter().for_each(|p| collect_variants(p, covered, catch_all)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_names_collects_nested_identifiers() {
        let pattern = Pattern::Tuple(vec![Pattern::Ident("a".to_string()), Pattern::Wildcard]);
        assert_eq!(bound_names(&pattern), vec!["a".to_string()]);
    }

    #[test]
    fn wildcard_and_ident_are_irrefutable() {
        assert!(is_irrefutable(&Pattern::Wildcard));
        assert!(is_irrefutable(&Pattern::Ident("x".to_string())));
        assert!(!is_irrefutable(&Pattern::Enum { name: "Option".to_string(), variant: "Some".to_string(), data: vec![] }));
    }

    #[test]
    fn covered_variants_tracks_catch_all() {
        let patterns = vec![
            Pattern::Enum { name: "Option".to_string(), variant: "Some".to_string(), data: vec![Pattern::Wildcard] },
        ];
        let refs: Vec<&Pattern> = patterns.iter().collect();
        let (covered, catch_all) = covered_variants(&refs);
        assert!(covered.contains("Some"));
        assert!(!catch_all);
    }
}
