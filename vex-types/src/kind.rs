//! Kinds and kind unification (spec.md §4.3).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The kind of a type expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Kind {
    /// `*` — the kind of types that classify values.
    Star,
    /// `k1 -> k2`, right-associative.
    Arrow(Box<Kind>, Box<Kind>),
    /// A kind unknown to be inferred.
    Variable(String),
    /// Matches any kind; used for built-ins whose kind isn't statically
    /// pinned (e.g. phantom markers).
    Wildcard,
}

impl Kind {
    pub fn arrow(from: Kind, to: Kind) -> Kind {
        Kind::Arrow(Box::new(from), Box::new(to))
    }

    /// Builds `k1 -> k2 -> ... -> *` for an n-ary higher-kinded constructor.
    pub fn arrows(arity: usize) -> Kind {
        (0..arity).fold(Kind::Star, |acc, _| Kind::arrow(Kind::Star, acc))
    }

    fn free_vars(&self, out: &mut std::collections::BTreeSet<String>) {
        match self {
            Kind::Star | Kind::Wildcard => {}
            Kind::Variable(v) => {
                out.insert(v.clone());
            }
            Kind::Arrow(a, b) => {
                a.free_vars(out);
                b.free_vars(out);
            }
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Star => write!(f, "*"),
            Kind::Wildcard => write!(f, "_"),
            Kind::Variable(v) => write!(f, "{v}"),
            Kind::Arrow(a, b) => write!(f, "{a} -> {b}"),
        }
    }
}

/// A substitution over kind variables, built up while inferring the kinds
/// of a type expression.
#[derive(Debug, Clone, Default)]
pub struct KindSubstitution(BTreeMap<String, Kind>);

impl KindSubstitution {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, var: String, kind: Kind) {
        self.0.insert(var, kind);
    }

    pub fn apply(&self, kind: &Kind) -> Kind {
        self.apply_visiting(kind, &mut Vec::new())
    }

    fn apply_visiting(&self, kind: &Kind, visiting: &mut Vec<String>) -> Kind {
        match kind {
            Kind::Star | Kind::Wildcard => kind.clone(),
            Kind::Variable(v) => {
                if visiting.contains(v) {
                    return kind.clone();
                }
                match self.0.get(v) {
                    Some(bound) => {
                        visiting.push(v.clone());
                        let resolved = self.apply_visiting(bound, visiting);
                        visiting.pop();
                        resolved
                    }
                    None => kind.clone(),
                }
            }
            Kind::Arrow(a, b) => Kind::arrow(
                self.apply_visiting(a, visiting),
                self.apply_visiting(b, visiting),
            ),
        }
    }
}

/// Unifies two kinds, producing the substitution that makes them equal.
/// Supports kind variables and the wildcard kind (matches anything);
/// the occurs check prevents a variable from unifying with a kind that
/// contains it, which would otherwise require an infinite kind.
pub fn unify_kind(k1: &Kind, k2: &Kind) -> Result<KindSubstitution, TypeError> {
    let mut subst = KindSubstitution::empty();
    unify_kind_into(k1, k2, &mut subst)?;
    Ok(subst)
}

fn unify_kind_into(k1: &Kind, k2: &Kind, subst: &mut KindSubstitution) -> Result<(), TypeError> {
    let k1 = subst.apply(k1);
    let k2 = subst.apply(k2);
    match (&k1, &k2) {
        (Kind::Wildcard, _) | (_, Kind::Wildcard) => Ok(()),
        (Kind::Star, Kind::Star) => Ok(()),
        (Kind::Variable(v), other) | (other, Kind::Variable(v)) => {
            let mut occurs = std::collections::BTreeSet::new();
            other.free_vars(&mut occurs);
            if occurs.contains(v) && other != &Kind::Variable(v.clone()) {
                return Err(TypeError::KindMismatch {
                    expected: k1.to_string(),
                    found: k2.to_string(),
                });
            }
            if other != &Kind::Variable(v.clone()) {
                subst.insert(v.clone(), other.clone());
            }
            Ok(())
        }
        (Kind::Arrow(a1, r1), Kind::Arrow(a2, r2)) => {
            unify_kind_into(a1, a2, subst)?;
            unify_kind_into(r1, r2, subst)
        }
        _ => Err(TypeError::KindMismatch {
            expected: k1.to_string(),
            found: k2.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_unifies_with_star() {
        assert!(unify_kind(&Kind::Star, &Kind::Star).is_ok());
    }

    #[test]
    fn arrow_mismatch_fails() {
        assert!(unify_kind(&Kind::Star, &Kind::arrow(Kind::Star, Kind::Star)).is_err());
    }

    #[test]
    fn wildcard_matches_anything() {
        assert!(unify_kind(&Kind::Wildcard, &Kind::arrow(Kind::Star, Kind::Star)).is_ok());
    }

    #[test]
    fn variable_binds_and_resolves() {
        let subst = unify_kind(&Kind::Variable("k".into()), &Kind::Star).expect("unifies");
        assert_eq!(subst.apply(&Kind::Variable("k".into())), Kind::Star);
    }
}
