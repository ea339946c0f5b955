//! Type schemes: a type together with its universally quantified variables
//! and the trait constraints discharged against them (spec.md §3.2, GLOSSARY).

use std::collections::BTreeSet;

use crate::subst::{free_vars, Substitution};
use crate::ty::{Constraint, Forall, Type};

/// A (possibly monomorphic) binding's type. A polymorphic binding's scheme
/// wraps its body in `Forall`; a plain type is its own scheme.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheme {
    pub vars: Vec<String>,
    pub constraints: Vec<Constraint>,
    pub body: Type,
}

impl Scheme {
    pub fn monomorphic(ty: Type) -> Self {
        Self { vars: Vec::new(), constraints: Vec::new(), body: ty }
    }

    pub fn polymorphic(vars: Vec<String>, constraints: Vec<Constraint>, body: Type) -> Self {
        Self { vars, constraints, body }
    }

    pub fn is_polymorphic(&self) -> bool {
        !self.vars.is_empty()
    }

    pub fn as_type(&self) -> Type {
        if self.vars.is_empty() {
            self.body.clone()
        } else {
            Type::Forall(Forall {
                vars: self.vars.clone(),
                constraints: self.constraints.clone(),
                body: Box::new(self.body.clone()),
            })
        }
    }

    /// Instantiates the scheme with fresh type variables, returning the
    /// instantiated body and the constraints restated over the fresh
    /// variables. `fresh` is supplied by the caller (the analyzer owns the
    /// counter so that fresh names are unique across the whole inference
    /// pass, sorted-key deterministic per spec.md §4.5).
    pub fn instantiate(&self, fresh: &mut impl FnMut() -> String) -> (Type, Vec<Constraint>) {
        if self.vars.is_empty() {
            return (self.body.clone(), self.constraints.clone());
        }
        let mut subst = Substitution::empty();
        for v in &self.vars {
            subst.insert(v.clone(), Type::var(fresh()));
        }
        let body = subst.apply(&self.body);
        let constraints = self
            .constraints
            .iter()
            .map(|c| Constraint {
                trait_name: c.trait_name.clone(),
                var: match subst.get(&c.var) {
                    Some(Type::Variable { name, .. }) => name.clone(),
                    _ => c.var.clone(),
                },
            })
            .collect();
        (body, constraints)
    }

    /// Generalizes `ty` over every free variable not also free in the
    /// ambient environment (`env_vars`), attaching `constraints` discovered
    /// during inference of `ty` to the resulting scheme.
    pub fn generalize(ty: &Type, env_vars: &BTreeSet<String>, constraints: Vec<Constraint>) -> Scheme {
        let ty_vars = free_vars(ty);
        let vars: Vec<String> = ty_vars.difference(env_vars).cloned().collect();
        if vars.is_empty() {
            Scheme::monomorphic(ty.clone())
        } else {
            Scheme::polymorphic(vars, constraints, ty.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generalize_quantifies_vars_not_in_env() {
        let ty = Type::func(vec![Type::var("t")], Type::var("t"));
        let scheme = Scheme::generalize(&ty, &BTreeSet::new(), Vec::new());
        assert_eq!(scheme.vars, vec!["t".to_string()]);
    }

    #[test]
    fn instantiate_replaces_bound_vars_with_fresh_ones() {
        let scheme = Scheme::polymorphic(
            vec!["t".to_string()],
            Vec::new(),
            Type::func(vec![Type::var("t")], Type::var("t")),
        );
        let mut counter = 0;
        let mut fresh = move || {
            counter += 1;
            format!("t{counter}")
        };
        let (instantiated, _) = scheme.instantiate(&mut fresh);
        assert_eq!(instantiated, Type::func(vec![Type::var("t1")], Type::var("t1")));
    }
}
