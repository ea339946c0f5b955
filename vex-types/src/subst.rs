//! Type substitution (spec.md §4.1): a finite map from variable names to
//! types, with cycle-safe application and composition.

use std::collections::{BTreeMap, BTreeSet};

use crate::ty::{FunctionType, RecordType, Type};

/// A finite map from type-variable name to the type it is bound to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution(BTreeMap<String, Type>);

impl Substitution {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn singleton(var: impl Into<String>, ty: Type) -> Self {
        let mut map = BTreeMap::new();
        map.insert(var.into(), ty);
        Self(map)
    }

    pub fn insert(&mut self, var: impl Into<String>, ty: Type) {
        self.0.insert(var.into(), ty);
    }

    pub fn get(&self, var: &str) -> Option<&Type> {
        self.0.get(var)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates bindings in sorted-key order (determinism invariant in
    /// spec.md §4.1/§4.5/§5).
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Type)> {
        self.0.iter()
    }

    /// Applies the substitution to `ty`, recursively. Cycle detection tracks
    /// the variables already followed on the current recursion path;
    /// revisiting one returns it as-is rather than looping forever.
    pub fn apply(&self, ty: &Type) -> Type {
        self.apply_visiting(ty, &mut Vec::new())
    }

    fn apply_visiting(&self, ty: &Type, visiting: &mut Vec<String>) -> Type {
        match ty {
            Type::Variable { name, kind } => {
                if visiting.contains(name) {
                    return ty.clone();
                }
                match self.0.get(name) {
                    Some(bound) => {
                        visiting.push(name.clone());
                        let resolved = self.apply_visiting(bound, visiting);
                        visiting.pop();
                        resolved
                    }
                    None => Type::Variable { name: name.clone(), kind: kind.clone() },
                }
            }
            Type::Constant { underlying: None, .. } => ty.clone(),
            Type::Constant { name, module, underlying: Some(u), params, kind } => Type::Constant {
                name: name.clone(),
                module: module.clone(),
                underlying: Some(Box::new(self.apply_visiting(u, visiting))),
                params: params.clone(),
                kind: kind.clone(),
            },
            Type::Application { ctor, args } => Type::Application {
                ctor: Box::new(self.apply_visiting(ctor, visiting)),
                args: args.iter().map(|a| self.apply_visiting(a, visiting)).collect(),
            },
            Type::Function(ft) => Type::Function(FunctionType {
                params: ft.params.iter().map(|p| self.apply_visiting(p, visiting)).collect(),
                ret: Box::new(self.apply_visiting(&ft.ret, visiting)),
                variadic: ft.variadic,
                default_count: ft.default_count,
                constraints: ft.constraints.clone(),
            }),
            Type::Tuple(elems) => {
                Type::Tuple(elems.iter().map(|e| self.apply_visiting(e, visiting)).collect())
            }
            Type::Record(r) => Type::Record(RecordType {
                fields: r
                    .fields
                    .iter()
                    .map(|(k, v)| (k.clone(), self.apply_visiting(v, visiting)))
                    .collect(),
                row: r.row.clone(),
                is_open: r.is_open,
            }),
            Type::Union(members) => {
                Type::union(members.iter().map(|m| self.apply_visiting(m, visiting)).collect())
            }
            Type::Forall(forall) => Type::Forall(crate::ty::Forall {
                vars: forall.vars.clone(),
                constraints: forall.constraints.clone(),
                body: Box::new(self.apply_visiting(&forall.body, visiting)),
            }),
            Type::TypeValue(inner) => Type::TypeValue(Box::new(self.apply_visiting(inner, visiting))),
        }
    }

    /// Composes `self` after `other`: applying the result to a type is
    /// equivalent to applying `other` then `self`. The later substitution
    /// (`self`) is applied to the codomain of the earlier one (`other`).
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut result: BTreeMap<String, Type> =
            other.0.iter().map(|(k, v)| (k.clone(), self.apply(v))).collect();
        for (k, v) in &self.0 {
            result.entry(k.clone()).or_insert_with(|| v.clone());
        }
        Substitution(result)
    }
}

/// Computes the free type variables of `ty`. Record fields are iterated in
/// sorted key order (they're backed by a `BTreeMap`) so the returned list is
/// deterministic.
pub fn free_vars(ty: &Type) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_free_vars(ty, &mut out);
    out
}

fn collect_free_vars(ty: &Type, out: &mut BTreeSet<String>) {
    match ty {
        Type::Variable { name, .. } => {
            out.insert(name.clone());
        }
        Type::Constant { underlying, .. } => {
            if let Some(u) = underlying {
                collect_free_vars(u, out);
            }
        }
        Type::Application { ctor, args } => {
            collect_free_vars(ctor, out);
            for a in args {
                collect_free_vars(a, out);
            }
        }
        Type::Function(ft) => {
            for p in &ft.params {
                collect_free_vars(p, out);
            }
            collect_free_vars(&ft.ret, out);
            for c in &ft.constraints {
                out.insert(c.var.clone());
            }
        }
        Type::Tuple(elems) => {
            for e in elems {
                collect_free_vars(e, out);
            }
        }
        Type::Record(r) => {
            for (_, v) in r.fields.iter() {
                collect_free_vars(v, out);
            }
            if let Some(row) = &r.row {
                out.insert(row.clone());
            }
        }
        Type::Union(members) => {
            for m in members {
                collect_free_vars(m, out);
            }
        }
        Type::Forall(forall) => {
            let mut inner = BTreeSet::new();
            collect_free_vars(&forall.body, &mut inner);
            for c in &forall.constraints {
                inner.insert(c.var.clone());
            }
            for bound in &forall.vars {
                inner.remove(bound);
            }
            out.extend(inner);
        }
        Type::TypeValue(inner) => collect_free_vars(inner, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_resolves_chained_binding() {
        let mut s = Substitution::empty();
        s.insert("a", Type::var("b"));
        s.insert("b", Type::constant("Int"));
        assert_eq!(s.apply(&Type::var("a")), Type::constant("Int"));
    }

    #[test]
    fn apply_breaks_cycle_instead_of_looping() {
        let mut s = Substitution::empty();
        s.insert("a", Type::var("b"));
        s.insert("b", Type::var("a"));
        // Must terminate: revisiting `a` returns it as-is.
        let result = s.apply(&Type::var("a"));
        assert_eq!(result, Type::var("a"));
    }

    #[test]
    fn compose_applies_later_to_codomain_of_earlier() {
        let mut first = Substitution::empty();
        first.insert("a", Type::var("b"));
        let mut second = Substitution::empty();
        second.insert("b", Type::constant("Int"));
        let composed = second.compose(&first);
        assert_eq!(composed.apply(&Type::var("a")), Type::constant("Int"));
    }

    #[test]
    fn free_vars_sorted_deterministic_over_record_fields() {
        let rec = Type::Record(RecordType {
            fields: [("x".to_string(), Type::var("t1")), ("a".to_string(), Type::var("t0"))]
                .into_iter()
                .collect(),
            row: Some("rho".to_string()),
            is_open: true,
        });
        let vars: Vec<String> = free_vars(&rec).into_iter().collect();
        assert_eq!(vars, vec!["rho".to_string(), "t0".to_string(), "t1".to_string()]);
    }

    #[test]
    fn forall_hides_bound_vars() {
        let scheme = Type::Forall(crate::ty::Forall {
            vars: vec!["t".to_string()],
            constraints: Vec::new(),
            body: Box::new(Type::func(vec![Type::var("t")], Type::var("t"))),
        });
        assert!(free_vars(&scheme).is_empty());
    }
}
