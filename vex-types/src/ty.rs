//! Algebraic type values (spec.md §3.1).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kind::Kind;

/// A trait constraint attached to a type variable inside a `Function` or
/// `Forall`: `t: Display`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub trait_name: String,
    pub var: String,
}

/// Arrow type with trait constraints on its type variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionType {
    pub params: Vec<Type>,
    pub ret: Box<Type>,
    pub variadic: bool,
    pub default_count: usize,
    pub constraints: Vec<Constraint>,
}

/// A record type: a field map plus an optional row variable that makes it
/// row-polymorphic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordType {
    pub fields: BTreeMap<String, Type>,
    pub row: Option<String>,
    pub is_open: bool,
}

impl RecordType {
    pub fn closed(fields: BTreeMap<String, Type>) -> Self {
        Self { fields, row: None, is_open: false }
    }
}

/// Universal quantification over a set of type variables, with the
/// constraints collected during inference attached to the scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forall {
    pub vars: Vec<String>,
    pub constraints: Vec<Constraint>,
    pub body: Box<Type>,
}

/// A compile-time type value (spec.md §3.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    /// A type unknown to be inferred.
    Variable { name: String, kind: Option<Kind> },
    /// A nominal/primitive type, or (when `underlying` is set) a type alias.
    Constant {
        name: String,
        module: Option<String>,
        underlying: Option<Box<Type>>,
        params: Vec<String>,
        kind: Option<Kind>,
    },
    /// Application of a constructor to arguments; always kept flat —
    /// `App (App ctor a) b` is normalized to `App ctor [a, b]` by
    /// [`Type::apply`].
    Application { ctor: Box<Type>, args: Vec<Type> },
    Function(FunctionType),
    Tuple(Vec<Type>),
    Record(RecordType),
    /// A normalized sum-of-primitives union: flat, deduped by string form,
    /// sorted. A singleton union collapses to its sole member — use
    /// [`Type::union`] rather than constructing this variant directly.
    Union(Vec<Type>),
    Forall(Forall),
    /// The type of a first-class type value (reflection-style).
    TypeValue(Box<Type>),
}

impl Type {
    pub fn var(name: impl Into<String>) -> Type {
        Type::Variable { name: name.into(), kind: None }
    }

    pub fn constant(name: impl Into<String>) -> Type {
        Type::Constant {
            name: name.into(),
            module: None,
            underlying: None,
            params: Vec::new(),
            kind: None,
        }
    }

    pub fn alias(name: impl Into<String>, params: Vec<String>, underlying: Type) -> Type {
        Type::Constant {
            name: name.into(),
            module: None,
            underlying: Some(Box::new(underlying)),
            params,
            kind: None,
        }
    }

    /// Applies `ctor` to `args`, flattening a nested application so that
    /// `(App ctor a) b` normalizes to `App ctor [a, b]` (§3.1 invariant).
    pub fn apply(ctor: Type, mut args: Vec<Type>) -> Type {
        match ctor {
            Type::Application { ctor: inner_ctor, args: mut inner_args } => {
                inner_args.append(&mut args);
                Type::Application { ctor: inner_ctor, args: inner_args }
            }
            other => Type::Application { ctor: Box::new(other), args },
        }
    }

    pub fn func(params: Vec<Type>, ret: Type) -> Type {
        Type::Function(FunctionType {
            params,
            ret: Box::new(ret),
            variadic: false,
            default_count: 0,
            constraints: Vec::new(),
        })
    }

    /// Constructs a normalized union: flattens nested unions, dedupes by
    /// string form, sorts, and collapses a singleton to its sole member
    /// (spec.md §3.1, testable property 4).
    pub fn union(members: Vec<Type>) -> Type {
        let mut flat = Vec::new();
        for m in members {
            match m {
                Type::Union(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        let mut seen = BTreeMap::new();
        for m in flat {
            seen.entry(m.to_string()).or_insert(m);
        }
        let mut deduped: Vec<Type> = seen.into_values().collect();
        deduped.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        match deduped.len() {
            1 => deduped.into_iter().next().expect("len checked above"),
            _ => Type::Union(deduped),
        }
    }

    /// `List<Char>` and `String` are the same runtime shape; this is the
    /// display-only alias named in the §3.1 invariant — unification treats
    /// them as equal because `head()`/structural comparison never consult
    /// this helper, only the pretty-printer does.
    pub fn is_string_shape(&self) -> bool {
        match self {
            Type::Constant { name, .. } if name == "String" => true,
            Type::Application { ctor, args } if args.len() == 1 => {
                matches!(ctor.as_ref(), Type::Constant { name, .. } if name == "List")
                    && matches!(args[0], Type::Constant { ref name, .. } if name == "Char")
            }
            _ => false,
        }
    }

    /// The head constructor name used for trait dispatch-by-receiver-type
    /// and for exhaustiveness checking against an ADT's constructor set.
    pub fn head_name(&self) -> Option<&str> {
        match self {
            Type::Constant { name, .. } => Some(name),
            Type::Application { ctor, .. } => ctor.head_name(),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_string_shape() {
            return write!(f, "String");
        }
        match self {
            Type::Variable { name, .. } => write!(f, "{name}"),
            Type::Constant { name, .. } => write!(f, "{name}"),
            Type::Application { ctor, args } => {
                write!(f, "{ctor}<")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ">")
            }
            Type::Function(ft) => {
                write!(f, "(")?;
                for (i, p) in ft.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {}", ft.ret)
            }
            Type::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            Type::Record(r) => {
                write!(f, "{{")?;
                for (i, (name, ty)) in r.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                if let Some(row) = &r.row {
                    write!(f, " | {row}")?;
                }
                write!(f, "}}")
            }
            Type::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{m}")?;
                }
                Ok(())
            }
            Type::Forall(forall) => {
                write!(f, "forall")?;
                for v in &forall.vars {
                    write!(f, " {v}")?;
                }
                write!(f, ". {}", forall.body)
            }
            Type::TypeValue(inner) => write!(f, "Type<{inner}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_flattens_nested_app() {
        let inner = Type::apply(Type::constant("Result"), vec![Type::constant("String")]);
        let full = Type::apply(inner, vec![Type::var("e")]);
        match full {
            Type::Application { ctor, args } => {
                assert_eq!(*ctor, Type::constant("Result"));
                assert_eq!(args.len(), 2);
            }
            _ => panic!("expected Application"),
        }
    }

    #[test]
    fn union_normalizes_flat_sorted_deduped() {
        let u = Type::union(vec![
            Type::constant("Int"),
            Type::union(vec![Type::constant("String"), Type::constant("Int")]),
        ]);
        match u {
            Type::Union(members) => {
                assert_eq!(members.len(), 2);
                assert_eq!(members[0].to_string(), "Int");
                assert_eq!(members[1].to_string(), "String");
            }
            _ => panic!("expected Union"),
        }
    }

    #[test]
    fn union_singleton_collapses() {
        let u = Type::union(vec![Type::constant("Int"), Type::constant("Int")]);
        assert_eq!(u, Type::constant("Int"));
    }

    #[test]
    fn union_idempotent_under_renormalization() {
        let once = Type::union(vec![Type::constant("Bool"), Type::constant("Int")]);
        let twice = Type::union(vec![once.clone()]);
        assert_eq!(once, twice);
    }

    #[test]
    fn list_char_displays_as_string() {
        let list_char =
            Type::apply(Type::constant("List"), vec![Type::constant("Char")]);
        assert_eq!(list_char.to_string(), "String");
    }
}
