//! Lowers `vex_ast::Type` — the surface syntax for type annotations — into
//! `vex_types::Type`, the representation the unifier and symbol table work
//! over.
//!
//! The two don't line up one-to-one. `vex_ast::Type::Named` is ambiguous
//! between a type variable (an in-scope generic parameter) and a nominal
//! type constructor; only the set of type parameters in scope at the
//! annotation's use site disambiguates it. A handful of teacher-only forms
//! (`Reference`, `Box`, raw pointers) have no counterpart in a garbage
//! collected, reference-counted runtime and are lowered transparently; see
//! DESIGN.md for the full list of simplifications.

use std::collections::BTreeSet;

use vex_types::ty::{FunctionType, RecordType};
use vex_types::Type;

pub fn lower(ast_ty: &vex_ast::Type, type_params: &BTreeSet<String>) -> Type {
    use vex_ast::Type as A;
    match ast_ty {
        A::I8 => Type::constant("I8"),
        A::I16 => Type::constant("I16"),
        A::I32 => Type::constant("I32"),
        A::I64 => Type::constant("Int"),
        A::I128 => Type::constant("I128"),
        A::U8 => Type::constant("U8"),
        A::U16 => Type::constant("U16"),
        A::U32 => Type::constant("U32"),
        A::U64 => Type::constant("U64"),
        A::U128 => Type::constant("U128"),
        A::F32 => Type::constant("F32"),
        A::F64 => Type::constant("Float"),
        A::F128 => Type::constant("F128"),
        A::Bool => Type::constant("Boolean"),
        A::String => Type::constant("String"),
        A::Byte => Type::constant("Byte"),
        A::Error => Type::constant("Error"),
        A::Nil => Type::constant("Nil"),

        A::Named(name) => {
            if type_params.contains(name) {
                Type::var(name.clone())
            } else {
                Type::constant(name.clone())
            }
        }

        A::Generic { name, type_args } => {
            let args: Vec<Type> = type_args.iter().map(|t| lower(t, type_params)).collect();
            if args.is_empty() {
                lower(&A::Named(name.clone()), type_params)
            } else {
                Type::apply(Type::constant(name.clone()), args)
            }
        }

        // Arrays/slices carry element type and drop the fixed-size/mutability
        // dimension: the runtime value universe has one growable list shape
        // (spec.md §3.3), not sized arrays or borrow-checked slices.
        A::Array(inner, _) | A::Slice(inner, _) => {
            Type::apply(Type::constant("List"), vec![lower(inner, type_params)])
        }

        // A managed runtime has no separate reference type; `&T`/`&mut T`
        // annotations are transparent.
        A::Reference(inner, _) => lower(inner, type_params),

        A::Union(members) => Type::union(members.iter().map(|t| lower(t, type_params)).collect()),

        // Intersection types have no HM counterpart; approximate with the
        // first member rather than reject the annotation outright.
        A::Intersection(members) => {
            members.first().map(|t| lower(t, type_params)).unwrap_or_else(|| Type::constant("Nil"))
        }

        A::Tuple(members) => Type::Tuple(members.iter().map(|t| lower(t, type_params)).collect()),

        A::Function { params, return_type } => Type::func(
            params.iter().map(|t| lower(t, type_params)).collect(),
            lower(return_type, type_params),
        ),

        // Compile-time conditional types (`T extends U ? X : Y`) require a
        // const-eval layer this runtime doesn't have; default to the false
        // branch, which is what a non-matching instantiation would resolve
        // to for a monomorphic caller.
        A::Conditional { false_type, .. } => lower(false_type, type_params),

        A::Infer(name) => Type::var(name.clone()),

        // `typeof(expr)` needs the expression's inferred type, which isn't
        // available from a bare `Type` node; the caller resolves this case
        // directly against the analyzer's node type map instead of going
        // through `lower`.
        A::Typeof(_) => Type::var("typeof"),

        A::Unit => Type::Tuple(Vec::new()),
        A::Never => Type::constant("Never"),

        // FFI-only; the pointee type isn't tracked, matching the fact that
        // extern blocks are opaque to the core type system (spec.md's
        // explicit Non-goal on the `ext` binding tool).
        A::RawPtr { .. } => Type::constant("RawPtr"),

        A::Option(inner) => Type::apply(Type::constant("Option"), vec![lower(inner, type_params)]),
        A::Result(ok, err) => {
            Type::apply(Type::constant("Result"), vec![lower(ok, type_params), lower(err, type_params)])
        }
        A::Vec(inner) => Type::apply(Type::constant("List"), vec![lower(inner, type_params)]),
        // Everything in the value universe is already heap-allocated behind
        // an `Rc`; `Box<T>` only exists in source to let recursive type
        // definitions terminate, so it's transparent here.
        A::Box(inner) => lower(inner, type_params),
        A::Channel(inner) => Type::apply(Type::constant("Channel"), vec![lower(inner, type_params)]),

        A::Record { fields, row } => Type::Record(RecordType {
            fields: fields.iter().map(|(name, ty)| (name.clone(), lower(ty, type_params))).collect(),
            row: row.clone(),
            is_open: row.is_some(),
        }),
    }
}

/// Convenience for building the `Type::Function` case without importing
/// `FunctionType` at every call site.
pub fn function_type(params: Vec<Type>, ret: Type) -> FunctionType {
    FunctionType { params, ret: Box::new(ret), variadic: false, default_count: 0, constraints: Vec::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_type_param_in_scope_becomes_a_variable() {
        let mut scope = BTreeSet::new();
        scope.insert("T".to_string());
        assert_eq!(lower(&vex_ast::Type::Named("T".to_string()), &scope), Type::var("T"));
    }

    #[test]
    fn named_type_not_in_scope_becomes_a_constant() {
        let scope = BTreeSet::new();
        assert_eq!(lower(&vex_ast::Type::Named("Point".to_string()), &scope), Type::constant("Point"));
    }

    #[test]
    fn option_lowers_to_application() {
        let scope = BTreeSet::new();
        let lowered = lower(&vex_ast::Type::Option(Box::new(vex_ast::Type::I64)), &scope);
        assert_eq!(lowered, Type::apply(Type::constant("Option"), vec![Type::constant("Int")]));
    }

    #[test]
    fn reference_is_transparent() {
        let scope = BTreeSet::new();
        let lowered = lower(&vex_ast::Type::Reference(Box::new(vex_ast::Type::Bool), false), &scope);
        assert_eq!(lowered, Type::constant("Boolean"));
    }
}
