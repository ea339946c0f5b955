//! Compile-time type representation, substitution, kinds and unification.
//!
//! This crate is the type-system core described by the analyzer: it owns no
//! AST and no symbol table, only the algebra of `Type`/`Kind` values and the
//! operations defined over them (substitution, free variables, unification).
//! The analyzer (`vex-analyzer`) drives this algebra against a typed AST; the
//! bytecode compiler (`vex-compiler`) reads the resulting substitutions back
//! off the analyzer's node map to choose monomorphizations.

pub mod error;
pub mod kind;
pub mod scheme;
pub mod subst;
pub mod ty;
pub mod unify;

pub use error::TypeError;
pub use kind::Kind;
pub use scheme::Scheme;
pub use subst::Substitution;
pub use ty::{Constraint, FunctionType, RecordType, Type};
pub use unify::{unify, unify_allow_extra, AliasResolver};
