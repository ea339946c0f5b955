//! Structured type-system errors (spec.md §7's kind/type error kinds).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeError {
    #[error("mismatched types: expected `{expected}`, found `{found}`")]
    Mismatch { expected: String, found: String },

    #[error("infinite type: `{var}` occurs in `{ty}`")]
    Occurs { var: String, ty: String },

    #[error("arity mismatch: expected {expected} arguments, found {found}")]
    Arity { expected: usize, found: usize },

    #[error("missing field `{field}` in record type `{ty}`")]
    MissingField { field: String, ty: String },

    #[error("kind mismatch: expected `{expected}`, found `{found}`")]
    KindMismatch { expected: String, found: String },

    #[error("`{ty}` does not satisfy the `{trait_name}` constraint")]
    UnsatisfiedConstraint { ty: String, trait_name: String },

    #[error("ambiguous instance for `{trait_name}` on `{ty}`")]
    AmbiguousInstance { ty: String, trait_name: String },
}
