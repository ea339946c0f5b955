//! Symbol-table and trait-registry errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SymbolError {
    #[error("unresolved identifier `{0}`")]
    Unresolved(String),

    #[error("`{0}` is already defined in this scope")]
    AlreadyDefined(String),

    #[error("unknown trait `{0}`")]
    UnknownTrait(String),

    #[error("no instance of `{trait_name}` found for `{head}`")]
    NoInstance { trait_name: String, head: String },

    #[error("multiple instances of `{trait_name}` apply to `{head}`, resolution is ambiguous")]
    AmbiguousInstance { trait_name: String, head: String },

    #[error("method `{method}` on trait `{trait_name}` has no dispatch strategy and no receiver type hint was given")]
    MissingDispatchHint { trait_name: String, method: String },

    #[error("instance of `{trait_name}` for `{head}` implements neither `{method}` nor inherits a default")]
    MethodNotImplemented { trait_name: String, head: String, method: String },
}
