//! Compile-time errors: everything that can go wrong turning a
//! `vex_analyzer::TypedProgram` into bytecode once type-checking has already
//! passed. These are distinct from `AnalysisError` — a well-typed program
//! can still fail here (an unresolvable global, a specialization that
//! recurses too deep) because the typed tree doesn't encode every
//! compile-time constraint the analyzer checks.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("unresolved name `{0}`")]
    UnresolvedName(String),
    #[error("too many locals in a single function (max {max})")]
    TooManyLocals { max: usize },
    #[error("generic function `{0}` has no type arguments to specialize against")]
    MissingTypeArguments(String),
    #[error("generic specialization of `{name}` recursed past depth {max}")]
    SpecializationTooDeep { name: String, max: usize },
    #[error("cannot infer a concrete instantiation for `{0}`")]
    AmbiguousInstantiation(String),
    #[error("bitwise operator `{0}` has no bytecode equivalent")]
    UnsupportedOperator(String),
    #[error("or-patterns may not bind identifiers")]
    BindingInOrPattern,
}
