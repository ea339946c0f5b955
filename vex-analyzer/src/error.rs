use thiserror::Error;
use vex_diagnostics::Span;
use vex_symbols::SymbolError;
use vex_types::TypeError;

/// One non-fatal analysis failure, carrying enough to render a diagnostic.
/// The analyzer never stops walking the tree on these — it records them and
/// continues, so an IDE-style host still gets types/resolutions for the
/// parts of the program that do check out (spec.md §7).
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error("{0}")]
    Type(#[from] TypeError),
    #[error("{0}")]
    Symbol(#[from] SymbolError),
    #[error("non-exhaustive match: missing {missing:?}")]
    NonExhaustiveMatch { missing: Vec<String> },
    #[error("unsupported pattern in assignment")]
    RefutablePatternInAssignment,
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("`{0}` is not a trait")]
    NotATrait(String),
    #[error("wrong number of arguments: expected {expected}, found {found}")]
    Arity { expected: usize, found: usize },
}

#[derive(Debug, Clone)]
pub struct Located {
    pub error: AnalysisError,
    pub span: Span,
}
