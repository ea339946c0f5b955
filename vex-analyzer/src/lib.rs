//! The semantic analysis pass: Hindley-Milner inference with row
//! polymorphism and trait-bounded generics, exhaustiveness checking, and
//! name resolution over a parsed `vex_ast::Program` (spec.md §4.5).
//!
//! A lexer, parser and the surface-syntax `vex_ast` tree are assumed to
//! already exist upstream of this crate; it consumes `vex_ast::Program` and
//! produces a [`typed::TypedProgram`] plus a `vex_diagnostics::DiagnosticEngine`
//! a downstream compiler or LSP host can render.

mod analyze;
pub mod config;
pub mod convert;
pub mod error;
pub mod exhaustiveness;
pub mod patterns;
pub mod typed;

pub use analyze::Analyzer;
pub use config::AnalyzerConfig;
pub use error::{AnalysisError, Located};
pub use typed::{
    NodeId, TypedBlock, TypedExpr, TypedExprKind, TypedFunction, TypedItem, TypedMatchArm,
    TypedParam, TypedPattern, TypedPatternKind, TypedProgram, TypedStatement,
};

use vex_ast::Program;
use vex_diagnostics::{DiagnosticEngine, SpanMap};
use vex_symbols::SymbolTable;

/// Runs a full analysis pass over `program` with default settings. Most
/// callers want [`analyze_with`] to supply a [`SpanMap`] for diagnostics that
/// point at source locations. The returned [`SymbolTable`] carries the
/// trait/instance registry a downstream compiler consults for monomorphized
/// trait dispatch.
pub fn analyze(program: &Program) -> (TypedProgram, SymbolTable, DiagnosticEngine) {
    Analyzer::new(AnalyzerConfig::default()).run(program)
}

pub fn analyze_with(
    program: &Program,
    config: AnalyzerConfig,
    span_map: SpanMap,
) -> (TypedProgram, SymbolTable, DiagnosticEngine) {
    Analyzer::new(config).with_span_map(span_map).run(program)
}
