pub mod bc; // Bytecode compiler: TypedProgram -> vex_bytecode::Chunk

// Re-export diagnostics from vex-diagnostics crate
pub use vex_diagnostics as diagnostics;

pub use bc::{compile_program, CompileError, CompiledProgram};
pub use diagnostics::{error_codes, Diagnostic, DiagnosticEngine, ErrorLevel, Span};
