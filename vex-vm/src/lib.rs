//! The stack-based bytecode virtual machine (spec.md §4.7, §4.8): executes
//! `vex_bytecode::Chunk`s compiled by `vex-compiler`, with closures and
//! upvalues, cooperative cancellation, a synchronous module loader, and a
//! host embedding surface (`compile`/`run`/`register_builtin`/
//! `set_cancellation_token`, spec.md §6.4).
//!
//! This crate has no dependency on `vex-compiler` — it only knows how to run
//! an already-compiled [`vex_bytecode::FunctionDescriptor`]. A host wires
//! compilation and execution together (see `vex-cli`).

mod builtins;
mod cancellation;
mod error;
mod frame;
mod module_loader;
mod upvalues;
mod vm;

pub use cancellation::CancellationToken;
pub use module_loader::ModuleSource;
pub use vm::Vm;
