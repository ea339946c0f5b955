//! Host-level faults: the Rust-side `Result::Err` side of execution, as
//! opposed to in-language `Result`/`Option` values the program itself
//! manipulates via pattern matching or `?` (spec.md §7).

use std::rc::Rc;

use vex_bytecode::ErrorValue;

/// Builds a host-fault [`ErrorValue`] with a fixed `kind`, used for faults
/// the VM itself raises (type mismatches, arity errors, stack overflow,
/// unresolved globals) rather than ones surfaced from in-language code.
pub fn fault(kind: &str, message: impl Into<String>) -> Rc<ErrorValue> {
    Rc::new(ErrorValue::new(kind, message))
}

pub const TYPE_ERROR: &str = "TypeError";
pub const ARITY_ERROR: &str = "ArityError";
pub const NAME_ERROR: &str = "NameError";
pub const INDEX_ERROR: &str = "IndexError";
pub const STACK_OVERFLOW: &str = "StackOverflow";
pub const CANCELLED: &str = "Cancelled";
pub const MODULE_ERROR: &str = "ModuleError";
pub const PATTERN_ERROR: &str = "MatchError";
