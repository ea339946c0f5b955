//! Shared bytecode representation: the compiled [`Chunk`] format the
//! compiler emits and the VM executes, and the runtime [`value::Value`]
//! universe both operate over (spec.md §3.3, §3.4).

pub mod chunk;
pub mod value;

pub use chunk::{Chunk, Constant, DefaultValue, FunctionDescriptor, Instruction, PendingImport, UpvalueDescriptor};
pub use value::{Builtin, Closure, ErrorValue, HostContext, MapKey, Task, Upvalue, Value};
