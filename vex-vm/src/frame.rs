use std::rc::Rc;

use vex_bytecode::Closure;

/// One activation record (spec.md §4.7: "closure-or-function, chunk, ip,
/// base, open-upvalue-list"). The open-upvalue list itself is owned by the
/// [`crate::vm::Vm`], not the frame, since closing an upvalue needs to find
/// it by stack slot across whichever frame captured it.
pub struct CallFrame {
    pub closure: Rc<Closure>,
    pub ip: usize,
    /// Index into the VM's shared value stack where this frame's locals
    /// (param 0, then declared locals) begin.
    pub base: usize,
}

impl CallFrame {
    pub fn new(closure: Rc<Closure>, base: usize) -> Self {
        Self { closure, ip: 0, base }
    }

    pub fn chunk(&self) -> &vex_bytecode::Chunk {
        &self.closure.descriptor.chunk
    }
}
