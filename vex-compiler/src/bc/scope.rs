//! Per-function compile-time state: the chunk being built, the local-slot
//! stack and the upvalue list, plus a link to the enclosing function's scope
//! for resolving captures (spec.md §4.6/§4.7).
//!
//! This mirrors the teacher's `scope_management.rs` push/pop idiom, but
//! tracks stack *slots* rather than RAII cleanup obligations: a local is a
//! position on the VM's operand stack, and closing a block scope means
//! emitting one `Pop` per local that goes out of scope.

use vex_bytecode::{Chunk, Instruction, UpvalueDescriptor};

const MAX_LOCALS: usize = u16::MAX as usize;

pub(super) struct Local {
    pub name: String,
    pub depth: usize,
}

pub(super) struct FunctionScope {
    pub chunk: Chunk,
    pub locals: Vec<Local>,
    pub scope_depth: usize,
    pub upvalues: Vec<UpvalueDescriptor>,
    pub upvalue_names: Vec<String>,
    pub enclosing: Option<Box<FunctionScope>>,
    pub function_name: String,
}

impl FunctionScope {
    pub fn new(function_name: impl Into<String>, enclosing: Option<Box<FunctionScope>>) -> Self {
        Self {
            chunk: Chunk::new(),
            locals: Vec::new(),
            scope_depth: 0,
            upvalues: Vec::new(),
            upvalue_names: Vec::new(),
            enclosing,
            function_name: function_name.into(),
        }
    }

    /// Reserves the next stack slot for a parameter; parameters live at
    /// depth 0 and are never popped by `end_scope` (the caller's `Call`
    /// bookkeeping owns their lifetime).
    pub fn declare_param(&mut self, name: impl Into<String>) -> u16 {
        self.locals.push(Local { name: name.into(), depth: 0 });
        (self.locals.len() - 1) as u16
    }

    /// Declares a local at the current scope depth for a value already
    /// sitting on top of the operand stack. Returns its slot index.
    pub fn declare_local(&mut self, name: impl Into<String>) -> Result<u16, super::error::CompileError> {
        if self.locals.len() >= MAX_LOCALS {
            return Err(super::error::CompileError::TooManyLocals { max: MAX_LOCALS });
        }
        self.locals.push(Local { name: name.into(), depth: self.scope_depth });
        Ok((self.locals.len() - 1) as u16)
    }

    pub fn resolve_local(&self, name: &str) -> Option<u16> {
        self.locals.iter().rposition(|l| l.name == name).map(|i| i as u16)
    }

    /// Walks the enclosing-function chain, registering an upvalue in every
    /// scope between the defining one and this one (the clox
    /// "flatten closures" scheme).
    pub fn resolve_upvalue(&mut self, name: &str) -> Option<u16> {
        let enclosing = self.enclosing.as_deref_mut()?;
        if let Some(local_slot) = enclosing.resolve_local(name) {
            return Some(self.add_upvalue(name, UpvalueDescriptor { is_local: true, index: local_slot }));
        }
        let outer_upvalue = enclosing.resolve_upvalue(name)?;
        Some(self.add_upvalue(name, UpvalueDescriptor { is_local: false, index: outer_upvalue }))
    }

    fn add_upvalue(&mut self, name: &str, descriptor: UpvalueDescriptor) -> u16 {
        if let Some(pos) = self.upvalue_names.iter().position(|n| n == name) {
            return pos as u16;
        }
        self.upvalues.push(descriptor);
        self.upvalue_names.push(name.to_string());
        (self.upvalues.len() - 1) as u16
    }

    pub fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    /// Closes the innermost scope, emitting one `Pop` per local it
    /// introduced and removing them from the compiler's view.
    pub fn end_scope(&mut self, line: usize) {
        self.scope_depth -= 1;
        while self.locals.last().is_some_and(|l| l.depth > self.scope_depth) {
            self.locals.pop();
            self.chunk.emit(Instruction::Pop, line);
        }
    }

    /// Save point for manual (non-bytecode-emitting) local-count rollback,
    /// used by match-arm compilation where cleanup bytecode is emitted by
    /// hand rather than by `end_scope` (see `patterns.rs`).
    pub fn mark(&self) -> usize {
        self.locals.len()
    }

    pub fn truncate_to(&mut self, mark: usize) {
        self.locals.truncate(mark);
    }

    pub fn local_count(&self) -> usize {
        self.locals.len()
    }
}

pub(super) fn emit_jump(chunk: &mut Chunk, conditional: bool, line: usize) -> usize {
    if conditional {
        chunk.emit(Instruction::JumpIfFalse(0), line)
    } else {
        chunk.emit(Instruction::Jump(0), line)
    }
}

pub(super) fn patch_jump(chunk: &mut Chunk, index: usize) {
    let target = chunk.instructions.len() as i32;
    let offset = target - (index as i32 + 1);
    chunk.patch_jump(index, offset);
}

pub(super) fn emit_loop(chunk: &mut Chunk, loop_start: usize, line: usize) {
    let loop_index = chunk.emit(Instruction::Loop(0), line);
    let offset = (loop_index as i32 + 1) - loop_start as i32;
    chunk.instructions[loop_index] = Instruction::Loop(offset as u32);
}
