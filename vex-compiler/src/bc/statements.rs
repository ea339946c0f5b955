//! Lowers a `TypedBlock`'s statements (spec.md §4.6). Every statement either
//! leaves the operand stack exactly as it found it, or (for `Let`/
//! `PatternAssign`) grows it by the locals it declares — nothing here is
//! ever itself a value, so unlike `expressions::compile_expr` there's no
//! "net one value pushed" contract to keep.

use vex_analyzer::{TypedBlock, TypedExpr, TypedExprKind, TypedStatement};
use vex_bytecode::{Constant, Instruction};

use super::error::CompileError;
use super::expressions::{compile_expr, compile_tail_expr};
use super::patterns::compile_bind;
use super::program::Compiler;
use super::scope::{emit_jump, emit_loop, patch_jump, FunctionScope};

pub(super) fn compile_block(compiler: &mut Compiler, scope: &mut FunctionScope, block: &TypedBlock) -> Result<(), CompileError> {
    for stmt in &block.statements {
        compile_statement(compiler, scope, stmt)?;
    }
    Ok(())
}

fn compile_statement(compiler: &mut Compiler, scope: &mut FunctionScope, stmt: &TypedStatement) -> Result<(), CompileError> {
    let line = 0;
    match stmt {
        TypedStatement::Let { name, value } => {
            compile_expr(compiler, scope, value)?;
            scope.declare_local(name.clone())?;
        }
        TypedStatement::Assign { target, value } => compile_assign(compiler, scope, target, value, line)?,
        TypedStatement::Return(value) => match value {
            Some(expr) => compile_tail_expr(compiler, scope, expr)?,
            None => {
                scope.chunk.emit(Instruction::Nil, line);
                scope.chunk.emit(Instruction::Return, line);
            }
        },
        TypedStatement::Expression(expr) => {
            compile_expr(compiler, scope, expr)?;
            scope.chunk.emit(Instruction::Pop, line);
        }
        TypedStatement::If { condition, then_block, else_block } => {
            compile_expr(compiler, scope, condition)?;
            let else_jump = emit_jump(&mut scope.chunk, true, line);
            scope.begin_scope();
            compile_block(compiler, scope, then_block)?;
            scope.end_scope(line);
            match else_block {
                Some(else_block) => {
                    let end_jump = emit_jump(&mut scope.chunk, false, line);
                    patch_jump(&mut scope.chunk, else_jump);
                    scope.begin_scope();
                    compile_block(compiler, scope, else_block)?;
                    scope.end_scope(line);
                    patch_jump(&mut scope.chunk, end_jump);
                }
                None => patch_jump(&mut scope.chunk, else_jump),
            }
        }
        TypedStatement::While { condition, body } => {
            let loop_start = scope.chunk.instructions.len();
            compile_expr(compiler, scope, condition)?;
            let exit_jump = emit_jump(&mut scope.chunk, true, line);
            scope.begin_scope();
            compile_block(compiler, scope, body)?;
            scope.end_scope(line);
            emit_loop(&mut scope.chunk, loop_start, line);
            patch_jump(&mut scope.chunk, exit_jump);
        }
        TypedStatement::ForIn { variable, iterable, body } => compile_for_in(compiler, scope, variable, iterable, body, line)?,
        TypedStatement::PatternAssign { pattern, value } => {
            compile_expr(compiler, scope, value)?;
            compile_bind(scope, pattern, line)?;
        }
        TypedStatement::Other => {}
    }
    Ok(())
}

fn compile_assign(compiler: &mut Compiler, scope: &mut FunctionScope, target: &TypedExpr, value: &TypedExpr, line: usize) -> Result<(), CompileError> {
    match &target.kind {
        TypedExprKind::Ident { name, .. } => {
            compile_expr(compiler, scope, value)?;
            if let Some(slot) = scope.resolve_local(name) {
                scope.chunk.emit(Instruction::SetLocal(slot), line);
            } else if let Some(slot) = scope.resolve_upvalue(name) {
                scope.chunk.emit(Instruction::SetUpvalue(slot), line);
            } else {
                let idx = scope.chunk.add_constant(Constant::Str(name.clone()));
                scope.chunk.emit(Instruction::SetGlobal(idx), line);
            }
            // `SetLocal`/`SetUpvalue`/`SetGlobal` all peek rather than pop,
            // leaving the assigned value as if the assignment were itself
            // an expression; an assignment statement has no use for it.
            scope.chunk.emit(Instruction::Pop, line);
        }
        TypedExprKind::FieldAccess { object, field } => {
            compile_expr(compiler, scope, object)?;
            compile_expr(compiler, scope, value)?;
            let idx = scope.chunk.add_constant(Constant::Str(field.clone()));
            scope.chunk.emit(Instruction::SetField(idx), line);
        }
        TypedExprKind::Index { object, index } => {
            compile_expr(compiler, scope, object)?;
            compile_expr(compiler, scope, index)?;
            compile_expr(compiler, scope, value)?;
            scope.chunk.emit(Instruction::SetIndex, line);
            // `SetIndex` pushes the mutated collection back; discard it.
            scope.chunk.emit(Instruction::Pop, line);
        }
        other => return Err(CompileError::UnresolvedName(format!("{other:?} is not an assignable place"))),
    }
    Ok(())
}

/// No iterator protocol exists at the bytecode level, so `for x in xs` is
/// lowered to an index-counted loop over `xs` via `Len`/`GetIndex` — the
/// same instructions a hand-written indexed loop would use.
fn compile_for_in(compiler: &mut Compiler, scope: &mut FunctionScope, variable: &str, iterable: &TypedExpr, body: &TypedBlock, line: usize) -> Result<(), CompileError> {
    compile_expr(compiler, scope, iterable)?;
    scope.begin_scope();
    let collection_slot = scope.declare_local("<for-collection>")?;

    scope.chunk.emit(Instruction::GetLocal(collection_slot), line);
    scope.chunk.emit(Instruction::Len, line);
    let len_slot = scope.declare_local("<for-len>")?;

    let zero_idx = scope.chunk.add_constant(Constant::Integer(0));
    scope.chunk.emit(Instruction::Constant(zero_idx), line);
    let index_slot = scope.declare_local("<for-index>")?;

    let loop_start = scope.chunk.instructions.len();
    scope.chunk.emit(Instruction::GetLocal(index_slot), line);
    scope.chunk.emit(Instruction::GetLocal(len_slot), line);
    scope.chunk.emit(Instruction::Lt, line);
    let exit_jump = emit_jump(&mut scope.chunk, true, line);

    scope.chunk.emit(Instruction::GetLocal(collection_slot), line);
    scope.chunk.emit(Instruction::GetLocal(index_slot), line);
    scope.chunk.emit(Instruction::GetIndex, line);
    scope.begin_scope();
    scope.declare_local(variable.to_string())?;
    compile_block(compiler, scope, body)?;
    scope.end_scope(line);

    scope.chunk.emit(Instruction::GetLocal(index_slot), line);
    let one_idx = scope.chunk.add_constant(Constant::Integer(1));
    scope.chunk.emit(Instruction::Constant(one_idx), line);
    scope.chunk.emit(Instruction::Add, line);
    scope.chunk.emit(Instruction::SetLocal(index_slot), line);
    scope.chunk.emit(Instruction::Pop, line);

    emit_loop(&mut scope.chunk, loop_start, line);
    patch_jump(&mut scope.chunk, exit_jump);
    scope.end_scope(line);
    Ok(())
}
