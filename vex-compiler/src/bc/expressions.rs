//! Lowers a `TypedExpr` to bytecode that leaves exactly one value on top of
//! stack (spec.md §4.6). [`compile_tail_expr`] is the one exception: it
//! drives a function body (or expression-bodied closure) all the way to a
//! `Return`/`TailCall`, since only it knows whether the expression it was
//! handed IS the function's return value.

use vex_analyzer::{TypedExpr, TypedExprKind};
use vex_ast::{BinaryOp, UnaryOp};
use vex_bytecode::{Constant, Instruction};
use vex_types::Type;

use super::error::CompileError;
use super::patterns::{compile_bind, compile_test};
use super::program::Compiler;
use super::scope::{emit_jump, patch_jump, FunctionScope};

/// Compiles `expr`, leaving exactly one value on top of stack. Never itself
/// returns from the enclosing function.
pub(super) fn compile_expr(compiler: &mut Compiler, scope: &mut FunctionScope, expr: &TypedExpr) -> Result<(), CompileError> {
    let line = 0;
    match &expr.kind {
        TypedExprKind::IntLiteral(i) => push_constant(scope, Constant::Integer(*i), line),
        TypedExprKind::BigIntLiteral(s) => {
            let value = s.parse().map_err(|_| CompileError::AmbiguousInstantiation(s.clone()))?;
            push_constant(scope, Constant::BigInt(value), line);
        }
        TypedExprKind::FloatLiteral(f) => push_constant(scope, Constant::Float(*f), line),
        TypedExprKind::StringLiteral(s) => push_constant(scope, Constant::Str(s.clone()), line),
        TypedExprKind::CharLiteral(c) => push_constant(scope, Constant::Char(*c), line),
        TypedExprKind::BoolLiteral(true) => {
            scope.chunk.emit(Instruction::True, line);
        }
        TypedExprKind::BoolLiteral(false) => {
            scope.chunk.emit(Instruction::False, line);
        }
        TypedExprKind::Nil => {
            scope.chunk.emit(Instruction::Nil, line);
        }

        TypedExprKind::Ident { name, .. } => compile_ident(scope, name, line),

        TypedExprKind::Binary { left, op, right } => {
            compile_expr(compiler, scope, left)?;
            compile_expr(compiler, scope, right)?;
            let instruction = binary_instruction(op, &left.ty)?;
            scope.chunk.emit(instruction, line);
        }
        TypedExprKind::Unary { op, expr: inner } => {
            compile_expr(compiler, scope, inner)?;
            match op {
                UnaryOp::Neg => {
                    scope.chunk.emit(Instruction::Neg, line);
                }
                UnaryOp::Not => {
                    scope.chunk.emit(Instruction::Not, line);
                }
                // This VM's values carry no raw pointers to dereference;
                // `&x`/`*x` are identities over it.
                UnaryOp::Ref | UnaryOp::Deref => {}
            }
        }

        TypedExprKind::Call { func, args } => compile_call(compiler, scope, expr, func, args, false)?,

        TypedExprKind::MethodCall { receiver, method, args, resolved } => {
            compile_method_call(compiler, scope, receiver, method, args, resolved, false)?
        }

        TypedExprKind::FieldAccess { object, field } => {
            compile_expr(compiler, scope, object)?;
            let idx = scope.chunk.add_constant(Constant::Str(field.clone()));
            scope.chunk.emit(Instruction::GetField(idx), line);
        }
        TypedExprKind::Index { object, index } => {
            compile_expr(compiler, scope, object)?;
            compile_expr(compiler, scope, index)?;
            scope.chunk.emit(Instruction::GetIndex, line);
        }
        TypedExprKind::Tuple(items) => {
            for item in items {
                compile_expr(compiler, scope, item)?;
            }
            scope.chunk.emit(Instruction::MakeTuple(items.len() as u32), line);
        }
        TypedExprKind::List(items) => {
            for item in items {
                compile_expr(compiler, scope, item)?;
            }
            scope.chunk.emit(Instruction::MakeList(items.len() as u32), line);
        }
        TypedExprKind::RecordLiteral { fields, spread } => match spread {
            None => {
                for (name, value) in fields {
                    push_constant(scope, Constant::Str(name.clone()), line);
                    compile_expr(compiler, scope, value)?;
                }
                scope.chunk.emit(Instruction::MakeRecord { type_name: None, field_count: fields.len() as u32 }, line);
            }
            Some(base) => {
                compile_expr(compiler, scope, base)?;
                for (name, value) in fields {
                    push_constant(scope, Constant::Str(name.clone()), line);
                    compile_expr(compiler, scope, value)?;
                }
                scope.chunk.emit(Instruction::ExtendRecord(fields.len() as u32), line);
            }
        },
        TypedExprKind::StructLiteral { name, fields } => {
            for (fname, value) in fields {
                push_constant(scope, Constant::Str(fname.clone()), line);
                compile_expr(compiler, scope, value)?;
            }
            let name_idx = scope.chunk.add_constant(Constant::Str(name.clone()));
            scope.chunk.emit(Instruction::MakeRecord { type_name: Some(name_idx), field_count: fields.len() as u32 }, line);
        }
        TypedExprKind::EnumLiteral { enum_name, variant, data } => {
            for item in data {
                compile_expr(compiler, scope, item)?;
            }
            let type_idx = scope.chunk.add_constant(Constant::Str(enum_name.clone()));
            let ctor_idx = scope.chunk.add_constant(Constant::Str(variant.clone()));
            scope.chunk.emit(Instruction::MakeAdt { type_name: type_idx, constructor: ctor_idx, payload_count: data.len() as u32 }, line);
        }
        TypedExprKind::Match { value, arms } => compile_match(compiler, scope, value, arms, line)?,
        TypedExprKind::Block(block, trailing) => compile_block_expr(compiler, scope, block, trailing.as_deref(), line)?,
        TypedExprKind::Closure { params, body } => compile_closure_expr(compiler, scope, params, body, line)?,
        TypedExprKind::QuestionMark(inner) => {
            compile_expr(compiler, scope, inner)?;
            scope.chunk.emit(Instruction::UnwrapOrReturn, line);
        }
        // `a |> f` and `a >>= f` both desugar to a unary call of `f` applied
        // to `a`; neither introduces anything a plain `Call` doesn't already
        // cover once lowered this far.
        TypedExprKind::Pipe { left, right } | TypedExprKind::Bind { left, right } => {
            compile_expr(compiler, scope, right)?;
            compile_expr(compiler, scope, left)?;
            scope.chunk.emit(Instruction::Call(1), line);
        }
        TypedExprKind::Opaque => {
            scope.chunk.emit(Instruction::Nil, line);
        }
    }
    Ok(())
}

fn push_constant(scope: &mut FunctionScope, constant: Constant, line: usize) {
    let idx = scope.chunk.add_constant(constant);
    scope.chunk.emit(Instruction::Constant(idx), line);
}

fn compile_ident(scope: &mut FunctionScope, name: &str, line: usize) {
    if let Some(slot) = scope.resolve_local(name) {
        scope.chunk.emit(Instruction::GetLocal(slot), line);
        return;
    }
    if let Some(slot) = scope.resolve_upvalue(name) {
        scope.chunk.emit(Instruction::GetUpvalue(slot), line);
        return;
    }
    let idx = scope.chunk.add_constant(Constant::Str(name.to_string()));
    scope.chunk.emit(Instruction::GetGlobal(idx), line);
}

fn binary_instruction(op: &BinaryOp, left_ty: &Type) -> Result<Instruction, CompileError> {
    Ok(match op {
        BinaryOp::Add if left_ty.is_string_shape() => Instruction::Concat,
        BinaryOp::Add => Instruction::Add,
        BinaryOp::Sub => Instruction::Sub,
        BinaryOp::Mul => Instruction::Mul,
        BinaryOp::Div => Instruction::Div,
        BinaryOp::Mod => Instruction::Rem,
        BinaryOp::Eq => Instruction::Eq,
        BinaryOp::NotEq => Instruction::NotEq,
        BinaryOp::Lt => Instruction::Lt,
        BinaryOp::LtEq => Instruction::LtEq,
        BinaryOp::Gt => Instruction::Gt,
        BinaryOp::GtEq => Instruction::GtEq,
        BinaryOp::And => Instruction::And,
        BinaryOp::Or => Instruction::Or,
        BinaryOp::BitAnd => return Err(CompileError::UnsupportedOperator("&".to_string())),
        BinaryOp::BitOr => return Err(CompileError::UnsupportedOperator("|".to_string())),
        BinaryOp::BitXor => return Err(CompileError::UnsupportedOperator("^".to_string())),
        BinaryOp::Shl => return Err(CompileError::UnsupportedOperator("<<".to_string())),
        BinaryOp::Shr => return Err(CompileError::UnsupportedOperator(">>".to_string())),
    })
}

/// Resolves a `Call`'s callee, specializing it through
/// [`Compiler::request_specialization`] first if it names a generic
/// top-level function not shadowed by a local; otherwise compiles the
/// callee expression as-is (a local/upvalue/global holding an ordinary
/// closure value).
fn compile_callee(
    compiler: &mut Compiler,
    scope: &mut FunctionScope,
    call: &TypedExpr,
    func: &TypedExpr,
    args: &[TypedExpr],
    line: usize,
) -> Result<(), CompileError> {
    if let TypedExprKind::Ident { name, .. } = &func.kind {
        if scope.resolve_local(name).is_none() {
            if let Some(def) = compiler.functions.get(name.as_str()).copied() {
                if def.scheme.is_polymorphic() {
                    let arg_types: Vec<Type> = args.iter().map(|a| a.ty.clone()).collect();
                    let type_args = Compiler::infer_type_args(def, &arg_types, &call.ty)?;
                    let mangled = compiler.request_specialization(name, type_args)?;
                    let idx = scope.chunk.add_constant(Constant::Str(mangled));
                    scope.chunk.emit(Instruction::GetGlobal(idx), line);
                    return Ok(());
                }
            }
        }
    }
    compile_expr(compiler, scope, func)
}

fn compile_call(
    compiler: &mut Compiler,
    scope: &mut FunctionScope,
    call: &TypedExpr,
    func: &TypedExpr,
    args: &[TypedExpr],
    tail: bool,
) -> Result<(), CompileError> {
    let line = 0;
    compile_callee(compiler, scope, call, func, args, line)?;
    for arg in args {
        compile_expr(compiler, scope, arg)?;
    }
    if tail {
        scope.chunk.emit(Instruction::TailCall(args.len() as u16), line);
    } else {
        scope.chunk.emit(Instruction::Call(args.len() as u16), line);
    }
    Ok(())
}

/// Trait method dispatch is resolved statically by the analyzer (see
/// `vex-symbols`'s `ResolvedMethod`); a resolved call is just a plain call to
/// that instance's function with the receiver prepended as the first
/// argument. An unresolved call (no static instance, default-method lookup
/// deferred) falls back to looking up `method` as a bare global, which only
/// works for the single-instance case but keeps this from silently
/// miscompiling.
fn compile_method_call(
    compiler: &mut Compiler,
    scope: &mut FunctionScope,
    receiver: &TypedExpr,
    method: &str,
    args: &[TypedExpr],
    resolved: &Option<vex_symbols::Symbol>,
    tail: bool,
) -> Result<(), CompileError> {
    let line = 0;
    let callee_name = resolved.as_ref().map(|s| s.name.clone()).unwrap_or_else(|| method.to_string());
    let idx = scope.chunk.add_constant(Constant::Str(callee_name));
    scope.chunk.emit(Instruction::GetGlobal(idx), line);
    compile_expr(compiler, scope, receiver)?;
    for arg in args {
        compile_expr(compiler, scope, arg)?;
    }
    let argc = 1 + args.len();
    if tail {
        scope.chunk.emit(Instruction::TailCall(argc as u16), line);
    } else {
        scope.chunk.emit(Instruction::Call(argc as u16), line);
    }
    Ok(())
}

fn compile_block_expr(
    compiler: &mut Compiler,
    scope: &mut FunctionScope,
    block: &vex_analyzer::TypedBlock,
    trailing: Option<&TypedExpr>,
    line: usize,
) -> Result<(), CompileError> {
    scope.begin_scope();
    let mark = scope.mark();
    super::statements::compile_block(compiler, scope, block)?;
    match trailing {
        Some(t) => compile_expr(compiler, scope, t)?,
        None => {
            scope.chunk.emit(Instruction::Nil, line);
        }
    }
    let introduced = scope.local_count() - mark;
    if introduced > 0 {
        scope.chunk.emit(Instruction::PopBelow { depth: introduced as u16 }, line);
    }
    scope.truncate_to(mark);
    scope.scope_depth -= 1;
    Ok(())
}

fn compile_closure_expr(compiler: &mut Compiler, scope: &mut FunctionScope, params: &[String], body: &TypedExpr, line: usize) -> Result<(), CompileError> {
    let enclosing = std::mem::replace(scope, FunctionScope::new("<closure>", None));
    let (descriptor, upvalues, enclosing) = super::function::compile_closure(compiler, enclosing, params, body, "<closure>")?;
    *scope = enclosing;
    let fn_idx = scope.chunk.add_constant(Constant::Function(descriptor));
    scope.chunk.emit(Instruction::Closure { function: fn_idx, upvalues }, line);
    Ok(())
}

/// Compiles the scrutinee once into a dedicated local, then each arm tests
/// and (on success) binds against fresh copies of it, in test-then-bind
/// fashion (see `patterns.rs`). Every arm's failure paths (pattern-test
/// failure and, if present, a false guard after its bindings are stripped)
/// converge on the same per-arm fail label, which becomes the next arm's
/// entry point — or, for the last arm, a defensive fallback.
fn compile_match(
    compiler: &mut Compiler,
    scope: &mut FunctionScope,
    value: &TypedExpr,
    arms: &[vex_analyzer::TypedMatchArm],
    line: usize,
) -> Result<(), CompileError> {
    compile_expr(compiler, scope, value)?;
    scope.begin_scope();
    let scrutinee_mark = scope.mark();
    let scrutinee_slot = scope.declare_local("<scrutinee>")?;

    let mut end_jumps = Vec::new();
    let mut pending_fail: Vec<usize> = Vec::new();

    for (i, arm) in arms.iter().enumerate() {
        for idx in pending_fail.drain(..) {
            patch_jump(&mut scope.chunk, idx);
        }
        let mark = scope.mark();
        let mut arm_fail = Vec::new();

        scope.chunk.emit(Instruction::GetLocal(scrutinee_slot), line);
        compile_test(scope, &arm.pattern, line)?;
        arm_fail.push(emit_jump(&mut scope.chunk, true, line));

        scope.chunk.emit(Instruction::GetLocal(scrutinee_slot), line);
        compile_bind(scope, &arm.pattern, line)?;
        let bound = scope.local_count() - mark;

        if let Some(guard) = &arm.guard {
            compile_expr(compiler, scope, guard)?;
            let guard_false = emit_jump(&mut scope.chunk, true, line);
            let guard_true = emit_jump(&mut scope.chunk, false, line);
            patch_jump(&mut scope.chunk, guard_false);
            for _ in 0..bound {
                scope.chunk.emit(Instruction::Pop, line);
            }
            arm_fail.push(emit_jump(&mut scope.chunk, false, line));
            patch_jump(&mut scope.chunk, guard_true);
        }

        compile_expr(compiler, scope, &arm.body)?;
        scope.chunk.emit(Instruction::PopBelow { depth: (bound + 1) as u16 }, line);
        end_jumps.push(emit_jump(&mut scope.chunk, false, line));
        scope.truncate_to(mark);

        if i + 1 < arms.len() {
            pending_fail = arm_fail;
        } else {
            for idx in arm_fail {
                patch_jump(&mut scope.chunk, idx);
            }
            // Exhaustiveness checking was supposed to rule this out; fail
            // safe rather than run off with a stale scrutinee on the stack.
            scope.chunk.emit(Instruction::Pop, line);
            scope.chunk.emit(Instruction::Nil, line);
        }
    }

    for idx in end_jumps {
        patch_jump(&mut scope.chunk, idx);
    }
    scope.truncate_to(scrutinee_mark);
    scope.scope_depth -= 1;
    Ok(())
}

/// Drives `expr` to a `Return`/`TailCall`: the one place a genuine tail
/// position is detectable, since `TypedBlock` carries no implicit trailing
/// value of its own — only `Return(Some(_))` and an expression-bodied
/// closure's own body ever stand directly in tail position. Nested blocks'
/// trailing expressions inherit that same tail position.
pub(super) fn compile_tail_expr(compiler: &mut Compiler, scope: &mut FunctionScope, expr: &TypedExpr) -> Result<(), CompileError> {
    match &expr.kind {
        TypedExprKind::Block(block, Some(trailing)) => {
            super::statements::compile_block(compiler, scope, block)?;
            compile_tail_expr(compiler, scope, trailing)
        }
        TypedExprKind::Block(block, None) => {
            super::statements::compile_block(compiler, scope, block)?;
            scope.chunk.emit(Instruction::Nil, 0);
            scope.chunk.emit(Instruction::Return, 0);
            Ok(())
        }
        TypedExprKind::Call { func, args } => compile_call(compiler, scope, expr, func, args, true),
        TypedExprKind::MethodCall { receiver, method, args, resolved } => {
            compile_method_call(compiler, scope, receiver, method, args, resolved, true)
        }
        _ => {
            compile_expr(compiler, scope, expr)?;
            scope.chunk.emit(Instruction::Return, 0);
            Ok(())
        }
    }
}
