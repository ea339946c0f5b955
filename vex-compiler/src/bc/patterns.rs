//! Lowers a `TypedPattern` to test-then-bind bytecode (spec.md §4.6),
//! driven directly off `TypedPatternKind` now that it mirrors the untyped
//! pattern shape (see `vex-analyzer`'s grounding notes in `DESIGN.md`).
//!
//! Two separate passes rather than one interleaved one:
//!
//! - [`compile_test`]: given a value already on top of stack, consumes it
//!   and pushes exactly one boolean — never binds anything, never leaves
//!   stray temporaries behind regardless of where inside the pattern it
//!   short-circuits. This makes every failure jump land at one predictable
//!   stack depth no matter which sub-pattern rejected the value.
//! - [`compile_bind`]: run only once the whole pattern's test has already
//!   succeeded; re-walks the same structure, this time declaring a local
//!   for every identifier and discarding everything else.
//!
//! Running the walk twice re-derives each projected sub-value rather than
//! caching it from the test pass, trading a little redundant projection
//! work for not having to reconcile two different traversal orders'
//! worth of stack bookkeeping.

use vex_analyzer::{TypedExpr, TypedExprKind, TypedPattern, TypedPatternKind};
use vex_bytecode::{Constant, Instruction};

use super::error::CompileError;
use super::scope::{emit_jump, patch_jump, FunctionScope};

pub(super) fn literal_constant(expr: &TypedExpr) -> Result<Constant, CompileError> {
    Ok(match &expr.kind {
        TypedExprKind::IntLiteral(i) => Constant::Integer(*i),
        TypedExprKind::BigIntLiteral(s) => {
            Constant::BigInt(s.parse().map_err(|_| CompileError::AmbiguousInstantiation(s.clone()))?)
        }
        TypedExprKind::FloatLiteral(f) => Constant::Float(*f),
        TypedExprKind::StringLiteral(s) => Constant::Str(s.clone()),
        TypedExprKind::BoolLiteral(b) => Constant::Boolean(*b),
        TypedExprKind::CharLiteral(c) => Constant::Char(*c),
        TypedExprKind::Nil => Constant::Nil,
        other => return Err(CompileError::AmbiguousInstantiation(format!("{other:?} is not a pattern literal"))),
    })
}

/// Runs `per_item(i)` once per `0..count`, each time with exactly one copy
/// of the tested value on top of stack (consumed by `per_item`, which must
/// push exactly one boolean back), AND-combining the results with
/// short-circuit control flow so a failing test never evaluates a
/// projection that assumes an earlier test already passed.
fn compile_and_chain(
    scope: &mut FunctionScope,
    count: usize,
    line: usize,
    mut per_item: impl FnMut(&mut FunctionScope, usize) -> Result<(), CompileError>,
) -> Result<(), CompileError> {
    if count == 0 {
        scope.chunk.emit(Instruction::Pop, line);
        scope.chunk.emit(Instruction::True, line);
        return Ok(());
    }
    let mut short_circuit = Vec::new();
    for i in 0..count {
        if i + 1 < count {
            scope.chunk.emit(Instruction::Dup, line);
        }
        per_item(scope, i)?;
        if i + 1 < count {
            short_circuit.push(emit_jump(&mut scope.chunk, true, line));
        }
    }
    let skip_false = emit_jump(&mut scope.chunk, false, line);
    for idx in short_circuit {
        patch_jump(&mut scope.chunk, idx);
    }
    // A short-circuit landed here before all `count` copies were consumed;
    // exactly one untested copy is always left over at this point.
    scope.chunk.emit(Instruction::Pop, line);
    scope.chunk.emit(Instruction::False, line);
    patch_jump(&mut scope.chunk, skip_false);
    Ok(())
}

fn compile_or_chain(scope: &mut FunctionScope, subs: &[TypedPattern], line: usize) -> Result<(), CompileError> {
    let count = subs.len();
    if count == 0 {
        scope.chunk.emit(Instruction::Pop, line);
        scope.chunk.emit(Instruction::False, line);
        return Ok(());
    }
    let mut success = Vec::new();
    for (i, alt) in subs.iter().enumerate() {
        if i + 1 < count {
            scope.chunk.emit(Instruction::Dup, line);
        }
        compile_test(scope, alt, line)?;
        if i + 1 < count {
            scope.chunk.emit(Instruction::Not, line);
            success.push(emit_jump(&mut scope.chunk, true, line));
        }
    }
    let skip_true = emit_jump(&mut scope.chunk, false, line);
    for idx in success {
        patch_jump(&mut scope.chunk, idx);
    }
    scope.chunk.emit(Instruction::Pop, line);
    scope.chunk.emit(Instruction::True, line);
    patch_jump(&mut scope.chunk, skip_true);
    Ok(())
}

/// Consumes the value on top of stack, pushing exactly one boolean.
pub(super) fn compile_test(scope: &mut FunctionScope, pattern: &TypedPattern, line: usize) -> Result<(), CompileError> {
    match &pattern.kind {
        TypedPatternKind::Wildcard | TypedPatternKind::Ident(_) => {
            scope.chunk.emit(Instruction::Pop, line);
            scope.chunk.emit(Instruction::True, line);
        }
        TypedPatternKind::Literal(expr) => {
            let constant = literal_constant(expr)?;
            let idx = scope.chunk.add_constant(constant);
            scope.chunk.emit(Instruction::TestLiteral(idx), line);
            scope.chunk.emit(Instruction::PopBelow { depth: 1 }, line);
        }
        TypedPatternKind::Tuple(subs) => {
            compile_and_chain(scope, subs.len(), line, |scope, i| {
                scope.chunk.emit(Instruction::GetTupleElem(i as u16), line);
                compile_test(scope, &subs[i], line)
            })?;
        }
        TypedPatternKind::Struct { fields, .. } | TypedPatternKind::Record { fields, .. } => {
            compile_and_chain(scope, fields.len(), line, |scope, i| {
                let (name, sub) = &fields[i];
                let idx = scope.chunk.add_constant(Constant::Str(name.clone()));
                scope.chunk.emit(Instruction::GetField(idx), line);
                compile_test(scope, sub, line)
            })?;
        }
        TypedPatternKind::Enum { variant, data, .. } => {
            let variant_name = variant.clone();
            compile_and_chain(scope, 1 + data.len(), line, |scope, i| {
                if i == 0 {
                    let idx = scope.chunk.add_constant(Constant::Str(variant_name.clone()));
                    scope.chunk.emit(Instruction::TestConstructor(idx), line);
                    scope.chunk.emit(Instruction::PopBelow { depth: 1 }, line);
                    Ok(())
                } else {
                    scope.chunk.emit(Instruction::GetTupleElem((i - 1) as u16), line);
                    compile_test(scope, &data[i - 1], line)
                }
            })?;
        }
        TypedPatternKind::Array { elements, .. } => {
            // A list shorter than `elements` raises a host-level index
            // fault rather than falling through to the next arm; see
            // DESIGN.md for why this is an accepted simplification.
            compile_and_chain(scope, elements.len(), line, |scope, i| {
                scope.chunk.emit(Instruction::GetListElem(i as u16), line);
                compile_test(scope, &elements[i], line)
            })?;
        }
        TypedPatternKind::Or(subs) => compile_or_chain(scope, subs, line)?,
    }
    Ok(())
}

/// Consumes the value on top of stack, declaring a local for every
/// identifier the pattern binds. Only called once the matching
/// `compile_test` has already succeeded.
pub(super) fn compile_bind(scope: &mut FunctionScope, pattern: &TypedPattern, line: usize) -> Result<(), CompileError> {
    match &pattern.kind {
        TypedPatternKind::Wildcard | TypedPatternKind::Literal(_) | TypedPatternKind::Or(_) => {
            scope.chunk.emit(Instruction::Pop, line);
        }
        TypedPatternKind::Ident(name) => {
            scope.declare_local(name.clone())?;
        }
        TypedPatternKind::Tuple(subs) => bind_projected(scope, subs.len(), line, |scope, i| {
            scope.chunk.emit(Instruction::GetTupleElem(i as u16), line);
            compile_bind(scope, &subs[i], line)
        })?,
        TypedPatternKind::Struct { fields, .. } | TypedPatternKind::Record { fields, .. } => {
            bind_projected(scope, fields.len(), line, |scope, i| {
                let (name, sub) = &fields[i];
                let idx = scope.chunk.add_constant(Constant::Str(name.clone()));
                scope.chunk.emit(Instruction::GetField(idx), line);
                compile_bind(scope, sub, line)
            })?
        }
        TypedPatternKind::Enum { data, .. } => bind_projected(scope, data.len(), line, |scope, i| {
            scope.chunk.emit(Instruction::GetTupleElem(i as u16), line);
            compile_bind(scope, &data[i], line)
        })?,
        TypedPatternKind::Array { elements, .. } => bind_projected(scope, elements.len(), line, |scope, i| {
            scope.chunk.emit(Instruction::GetListElem(i as u16), line);
            compile_bind(scope, &elements[i], line)
        })?,
    }
    Ok(())
}

fn bind_projected(
    scope: &mut FunctionScope,
    count: usize,
    line: usize,
    mut per_item: impl FnMut(&mut FunctionScope, usize) -> Result<(), CompileError>,
) -> Result<(), CompileError> {
    if count == 0 {
        scope.chunk.emit(Instruction::Pop, line);
        return Ok(());
    }
    for i in 0..count {
        if i + 1 < count {
            scope.chunk.emit(Instruction::Dup, line);
        }
        per_item(scope, i)?;
    }
    Ok(())
}
