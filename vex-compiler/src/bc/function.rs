//! Compiling one function body into its own `Chunk`, matching the teacher's
//! `declare_function`/`compile_function` split in spirit (one `FunctionScope`
//! per function, parameters reserved as the first locals) but targeting
//! bytecode locals/upvalues instead of LLVM allocas (spec.md §4.6/§4.7).

use vex_analyzer::{TypedExpr, TypedParam};
use vex_bytecode::{DefaultValue, FunctionDescriptor, Instruction};

use super::error::CompileError;
use super::patterns::literal_constant;
use super::program::Compiler;
use super::scope::FunctionScope;

pub(super) fn compile_function(
    compiler: &mut Compiler,
    func: &vex_analyzer::TypedFunction,
    name: &str,
) -> Result<FunctionDescriptor, CompileError> {
    let mut scope = FunctionScope::new(name, None);
    for param in &func.params {
        scope.declare_param(param.name.clone());
    }
    super::statements::compile_block(compiler, &mut scope, &func.body)?;
    // Every path that doesn't hit an explicit `return` falls off the end
    // here; trailing dead code after a real return is harmless.
    scope.chunk.emit(Instruction::Nil, 0);
    scope.chunk.emit(Instruction::Return, 0);
    finish_with_params(compiler, scope, &func.params, func.is_variadic, name)
}

/// Compiles an expression-bodied closure. `enclosing` is handed by value and
/// handed back so the caller (mid-compilation of the enclosing function) can
/// keep working with its own scope afterward.
pub(super) fn compile_closure(
    compiler: &mut Compiler,
    enclosing: FunctionScope,
    params: &[String],
    body: &TypedExpr,
    name: &str,
) -> Result<(FunctionDescriptor, Vec<vex_bytecode::UpvalueDescriptor>, FunctionScope), CompileError> {
    let mut scope = FunctionScope::new(name, Some(Box::new(enclosing)));
    for param in params {
        scope.declare_param(param.clone());
    }
    super::expressions::compile_tail_expr(compiler, &mut scope, body)?;
    let upvalues = scope.upvalues.clone();
    let enclosing = scope.enclosing.take().expect("a closure's scope always has an enclosing one");
    let descriptor = finish(scope, params.len(), name);
    Ok((descriptor, upvalues, *enclosing))
}

/// Closures have no default-valued or variadic parameters at the surface
/// syntax (only top-level/method `fn` declarations do), so they always get
/// the plain no-defaults shape.
fn finish(scope: FunctionScope, arity: usize, name: &str) -> FunctionDescriptor {
    let local_names: Vec<String> = scope.locals.iter().map(|l| l.name.clone()).collect();
    FunctionDescriptor {
        name: name.to_string(),
        arity,
        required_arity: arity,
        is_variadic: false,
        defaults: Vec::new(),
        local_count: local_names.len(),
        upvalue_count: scope.upvalues.len(),
        chunk: scope.chunk,
        local_names,
    }
}

/// Builds the descriptor for a `fn` declaration, whose parameters may carry
/// default values and whose last parameter may be variadic (spec.md §4.6).
/// `required_arity` is the count of leading parameters with no default —
/// every parameter after the first defaulted one must also have a default
/// (enforced by the parser/analyzer), so this is just the prefix length.
fn finish_with_params(
    compiler: &mut Compiler,
    mut scope: FunctionScope,
    params: &[TypedParam],
    is_variadic: bool,
    name: &str,
) -> Result<FunctionDescriptor, CompileError> {
    let local_names: Vec<String> = scope.locals.iter().map(|l| l.name.clone()).collect();
    let required_arity = params.iter().take_while(|p| p.default.is_none()).count();
    let mut defaults = Vec::new();
    for param in &params[required_arity..] {
        let default_expr = param.default.as_ref().expect("params past required_arity all default");
        defaults.push(compile_default(compiler, &mut scope, default_expr, name)?);
    }
    Ok(FunctionDescriptor {
        name: name.to_string(),
        arity: params.len(),
        required_arity,
        is_variadic,
        defaults,
        local_count: local_names.len(),
        upvalue_count: scope.upvalues.len(),
        chunk: scope.chunk,
        local_names,
    })
}

/// A literal default compiles straight into the function's own constant
/// pool (`DefaultValue::Constant` indexes `descriptor.chunk`, the same chunk
/// the body runs from). Anything else (a call, a field access) needs its own
/// zero-argument chunk the VM evaluates at call time, since the function's
/// own chunk has no instruction pointer to run it from mid-prologue.
fn compile_default(
    compiler: &mut Compiler,
    scope: &mut FunctionScope,
    expr: &TypedExpr,
    name: &str,
) -> Result<DefaultValue, CompileError> {
    if let Ok(constant) = literal_constant(expr) {
        let idx = scope.chunk.add_constant(constant);
        return Ok(DefaultValue::Constant(idx));
    }
    let mut default_scope = FunctionScope::new(format!("{name}$default"), None);
    super::expressions::compile_tail_expr(compiler, &mut default_scope, expr)?;
    Ok(DefaultValue::Chunk(default_scope.chunk))
}
