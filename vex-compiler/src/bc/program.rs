//! Top-level orchestration: walks a `TypedProgram`'s items, compiles every
//! non-generic function eagerly, drives on-demand monomorphization for
//! generic ones, and assembles the entry chunk that defines every compiled
//! function as a global and (if present) calls `main` (spec.md §4.6, §6.1).

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use vex_analyzer::{TypedFunction, TypedItem, TypedProgram};
use vex_bytecode::{Chunk, Constant, FunctionDescriptor, Instruction};
use vex_symbols::SymbolTable;
use vex_types::{unify, Type};

use super::error::CompileError;
use super::generics::{mangle, substitute_function};

const MAX_SPECIALIZATION_DEPTH: usize = 8;

pub struct CompiledProgram {
    pub entry: FunctionDescriptor,
}

/// Compile-time state shared across every function being compiled:
/// top-level function definitions (for call resolution and specialization),
/// the symbol table handed off by the analyzer (trait/instance lookups), and
/// the monomorphization cache/queue.
pub(super) struct Compiler<'a> {
    pub functions: BTreeMap<String, &'a TypedFunction>,
    pub symbols: &'a SymbolTable,
    mono_cache: HashSet<String>,
    pending: VecDeque<(String, TypedFunction)>,
    recursion_guard: HashMap<String, usize>,
}

impl<'a> Compiler<'a> {
    /// Requests a monomorphized instantiation of the generic function
    /// `name` at `type_args`, queuing its body for compilation the first
    /// time this exact instantiation is seen, and returns the mangled
    /// global name call sites should reference.
    pub(super) fn request_specialization(&mut self, name: &str, type_args: Vec<Type>) -> Result<String, CompileError> {
        // Depth check comes before `mangle`, not after: materializing the
        // mangled name walks `type_args`'s structure, which is itself
        // unbounded on a deeply nested or recursively-aliased type, so the
        // guard must reject those before that walk ever runs.
        let depth = self.recursion_guard.entry(name.to_string()).or_insert(0);
        *depth += 1;
        if *depth > MAX_SPECIALIZATION_DEPTH {
            return Err(CompileError::SpecializationTooDeep { name: name.to_string(), max: MAX_SPECIALIZATION_DEPTH });
        }
        let mangled = mangle(name, &type_args);
        if self.mono_cache.contains(&mangled) {
            // Already specialized: no new expansion happened, so this call
            // doesn't count against the name's recursion budget.
            *self.recursion_guard.get_mut(name).expect("just inserted") -= 1;
            return Ok(mangled);
        }
        let def = *self.functions.get(name).ok_or_else(|| CompileError::UnresolvedName(name.to_string()))?;
        let mut subst = vex_types::Substitution::empty();
        for (var, ty) in def.scheme.vars.iter().zip(type_args.iter()) {
            subst.insert(var.clone(), ty.clone());
        }
        let specialized = substitute_function(def, &subst);
        self.mono_cache.insert(mangled.clone());
        self.pending.push_back((mangled.clone(), specialized));
        Ok(mangled)
    }

    /// Recovers the concrete type arguments a call site needs to specialize
    /// `def` against, by unifying `def`'s scheme body (an arrow type) with
    /// the arrow type built from the call's own (already inferred) argument
    /// and result types.
    pub(super) fn infer_type_args(
        def: &TypedFunction,
        arg_types: &[Type],
        result_type: &Type,
    ) -> Result<Vec<Type>, CompileError> {
        let call_shape = Type::func(arg_types.to_vec(), result_type.clone());
        let solved = unify(&def.scheme.body, &call_shape, None)
            .map_err(|_| CompileError::AmbiguousInstantiation(def.name.clone()))?;
        Ok(def
            .scheme
            .vars
            .iter()
            .map(|v| solved.get(v).cloned().unwrap_or_else(|| Type::var(v)))
            .collect())
    }
}

pub fn compile_program(program: &TypedProgram, symbols: &SymbolTable) -> Result<CompiledProgram, CompileError> {
    let mut functions = BTreeMap::new();
    for item in &program.items {
        if let TypedItem::Function(f) = item {
            functions.insert(f.name.clone(), f);
        }
    }

    let mut compiler = Compiler {
        functions,
        symbols,
        mono_cache: HashSet::new(),
        pending: VecDeque::new(),
        recursion_guard: HashMap::new(),
    };

    let mut compiled: Vec<(String, FunctionDescriptor)> = Vec::new();

    let monomorphic: Vec<&TypedFunction> =
        compiler.functions.values().filter(|f| !f.scheme.is_polymorphic()).copied().collect();
    for func in monomorphic {
        let descriptor = super::function::compile_function(&mut compiler, func, &func.name)?;
        compiled.push((func.name.clone(), descriptor));
    }

    while let Some((mangled, func)) = compiler.pending.pop_front() {
        let descriptor = super::function::compile_function(&mut compiler, &func, &mangled)?;
        compiled.push((mangled, descriptor));
    }

    let mut main_chunk = Chunk::new();
    for (name, descriptor) in compiled {
        let function_idx = main_chunk.add_constant(Constant::Function(descriptor));
        main_chunk.emit(Instruction::Closure { function: function_idx, upvalues: Vec::new() }, 0);
        let name_idx = main_chunk.add_constant(Constant::Str(name));
        main_chunk.emit(Instruction::DefineGlobal(name_idx), 0);
    }

    if compiler.functions.contains_key("main") {
        let name_idx = main_chunk.add_constant(Constant::Str("main".to_string()));
        main_chunk.emit(Instruction::GetGlobal(name_idx), 0);
        main_chunk.emit(Instruction::Call(0), 0);
    } else {
        main_chunk.emit(Instruction::Nil, 0);
    }
    main_chunk.emit(Instruction::Return, 0);

    let entry = FunctionDescriptor {
        name: "<entry>".to_string(),
        arity: 0,
        required_arity: 0,
        is_variadic: false,
        defaults: Vec::new(),
        local_count: 0,
        upvalue_count: 0,
        chunk: main_chunk,
        local_names: Vec::new(),
    };

    Ok(CompiledProgram { entry })
}
