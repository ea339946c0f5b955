//! The single-pass analyzer (spec.md §4.5): walks a `vex_ast::Program`,
//! infers a type for every expression, resolves every identifier, checks
//! match exhaustiveness, and produces a [`TypedProgram`] plus a
//! [`DiagnosticEngine`] of non-fatal findings.
//!
//! Top-level items are pre-declared (stub signatures registered) before any
//! body is checked, so mutually recursive functions/types resolve each
//! other. Unification runs against a single accumulated [`Substitution`]
//! threaded through the whole pass; `type_map`/`resolution_map` are
//! finalized (substitution fully applied) once the walk completes.

use std::collections::{BTreeMap, BTreeSet};

use vex_ast::{
    BinaryOp, Expression, Function, Item, Pattern, Program, Statement, Type as AstType, UnaryOp,
};
use vex_diagnostics::{error_codes, DiagnosticEngine, Span, SpanMap};
use vex_symbols::{DispatchStrategy, ResolvedMethod, Symbol, SymbolKind, SymbolTable};
use vex_types::ty::RecordType;
use vex_types::{Scheme, Substitution, Type};

use crate::config::AnalyzerConfig;
use crate::convert;
use crate::exhaustiveness;
use crate::patterns;
use crate::typed::{
    NodeId, TypedBlock, TypedExpr, TypedExprKind, TypedFunction, TypedItem, TypedMatchArm,
    TypedParam, TypedPattern, TypedProgram, TypedStatement,
};

pub struct Analyzer {
    pub symbols: SymbolTable,
    pub diagnostics: DiagnosticEngine,
    config: AnalyzerConfig,
    span_map: Option<SpanMap>,
    subst: Substitution,
    next_var: usize,
    next_node: NodeId,
    type_map: BTreeMap<NodeId, Type>,
    resolution_map: BTreeMap<NodeId, Symbol>,
    enum_variants: BTreeMap<String, BTreeSet<String>>,
    enum_variant_payload: BTreeMap<(String, String), Vec<Type>>,
    aliases: BTreeMap<String, (Vec<String>, Type)>,
    struct_fields: BTreeMap<String, BTreeMap<String, Type>>,
    struct_methods: BTreeMap<String, BTreeMap<String, Scheme>>,
    /// In-scope generic parameters for the item currently being checked,
    /// and the trait names each is bound by (for dispatch without a
    /// concrete receiver head constructor).
    type_param_bounds: BTreeMap<String, Vec<String>>,
    current_type_params: BTreeSet<String>,
    current_return_ty: Option<Type>,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            symbols: SymbolTable::new(),
            diagnostics: DiagnosticEngine::new(),
            config,
            span_map: None,
            subst: Substitution::empty(),
            next_var: 0,
            next_node: 0,
            type_map: BTreeMap::new(),
            resolution_map: BTreeMap::new(),
            enum_variants: BTreeMap::new(),
            enum_variant_payload: BTreeMap::new(),
            aliases: BTreeMap::new(),
            struct_fields: BTreeMap::new(),
            struct_methods: BTreeMap::new(),
            type_param_bounds: BTreeMap::new(),
            current_type_params: BTreeSet::new(),
            current_return_ty: None,
        }
    }

    pub fn with_span_map(mut self, span_map: SpanMap) -> Self {
        self.span_map = Some(span_map);
        self
    }

    // ---- bookkeeping helpers ------------------------------------------------

    fn fresh_var(&mut self) -> Type {
        let n = self.next_var;
        self.next_var += 1;
        Type::var(format!("t{n}"))
    }

    fn fresh_node(&mut self) -> NodeId {
        let id = self.next_node;
        self.next_node += 1;
        id
    }

    fn apply(&self, ty: &Type) -> Type {
        self.subst.apply(ty)
    }

    fn record_type(&mut self, id: NodeId, ty: Type) {
        self.type_map.insert(id, ty);
    }

    fn record_resolution(&mut self, id: NodeId, symbol: Symbol) {
        self.resolution_map.insert(id, symbol);
    }

    fn span_for(&self, span_id: &Option<String>) -> Span {
        match (&self.span_map, span_id) {
            (Some(map), Some(id)) => map.get_or_unknown(id),
            _ => Span::unknown(),
        }
    }

    /// Unifies `expected` with `actual` under the running substitution,
    /// folding the result back in. On failure, emits a diagnostic and
    /// returns `expected` so the walk can keep going (spec.md §7: analyzer
    /// errors are non-fatal).
    fn unify_types(&mut self, expected: &Type, actual: &Type, span: Span) -> Type {
        self.unify_inner(expected, actual, false, span)
    }

    fn unify_types_allow_extra(&mut self, expected: &Type, actual: &Type, span: Span) -> Type {
        self.unify_inner(expected, actual, true, span)
    }

    fn unify_inner(&mut self, expected: &Type, actual: &Type, allow_extra: bool, span: Span) -> Type {
        let e = self.apply(expected);
        let a = self.apply(actual);
        let result = if allow_extra {
            vex_types::unify_allow_extra(&e, &a, None)
        } else {
            vex_types::unify(&e, &a, None)
        };
        match result {
            Ok(step) => {
                self.subst = step.compose(&self.subst);
                self.apply(&e)
            }
            Err(err) => {
                self.diagnostics.emit_error(error_codes::TYPE_MISMATCH, err.to_string(), span);
                e
            }
        }
    }

    /// Lowers a surface type annotation, then expands it if its head names a
    /// declared type alias (bounded by `max_specialization_depth` so a
    /// self-referential alias terminates — see DESIGN.md).
    fn lower_type(&self, ast_ty: &AstType) -> Type {
        let lowered = convert::lower(ast_ty, &self.current_type_params);
        self.expand_alias(lowered, 0)
    }

    fn expand_alias(&self, ty: Type, depth: usize) -> Type {
        if depth >= self.config.max_specialization_depth {
            return ty;
        }
        match &ty {
            Type::Constant { name, underlying: None, .. } => match self.aliases.get(name) {
                Some((params, body)) if params.is_empty() => self.expand_alias(body.clone(), depth + 1),
                _ => ty,
            },
            Type::Application { ctor, args } => match ctor.as_ref() {
                Type::Constant { name, underlying: None, .. } => match self.aliases.get(name) {
                    Some((params, body)) if params.len() == args.len() => {
                        let mut subst = Substitution::empty();
                        for (p, a) in params.iter().zip(args.iter()) {
                            subst.insert(p.clone(), a.clone());
                        }
                        self.expand_alias(subst.apply(body), depth + 1)
                    }
                    _ => ty,
                },
                _ => ty,
            },
            _ => ty,
        }
    }

    // ---- entry point ---------------------------------------------------------

    /// Runs the pass and returns the typed tree alongside the symbol table
    /// (carrying the trait/instance registry a downstream compiler needs for
    /// monomorphized trait dispatch, spec.md §4.7) and the collected
    /// diagnostics.
    pub fn run(mut self, program: &Program) -> (TypedProgram, SymbolTable, DiagnosticEngine) {
        self.pre_declare(program);
        let mut items = Vec::new();
        for item in &program.items {
            items.extend(self.analyze_item(item));
        }
        let type_map = self.type_map.iter().map(|(id, ty)| (*id, self.subst.apply(ty))).collect();
        let resolution_map = self.resolution_map.clone();
        (TypedProgram { items, type_map, resolution_map }, self.symbols, self.diagnostics)
    }

    // ---- pre-declaration (mutual recursion) ----------------------------------

    fn pre_declare(&mut self, program: &Program) {
        for item in &program.items {
            match item {
                Item::TypeAlias(alias) => {
                    let params: BTreeSet<String> = alias.type_params.iter().map(|p| p.name.clone()).collect();
                    let saved = std::mem::replace(&mut self.current_type_params, params);
                    let body = convert::lower(&alias.ty, &self.current_type_params);
                    self.current_type_params = saved;
                    let param_names = alias.type_params.iter().map(|p| p.name.clone()).collect();
                    self.aliases.insert(alias.name.clone(), (param_names, body));
                }
                Item::Enum(e) => {
                    let variant_names: BTreeSet<String> = e.variants.iter().map(|v| v.name.clone()).collect();
                    self.enum_variants.insert(e.name.clone(), variant_names);
                    let params: BTreeSet<String> = e.type_params.iter().map(|p| p.name.clone()).collect();
                    let saved = std::mem::replace(&mut self.current_type_params, params);
                    for variant in &e.variants {
                        let payload: Vec<Type> =
                            variant.data.iter().map(|t| convert::lower(t, &self.current_type_params)).collect();
                        self.enum_variant_payload.insert((e.name.clone(), variant.name.clone()), payload.clone());
                        let ctor_ty = if payload.is_empty() {
                            Type::constant(e.name.clone())
                        } else {
                            Type::func(payload, Type::constant(e.name.clone()))
                        };
                        let scheme = Scheme::generalize(&ctor_ty, &BTreeSet::new(), Vec::new());
                        self.symbols.define(Symbol::new(variant.name.clone(), SymbolKind::Constructor, scheme));
                    }
                    self.current_type_params = saved;
                }
                Item::Struct(s) => {
                    let params: BTreeSet<String> = s.type_params.iter().map(|p| p.name.clone()).collect();
                    let saved = std::mem::replace(&mut self.current_type_params, params);
                    let fields: BTreeMap<String, Type> = s
                        .fields
                        .iter()
                        .map(|f| (f.name.clone(), convert::lower(&f.ty, &self.current_type_params)))
                        .collect();
                    self.struct_fields.insert(s.name.clone(), fields);
                    let mut methods = BTreeMap::new();
                    for method in &s.methods {
                        let method_params: BTreeSet<String> =
                            method.type_params.iter().map(|p| p.name.clone()).collect();
                        let combined: BTreeSet<String> =
                            self.current_type_params.union(&method_params).cloned().collect();
                        let param_tys: Vec<Type> =
                            method.params.iter().map(|p| convert::lower(&p.ty, &combined)).collect();
                        let ret_ty = method
                            .return_type
                            .as_ref()
                            .map(|t| convert::lower(t, &combined))
                            .unwrap_or_else(|| Type::Tuple(Vec::new()));
                        let fn_ty = Type::func(param_tys, ret_ty);
                        let scheme = Scheme::generalize(&fn_ty, &BTreeSet::new(), Vec::new());
                        methods.insert(method.name.clone(), scheme);
                    }
                    self.struct_methods.insert(s.name.clone(), methods);
                    self.current_type_params = saved;
                }
                Item::Trait(t) => {
                    let mut descriptor = vex_symbols::TraitDescriptor::new(
                        t.name.clone(),
                        t.type_params.iter().map(|p| p.name.clone()).collect(),
                    );
                    for method in &t.methods {
                        let params: BTreeSet<String> = ["Self".to_string()].into_iter().collect();
                        let param_tys: Vec<Type> = method.params.iter().map(|p| convert::lower(&p.ty, &params)).collect();
                        let ret_ty = method
                            .return_type
                            .as_ref()
                            .map(|ty| convert::lower(ty, &params))
                            .unwrap_or_else(|| Type::Tuple(Vec::new()));
                        let scheme = Scheme::polymorphic(
                            vec!["Self".to_string()],
                            Vec::new(),
                            Type::func(param_tys, ret_ty),
                        );
                        descriptor.add_method(vex_symbols::TraitMethodDescriptor {
                            name: method.name.clone(),
                            scheme,
                            dispatch: DispatchStrategy::ArgumentPosition(0),
                            has_default: method.body.is_some(),
                        });
                    }
                    self.symbols.trait_registry_mut().register_trait(descriptor);
                }
                Item::TraitImpl(impl_block) => {
                    let lowered_for_type = self.lower_type(&impl_block.for_type);
                    let head = lowered_for_type.head_name().map(String::from);
                    let mut overridden = BTreeSet::new();
                    for method in &impl_block.methods {
                        overridden.insert(method.name.clone());
                    }
                    if let Some(head) = head {
                        if let Err(err) = self.symbols.trait_registry_mut().register_instance(vex_symbols::InstanceRecord {
                            trait_name: impl_block.trait_name.clone(),
                            head,
                            scheme: Scheme::monomorphic(lowered_for_type),
                            overridden_methods: overridden,
                        }) {
                            self.diagnostics.emit_error(error_codes::AMBIGUOUS_INSTANCE, err.to_string(), Span::unknown());
                        }
                    }
                }
                Item::Function(f) => self.pre_declare_function(f),
                Item::Const(c) => {
                    let ty = c.ty.as_ref().map(|t| convert::lower(t, &BTreeSet::new())).unwrap_or_else(|| self.fresh_var());
                    self.symbols.define(Symbol::new(c.name.clone(), SymbolKind::Variable, Scheme::monomorphic(ty)));
                }
                Item::ExternBlock(block) => {
                    for func in &block.functions {
                        let param_tys: Vec<Type> =
                            func.params.iter().map(|p| convert::lower(&p.ty, &BTreeSet::new())).collect();
                        let ret_ty = func
                            .return_type
                            .as_ref()
                            .map(|t| convert::lower(t, &BTreeSet::new()))
                            .unwrap_or_else(|| Type::Tuple(Vec::new()));
                        let scheme = Scheme::monomorphic(Type::func(param_tys, ret_ty));
                        self.symbols.define(Symbol::new(func.name.clone(), SymbolKind::Function, scheme));
                    }
                }
                Item::Policy(_) | Item::Export(_) => {}
            }
        }
    }

    fn pre_declare_function(&mut self, f: &Function) {
        let params: BTreeSet<String> = f.type_params.iter().map(|p| p.name.clone()).collect();
        let param_tys: Vec<Type> = f.params.iter().map(|p| convert::lower(&p.ty, &params)).collect();
        let ret_ty = f.return_type.as_ref().map(|t| convert::lower(t, &params));
        let ret_ty = ret_ty.unwrap_or_else(|| Type::var(format!("__ret_{}", f.name)));
        let fn_ty = Type::func(param_tys, ret_ty);
        let scheme = Scheme::generalize(&fn_ty, &BTreeSet::new(), Vec::new());
        self.symbols.define(Symbol::new(f.name.clone(), SymbolKind::Function, scheme));
    }

    // ---- items ----------------------------------------------------------------

    /// Returns every `TypedItem` this declaration contributes — for structs,
    /// trait impls and traits-with-defaults that's one `TypedFunction` per
    /// method body plus a trailing `TypedItem::Other` marker, so every
    /// method actually reaches `vex-compiler` as a compiled global instead
    /// of only updating the analyzer's own internal method tables.
    fn analyze_item(&mut self, item: &Item) -> Vec<TypedItem> {
        match item {
            Item::Function(f) => vec![TypedItem::Function(self.analyze_function(f, None))],
            Item::Struct(s) => {
                let params: BTreeSet<String> = s.type_params.iter().map(|p| p.name.clone()).collect();
                let saved = std::mem::replace(&mut self.current_type_params, params);
                let mut out = Vec::new();
                for method in &s.methods {
                    let mut typed = self.analyze_function(method, Some(s.name.as_str()));
                    typed.name = format!("{}::{}", s.name, typed.name);
                    out.push(TypedItem::Function(typed));
                }
                self.current_type_params = saved;
                out.push(TypedItem::Other(format!("struct {}", s.name)));
                out
            }
            Item::TraitImpl(impl_block) => {
                let params: BTreeSet<String> = impl_block.type_params.iter().map(|p| p.name.clone()).collect();
                let saved = std::mem::replace(&mut self.current_type_params, params);
                let lowered_for_type = self.lower_type(&impl_block.for_type);
                let head = lowered_for_type.head_name().unwrap_or(impl_block.trait_name.as_str()).to_string();
                let mut out = Vec::new();
                for method in &impl_block.methods {
                    let mut typed = self.analyze_function(method, Some(head.as_str()));
                    typed.name = format!("{}::{}::{}", impl_block.trait_name, head, typed.name);
                    out.push(TypedItem::Function(typed));
                }
                self.current_type_params = saved;
                out.push(TypedItem::Other(format!("impl {}", impl_block.trait_name)));
                out
            }
            Item::Trait(t) => {
                let mut out = Vec::new();
                for method in &t.methods {
                    if let Some(body) = &method.body {
                        self.symbols.push_scope();
                        self.current_type_params = ["Self".to_string()].into_iter().collect();
                        let mut typed_params = Vec::new();
                        let mut param_tys = Vec::new();
                        for p in &method.params {
                            let ty = self.lower_type(&p.ty);
                            let default = p.default.as_ref().map(|default| {
                                let typed_default = self.infer_expr(default);
                                self.unify_types(&ty, &typed_default.ty, Span::unknown());
                                typed_default
                            });
                            self.symbols.define(Symbol::new(p.name.clone(), SymbolKind::Variable, Scheme::monomorphic(ty.clone())));
                            typed_params.push(TypedParam { name: p.name.clone(), default });
                            param_tys.push(ty);
                        }
                        let declared_ret = method.return_type.as_ref().map(|ty| self.lower_type(ty));
                        let ret_var = declared_ret.clone().unwrap_or_else(|| self.fresh_var());
                        self.current_return_ty = Some(ret_var.clone());
                        let typed_body = self.analyze_block(body);
                        let body_ty = typed_body
                            .statements
                            .last()
                            .and_then(TypedStatement::trailing_type)
                            .unwrap_or_else(|| Type::Tuple(Vec::new()));
                        let final_ret = self.unify_types(&ret_var, &body_ty, Span::unknown());
                        self.current_return_ty = None;
                        self.current_type_params.clear();
                        self.symbols.pop_scope();

                        let scheme = Scheme::generalize(&Type::func(param_tys, final_ret), &BTreeSet::new(), Vec::new());
                        out.push(TypedItem::Function(TypedFunction {
                            name: format!("{}::{}", t.name, method.name),
                            scheme,
                            params: typed_params,
                            is_variadic: false,
                            body: typed_body,
                        }));
                    }
                }
                out.push(TypedItem::Other(format!("trait {}", t.name)));
                out
            }
            Item::Const(c) => {
                let declared = c.ty.as_ref().map(|t| self.lower_type(t));
                let value = self.infer_expr(&c.value);
                if let Some(declared) = declared {
                    self.unify_types(&declared, &value.ty, Span::unknown());
                }
                vec![TypedItem::Other(format!("const {}", c.name))]
            }
            Item::Enum(e) => vec![TypedItem::Other(format!("enum {}", e.name))],
            Item::TypeAlias(a) => vec![TypedItem::Other(format!("type {}", a.name))],
            Item::ExternBlock(_) | Item::Policy(_) | Item::Export(_) => Vec::new(),
        }
    }

    fn analyze_function(&mut self, f: &Function, receiver_struct: Option<&str>) -> TypedFunction {
        self.symbols.push_scope();
        let fn_params: BTreeSet<String> = f.type_params.iter().map(|p| p.name.clone()).collect();
        let combined: BTreeSet<String> = self.current_type_params.union(&fn_params).cloned().collect();
        let saved_params = std::mem::replace(&mut self.current_type_params, combined);

        for tp in &f.type_params {
            let bound_traits: Vec<String> = tp
                .bounds
                .iter()
                .filter_map(|b| match b {
                    vex_ast::TraitBound::Simple(name) => Some(name.clone()),
                    vex_ast::TraitBound::Callable { .. } => None,
                })
                .collect();
            self.type_param_bounds.insert(tp.name.clone(), bound_traits);
        }

        if let Some(struct_name) = receiver_struct {
            let self_ty = Type::constant(struct_name.to_string());
            self.symbols.define(Symbol::new("self", SymbolKind::Variable, Scheme::monomorphic(self_ty)));
        }

        let mut typed_params = Vec::new();
        let mut param_tys = Vec::new();
        for p in &f.params {
            let ty = self.lower_type(&p.ty);
            let default = p.default.as_ref().map(|default| {
                let typed_default = self.infer_expr(default);
                self.unify_types(&ty, &typed_default.ty, Span::unknown());
                typed_default
            });
            self.symbols.define(Symbol::new(p.name.clone(), SymbolKind::Variable, Scheme::monomorphic(ty.clone())));
            typed_params.push(TypedParam { name: p.name.clone(), default });
            param_tys.push(ty);
        }

        let declared_ret = f.return_type.as_ref().map(|t| self.lower_type(t));
        let ret_var = declared_ret.clone().unwrap_or_else(|| self.fresh_var());
        self.current_return_ty = Some(ret_var.clone());

        let body = self.analyze_block(&f.body);
        let body_ty = body.statements.last().and_then(TypedStatement::trailing_type).unwrap_or_else(|| Type::Tuple(Vec::new()));
        let final_ret = self.unify_types(&ret_var, &body_ty, Span::unknown());

        let final_params: Vec<Type> = param_tys.iter().map(|ty| self.apply(ty)).collect();

        self.current_return_ty = None;
        self.current_type_params = saved_params;
        self.symbols.pop_scope();

        let scheme = Scheme::generalize(&Type::func(final_params, final_ret), &BTreeSet::new(), Vec::new());
        TypedFunction { name: f.name.clone(), scheme, params: typed_params, is_variadic: f.is_variadic, body }
    }

    // ---- statements -------------------------------------------------------------

    fn analyze_block(&mut self, block: &vex_ast::Block) -> TypedBlock {
        self.symbols.push_scope();
        let statements = block.statements.iter().map(|s| self.analyze_statement(s)).collect();
        self.symbols.pop_scope();
        TypedBlock { statements }
    }

    fn analyze_statement(&mut self, stmt: &Statement) -> TypedStatement {
        match stmt {
            Statement::Let { name, ty, value, .. } => {
                let value = self.infer_expr(value);
                let final_ty = match ty {
                    Some(t) => {
                        let declared = self.lower_type(t);
                        self.unify_types(&declared, &value.ty, Span::unknown())
                    }
                    None => value.ty.clone(),
                };
                self.symbols.define(Symbol::new(name.clone(), SymbolKind::Variable, Scheme::monomorphic(final_ty)));
                TypedStatement::Let { name: name.clone(), value }
            }
            Statement::Assign { target, value } => {
                let target = self.infer_expr(target);
                let value = self.infer_expr(value);
                self.unify_types(&target.ty, &value.ty, Span::unknown());
                TypedStatement::Assign { target, value }
            }
            Statement::CompoundAssign { target, value, .. } => {
                let target = self.infer_expr(target);
                let value = self.infer_expr(value);
                self.unify_types(&target.ty, &value.ty, Span::unknown());
                TypedStatement::Other
            }
            Statement::Return(expr) => {
                let inner = expr.as_ref().map(|e| self.infer_expr(e));
                let ty = inner.as_ref().map(|e| e.ty.clone()).unwrap_or_else(|| Type::Tuple(Vec::new()));
                if let Some(expected) = self.current_return_ty.clone() {
                    self.unify_types(&expected, &ty, Span::unknown());
                }
                TypedStatement::Return(inner)
            }
            Statement::Break | Statement::Continue => TypedStatement::Other,
            Statement::Defer(inner) => {
                self.analyze_statement(inner);
                TypedStatement::Other
            }
            Statement::If { span_id, condition, then_block, elif_branches, else_block } => {
                let cond = self.infer_expr(condition);
                self.unify_types(&Type::constant("Boolean"), &cond.ty, self.span_for(span_id));
                let then_block = self.analyze_block(then_block);
                let else_block = self.desugar_elif(elif_branches, else_block);
                TypedStatement::If { condition: cond, then_block, else_block }
            }
            Statement::For { init, condition, post, body, .. } => {
                self.symbols.push_scope();
                if let Some(init) = init {
                    self.analyze_statement(init);
                }
                if let Some(cond) = condition {
                    let cond = self.infer_expr(cond);
                    self.unify_types(&Type::constant("Boolean"), &cond.ty, Span::unknown());
                }
                if let Some(post) = post {
                    self.analyze_statement(post);
                }
                self.analyze_block(body);
                self.symbols.pop_scope();
                TypedStatement::Other
            }
            Statement::While { span_id, condition, body } => {
                let cond = self.infer_expr(condition);
                self.unify_types(&Type::constant("Boolean"), &cond.ty, self.span_for(span_id));
                let body = self.analyze_block(body);
                TypedStatement::While { condition: cond, body }
            }
            Statement::ForIn { variable, iterable, body } => {
                let iterable = self.infer_expr(iterable);
                let elem_ty = match self.apply(&iterable.ty) {
                    Type::Application { ctor, args } if matches!(ctor.as_ref(), Type::Constant { name, .. } if name == "List") => {
                        args.into_iter().next().unwrap_or_else(|| self.fresh_var())
                    }
                    _ => self.fresh_var(),
                };
                self.symbols.push_scope();
                self.symbols.define(Symbol::new(variable.clone(), SymbolKind::Variable, Scheme::monomorphic(elem_ty.clone())));
                let body = self.analyze_block(body);
                self.symbols.pop_scope();
                TypedStatement::ForIn { variable: variable.clone(), iterable, body }
            }
            Statement::Switch { value, cases, default_case } => {
                let scrutinee = value.as_ref().map(|v| self.infer_expr(v));
                for case in cases {
                    for pattern_expr in &case.patterns {
                        let inferred = self.infer_expr(pattern_expr);
                        if let Some(scrutinee) = &scrutinee {
                            self.unify_types(&scrutinee.ty, &inferred.ty, Span::unknown());
                        }
                    }
                    self.analyze_block(&case.body);
                }
                if let Some(default_case) = default_case {
                    self.analyze_block(default_case);
                }
                TypedStatement::Other
            }
            Statement::Select { cases } => {
                for case in cases {
                    let expr = self.infer_expr(&case.expr);
                    self.symbols.push_scope();
                    if let Some(var) = &case.var {
                        self.symbols.define(Symbol::new(var.clone(), SymbolKind::Variable, Scheme::monomorphic(expr.ty.clone())));
                    }
                    self.analyze_block(&case.body);
                    self.symbols.pop_scope();
                }
                TypedStatement::Other
            }
            Statement::Go(expr) => {
                self.infer_expr(expr);
                TypedStatement::Other
            }
            Statement::Unsafe(block) => {
                self.analyze_block(block);
                TypedStatement::Other
            }
            Statement::Expression(expr) => TypedStatement::Expression(self.infer_expr(expr)),
            Statement::PatternAssign { pattern, value } => {
                let value = self.infer_expr(value);
                if !patterns::is_irrefutable(pattern) {
                    self.diagnostics.emit_error(
                        error_codes::UNSUPPORTED_PATTERN_ASSIGN,
                        "unsupported pattern in assignment: only irrefutable patterns are allowed".to_string(),
                        Span::unknown(),
                    );
                }
                let value_ty = value.ty.clone();
                let pattern = self.check_pattern(pattern, &value_ty, true);
                TypedStatement::PatternAssign { pattern, value }
            }
        }
    }

    /// Folds an `elif` chain into nested `else` blocks so the typed tree only
    /// needs a plain if/else shape.
    fn desugar_elif(
        &mut self,
        elif_branches: &[(Expression, vex_ast::Block)],
        else_block: &Option<vex_ast::Block>,
    ) -> Option<TypedBlock> {
        match elif_branches.split_first() {
            Some(((cond, block), rest)) => {
                let cond = self.infer_expr(cond);
                self.unify_types(&Type::constant("Boolean"), &cond.ty, Span::unknown());
                let then_block = self.analyze_block(block);
                let nested_else = self.desugar_elif(rest, else_block);
                Some(TypedBlock {
                    statements: vec![TypedStatement::If { condition: cond, then_block, else_block: nested_else }],
                })
            }
            None => else_block.as_ref().map(|b| self.analyze_block(b)),
        }
    }

    // ---- patterns ---------------------------------------------------------------

    fn check_pattern(&mut self, pattern: &Pattern, scrutinee: &Type, define: bool) -> TypedPattern {
        let id = self.fresh_node();
        let scrutinee = self.apply(scrutinee);
        let mut bindings = Vec::new();
        let kind = match pattern {
            Pattern::Wildcard => TypedPatternKind::Wildcard,
            Pattern::Literal(expr) => {
                let inferred = self.infer_expr(expr);
                self.unify_types(&scrutinee, &inferred.ty, Span::unknown());
                TypedPatternKind::Literal(Box::new(inferred))
            }
            Pattern::Ident(name) => {
                if define {
                    self.symbols.define(Symbol::new(
                        name.clone(),
                        SymbolKind::Variable,
                        Scheme::monomorphic(scrutinee.clone()),
                    ));
                }
                bindings.push((name.clone(), scrutinee.clone()));
                TypedPatternKind::Ident(name.clone())
            }
            Pattern::Tuple(elems) => {
                let elem_vars: Vec<Type> = elems.iter().map(|_| self.fresh_var()).collect();
                let forced = self.unify_types(&scrutinee, &Type::Tuple(elem_vars.clone()), Span::unknown());
                let elem_tys = match forced {
                    Type::Tuple(tys) => tys,
                    _ => elem_vars,
                };
                let mut sub_patterns = Vec::new();
                for (elem, ty) in elems.iter().zip(elem_tys.iter()) {
                    let sub = self.check_pattern(elem, ty, define);
                    bindings.extend(sub.bindings.clone());
                    sub_patterns.push(sub);
                }
                TypedPatternKind::Tuple(sub_patterns)
            }
            Pattern::Struct { name, fields } => {
                self.unify_types(&scrutinee, &Type::constant(name.clone()), Span::unknown());
                let field_tys = self.struct_fields.get(name).cloned().unwrap_or_default();
                let mut sub_fields = Vec::new();
                for (field_name, field_pattern) in fields {
                    let field_ty = field_tys.get(field_name).cloned().unwrap_or_else(|| self.fresh_var());
                    let sub = self.check_pattern(field_pattern, &field_ty, define);
                    bindings.extend(sub.bindings.clone());
                    sub_fields.push((field_name.clone(), sub));
                }
                TypedPatternKind::Struct { name: name.clone(), fields: sub_fields }
            }
            Pattern::Enum { name, variant, data } => {
                self.unify_types(&scrutinee, &Type::constant(name.clone()), Span::unknown());
                let payload = self.enum_variant_payload.get(&(name.clone(), variant.clone())).cloned().unwrap_or_default();
                if payload.len() != data.len() {
                    self.diagnostics.emit_error(
                        error_codes::WRONG_ARITY,
                        format!("`{variant}` takes {} argument(s), found {}", payload.len(), data.len()),
                        Span::unknown(),
                    );
                }
                let mut sub_data = Vec::new();
                for (sub_pattern, ty) in data.iter().zip(payload.iter()) {
                    let sub = self.check_pattern(sub_pattern, ty, define);
                    bindings.extend(sub.bindings.clone());
                    sub_data.push(sub);
                }
                TypedPatternKind::Enum { name: name.clone(), variant: variant.clone(), data: sub_data }
            }
            Pattern::Array { elements, rest } => {
                let elem_var = self.fresh_var();
                let list_ty = Type::apply(Type::constant("List"), vec![elem_var.clone()]);
                self.unify_types(&scrutinee, &list_ty, Span::unknown());
                let mut sub_elements = Vec::new();
                for elem in elements {
                    let sub = self.check_pattern(elem, &elem_var, define);
                    bindings.extend(sub.bindings.clone());
                    sub_elements.push(sub);
                }
                if let Some(rest_name) = rest {
                    if define {
                        self.symbols.define(Symbol::new(
                            rest_name.clone(),
                            SymbolKind::Variable,
                            Scheme::monomorphic(list_ty.clone()),
                        ));
                    }
                    bindings.push((rest_name.clone(), list_ty));
                }
                TypedPatternKind::Array { elements: sub_elements, rest: rest.clone() }
            }
            Pattern::Or(alts) => {
                let mut sub_alts = Vec::new();
                if let Some((first, rest)) = alts.split_first() {
                    let sub = self.check_pattern(first, &scrutinee, define);
                    bindings.extend(sub.bindings.clone());
                    sub_alts.push(sub);
                    for alt in rest {
                        self.symbols.push_scope();
                        let sub = self.check_pattern(alt, &scrutinee, false);
                        self.symbols.pop_scope();
                        sub_alts.push(sub);
                    }
                }
                TypedPatternKind::Or(sub_alts)
            }
            Pattern::Record { fields, open } => {
                let row = if *open { Some(format!("row_pat_{id}")) } else { None };
                let mut field_tys = BTreeMap::new();
                let mut field_vars = Vec::new();
                for (name, _) in fields {
                    let v = self.fresh_var();
                    field_tys.insert(name.clone(), v.clone());
                    field_vars.push(v);
                }
                let forced = self.unify_types_allow_extra(
                    &scrutinee,
                    &Type::Record(RecordType { fields: field_tys, row, is_open: *open }),
                    Span::unknown(),
                );
                let resolved_fields = match forced {
                    Type::Record(r) => r.fields,
                    _ => BTreeMap::new(),
                };
                let mut sub_fields = Vec::new();
                for (name, sub_pattern) in fields {
                    let field_ty = resolved_fields.get(name).cloned().unwrap_or_else(|| self.fresh_var());
                    let sub = self.check_pattern(sub_pattern, &field_ty, define);
                    bindings.extend(sub.bindings.clone());
                    sub_fields.push((name.clone(), sub));
                }
                let _ = field_vars;
                TypedPatternKind::Record { fields: sub_fields, open: *open }
            }
        };
        TypedPattern { id, ty: self.apply(&scrutinee), bindings, kind }
    }

    // ---- expressions --------------------------------------------------------------

    fn infer_expr(&mut self, expr: &Expression) -> TypedExpr {
        let id = self.fresh_node();
        let (ty, kind) = self.infer_expr_kind(expr, id);
        self.record_type(id, ty.clone());
        TypedExpr { id, ty, kind }
    }

    fn infer_expr_kind(&mut self, expr: &Expression, id: NodeId) -> (Type, TypedExprKind) {
        match expr {
            Expression::IntLiteral(v) => (Type::constant("Int"), TypedExprKind::IntLiteral(*v)),
            Expression::BigIntLiteral(v) => (Type::constant("Int"), TypedExprKind::BigIntLiteral(v.clone())),
            Expression::FloatLiteral(v) => (Type::constant("Float"), TypedExprKind::FloatLiteral(*v)),
            Expression::StringLiteral(v) | Expression::FStringLiteral(v) => {
                (Type::constant("String"), TypedExprKind::StringLiteral(v.clone()))
            }
            Expression::BoolLiteral(v) => (Type::constant("Boolean"), TypedExprKind::BoolLiteral(*v)),
            Expression::CharLiteral(c) => (Type::constant("Char"), TypedExprKind::CharLiteral(*c)),
            Expression::Nil => (Type::constant("Nil"), TypedExprKind::Nil),
            Expression::BytesLiteral(_) => (Type::constant("Bytes"), TypedExprKind::Opaque),
            Expression::BitsLiteral { .. } => (Type::constant("Bits"), TypedExprKind::Opaque),
            Expression::FormatString { parts } => {
                for part in parts {
                    if let vex_ast::FormatPart::Expr(e) = part {
                        self.infer_expr(e);
                    }
                }
                (Type::constant("String"), TypedExprKind::Opaque)
            }

            Expression::Ident(name) => {
                let resolved = self.symbols.lookup(name).map(|s| s.clone());
                match resolved {
                    Ok(symbol) => {
                        let mut next = self.next_var;
                        let (ty, _constraints) = symbol.scheme.instantiate(&mut || {
                            let v = format!("t{next}");
                            next += 1;
                            v
                        });
                        self.next_var = next;
                        self.record_resolution(id, symbol);
                        (ty, TypedExprKind::Ident { name: name.clone(), resolved: self.resolution_map.get(&id).cloned() })
                    }
                    Err(err) => {
                        self.diagnostics.emit_error(error_codes::UNDEFINED_VARIABLE, err.to_string(), Span::unknown());
                        (self.fresh_var(), TypedExprKind::Ident { name: name.clone(), resolved: None })
                    }
                }
            }

            Expression::Binary { span_id, left, op, right } => {
                let left = self.infer_expr(left);
                let right = self.infer_expr(right);
                let span = self.span_for(span_id);
                let ty = self.infer_binary(op.clone(), &left.ty, &right.ty, span);
                (ty, TypedExprKind::Binary { left: Box::new(left), op: op.clone(), right: Box::new(right) })
            }

            Expression::Unary { span_id, op, expr } => {
                let inner = self.infer_expr(expr);
                let span = self.span_for(span_id);
                let ty = match op {
                    UnaryOp::Not => self.unify_types(&Type::constant("Boolean"), &inner.ty, span),
                    UnaryOp::Neg | UnaryOp::Ref | UnaryOp::Deref => inner.ty.clone(),
                };
                (ty, TypedExprKind::Unary { op: op.clone(), expr: Box::new(inner) })
            }

            Expression::Call { span_id, func, args, .. } => {
                let func = self.infer_expr(func);
                let args: Vec<TypedExpr> = args.iter().map(|a| self.infer_expr(a)).collect();
                let ret = self.fresh_var();
                let expected = Type::func(args.iter().map(|a| a.ty.clone()).collect(), ret.clone());
                let span = self.span_for(span_id);
                self.unify_types(&func.ty, &expected, span);
                (self.apply(&ret), TypedExprKind::Call { func: Box::new(func), args })
            }

            Expression::MethodCall { receiver, method, args, .. } => {
                let receiver = self.infer_expr(receiver);
                let args: Vec<TypedExpr> = args.iter().map(|a| self.infer_expr(a)).collect();
                let (ret, resolved) = self.resolve_method_call(&receiver.ty, method, &args);
                (ret, TypedExprKind::MethodCall { receiver: Box::new(receiver), method: method.clone(), args, resolved })
            }

            Expression::FieldAccess { object, field } => {
                let object = self.infer_expr(object);
                let field_ty = self.infer_field_access(&object.ty, field);
                (field_ty, TypedExprKind::FieldAccess { object: Box::new(object), field: field.clone() })
            }

            Expression::Index { object, index } => {
                let object = self.infer_expr(object);
                let index = self.infer_expr(index);
                let ty = match self.apply(&object.ty) {
                    Type::Application { ctor, mut args } if matches!(ctor.as_ref(), Type::Constant { name, .. } if name == "List") => {
                        args.pop().unwrap_or_else(|| self.fresh_var())
                    }
                    Type::Application { ctor, args } if matches!(ctor.as_ref(), Type::Constant { name, .. } if name == "Map") => {
                        args.into_iter().nth(1).unwrap_or_else(|| self.fresh_var())
                    }
                    _ => self.fresh_var(),
                };
                (ty, TypedExprKind::Index { object: Box::new(object), index: Box::new(index) })
            }

            Expression::Array(elems) => {
                let elems: Vec<TypedExpr> = elems.iter().map(|e| self.infer_expr(e)).collect();
                let elem_ty = elems.iter().fold(self.fresh_var(), |acc, e| self.unify_types(&acc, &e.ty, Span::unknown()));
                (Type::apply(Type::constant("List"), vec![elem_ty]), TypedExprKind::List(elems))
            }

            Expression::ArrayRepeat(value, count) => {
                let value = self.infer_expr(value);
                self.infer_expr(count);
                (Type::apply(Type::constant("List"), vec![value.ty.clone()]), TypedExprKind::List(vec![value]))
            }

            Expression::MapLiteral(pairs) => {
                let key_var = self.fresh_var();
                let value_var = self.fresh_var();
                for (k, v) in pairs {
                    let k = self.infer_expr(k);
                    let v = self.infer_expr(v);
                    self.unify_types(&key_var, &k.ty, Span::unknown());
                    self.unify_types(&value_var, &v.ty, Span::unknown());
                }
                (Type::apply(Type::constant("Map"), vec![self.apply(&key_var), self.apply(&value_var)]), TypedExprKind::Opaque)
            }

            Expression::TupleLiteral(elems) => {
                let elems: Vec<TypedExpr> = elems.iter().map(|e| self.infer_expr(e)).collect();
                let ty = Type::Tuple(elems.iter().map(|e| e.ty.clone()).collect());
                (ty, TypedExprKind::Tuple(elems))
            }

            Expression::StructLiteral { name, fields, .. } => {
                let field_tys = self.struct_fields.get(name).cloned();
                if field_tys.is_none() {
                    self.diagnostics.emit_error(error_codes::UNDEFINED_TYPE, format!("unknown struct `{name}`"), Span::unknown());
                }
                let mut typed_fields = Vec::new();
                for (field_name, value) in fields {
                    let value = self.infer_expr(value);
                    if let Some(field_tys) = &field_tys {
                        if let Some(expected) = field_tys.get(field_name) {
                            self.unify_types(expected, &value.ty, Span::unknown());
                        }
                    }
                    typed_fields.push((field_name.clone(), value));
                }
                (Type::constant(name.clone()), TypedExprKind::StructLiteral { name: name.clone(), fields: typed_fields })
            }

            Expression::EnumLiteral { enum_name, variant, data } => {
                let payload = self.enum_variant_payload.get(&(enum_name.clone(), variant.clone())).cloned();
                let mut typed_data = Vec::new();
                for (i, value) in data.iter().enumerate() {
                    let value = self.infer_expr(value);
                    if let Some(payload) = &payload {
                        if let Some(expected) = payload.get(i) {
                            self.unify_types(expected, &value.ty, Span::unknown());
                        }
                    }
                    typed_data.push(value);
                }
                (Type::constant(enum_name.clone()), TypedExprKind::EnumLiteral { enum_name: enum_name.clone(), variant: variant.clone(), data: typed_data })
            }

            Expression::Range { start, end } | Expression::RangeInclusive { start, end } => {
                let elem = start
                    .as_ref()
                    .or(end.as_ref())
                    .map(|e| self.infer_expr(e).ty)
                    .unwrap_or_else(|| self.fresh_var());
                if let Some(s) = start {
                    let s = self.infer_expr(s);
                    self.unify_types(&elem, &s.ty, Span::unknown());
                }
                if let Some(e) = end {
                    let e = self.infer_expr(e);
                    self.unify_types(&elem, &e.ty, Span::unknown());
                }
                (Type::apply(Type::constant("Range"), vec![elem]), TypedExprKind::Opaque)
            }

            Expression::Reference { expr, .. } => {
                let inner = self.infer_expr(expr);
                let ty = inner.ty.clone();
                (ty, inner.kind)
            }
            Expression::Deref(expr) => {
                let inner = self.infer_expr(expr);
                let ty = inner.ty.clone();
                (ty, inner.kind)
            }
            Expression::Await(expr) => {
                let inner = self.infer_expr(expr);
                let ty = match self.apply(&inner.ty) {
                    Type::Application { ctor, mut args } if matches!(ctor.as_ref(), Type::Constant { name, .. } if name == "Task") => {
                        args.pop().unwrap_or_else(|| self.fresh_var())
                    }
                    other => other,
                };
                (ty, TypedExprKind::Opaque)
            }

            Expression::Match { value, arms } => {
                let scrutinee = self.infer_expr(value);
                self.infer_match(scrutinee, arms, id)
            }

            Expression::Block { statements, return_expr } => {
                self.symbols.push_scope();
                let statements: Vec<TypedStatement> = statements.iter().map(|s| self.analyze_statement(s)).collect();
                let ret = return_expr.as_ref().map(|e| self.infer_expr(e));
                self.symbols.pop_scope();
                let ty = ret.as_ref().map(|e| e.ty.clone()).unwrap_or_else(|| Type::Tuple(Vec::new()));
                (ty, TypedExprKind::Block(TypedBlock { statements }, ret.map(Box::new)))
            }

            Expression::Launch { args, grid, .. } => {
                for arg in args.iter().chain(grid.iter()) {
                    self.infer_expr(arg);
                }
                (self.fresh_var(), TypedExprKind::Opaque)
            }
            Expression::New(inner) => {
                let inner = self.infer_expr(inner);
                (inner.ty, TypedExprKind::Opaque)
            }
            Expression::Make { element_type, size } => {
                self.infer_expr(size);
                (Type::apply(Type::constant("List"), vec![self.lower_type(element_type)]), TypedExprKind::Opaque)
            }
            Expression::Cast { expr, target_type } => {
                self.infer_expr(expr);
                (self.lower_type(target_type), TypedExprKind::Opaque)
            }
            Expression::QuestionMark(inner) => {
                let inner = self.infer_expr(inner);
                let ty = match self.apply(&inner.ty) {
                    Type::Application { ctor, args } if matches!(ctor.as_ref(), Type::Constant { name, .. } if name == "Result" || name == "Option") => {
                        args.into_iter().next().unwrap_or_else(|| self.fresh_var())
                    }
                    other => other,
                };
                (ty, TypedExprKind::QuestionMark(Box::new(inner)))
            }
            Expression::Typeof(inner) => {
                let inner = self.infer_expr(inner);
                (Type::TypeValue(Box::new(inner.ty)), TypedExprKind::Opaque)
            }
            Expression::PostfixOp { expr, .. } => {
                let inner = self.infer_expr(expr);
                (inner.ty, TypedExprKind::Opaque)
            }
            Expression::ErrorNew(inner) => {
                self.infer_expr(inner);
                (Type::constant("Error"), TypedExprKind::Opaque)
            }

            Expression::Closure { params, return_type, body, .. } => {
                self.symbols.push_scope();
                let mut param_names = Vec::new();
                let mut param_tys = Vec::new();
                for p in params {
                    let ty = self.lower_type(&p.ty);
                    self.symbols.define(Symbol::new(p.name.clone(), SymbolKind::Variable, Scheme::monomorphic(ty.clone())));
                    param_names.push(p.name.clone());
                    param_tys.push(ty);
                }
                let body_typed = self.infer_expr(body);
                let ret = match return_type {
                    Some(t) => {
                        let declared = self.lower_type(t);
                        self.unify_types(&declared, &body_typed.ty, Span::unknown())
                    }
                    None => body_typed.ty.clone(),
                };
                self.symbols.pop_scope();
                (Type::func(param_tys, ret), TypedExprKind::Closure { params: param_names, body: Box::new(body_typed) })
            }

            Expression::RecordLiteral { fields, spread } => {
                let mut typed_fields = Vec::new();
                let mut field_tys = BTreeMap::new();
                for (name, value) in fields {
                    let value = self.infer_expr(value);
                    field_tys.insert(name.clone(), value.ty.clone());
                    typed_fields.push((name.clone(), value));
                }
                let spread_typed = spread.as_ref().map(|s| {
                    let s = self.infer_expr(s);
                    if let Type::Record(r) = self.apply(&s.ty) {
                        for (k, v) in r.fields {
                            field_tys.entry(k).or_insert(v);
                        }
                    }
                    s
                });
                let is_open = spread_typed.is_some();
                (
                    Type::Record(RecordType { fields: field_tys, row: None, is_open }),
                    TypedExprKind::RecordLiteral { fields: typed_fields, spread: spread_typed.map(Box::new) },
                )
            }

            Expression::Pipe { left, right } => {
                let left = self.infer_expr(left);
                let right = self.infer_expr(right);
                let ret = self.fresh_var();
                let expected = Type::func(vec![left.ty.clone()], ret.clone());
                self.unify_types(&right.ty, &expected, Span::unknown());
                (self.apply(&ret), TypedExprKind::Pipe { left: Box::new(left), right: Box::new(right) })
            }
            Expression::Bind { left, right } => {
                let left = self.infer_expr(left);
                let right = self.infer_expr(right);
                let inner = match self.apply(&left.ty) {
                    Type::Application { ctor, args } if matches!(ctor.as_ref(), Type::Constant { name, .. } if name == "Task" || name == "Option" || name == "Result") => {
                        args.into_iter().next().unwrap_or_else(|| self.fresh_var())
                    }
                    other => other,
                };
                let ret = self.fresh_var();
                let expected = Type::func(vec![inner], ret.clone());
                self.unify_types(&right.ty, &expected, Span::unknown());
                (self.apply(&ret), TypedExprKind::Bind { left: Box::new(left), right: Box::new(right) })
            }
        }
    }

    fn infer_binary(&mut self, op: BinaryOp, left: &Type, right: &Type, span: Span) -> Type {
        use BinaryOp::*;
        match op {
            Add => {
                let l = self.apply(left);
                let r = self.apply(right);
                if l.is_string_shape() && r.is_string_shape() {
                    self.unify_types(&l, &r, span)
                } else if l.is_string_shape() != r.is_string_shape() {
                    self.diagnostics.emit_error(
                        error_codes::TYPE_MISMATCH,
                        format!("`+` is not defined between `{l}` and `{r}`"),
                        span,
                    );
                    l
                } else {
                    self.unify_types(&l, &r, span)
                }
            }
            Sub | Mul | Div | Mod | BitAnd | BitOr | BitXor | Shl | Shr => self.unify_types(left, right, span),
            Eq | NotEq | Lt | LtEq | Gt | GtEq => {
                self.unify_types(left, right, span);
                Type::constant("Boolean")
            }
            And | Or => {
                self.unify_types(&Type::constant("Boolean"), left, span);
                self.unify_types(&Type::constant("Boolean"), right, span);
                Type::constant("Boolean")
            }
        }
    }

    fn infer_field_access(&mut self, object_ty: &Type, field: &str) -> Type {
        let applied = self.apply(object_ty);
        if let Some(head) = applied.head_name() {
            if let Some(fields) = self.struct_fields.get(head) {
                if let Some(ty) = fields.get(field) {
                    return ty.clone();
                }
            }
        }
        let field_var = self.fresh_var();
        let row = format!("row_field_{}_{field}", self.next_var);
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), field_var.clone());
        let open_record = Type::Record(RecordType { fields, row: Some(row), is_open: true });
        self.unify_types(&applied, &open_record, Span::unknown());
        self.apply(&field_var)
    }

    /// Resolves `method` on a value of `receiver_ty`. When the receiver's
    /// head is statically a concrete constructor, this picks the exact
    /// global the compiler should call — either an inherent/inline method
    /// (named `Head::method`, matching how [`analyze_item`] emits those
    /// bodies), or, when several trait impls exist for that head, the one
    /// `vex_symbols::TraitRegistry::resolve_method` says actually owns
    /// `method` (`Trait::Head::method` for an instance override,
    /// `Trait::method` for a trait default). Only when the receiver is
    /// still a bare type variable (generic code dispatching over a
    /// trait-bounded parameter) does this fall back to an unresolved
    /// witness-free guess — the compiler then does a bare global lookup by
    /// method name, which is only correct while a single instance exists.
    fn resolve_method_call(&mut self, receiver_ty: &Type, method: &str, args: &[TypedExpr]) -> (Type, Option<Symbol>) {
        let applied = self.apply(receiver_ty);
        if let Some(head) = applied.head_name().map(String::from) {
            if let Some(methods) = self.struct_methods.get(&head) {
                if let Some(scheme) = methods.get(method).cloned() {
                    return self.apply_method_scheme(scheme, args, Some(format!("{head}::{method}")));
                }
            }
            for trait_name in self.symbols.trait_registry().traits_for_head(&head).into_iter().map(String::from).collect::<Vec<_>>() {
                let Ok(descriptor) = self.symbols.trait_registry().trait_descriptor(&trait_name) else { continue };
                let Some(method_descriptor) = descriptor.methods.get(method).cloned() else { continue };
                let qualified = match self.symbols.trait_registry().resolve_method(&trait_name, &head, method) {
                    Ok(ResolvedMethod::Instance) => format!("{trait_name}::{head}::{method}"),
                    Ok(ResolvedMethod::Default) => format!("{trait_name}::{method}"),
                    Err(_) => continue,
                };
                return self.apply_method_scheme(method_descriptor.scheme, args, Some(qualified));
            }
        }
        if let Type::Variable { name, .. } = &applied {
            if let Some(bounds) = self.type_param_bounds.get(name).cloned() {
                for trait_name in bounds {
                    if let Ok(descriptor) = self.symbols.trait_registry().trait_descriptor(&trait_name) {
                        if let Some(method_descriptor) = descriptor.methods.get(method).cloned() {
                            // The receiver is a bare type variable: no witness is
                            // threaded through the call, so a concrete target can
                            // only be picked when exactly one instance exists.
                            // With several, leave this unresolved rather than
                            // guess — the compiler's bare-name fallback then
                            // raises a clean "no such global" at call time
                            // instead of silently invoking the wrong instance.
                            let implementors = self.symbols.trait_registry().implementors(&trait_name);
                            let resolved_name = match implementors.as_slice() {
                                [only] => {
                                    let head = only.to_string();
                                    match self.symbols.trait_registry().resolve_method(&trait_name, &head, method) {
                                        Ok(ResolvedMethod::Instance) => Some(format!("{trait_name}::{head}::{method}")),
                                        Ok(ResolvedMethod::Default) => Some(format!("{trait_name}::{method}")),
                                        Err(_) => None,
                                    }
                                }
                                _ => None,
                            };
                            return self.apply_method_scheme(method_descriptor.scheme, args, resolved_name);
                        }
                    }
                }
            }
        }
        self.diagnostics.emit_error(
            error_codes::NO_SUCH_METHOD,
            format!("no method `{method}` found on `{applied}`"),
            Span::unknown(),
        );
        (self.fresh_var(), None)
    }

    /// `resolved_name`, when present, is the exact compiled global this call
    /// should invoke — `None` only for the still-unresolved generic-witness
    /// case documented on [`resolve_method_call`].
    fn apply_method_scheme(&mut self, scheme: Scheme, args: &[TypedExpr], resolved_name: Option<String>) -> (Type, Option<Symbol>) {
        let mut next = self.next_var;
        let (ty, _constraints) = scheme.instantiate(&mut || {
            let v = format!("t{next}");
            next += 1;
            v
        });
        self.next_var = next;
        let ret = self.fresh_var();
        let expected = Type::func(args.iter().map(|a| a.ty.clone()).collect(), ret.clone());
        self.unify_types(&ty, &expected, Span::unknown());
        let resolved_ty = self.apply(&ty);
        let resolved = resolved_name.map(|name| Symbol::new(name, SymbolKind::Function, Scheme::monomorphic(resolved_ty)));
        (self.apply(&ret), resolved)
    }

    fn infer_match(&mut self, scrutinee: TypedExpr, arms: &[vex_ast::MatchArm], _id: NodeId) -> (Type, TypedExprKind) {
        let pattern_refs: Vec<&Pattern> = arms.iter().map(|a| &a.pattern).collect();
        let (covered, catch_all) = patterns::covered_variants(&pattern_refs);
        if let Some(head) = self.apply(&scrutinee.ty).head_name().map(String::from) {
            if let Some(all_variants) = self.enum_variants.get(&head).cloned() {
                let missing = exhaustiveness::missing_variants(&all_variants, &covered, catch_all);
                if !missing.is_empty() {
                    let message = format!("non-exhaustive match: missing {}", missing.join(", "));
                    if self.config.non_exhaustive_match_is_error {
                        self.diagnostics.emit_error(error_codes::NON_EXHAUSTIVE, message, Span::unknown());
                    } else {
                        self.diagnostics.emit_warning(error_codes::NON_EXHAUSTIVE, message, Span::unknown());
                    }
                }
            }
        }

        let result_var = self.fresh_var();
        let mut typed_arms = Vec::new();
        for arm in arms {
            self.symbols.push_scope();
            let scrutinee_ty = scrutinee.ty.clone();
            let pattern = self.check_pattern(&arm.pattern, &scrutinee_ty, true);
            let guard = arm.guard.as_ref().map(|g| {
                let g = self.infer_expr(g);
                self.unify_types(&Type::constant("Boolean"), &g.ty, Span::unknown());
                g
            });
            let body = self.infer_expr(&arm.body);
            self.unify_types(&result_var, &body.ty, Span::unknown());
            self.symbols.pop_scope();
            typed_arms.push(TypedMatchArm { pattern, guard, body });
        }
        (self.apply(&result_var), TypedExprKind::Match { value: Box::new(scrutinee), arms: typed_arms })
    }
}

impl TypedStatement {
    /// The type of a trailing expression statement, used to infer a
    /// function's return type from its body when no annotation is given.
    fn trailing_type(&self) -> Option<Type> {
        match self {
            TypedStatement::Expression(expr) => Some(expr.ty.clone()),
            TypedStatement::Return(Some(expr)) => Some(expr.ty.clone()),
            _ => None,
        }
    }
}
