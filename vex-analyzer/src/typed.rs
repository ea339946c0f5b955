//! The analyzer's output tree.
//!
//! `vex-ast` gives node identity to only a handful of expression/statement
//! variants (`Binary`, `Unary`, `Call`, `If`, `For`, `While` carry a
//! `span_id`); most forms — `Ident`, field access, match, record literals,
//! closures — have none. A side-table keyed by that partial identity
//! couldn't cover the "per-node type map" and "per-node resolution map" the
//! analyzer is required to produce (spec.md §4.5).
//!
//! Instead the analyzer builds a parallel tree that mirrors `vex_ast`'s
//! shape but carries a fresh [`NodeId`] and inferred [`vex_types::Type`] on
//! every expression, plus a resolved [`vex_symbols::Symbol`] on every
//! identifier reference. `type_map`/`resolution_map` (flat `BTreeMap`s keyed
//! by `NodeId`) are derived from this tree after the walk and are what a
//! compiler or LSP host actually looks up by id — the tree itself is the
//! source of truth, the maps are a convenience projection of it.

use std::collections::BTreeMap;

use vex_symbols::Symbol;
use vex_types::Type;

/// Identifies one node in a [`TypedProgram`]. Assigned in visitation order,
/// so two analyses of byte-identical input assign byte-identical ids
/// (spec.md §8 determinism).
pub type NodeId = u32;

#[derive(Debug, Clone)]
pub struct TypedProgram {
    pub items: Vec<TypedItem>,
    pub type_map: BTreeMap<NodeId, Type>,
    pub resolution_map: BTreeMap<NodeId, Symbol>,
}

#[derive(Debug, Clone)]
pub enum TypedItem {
    Function(TypedFunction),
    /// Structs, traits, trait impls, enums, type aliases, consts and the
    /// teacher-only declaration forms (externs, policies, exports) don't
    /// carry per-expression inference beyond their bodies; those bodies are
    /// folded into the relevant `TypedFunction`/`TypedExpr` nodes and the
    /// declaration itself is recorded only for completeness of the output
    /// tree.
    Other(String),
}

#[derive(Debug, Clone)]
pub struct TypedFunction {
    pub name: String,
    pub scheme: vex_types::Scheme,
    pub params: Vec<TypedParam>,
    /// The last entry in `params` collects any extra trailing arguments into
    /// a list, e.g. `fn format(template: String, args: ...Any)`.
    pub is_variadic: bool,
    pub body: TypedBlock,
}

/// One formal parameter. `default`, when present, is evaluated at call time
/// only for arguments the caller actually omitted (spec.md §4.6).
#[derive(Debug, Clone)]
pub struct TypedParam {
    pub name: String,
    pub default: Option<TypedExpr>,
}

#[derive(Debug, Clone)]
pub struct TypedBlock {
    pub statements: Vec<TypedStatement>,
}

#[derive(Debug, Clone)]
pub struct TypedExpr {
    pub id: NodeId,
    pub ty: Type,
    pub kind: TypedExprKind,
}

#[derive(Debug, Clone)]
pub enum TypedExprKind {
    IntLiteral(i64),
    BigIntLiteral(String),
    FloatLiteral(f64),
    StringLiteral(String),
    BoolLiteral(bool),
    CharLiteral(char),
    Nil,
    Ident { name: String, resolved: Option<Symbol> },
    Binary { left: Box<TypedExpr>, op: vex_ast::BinaryOp, right: Box<TypedExpr> },
    Unary { op: vex_ast::UnaryOp, expr: Box<TypedExpr> },
    Call { func: Box<TypedExpr>, args: Vec<TypedExpr> },
    MethodCall { receiver: Box<TypedExpr>, method: String, args: Vec<TypedExpr>, resolved: Option<Symbol> },
    FieldAccess { object: Box<TypedExpr>, field: String },
    Index { object: Box<TypedExpr>, index: Box<TypedExpr> },
    Tuple(Vec<TypedExpr>),
    List(Vec<TypedExpr>),
    RecordLiteral { fields: Vec<(String, TypedExpr)>, spread: Option<Box<TypedExpr>> },
    StructLiteral { name: String, fields: Vec<(String, TypedExpr)> },
    EnumLiteral { enum_name: String, variant: String, data: Vec<TypedExpr> },
    Match { value: Box<TypedExpr>, arms: Vec<TypedMatchArm> },
    Block(TypedBlock, Option<Box<TypedExpr>>),
    Closure { params: Vec<String>, body: Box<TypedExpr> },
    QuestionMark(Box<TypedExpr>),
    Pipe { left: Box<TypedExpr>, right: Box<TypedExpr> },
    Bind { left: Box<TypedExpr>, right: Box<TypedExpr> },
    /// A construct outside the core language the analyzer types permissively
    /// (e.g. teacher-only GPU/FFI/concurrency surface): carries the
    /// best-effort type but no further structure.
    Opaque,
}

#[derive(Debug, Clone)]
pub struct TypedMatchArm {
    pub pattern: TypedPattern,
    pub guard: Option<TypedExpr>,
    pub body: TypedExpr,
}

#[derive(Debug, Clone)]
pub struct TypedPattern {
    pub id: NodeId,
    pub ty: Type,
    pub bindings: Vec<(String, Type)>,
    pub kind: TypedPatternKind,
}

/// Mirrors `vex_ast::Pattern`'s shape so a compiler can lower a match arm
/// into test-then-bind bytecode directly off this tree, without walking back
/// to the untyped AST (spec.md §4.6).
#[derive(Debug, Clone)]
pub enum TypedPatternKind {
    Wildcard,
    Literal(Box<TypedExpr>),
    Ident(String),
    Tuple(Vec<TypedPattern>),
    Struct { name: String, fields: Vec<(String, TypedPattern)> },
    Enum { name: String, variant: String, data: Vec<TypedPattern> },
    Array { elements: Vec<TypedPattern>, rest: Option<String> },
    Or(Vec<TypedPattern>),
    Record { fields: Vec<(String, TypedPattern)>, open: bool },
}

#[derive(Debug, Clone)]
pub enum TypedStatement {
    Let { name: String, value: TypedExpr },
    Assign { target: TypedExpr, value: TypedExpr },
    Return(Option<TypedExpr>),
    Expression(TypedExpr),
    If { condition: TypedExpr, then_block: TypedBlock, else_block: Option<TypedBlock> },
    While { condition: TypedExpr, body: TypedBlock },
    ForIn { variable: String, iterable: TypedExpr, body: TypedBlock },
    PatternAssign { pattern: TypedPattern, value: TypedExpr },
    Other,
}
