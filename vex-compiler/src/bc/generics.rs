//! On-demand monomorphization: a generic function is compiled once per
//! concrete instantiation the program actually calls, named
//! `name$<mangled type args>` (spec.md §4.6, §9), the same mangle-and-cache
//! idiom as the teacher's `codegen_ast::generics::instantiate_generic_function`,
//! adapted from LLVM `FunctionValue`s to `vex_bytecode::FunctionDescriptor`s.

use vex_analyzer::{TypedBlock, TypedExpr, TypedExprKind, TypedFunction, TypedMatchArm, TypedParam, TypedPattern, TypedPatternKind, TypedStatement};
use vex_types::{Substitution, Type};

pub(super) fn mangle(name: &str, type_args: &[Type]) -> String {
    if type_args.is_empty() {
        return name.to_string();
    }
    let parts: Vec<String> = type_args.iter().map(|t| t.to_string()).collect();
    format!("{name}${}", parts.join("_"))
}

/// Produces a copy of `func` with every inferred type in its body rewritten
/// through `subst`. Node identity, bindings and resolved symbols are kept —
/// only the `Type`s attached to each node change, which is all a
/// monomorphized instantiation needs (the structure of the body is
/// identical across instantiations).
pub(super) fn substitute_function(func: &TypedFunction, subst: &Substitution) -> TypedFunction {
    TypedFunction {
        name: func.name.clone(),
        scheme: func.scheme.clone(),
        params: func
            .params
            .iter()
            .map(|p| TypedParam { name: p.name.clone(), default: p.default.as_ref().map(|d| subst_expr(d, subst)) })
            .collect(),
        is_variadic: func.is_variadic,
        body: subst_block(&func.body, subst),
    }
}

fn subst_block(block: &TypedBlock, subst: &Substitution) -> TypedBlock {
    TypedBlock { statements: block.statements.iter().map(|s| subst_stmt(s, subst)).collect() }
}

fn subst_stmt(stmt: &TypedStatement, subst: &Substitution) -> TypedStatement {
    match stmt {
        TypedStatement::Let { name, value } => {
            TypedStatement::Let { name: name.clone(), value: subst_expr(value, subst) }
        }
        TypedStatement::Assign { target, value } => {
            TypedStatement::Assign { target: subst_expr(target, subst), value: subst_expr(value, subst) }
        }
        TypedStatement::Return(value) => TypedStatement::Return(value.as_ref().map(|v| subst_expr(v, subst))),
        TypedStatement::Expression(e) => TypedStatement::Expression(subst_expr(e, subst)),
        TypedStatement::If { condition, then_block, else_block } => TypedStatement::If {
            condition: subst_expr(condition, subst),
            then_block: subst_block(then_block, subst),
            else_block: else_block.as_ref().map(|b| subst_block(b, subst)),
        },
        TypedStatement::While { condition, body } => {
            TypedStatement::While { condition: subst_expr(condition, subst), body: subst_block(body, subst) }
        }
        TypedStatement::ForIn { variable, iterable, body } => TypedStatement::ForIn {
            variable: variable.clone(),
            iterable: subst_expr(iterable, subst),
            body: subst_block(body, subst),
        },
        TypedStatement::PatternAssign { pattern, value } => {
            TypedStatement::PatternAssign { pattern: subst_pattern(pattern, subst), value: subst_expr(value, subst) }
        }
        TypedStatement::Other => TypedStatement::Other,
    }
}

fn subst_expr(expr: &TypedExpr, subst: &Substitution) -> TypedExpr {
    let kind = match &expr.kind {
        TypedExprKind::Binary { left, op, right } => {
            TypedExprKind::Binary { left: Box::new(subst_expr(left, subst)), op: op.clone(), right: Box::new(subst_expr(right, subst)) }
        }
        TypedExprKind::Unary { op, expr: inner } => {
            TypedExprKind::Unary { op: op.clone(), expr: Box::new(subst_expr(inner, subst)) }
        }
        TypedExprKind::Call { func, args } => {
            TypedExprKind::Call { func: Box::new(subst_expr(func, subst)), args: args.iter().map(|a| subst_expr(a, subst)).collect() }
        }
        TypedExprKind::MethodCall { receiver, method, args, resolved } => TypedExprKind::MethodCall {
            receiver: Box::new(subst_expr(receiver, subst)),
            method: method.clone(),
            args: args.iter().map(|a| subst_expr(a, subst)).collect(),
            resolved: resolved.clone(),
        },
        TypedExprKind::FieldAccess { object, field } => {
            TypedExprKind::FieldAccess { object: Box::new(subst_expr(object, subst)), field: field.clone() }
        }
        TypedExprKind::Index { object, index } => {
            TypedExprKind::Index { object: Box::new(subst_expr(object, subst)), index: Box::new(subst_expr(index, subst)) }
        }
        TypedExprKind::Tuple(items) => TypedExprKind::Tuple(items.iter().map(|e| subst_expr(e, subst)).collect()),
        TypedExprKind::List(items) => TypedExprKind::List(items.iter().map(|e| subst_expr(e, subst)).collect()),
        TypedExprKind::RecordLiteral { fields, spread } => TypedExprKind::RecordLiteral {
            fields: fields.iter().map(|(n, e)| (n.clone(), subst_expr(e, subst))).collect(),
            spread: spread.as_ref().map(|s| Box::new(subst_expr(s, subst))),
        },
        TypedExprKind::StructLiteral { name, fields } => TypedExprKind::StructLiteral {
            name: name.clone(),
            fields: fields.iter().map(|(n, e)| (n.clone(), subst_expr(e, subst))).collect(),
        },
        TypedExprKind::EnumLiteral { enum_name, variant, data } => TypedExprKind::EnumLiteral {
            enum_name: enum_name.clone(),
            variant: variant.clone(),
            data: data.iter().map(|e| subst_expr(e, subst)).collect(),
        },
        TypedExprKind::Match { value, arms } => TypedExprKind::Match {
            value: Box::new(subst_expr(value, subst)),
            arms: arms.iter().map(|a| subst_arm(a, subst)).collect(),
        },
        TypedExprKind::Block(block, trailing) => {
            TypedExprKind::Block(subst_block(block, subst), trailing.as_ref().map(|t| Box::new(subst_expr(t, subst))))
        }
        TypedExprKind::Closure { params, body } => {
            TypedExprKind::Closure { params: params.clone(), body: Box::new(subst_expr(body, subst)) }
        }
        TypedExprKind::QuestionMark(inner) => TypedExprKind::QuestionMark(Box::new(subst_expr(inner, subst))),
        TypedExprKind::Pipe { left, right } => {
            TypedExprKind::Pipe { left: Box::new(subst_expr(left, subst)), right: Box::new(subst_expr(right, subst)) }
        }
        TypedExprKind::Bind { left, right } => {
            TypedExprKind::Bind { left: Box::new(subst_expr(left, subst)), right: Box::new(subst_expr(right, subst)) }
        }
        leaf => leaf.clone(),
    };
    TypedExpr { id: expr.id, ty: subst.apply(&expr.ty), kind }
}

fn subst_arm(arm: &TypedMatchArm, subst: &Substitution) -> TypedMatchArm {
    TypedMatchArm {
        pattern: subst_pattern(&arm.pattern, subst),
        guard: arm.guard.as_ref().map(|g| subst_expr(g, subst)),
        body: subst_expr(&arm.body, subst),
    }
}

fn subst_pattern(pattern: &TypedPattern, subst: &Substitution) -> TypedPattern {
    let kind = match &pattern.kind {
        TypedPatternKind::Tuple(subs) => TypedPatternKind::Tuple(subs.iter().map(|p| subst_pattern(p, subst)).collect()),
        TypedPatternKind::Struct { name, fields } => TypedPatternKind::Struct {
            name: name.clone(),
            fields: fields.iter().map(|(n, p)| (n.clone(), subst_pattern(p, subst))).collect(),
        },
        TypedPatternKind::Enum { name, variant, data } => TypedPatternKind::Enum {
            name: name.clone(),
            variant: variant.clone(),
            data: data.iter().map(|p| subst_pattern(p, subst)).collect(),
        },
        TypedPatternKind::Array { elements, rest } => TypedPatternKind::Array {
            elements: elements.iter().map(|p| subst_pattern(p, subst)).collect(),
            rest: rest.clone(),
        },
        TypedPatternKind::Or(subs) => TypedPatternKind::Or(subs.iter().map(|p| subst_pattern(p, subst)).collect()),
        TypedPatternKind::Record { fields, open } => TypedPatternKind::Record {
            fields: fields.iter().map(|(n, p)| (n.clone(), subst_pattern(p, subst))).collect(),
            open: *open,
        },
        TypedPatternKind::Literal(expr) => TypedPatternKind::Literal(Box::new(subst_expr(expr, subst))),
        TypedPatternKind::Wildcard => TypedPatternKind::Wildcard,
        TypedPatternKind::Ident(name) => TypedPatternKind::Ident(name.clone()),
    };
    TypedPattern {
        id: pattern.id,
        ty: subst.apply(&pattern.ty),
        bindings: pattern.bindings.iter().map(|(n, t)| (n.clone(), subst.apply(t))).collect(),
        kind,
    }
}
