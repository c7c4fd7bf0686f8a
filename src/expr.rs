//! Expression type checking: every `sqlparser` `Expr` node maps to an
//! `InferredType` or a positioned error.

use sqlparser::ast::{BinaryOperator, Expr, UnaryOperator, Value};

use crate::error::Error;
use crate::infer::InferenceContext;
use crate::refs::ReferencedTables;
use crate::schema::SchemaModel;
use crate::scope::{InferredQuery, Scope};
use crate::span::{at, PositionedError, Span};
use crate::ty::{BaseType, InferredType};

pub fn infer_expr(
    ctx: &mut InferenceContext,
    schema: &dyn SchemaModel,
    scope: &Scope,
    refs: &mut ReferencedTables,
    expr: &Expr,
) -> Result<InferredType, PositionedError> {
    let span = Span::of(expr);

    match expr {
        Expr::Value(v) => infer_value(ctx, &v.value, span),
        Expr::Identifier(ident) => Ok(scope.resolve_unqualified(span, &ident.value)?.inferred_type),
        Expr::CompoundIdentifier(parts) => {
            let [qualifier, column] = parts.as_slice() else {
                return Err(PositionedError::new(
                    span,
                    Error::Unsupported("compound identifier with more than two parts".to_string()),
                ));
            };
            Ok(scope
                .resolve_qualified(span, &qualifier.value, &column.value)?
                .inferred_type)
        }
        Expr::Nested(inner) => infer_expr(ctx, schema, scope, refs, inner),
        Expr::BinaryOp { left, right, op } => {
            let l = infer_expr(ctx, schema, scope, refs, left)?;
            let r = infer_expr(ctx, schema, scope, refs, right)?;
            infer_binary_op(ctx, op, l, r).map_err(at(span))
        }
        Expr::UnaryOp { expr: inner, op } => infer_unary_op(ctx, schema, scope, refs, op, inner, span),
        Expr::IsNull(inner) | Expr::IsNotNull(inner) => {
            infer_expr(ctx, schema, scope, refs, inner)?;
            Ok(InferredType::concrete(BaseType::Boolean, false))
        }
        Expr::IsTrue(inner)
        | Expr::IsFalse(inner)
        | Expr::IsNotTrue(inner)
        | Expr::IsNotFalse(inner)
        | Expr::IsUnknown(inner)
        | Expr::IsNotUnknown(inner) => {
            let t = infer_expr(ctx, schema, scope, refs, inner)?;
            ctx.unify_base(t, BaseType::Boolean).map_err(at(span))?;
            Ok(InferredType::concrete(BaseType::Boolean, false))
        }
        Expr::IsDistinctFrom(left, right) | Expr::IsNotDistinctFrom(left, right) => {
            let l = infer_expr(ctx, schema, scope, refs, left)?;
            let r = infer_expr(ctx, schema, scope, refs, right)?;
            ctx.unify(l, r).map_err(at(span))?;
            Ok(InferredType::concrete(BaseType::Boolean, false))
        }
        Expr::Like { expr: inner, pattern, .. } | Expr::ILike { expr: inner, pattern, .. } => {
            infer_similarity(ctx, schema, scope, refs, inner, pattern, span)
        }
        Expr::SimilarTo { expr: inner, pattern, .. } => {
            infer_similarity(ctx, schema, scope, refs, inner, pattern, span)
        }
        Expr::Between { expr: inner, low, high, .. } => {
            let input = infer_expr(ctx, schema, scope, refs, inner)?;
            let low_t = infer_expr(ctx, schema, scope, refs, low)?;
            let high_t = infer_expr(ctx, schema, scope, refs, high)?;
            let unified = ctx
                .unify_all([input, low_t, high_t])
                .map_err(at(span))?;
            Ok(InferredType::dependent(unified, BaseType::Boolean))
        }
        Expr::InList { expr: inner, list, .. } => {
            let input = infer_expr(ctx, schema, scope, refs, inner)?;
            let mut unified = input;
            for item in list {
                let item_t = infer_expr(ctx, schema, scope, refs, item)?;
                unified = ctx.unify(unified, item_t).map_err(at(span))?;
            }
            Ok(InferredType::dependent(unified, BaseType::Boolean))
        }
        Expr::InSubquery { expr: inner, subquery, .. } => {
            let input = infer_expr(ctx, schema, scope, refs, inner)?;
            let sub = crate::query::infer_query(ctx, schema, scope, subquery, refs)?;
            let sub_ty = require_single_column(&sub, span)?;
            let unified = ctx.unify(input, sub_ty).map_err(at(span))?;
            Ok(InferredType::dependent(unified, BaseType::Boolean))
        }
        Expr::Exists { subquery, .. } => {
            crate::query::infer_query(ctx, schema, scope, subquery, refs)?;
            Ok(InferredType::concrete(BaseType::Boolean, false))
        }
        Expr::Subquery(query) => {
            let sub = crate::query::infer_query(ctx, schema, scope, query, refs)?;
            require_single_column(&sub, span)
        }
        Expr::Case {
            operand,
            conditions,
            else_result,
        } => infer_case(ctx, schema, scope, refs, operand, conditions, else_result, span),
        Expr::Cast {
            expr: inner, data_type, ..
        } => {
            let base: BaseType = data_type.clone().into();
            let inner_t = infer_expr(ctx, schema, scope, refs, inner)?;
            let nullable = ctx.concrete(&inner_t).nullable;
            Ok(InferredType::concrete(base, nullable))
        }
        Expr::Collate { expr: inner, .. } => {
            let t = infer_expr(ctx, schema, scope, refs, inner)?;
            ctx.unify_base(t, BaseType::String).map_err(at(span))
        }
        Expr::Function(func) => crate::func::check_call(ctx, schema, func, span, |e, ctx| {
            infer_expr(ctx, schema, scope, refs, e)
        }),
        other => Err(PositionedError::new(
            span,
            Error::Unsupported(format!("expression form: {other}")),
        )),
    }
}

fn infer_similarity(
    ctx: &mut InferenceContext,
    schema: &dyn SchemaModel,
    scope: &Scope,
    refs: &mut ReferencedTables,
    input: &Expr,
    pattern: &Expr,
    span: Span,
) -> Result<InferredType, PositionedError> {
    let input_t = infer_expr(ctx, schema, scope, refs, input)?;
    let pattern_t = infer_expr(ctx, schema, scope, refs, pattern)?;
    let input_s = ctx.unify_base(input_t, BaseType::String).map_err(at(span))?;
    let pattern_s = ctx.unify_base(pattern_t, BaseType::String).map_err(at(span))?;
    let unified = ctx.unify(input_s, pattern_s).map_err(at(span))?;
    Ok(InferredType::dependent(unified, BaseType::Boolean))
}

fn infer_case(
    ctx: &mut InferenceContext,
    schema: &dyn SchemaModel,
    scope: &Scope,
    refs: &mut ReferencedTables,
    operand: &Option<Box<Expr>>,
    conditions: &[sqlparser::ast::CaseWhen],
    else_result: &Option<Box<Expr>>,
    span: Span,
) -> Result<InferredType, PositionedError> {
    let operand_ty = operand
        .as_ref()
        .map(|o| infer_expr(ctx, schema, scope, refs, o))
        .transpose()?;

    let mut output = InferredType::any();
    for when in conditions {
        let condition_ty = infer_expr(ctx, schema, scope, refs, &when.condition)?;
        match &operand_ty {
            Some(o) => {
                ctx.unify(o.clone(), condition_ty).map_err(at(span))?;
            }
            None => {
                ctx.unify_base(condition_ty, BaseType::Boolean).map_err(at(span))?;
            }
        }
        let result_ty = infer_expr(ctx, schema, scope, refs, &when.result)?;
        output = ctx.unify(output, result_ty).map_err(at(span))?;
    }

    output = match else_result {
        Some(e) => {
            let else_ty = infer_expr(ctx, schema, scope, refs, e)?;
            ctx.unify(output, else_ty).map_err(at(span))?
        }
        None => ctx
            .unify(output, InferredType::concrete(BaseType::Any, true))
            .map_err(at(span))?,
    };

    Ok(output)
}

fn infer_unary_op(
    ctx: &mut InferenceContext,
    schema: &dyn SchemaModel,
    scope: &Scope,
    refs: &mut ReferencedTables,
    op: &UnaryOperator,
    inner: &Expr,
    span: Span,
) -> Result<InferredType, PositionedError> {
    let t = infer_expr(ctx, schema, scope, refs, inner)?;
    match op {
        UnaryOperator::Not => ctx.unify_base(t, BaseType::Boolean).map_err(at(span)),
        _ => ctx.unify_base(t, BaseType::Number).map_err(at(span)),
    }
}

fn infer_binary_op(
    ctx: &mut InferenceContext,
    op: &BinaryOperator,
    left: InferredType,
    right: InferredType,
) -> Result<InferredType, Error> {
    use BinaryOperator::*;
    match op {
        StringConcat => {
            let l = ctx.unify_base(left, BaseType::String)?;
            let r = ctx.unify_base(right, BaseType::String)?;
            ctx.unify(l, r)
        }
        Plus | Minus | Multiply | Divide => {
            let l = ctx.unify_base(left, BaseType::Number)?;
            let r = ctx.unify_base(right, BaseType::Number)?;
            ctx.unify(l, r)
        }
        Modulo | BitwiseAnd | BitwiseOr | BitwiseXor => {
            let l = ctx.unify_base(left, BaseType::Integer)?;
            let r = ctx.unify_base(right, BaseType::Integer)?;
            ctx.unify(l, r)
        }
        Gt | Lt | GtEq | LtEq | Eq | NotEq | Spaceship => {
            let unified = ctx.unify(left, right)?;
            Ok(InferredType::dependent(unified, BaseType::Boolean))
        }
        And | Or | Xor => {
            let l = ctx.unify_base(left, BaseType::Boolean)?;
            let r = ctx.unify_base(right, BaseType::Boolean)?;
            ctx.unify(l, r)
        }
        other => Err(Error::Unsupported(format!("binary operator {other:?}"))),
    }
}

fn require_single_column(query: &InferredQuery, span: Span) -> Result<InferredType, PositionedError> {
    match query.columns.as_slice() {
        [only] => Ok(only.inferred_type.clone()),
        other => Err(PositionedError::new(span, Error::NotASingleColumn(other.len()))),
    }
}

fn infer_value(ctx: &mut InferenceContext, value: &Value, span: Span) -> Result<InferredType, PositionedError> {
    match value {
        Value::Number(s, _) => {
            let base = if s.contains('.') || s.to_ascii_lowercase().contains('e') {
                BaseType::Float
            } else {
                BaseType::Integer
            };
            Ok(InferredType::concrete(base, false))
        }
        Value::SingleQuotedString(_)
        | Value::DoubleQuotedString(_)
        | Value::NationalStringLiteral(_) => Ok(InferredType::concrete(BaseType::String, false)),
        Value::HexStringLiteral(_)
        | Value::SingleQuotedByteStringLiteral(_)
        | Value::DoubleQuotedByteStringLiteral(_) => Ok(InferredType::concrete(BaseType::Blob, false)),
        Value::Boolean(_) => Ok(InferredType::concrete(BaseType::Boolean, false)),
        Value::Null => Ok(InferredType::concrete(BaseType::Any, true)),
        Value::Placeholder(name) => Ok(ctx.variable(name)),
        other => Err(PositionedError::new(span, Error::Unsupported(format!("literal: {other:?}")))),
    }
}
