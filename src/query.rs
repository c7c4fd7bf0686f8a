//! Query-level checking: SELECT cores, compound queries (`UNION` and
//! friends), `VALUES`, CTEs, table expressions, `JOIN` validation, and the
//! two public entry points.

use std::collections::HashSet;

use indexmap::IndexMap;
use sqlparser::ast::{
    Expr, GroupByExpr, JoinConstraint, JoinOperator, LimitClause, OrderByKind, Query, Select, SelectItem,
    SelectItemQualifiedWildcardKind, SetExpr, Statement, TableFactor, TableWithJoins, Values,
};
use sqlparser::parser::Parser;

use crate::error::Error;
use crate::expr::infer_expr;
use crate::infer::InferenceContext;
use crate::name::Name;
use crate::refs::ReferencedTables;
use crate::schema::{DialectKind, SchemaModel};
use crate::scope::{FromScope, InferredQuery, InferredQueryColumn, Scope};
use crate::span::{at, PositionedError, Span};
use crate::ty::{BaseType, InferredType};

/// The full result of checking one top-level statement: its output shape
/// plus every schema table it touched.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub query: InferredQuery,
    pub referenced_tables: ReferencedTables,
}

/// Parse and check a single `SELECT` statement against a schema.
///
/// Any other statement kind is rejected: this checker's scope is read-only
/// query analysis, never DDL/DML execution.
pub fn check_query(schema: &dyn SchemaModel, dialect: DialectKind, sql: &str) -> Result<CheckResult, PositionedError> {
    tracing::debug!(dialect = ?dialect, "checking query");

    let parser_dialect = dialect.parser_dialect();
    let mut statements = Parser::new(&*parser_dialect)
        .try_with_sql(sql)
        .map_err(|e| PositionedError::new(Span::UNKNOWN, e.into()))?
        .parse_statements()
        .map_err(|e| PositionedError::new(Span::UNKNOWN, e.into()))?;

    if statements.len() != 1 {
        return Err(PositionedError::new(
            Span::UNKNOWN,
            Error::Unsupported("expected exactly one statement".to_string()),
        ));
    }

    match statements.remove(0) {
        Statement::Query(query) => infer_top_level_query(schema, &query),
        other => {
            tracing::warn!(statement = %other, "rejecting non-query statement");
            Err(PositionedError::new(
                Span::UNKNOWN,
                Error::Unsupported(format!("statement kind: {other}")),
            ))
        }
    }
}

/// Check an already-parsed top-level [`Query`], starting a fresh inference
/// context and an empty reference-tables set.
pub fn infer_top_level_query(schema: &dyn SchemaModel, query: &Query) -> Result<CheckResult, PositionedError> {
    let mut ctx = InferenceContext::new();
    let mut refs = ReferencedTables::new();
    let root = Scope::root(FromScope::new(), IndexMap::new());
    let inferred = infer_query(&mut ctx, schema, &root, query, &mut refs)?;
    let query = concrete_query(&mut ctx, &inferred);
    Ok(CheckResult {
        query,
        referenced_tables: refs,
    })
}

/// Check one `Query` node (top-level or a subquery) against `scope`, which
/// supplies both the CTEs already visible at this nesting level and, via its
/// `parent` chain, the outer columns a correlated subquery may reference.
pub fn infer_query(
    ctx: &mut InferenceContext,
    schema: &dyn SchemaModel,
    scope: &Scope,
    query: &Query,
    refs: &mut ReferencedTables,
) -> Result<InferredQuery, PositionedError> {
    let span = Span::of(query);

    // Each CTE is checked against the CTEs already accumulated, so later
    // CTEs (and the statement's own body) can reference earlier ones. The
    // statement's outer scope is reachable the whole time via `parent`, so a
    // CTE body can itself be correlated.
    let mut ctes = scope.ctes.clone();
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            let cte_scope = Scope {
                from: FromScope::new(),
                ctes: ctes.clone(),
                parent: Some(scope),
            };
            let mut inferred = infer_query(ctx, schema, &cte_scope, &cte.query, refs)?;
            if !cte.alias.columns.is_empty() {
                let names: Vec<Name> = cte
                    .alias
                    .columns
                    .iter()
                    .map(|c| Name::new(c.name.value.clone()))
                    .collect();
                inferred = inferred.rename(&names);
            }
            ctes.insert(Name::new(cte.alias.name.value.clone()), inferred);
        }
    }

    let body_scope = Scope {
        from: FromScope::new(),
        ctes: ctes.clone(),
        parent: Some(scope),
    };

    let result = infer_set_expr(ctx, schema, &body_scope, &query.body, refs, span)?;

    // `ORDER BY` sees only the query's own output columns, under a single
    // anonymous binding: a deliberate simplification relative to SQLite,
    // which also lets a non-compound `SELECT`'s `ORDER BY` reach columns
    // that never made it into the select list.
    if let Some(order_by) = &query.order_by {
        let mut order_from = FromScope::new();
        order_from.bind_anonymous(result.clone());
        let order_scope = Scope {
            from: order_from,
            ctes: IndexMap::new(),
            parent: Some(scope),
        };
        match &order_by.kind {
            OrderByKind::Expressions(exprs) => {
                for item in exprs {
                    infer_expr(ctx, schema, &order_scope, refs, &item.expr)?;
                }
            }
            OrderByKind::All(_) => {}
        }
    }

    // `LIMIT`/`OFFSET` are checked against the scope `infer_query` was
    // entered with, not the body or CTE scope: they can reference bind
    // parameters and outer-correlated columns but never this query's own
    // output or FROM columns.
    if let Some(limit_clause) = &query.limit_clause {
        check_limit_clause(ctx, schema, scope, refs, limit_clause, span)?;
    }

    Ok(result)
}

fn infer_set_expr(
    ctx: &mut InferenceContext,
    schema: &dyn SchemaModel,
    scope: &Scope,
    set_expr: &SetExpr,
    refs: &mut ReferencedTables,
    span: Span,
) -> Result<InferredQuery, PositionedError> {
    match set_expr {
        SetExpr::Select(select) => infer_select_core(ctx, schema, scope, select, refs),
        SetExpr::Query(inner) => infer_query(ctx, schema, scope, inner, refs),
        SetExpr::SetOperation { left, right, .. } => {
            let l = infer_set_expr(ctx, schema, scope, left, refs, span)?;
            let r = infer_set_expr(ctx, schema, scope, right, refs, span)?;
            infer_compound(ctx, l, r, span)
        }
        SetExpr::Values(values) => infer_values(ctx, schema, scope, values, refs),
        other => Err(PositionedError::new(span, Error::Unsupported(format!("query form: {other}")))),
    }
}

/// Column-wise unification for `UNION`/`INTERSECT`/`EXCEPT`: row semantics
/// (set vs. bag, which operator) are an execution concern this checker
/// doesn't model, so only shape and type agreement are enforced.
fn infer_compound(
    ctx: &mut InferenceContext,
    left: InferredQuery,
    right: InferredQuery,
    span: Span,
) -> Result<InferredQuery, PositionedError> {
    if left.columns.len() != right.columns.len() {
        return Err(PositionedError::new(
            span,
            Error::ColumnCountMismatch {
                expected: left.columns.len(),
                got: right.columns.len(),
            },
        ));
    }

    let columns = left
        .columns
        .into_iter()
        .zip(right.columns)
        .map(|(l, r)| {
            let unified = ctx.unify(l.inferred_type, r.inferred_type).map_err(at(span))?;
            Ok(InferredQueryColumn {
                column_name: l.column_name.or(r.column_name),
                from_alias: None,
                inferred_type: unified,
                primary_key: false,
            })
        })
        .collect::<Result<Vec<_>, PositionedError>>()?;

    Ok(InferredQuery { columns })
}

fn infer_values(
    ctx: &mut InferenceContext,
    schema: &dyn SchemaModel,
    scope: &Scope,
    values: &Values,
    refs: &mut ReferencedTables,
) -> Result<InferredQuery, PositionedError> {
    let span = Span::UNKNOWN;
    let Some(first_row) = values.rows.first() else {
        return Err(PositionedError::new(span, Error::EmptyValues));
    };

    let mut columns: Vec<InferredType> = Vec::with_capacity(first_row.len());
    for expr in first_row {
        columns.push(infer_expr(ctx, schema, scope, refs, expr)?);
    }

    for row in &values.rows[1..] {
        if row.len() != columns.len() {
            return Err(PositionedError::new(
                span,
                Error::ColumnCountMismatch {
                    expected: columns.len(),
                    got: row.len(),
                },
            ));
        }
        for (slot, expr) in columns.iter_mut().zip(row) {
            let t = infer_expr(ctx, schema, scope, refs, expr)?;
            *slot = ctx.unify(slot.clone(), t).map_err(at(span))?;
        }
    }

    Ok(InferredQuery {
        columns: columns.into_iter().map(InferredQueryColumn::unnamed).collect(),
    })
}

fn infer_select_core(
    ctx: &mut InferenceContext,
    schema: &dyn SchemaModel,
    scope: &Scope,
    select: &Select,
    refs: &mut ReferencedTables,
) -> Result<InferredQuery, PositionedError> {
    let span = Span::of(select);

    let mut from = FromScope::new();
    for twj in &select.from {
        let outer = Scope {
            from: FromScope::new(),
            ctes: scope.ctes.clone(),
            parent: scope.parent,
        };
        let item = infer_table_with_joins(ctx, schema, &outer, twj, refs)?;
        from.merge(span, item)?;
    }

    let select_scope = Scope {
        from,
        ctes: scope.ctes.clone(),
        parent: scope.parent,
    };

    if let Some(selection) = &select.selection {
        let t = infer_expr(ctx, schema, &select_scope, refs, selection)?;
        ctx.unify_base(t, BaseType::Boolean).map_err(at(Span::of(selection)))?;
    }

    match &select.group_by {
        GroupByExpr::All(_) => {}
        GroupByExpr::Expressions(exprs, _) => {
            for e in exprs {
                infer_expr(ctx, schema, &select_scope, refs, e)?;
            }
        }
    }

    if let Some(having) = &select.having {
        let t = infer_expr(ctx, schema, &select_scope, refs, having)?;
        ctx.unify_base(t, BaseType::Boolean).map_err(at(Span::of(having)))?;
    }

    let mut columns = Vec::new();
    for item in &select.projection {
        match item {
            SelectItem::UnnamedExpr(expr) => {
                let span = Span::of(expr);
                let resolved = match expr {
                    Expr::Identifier(ident) => Some(select_scope.resolve_unqualified(span, &ident.value)?),
                    Expr::CompoundIdentifier(parts) => match parts.as_slice() {
                        [qualifier, column] => Some(select_scope.resolve_qualified(span, &qualifier.value, &column.value)?),
                        _ => None,
                    },
                    _ => None,
                };
                let Some(column) = resolved else {
                    // Still type-check the expression even though it's about
                    // to be rejected, so a type error takes priority over
                    // the missing-alias error.
                    infer_expr(ctx, schema, &select_scope, refs, expr)?;
                    return Err(PositionedError::new(span, Error::ExpressionColumnRequiresAlias));
                };
                columns.push(column);
            }
            SelectItem::ExprWithAlias { expr, alias } => {
                let ty = infer_expr(ctx, schema, &select_scope, refs, expr)?;
                columns.push(InferredQueryColumn {
                    column_name: Some(Name::new(alias.value.clone())),
                    from_alias: None,
                    inferred_type: ty,
                    primary_key: false,
                });
            }
            SelectItem::Wildcard(_) => {
                if select_scope.from.is_empty() {
                    return Err(PositionedError::new(span, Error::WildcardWithoutFrom));
                }
                columns.extend(select_scope.from.wildcard().columns);
            }
            SelectItem::QualifiedWildcard(kind, _) => {
                let qualifier = match kind {
                    SelectItemQualifiedWildcardKind::ObjectName(name) => name
                        .0
                        .last()
                        .and_then(|p| p.as_ident())
                        .map(|i| i.value.clone())
                        .unwrap_or_default(),
                    SelectItemQualifiedWildcardKind::Expr(_) => {
                        return Err(PositionedError::new(
                            span,
                            Error::Unsupported("qualified wildcard on an expression".to_string()),
                        ));
                    }
                };
                let table = select_scope
                    .from
                    .get(&qualifier)
                    .ok_or_else(|| PositionedError::new(span, Error::QualifierDoesntExist(qualifier.clone())))?;
                columns.extend(table.columns.iter().cloned());
            }
        }
    }

    Ok(InferredQuery { columns })
}

/// Check one `FROM` item (a base table, join chain, or nested join) and
/// return the aliases it contributes. `scope`'s own `from` is never read;
/// only its CTEs and correlation parent matter here.
fn infer_table_with_joins(
    ctx: &mut InferenceContext,
    schema: &dyn SchemaModel,
    scope: &Scope,
    twj: &TableWithJoins,
    refs: &mut ReferencedTables,
) -> Result<FromScope, PositionedError> {
    let mut local = FromScope::new();
    bind_table_factor(ctx, schema, scope, &mut local, &twj.relation, refs)?;

    for join in &twj.joins {
        let span = Span::of(join);

        let correlation = Scope {
            from: local.clone(),
            ctes: scope.ctes.clone(),
            parent: scope.parent,
        };
        let mut rhs = FromScope::new();
        bind_table_factor(ctx, schema, &correlation, &mut rhs, &join.relation, refs)?;

        let mut combined = local.clone();
        combined.merge(span, rhs.clone())?;
        let combined_scope = Scope {
            from: combined,
            ctes: scope.ctes.clone(),
            parent: scope.parent,
        };

        match &join.join_operator {
            JoinOperator::Inner(constraint) => {
                validate_join_constraint(ctx, schema, &combined_scope, refs, constraint, &local, &rhs, span)?;
                local.merge(span, rhs)?;
            }
            JoinOperator::LeftOuter(constraint) => {
                validate_join_constraint(ctx, schema, &combined_scope, refs, constraint, &local, &rhs, span)?;
                rhs.mark_all_nullable();
                local.merge(span, rhs)?;
            }
            JoinOperator::RightOuter(constraint) => {
                validate_join_constraint(ctx, schema, &combined_scope, refs, constraint, &local, &rhs, span)?;
                local.mark_all_nullable();
                local.merge(span, rhs)?;
            }
            JoinOperator::FullOuter(constraint) => {
                validate_join_constraint(ctx, schema, &combined_scope, refs, constraint, &local, &rhs, span)?;
                local.mark_all_nullable();
                rhs.mark_all_nullable();
                local.merge(span, rhs)?;
            }
            JoinOperator::CrossJoin => {
                local.merge(span, rhs)?;
            }
            other => {
                return Err(PositionedError::new(span, Error::Unsupported(format!("join operator: {other:?}"))));
            }
        }
    }

    Ok(local)
}

fn validate_join_constraint(
    ctx: &mut InferenceContext,
    schema: &dyn SchemaModel,
    scope: &Scope,
    refs: &mut ReferencedTables,
    constraint: &JoinConstraint,
    left: &FromScope,
    right: &FromScope,
    span: Span,
) -> Result<(), PositionedError> {
    match constraint {
        JoinConstraint::On(expr) => {
            let t = infer_expr(ctx, schema, scope, refs, expr)?;
            ctx.unify_base(t, BaseType::Boolean).map_err(at(span))?;
            Ok(())
        }
        JoinConstraint::Using(columns) => {
            for ident in columns {
                let name = ident.value.as_str();
                let l = left
                    .column(name)
                    .ok_or_else(|| PositionedError::new(span, Error::ColumnDoesntExist(name.to_string())))?;
                let r = right
                    .column(name)
                    .ok_or_else(|| PositionedError::new(span, Error::ColumnDoesntExist(name.to_string())))?;
                ctx.unify(l.inferred_type, r.inferred_type).map_err(at(span))?;
            }
            Ok(())
        }
        JoinConstraint::Natural => {
            let mut seen = HashSet::new();
            let mut matched_any = false;
            for column in left.wildcard().columns {
                let Some(name) = column.column_name.clone() else {
                    continue;
                };
                if !seen.insert(name.clone()) {
                    continue;
                }
                if let Some(r) = right.column(name.as_str()) {
                    matched_any = true;
                    ctx.unify(column.inferred_type, r.inferred_type).map_err(at(span))?;
                }
            }
            if !matched_any {
                return Err(PositionedError::new(span, Error::NoCommonColumn));
            }
            Ok(())
        }
        JoinConstraint::None => Ok(()),
    }
}

fn bind_table_factor(
    ctx: &mut InferenceContext,
    schema: &dyn SchemaModel,
    scope: &Scope,
    into: &mut FromScope,
    factor: &TableFactor,
    refs: &mut ReferencedTables,
) -> Result<(), PositionedError> {
    match factor {
        TableFactor::Table { name, alias, args, .. } => {
            let span = Span::of(factor);
            if args.is_some() {
                return Err(PositionedError::new(span, Error::TableValuedFunction));
            }

            let parts: Vec<&str> = name.0.iter().filter_map(|p| p.as_ident()).map(|i| i.value.as_str()).collect();
            let (schema_name, table_name) = match parts.as_slice() {
                [t] => (None, *t),
                [s, t] => (Some(*s), *t),
                _ => {
                    return Err(PositionedError::new(
                        span,
                        Error::Unsupported("table name with more than two parts".to_string()),
                    ));
                }
            };

            let inferred = scope.resolve_table_reference(schema, span, schema_name, table_name, |t| refs.record(t))?;
            tracing::trace!(table = table_name, "resolved table reference");

            let bind_name = alias
                .as_ref()
                .map(|a| Name::new(a.name.value.clone()))
                .unwrap_or_else(|| Name::new(table_name));

            if into.has_table(bind_name.as_str()) {
                return Err(PositionedError::new(span, Error::DuplicateFromBinding(bind_name.to_string())));
            }

            let renamed = match alias {
                Some(a) if !a.columns.is_empty() => {
                    let names: Vec<Name> = a.columns.iter().map(|c| Name::new(c.name.value.clone())).collect();
                    inferred.rename(&names)
                }
                _ => inferred,
            };
            into.bind(span, bind_name.clone(), renamed.with_from_alias(&bind_name))
        }
        TableFactor::Derived { subquery, alias, .. } => {
            let span = Span::of(factor);
            let inner_scope = Scope {
                from: FromScope::new(),
                ctes: scope.ctes.clone(),
                parent: Some(scope),
            };
            let inferred = infer_query(ctx, schema, &inner_scope, subquery, refs)?;

            match alias {
                Some(a) => {
                    let bind_name = Name::new(a.name.value.clone());
                    if into.has_table(bind_name.as_str()) {
                        return Err(PositionedError::new(span, Error::DuplicateFromBinding(bind_name.to_string())));
                    }
                    let renamed = if a.columns.is_empty() {
                        inferred
                    } else {
                        let names: Vec<Name> = a.columns.iter().map(|c| Name::new(c.name.value.clone())).collect();
                        inferred.rename(&names)
                    };
                    into.bind(span, bind_name.clone(), renamed.with_from_alias(&bind_name))
                }
                None => {
                    into.bind_anonymous(inferred);
                    Ok(())
                }
            }
        }
        TableFactor::NestedJoin {
            table_with_joins,
            alias,
        } => {
            let span = Span::of(factor);
            let nested = infer_table_with_joins(ctx, schema, scope, table_with_joins, refs)?;
            match alias {
                Some(a) => {
                    let bind_name = Name::new(a.name.value.clone());
                    into.bind(span, bind_name.clone(), nested.wildcard().with_from_alias(&bind_name))
                }
                None => into.merge(span, nested),
            }
        }
        other => Err(PositionedError::new(
            Span::of(factor),
            Error::Unsupported(format!("table factor: {other}")),
        )),
    }
}

fn check_limit_clause(
    ctx: &mut InferenceContext,
    schema: &dyn SchemaModel,
    scope: &Scope,
    refs: &mut ReferencedTables,
    clause: &LimitClause,
    span: Span,
) -> Result<(), PositionedError> {
    let mut check = |expr: &Expr| -> Result<(), PositionedError> {
        let t = infer_expr(ctx, schema, scope, refs, expr)?;
        ctx.unify_base(t, BaseType::Integer).map_err(at(span))?;
        Ok(())
    };

    match clause {
        LimitClause::LimitOffset { limit, offset, limit_by } => {
            if let Some(limit) = limit {
                check(limit)?;
            }
            if let Some(offset) = offset {
                check(&offset.value)?;
            }
            for e in limit_by {
                check(e)?;
            }
        }
        LimitClause::OffsetCommaLimit { offset, limit } => {
            check(offset)?;
            check(limit)?;
        }
    }
    Ok(())
}

fn concrete_query(ctx: &mut InferenceContext, query: &InferredQuery) -> InferredQuery {
    InferredQuery {
        columns: query
            .columns
            .iter()
            .map(|c| InferredQueryColumn {
                column_name: c.column_name.clone(),
                from_alias: c.from_alias.clone(),
                inferred_type: InferredType::Concrete(ctx.concrete(&c.inferred_type)),
                primary_key: c.primary_key,
            })
            .collect(),
    }
}
