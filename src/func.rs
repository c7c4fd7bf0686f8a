//! Built-in function signatures and per-call typing.
//!
//! Each invocation gets its own substitution table mapping a signature's
//! named type variables to fresh inference variables, giving parametric
//! polymorphism per call (`coalesce(a, b): alpha` with both arguments typed
//! `alpha`).

use std::collections::HashMap;

use sqlparser::ast::{DuplicateTreatment, Function, FunctionArg, FunctionArgExpr, FunctionArguments};

use crate::error::Error;
use crate::infer::InferenceContext;
use crate::name::Name;
use crate::schema::{ArgType, FunctionSignature, SchemaModel};
use crate::span::{PositionedError, Span};
use crate::ty::{BaseType, ConcreteColumnType, InferredType};

fn sig(
    name: &str,
    fixed: Vec<ArgType>,
    variable: Option<ArgType>,
    output: ArgType,
    allow_wildcard: bool,
    allow_distinct: bool,
) -> FunctionSignature {
    FunctionSignature {
        name: Name::new(name),
        fixed_arguments: fixed,
        variable_argument: variable,
        output,
        allow_wildcard,
        allow_distinct,
    }
}

fn concrete(base: BaseType, nullable: bool) -> ArgType {
    ArgType::Concrete(ConcreteColumnType::new(base, nullable))
}

/// The built-in, SQLite-flavored function catalog.
pub fn builtin_catalog() -> HashMap<Name, FunctionSignature> {
    let mut m = HashMap::new();
    let mut add = |s: FunctionSignature| {
        m.insert(s.name.clone(), s);
    };

    add(sig(
        "count",
        vec![concrete(BaseType::Any, true)],
        None,
        concrete(BaseType::Integer, false),
        true,
        true,
    ));
    add(sig(
        "sum",
        vec![concrete(BaseType::Number, true)],
        None,
        concrete(BaseType::Number, true),
        false,
        true,
    ));
    add(sig(
        "total",
        vec![concrete(BaseType::Number, true)],
        None,
        concrete(BaseType::Float, false),
        false,
        true,
    ));
    add(sig(
        "avg",
        vec![concrete(BaseType::Number, true)],
        None,
        concrete(BaseType::Float, true),
        false,
        true,
    ));
    add(sig(
        "min",
        vec![ArgType::Variable("a")],
        None,
        ArgType::Variable("a"),
        false,
        true,
    ));
    add(sig(
        "max",
        vec![ArgType::Variable("a")],
        None,
        ArgType::Variable("a"),
        false,
        true,
    ));
    add(sig(
        "coalesce",
        vec![ArgType::Variable("a"), ArgType::Variable("a")],
        Some(ArgType::Variable("a")),
        ArgType::Variable("a"),
        false,
        false,
    ));
    add(sig(
        "ifnull",
        vec![ArgType::Variable("a"), ArgType::Variable("a")],
        None,
        ArgType::Variable("a"),
        false,
        false,
    ));
    add(sig(
        "nullif",
        vec![ArgType::Variable("a"), ArgType::Variable("a")],
        None,
        concrete(BaseType::Any, true),
        false,
        false,
    ));
    add(sig(
        "length",
        vec![concrete(BaseType::Any, true)],
        None,
        concrete(BaseType::Integer, true),
        false,
        false,
    ));
    add(sig(
        "lower",
        vec![concrete(BaseType::String, true)],
        None,
        concrete(BaseType::String, true),
        false,
        false,
    ));
    add(sig(
        "upper",
        vec![concrete(BaseType::String, true)],
        None,
        concrete(BaseType::String, true),
        false,
        false,
    ));
    for name in ["trim", "ltrim", "rtrim"] {
        add(sig(
            name,
            vec![concrete(BaseType::String, true)],
            Some(concrete(BaseType::String, true)),
            concrete(BaseType::String, true),
            false,
            false,
        ));
    }
    add(sig(
        "abs",
        vec![concrete(BaseType::Number, true)],
        None,
        concrete(BaseType::Number, true),
        false,
        false,
    ));
    add(sig(
        "round",
        vec![concrete(BaseType::Float, true)],
        Some(concrete(BaseType::Integer, false)),
        concrete(BaseType::Float, true),
        false,
        false,
    ));
    add(sig(
        "typeof",
        vec![concrete(BaseType::Any, true)],
        None,
        concrete(BaseType::String, false),
        false,
        false,
    ));
    add(sig(
        "instr",
        vec![concrete(BaseType::String, true), concrete(BaseType::String, true)],
        None,
        concrete(BaseType::Integer, true),
        false,
        false,
    ));
    for name in ["substr", "substring"] {
        add(sig(
            name,
            vec![concrete(BaseType::String, true), concrete(BaseType::Integer, false)],
            Some(concrete(BaseType::Integer, false)),
            concrete(BaseType::String, true),
            false,
            false,
        ));
    }
    add(sig(
        "replace",
        vec![
            concrete(BaseType::String, true),
            concrete(BaseType::String, false),
            concrete(BaseType::String, false),
        ],
        None,
        concrete(BaseType::String, true),
        false,
        false,
    ));
    for name in ["date", "time", "datetime"] {
        add(sig(
            name,
            vec![concrete(BaseType::Any, true)],
            Some(concrete(BaseType::Any, true)),
            concrete(BaseType::DateTime, true),
            false,
            false,
        ));
    }
    add(sig(
        "strftime",
        vec![concrete(BaseType::String, false), concrete(BaseType::Any, true)],
        Some(concrete(BaseType::Any, true)),
        concrete(BaseType::String, true),
        false,
        false,
    ));
    add(sig(
        "julianday",
        vec![concrete(BaseType::Any, true)],
        Some(concrete(BaseType::Any, true)),
        concrete(BaseType::Float, true),
        false,
        false,
    ));
    add(sig(
        "unixepoch",
        vec![concrete(BaseType::Any, true)],
        Some(concrete(BaseType::Any, true)),
        concrete(BaseType::Integer, true),
        false,
        false,
    ));
    add(sig(
        "random",
        vec![],
        None,
        concrete(BaseType::Integer, false),
        false,
        false,
    ));
    add(sig(
        "randomblob",
        vec![concrete(BaseType::Integer, false)],
        None,
        concrete(BaseType::Blob, false),
        false,
        false,
    ));
    add(sig(
        "zeroblob",
        vec![concrete(BaseType::Integer, false)],
        None,
        concrete(BaseType::Blob, false),
        false,
        false,
    ));
    add(sig(
        "hex",
        vec![concrete(BaseType::Blob, true)],
        None,
        concrete(BaseType::String, false),
        false,
        false,
    ));
    add(sig(
        "glob",
        vec![concrete(BaseType::String, false), concrete(BaseType::String, true)],
        None,
        concrete(BaseType::Boolean, true),
        false,
        false,
    ));
    add(sig(
        "last_insert_rowid",
        vec![],
        None,
        concrete(BaseType::Integer, false),
        false,
        false,
    ));
    add(sig(
        "changes",
        vec![],
        None,
        concrete(BaseType::Integer, false),
        false,
        false,
    ));
    add(sig(
        "total_changes",
        vec![],
        None,
        concrete(BaseType::Integer, false),
        false,
        false,
    ));
    // SQLite's trigger-only RAISE(...) form; modeled as a function so it
    // does not need its own `Expr` arm in the checker.
    add(sig(
        "raise",
        vec![],
        Some(concrete(BaseType::Any, true)),
        concrete(BaseType::Any, true),
        false,
        false,
    ));

    m
}

/// Type-check a function call against its catalog signature.
///
/// `infer_arg` is invoked once per positional argument expression (the
/// back-reference into the expression checker is injected as a closure so
/// this module does not need to depend on `crate::expr` directly).
pub(crate) fn check_call(
    ctx: &mut InferenceContext,
    schema: &dyn SchemaModel,
    func: &Function,
    span: Span,
    mut infer_arg: impl FnMut(&sqlparser::ast::Expr, &mut InferenceContext) -> Result<InferredType, PositionedError>,
) -> Result<InferredType, PositionedError> {
    let name = func
        .name
        .0
        .last()
        .and_then(|p| p.as_ident())
        .map(|i| i.value.clone())
        .unwrap_or_default();

    let signature = schema
        .builtin_functions()
        .get(&Name::new(name.clone()))
        .cloned()
        .ok_or_else(|| PositionedError::new(span, Error::FunctionDoesntExist(name.clone())))?;

    let mut substitution: HashMap<&'static str, InferredType> = HashMap::new();
    let mut instantiate = |arg: &ArgType, ctx: &mut InferenceContext| -> InferredType {
        match arg {
            ArgType::Concrete(c) => InferredType::Concrete(*c),
            ArgType::Variable(name) => substitution
                .entry(*name)
                .or_insert_with(|| ctx.anonymous_variable())
                .clone(),
        }
    };

    let FunctionArguments::List(list) = &func.args else {
        return Err(PositionedError::new(
            span,
            Error::Unsupported(format!("function call form for '{name}'")),
        ));
    };

    let distinct = matches!(list.duplicate_treatment, Some(DuplicateTreatment::Distinct));
    if distinct && !signature.allow_distinct {
        return Err(PositionedError::new(
            span,
            Error::Unsupported(format!("DISTINCT is not allowed in '{name}'")),
        ));
    }

    // A lone wildcard argument, e.g. `count(*)`.
    if let [FunctionArg::Unnamed(FunctionArgExpr::Wildcard)] = list.args.as_slice() {
        if !signature.allow_wildcard {
            return Err(PositionedError::new(
                span,
                Error::Unsupported(format!("'*' is not allowed in '{name}'")),
            ));
        }
        return Ok(instantiate(&signature.output, ctx));
    }

    let mut actual_exprs = Vec::with_capacity(list.args.len());
    for arg in &list.args {
        match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => actual_exprs.push(e),
            _ => {
                return Err(PositionedError::new(
                    span,
                    Error::Unsupported(format!("argument form in call to '{name}'")),
                ));
            }
        }
    }

    if actual_exprs.len() < signature.fixed_arguments.len() {
        return Err(PositionedError::new(
            span,
            Error::FunctionArgumentCount {
                name: name.clone(),
                expected: signature.fixed_arguments.len(),
                got: actual_exprs.len(),
            },
        ));
    }

    for (position, fixed) in signature.fixed_arguments.iter().enumerate() {
        let expected = instantiate(fixed, ctx);
        let actual = infer_arg(actual_exprs[position], ctx)?;
        ctx.unify(expected, actual).map_err(|e| PositionedError::new(span, e))?;
    }

    let extras = &actual_exprs[signature.fixed_arguments.len()..];
    if !extras.is_empty() {
        let Some(variable_arg) = &signature.variable_argument else {
            return Err(PositionedError::new(
                span,
                Error::FunctionArgumentCount {
                    name: name.clone(),
                    expected: signature.fixed_arguments.len(),
                    got: actual_exprs.len(),
                },
            ));
        };
        let expected = instantiate(variable_arg, ctx);
        for extra in extras {
            let actual = infer_arg(extra, ctx)?;
            ctx.unify(expected.clone(), actual)
                .map_err(|e| PositionedError::new(span, e))?;
        }
    }

    Ok(instantiate(&signature.output, ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_expected_arity_for_coalesce() {
        let catalog = builtin_catalog();
        let coalesce = catalog.get(&Name::new("coalesce")).unwrap();
        assert_eq!(coalesce.fixed_arguments.len(), 2);
        assert!(coalesce.variable_argument.is_some());
    }

    #[test]
    fn count_allows_wildcard_and_distinct() {
        let catalog = builtin_catalog();
        let count = catalog.get(&Name::new("count")).unwrap();
        assert!(count.allow_wildcard);
        assert!(count.allow_distinct);
    }

    #[test]
    fn min_max_share_the_same_type_variable() {
        let catalog = builtin_catalog();
        let min = catalog.get(&Name::new("min")).unwrap();
        assert_eq!(min.fixed_arguments[0], min.output);
    }
}
