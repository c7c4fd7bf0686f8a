//! Scope construction and name resolution: the two-dimensional (table alias,
//! column name) lookup that expression checking and JOIN validation both
//! consume.

use indexmap::IndexMap;

use crate::error::Error;
use crate::name::Name;
use crate::schema::SchemaModel;
use crate::span::{PositionedError, Span};
use crate::ty::InferredType;

/// One column of a query's projected output.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct InferredQueryColumn {
    pub column_name: Option<Name>,
    pub from_alias: Option<Name>,
    pub inferred_type: InferredType,
    pub primary_key: bool,
}

impl InferredQueryColumn {
    pub fn unnamed(inferred_type: InferredType) -> Self {
        InferredQueryColumn {
            column_name: None,
            from_alias: None,
            inferred_type,
            primary_key: false,
        }
    }
}

/// The ordered column list a query produces: a FROM-clause table, a CTE, or
/// a subquery all expose one of these to whatever references them.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct InferredQuery {
    pub columns: Vec<InferredQueryColumn>,
}

impl InferredQuery {
    pub fn single(ty: InferredType) -> Self {
        InferredQuery {
            columns: vec![InferredQueryColumn::unnamed(ty)],
        }
    }

    fn find_column(&self, name: &str) -> Vec<&InferredQueryColumn> {
        self.columns
            .iter()
            .filter(|c| c.column_name.as_ref().is_some_and(|n| n == name))
            .collect()
    }

    /// Apply an explicit column-name list, as in `(SELECT ...) AS v(a, b)`.
    /// Clears any prior `from_alias` since the rename introduces a new name
    /// binding independent of the underlying columns' origin.
    pub fn rename(&self, names: &[Name]) -> InferredQuery {
        InferredQuery {
            columns: self
                .columns
                .iter()
                .enumerate()
                .map(|(i, c)| InferredQueryColumn {
                    column_name: names.get(i).cloned().or_else(|| c.column_name.clone()),
                    from_alias: None,
                    inferred_type: c.inferred_type.clone(),
                    primary_key: c.primary_key,
                })
                .collect(),
        }
    }

    /// Stamp every column with the alias it was just bound under in a
    /// `FROM` clause (`users` in `FROM users` or `FROM users AS u`).
    pub fn with_from_alias(&self, alias: &Name) -> InferredQuery {
        InferredQuery {
            columns: self
                .columns
                .iter()
                .map(|c| InferredQueryColumn {
                    column_name: c.column_name.clone(),
                    from_alias: Some(alias.clone()),
                    inferred_type: c.inferred_type.clone(),
                    primary_key: c.primary_key,
                })
                .collect(),
        }
    }

    /// Every column's base type kept, nullability forced on — used by the
    /// nullable side of an outer join.
    pub fn nullable(&self) -> InferredQuery {
        InferredQuery {
            columns: self
                .columns
                .iter()
                .map(|c| InferredQueryColumn {
                    column_name: c.column_name.clone(),
                    from_alias: c.from_alias.clone(),
                    inferred_type: match &c.inferred_type {
                        InferredType::Concrete(t) => InferredType::Concrete(t.nullable_copy()),
                        other => other.clone(),
                    },
                    primary_key: c.primary_key,
                })
                .collect(),
        }
    }
}

/// The FROM clause of one query level: an ordered map of alias to the query
/// bound under it, in source order (so wildcard expansion matches join
/// order).
#[derive(Debug, Clone, Default)]
pub struct FromScope {
    aliases: IndexMap<Name, InferredQuery>,
    /// Derived tables with no alias: still contribute to the wildcard and to
    /// unqualified resolution, but can never be referenced by qualifier.
    anonymous: Vec<InferredQuery>,
}

impl FromScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, span: Span, alias: Name, query: InferredQuery) -> Result<(), PositionedError> {
        if self.aliases.contains_key(&alias) {
            return Err(PositionedError::new(
                span,
                Error::DuplicateFromBinding(alias.to_string()),
            ));
        }
        self.aliases.insert(alias, query);
        Ok(())
    }

    /// Bind an unaliased derived table (`FROM (SELECT ...)` with no `AS`).
    pub fn bind_anonymous(&mut self, query: InferredQuery) {
        self.anonymous.push(query);
    }

    /// Merge another scope's bindings into this one, in order, as happens
    /// when a comma-joined `FROM a, b` accumulates one item at a time.
    pub fn merge(&mut self, span: Span, other: FromScope) -> Result<(), PositionedError> {
        for (alias, query) in other.aliases {
            self.bind(span, alias, query)?;
        }
        self.anonymous.extend(other.anonymous);
        Ok(())
    }

    /// Force every already-bound column nullable, as required on the
    /// preserved side of a RIGHT or FULL OUTER JOIN once the new side has
    /// been added.
    pub fn mark_all_nullable(&mut self) {
        for query in self.aliases.values_mut() {
            *query = query.nullable();
        }
        for query in self.anonymous.iter_mut() {
            *query = query.nullable();
        }
    }

    pub fn has_table(&self, alias: &str) -> bool {
        self.aliases.keys().any(|a| a == alias)
    }

    pub fn get(&self, alias: &str) -> Option<&InferredQuery> {
        self.aliases.iter().find(|(a, _)| *a == *alias).map(|(_, q)| q)
    }

    /// First unqualified match for a bare column name, ignoring ambiguity
    /// across aliases: used by `USING`/`NATURAL` join validation, which
    /// checks each side independently rather than through `Scope`'s
    /// whole-clause ambiguity rule.
    pub fn column(&self, name: &str) -> Option<InferredQueryColumn> {
        self.aliases
            .values()
            .chain(self.anonymous.iter())
            .find_map(|q| q.find_column(name).into_iter().next().cloned())
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty() && self.anonymous.is_empty()
    }

    /// All columns visible to an unqualified `*`, in FROM order.
    pub fn wildcard(&self) -> InferredQuery {
        InferredQuery {
            columns: self
                .aliases
                .values()
                .chain(self.anonymous.iter())
                .flat_map(|q| q.columns.iter().cloned())
                .collect(),
        }
    }

    fn resolve_qualified(
        &self,
        span: Span,
        qualifier: &str,
        column: &str,
    ) -> Result<InferredQueryColumn, PositionedError> {
        let query = self
            .get(qualifier)
            .ok_or_else(|| PositionedError::new(span, Error::QualifierDoesntExist(qualifier.to_string())))?;
        let matches = query.find_column(column);
        match matches.as_slice() {
            [] => Err(PositionedError::new(
                span,
                Error::QualifiedColumnDoesntExist {
                    qualifier: qualifier.to_string(),
                    column: column.to_string(),
                },
            )),
            [only, ..] => Ok((*only).clone()),
        }
    }

    fn resolve_unqualified(&self, span: Span, column: &str) -> Result<InferredQueryColumn, PositionedError> {
        let mut found = Vec::new();
        for query in self.aliases.values().chain(self.anonymous.iter()) {
            found.extend(query.find_column(column));
        }
        match found.as_slice() {
            [] => Err(PositionedError::new(span, Error::ColumnDoesntExist(column.to_string()))),
            [only] => Ok((*only).clone()),
            _ => Err(PositionedError::new(span, Error::AmbiguousColumn(column.to_string()))),
        }
    }
}

/// The scope an expression or table reference is checked against: the
/// current FROM clause, this statement's CTEs, and an optional parent scope
/// for correlated subqueries.
pub struct Scope<'p> {
    pub from: FromScope,
    pub ctes: IndexMap<Name, InferredQuery>,
    pub parent: Option<&'p Scope<'p>>,
}

impl<'p> Scope<'p> {
    pub fn root(from: FromScope, ctes: IndexMap<Name, InferredQuery>) -> Self {
        Self {
            from,
            ctes,
            parent: None,
        }
    }

    pub fn child(from: FromScope, parent: &'p Scope<'p>) -> Self {
        Self {
            from,
            ctes: IndexMap::new(),
            parent: Some(parent),
        }
    }

    pub fn resolve_unqualified(&self, span: Span, column: &str) -> Result<InferredQueryColumn, PositionedError> {
        match self.from.resolve_unqualified(span, column) {
            Err(e) if matches!(e.error, Error::ColumnDoesntExist(_)) => match self.parent {
                Some(parent) => parent.resolve_unqualified(span, column),
                None => Err(e),
            },
            other => other,
        }
    }

    pub fn resolve_qualified(
        &self,
        span: Span,
        qualifier: &str,
        column: &str,
    ) -> Result<InferredQueryColumn, PositionedError> {
        match self.from.resolve_qualified(span, qualifier, column) {
            Err(e) if matches!(e.error, Error::QualifierDoesntExist(_)) => match self.parent {
                Some(parent) => parent.resolve_qualified(span, qualifier, column),
                None => Err(e),
            },
            other => other,
        }
    }

    /// Resolve a table reference in a `FROM`/`JOIN` item: a same-statement
    /// CTE first, falling back to the schema model. `on_reference` is
    /// invoked with the schema table whenever resolution reaches the
    /// schema, so the caller can record it without this module depending on
    /// the query checker that owns the reference set.
    pub fn resolve_table_reference(
        &self,
        schema: &dyn SchemaModel,
        span: Span,
        schema_name: Option<&str>,
        table_name: &str,
        mut on_reference: impl FnMut(&crate::schema::SchemaTable),
    ) -> Result<InferredQuery, PositionedError> {
        if schema_name.is_none() {
            if let Some((_, cte)) = self.ctes.iter().find(|(name, _)| *name == table_name) {
                return Ok(cte.clone());
            }
        }

        let table = schema
            .find_table(schema_name, table_name)
            .ok_or_else(|| PositionedError::new(span, Error::TableDoesntExist(table_name.to_string())))?;
        on_reference(table);

        Ok(InferredQuery {
            columns: table
                .columns
                .iter()
                .map(|c| InferredQueryColumn {
                    column_name: Some(c.column_name.clone()),
                    from_alias: None,
                    inferred_type: InferredType::Concrete(c.column_type),
                    primary_key: c.primary_key,
                })
                .collect(),
        })
    }
}
