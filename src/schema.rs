//! The schema and function-catalog interface the checker consumes read-only,
//! plus `InMemorySchema`, a convenience implementation built either
//! programmatically or by parsing a batch of `CREATE TABLE` statements.

use std::collections::HashMap;

use sqlparser::ast::{ColumnOption, Statement, TableConstraint};
use sqlparser::dialect::{AnsiDialect, Dialect, GenericDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

use crate::error::Error;
use crate::func;
use crate::name::Name;
use crate::span::{PositionedError, Span};
use crate::ty::ConcreteColumnType;

/// Which `sqlparser` dialect governs parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DialectKind {
    #[default]
    Generic,
    Ansi,
    Sqlite,
    Postgres,
}

impl DialectKind {
    pub fn parser_dialect(self) -> Box<dyn Dialect> {
        match self {
            DialectKind::Generic => Box::new(GenericDialect {}),
            DialectKind::Ansi => Box::new(AnsiDialect {}),
            DialectKind::Sqlite => Box::new(SQLiteDialect {}),
            DialectKind::Postgres => Box::new(PostgreSqlDialect {}),
        }
    }
}

/// The only configuration surface the core needs: which dialect to parse
/// with. Schema contents always come from the caller, not from this struct.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    pub dialect: DialectKind,
}

/// A single column of a schema table.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SchemaColumn {
    pub column_name: Name,
    pub column_type: ConcreteColumnType,
    pub primary_key: bool,
}

/// A table as seen by the checker: a fixed, ordered column list.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SchemaTable {
    pub schema_name: Option<Name>,
    pub table_name: Name,
    pub columns: Vec<SchemaColumn>,
}

impl SchemaTable {
    pub fn get_column(&self, name: &str) -> Option<&SchemaColumn> {
        self.columns.iter().find(|c| c.column_name == *name)
    }
}

/// A function argument type: either fixed, or a name shared across every
/// position of the same signature that uses it (signature-scoped
/// polymorphism, see §4.4 of the expanded spec).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgType {
    Concrete(ConcreteColumnType),
    Variable(&'static str),
}

/// A built-in or user-registered function signature.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: Name,
    pub fixed_arguments: Vec<ArgType>,
    pub variable_argument: Option<ArgType>,
    pub output: ArgType,
    pub allow_wildcard: bool,
    pub allow_distinct: bool,
}

/// Read-only lookup of tables and built-in function signatures.
///
/// All name lookups are case-insensitive (§6.3).
pub trait SchemaModel {
    fn find_table(&self, schema_name: Option<&str>, table_name: &str) -> Option<&SchemaTable>;
    fn builtin_functions(&self) -> &HashMap<Name, FunctionSignature>;
}

/// A fixed, in-memory schema: tables plus the built-in function catalog
/// (always included) plus any caller-registered extra signatures.
#[derive(Debug, Clone)]
pub struct InMemorySchema {
    tables: Vec<SchemaTable>,
    functions: HashMap<Name, FunctionSignature>,
}

impl InMemorySchema {
    pub fn builder() -> InMemorySchemaBuilder {
        InMemorySchemaBuilder::default()
    }

    /// Parse a batch of `CREATE TABLE` statements into a schema. Each
    /// statement becomes one `SchemaTable`; any other statement kind is
    /// rejected, since constructing a schema is a one-shot, read-only
    /// convenience and not itself part of the checker's control flow.
    pub fn from_ddl(dialect: DialectKind, sql: &str) -> Result<Self, PositionedError> {
        let parser_dialect = dialect.parser_dialect();
        let statements = Parser::new(&*parser_dialect)
            .try_with_sql(sql)
            .map_err(|e| PositionedError::new(Span::UNKNOWN, e.into()))?
            .parse_statements()
            .map_err(|e| PositionedError::new(Span::UNKNOWN, e.into()))?;

        let mut builder = InMemorySchema::builder();
        for statement in statements {
            match statement {
                Statement::CreateTable(create_table) => {
                    builder.add_table(table_from_create(create_table)?);
                }
                other => {
                    return Err(PositionedError::new(
                        Span::UNKNOWN,
                        Error::Unsupported(format!("DDL statement: {other}")),
                    ));
                }
            }
        }
        Ok(builder.build())
    }
}

impl SchemaModel for InMemorySchema {
    fn find_table(&self, schema_name: Option<&str>, table_name: &str) -> Option<&SchemaTable> {
        self.tables.iter().find(|t| {
            t.table_name == *table_name
                && match (schema_name, &t.schema_name) {
                    (Some(requested), Some(actual)) => actual == requested,
                    (Some(_), None) => false,
                    (None, _) => true,
                }
        })
    }

    fn builtin_functions(&self) -> &HashMap<Name, FunctionSignature> {
        &self.functions
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySchemaBuilder {
    tables: Vec<SchemaTable>,
    functions: HashMap<Name, FunctionSignature>,
}

impl InMemorySchemaBuilder {
    pub fn add_table(&mut self, table: SchemaTable) -> &mut Self {
        self.tables.push(table);
        self
    }

    pub fn add_function(&mut self, signature: FunctionSignature) -> &mut Self {
        self.functions.insert(signature.name.clone(), signature);
        self
    }

    pub fn build(&mut self) -> InMemorySchema {
        let mut functions = func::builtin_catalog();
        for (name, sig) in self.functions.drain() {
            functions.insert(name, sig);
        }
        InMemorySchema {
            tables: std::mem::take(&mut self.tables),
            functions,
        }
    }
}

fn table_from_create(
    create_table: sqlparser::ast::CreateTable,
) -> Result<SchemaTable, PositionedError> {
    let table_name = create_table
        .name
        .0
        .last()
        .and_then(|p| p.as_ident())
        .map(|i| Name::new(i.value.clone()))
        .ok_or_else(|| {
            PositionedError::new(
                Span::UNKNOWN,
                Error::Unsupported("CREATE TABLE with no name".to_string()),
            )
        })?;

    let mut primary_keys: Vec<String> = Vec::new();
    for constraint in &create_table.constraints {
        if let TableConstraint::PrimaryKey { columns, .. } = constraint {
            primary_keys.extend(columns.iter().map(|c| c.value.clone()));
        }
    }

    let mut columns = Vec::new();
    for column in create_table.columns {
        let mut nullable = true;
        let mut primary_key = primary_keys.iter().any(|c| c.eq_ignore_ascii_case(&column.name.value));

        for option in &column.options {
            match &option.option {
                ColumnOption::Null => nullable = true,
                ColumnOption::NotNull => nullable = false,
                ColumnOption::Unique { is_primary, .. } if *is_primary => {
                    primary_key = true;
                    nullable = false;
                }
                _ => {}
            }
        }

        if primary_key {
            nullable = false;
        }

        columns.push(SchemaColumn {
            column_name: Name::new(column.name.value.clone()),
            column_type: ConcreteColumnType::new(column.data_type.into(), nullable),
            primary_key,
        });
    }

    Ok(SchemaTable {
        schema_name: None,
        table_name,
        columns,
    })
}
