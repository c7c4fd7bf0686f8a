//! Static semantic analysis for SQLite-flavored `SELECT` statements: given a
//! schema and a query string, produce the query's output column shape (name,
//! type, nullability) or a positioned type error. Parsing, query execution,
//! and AST rewriting are out of scope; this crate only ever reads a
//! `sqlparser` AST and the schema it's checked against.

mod error;
mod expr;
mod func;
mod infer;
mod name;
mod query;
mod refs;
mod schema;
mod scope;
mod span;
mod ty;

pub use error::Error;
pub use infer::InferenceContext;
pub use name::Name;
pub use query::{check_query, infer_query, infer_top_level_query, CheckResult};
pub use refs::ReferencedTables;
pub use schema::{
    ArgType, Config, DialectKind, FunctionSignature, InMemorySchema, InMemorySchemaBuilder, SchemaColumn,
    SchemaModel, SchemaTable,
};
pub use scope::{FromScope, InferredQuery, InferredQueryColumn, Scope};
pub use span::{at, Location, PositionedError, Span};
pub use ty::{BaseType, ConcreteColumnType, InferredType, VarId};

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> InMemorySchema {
        InMemorySchema::from_ddl(
            DialectKind::Sqlite,
            "create table users (id integer primary key not null, name text not null, email text);",
        )
        .unwrap()
    }

    #[test]
    fn checks_a_simple_select() {
        let schema = schema();
        let result = check_query(&schema, DialectKind::Sqlite, "select id, name from users where id = ?").unwrap();
        assert_eq!(result.query.columns.len(), 2);
        assert_eq!(result.referenced_tables.len(), 1);
    }

    #[test]
    fn rejects_non_query_statements() {
        let schema = schema();
        let err = check_query(&schema, DialectKind::Sqlite, "delete from users").unwrap_err();
        assert!(matches!(err.error, Error::Unsupported(_)));
    }

    #[test]
    fn invalid_sql_is_a_parsing_error() {
        let schema = schema();
        let err = check_query(&schema, DialectKind::Sqlite, "select from from from;").unwrap_err();
        assert!(matches!(err.error, Error::Parsing(_)));
    }
}
