use crate::ty::{BaseType, ConcreteColumnType};

/// The error taxonomy produced by the checker.
///
/// Every variant maps to exactly one of the six kinds the checker
/// distinguishes: not-found, ambiguous, type-conflict, arity-mismatch,
/// structural, or feature-unsupported. Call sites attach a [`crate::Span`]
/// via [`crate::span::at`] to turn one of these into a
/// [`crate::PositionedError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    // --- NotFound ---
    #[error("table '{0}' doesn't exist")]
    TableDoesntExist(String),
    #[error("column '{0}' doesn't exist")]
    ColumnDoesntExist(String),
    #[error("qualifier '{0}' doesn't exist")]
    QualifierDoesntExist(String),
    #[error("qualified column '{qualifier}.{column}' doesn't exist")]
    QualifiedColumnDoesntExist { qualifier: String, column: String },
    #[error("function '{0}' doesn't exist")]
    FunctionDoesntExist(String),
    #[error("CTE or table '{0}' doesn't exist")]
    TableOrAliasDoesntExist(String),

    // --- Ambiguous ---
    #[error("ambiguous column: {0}")]
    AmbiguousColumn(String),
    #[error("ambiguous alias: {0}")]
    AmbiguousAlias(String),

    // --- TypeConflict ---
    #[error("type mismatch: expected {expected} and got {got}")]
    TypeMismatch {
        expected: ConcreteColumnType,
        got: ConcreteColumnType,
    },
    #[error("type not in family {family:?}: got {got}")]
    TypeNotInFamily {
        family: Vec<BaseType>,
        got: ConcreteColumnType,
    },

    // --- ArityMismatch ---
    #[error("function '{name}' expected {expected} argument(s), got {got}")]
    FunctionArgumentCount {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("column count mismatch: expected {expected} and got {got}")]
    ColumnCountMismatch { expected: usize, got: usize },
    #[error("expected exactly one column, got {0}")]
    NotASingleColumn(usize),

    // --- StructuralError ---
    #[error("NATURAL JOIN cannot have an ON or USING constraint")]
    NaturalJoinWithConstraint,
    #[error("no common column between joined tables")]
    NoCommonColumn,
    #[error("wildcard select item requires a FROM clause")]
    WildcardWithoutFrom,
    #[error("table-valued function invocation is not supported")]
    TableValuedFunction,
    #[error("expression result column requires an alias")]
    ExpressionColumnRequiresAlias,
    #[error("VALUES clause must have at least one row")]
    EmptyValues,
    #[error("alias '{0}' is already bound in this FROM clause")]
    DuplicateFromBinding(String),
    #[error("alias '{0}' is the name of an existing table")]
    AliasIsTableName(String),
    #[error("'{0}' cannot be used as a default; use a literal value")]
    InvalidDefault(String),

    // --- FeatureUnsupported ---
    #[error("'{0}' is not supported")]
    Unsupported(String),
    #[error("parsing: {0}")]
    Parsing(String),
}

impl From<sqlparser::parser::ParserError> for Error {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        Error::Parsing(err.to_string())
    }
}
