use std::fmt;

use sqlparser::ast::Spanned as SqlSpanned;
use sqlparser::tokenizer::{Location as SqlLocation, Span as SqlSpan};

use crate::error::Error;

/// A single point in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: u64,
    pub column: u64,
}

impl From<SqlLocation> for Location {
    fn from(loc: SqlLocation) -> Self {
        Location {
            line: loc.line,
            column: loc.column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A source range used to locate the smallest enclosing node of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Location,
    pub end: Location,
}

impl Span {
    pub const UNKNOWN: Span = Span {
        start: Location { line: 0, column: 0 },
        end: Location { line: 0, column: 0 },
    };

    /// Capture the span of any `sqlparser` AST node implementing `Spanned`.
    pub fn of(node: &impl SqlSpanned) -> Span {
        node.span().into()
    }
}

impl From<SqlSpan> for Span {
    fn from(span: SqlSpan) -> Self {
        Span {
            start: span.start.into(),
            end: span.end.into(),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// An [`Error`] attached to the source span of the node that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{span}: {error}")]
pub struct PositionedError {
    pub span: Span,
    pub error: Error,
}

impl PositionedError {
    pub fn new(span: Span, error: Error) -> Self {
        Self { span, error }
    }
}

/// Attaches a span to an `Error`, for use at `?`-propagation sites via `.map_err(at(span))`.
pub fn at(span: Span) -> impl Fn(Error) -> PositionedError {
    move |error| PositionedError::new(span, error)
}
