//! The token definitions for the search language.

use serde::{Deserialize, Serialize};

/// A raw token produced by the lexer, with a kind, a location and the exact
/// source text it covers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub span: Span,
    pub text: &'a str,
    /// Set when an opening quote or bracket was never closed and the token
    /// swallowed the rest of the input.
    pub unterminated: bool,
    /// Present only for `TokenKind::Filter`.
    pub filter: Option<RawFilter>,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, span: Span, text: &'a str) -> Self {
        Self { kind, span, text, unterminated: false, filter: None }
    }

    /// Returns the part of this token's text covered by `span`, or `None`
    /// when `span` does not lie inside the token.
    pub fn slice(&self, span: Span) -> Option<&'a str> {
        if span.start < self.span.start || span.end > self.span.end || span.start > span.end {
            return None;
        }
        let text: &'a str = self.text;
        text.get(span.start - self.span.start..span.end - self.span.start)
    }
}

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    FreeText,
    Filter,
    LogicAnd,
    LogicOr,
    /// A classified `AND`/`OR` connector.
    LogicBoolean,
    LParen,
    RParen,
    ValueText,
    ValueTextList,
    ValueNumber,
    ValueDuration,
    ValueSize,
    ValuePercentage,
    Spaces,
}

/// Comparison operator of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ":")]
    Equal, // :
    #[serde(rename = "!:")]
    NotEqual, // !:
    #[serde(rename = ">")]
    GreaterThan, // :>
    #[serde(rename = ">=")]
    GreaterThanOrEqual, // :>=
    #[serde(rename = "<")]
    LessThan, // :<
    #[serde(rename = "<=")]
    LessThanOrEqual, // :<=
}

impl Operator {
    pub const ALL: [Operator; 6] = [
        Operator::Equal,
        Operator::NotEqual,
        Operator::GreaterThan,
        Operator::GreaterThanOrEqual,
        Operator::LessThan,
        Operator::LessThanOrEqual,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Equal => ":",
            Operator::NotEqual => "!:",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
        }
    }

    /// `>`, `>=`, `<` and `<=`.
    pub fn is_ordering(self) -> bool {
        !matches!(self, Operator::Equal | Operator::NotEqual)
    }
}

/// How a filter value was written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueShape {
    Plain,
    Quoted,
    List,
}

/// The structural parts of a `key<operator><value>` token, as absolute spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RawFilter {
    /// Leading `!`.
    pub negated: bool,
    pub key: Span,
    pub operator: Operator,
    pub operator_span: Span,
    pub value: Span,
    pub value_shape: ValueShape,
    /// Text glued onto a closed quote or list, up to the next boundary.
    pub trailing: Option<Span>,
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset (exclusive).
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
