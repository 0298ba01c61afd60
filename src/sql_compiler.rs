//! SQL compiler that turns a validated search query into a SQL preview using
//! sea-query.
//!
//! ## Condition grammar (lowest to highest precedence)
//!
//! ```text
//! or_expr   = and_expr ("OR" and_expr)*
//! and_expr  = primary ("AND"? primary)*      adjacency is an implicit AND
//! primary   = "(" or_expr? ")" | filter | free_text
//! ```

use sea_query::{
    Asterisk, Expr, Iden, LikeExpr, PostgresQueryBuilder, SelectStatement, SimpleExpr, Value as SqlValue,
};

use crate::ast::{BooleanOperator, Condition, FilterToken, Node, TypedToken, Value, ValueToken};
use crate::config::SqlOptions;
use crate::lexer::unquote;
use crate::outcome::Parsed;
use crate::token::{Operator, Span};
use crate::validator::Validation;
use crate::value::UnitValue;

/// Table or column identifier for sea-query.
#[derive(Debug, Clone)]
pub struct SqlIdent(pub String);

impl Iden for SqlIdent {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("query is invalid ({0} diagnostics)")]
    Invalid(usize),
    #[error("unexpected token at {}..{}", .0.start, .0.end)]
    UnexpectedToken(Span),
    #[error("unexpected end of query")]
    UnexpectedEnd,
    #[error("value at {}..{} cannot be converted to SQL", .0.start, .0.end)]
    InvalidValue(Span),
    #[error("operator `{0}` cannot be used with a list")]
    ListOperator(&'static str),
}

/// Represents an optimization applied during compilation
#[derive(Debug, Clone, PartialEq)]
pub enum Optimization {
    OrToIn { field: String, value_count: usize },
}

/// Result of SQL compilation with optimization information
#[derive(Debug)]
pub struct CompileResult {
    pub sql: String,
    pub optimizations: Vec<Optimization>,
}

/// SQL Compiler that converts a valid token sequence to a SQL query
#[derive(Debug, Clone, Default)]
pub struct SqlCompiler {
    options: SqlOptions,
}

impl SqlCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: SqlOptions) -> Self {
        Self { options }
    }

    /// Compiles `tokens` into a `SELECT`. Refuses queries that did not pass
    /// validation.
    pub fn compile(&self, tokens: &[TypedToken<'_>], validation: &Validation) -> Result<CompileResult, CompileError> {
        if !validation.valid {
            return Err(CompileError::Invalid(validation.diagnostics.len()));
        }

        let mut optimizations = Vec::new();
        let mut select = SelectStatement::new();
        select.column(Asterisk).from(SqlIdent(self.options.table.clone()));

        if let Some(condition) = build_condition(tokens)? {
            let expr = self.compile_condition(&condition, &mut optimizations)?;
            select.and_where(expr);
        }

        let sql = select.to_string(PostgresQueryBuilder);
        log::debug!("compiled query to SQL with {} optimizations", optimizations.len());
        Ok(CompileResult { sql, optimizations })
    }

    fn compile_condition(&self, condition: &Condition<'_, '_>, optimizations: &mut Vec<Optimization>) -> Result<SimpleExpr, CompileError> {
        let expr = match condition {
            Condition::And(left, right) => {
                let left = self.compile_condition(left, optimizations)?;
                let right = self.compile_condition(right, optimizations)?;
                left.and(right)
            }
            Condition::Or(left, right) => {
                if let Some((in_expr, optimization)) = self.try_optimize_or_to_in(condition)? {
                    optimizations.push(optimization);
                    in_expr
                } else {
                    let left = self.compile_condition(left, optimizations)?;
                    let right = self.compile_condition(right, optimizations)?;
                    left.or(right)
                }
            }
            Condition::Grouped(inner) => self.compile_condition(inner, optimizations)?,
            Condition::Filter(filter) => compile_filter(filter)?,
            Condition::FreeText(text) => {
                let text = if text.starts_with('"') { unquote(text) } else { (*text).to_owned() };
                let pattern = format!("%{}%", like_pattern(&text, false));
                Expr::col(SqlIdent(self.options.free_text_column.clone())).like(LikeExpr::new(pattern).escape(LIKE_ESCAPE))
            }
            Condition::Empty => Expr::val(true).into(),
        };
        Ok(expr)
    }

    /// `k:a OR k:b OR k:c` becomes `k IN (a, b, c)` once the chain is long
    /// enough.
    fn try_optimize_or_to_in(&self, condition: &Condition<'_, '_>) -> Result<Option<(SimpleExpr, Optimization)>, CompileError> {
        let mut key = None;
        let mut values = Vec::new();
        if !collect_equality_values(condition, &mut key, &mut values) {
            return Ok(None);
        }
        let Some(key) = key else { return Ok(None) };
        if values.len() < self.options.or_to_in_threshold.max(2) {
            return Ok(None);
        }

        let in_values = values.iter().map(|v| to_sql_value(v)).collect::<Result<Vec<_>, _>>()?;
        let in_expr = Expr::col(SqlIdent(key.to_string())).is_in(in_values);
        let optimization = Optimization::OrToIn { field: key.to_string(), value_count: values.len() };
        Ok(Some((in_expr, optimization)))
    }
}

/// Recursively collects the values of an OR chain of plain equality filters
/// on a single key. Returns `false` as soon as the chain breaks the pattern.
fn collect_equality_values<'t, 'a>(
    condition: &Condition<'t, 'a>,
    key: &mut Option<&'a str>,
    values: &mut Vec<&'t ValueToken<'a>>,
) -> bool {
    match condition {
        Condition::Or(left, right) => {
            collect_equality_values(left, key, values) && collect_equality_values(right, key, values)
        }
        Condition::Grouped(inner) => collect_equality_values(inner, key, values),
        Condition::Filter(filter) => {
            let filter: &'t FilterToken<'a> = *filter;
            let plain = !filter.negated
                && filter.operator.operator == Operator::Equal
                && !matches!(&filter.value.value, Value::List(_))
                && !matches!(&filter.value.value, Value::Text(text) if text.contains('*'));
            if !plain || key.is_some_and(|k| k != filter.key.text) {
                return false;
            }
            *key = Some(filter.key.text);
            values.push(&filter.value);
            true
        }
        _ => false,
    }
}

const LIKE_ESCAPE: char = '!';

/// Escapes the LIKE metacharacters of `text`. With `wildcards`, `*` becomes
/// `%`.
fn like_pattern(text: &str, wildcards: bool) -> String {
    let mut pattern = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '*' if wildcards => pattern.push('%'),
            '%' | '_' | LIKE_ESCAPE => {
                pattern.push(LIKE_ESCAPE);
                pattern.push(c);
            }
            _ => pattern.push(c),
        }
    }
    pattern
}

fn compile_filter(filter: &FilterToken<'_>) -> Result<SimpleExpr, CompileError> {
    let column = Expr::col(SqlIdent(filter.key.text.to_string()));
    let operator = filter.operator.operator;

    let expr = match &filter.value.value {
        Value::List(items) => {
            let values = items.iter().map(to_sql_value).collect::<Result<Vec<_>, _>>()?;
            match operator {
                Operator::Equal => column.is_in(values),
                Operator::NotEqual => column.is_not_in(values),
                other => return Err(CompileError::ListOperator(other.symbol())),
            }
        }
        Value::Text(text) if text.contains('*') && !operator.is_ordering() => {
            let pattern = LikeExpr::new(like_pattern(text, true)).escape(LIKE_ESCAPE);
            if operator == Operator::Equal {
                column.like(pattern)
            } else {
                column.not_like(pattern)
            }
        }
        _ => {
            let value = to_sql_value(&filter.value)?;
            match operator {
                Operator::Equal => column.eq(value),
                Operator::NotEqual => column.ne(value),
                Operator::GreaterThan => column.gt(value),
                Operator::GreaterThanOrEqual => column.gte(value),
                Operator::LessThan => column.lt(value),
                Operator::LessThanOrEqual => column.lte(value),
            }
        }
    };

    Ok(if filter.negated { expr.not() } else { expr })
}

/// Converts a scalar value to a sea-query value. Numeric kinds are
/// normalised: durations to milliseconds, sizes to bytes, percentages to
/// fractions.
fn to_sql_value(value: &ValueToken<'_>) -> Result<SqlValue, CompileError> {
    let number = |n: Option<f64>| n.map(|n| SqlValue::Double(Some(n))).ok_or(CompileError::InvalidValue(value.span));

    match &value.value {
        Value::Text(text) => Ok(SqlValue::String(Some(Box::new(text.clone())))),
        Value::Number(parsed) => number(clean(parsed).and_then(UnitValue::number_value)),
        Value::Duration(parsed) => number(clean(parsed).and_then(UnitValue::duration_millis)),
        Value::Size(parsed) => number(clean(parsed).and_then(UnitValue::size_bytes)),
        Value::Percentage(parsed) => number(clean(parsed).and_then(UnitValue::percentage_fraction)),
        Value::List(_) => Err(CompileError::InvalidValue(value.span)),
    }
}

fn clean<'v, 'a>(parsed: &'v Option<Parsed<UnitValue<'a>>>) -> Option<&'v UnitValue<'a>> {
    match parsed {
        Some(Parsed::Ok(value)) => Some(value),
        _ => None,
    }
}

/// Builds the boolean condition tree of a token sequence. `None` for a query
/// with no terms.
pub fn build_condition<'t, 'a>(tokens: &'t [TypedToken<'a>]) -> Result<Option<Condition<'t, 'a>>, CompileError> {
    let significant: Vec<&'t TypedToken<'a>> =
        tokens.iter().filter(|t| !matches!(t.node, Node::Spaces)).collect();
    if significant.is_empty() {
        return Ok(None);
    }

    let mut parser = ConditionParser { tokens: &significant, position: 0 };
    let condition = parser.parse_or_expression()?;
    match parser.peek() {
        Some(token) => Err(CompileError::UnexpectedToken(token.span)),
        None => Ok(Some(condition)),
    }
}

struct ConditionParser<'p, 't, 'a> {
    tokens: &'p [&'t TypedToken<'a>],
    position: usize,
}

impl<'p, 't, 'a> ConditionParser<'p, 't, 'a> {
    fn peek(&self) -> Option<&'t TypedToken<'a>> {
        self.tokens.get(self.position).copied()
    }

    fn advance(&mut self) -> Option<&'t TypedToken<'a>> {
        let token = self.peek();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn match_connector(&self, operator: BooleanOperator) -> bool {
        matches!(self.peek(), Some(token) if token.node == Node::LogicBoolean(operator))
    }

    fn parse_or_expression(&mut self) -> Result<Condition<'t, 'a>, CompileError> {
        let mut left = self.parse_and_expression()?;

        while self.match_connector(BooleanOperator::Or) {
            self.advance();
            let right = self.parse_and_expression()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_and_expression(&mut self) -> Result<Condition<'t, 'a>, CompileError> {
        let mut left = self.parse_primary_expression()?;

        loop {
            if self.match_connector(BooleanOperator::And) {
                self.advance();
            } else if !self.peek().is_some_and(|t| t.is_term() || t.node == Node::LParen) {
                break;
            }
            let right = self.parse_primary_expression()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_primary_expression(&mut self) -> Result<Condition<'t, 'a>, CompileError> {
        let token = self.advance().ok_or(CompileError::UnexpectedEnd)?;
        match &token.node {
            Node::LParen => {
                if matches!(self.peek(), Some(next) if next.node == Node::RParen) {
                    self.advance();
                    return Ok(Condition::Empty);
                }
                let inner = self.parse_or_expression()?;
                match self.advance() {
                    Some(close) if close.node == Node::RParen => Ok(Condition::Grouped(Box::new(inner))),
                    Some(other) => Err(CompileError::UnexpectedToken(other.span)),
                    None => Err(CompileError::UnexpectedEnd),
                }
            }
            Node::Filter(filter) => Ok(Condition::Filter(filter.as_ref())),
            Node::FreeText { .. } => Ok(Condition::FreeText(token.text)),
            _ => Err(CompileError::UnexpectedToken(token.span)),
        }
    }
}
