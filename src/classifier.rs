//! The token classifier.
//!
//! Turns the lexer's flat tokens into typed tokens: filters are split into
//! key, operator and value, list values are split into their elements, and
//! each value is handed to the sub-parser for its field's declared type.
//! Unknown keys are classified as text and left for the validator to report.

use crate::ast::{BooleanOperator, FilterToken, KeyToken, Node, OperatorToken, TypedToken, Value, ValueToken};
use crate::fields::{FieldDefinitions, ValueType};
use crate::lexer::unquote;
use crate::token::{Span, Token, TokenKind, ValueShape};
use crate::value::{parse_duration, parse_number, parse_percentage, parse_size};

pub struct Classifier<'a> {
    fields: &'a FieldDefinitions,
}

impl<'a> Classifier<'a> {
    pub fn new(fields: &'a FieldDefinitions) -> Self {
        Self { fields }
    }

    pub fn classify(&self, tokens: &[Token<'a>]) -> Vec<TypedToken<'a>> {
        let typed: Vec<_> = tokens.iter().map(|token| self.classify_token(token)).collect();
        log::debug!(
            "classified {} tokens ({} filters)",
            typed.len(),
            typed.iter().filter(|t| t.as_filter().is_some()).count()
        );
        typed
    }

    fn classify_token(&self, token: &Token<'a>) -> TypedToken<'a> {
        let node = match token.kind {
            TokenKind::Spaces => Node::Spaces,
            TokenKind::FreeText => Node::FreeText { unterminated: token.unterminated },
            TokenKind::LParen => Node::LParen,
            TokenKind::RParen => Node::RParen,
            TokenKind::LogicAnd => Node::LogicBoolean(BooleanOperator::And),
            TokenKind::LogicOr => Node::LogicBoolean(BooleanOperator::Or),
            TokenKind::LogicBoolean => match token.text.to_ascii_lowercase().as_str() {
                "and" => Node::LogicBoolean(BooleanOperator::And),
                "or" => Node::LogicBoolean(BooleanOperator::Or),
                _ => Node::Malformed,
            },
            TokenKind::Filter => match self.classify_filter(token) {
                Some(filter) => Node::Filter(Box::new(filter)),
                None => {
                    log::trace!("filter token at {}..{} has inconsistent parts", token.span.start, token.span.end);
                    Node::Malformed
                }
            },
            // Value tokens only ever appear inside filters.
            TokenKind::ValueText
            | TokenKind::ValueTextList
            | TokenKind::ValueNumber
            | TokenKind::ValueDuration
            | TokenKind::ValueSize
            | TokenKind::ValuePercentage => Node::Malformed,
        };
        TypedToken { span: token.span, text: token.text, node }
    }

    fn classify_filter(&self, token: &Token<'a>) -> Option<FilterToken<'a>> {
        let raw = token.filter?;
        if raw.operator_span.start != raw.key.end || raw.value.start != raw.operator_span.end {
            return None;
        }
        if raw.trailing.is_some_and(|t| t.start != raw.value.end || token.slice(t).is_none()) {
            return None;
        }
        let key_text = token.slice(raw.key)?;
        let value_text = token.slice(raw.value)?;

        let definition = self.fields.get(key_text);
        let value_type = definition.map_or(ValueType::Text, |d| d.value_type);
        let value = match raw.value_shape {
            ValueShape::List => classify_list(raw.value, value_text, token.unterminated, value_type),
            ValueShape::Quoted => classify_scalar(raw.value, value_text, value_type, true, token.unterminated),
            ValueShape::Plain => classify_scalar(raw.value, value_text, value_type, false, false),
        };

        Some(FilterToken {
            negated: raw.negated,
            key: KeyToken { span: raw.key, text: key_text },
            operator: OperatorToken { span: raw.operator_span, operator: raw.operator },
            value,
            trailing: raw.trailing,
            definition,
        })
    }
}

/// Classifies a raw token sequence against the given field definitions.
pub fn classify<'a>(tokens: &[Token<'a>], fields: &'a FieldDefinitions) -> Vec<TypedToken<'a>> {
    Classifier::new(fields).classify(tokens)
}

fn classify_scalar<'a>(span: Span, text: &'a str, value_type: ValueType, quoted: bool, unterminated: bool) -> ValueToken<'a> {
    let content = if quoted {
        let inner = text.strip_prefix('"').unwrap_or(text);
        if unterminated {
            inner
        } else {
            inner.strip_suffix('"').unwrap_or(inner)
        }
    } else {
        text
    };

    let value = match value_type {
        ValueType::Text if quoted => Value::Text(unquote(text)),
        ValueType::Text => Value::Text(text.to_string()),
        ValueType::Number => Value::Number(parse_number(content)),
        ValueType::Duration => Value::Duration(parse_duration(content)),
        ValueType::Size => Value::Size(parse_size(content)),
        ValueType::Percentage => Value::Percentage(parse_percentage(content)),
    };
    ValueToken { span, text, quoted, unterminated, value }
}

fn classify_list<'a>(span: Span, text: &'a str, unterminated: bool, value_type: ValueType) -> ValueToken<'a> {
    let mut inner = text.strip_prefix('[').unwrap_or(text);
    if !unterminated {
        inner = inner.strip_suffix(']').unwrap_or(inner);
    }
    let inner_start = span.start + usize::from(text.starts_with('['));

    let mut items = Vec::new();
    if !inner.trim().is_empty() {
        for (start, end) in split_list(inner) {
            let segment = &inner[start..end];
            let lead = segment.len() - segment.trim_start().len();
            let element = segment.trim();
            let element_start = inner_start + start + lead;
            let element_span = Span::new(element_start, element_start + element.len());

            let quoted = element.starts_with('"');
            let element_unterminated = quoted && !has_closing_quote(element);
            items.push(classify_scalar(element_span, element, value_type, quoted, element_unterminated));
        }
    }

    ValueToken { span, text, quoted: false, unterminated, value: Value::List(items) }
}

/// Byte ranges of the comma-separated segments of a list body. Commas inside
/// quoted elements do not split.
fn split_list(inner: &str) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut segment_start = 0;
    let mut in_quote = false;
    let mut escaped = false;

    for (i, c) in inner.char_indices() {
        if in_quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quote = false;
            }
            continue;
        }
        match c {
            '"' => in_quote = true,
            ',' => {
                segments.push((segment_start, i));
                segment_start = i + 1;
            }
            _ => {}
        }
    }
    segments.push((segment_start, inner.len()));
    segments
}

fn has_closing_quote(text: &str) -> bool {
    let mut chars = text.chars().skip(1);
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '"' => return true,
            _ => {}
        }
    }
    false
}
