//! The validator.
//!
//! Walks a typed token sequence and reports every problem as a located
//! diagnostic. It never fails: anything it does not understand becomes a
//! diagnostic on the offending token. The query is valid when there are no
//! diagnostics.
//!
//! Structural checks:
//! - parentheses are balanced; an unmatched `(` or `)` is reported at its span
//! - `AND`/`OR` has a term on both sides
//! - adjacent terms are an implicit `AND`, unless
//!   `Adjacency::RequireConnector` is configured
//!
//! Semantic checks (need the field definitions attached by the classifier):
//! - the key is known
//! - the operator is allowed for the field
//! - the value parses under the field's value type, element by element for
//!   lists, and empty lists are only accepted where the field allows them

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ast::{FilterToken, Node, TypedToken, Value, ValueToken};
use crate::fields::FieldDefinition;
use crate::outcome::Parsed;
use crate::token::Span;

/// How two neighbouring terms with no connector between them are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjacency {
    #[default]
    ImplicitAnd,
    RequireConnector,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    pub adjacency: Adjacency,
    pub allow_free_text: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self { adjacency: Adjacency::ImplicitAnd, allow_free_text: true }
    }
}

/// Why a token is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    UnmatchedParen,
    DanglingConnector,
    MissingConnector,
    FreeTextNotAllowed,
    UnterminatedQuote,
    UnterminatedList,
    TrailingCharacters,
    UnknownKey,
    DisallowedOperator,
    MissingValue,
    MalformedValue,
    InvalidUnit,
    ValueNotAllowed,
    EmptyList,
    ListWithComparison,
    MalformedToken,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Reason::UnmatchedParen => "unmatched parenthesis",
            Reason::DanglingConnector => "logical operator has nothing to join",
            Reason::MissingConnector => "missing AND/OR between terms",
            Reason::FreeTextNotAllowed => "free text is not allowed",
            Reason::UnterminatedQuote => "missing closing quote",
            Reason::UnterminatedList => "missing closing bracket",
            Reason::TrailingCharacters => "unexpected text after the value",
            Reason::UnknownKey => "unknown key",
            Reason::DisallowedOperator => "operator not allowed for this key",
            Reason::MissingValue => "missing value",
            Reason::MalformedValue => "value does not match the key's type",
            Reason::InvalidUnit => "invalid unit",
            Reason::ValueNotAllowed => "value not allowed for this key",
            Reason::EmptyList => "list must not be empty",
            Reason::ListWithComparison => "lists only support equality",
            Reason::MalformedToken => "malformed token",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub span: Span,
    pub reason: Reason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    /// Ordered by span.
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Validator<'o> {
    options: &'o ValidationOptions,
}

impl<'o> Validator<'o> {
    pub fn new(options: &'o ValidationOptions) -> Self {
        Self { options }
    }

    pub fn validate(&self, tokens: &[TypedToken<'_>]) -> Validation {
        let mut diagnostics = Vec::new();
        let significant: Vec<&TypedToken<'_>> =
            tokens.iter().filter(|t| !matches!(t.node, Node::Spaces)).collect();

        self.check_structure(&significant, &mut diagnostics);
        for token in &significant {
            self.check_token(token, &mut diagnostics);
        }

        diagnostics.sort_by_key(|d| d.span);
        let validation = Validation { valid: diagnostics.is_empty(), diagnostics };
        log::debug!(
            "validated {} tokens: valid={} diagnostics={}",
            tokens.len(),
            validation.valid,
            validation.diagnostics.len()
        );
        validation
    }

    fn check_structure(&self, tokens: &[&TypedToken<'_>], diagnostics: &mut Vec<Diagnostic>) {
        let mut open_parens = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            let prev = i.checked_sub(1).map(|j| tokens[j]);
            let next = tokens.get(i + 1).copied();

            match token.node {
                Node::LParen => open_parens.push(token.span),
                Node::RParen => {
                    if open_parens.pop().is_none() {
                        diagnostics.push(Diagnostic { span: token.span, reason: Reason::UnmatchedParen });
                    }
                }
                Node::LogicBoolean(_) => {
                    let joins_left = prev.is_some_and(ends_operand);
                    let joins_right = next.is_some_and(starts_operand);
                    if !joins_left || !joins_right {
                        diagnostics.push(Diagnostic { span: token.span, reason: Reason::DanglingConnector });
                    }
                }
                _ => {}
            }

            if self.options.adjacency == Adjacency::RequireConnector
                && starts_operand(token)
                && prev.is_some_and(ends_operand)
            {
                diagnostics.push(Diagnostic { span: token.span, reason: Reason::MissingConnector });
            }
        }

        diagnostics.extend(
            open_parens.into_iter().map(|span| Diagnostic { span, reason: Reason::UnmatchedParen }),
        );
    }

    fn check_token(&self, token: &TypedToken<'_>, diagnostics: &mut Vec<Diagnostic>) {
        match &token.node {
            Node::FreeText { unterminated } => {
                if *unterminated {
                    diagnostics.push(Diagnostic { span: token.span, reason: Reason::UnterminatedQuote });
                }
                if !self.options.allow_free_text {
                    diagnostics.push(Diagnostic { span: token.span, reason: Reason::FreeTextNotAllowed });
                }
            }
            Node::Filter(filter) => check_filter(token.span, filter, diagnostics),
            Node::Malformed => {
                diagnostics.push(Diagnostic { span: token.span, reason: Reason::MalformedToken });
            }
            Node::Spaces | Node::LParen | Node::RParen | Node::LogicBoolean(_) => {}
        }
    }
}

/// Validates with default options.
pub fn validate(tokens: &[TypedToken<'_>]) -> Validation {
    Validator::new(&ValidationOptions::default()).validate(tokens)
}

fn starts_operand(token: &TypedToken<'_>) -> bool {
    token.is_term() || matches!(token.node, Node::LParen)
}

fn ends_operand(token: &TypedToken<'_>) -> bool {
    token.is_term() || matches!(token.node, Node::RParen)
}

fn check_filter(span: Span, filter: &FilterToken<'_>, diagnostics: &mut Vec<Diagnostic>) {
    let value = &filter.value;
    if let Some(trailing) = filter.trailing {
        diagnostics.push(Diagnostic { span: trailing, reason: Reason::TrailingCharacters });
    }

    let Some(definition) = filter.definition else {
        diagnostics.push(Diagnostic { span: filter.key.span, reason: Reason::UnknownKey });
        check_syntax_only(span, value, diagnostics);
        return;
    };

    let operator = filter.operator.operator;
    let operator_allowed = definition.allows(operator);
    if !operator_allowed {
        diagnostics.push(Diagnostic { span: filter.operator.span, reason: Reason::DisallowedOperator });
    }

    match &value.value {
        Value::List(items) => {
            if value.unterminated {
                diagnostics.push(Diagnostic { span: value.span, reason: Reason::UnterminatedList });
            }
            if operator_allowed && operator.is_ordering() {
                diagnostics.push(Diagnostic { span: filter.operator.span, reason: Reason::ListWithComparison });
            }
            if items.is_empty() && !definition.allow_empty_list {
                diagnostics.push(Diagnostic { span: value.span, reason: Reason::EmptyList });
            }
            for item in items {
                check_scalar(item, item.span, definition, diagnostics);
            }
        }
        _ => {
            let anchor = if value.span.is_empty() { span } else { value.span };
            check_scalar(value, anchor, definition, diagnostics);
        }
    }
}

/// Unknown keys still get their quotes and brackets checked.
fn check_syntax_only(span: Span, value: &ValueToken<'_>, diagnostics: &mut Vec<Diagnostic>) {
    if value.unterminated {
        let reason = if matches!(value.value, Value::List(_)) {
            Reason::UnterminatedList
        } else {
            Reason::UnterminatedQuote
        };
        diagnostics.push(Diagnostic { span: value.span, reason });
    }
    for item in value.items() {
        if item.unterminated {
            diagnostics.push(Diagnostic { span: item.span, reason: Reason::UnterminatedQuote });
        }
    }
    if value.text.is_empty() {
        diagnostics.push(Diagnostic { span, reason: Reason::MissingValue });
    }
}

fn check_scalar(value: &ValueToken<'_>, anchor: Span, definition: &FieldDefinition, diagnostics: &mut Vec<Diagnostic>) {
    if value.unterminated {
        diagnostics.push(Diagnostic { span: value.span, reason: Reason::UnterminatedQuote });
    }
    if value.text.is_empty() {
        diagnostics.push(Diagnostic { span: anchor, reason: Reason::MissingValue });
        return;
    }

    let reason = match &value.value {
        Value::Text(text) if !definition.accepts_text(text) => Some(Reason::ValueNotAllowed),
        Value::Text(_) => None,
        Value::Number(parsed) => match parsed {
            None | Some(Parsed::Degraded(_)) => Some(Reason::MalformedValue),
            Some(Parsed::Ok(_)) => None,
        },
        Value::Duration(parsed) | Value::Size(parsed) | Value::Percentage(parsed) => match parsed {
            None => Some(Reason::MalformedValue),
            Some(Parsed::Degraded(_)) => Some(Reason::InvalidUnit),
            Some(Parsed::Ok(_)) => None,
        },
        // Nested lists cannot be written; treat one as a classifier fault.
        Value::List(_) => Some(Reason::MalformedToken),
    };
    if let Some(reason) = reason {
        diagnostics.push(Diagnostic { span: anchor, reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::fields::{FieldDefinitions, ValueType};
    use crate::lexer::tokenize;
    use crate::token::Operator;

    fn fields() -> FieldDefinitions {
        let mut fields = FieldDefinitions::new();
        fields
            .insert("status", FieldDefinition::new(ValueType::Text).with_values(["unresolved", "ignored"]))
            .insert("span.duration", FieldDefinition::new(ValueType::Duration))
            .insert("size", FieldDefinition::new(ValueType::Size))
            .insert("rate", FieldDefinition::new(ValueType::Percentage))
            .insert("count", FieldDefinition::new(ValueType::Number).with_operators(&[Operator::GreaterThan]))
            .insert("release", FieldDefinition::new(ValueType::Text).allowing_empty_list())
            .insert("tag", FieldDefinition::new(ValueType::Text));
        fields
    }

    fn run(input: &str, options: &ValidationOptions) -> Validation {
        let fields = fields();
        let tokens = tokenize(input).into_inner();
        let typed = classify(&tokens, &fields);
        Validator::new(options).validate(&typed)
    }

    fn check(input: &str) -> Validation {
        run(input, &ValidationOptions::default())
    }

    fn reasons(validation: &Validation) -> Vec<Reason> {
        validation.diagnostics.iter().map(|d| d.reason).collect()
    }

    #[test]
    fn test_empty_query_is_valid() {
        let validation = check("");
        assert!(validation.valid);
        assert!(validation.diagnostics.is_empty());
        assert!(check("   ").valid);
    }

    #[test]
    fn test_known_filter_is_valid() {
        assert!(check("status:unresolved").valid);
        assert!(check("span.duration:>5s AND status:unresolved").valid);
    }

    #[test]
    fn test_unmatched_open_paren() {
        let validation = check("(status:unresolved OR status:ignored");
        assert!(!validation.valid);
        assert_eq!(
            validation.diagnostics,
            vec![Diagnostic { span: Span::new(0, 1), reason: Reason::UnmatchedParen }]
        );
    }

    #[test]
    fn test_unmatched_close_paren() {
        let validation = check("foo) bar");
        assert_eq!(
            validation.diagnostics,
            vec![Diagnostic { span: Span::new(3, 4), reason: Reason::UnmatchedParen }]
        );
    }

    #[test]
    fn test_balanced_parens() {
        for input in ["(a)", "((a) (b))", "a (b OR (c d)) e", "()"] {
            assert!(check(input).valid, "{input}");
        }
    }

    #[test]
    fn test_paren_diagnostic_offsets() {
        let validation = check("a (b (c) d");
        assert_eq!(
            validation.diagnostics,
            vec![Diagnostic { span: Span::new(2, 3), reason: Reason::UnmatchedParen }]
        );
        let validation = check("(a)) (");
        assert_eq!(
            validation.diagnostics,
            vec![
                Diagnostic { span: Span::new(3, 4), reason: Reason::UnmatchedParen },
                Diagnostic { span: Span::new(5, 6), reason: Reason::UnmatchedParen },
            ]
        );
    }

    #[test]
    fn test_implicit_and_is_valid_by_default() {
        assert!(check("status:unresolved foo bar").valid);
        assert!(check("(a) (b)").valid);
    }

    #[test]
    fn test_require_connector_policy() {
        let options = ValidationOptions { adjacency: Adjacency::RequireConnector, ..Default::default() };
        let validation = run("foo bar", &options);
        assert_eq!(
            validation.diagnostics,
            vec![Diagnostic { span: Span::new(4, 7), reason: Reason::MissingConnector }]
        );
        assert!(run("foo AND bar", &options).valid);
        assert!(!run("(foo) (bar)", &options).valid);
        assert!(run("(foo) OR (bar)", &options).valid);
    }

    #[test]
    fn test_dangling_connectors() {
        let validation = check("status:unresolved AND");
        assert_eq!(
            validation.diagnostics,
            vec![Diagnostic { span: Span::new(18, 21), reason: Reason::DanglingConnector }]
        );
        assert_eq!(reasons(&check("OR foo")), vec![Reason::DanglingConnector]);
        assert_eq!(reasons(&check("(AND foo)")), vec![Reason::DanglingConnector]);
        assert_eq!(reasons(&check("foo AND OR bar")), vec![Reason::DanglingConnector, Reason::DanglingConnector]);
        assert_eq!(reasons(&check("AND")), vec![Reason::DanglingConnector]);
    }

    #[test]
    fn test_free_text_policy() {
        assert!(check("some words").valid);
        let options = ValidationOptions { allow_free_text: false, ..Default::default() };
        assert_eq!(reasons(&run("status:unresolved words", &options)), vec![Reason::FreeTextNotAllowed]);
    }

    #[test]
    fn test_unterminated_free_text_quote() {
        assert_eq!(reasons(&check(r#"foo "bar baz"#)), vec![Reason::UnterminatedQuote]);
    }

    #[test]
    fn test_unknown_key() {
        let validation = check("bogusfield:5");
        assert!(!validation.valid);
        assert_eq!(
            validation.diagnostics,
            vec![Diagnostic { span: Span::new(0, 10), reason: Reason::UnknownKey }]
        );
    }

    #[test]
    fn test_operator_gating() {
        let validation = check("tag:>foo");
        assert_eq!(
            validation.diagnostics,
            vec![Diagnostic { span: Span::new(3, 5), reason: Reason::DisallowedOperator }]
        );
        assert!(check("span.duration:>5s").valid);
        assert!(check("span.duration:<=1.5min").valid);
        assert!(check("count:>5").valid);
        assert_eq!(reasons(&check("count:5")), vec![Reason::DisallowedOperator]);
        assert!(check("tag!:foo").valid);
    }

    #[test]
    fn test_value_type_checks() {
        assert_eq!(reasons(&check("span.duration:>fast")), vec![Reason::MalformedValue]);
        assert_eq!(reasons(&check("span.duration:>5parsecs")), vec![Reason::InvalidUnit]);
        assert!(check("span.duration:>5").valid);
        assert_eq!(reasons(&check("size:>3qb")), vec![Reason::InvalidUnit]);
        assert!(check("size:>3kib").valid);
        assert!(check("rate:<50%").valid);
        assert_eq!(reasons(&check("rate:<50pct")), vec![Reason::InvalidUnit]);
        assert_eq!(reasons(&check("count:>5x")), vec![Reason::MalformedValue]);
        assert_eq!(reasons(&check("status:bogus")), vec![Reason::ValueNotAllowed]);
    }

    #[test]
    fn test_invalid_filter_does_not_hide_valid_ones() {
        let validation = check("status:unresolved span.duration:>fast");
        assert!(!validation.valid);
        assert_eq!(validation.diagnostics.len(), 1);
        assert_eq!(validation.diagnostics[0].span, Span::new(33, 37));
    }

    #[test]
    fn test_missing_value() {
        let validation = check("status:");
        assert_eq!(
            validation.diagnostics,
            vec![Diagnostic { span: Span::new(0, 7), reason: Reason::MissingValue }]
        );
        assert_eq!(reasons(&check("bogus:")), vec![Reason::UnknownKey, Reason::MissingValue]);
    }

    #[test]
    fn test_list_values() {
        assert!(check("status:[unresolved, ignored]").valid);
        let validation = check("status:[unresolved, bogus]");
        assert_eq!(
            validation.diagnostics,
            vec![Diagnostic { span: Span::new(20, 25), reason: Reason::ValueNotAllowed }]
        );
        assert!(check("span.duration:[5s, 10ms]").valid);
        assert_eq!(reasons(&check("span.duration:[5s, slow]")), vec![Reason::MalformedValue]);
        assert_eq!(reasons(&check("status:[unresolved,]")), vec![Reason::MissingValue]);
    }

    #[test]
    fn test_empty_list_depends_on_field() {
        assert_eq!(reasons(&check("status:[]")), vec![Reason::EmptyList]);
        assert!(check("release:[]").valid);
    }

    #[test]
    fn test_list_with_comparison() {
        assert_eq!(reasons(&check("span.duration:>[5s, 10s]")), vec![Reason::ListWithComparison]);
        assert_eq!(reasons(&check("status:>[unresolved]")), vec![Reason::DisallowedOperator]);
    }

    #[test]
    fn test_unterminated_value() {
        assert_eq!(reasons(&check("status:[unresolved")), vec![Reason::UnterminatedList]);
        assert_eq!(reasons(&check(r#"tag:"open"#)), vec![Reason::UnterminatedQuote]);
        assert_eq!(reasons(&check("bogus:[a")), vec![Reason::UnknownKey, Reason::UnterminatedList]);
        assert_eq!(
            check(r#"bogus:["a"#).diagnostics,
            vec![
                Diagnostic { span: Span::new(0, 5), reason: Reason::UnknownKey },
                Diagnostic { span: Span::new(6, 9), reason: Reason::UnterminatedList },
                Diagnostic { span: Span::new(7, 9), reason: Reason::UnterminatedQuote },
            ]
        );
    }

    #[test]
    fn test_text_glued_to_value_is_reported() {
        let validation = check("status:[unresolved]x");
        assert_eq!(
            validation.diagnostics,
            vec![Diagnostic { span: Span::new(19, 20), reason: Reason::TrailingCharacters }]
        );
        let validation = check(r#"status:"unresolved"x"#);
        assert_eq!(
            validation.diagnostics,
            vec![Diagnostic { span: Span::new(19, 20), reason: Reason::TrailingCharacters }]
        );
        assert_eq!(
            reasons(&check(r#"bogus:"a"bc"#)),
            vec![Reason::UnknownKey, Reason::TrailingCharacters]
        );
        assert!(check("status:[unresolved] x").valid);
    }

    #[test]
    fn test_malformed_token_is_reported_not_fatal() {
        let tokens = vec![TypedToken { span: Span::new(0, 3), text: "a:b", node: Node::Malformed }];
        let validation = validate(&tokens);
        assert_eq!(
            validation.diagnostics,
            vec![Diagnostic { span: Span::new(0, 3), reason: Reason::MalformedToken }]
        );
    }

    #[test]
    fn test_validation_is_idempotent() {
        let input = "(status:bogus OR span.duration:>5s AND";
        assert_eq!(check(input), check(input));
    }

    #[test]
    fn test_reason_serializes_snake_case() {
        let json = serde_json::to_string(&Reason::UnknownKey).unwrap();
        assert_eq!(json, "\"unknown_key\"");
        assert_eq!(Reason::UnmatchedParen.to_string(), "unmatched parenthesis");
    }
}
