//! Search-bar query language: tokenizer, classifier and validator, plus a
//! SQL preview of valid queries.
//!
//! ```text
//! source --tokenize--> Vec<Token> --classify--> Vec<TypedToken> --validate--> Validation
//! ```
//!
//! Every stage is total. Incomplete input such as `status:"unres` still
//! yields a full token sequence and a located diagnostic.

pub mod ast;
pub mod classifier;
pub mod config;
pub mod fields;
pub mod lexer;
pub mod outcome;
pub mod sql_compiler;
pub mod token;
pub mod validator;
pub mod value;

use serde::Serialize;

use crate::ast::TypedToken;
use crate::classifier::Classifier;
use crate::config::SearchConfig;
use crate::validator::{Validation, Validator};

/// The typed tokens and verdict for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis<'a> {
    pub tokens: Vec<TypedToken<'a>>,
    pub validation: Validation,
    /// The tokenizer had to recover from unterminated input.
    pub degraded: bool,
}

/// Runs the whole pipeline on `source`.
pub fn analyze<'a>(source: &'a str, config: &'a SearchConfig) -> Analysis<'a> {
    let classifier = Classifier::new(&config.fields);
    let classified = lexer::tokenize(source).map(|raw| classifier.classify(&raw));
    let degraded = classified.is_degraded();
    let tokens = classified.into_inner();
    let validation = Validator::new(&config.validation).validate(&tokens);
    Analysis { tokens, validation, degraded }
}
