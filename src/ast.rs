//! 分类器产生的类型化 token，以及由合法 token 序列构建的布尔条件树

use serde::Serialize;

use crate::fields::FieldDefinition;
use crate::outcome::Parsed;
use crate::token::{Operator, Span, TokenKind};
use crate::value::UnitValue;

/// 分类后的 token，`span` 和 `text` 与原始 token 相同
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedToken<'a> {
    pub span: Span,
    pub text: &'a str,
    pub node: Node<'a>,
}

impl<'a> TypedToken<'a> {
    pub fn kind(&self) -> TokenKind {
        match &self.node {
            Node::Spaces => TokenKind::Spaces,
            Node::FreeText { .. } | Node::Malformed => TokenKind::FreeText,
            Node::LParen => TokenKind::LParen,
            Node::RParen => TokenKind::RParen,
            Node::LogicBoolean(_) => TokenKind::LogicBoolean,
            Node::Filter(_) => TokenKind::Filter,
        }
    }

    pub fn as_filter(&self) -> Option<&FilterToken<'a>> {
        match &self.node {
            Node::Filter(filter) => Some(filter.as_ref()),
            _ => None,
        }
    }

    /// 是否为搜索词项（过滤条件或自由文本）
    pub fn is_term(&self) -> bool {
        matches!(self.node, Node::Filter(_) | Node::FreeText { .. } | Node::Malformed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Node<'a> {
    Spaces,
    FreeText { unterminated: bool },
    LParen,
    RParen,
    LogicBoolean(BooleanOperator),
    Filter(Box<FilterToken<'a>>),
    /// 分类器无法理解的原始 token，例如缺少组成部分的过滤条件
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanOperator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterToken<'a> {
    pub negated: bool,
    pub key: KeyToken<'a>,
    pub operator: OperatorToken,
    pub value: ValueToken<'a>,
    /// 紧跟在已闭合的引号或列表之后的多余文本
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailing: Option<Span>,
    /// 键不是已知字段时为 `None`
    #[serde(skip)]
    pub definition: Option<&'a FieldDefinition>,
}

impl<'a> FilterToken<'a> {
    pub fn is_unknown_key(&self) -> bool {
        self.definition.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyToken<'a> {
    pub span: Span,
    pub text: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperatorToken {
    pub span: Span,
    pub operator: Operator,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueToken<'a> {
    pub span: Span,
    pub text: &'a str,
    pub quoted: bool,
    /// 引号或方括号未闭合
    pub unterminated: bool,
    pub value: Value<'a>,
}

impl<'a> ValueToken<'a> {
    pub fn kind(&self) -> TokenKind {
        match &self.value {
            Value::Text(_) => TokenKind::ValueText,
            Value::List(_) => TokenKind::ValueTextList,
            Value::Number(_) => TokenKind::ValueNumber,
            Value::Duration(_) => TokenKind::ValueDuration,
            Value::Size(_) => TokenKind::ValueSize,
            Value::Percentage(_) => TokenKind::ValuePercentage,
        }
    }

    /// 列表值的元素，标量值为空
    pub fn items(&self) -> &[ValueToken<'a>] {
        match &self.value {
            Value::List(items) => items,
            _ => &[],
        }
    }
}

/// 解析后的过滤值。文本完全不是数字时，数值类型为 `None`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "parsed", rename_all = "snake_case")]
pub enum Value<'a> {
    /// 去掉引号并处理转义后的文本
    Text(String),
    List(Vec<ValueToken<'a>>),
    Number(Option<Parsed<UnitValue<'a>>>),
    Duration(Option<Parsed<UnitValue<'a>>>),
    Size(Option<Parsed<UnitValue<'a>>>),
    Percentage(Option<Parsed<UnitValue<'a>>>),
}

/// 合法查询的布尔结构
#[derive(Debug, Clone, PartialEq)]
pub enum Condition<'t, 'a> {
    And(Box<Condition<'t, 'a>>, Box<Condition<'t, 'a>>),
    Or(Box<Condition<'t, 'a>>, Box<Condition<'t, 'a>>),
    /// 使用括号分组的条件表达式
    Grouped(Box<Condition<'t, 'a>>),
    Filter(&'t FilterToken<'a>),
    FreeText(&'a str),
    /// `()`，匹配所有记录
    Empty,
}
