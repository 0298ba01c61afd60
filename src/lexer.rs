//! 搜索栏的词法分析器
//!
//! 词法分析永远不会失败。输入的每个字符（包括空白）都恰好属于一个 token，
//! 拼接所有 token 的文本即可还原输入，光标位置也总能映射到某个 token。
//! 未闭合的引号或列表会被并入当前 token，并标记为 `unterminated`。

use crate::outcome::Parsed;
use crate::token::{Operator, RawFilter, Span, Token, TokenKind, ValueShape};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
    degraded: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0, degraded: false }
    }

    /// 目前为止是否有 token 吞掉了未闭合的输入
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token<'a> {
        Token::new(kind, Span::new(start, self.position), &self.input[start..self.position])
    }

    fn read_spaces(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
        self.token(TokenKind::Spaces, start)
    }

    /// 读取双引号包围的字符串，从开始引号处读起
    /// 如果在结束引号之前输入就结束了，返回 `false`
    fn read_quoted(&mut self) -> bool {
        self.bump(); // 消费开始引号
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    if self.bump().is_none() {
                        return false;
                    }
                }
                '"' => return true,
                _ => {}
            }
        }
        false
    }

    /// 读取 `[...]` 列表，从左方括号处读起。引号内的方括号和逗号不计
    /// 如果在右方括号之前输入就结束了，返回 `false`
    fn read_list(&mut self) -> bool {
        self.bump(); // 消费 '['
        while let Some(c) = self.peek() {
            match c {
                '"' => {
                    if !self.read_quoted() {
                        return false;
                    }
                }
                ']' => {
                    self.bump();
                    return true;
                }
                _ => {
                    self.bump();
                }
            }
        }
        false
    }

    fn read_plain_value(&mut self) {
        while let Some(c) = self.peek() {
            if is_term_boundary(c) {
                break;
            }
            self.bump();
        }
    }

    fn read_term(&mut self, start: usize) -> Token<'a> {
        match self.read_filter(start) {
            Some(token) => token,
            None => self.read_free_text(start),
        }
    }

    /// 尝试在 `start` 处读取 `[!]key<operator><value>`
    /// 如果该词项不是过滤条件的形式，则不移动位置并返回 `None`
    fn read_filter(&mut self, start: usize) -> Option<Token<'a>> {
        let negated = self.input[start..].starts_with('!');
        let key_start = start + usize::from(negated);
        let key_len = self.input[key_start..]
            .find(|c: char| !is_key_char(c))
            .unwrap_or(self.input.len() - key_start);
        if key_len == 0 {
            return None;
        }
        let key = Span::new(key_start, key_start + key_len);
        let (operator, operator_len) = match_operator(&self.input[key.end..])?;
        let operator_span = Span::new(key.end, key.end + operator_len);

        self.position = operator_span.end;
        let value_start = self.position;
        let (value_shape, terminated) = match self.peek() {
            Some('[') => (ValueShape::List, self.read_list()),
            Some('"') => (ValueShape::Quoted, self.read_quoted()),
            _ => {
                self.read_plain_value();
                (ValueShape::Plain, true)
            }
        };

        let value = Span::new(value_start, self.position);
        let glued = terminated && value_shape != ValueShape::Plain && self.peek().is_some_and(|c| !is_term_boundary(c));
        let trailing = if glued {
            self.read_plain_value();
            self.degraded = true;
            log::trace!("text glued to value at {}..{}", value.end, self.position);
            Some(Span::new(value.end, self.position))
        } else {
            None
        };

        let mut token = self.token(TokenKind::Filter, start);
        token.unterminated = !terminated;
        token.filter = Some(RawFilter { negated, key, operator, operator_span, value, value_shape, trailing });
        Some(token)
    }

    /// 读取自由文本词项。引号内的空白保留；整个词项为 `AND`/`OR` 时作为连接符
    fn read_free_text(&mut self, start: usize) -> Token<'a> {
        let mut terminated = true;
        while let Some(c) = self.peek() {
            if c == '"' {
                if !self.read_quoted() {
                    terminated = false;
                }
                continue;
            }
            if is_term_boundary(c) {
                break;
            }
            self.bump();
        }

        let text = &self.input[start..self.position];
        let kind = if text.eq_ignore_ascii_case("and") {
            TokenKind::LogicAnd
        } else if text.eq_ignore_ascii_case("or") {
            TokenKind::LogicOr
        } else {
            TokenKind::FreeText
        };
        let mut token = self.token(kind, start);
        token.unterminated = !terminated;
        token
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.position;
        let c = self.peek()?;

        let token = match c {
            c if c.is_whitespace() => self.read_spaces(start),
            '(' => {
                self.bump();
                self.token(TokenKind::LParen, start)
            }
            ')' => {
                self.bump();
                self.token(TokenKind::RParen, start)
            }
            _ => self.read_term(start),
        };

        if token.unterminated {
            self.degraded = true;
            log::trace!("unterminated {:?} token at {}..{}", token.kind, token.span.start, token.span.end);
        }
        Some(token)
    }
}

/// 将 `source` 切分为 token。有 token 吞掉了未闭合的引号或列表时结果为
/// `Degraded`，两种情况下 token 都可以使用
pub fn tokenize(source: &str) -> Parsed<Vec<Token<'_>>> {
    let mut lexer = Lexer::new(source);
    let tokens: Vec<_> = lexer.by_ref().collect();
    log::debug!("tokenized {} bytes into {} tokens", source.len(), tokens.len());
    Parsed::new(tokens, lexer.is_degraded())
}

/// 去掉字符串两端的引号并处理 `\x` 转义，允许缺少结束引号
pub fn unquote(raw: &str) -> String {
    let inner = raw.strip_prefix('"').unwrap_or(raw);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '"' => break,
            _ => out.push(c),
        }
    }
    out
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn is_term_boundary(c: char) -> bool {
    c.is_whitespace() || c == '(' || c == ')'
}

/// 匹配 `s` 开头的运算符，返回运算符及其长度
fn match_operator(s: &str) -> Option<(Operator, usize)> {
    if s.starts_with("!:") {
        return Some((Operator::NotEqual, 2));
    }
    let rest = s.strip_prefix(':')?;
    let matched = if rest.starts_with(">=") {
        (Operator::GreaterThanOrEqual, 3)
    } else if rest.starts_with("<=") {
        (Operator::LessThanOrEqual, 3)
    } else if rest.starts_with('>') {
        (Operator::GreaterThan, 2)
    } else if rest.starts_with('<') {
        (Operator::LessThan, 2)
    } else {
        (Operator::Equal, 1)
    };
    Some(matched)
}
