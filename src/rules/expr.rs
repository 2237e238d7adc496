// src/rules/expr.rs

//! Closed condition grammar evaluated against a context map.
//!
//! ```text
//! expr       := or
//! or         := and (("or" | "||") and)*
//! and        := not (("and" | "&&") not)*
//! not        := ("not" | "!") not | comparison
//! comparison := primary (cmp_op primary)*
//! cmp_op     := "==" | "!=" | "<" | "<=" | ">" | ">=" | "in" | "not" "in"
//! primary    := number | "-" number | string | "True" | "False" | "None"
//!             | "[" (expr ("," expr)* ","?)? "]" | "(" expr ")"
//!             | "ctx" "." "get" "(" string ("," expr)? ")"
//!             | "ctx" "[" string "]" | identifier
//! ```
//!
//! Chained comparisons behave like Python: `1 <= x < 5` is
//! `1 <= x and x < 5`. No calls, attribute access or arithmetic.

use crate::error::RuleError;
use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Named fields a rule is evaluated against.
pub type Context = serde_json::Map<String, Value>;

const MAX_SOURCE_LEN: usize = 2_000;
const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    /// Context lookup; `default` is used when the field is absent.
    Field {
        name: String,
        default: Option<Box<Expr>>,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        first: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
    },
}

impl Expr {
    pub fn parse(source: &str) -> Result<Self, RuleError> {
        if source.len() > MAX_SOURCE_LEN {
            return Err(RuleError::parse(
                0,
                format!("expression longer than {MAX_SOURCE_LEN} bytes"),
            ));
        }
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(RuleError::parse(0, "empty expression"));
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
            end: source.len(),
        };
        let expr = parser.parse_or()?;
        if parser.pos < parser.tokens.len() {
            return Err(RuleError::parse(
                parser.position(),
                "unexpected trailing input",
            ));
        }
        Ok(expr)
    }

    pub fn evaluate(&self, ctx: &Context) -> Result<Value, RuleError> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::List(items) => items
                .iter()
                .map(|item| item.evaluate(ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Self::Field { name, default } => match (ctx.get(name), default) {
                (Some(value), _) => Ok(value.clone()),
                (None, Some(default)) => default.evaluate(ctx),
                (None, None) => Ok(Value::Null),
            },
            Self::Not(inner) => Ok(Value::Bool(!truthy(&inner.evaluate(ctx)?))),
            Self::And(lhs, rhs) => {
                if !truthy(&lhs.evaluate(ctx)?) {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(truthy(&rhs.evaluate(ctx)?)))
            }
            Self::Or(lhs, rhs) => {
                if truthy(&lhs.evaluate(ctx)?) {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(truthy(&rhs.evaluate(ctx)?)))
            }
            Self::Compare { first, rest } => {
                let mut left = first.evaluate(ctx)?;
                for (op, rhs) in rest {
                    let right = rhs.evaluate(ctx)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
        }
    }

    /// Evaluates and applies truthiness.
    pub fn matches(&self, ctx: &Context) -> Result<bool, RuleError> {
        self.evaluate(ctx).map(|value| truthy(&value))
    }

    /// Context fields referenced anywhere in the expression, in order of appearance.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Literal(_) => {}
            Self::List(items) => items.iter().for_each(|item| item.collect_fields(out)),
            Self::Field { name, default } => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
                if let Some(default) = default {
                    default.collect_fields(out);
                }
            }
            Self::Not(inner) => inner.collect_fields(out),
            Self::And(lhs, rhs) | Self::Or(lhs, rhs) => {
                lhs.collect_fields(out);
                rhs.collect_fields(out);
            }
            Self::Compare { first, rest } => {
                first.collect_fields(out);
                rest.iter().for_each(|(_, rhs)| rhs.collect_fields(out));
            }
        }
    }
}

/// Python-style truthiness: null, false, 0, "" and empty collections are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Equality where `10 == 10.0`; values of different types are never equal.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| loose_eq(x, y))
        }
        _ => a == b,
    }
}

fn order(a: &Value, b: &Value) -> Result<Ordering, RuleError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .ok_or_else(|| RuleError::eval("numbers are not comparable")),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => Err(RuleError::eval(format!(
            "cannot order {} and {}",
            type_name(a),
            type_name(b)
        ))),
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, RuleError> {
    match (container, item) {
        (Value::Array(items), _) => Ok(items.iter().any(|candidate| loose_eq(candidate, item))),
        (Value::String(haystack), Value::String(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
        _ => Err(RuleError::eval(format!(
            "'in' needs a list or string on the right, got {}",
            type_name(container)
        ))),
    }
}

fn compare(op: CmpOp, a: &Value, b: &Value) -> Result<bool, RuleError> {
    Ok(match op {
        CmpOp::Eq => loose_eq(a, b),
        CmpOp::Ne => !loose_eq(a, b),
        CmpOp::Lt => order(a, b)? == Ordering::Less,
        CmpOp::Le => order(a, b)? != Ordering::Greater,
        CmpOp::Gt => order(a, b)? == Ordering::Greater,
        CmpOp::Ge => order(a, b)? != Ordering::Less,
        CmpOp::In => contains(b, a)?,
        CmpOp::NotIn => !contains(b, a)?,
    })
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Str(String),
    Num(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Minus,
    Cmp(CmpOp),
    And,
    Or,
    Not,
    In,
    True,
    False,
    Null,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, RuleError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let next_is = |i: usize, expected: char| chars.get(i + 1).is_some_and(|(_, c)| *c == expected);
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let (kind, width) = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '(' => (TokenKind::LParen, 1),
            ')' => (TokenKind::RParen, 1),
            '[' => (TokenKind::LBracket, 1),
            ']' => (TokenKind::RBracket, 1),
            ',' => (TokenKind::Comma, 1),
            '.' => (TokenKind::Dot, 1),
            '-' => (TokenKind::Minus, 1),
            '=' if next_is(i, '=') => (TokenKind::Cmp(CmpOp::Eq), 2),
            '=' => return Err(RuleError::parse(pos, "assignment is not allowed, use '=='")),
            '!' if next_is(i, '=') => (TokenKind::Cmp(CmpOp::Ne), 2),
            '!' => (TokenKind::Not, 1),
            '<' if next_is(i, '=') => (TokenKind::Cmp(CmpOp::Le), 2),
            '<' => (TokenKind::Cmp(CmpOp::Lt), 1),
            '>' if next_is(i, '=') => (TokenKind::Cmp(CmpOp::Ge), 2),
            '>' => (TokenKind::Cmp(CmpOp::Gt), 1),
            '&' if next_is(i, '&') => (TokenKind::And, 2),
            '|' if next_is(i, '|') => (TokenKind::Or, 2),
            '\'' | '"' => {
                let (text, consumed) = lex_string(&chars, i)?;
                (TokenKind::Str(text), consumed)
            }
            c if c.is_ascii_digit() => {
                let len = chars[i..]
                    .iter()
                    .take_while(|(_, c)| c.is_ascii_digit() || *c == '.' || *c == '_')
                    .count();
                let text: String = chars[i..i + len]
                    .iter()
                    .map(|(_, c)| *c)
                    .filter(|c| *c != '_')
                    .collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| RuleError::parse(pos, format!("invalid number '{text}'")))?;
                (TokenKind::Num(value), len)
            }
            c if c.is_alphabetic() || c == '_' => {
                let len = chars[i..]
                    .iter()
                    .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
                    .count();
                let word: String = chars[i..i + len].iter().map(|(_, c)| *c).collect();
                let kind = match word.as_str() {
                    "and" => TokenKind::And,
                    "or" => TokenKind::Or,
                    "not" => TokenKind::Not,
                    "in" => TokenKind::In,
                    "True" | "true" => TokenKind::True,
                    "False" | "false" => TokenKind::False,
                    "None" | "null" => TokenKind::Null,
                    _ => TokenKind::Ident(word),
                };
                (kind, len)
            }
            other => {
                return Err(RuleError::parse(
                    pos,
                    format!("unexpected character '{other}'"),
                ))
            }
        };
        tokens.push(Token { kind, pos });
        i += width;
    }

    Ok(tokens)
}

/// Lexes a quoted string starting at `start`; returns the text and chars consumed.
fn lex_string(chars: &[(usize, char)], start: usize) -> Result<(String, usize), RuleError> {
    let (pos, quote) = chars[start];
    let mut text = String::new();
    let mut i = start + 1;
    loop {
        let Some(&(_, c)) = chars.get(i) else {
            return Err(RuleError::parse(pos, "unterminated string literal"));
        };
        i += 1;
        if c == quote {
            return Ok((text, i - start));
        }
        if c == '\\' {
            let Some(&(_, escaped)) = chars.get(i) else {
                return Err(RuleError::parse(pos, "unterminated string literal"));
            };
            i += 1;
            text.push(match escaped {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
        } else {
            text.push(c);
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |t| t.pos)
    }

    fn advance(&mut self) -> Option<TokenKind> {
        let token = self.tokens.get(self.pos)?.kind.clone();
        self.pos += 1;
        Some(token)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), RuleError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(RuleError::parse(self.position(), format!("expected {what}")))
        }
    }

    fn expect_string(&mut self) -> Result<String, RuleError> {
        let position = self.position();
        match self.advance() {
            Some(TokenKind::Str(s)) => Ok(s),
            _ => Err(RuleError::parse(position, "expected a quoted field name")),
        }
    }

    fn enter(&mut self) -> Result<(), RuleError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(RuleError::parse(
                self.position(),
                format!("expression nested deeper than {MAX_DEPTH} levels"),
            ));
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.parse_not()?;
        while self.eat(&TokenKind::And) {
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, RuleError> {
        if self.eat(&TokenKind::Not) {
            self.enter()?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, RuleError> {
        let first = self.parse_primary()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(TokenKind::Cmp(op)) => *op,
                Some(TokenKind::In) => CmpOp::In,
                Some(TokenKind::Not) if self.peek_at(1) == Some(&TokenKind::In) => {
                    self.pos += 1;
                    CmpOp::NotIn
                }
                _ => break,
            };
            self.pos += 1;
            rest.push((op, self.parse_primary()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, RuleError> {
        self.enter()?;
        let position = self.position();
        let expr = match self.advance() {
            Some(TokenKind::Num(n)) => Expr::Literal(number(n)),
            Some(TokenKind::Minus) => match self.advance() {
                Some(TokenKind::Num(n)) => Expr::Literal(number(-n)),
                _ => return Err(RuleError::parse(position, "'-' must precede a number")),
            },
            Some(TokenKind::Str(s)) => Expr::Literal(Value::String(s)),
            Some(TokenKind::True) => Expr::Literal(Value::Bool(true)),
            Some(TokenKind::False) => Expr::Literal(Value::Bool(false)),
            Some(TokenKind::Null) => Expr::Literal(Value::Null),
            Some(TokenKind::LParen) => {
                let inner = self.parse_or()?;
                self.expect(TokenKind::RParen, "')'")?;
                inner
            }
            Some(TokenKind::LBracket) => self.parse_list()?,
            Some(TokenKind::Ident(name)) if name == "ctx" => self.parse_ctx_lookup(position)?,
            Some(TokenKind::Ident(name)) => Expr::Field {
                name,
                default: None,
            },
            Some(other) => {
                return Err(RuleError::parse(
                    position,
                    format!("unexpected token {other:?}"),
                ))
            }
            None => return Err(RuleError::parse(position, "unexpected end of expression")),
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn parse_list(&mut self) -> Result<Expr, RuleError> {
        let mut items = Vec::new();
        while !self.eat(&TokenKind::RBracket) {
            items.push(self.parse_or()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(TokenKind::RBracket, "',' or ']'")?;
                break;
            }
        }
        Ok(Expr::List(items))
    }

    fn parse_ctx_lookup(&mut self, position: usize) -> Result<Expr, RuleError> {
        if self.eat(&TokenKind::Dot) {
            match self.advance() {
                Some(TokenKind::Ident(method)) if method == "get" => {}
                _ => {
                    return Err(RuleError::parse(
                        position,
                        "only ctx.get(...) is allowed on ctx",
                    ))
                }
            }
            self.expect(TokenKind::LParen, "'('")?;
            let name = self.expect_string()?;
            let default = if self.eat(&TokenKind::Comma) {
                Some(Box::new(self.parse_or()?))
            } else {
                None
            };
            self.expect(TokenKind::RParen, "')'")?;
            Ok(Expr::Field { name, default })
        } else if self.eat(&TokenKind::LBracket) {
            let name = self.expect_string()?;
            self.expect(TokenKind::RBracket, "']'")?;
            Ok(Expr::Field {
                name,
                default: None,
            })
        } else {
            Err(RuleError::parse(
                position,
                "'ctx' must be followed by .get(...) or [...]",
            ))
        }
    }
}
