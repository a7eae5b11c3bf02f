//! Restricted arithmetic used by `custom` derived fields.
//!
//! A formula is tokenized first, so parent ids are only ever matched as whole
//! identifiers. After substitution nothing but numbers, `+ - * /`, parentheses
//! and spaces may remain; anything else is rejected.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,
    #[error("character '{ch}' at offset {offset} is not allowed")]
    ForbiddenChar { ch: char, offset: usize },
    #[error("malformed number '{0}'")]
    BadNumber(String),
    #[error("unexpected {0}")]
    UnexpectedToken(String),
    #[error("unexpected end of formula")]
    UnexpectedEnd,
    #[error("identifier '{0}' is not a parent field")]
    UnknownIdentifier(String),
    #[error("result is not a finite number")]
    NonFinite,
    #[error("formula nests deeper than {0} levels")]
    TooDeep(usize),
    #[error("formula has more than {0} tokens")]
    TooLong(usize),
}

/// Parentheses and unary signs allowed inside one another.
pub const MAX_NESTING: usize = 64;
/// Bounds the expression tree, which grows one level per binary operator.
pub const MAX_TOKENS: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(value) => format!("number {value}"),
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Var(String),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// Parsed formula, ready to be evaluated against parent values.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }
        if tokens.len() > MAX_TOKENS {
            return Err(FormulaError::TooLong(MAX_TOKENS));
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.parse_expr()?;
        match parser.tokens.get(parser.pos) {
            Some(token) => Err(FormulaError::UnexpectedToken(token.describe())),
            None => Ok(Self { expr }),
        }
    }

    /// Identifiers the formula refers to.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        collect_vars(&self.expr, &mut vars);
        vars
    }

    pub fn eval(&self, substitutions: &BTreeMap<String, f64>) -> Result<f64, FormulaError> {
        let result = eval_expr(&self.expr, substitutions)?;
        if result.is_finite() {
            Ok(result)
        } else {
            Err(FormulaError::NonFinite)
        }
    }
}

/// Evaluates `formula` with each identifier replaced by its substitution.
pub fn try_evaluate(
    formula: &str,
    substitutions: &BTreeMap<String, f64>,
) -> Result<f64, FormulaError> {
    Formula::parse(formula)?.eval(substitutions)
}

/// Like [`try_evaluate`], but every failure yields zero.
pub fn evaluate(formula: &str, substitutions: &BTreeMap<String, f64>) -> f64 {
    match try_evaluate(formula, substitutions) {
        Ok(value) => value,
        Err(error) => {
            debug!(formula, %error, "formula degraded to zero");
            0.0
        }
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '.'
}

fn tokenize(source: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    while let Some(&(offset, ch)) = chars.peek() {
        match ch {
            ' ' => {
                chars.next();
            }
            '+' | '-' | '*' | '/' | '(' | ')' => {
                chars.next();
                tokens.push(match ch {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '(' => Token::LParen,
                    _ => Token::RParen,
                });
            }
            '0'..='9' | '.' => {
                let mut text = String::new();
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_ascii_digit() || next == '.' {
                        text.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = text
                    .parse::<f64>()
                    .map_err(|_| FormulaError::BadNumber(text.clone()))?;
                tokens.push(Token::Number(value));
            }
            ch if is_ident_start(ch) => {
                let mut name = String::new();
                while let Some(&(_, next)) = chars.peek() {
                    if is_ident_continue(next) {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            _ => return Err(FormulaError::ForbiddenChar { ch, offset }),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, FormulaError>,
    ) -> Result<T, FormulaError> {
        if self.depth >= MAX_NESTING {
            return Err(FormulaError::TooDeep(MAX_NESTING));
        }
        self.depth += 1;
        let parsed = parse(self);
        self.depth -= 1;
        parsed
    }

    // expr := term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    // term := factor (('*' | '/') factor)*
    fn parse_term(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    // factor := ('+' | '-') factor | number | ident | '(' expr ')'
    fn parse_factor(&mut self) -> Result<Expr, FormulaError> {
        match self.advance() {
            Some(Token::Plus) => self.nested(Self::parse_factor),
            Some(Token::Minus) => {
                let inner = self.nested(Self::parse_factor)?;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::LParen) => {
                let inner = self.nested(Self::parse_expr)?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(FormulaError::UnexpectedToken(other.describe())),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some(other) => Err(FormulaError::UnexpectedToken(other.describe())),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

fn collect_vars(expr: &Expr, vars: &mut BTreeSet<String>) {
    match expr {
        Expr::Var(name) => {
            vars.insert(name.clone());
        }
        Expr::Neg(inner) => collect_vars(inner, vars),
        Expr::Binary { left, right, .. } => {
            collect_vars(left, vars);
            collect_vars(right, vars);
        }
        Expr::Number(_) => {}
    }
}

fn eval_expr(expr: &Expr, substitutions: &BTreeMap<String, f64>) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Var(name) => substitutions
            .get(name)
            .copied()
            .ok_or_else(|| FormulaError::UnknownIdentifier(name.clone())),
        Expr::Neg(inner) => Ok(-eval_expr(inner, substitutions)?),
        Expr::Binary { op, left, right } => {
            let left = eval_expr(left, substitutions)?;
            let right = eval_expr(right, substitutions)?;
            Ok(match op {
                BinOp::Add => left + right,
                BinOp::Sub => left - right,
                BinOp::Mul => left * right,
                BinOp::Div => left / right,
            })
        }
    }
}
