// MIT License
//
// Copyright (c) 2024 Jerome Johnson
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Expression and statement parsing
//!
//! Recursive descent over the lexemes of a tag body. Precedence from loosest to
//! tightest:
//!
//! | Form | Example |
//! |---|---|
//! | conditional | `a if cond else b` |
//! | `or`, `and`, `not` | `a and not b` |
//! | comparison | `1 < x <= 3`, `x in items`, `x is not None` |
//! | sum, term | `a + b * c // 2 % 3` |
//! | unary | `-x` |
//! | postfix | `user.name`, `items[0]`, `name.upper()`, `len(items)` |

use crate::{
    expression::{
        ParseError, Result,
        tokenizer::{Lexeme, LexemeType, near, tokenize},
    },
    value::Value,
};

/// Deepest nesting of sub-expressions a tag may contain
pub const MAX_DEPTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
}

/// An expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Attribute {
        target: Box<Expr>,
        name: String,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        function: String,
        args: Vec<Expr>,
    },
    Method {
        target: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// A comparison chain: `a < b < c`
    Compare {
        left: Box<Expr>,
        chain: Vec<(CompareOp, Expr)>,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

/// A statement run by `{% exec ... %}`
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `name = value` or `name op= value`
    Assign {
        target: String,
        op: Option<BinaryOp>,
        value: Expr,
    },
    /// An expression evaluated for its errors only
    Expr(Expr),
}

/// The head of a `for` loop: `a, b in iterable`
#[derive(Debug, Clone, PartialEq)]
pub struct ForHeader {
    pub targets: Vec<String>,
    pub iterable: Expr,
}

const KEYWORDS: [&str; 13] = [
    "and", "or", "not", "in", "is", "if", "else", "True", "False", "None", "true", "false",
    "none",
];

fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

struct Parser<'a> {
    src: &'a str,
    lexemes: Vec<Lexeme<'a>>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Result<Self> {
        Ok(Self {
            src,
            lexemes: tokenize(src)?,
            pos: 0,
            depth: 0,
        })
    }

    fn peek(&self) -> Option<&Lexeme<'a>> {
        self.lexemes.get(self.pos)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Lexeme<'a>> {
        self.lexemes.get(self.pos + ahead)
    }

    fn error(&self, message: &str) -> ParseError {
        let offset = self.peek().map_or(self.src.len(), |lexeme| lexeme.offset);
        ParseError::new(format!("{} near {}", message, near(self.src, offset)))
    }

    fn is_operator(&self, op: &str) -> bool {
        matches!(
            self.peek(),
            Some(lexeme) if lexeme.lexeme_type == LexemeType::Operator && lexeme.value == op
        )
    }

    fn is_keyword_at(&self, ahead: usize, keyword: &str) -> bool {
        matches!(
            self.peek_at(ahead),
            Some(lexeme) if lexeme.lexeme_type == LexemeType::Name && lexeme.value == keyword
        )
    }

    /// Enters one more level of nesting, failing past [`MAX_DEPTH`]
    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(())
    }

    /// Runs `parse` one level deeper
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.descend()?;
        let parsed = parse(self)?;
        self.depth -= 1;
        Ok(parsed)
    }

    fn eat_operator(&mut self, op: &str) -> bool {
        if self.is_operator(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword_at(0, keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_operator(&mut self, op: &str) -> Result<()> {
        if self.eat_operator(op) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", op)))
        }
    }

    fn expect_name(&mut self) -> Result<String> {
        match self.peek() {
            Some(lexeme) if lexeme.lexeme_type == LexemeType::Name && !is_keyword(lexeme.value) => {
                let name = lexeme.value.to_string();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error("expected a name")),
        }
    }

    fn expect_end(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.error("unexpected input")),
        }
    }

    fn expression(&mut self) -> Result<Expr> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> Result<Expr> {
        let then = self.or()?;
        if !self.eat_keyword("if") {
            return Ok(then);
        }
        let condition = self.or()?;
        if !self.eat_keyword("else") {
            return Err(self.error("expected 'else'"));
        }
        let otherwise = self.expression()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn or(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut left = self.and()?;
        while self.eat_keyword("or") {
            self.descend()?;
            left = Expr::Or(Box::new(left), Box::new(self.and()?));
        }
        self.depth = depth;
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut left = self.not()?;
        while self.eat_keyword("and") {
            self.descend()?;
            left = Expr::And(Box::new(left), Box::new(self.not()?));
        }
        self.depth = depth;
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr> {
        if self.eat_keyword("not") {
            let operand = self.nested(Self::not)?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.comparison()
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        let lexeme = self.peek()?;
        let is_operator = lexeme.lexeme_type == LexemeType::Operator;
        let is_name = lexeme.lexeme_type == LexemeType::Name;
        let (op, width) = match lexeme.value {
            "==" if is_operator => (CompareOp::Eq, 1),
            "!=" if is_operator => (CompareOp::Ne, 1),
            "<" if is_operator => (CompareOp::Lt, 1),
            "<=" if is_operator => (CompareOp::Le, 1),
            ">" if is_operator => (CompareOp::Gt, 1),
            ">=" if is_operator => (CompareOp::Ge, 1),
            "in" if is_name => (CompareOp::In, 1),
            "not" if is_name && self.is_keyword_at(1, "in") => (CompareOp::NotIn, 2),
            "is" if is_name && self.is_keyword_at(1, "not") => (CompareOp::IsNot, 2),
            "is" if is_name => (CompareOp::Is, 1),
            _ => return None,
        };
        self.pos += width;
        Some(op)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let left = self.sum()?;
        let mut chain = Vec::new();
        while let Some(op) = self.compare_op() {
            chain.push((op, self.sum()?));
        }
        if chain.is_empty() {
            return Ok(left);
        }
        Ok(Expr::Compare {
            left: Box::new(left),
            chain,
        })
    }

    /// A left associative chain of `operand`s joined by `ops`
    fn binary(
        &mut self,
        ops: &[(&str, BinaryOp)],
        operand: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let depth = self.depth;
        let mut left = operand(self)?;
        while let Some(op) = ops
            .iter()
            .find_map(|(symbol, op)| self.eat_operator(symbol).then_some(*op))
        {
            self.descend()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(operand(self)?),
            };
        }
        self.depth = depth;
        Ok(left)
    }

    fn sum(&mut self) -> Result<Expr> {
        self.binary(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::term)
    }

    fn term(&mut self) -> Result<Expr> {
        self.binary(
            &[
                ("*", BinaryOp::Mul),
                ("//", BinaryOp::FloorDiv),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Mod),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = if self.eat_operator("-") {
            UnaryOp::Neg
        } else if self.eat_operator("+") {
            UnaryOp::Pos
        } else {
            return self.postfix();
        };
        Ok(Expr::Unary {
            op,
            operand: Box::new(self.nested(Self::unary)?),
        })
    }

    fn arguments(&mut self, close: &str) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.eat_operator(close) {
            args.push(self.expression()?);
            if !self.eat_operator(",") {
                self.expect_operator(close)?;
                break;
            }
        }
        Ok(args)
    }

    fn postfix(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut expr = self.atom()?;
        loop {
            if self.is_operator(".") || self.is_operator("[") || self.is_operator("(") {
                self.descend()?;
            }
            if self.eat_operator(".") {
                let name = self.expect_name()?;
                expr = if self.eat_operator("(") {
                    Expr::Method {
                        target: Box::new(expr),
                        name,
                        args: self.arguments(")")?,
                    }
                } else {
                    Expr::Attribute {
                        target: Box::new(expr),
                        name,
                    }
                };
            } else if self.eat_operator("[") {
                let index = self.expression()?;
                self.expect_operator("]")?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.is_operator("(") {
                let Expr::Name(function) = expr else {
                    return Err(self.error("only functions and methods can be called"));
                };
                self.pos += 1;
                expr = Expr::Call {
                    function,
                    args: self.arguments(")")?,
                };
            } else {
                self.depth = depth;
                return Ok(expr);
            }
        }
    }

    fn atom(&mut self) -> Result<Expr> {
        let Some(lexeme) = self.peek().cloned() else {
            return Err(self.error("expected an expression"));
        };
        let expr = match lexeme.lexeme_type {
            LexemeType::Int(i) => Expr::Literal(Value::Int(i)),
            LexemeType::Float(f) => Expr::Literal(Value::Float(f)),
            LexemeType::Str(s) => Expr::Literal(Value::String(s)),
            LexemeType::Name => match lexeme.value {
                "True" | "true" => Expr::Literal(Value::Bool(true)),
                "False" | "false" => Expr::Literal(Value::Bool(false)),
                "None" | "none" => Expr::Literal(Value::None),
                keyword if is_keyword(keyword) => {
                    return Err(self.error(&format!("unexpected '{}'", keyword)));
                }
                name => Expr::Name(name.to_string()),
            },
            LexemeType::Operator => {
                self.pos += 1;
                return match lexeme.value {
                    "(" => self.parenthesized(),
                    "[" => Ok(Expr::List(self.arguments("]")?)),
                    "{" => self.dict(),
                    _ => {
                        self.pos -= 1;
                        Err(self.error("expected an expression"))
                    }
                };
            }
        };
        self.pos += 1;
        Ok(expr)
    }

    /// `(expr)` or a tuple `(a, b)`, which evaluates to a list
    fn parenthesized(&mut self) -> Result<Expr> {
        if self.eat_operator(")") {
            return Ok(Expr::List(Vec::new()));
        }
        let first = self.expression()?;
        if self.eat_operator(")") {
            return Ok(first);
        }
        self.expect_operator(",")?;
        let mut items = vec![first];
        items.extend(self.arguments(")")?);
        Ok(Expr::List(items))
    }

    fn dict(&mut self) -> Result<Expr> {
        let mut entries = Vec::new();
        while !self.eat_operator("}") {
            let key = self.expression()?;
            self.expect_operator(":")?;
            entries.push((key, self.expression()?));
            if !self.eat_operator(",") {
                self.expect_operator("}")?;
                break;
            }
        }
        Ok(Expr::Dict(entries))
    }

    fn assignment_op(&self) -> Option<Option<BinaryOp>> {
        let lexeme = self.peek_at(1)?;
        if lexeme.lexeme_type != LexemeType::Operator {
            return None;
        }
        match lexeme.value {
            "=" => Some(None),
            "+=" => Some(Some(BinaryOp::Add)),
            "-=" => Some(Some(BinaryOp::Sub)),
            "*=" => Some(Some(BinaryOp::Mul)),
            "/=" => Some(Some(BinaryOp::Div)),
            _ => None,
        }
    }

    fn statement(&mut self) -> Result<Stmt> {
        let is_target = matches!(
            self.peek(),
            Some(lexeme) if lexeme.lexeme_type == LexemeType::Name && !is_keyword(lexeme.value)
        );
        if is_target && let Some(op) = self.assignment_op() {
            let target = self.expect_name()?;
            self.pos += 1;
            return Ok(Stmt::Assign {
                target,
                op,
                value: self.expression()?,
            });
        }
        Ok(Stmt::Expr(self.expression()?))
    }
}

/// Parses a complete expression
pub fn parse_expression(src: &str) -> Result<Expr> {
    let mut parser = Parser::new(src)?;
    let expr = parser.expression()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parses `;` separated statements
pub fn parse_statements(src: &str) -> Result<Vec<Stmt>> {
    let mut parser = Parser::new(src)?;
    let mut statements = Vec::new();
    while parser.peek().is_some() {
        statements.push(parser.statement()?);
        if !parser.eat_operator(";") {
            parser.expect_end()?;
        }
    }
    if statements.is_empty() {
        return Err(parser.error("expected a statement"));
    }
    Ok(statements)
}

/// Parses the head of a `for` loop, without the `for` keyword
pub fn parse_for_header(src: &str) -> Result<ForHeader> {
    let mut parser = Parser::new(src)?;
    let mut targets = vec![parser.expect_name()?];
    while parser.eat_operator(",") {
        targets.push(parser.expect_name()?);
    }
    if !parser.eat_keyword("in") {
        return Err(parser.error("expected 'in'"));
    }
    let iterable = parser.expression()?;
    parser.expect_end()?;
    Ok(ForHeader { targets, iterable })
}
