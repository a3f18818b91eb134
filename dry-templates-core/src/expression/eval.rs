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

//! Expression evaluation
//!
//! Arithmetic, comparison and membership follow Python rules: integer operations are
//! checked, `/` always yields a float, `//` and `%` round towards negative infinity,
//! and `and`/`or` return one of their operands.

use std::{cmp::Ordering, collections::BTreeMap};

use crate::{
    error::{RenderError, RenderResult},
    expression::{
        functions,
        parser::{BinaryOp, CompareOp, Expr, Stmt, UnaryOp},
    },
    value::Value,
};

/// Name bindings visible to an expression
pub trait Scope {
    /// Looks up the value bound to `name`
    fn lookup(&self, name: &str) -> Option<Value>;

    /// Binds `name`, used by `exec` statements
    fn assign(&mut self, name: &str, value: Value);
}

impl Scope for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    fn assign(&mut self, name: &str, value: Value) {
        self.insert(name.to_string(), value);
    }
}

fn unsupported(symbol: &str, left: &Value, right: &Value) -> RenderError {
    RenderError::Type(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        symbol,
        left.type_name(),
        right.type_name()
    ))
}

fn is_number(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Float(_) | Value::Bool(_))
}

/// Largest string or list, in bytes, that `*` may build
pub const MAX_REPEAT_BYTES: usize = 1 << 30;

/// Number of times `items` is repeated by `* times`, if the result fits
fn repetitions<T>(items: &[T], times: i64) -> RenderResult<usize> {
    let times = usize::try_from(times).unwrap_or(0);
    if items.is_empty() {
        return Ok(0);
    }
    items
        .len()
        .checked_mul(times)
        .and_then(|len| len.checked_mul(size_of::<T>().max(1)))
        .filter(|bytes| *bytes <= MAX_REPEAT_BYTES)
        .map(|_| times)
        .ok_or(RenderError::Overflow)
}

fn repeat<T: Clone>(items: &[T], times: i64) -> RenderResult<Vec<T>> {
    let times = repetitions(items, times)?;
    let mut repeated = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        repeated.extend_from_slice(items);
    }
    Ok(repeated)
}

fn floor_div(a: i64, b: i64) -> RenderResult<i64> {
    if b == 0 {
        return Err(RenderError::DivisionByZero);
    }
    let quotient = a.checked_div(b).ok_or(RenderError::Overflow)?;
    if a % b != 0 && (a < 0) != (b < 0) {
        Ok(quotient - 1)
    } else {
        Ok(quotient)
    }
}

fn modulo(a: i64, b: i64) -> RenderResult<i64> {
    if b == 0 {
        return Err(RenderError::DivisionByZero);
    }
    let remainder = a.checked_rem(b).ok_or(RenderError::Overflow)?;
    if remainder != 0 && (remainder < 0) != (b < 0) {
        Ok(remainder + b)
    } else {
        Ok(remainder)
    }
}

fn float_operands(symbol: &str, left: &Value, right: &Value) -> RenderResult<(f64, f64)> {
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) if is_number(left) && is_number(right) => Ok((a, b)),
        _ => Err(unsupported(symbol, left, right)),
    }
}

/// Applies a binary operator to two values
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> RenderResult<Value> {
    let ints = match (left, right) {
        (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => {
            left.as_int().zip(right.as_int())
        }
        _ => None,
    };
    match op {
        BinaryOp::Add => match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => {
                Ok(Value::List([a.as_slice(), b.as_slice()].concat()))
            }
            _ => match ints {
                Some((a, b)) => a.checked_add(b).map(Value::Int).ok_or(RenderError::Overflow),
                None => float_operands("+", left, right).map(|(a, b)| Value::Float(a + b)),
            },
        },
        BinaryOp::Sub => match ints {
            Some((a, b)) => a.checked_sub(b).map(Value::Int).ok_or(RenderError::Overflow),
            None => float_operands("-", left, right).map(|(a, b)| Value::Float(a - b)),
        },
        BinaryOp::Mul => match (left, right) {
            (Value::String(s), Value::Int(n)) | (Value::Int(n), Value::String(s)) => {
                let times = repetitions(s.as_bytes(), *n)?;
                Ok(Value::String(s.repeat(times)))
            }
            (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
                repeat(items, *n).map(Value::List)
            }
            _ => match ints {
                Some((a, b)) => a.checked_mul(b).map(Value::Int).ok_or(RenderError::Overflow),
                None => float_operands("*", left, right).map(|(a, b)| Value::Float(a * b)),
            },
        },
        BinaryOp::Div => {
            let (a, b) = float_operands("/", left, right)?;
            if b == 0.0 {
                return Err(RenderError::DivisionByZero);
            }
            Ok(Value::Float(a / b))
        }
        BinaryOp::FloorDiv => match ints {
            Some((a, b)) => floor_div(a, b).map(Value::Int),
            None => {
                let (a, b) = float_operands("//", left, right)?;
                if b == 0.0 {
                    return Err(RenderError::DivisionByZero);
                }
                Ok(Value::Float((a / b).floor()))
            }
        },
        BinaryOp::Mod => match ints {
            Some((a, b)) => modulo(a, b).map(Value::Int),
            None => {
                let (a, b) = float_operands("%", left, right)?;
                if b == 0.0 {
                    return Err(RenderError::DivisionByZero);
                }
                Ok(Value::Float(a - b * (a / b).floor()))
            }
        },
    }
}

fn contains(container: &Value, item: &Value) -> RenderResult<bool> {
    match container {
        Value::String(haystack) => match item {
            Value::String(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(RenderError::Type(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => Ok(items.iter().any(|candidate| candidate.loose_eq(item))),
        Value::Map(map) => Ok(item.as_str().is_some_and(|key| map.contains_key(key))),
        other => Err(RenderError::Type(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> RenderResult<bool> {
    Ok(match op {
        CompareOp::Eq => left.loose_eq(right),
        CompareOp::Ne => !left.loose_eq(right),
        CompareOp::Lt => left.compare(right)? == Ordering::Less,
        CompareOp::Le => left.compare(right)? != Ordering::Greater,
        CompareOp::Gt => left.compare(right)? == Ordering::Greater,
        CompareOp::Ge => left.compare(right)? != Ordering::Less,
        CompareOp::In => contains(right, left)?,
        CompareOp::NotIn => !contains(right, left)?,
        CompareOp::Is => left.type_name() == right.type_name() && left == right,
        CompareOp::IsNot => !(left.type_name() == right.type_name() && left == right),
    })
}

fn map_key(key: Value) -> String {
    match key {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Resolves a possibly negative index against a length
fn position(index: i64, len: usize) -> RenderResult<usize> {
    let len = i64::try_from(len).map_err(|_| RenderError::Overflow)?;
    let resolved = if index < 0 { index + len } else { index };
    if (0..len).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(RenderError::IndexOutOfRange(index))
    }
}

fn attribute(target: &Value, name: &str) -> RenderResult<Value> {
    match target {
        Value::Map(map) => map
            .get(name)
            .cloned()
            .ok_or_else(|| RenderError::KeyNotFound(Value::from(name).repr())),
        other => Err(RenderError::Type(format!(
            "'{}' object has no attribute '{}'",
            other.type_name(),
            name
        ))),
    }
}

fn index(target: &Value, index: &Value) -> RenderResult<Value> {
    match (target, index) {
        (Value::List(items), Value::Int(i)) => Ok(items[position(*i, items.len())?].clone()),
        (Value::String(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::String(chars[position(*i, chars.len())?].to_string()))
        }
        (Value::Map(map), Value::String(key)) => map
            .get(key)
            .cloned()
            .ok_or_else(|| RenderError::KeyNotFound(index.repr())),
        (target, index) => Err(RenderError::Type(format!(
            "'{}' indices must be valid keys, not '{}'",
            target.type_name(),
            index.type_name()
        ))),
    }
}

impl Expr {
    /// Evaluates the expression against `scope`
    pub fn evaluate<S: Scope + ?Sized>(&self, scope: &S) -> RenderResult<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Name(name) => scope
                .lookup(name)
                .ok_or_else(|| RenderError::UndefinedVariable { name: name.clone() }),
            Expr::List(items) => Ok(Value::List(evaluate_all(items, scope)?)),
            Expr::Dict(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    map.insert(map_key(key.evaluate(scope)?), value.evaluate(scope)?);
                }
                Ok(Value::Map(map))
            }
            Expr::Attribute { target, name } => attribute(&target.evaluate(scope)?, name),
            Expr::Index {
                target,
                index: subscript,
            } => index(&target.evaluate(scope)?, &subscript.evaluate(scope)?),
            Expr::Call { function, args } => functions::call(function, evaluate_all(args, scope)?),
            Expr::Method { target, name, args } => {
                let target = target.evaluate(scope)?;
                functions::call_method(&target, name, evaluate_all(args, scope)?)
            }
            Expr::Unary { op, operand } => {
                let value = operand.evaluate(scope)?;
                match (op, &value) {
                    (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                    (UnaryOp::Pos, Value::Float(_)) => Ok(value),
                    (UnaryOp::Neg, Value::Int(_) | Value::Bool(_)) => value
                        .as_int()
                        .and_then(i64::checked_neg)
                        .map(Value::Int)
                        .ok_or(RenderError::Overflow),
                    (UnaryOp::Pos, Value::Int(_) | Value::Bool(_)) => {
                        Ok(value.as_int().map_or(Value::None, Value::Int))
                    }
                    (_, other) => Err(RenderError::Type(format!(
                        "bad operand type for unary operator: '{}'",
                        other.type_name()
                    ))),
                }
            }
            Expr::Binary { op, left, right } => {
                binary(*op, &left.evaluate(scope)?, &right.evaluate(scope)?)
            }
            Expr::Compare { left, chain } => {
                let mut left = left.evaluate(scope)?;
                for (op, right) in chain {
                    let right = right.evaluate(scope)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::Not(operand) => Ok(Value::Bool(!operand.evaluate(scope)?.is_truthy())),
            Expr::And(left, right) => {
                let left = left.evaluate(scope)?;
                if left.is_truthy() {
                    right.evaluate(scope)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(left, right) => {
                let left = left.evaluate(scope)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    right.evaluate(scope)
                }
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if condition.evaluate(scope)?.is_truthy() {
                    then.evaluate(scope)
                } else {
                    otherwise.evaluate(scope)
                }
            }
        }
    }
}

fn evaluate_all<S: Scope + ?Sized>(exprs: &[Expr], scope: &S) -> RenderResult<Vec<Value>> {
    exprs.iter().map(|expr| expr.evaluate(scope)).collect()
}

impl Stmt {
    /// Runs the statement, writing assignments through `scope`
    pub fn execute<S: Scope + ?Sized>(&self, scope: &mut S) -> RenderResult<()> {
        match self {
            Stmt::Assign { target, op, value } => {
                let value = value.evaluate(&*scope)?;
                let value = match op {
                    Some(op) => {
                        let current = scope.lookup(target).ok_or_else(|| {
                            RenderError::UndefinedVariable {
                                name: target.clone(),
                            }
                        })?;
                        binary(*op, &current, &value)?
                    }
                    None => value,
                };
                scope.assign(target, value);
                Ok(())
            }
            Stmt::Expr(expr) => expr.evaluate(&*scope).map(|_| ()),
        }
    }
}
