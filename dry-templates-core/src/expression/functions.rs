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

//! Builtin functions and methods
//!
//! | Builtin | Result |
//! |---|---|
//! | `len(x)` | number of characters, items or keys |
//! | `str(x)`, `int(x)`, `float(x)`, `bool(x)`, `list(x)` | conversions |
//! | `range(stop)`, `range(start, stop[, step])` | list of integers |
//! | `enumerate(x[, start])` | list of `[index, item]` pairs |
//! | `abs(x)`, `round(x[, digits])` | numbers |
//! | `min(...)`, `max(...)`, `sum(x[, start])`, `sorted(x[, reverse])` | aggregates |
//! | `safe_html(x)`, `safe_xml(x)`, `safe_markdown(x)` | escaped strings |

use std::{cmp::Ordering, collections::BTreeMap};

use crate::{
    error::{RenderError, RenderResult},
    escape::{safe_html, safe_markdown, safe_xml},
    expression::{eval::binary, parser::BinaryOp},
    value::Value,
};

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> RenderResult<()> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        format!("{}", min)
    } else {
        format!("{} to {}", min, max)
    };
    Err(RenderError::Type(format!(
        "{}() takes {} argument(s) ({} given)",
        name,
        expected,
        args.len()
    )))
}

fn expect_int(function: &str, value: &Value) -> RenderResult<i64> {
    value.as_int().ok_or_else(|| {
        RenderError::Type(format!(
            "{}() expected an integer, got '{}'",
            function,
            value.type_name()
        ))
    })
}

fn expect_str<'v>(function: &str, value: &'v Value) -> RenderResult<&'v str> {
    value.as_str().ok_or_else(|| {
        RenderError::Type(format!(
            "{}() expected a string, got '{}'",
            function,
            value.type_name()
        ))
    })
}

fn len(value: &Value) -> RenderResult<Value> {
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        other => {
            return Err(RenderError::Type(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )));
        }
    };
    Ok(Value::from(len))
}

fn to_int(value: &Value) -> RenderResult<Value> {
    match value {
        Value::Int(_) | Value::Bool(_) => Ok(value.as_int().map_or(Value::None, Value::Int)),
        Value::Float(f) if f.is_finite() && f.abs() < 9.2e18 => Ok(Value::Int(f.trunc() as i64)),
        Value::Float(_) => Err(RenderError::Overflow),
        Value::String(s) => s.trim().parse().map(Value::Int).map_err(|_| {
            RenderError::Type(format!("invalid literal for int(): {}", value.repr()))
        }),
        other => Err(RenderError::Type(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(value: &Value) -> RenderResult<Value> {
    match value {
        Value::String(s) => s.trim().parse().map(Value::Float).map_err(|_| {
            RenderError::Type(format!("could not convert string to float: {}", value.repr()))
        }),
        other => other.as_float().map(Value::Float).ok_or_else(|| {
            RenderError::Type(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn range(args: &[Value]) -> RenderResult<Value> {
    arity("range", args, 1, 3)?;
    let ints = args
        .iter()
        .map(|arg| expect_int("range", arg))
        .collect::<RenderResult<Vec<_>>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step, ..] => (*start, *stop, *step),
        [] => (0, 0, 1),
    };
    if step == 0 {
        return Err(RenderError::Type("range() arg 3 must not be zero".to_string()));
    }
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(Value::Int(current));
        current = match current.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(Value::List(items))
}

fn enumerate(args: &[Value]) -> RenderResult<Value> {
    arity("enumerate", args, 1, 2)?;
    let start = match args.get(1) {
        Some(start) => expect_int("enumerate", start)?,
        None => 0,
    };
    let mut pairs = Vec::new();
    for (offset, item) in args[0].iterate()?.into_iter().enumerate() {
        let index = i64::try_from(offset)
            .ok()
            .and_then(|offset| start.checked_add(offset))
            .ok_or(RenderError::Overflow)?;
        pairs.push(Value::List(vec![Value::Int(index), item]));
    }
    Ok(Value::List(pairs))
}

fn abs(value: &Value) -> RenderResult<Value> {
    match value {
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Int(_) | Value::Bool(_) => value
            .as_int()
            .and_then(i64::checked_abs)
            .map(Value::Int)
            .ok_or(RenderError::Overflow),
        other => Err(RenderError::Type(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    }
}

fn round(args: &[Value]) -> RenderResult<Value> {
    arity("round", args, 1, 2)?;
    let value = &args[0];
    if !matches!(value, Value::Int(_) | Value::Float(_) | Value::Bool(_)) {
        return Err(RenderError::Type(format!(
            "type '{}' doesn't define round()",
            value.type_name()
        )));
    }
    match args.get(1) {
        None => match value {
            Value::Float(f) => to_int(&Value::Float(f.round_ties_even())),
            _ => to_int(value),
        },
        Some(digits) => {
            let digits = expect_int("round", digits)?;
            match value {
                Value::Float(f) => {
                    let exponent = i32::try_from(digits.clamp(-308, 308)).unwrap_or(0);
                    let scale = 10f64.powi(exponent);
                    Ok(Value::Float((f * scale).round_ties_even() / scale))
                }
                _ => to_int(value),
            }
        }
    }
}

/// Items of a single iterable argument, or the arguments themselves
fn aggregate_items(name: &str, args: Vec<Value>) -> RenderResult<Vec<Value>> {
    match args.len() {
        0 => Err(RenderError::Type(format!(
            "{}() expected at least 1 argument",
            name
        ))),
        1 => args[0].iterate(),
        _ => Ok(args),
    }
}

fn extreme(name: &str, args: Vec<Value>, keep: Ordering) -> RenderResult<Value> {
    let mut items = aggregate_items(name, args)?.into_iter();
    let Some(mut best) = items.next() else {
        return Err(RenderError::Type(format!(
            "{}() arg is an empty sequence",
            name
        )));
    };
    for item in items {
        if item.compare(&best)? == keep {
            best = item;
        }
    }
    Ok(best)
}

fn sum(args: &[Value]) -> RenderResult<Value> {
    arity("sum", args, 1, 2)?;
    let start = args.get(1).cloned().unwrap_or(Value::Int(0));
    args[0]
        .iterate()?
        .iter()
        .try_fold(start, |total, item| binary(BinaryOp::Add, &total, item))
}

/// Sorts values, reporting the first pair that cannot be compared
pub fn sort_values(items: &mut [Value]) -> RenderResult<()> {
    let mut error = None;
    items.sort_by(|a, b| match a.compare(b) {
        Ok(ordering) => ordering,
        Err(e) => {
            error.get_or_insert(e);
            Ordering::Equal
        }
    });
    match error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn sorted(args: &[Value]) -> RenderResult<Value> {
    arity("sorted", args, 1, 2)?;
    let mut items = args[0].iterate()?;
    sort_values(&mut items)?;
    if args.get(1).is_some_and(Value::is_truthy) {
        items.reverse();
    }
    Ok(Value::List(items))
}

fn escape_with(name: &str, args: &[Value], escape: fn(&str) -> String) -> RenderResult<Value> {
    arity(name, args, 1, 1)?;
    Ok(Value::String(escape(&args[0].to_string())))
}

/// Calls the builtin `name`
pub fn call(name: &str, args: Vec<Value>) -> RenderResult<Value> {
    let single = |args: &[Value]| arity(name, args, 1, 1);
    match name {
        "len" => single(&args).and_then(|_| len(&args[0])),
        "str" => single(&args).map(|_| Value::String(args[0].to_string())),
        "int" => single(&args).and_then(|_| to_int(&args[0])),
        "float" => single(&args).and_then(|_| to_float(&args[0])),
        "bool" => single(&args).map(|_| Value::Bool(args[0].is_truthy())),
        "list" => single(&args).and_then(|_| args[0].iterate().map(Value::List)),
        "abs" => single(&args).and_then(|_| abs(&args[0])),
        "range" => range(&args),
        "enumerate" => enumerate(&args),
        "round" => round(&args),
        "min" => extreme(name, args, Ordering::Less),
        "max" => extreme(name, args, Ordering::Greater),
        "sum" => sum(&args),
        "sorted" => sorted(&args),
        "safe_html" => escape_with(name, &args, safe_html),
        "safe_xml" => escape_with(name, &args, safe_xml),
        "safe_markdown" => escape_with(name, &args, safe_markdown),
        _ => Err(RenderError::UnknownFunction {
            name: name.to_string(),
        }),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn title(s: &str) -> String {
    let mut titled = String::with_capacity(s.len());
    let mut previous_is_letter = false;
    for c in s.chars() {
        if previous_is_letter {
            titled.extend(c.to_lowercase());
        } else {
            titled.extend(c.to_uppercase());
        }
        previous_is_letter = c.is_alphabetic();
    }
    titled
}

/// The characters `strip` removes, `None` meaning whitespace
fn strip_chars(args: &[Value], method: &str) -> RenderResult<Option<Vec<char>>> {
    arity(method, args, 0, 1)?;
    match args.first() {
        None | Some(Value::None) => Ok(None),
        Some(chars) => Ok(Some(expect_str(method, chars)?.chars().collect())),
    }
}

fn string_method(s: &str, name: &str, args: &[Value]) -> RenderResult<Value> {
    let none = |args: &[Value]| arity(name, args, 0, 0);
    let string = |value: String| Ok(Value::String(value));
    match name {
        "upper" => none(args).and_then(|_| string(s.to_uppercase())),
        "lower" => none(args).and_then(|_| string(s.to_lowercase())),
        "capitalize" => none(args).and_then(|_| string(capitalize(s))),
        "title" => none(args).and_then(|_| string(title(s))),
        "strip" | "lstrip" | "rstrip" => {
            let chars = strip_chars(args, name)?;
            let matches = |c: char| match &chars {
                Some(chars) => chars.contains(&c),
                None => c.is_whitespace(),
            };
            string(
                match name {
                    "strip" => s.trim_matches(matches),
                    "lstrip" => s.trim_start_matches(matches),
                    _ => s.trim_end_matches(matches),
                }
                .to_string(),
            )
        }
        "startswith" | "endswith" => {
            arity(name, args, 1, 1)?;
            let affix = expect_str(name, &args[0])?;
            Ok(Value::Bool(if name == "startswith" {
                s.starts_with(affix)
            } else {
                s.ends_with(affix)
            }))
        }
        "replace" => {
            arity(name, args, 2, 2)?;
            string(s.replace(expect_str(name, &args[0])?, expect_str(name, &args[1])?))
        }
        "split" => {
            arity(name, args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::None) => s.split_whitespace().map(Value::from).collect(),
                Some(separator) => {
                    let separator = expect_str(name, separator)?;
                    if separator.is_empty() {
                        return Err(RenderError::Type("empty separator".to_string()));
                    }
                    s.split(separator).map(Value::from).collect()
                }
            };
            Ok(Value::List(parts))
        }
        "join" => {
            arity(name, args, 1, 1)?;
            let parts = args[0]
                .iterate()?
                .iter()
                .map(|item| match item {
                    Value::String(part) => Ok(part.clone()),
                    other => Err(RenderError::Type(format!(
                        "join() expected str items, found '{}'",
                        other.type_name()
                    ))),
                })
                .collect::<RenderResult<Vec<_>>>()?;
            string(parts.join(s))
        }
        "count" => {
            arity(name, args, 1, 1)?;
            let needle = expect_str(name, &args[0])?;
            let count = if needle.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(needle).count()
            };
            Ok(Value::from(count))
        }
        "find" => {
            arity(name, args, 1, 1)?;
            let needle = expect_str(name, &args[0])?;
            Ok(match s.find(needle) {
                Some(byte) => Value::from(s[..byte].chars().count()),
                None => Value::Int(-1),
            })
        }
        _ => Err(unknown_method("str", name)),
    }
}

fn list_method(items: &[Value], name: &str, args: &[Value]) -> RenderResult<Value> {
    arity(name, args, 1, 1)?;
    let needle = &args[0];
    match name {
        "count" => Ok(Value::from(
            items.iter().filter(|item| item.loose_eq(needle)).count(),
        )),
        "index" => items
            .iter()
            .position(|item| item.loose_eq(needle))
            .map(Value::from)
            .ok_or_else(|| RenderError::Type(format!("{} is not in list", needle.repr()))),
        _ => Err(unknown_method("list", name)),
    }
}

fn map_method(map: &BTreeMap<String, Value>, name: &str, args: &[Value]) -> RenderResult<Value> {
    match name {
        "get" => {
            arity(name, args, 1, 2)?;
            let key = expect_str(name, &args[0])?;
            Ok(map
                .get(key)
                .or(args.get(1))
                .cloned()
                .unwrap_or(Value::None))
        }
        "keys" => {
            arity(name, args, 0, 0)?;
            Ok(Value::List(map.keys().cloned().map(Value::String).collect()))
        }
        "values" => {
            arity(name, args, 0, 0)?;
            Ok(Value::List(map.values().cloned().collect()))
        }
        "items" => {
            arity(name, args, 0, 0)?;
            Ok(Value::List(
                map.iter()
                    .map(|(key, value)| {
                        Value::List(vec![Value::String(key.clone()), value.clone()])
                    })
                    .collect(),
            ))
        }
        _ => Err(unknown_method("dict", name)),
    }
}

fn unknown_method(type_name: &'static str, name: &str) -> RenderError {
    RenderError::UnknownMethod {
        type_name,
        name: name.to_string(),
    }
}

/// Calls the method `name` on `target`
pub fn call_method(target: &Value, name: &str, args: Vec<Value>) -> RenderResult<Value> {
    match target {
        Value::String(s) => string_method(s, name, &args),
        Value::List(items) => list_method(items, name, &args),
        Value::Map(map) => map_method(map, name, &args),
        other => Err(unknown_method(other.type_name(), name)),
    }
}
