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

//! Expression tokenization
//!
//! Splits the body of a tag into lexemes:
//! - Numbers: `42`, `2.5`, `1e-10`
//! - Strings: `"text"` or `'text'` with `\n`, `\t`, `\\` and quote escapes
//! - Names and keywords: `item`, `and`, `None`
//! - Operators and punctuation: `==`, `//`, `+=`, `(`, `]`, ...
//!
//! # Examples
//!
//! ```rust
//! use dry_templates_core::expression::tokenizer::{tokenize, LexemeType};
//!
//! let lexemes = tokenize("user.name == 'x'").unwrap();
//! assert_eq!(lexemes[0].value, "user");
//! assert_eq!(lexemes[3].lexeme_type, LexemeType::Operator);
//! ```

use crate::expression::{ParseError, Result};

/// Types of lexemes found in an expression
#[derive(Debug, Clone, PartialEq)]
pub enum LexemeType {
    Int(i64),
    Float(f64),
    /// A string literal, already unescaped
    Str(String),
    /// An identifier or keyword
    Name,
    /// Operators and punctuation
    Operator,
}

/// A lexeme and where it starts in the expression source
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme<'a> {
    pub lexeme_type: LexemeType,
    /// The raw text of the lexeme
    pub value: &'a str,
    /// Byte offset of the lexeme in the source
    pub offset: usize,
}

static TWO_CHAR_OPERATORS: [&str; 9] = ["==", "!=", "<=", ">=", "//", "+=", "-=", "*=", "/="];
static ONE_CHAR_OPERATORS: &str = "+-*/%<>=()[]{},:.;";

/// Returns the first 32 bytes of `src` for error context
fn cap(src: &str) -> &str {
    static CAP_AT: usize = 32;

    if src.len() > CAP_AT {
        let mut end = CAP_AT;
        while !src.is_char_boundary(end) {
            end -= 1;
        }
        &src[..end]
    } else {
        src
    }
}

pub(crate) fn near(src: &str, offset: usize) -> String {
    if offset >= src.len() {
        "end of expression".to_string()
    } else {
        format!("\"{}\"", cap(&src[offset..]))
    }
}

fn find_end_of_string(src: &str, quote: char) -> Result<(usize, String)> {
    let mut value = String::new();
    let mut chars = src.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, escaped)) => value.push(escaped),
                None => break,
            },
            c if c == quote => return Ok((i + 1, value)),
            c => value.push(c),
        }
    }
    Err(ParseError::new(format!(
        "unterminated string near \"{}\"",
        cap(src)
    )))
}

fn find_end_of_number(src: &str) -> (usize, bool) {
    let bytes = src.as_bytes();
    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .position(|b| !b.is_ascii_digit())
            .map_or(bytes.len(), |p| from + p)
    };
    let mut end = digits(0);
    let mut float = false;
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        end = digits(end + 1);
        float = true;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exponent = end + 1;
        if exponent < bytes.len() && (bytes[exponent] == b'-' || bytes[exponent] == b'+') {
            exponent += 1;
        }
        if exponent < bytes.len() && bytes[exponent].is_ascii_digit() {
            end = digits(exponent);
            float = true;
        }
    }
    (end, float)
}

fn find_end_of_name(src: &str) -> usize {
    src.char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map_or(src.len(), |(i, _)| i)
}

/// Parses a single lexeme from the start of `src`
fn parse<'a>(src: &'a str, offset: usize) -> Result<Option<(Lexeme<'a>, usize)>> {
    let Some(first) = src.chars().next() else {
        return Ok(None);
    };
    let (len, lexeme_type) = if first.is_ascii_digit() {
        let (end, float) = find_end_of_number(src);
        let text = &src[..end];
        let lexeme_type = if float {
            LexemeType::Float(text.parse().map_err(|_| {
                ParseError::new(format!("invalid number near \"{}\"", cap(src)))
            })?)
        } else {
            LexemeType::Int(text.parse().map_err(|_| {
                ParseError::new(format!("integer too large near \"{}\"", cap(src)))
            })?)
        };
        (end, lexeme_type)
    } else if first == '"' || first == '\'' {
        let (end, value) = find_end_of_string(src, first)?;
        (end, LexemeType::Str(value))
    } else if first.is_alphabetic() || first == '_' {
        (find_end_of_name(src), LexemeType::Name)
    } else if let Some(operator) = TWO_CHAR_OPERATORS.iter().find(|op| src.starts_with(**op)) {
        (operator.len(), LexemeType::Operator)
    } else if ONE_CHAR_OPERATORS.contains(first) {
        (1, LexemeType::Operator)
    } else {
        return Err(ParseError::new(format!(
            "unexpected character '{}' near \"{}\"",
            first,
            cap(src)
        )));
    };
    Ok(Some((
        Lexeme {
            lexeme_type,
            value: &src[..len],
            offset,
        },
        len,
    )))
}

/// Splits `src` into lexemes
pub fn tokenize(src: &str) -> Result<Vec<Lexeme<'_>>> {
    let mut lexemes = Vec::new();
    let mut offset = 0;
    loop {
        let rest = &src[offset..];
        let trimmed = rest.trim_start();
        offset += rest.len() - trimmed.len();
        match parse(trimmed, offset)? {
            Some((lexeme, len)) => {
                lexemes.push(lexeme);
                offset += len;
            }
            None => return Ok(lexemes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(src: &str) -> Vec<LexemeType> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|lexeme| lexeme.lexeme_type)
            .collect()
    }

    #[test]
    fn numbers() {
        assert_eq!(
            types("1 2.5 1e-3 7.x"),
            vec![
                LexemeType::Int(1),
                LexemeType::Float(2.5),
                LexemeType::Float(0.001),
                LexemeType::Int(7),
                LexemeType::Operator,
                LexemeType::Name
            ]
        );
    }

    #[test]
    fn strings_are_unescaped() {
        assert_eq!(
            types(r#"'it\'s' "a\"b\n""#),
            vec![
                LexemeType::Str("it's".to_string()),
                LexemeType::Str("a\"b\n".to_string())
            ]
        );
        assert!(tokenize("'open").is_err());
    }

    #[test]
    fn operators_prefer_two_chars() {
        let lexemes = tokenize("a//b<=c+=1").unwrap();
        let values: Vec<&str> = lexemes.iter().map(|lexeme| lexeme.value).collect();
        assert_eq!(values, vec!["a", "//", "b", "<=", "c", "+=", "1"]);
    }

    #[test]
    fn offsets_skip_whitespace() {
        let lexemes = tokenize("  x   in y").unwrap();
        assert_eq!(lexemes[0].offset, 2);
        assert_eq!(lexemes[1].offset, 6);
        assert_eq!(lexemes[2].offset, 9);
    }

    #[test]
    fn rejects_unknown_characters() {
        let error = tokenize("a $ b").unwrap_err();
        assert!(error.message.starts_with("unexpected character '$'"));
    }
}
