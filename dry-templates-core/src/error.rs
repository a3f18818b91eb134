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

//! Error handling for template compilation and rendering
//!
//! Compilation either succeeds with a complete render plan or fails with a
//! [`TemplateError`]. Failures while evaluating expressions are reported separately as
//! [`RenderError`] since they depend on the context a template is rendered with.

use thiserror::Error;

use crate::{diagnostic::underline, token::Token};

/// Errors raised while turning template text into a render plan
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A root template, `extends` target or `include` target is not a regular file
    #[error("Template file not found: {path}")]
    NotFound { path: String },

    /// A structural problem in the template, with an excerpt pointing at it
    #[error("{excerpt}\n\n{reason}")]
    Syntax { excerpt: String, reason: String },

    /// `{% autoescape ... %}` with a mode other than `on` or `off`
    #[error("Unknown autoescape mode: {mode}")]
    UnknownAutoescapeMode { mode: String },

    /// The template exists but could not be read
    #[error("Failed to read template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl TemplateError {
    /// Creates a syntax error underlining `token`
    pub(crate) fn syntax(token: &Token, reason: impl Into<String>) -> Self {
        Self::Syntax {
            excerpt: underline(token),
            reason: reason.into(),
        }
    }

    /// The short reason of a syntax error
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Syntax { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Errors raised by expressions and statements while rendering
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    #[error("name '{name}' is not defined")]
    UndefinedVariable { name: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("'{type_name}' has no method '{name}'")]
    UnknownMethod { type_name: &'static str, name: String },

    #[error("{0}")]
    Type(String),

    #[error("key {0} not found")]
    KeyNotFound(String),

    #[error("index {0} out of range")]
    IndexOutOfRange(i64),

    #[error("division by zero")]
    DivisionByZero,

    #[error("'{0}' is not iterable")]
    NotIterable(&'static str),

    #[error("integer overflow")]
    Overflow,
}

/// Errors raised when building a [`Context`](crate::Context) from serializable data
#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    #[error("a template context must be an object, got {0}")]
    NotAnObject(&'static str),
}

/// Either half of a compile-and-render call
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Result type for compilation
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Result type for rendering
pub type RenderResult<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_shows_excerpt_then_reason() {
        let token = Token::new("{% endif %}", 0, 11);
        let error = TemplateError::syntax(&token, "No matching {% if ... %}");
        assert_eq!(
            error.to_string(),
            "{% endif %}\n^^^^^^^^^^^\n\nNo matching {% if ... %}"
        );
        assert_eq!(error.reason(), Some("No matching {% if ... %}"));
    }

    #[test]
    fn not_found_names_the_path() {
        let error = TemplateError::NotFound {
            path: "base.html".to_string(),
        };
        assert_eq!(error.to_string(), "Template file not found: base.html");
        assert_eq!(error.reason(), None);
    }
}
