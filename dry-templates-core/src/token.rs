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

//! Source spans
//!
//! A [`Token`] is a view over a template buffer. It keeps the whole buffer alive so that
//! diagnostics can always be rendered against the text the span was found in, even after
//! composition has produced a new buffer.

use std::{fmt::Display, ops::Range, sync::Arc};

/// A half-open byte range inside a template buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    source: Arc<str>,
    start: usize,
    end: usize,
}

impl Token {
    /// Creates a token spanning `start..end` of `source`
    pub fn new(source: impl Into<Arc<str>>, start: usize, end: usize) -> Self {
        let source = source.into();
        debug_assert!(start <= end && end <= source.len());
        Self { source, start, end }
    }

    /// Creates a token from a byte range
    pub fn from_range(source: impl Into<Arc<str>>, range: Range<usize>) -> Self {
        Self::new(source, range.start, range.end)
    }

    /// The full buffer this token belongs to
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// The text covered by the token
    pub fn content(&self) -> &str {
        &self.source[self.start..self.end]
    }

    /// Text before the token
    pub fn before(&self) -> &str {
        &self.source[..self.start]
    }

    /// Text after the token
    pub fn after(&self) -> &str {
        &self.source[self.end..]
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.content())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_slices_the_buffer() {
        let token = Token::new("Hello {{ name }}!", 6, 16);
        assert_eq!(token.content(), "{{ name }}");
        assert_eq!(token.before(), "Hello ");
        assert_eq!(token.after(), "!");
    }

    #[test]
    fn clones_share_the_buffer() {
        let source: Arc<str> = Arc::from("{% if x %}");
        let token = Token::new(source.clone(), 0, 10);
        let other = token.clone();
        assert_eq!(Arc::strong_count(&source), 3);
        assert_eq!(other, token);
    }
}
