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

//! Tag recognition
//!
//! Every tag family is matched by a fixed pattern with exact spacing: `{{ x }}` is an
//! expression, `{{x}}` is plain text. Searches are leftmost, so the first tag of any of
//! the requested kinds wins.

use std::{ops::Range, sync::LazyLock};

use regex::Regex;

/// The families of tags the scanner knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// `{{ expr }}`
    Expression,
    /// `{% stmt %}`
    Statement,
    /// `{# text #}`
    HashComment,
    /// `{% comment %} ... {% endcomment %}`, optionally labelled
    BlockComment,
    /// `{% extends "path" %}`
    Extends,
    /// `{% block name %}`
    Block,
    /// `{% endblock %}` or `{% endblock name %}`
    EndBlock,
    /// `{% include "path" %}`
    Include,
}

static EXPRESSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{ .+? \}\}").unwrap());
static STATEMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{% .+? %\}").unwrap());
static HASH_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{# .+? #\}").unwrap());
static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{% comment (?:'.*?' |".*?" )?%\}[\s\S]*?\{% endcomment %\}"#).unwrap()
});
static EXTENDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{% extends (?:'(.+?)'|"(.+?)") %\}"#).unwrap());
static BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{% block (\w+?) %\}").unwrap());
static END_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{% endblock(?: (\w+))? %\}").unwrap());
static INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{% include (?:'(.+?)'|"(.+?)") %\}"#).unwrap());
static OWN_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n( )+$").unwrap());

impl TagKind {
    fn pattern(self) -> &'static Regex {
        match self {
            TagKind::Expression => &EXPRESSION,
            TagKind::Statement => &STATEMENT,
            TagKind::HashComment => &HASH_COMMENT,
            TagKind::BlockComment => &BLOCK_COMMENT,
            TagKind::Extends => &EXTENDS,
            TagKind::Block => &BLOCK,
            TagKind::EndBlock => &END_BLOCK,
            TagKind::Include => &INCLUDE,
        }
    }
}

/// A tag found in a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'t> {
    pub kind: TagKind,
    pub start: usize,
    pub end: usize,
    /// Path for `extends`/`include`, name for `block`/`endblock`
    pub argument: Option<&'t str>,
}

impl<'t> Tag<'t> {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Finds the first tag of `kind` starting at or after `from`
pub fn find(kind: TagKind, text: &str, from: usize) -> Option<Tag<'_>> {
    let captures = kind.pattern().captures_at(text, from)?;
    let whole = captures.get(0)?;
    let argument = captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|argument| argument.as_str());
    Some(Tag {
        kind,
        start: whole.start(),
        end: whole.end(),
        argument,
    })
}

/// Finds the leftmost tag of any of `kinds` starting at or after `from`
pub fn find_first<'t>(kinds: &[TagKind], text: &'t str, from: usize) -> Option<Tag<'t>> {
    kinds
        .iter()
        .filter_map(|kind| find(*kind, text, from))
        .min_by_key(|tag| tag.start)
}

/// Finds an expression or statement tag lying entirely inside `range`
pub fn find_tag_within(text: &str, range: Range<usize>) -> Option<Range<usize>> {
    let start = range.start;
    find_first(
        &[TagKind::Expression, TagKind::Statement],
        &text[range],
        0,
    )
    .map(|tag| start + tag.start..start + tag.end)
}

/// Finds the `endblock` closing the block `name` whose header ends at `from`
///
/// A named `{% endblock name %}` must carry the same name. A bare `{% endblock %}` only
/// closes the block if no other block header comes before it, otherwise it belongs to
/// that later block.
pub fn find_end_block<'t>(text: &'t str, from: usize, name: &str) -> Option<Tag<'t>> {
    let next_block = find(TagKind::Block, text, from).map(|tag| tag.start);
    END_BLOCK
        .captures_iter(&text[from..])
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let start = from + whole.start();
            let accepted = match captures.get(1) {
                Some(closing) => closing.as_str() == name,
                None => next_block.is_none_or(|block| start < block),
            };
            accepted.then(|| Tag {
                kind: TagKind::EndBlock,
                start,
                end: from + whole.end(),
                argument: captures.get(1).map(|closing| closing.as_str()),
            })
        })
        .next()
}

/// True when the text before a tag ends with a newline followed only by spaces
pub fn is_on_own_line(text_before: &str) -> bool {
    OWN_LINE.is_match(text_before)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_needs_exact_spacing() {
        assert!(find(TagKind::Expression, "{{name}}", 0).is_none());
        assert!(find(TagKind::Expression, "{{ name}}", 0).is_none());
        let tag = find(TagKind::Expression, "Hi {{ name }}!", 0).unwrap();
        assert_eq!(tag.range(), 3..13);
    }

    #[test]
    fn statements_are_not_greedy() {
        let text = "{% if a %}x{% endif %}";
        let tag = find(TagKind::Statement, text, 0).unwrap();
        assert_eq!(&text[tag.range()], "{% if a %}");
        let tag = find(TagKind::Statement, text, tag.end).unwrap();
        assert_eq!(&text[tag.range()], "{% endif %}");
    }

    #[test]
    fn extends_and_include_capture_the_path() {
        let tag = find(TagKind::Extends, r#"{% extends "base.html" %}"#, 0).unwrap();
        assert_eq!(tag.argument, Some("base.html"));
        let tag = find(TagKind::Include, "{% include 'nav.html' %}", 0).unwrap();
        assert_eq!(tag.argument, Some("nav.html"));
        assert!(find(TagKind::Include, "{% include nav.html %}", 0).is_none());
    }

    #[test]
    fn leftmost_kind_wins() {
        let text = r#"{% block a %}{% include "x" %}"#;
        let tag = find_first(&[TagKind::Include, TagKind::Block], text, 0).unwrap();
        assert_eq!(tag.kind, TagKind::Block);
        assert_eq!(tag.argument, Some("a"));
    }

    #[test]
    fn block_comments_span_lines() {
        let text = "a{% comment 'note' %}\n{{ x }}\n{% endcomment %}b";
        let tag = find(TagKind::BlockComment, text, 0).unwrap();
        assert_eq!(tag.range(), 1..text.len() - 1);
        assert!(find(TagKind::HashComment, "{# two\nlines #}", 0).is_none());
    }

    #[test]
    fn end_block_matches_name_or_bare() {
        let text = "{% block a %}x{% endblock b %}{% endblock a %}";
        let end = find_end_block(text, 13, "a").unwrap();
        assert_eq!(end.start, 30);

        let text = "{% block a %}x{% endblock %}";
        assert_eq!(find_end_block(text, 13, "a").unwrap().start, 14);
    }

    #[test]
    fn bare_end_block_after_another_header_is_not_ours() {
        let text = "{% block a %}{% block b %}x{% endblock %}";
        assert!(find_end_block(text, 13, "a").is_none());
        assert!(find_end_block(text, 26, "b").is_some());
    }

    #[test]
    fn own_line_detection() {
        assert!(is_on_own_line("text\n    "));
        assert!(!is_on_own_line("text\n  x "));
        assert!(!is_on_own_line("    "));
        assert!(!is_on_own_line("text\n"));
    }

    #[test]
    fn tags_within_a_gap() {
        let text = "{% block a %}{% endblock a %} {{ x }} {% block b %}";
        let found = find_tag_within(text, 29..38).unwrap();
        assert_eq!(&text[found], "{{ x }}");
        assert!(find_tag_within(text, 29..31).is_none());
    }
}
