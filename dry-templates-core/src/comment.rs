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

//! Comment removal
//!
//! Runs after composition and before compilation. All `{# ... #}` comments are removed
//! first, then `{% comment %} ... {% endcomment %}` sections.

use crate::{
    compiler::Options,
    scanner::{TagKind, find, is_on_own_line},
};

/// Removes the comment spanning `start..end` along with the whitespace it controls
fn remove_comment(text: &mut String, start: usize, end: usize, options: &Options) {
    let mut start = start;
    let mut end = end;
    if options.lstrip_blocks && is_on_own_line(&text[..start]) {
        start = text[..start].trim_end_matches(' ').len();
    }
    if options.trim_blocks && text[end..].starts_with('\n') {
        end += 1;
    }
    text.replace_range(start..end, "");
}

/// Strips every comment from `text`
pub fn strip_comments(text: &str, options: &Options) -> String {
    let mut text = text.to_string();
    for kind in [TagKind::HashComment, TagKind::BlockComment] {
        while let Some(comment) = find(kind, &text, 0) {
            let (start, end) = (comment.start, comment.end);
            remove_comment(&mut text, start, end, options);
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn comments_on_their_own_line_leave_no_trace() {
        let text = "<ul>\n    {# list #}\n    <li>\n</ul>";
        assert_eq!(
            strip_comments(text, &Options::default()),
            "<ul>\n    <li>\n</ul>"
        );
    }

    #[test]
    fn inline_comments_keep_surrounding_text() {
        let text = "a {# note #} b";
        assert_eq!(strip_comments(text, &Options::default()), "a  b");
    }

    #[test]
    fn block_comments_hide_tags() {
        let text = "a\n{% comment \"todo\" %}\n{{ broken\n{% endcomment %}\nb";
        assert_eq!(strip_comments(text, &Options::default()), "a\nb");
    }

    #[test]
    fn whitespace_control_can_be_disabled() {
        let options = Options {
            trim_blocks: false,
            lstrip_blocks: false,
            ..Options::default()
        };
        let text = "x\n  {# c #}\ny";
        assert_eq!(strip_comments(text, &options), "x\n  \ny");
    }

    #[test]
    fn malformed_comments_are_text() {
        let text = "{#no spaces#}";
        assert_eq!(strip_comments(text, &Options::default()), text);
    }
}
