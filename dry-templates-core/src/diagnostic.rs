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

//! Error excerpts
//!
//! Renders the lines around a [`Token`] with the token underlined, e.g.:
//!
//! ```text
//! [8 lines skipped]
//!     Shopping list:
//!     <ul>
//!         {% for item in items %}
//!         ^^^^^^^^^^^^^^^^^^^^^^^
//!             <li>{{ item.name }}</li>
//!         {% empty %}
//! [5 lines skipped]
//! ```

use crate::token::Token;

/// Lines of context kept on each side of the underlined line
pub const LINES_AROUND: usize = 4;

fn skipped(lines: usize) -> String {
    format!("[{} line{} skipped]", lines, if lines > 1 { "s" } else { "" })
}

/// Underlines `token` with `^`, keeping [`LINES_AROUND`] lines on each side
pub fn underline(token: &Token) -> String {
    underline_with(token, LINES_AROUND, '^')
}

/// Underlines `token` with `symbol`, keeping `lines_around` lines on each side
pub fn underline_with(token: &Token, lines_around: usize, symbol: char) -> String {
    let (head, prefix) = match token.before().rsplit_once('\n') {
        Some((head, prefix)) => (Some(head), prefix),
        None => (None, token.before()),
    };
    let (suffix, tail) = match token.after().split_once('\n') {
        Some((suffix, tail)) => (suffix, Some(tail)),
        None => (token.after(), None),
    };

    let mut lines: Vec<String> = Vec::new();

    if let Some(head) = head {
        let head: Vec<&str> = head.split('\n').collect();
        let cut = head.len().saturating_sub(lines_around);
        if cut > 0 {
            lines.push(skipped(cut));
        }
        lines.extend(head[cut..].iter().map(|line| line.to_string()));
    }

    lines.push(format!("{}{}{}", prefix, token.content(), suffix));

    // tabs are kept so the marks line up with the text above them
    let mut marks: String = prefix
        .chars()
        .map(|c| if c == '\t' { '\t' } else { ' ' })
        .collect();
    marks.extend(token.content().chars().map(|_| symbol));
    lines.push(marks);

    if let Some(tail) = tail {
        let tail: Vec<&str> = tail.split('\n').collect();
        let keep = tail.len().min(lines_around);
        lines.extend(tail[..keep].iter().map(|line| line.to_string()));
        if tail.len() > keep {
            lines.push(skipped(tail.len() - keep));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token_for(source: &str, needle: &str) -> Token {
        let start = source.find(needle).unwrap();
        Token::new(source, start, start + needle.len())
    }

    #[test]
    fn single_line() {
        let token = token_for("Hello {% endif %} world", "{% endif %}");
        assert_eq!(
            underline(&token),
            "Hello {% endif %} world\n      ^^^^^^^^^^^"
        );
    }

    #[test]
    fn context_lines_are_kept() {
        let source = "one\ntwo\n  {{ x }}\nthree\n";
        let token = token_for(source, "{{ x }}");
        assert_eq!(
            underline(&token),
            "one\ntwo\n  {{ x }}\n  ^^^^^^^\nthree\n"
        );
    }

    #[test]
    fn long_sides_are_elided() {
        let mut source = String::new();
        for i in 0..10 {
            source.push_str(&format!("line {i}\n"));
        }
        source.push_str("{% while x %}\n");
        for i in 0..6 {
            source.push_str(&format!("after {i}\n"));
        }
        source.push_str("last");
        let token = token_for(&source, "{% while x %}");
        let expected = [
            "[6 lines skipped]",
            "line 6",
            "line 7",
            "line 8",
            "line 9",
            "{% while x %}",
            "^^^^^^^^^^^^^",
            "after 0",
            "after 1",
            "after 2",
            "after 3",
            "[3 lines skipped]",
        ]
        .join("\n");
        assert_eq!(underline(&token), expected);
    }

    #[test]
    fn singular_skip_marker() {
        let source = "a\nb\nc\nd\ne\n{{ x }}";
        let token = token_for(source, "{{ x }}");
        assert!(underline(&token).starts_with("[1 line skipped]\nb\n"));
    }

    #[test]
    fn tabs_align_marks() {
        let token = token_for("\t\t{% empty %}", "{% empty %}");
        assert_eq!(underline_with(&token, 2, '~'), "\t\t{% empty %}\n\t\t~~~~~~~~~~~");
    }
}
