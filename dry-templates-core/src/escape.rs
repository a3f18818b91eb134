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

//! Output escaping
//!
//! Expression output is escaped for the language a template produces unless an
//! `{% autoescape off %}` section says otherwise.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// Languages supported for escaping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Html,
    Xml,
    Markdown,
}

impl Language {
    /// Escapes `value` for this language
    pub fn escape(self, value: &str) -> String {
        match self {
            Language::Html => safe_html(value),
            Language::Xml => safe_xml(value),
            Language::Markdown => safe_markdown(value),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Html => "html",
            Language::Xml => "xml",
            Language::Markdown => "markdown",
        }
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(Language::Html),
            "xml" => Ok(Language::Xml),
            "markdown" | "md" => Ok(Language::Markdown),
            other => Err(format!("unknown language {}", other)),
        }
    }
}

fn html_entity(c: char) -> Option<&'static str> {
    Some(match c {
        '&' => "&amp;",
        ';' => "&semi;",
        '"' => "&quot;",
        '_' => "&lowbar;",
        '-' => "&minus;",
        ',' => "&comma;",
        ':' => "&colon;",
        '!' => "&excl;",
        '?' => "&quest;",
        '.' => "&period;",
        '\'' => "&apos;",
        '(' => "&lpar;",
        ')' => "&rpar;",
        '[' => "&lsqb;",
        ']' => "&rsqb;",
        '{' => "&lcub;",
        '}' => "&rcub;",
        '@' => "&commat;",
        '*' => "&ast;",
        '/' => "&sol;",
        '\\' => "&bsol;",
        '#' => "&num;",
        '%' => "&percnt;",
        '`' => "&grave;",
        '^' => "&Hat;",
        '+' => "&plus;",
        '<' => "&lt;",
        '=' => "&equals;",
        '>' => "&gt;",
        '|' => "&vert;",
        '~' => "&tilde;",
        '$' => "&dollar;",
        _ => return None,
    })
}

fn xml_entity(c: char) -> Option<&'static str> {
    Some(match c {
        '&' => "&amp;",
        '"' => "&quot;",
        '\'' => "&apos;",
        '<' => "&lt;",
        '>' => "&gt;",
        _ => return None,
    })
}

fn is_markdown_special(c: char) -> bool {
    matches!(
        c,
        '\\' | '_' | '-' | '!' | '(' | ')' | '[' | ']' | '*' | '&' | '#' | '`' | '+' | '<' | '>'
            | '|' | '~'
    )
}

fn replace_chars(value: &str, entity: fn(char) -> Option<&'static str>) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match entity(c) {
            Some(entity) => escaped.push_str(entity),
            None => escaped.push(c),
        }
    }
    escaped
}

/// Encodes markup and punctuation as HTML named entities
///
/// ```
/// use dry_templates_core::safe_html;
///
/// assert_eq!(safe_html("<a href=\"/\">"), "&lt;a href&equals;&quot;&sol;&quot;&gt;");
/// ```
pub fn safe_html(value: &str) -> String {
    replace_chars(value, html_entity)
}

/// Encodes the five predefined XML entities
///
/// ```
/// use dry_templates_core::safe_xml;
///
/// assert_eq!(safe_xml("<a href=\"/\">"), "&lt;a href=&quot;/&quot;&gt;");
/// ```
pub fn safe_xml(value: &str) -> String {
    replace_chars(value, xml_entity)
}

/// Backslash-escapes Markdown punctuation
///
/// ```
/// use dry_templates_core::safe_markdown;
///
/// assert_eq!(safe_markdown("[docs](x)"), "\\[docs\\]\\(x\\)");
/// ```
pub fn safe_markdown(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if is_markdown_special(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_leaves_no_markup() {
        let escaped = safe_html(r#"<script>alert("x & y's")</script>"#);
        for c in ['<', '>', '"', '\''] {
            assert!(!escaped.contains(c), "{escaped}");
        }
        assert!(
            escaped
                .match_indices('&')
                .all(|(i, _)| escaped[i..].find(';').is_some())
        );
    }

    #[test]
    fn html_escapes_semicolon_and_ampersand_once() {
        assert_eq!(safe_html("a&b;c"), "a&amp;b&semi;c");
        assert_eq!(safe_html("1e-10"), "1e&minus;10");
    }

    #[test]
    fn xml_predefined_entities() {
        assert_eq!(safe_xml(r#"&<>"'"#), "&amp;&lt;&gt;&quot;&apos;");
        assert_eq!(safe_xml("https://x.org/?a=1"), "https://x.org/?a=1");
    }

    #[test]
    fn markdown_escapes_every_special_char() {
        let special = r"\_-!()[]*&#`+<>|~";
        let escaped = safe_markdown(special);
        assert_eq!(escaped.len(), special.len() * 2);
        assert!(escaped.chars().step_by(2).all(|c| c == '\\'));
        assert_eq!(safe_markdown("plain text."), "plain text.");
    }

    #[test]
    fn language_parsing() {
        assert_eq!("HTML".parse::<Language>(), Ok(Language::Html));
        assert_eq!("md".parse::<Language>(), Ok(Language::Markdown));
        assert!("latex".parse::<Language>().is_err());
        assert_eq!(Language::Xml.escape("<"), "&lt;");
    }
}
