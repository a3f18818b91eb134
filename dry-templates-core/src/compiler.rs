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

//! Structural compilation
//!
//! Walks a composed template from left to right and turns its expression and statement
//! tags into a [`Plan`]. Open `if`, `for` and `while` constructs are tracked on one
//! frame stack for code generation and on a stack per kind for validation, so an end
//! tag is accepted whenever a construct of its kind is open and closes the innermost
//! frame.
//!
//! Literal text between tags follows two whitespace rules:
//! - `lstrip_blocks`: spaces before a statement tag that sits alone on its line are
//!   dropped
//! - `trim_blocks`: the first newline after a statement tag is dropped

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    comment::strip_comments,
    error::{Result, TemplateError},
    escape::Language,
    expression::{ParseError, parse_expression, parse_for_header, parse_statements},
    plan::{Instruction, Plan},
    scanner::{TagKind, find_first, is_on_own_line},
    token::Token,
};

/// Compiler options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Language expression output is escaped for
    pub language: Language,
    /// Drop the first newline after a statement tag or comment
    pub trim_blocks: bool,
    /// Drop spaces before a statement tag or comment alone on its line
    pub lstrip_blocks: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            language: Language::Html,
            trim_blocks: true,
            lstrip_blocks: true,
        }
    }
}

impl Options {
    /// Default options escaping for `language`
    pub fn with_language(language: Language) -> Self {
        Self {
            language,
            ..Self::default()
        }
    }
}

/// An open control structure
enum Frame {
    If {
        /// The `Branch` of the current arm, `None` once in the `else` arm
        branch: Option<usize>,
        /// Jumps from the end of each arm to the end of the whole `if`
        exits: Vec<usize>,
    },
    For {
        head: usize,
        /// Index of `ForNext` once the `empty` arm has been opened
        next: Option<usize>,
    },
    While {
        head: usize,
    },
}

struct Compilation<'o> {
    options: &'o Options,
    source: Arc<str>,
    instructions: Vec<Instruction>,
    frames: Vec<Frame>,
    if_stack: Vec<Token>,
    for_stack: Vec<Token>,
    while_stack: Vec<Token>,
    autoescape: Vec<bool>,
}

/// The body of a statement tag introduced by `prefix`
fn body<'c>(content: &'c str, prefix: &str) -> Option<&'c str> {
    content
        .strip_prefix(prefix)
        .map(|rest| rest.strip_suffix(" %}").unwrap_or(""))
}

fn invalid(token: &Token) -> impl FnOnce(ParseError) -> TemplateError + '_ {
    move |error| TemplateError::syntax(token, format!("Invalid expression: {}", error))
}

impl<'o> Compilation<'o> {
    fn new(source: &str, options: &'o Options) -> Self {
        Self {
            options,
            source: Arc::from(source),
            instructions: Vec::new(),
            frames: Vec::new(),
            if_stack: Vec::new(),
            for_stack: Vec::new(),
            while_stack: Vec::new(),
            autoescape: Vec::new(),
        }
    }

    fn push(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    fn here(&self) -> usize {
        self.instructions.len()
    }

    /// Points the jump target of the instruction at `at` to `target`
    fn patch(&mut self, at: usize, target: usize) {
        match &mut self.instructions[at] {
            Instruction::Branch { otherwise, .. } | Instruction::ForStart { otherwise, .. } => {
                *otherwise = target
            }
            Instruction::Jump(to) => *to = target,
            Instruction::ForNext { exit, .. } | Instruction::While { exit, .. } => *exit = target,
            _ => {}
        }
    }

    fn literal(&mut self, text: &str) {
        if !text.is_empty() {
            self.push(Instruction::Literal(text.to_string()));
        }
    }

    fn expression(&mut self, token: &Token) -> Result<()> {
        let content = token.content();
        let expr = parse_expression(&content[3..content.len() - 3]).map_err(invalid(token))?;
        let escape = match self.autoescape.last() {
            Some(false) => None,
            _ => Some(self.options.language),
        };
        self.push(Instruction::Expression { expr, escape });
        Ok(())
    }

    fn open_if(&mut self, token: Token, condition: &str) -> Result<()> {
        let condition = parse_expression(condition).map_err(invalid(&token))?;
        let branch = self.push(Instruction::Branch {
            condition,
            otherwise: 0,
        });
        self.frames.push(Frame::If {
            branch: Some(branch),
            exits: Vec::new(),
        });
        self.if_stack.push(token);
        Ok(())
    }

    /// Ends the current arm of the innermost `if`, returning its pending `Branch`
    fn next_arm(&mut self, token: &Token, reason: &str) -> Result<usize> {
        if self.if_stack.is_empty() {
            return Err(TemplateError::syntax(token, "No matching {% if ... %}"));
        }
        let exit = self.push(Instruction::Jump(0));
        let here = self.here();
        match self.frames.last_mut() {
            Some(Frame::If {
                branch: Some(branch),
                exits,
            }) => {
                exits.push(exit);
                let branch = *branch;
                self.patch(branch, here);
                Ok(branch)
            }
            _ => Err(TemplateError::syntax(token, reason)),
        }
    }

    fn elif(&mut self, token: &Token, condition: &str) -> Result<()> {
        let condition = parse_expression(condition).map_err(invalid(token))?;
        self.next_arm(token, "Misplaced {% elif ... %}")?;
        let branch = self.push(Instruction::Branch {
            condition,
            otherwise: 0,
        });
        if let Some(Frame::If { branch: pending, .. }) = self.frames.last_mut() {
            *pending = Some(branch);
        }
        Ok(())
    }

    fn otherwise(&mut self, token: &Token) -> Result<()> {
        self.next_arm(token, "Misplaced {% else %}")?;
        if let Some(Frame::If { branch, .. }) = self.frames.last_mut() {
            *branch = None;
        }
        Ok(())
    }

    fn open_for(&mut self, token: Token, header: &str) -> Result<()> {
        let header = parse_for_header(header).map_err(invalid(&token))?;
        let head = self.push(Instruction::ForStart {
            targets: header.targets,
            iterable: header.iterable,
            otherwise: 0,
        });
        self.frames.push(Frame::For { head, next: None });
        self.for_stack.push(token);
        Ok(())
    }

    fn empty(&mut self, token: &Token) -> Result<()> {
        if self.for_stack.is_empty() {
            return Err(TemplateError::syntax(token, "No matching {% for ... %}"));
        }
        let Some(Frame::For { head, next: None }) = self.frames.last() else {
            return Err(TemplateError::syntax(token, "Misplaced {% empty %}"));
        };
        let head = *head;
        let next = self.push(Instruction::ForNext {
            body: head + 1,
            exit: 0,
        });
        let here = self.here();
        self.patch(head, here);
        if let Some(Frame::For { next: pending, .. }) = self.frames.last_mut() {
            *pending = Some(next);
        }
        Ok(())
    }

    fn open_while(&mut self, token: Token, condition: &str) -> Result<()> {
        let condition = parse_expression(condition).map_err(invalid(&token))?;
        let head = self.push(Instruction::While {
            condition,
            exit: 0,
        });
        self.frames.push(Frame::While { head });
        self.while_stack.push(token);
        Ok(())
    }

    /// Closes the innermost frame after an end tag of any kind
    fn close_frame(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        match frame {
            Frame::If { branch, exits } => {
                let end = self.here();
                for at in branch.into_iter().chain(exits) {
                    self.patch(at, end);
                }
            }
            Frame::For { head, next: None } => {
                self.push(Instruction::ForNext {
                    body: head + 1,
                    exit: 0,
                });
                let end = self.here();
                self.patch(end - 1, end);
                self.patch(head, end);
            }
            Frame::For {
                next: Some(next), ..
            } => {
                let end = self.here();
                self.patch(next, end);
            }
            Frame::While { head } => {
                self.push(Instruction::Jump(head));
                let end = self.here();
                self.patch(head, end);
            }
        }
    }

    fn close(&mut self, token: &Token, kind: &str) -> Result<()> {
        let (stack, reason) = match kind {
            "if" => (&mut self.if_stack, "No matching {% if ... %}"),
            "for" => (&mut self.for_stack, "No matching {% for ... %}"),
            _ => (&mut self.while_stack, "No matching {% while ... %}"),
        };
        if stack.pop().is_none() {
            return Err(TemplateError::syntax(token, reason));
        }
        self.close_frame();
        Ok(())
    }

    fn statement(&mut self, token: Token) -> Result<()> {
        let content = token.content().to_string();
        let content = content.as_str();

        if let Some(condition) = body(content, "{% if ") {
            self.open_if(token, condition)
        } else if let Some(condition) = body(content, "{% elif ") {
            self.elif(&token, condition)
        } else if content == "{% else %}" {
            self.otherwise(&token)
        } else if content == "{% endif %}" {
            self.close(&token, "if")
        } else if let Some(header) = body(content, "{% for ") {
            self.open_for(token, header)
        } else if content == "{% empty %}" {
            self.empty(&token)
        } else if content == "{% endfor %}" {
            self.close(&token, "for")
        } else if let Some(condition) = body(content, "{% while ") {
            self.open_while(token, condition)
        } else if content == "{% endwhile %}" {
            self.close(&token, "while")
        } else if let Some(statements) = body(content, "{% exec ") {
            let statements = parse_statements(statements).map_err(invalid(&token))?;
            self.push(Instruction::Exec(statements));
            Ok(())
        } else if let Some(mode) = body(content, "{% autoescape ") {
            match mode {
                "on" => self.autoescape.push(true),
                "off" => self.autoescape.push(false),
                _ => {
                    return Err(TemplateError::UnknownAutoescapeMode {
                        mode: mode.to_string(),
                    });
                }
            }
            Ok(())
        } else if content == "{% endautoescape %}" {
            match self.autoescape.pop() {
                Some(_) => Ok(()),
                None => Err(TemplateError::syntax(&token, "No matching {% autoescape ... %}")),
            }
        } else if content.starts_with("{% endblock ") {
            Err(TemplateError::syntax(&token, "No matching {% block ... %}"))
        } else if content.starts_with("{% extends ") {
            Err(TemplateError::syntax(&token, "Incorrect use of {% extends ... %}"))
        } else {
            Err(TemplateError::syntax(&token, format!("Unknown token: {}", content)))
        }
    }

    fn run(mut self) -> Result<Plan> {
        let source = self.source.clone();
        let text: &str = &source;
        let mut offset = 0;
        let mut last_was_statement = false;

        while let Some(tag) = find_first(&[TagKind::Expression, TagKind::Statement], text, offset) {
            let is_statement = tag.kind == TagKind::Statement;

            let mut gap = &text[offset..tag.start];
            if self.options.lstrip_blocks && is_statement && is_on_own_line(gap) {
                gap = gap.trim_end_matches(' ');
            }
            if self.options.trim_blocks && last_was_statement {
                gap = gap.strip_prefix('\n').unwrap_or(gap);
            }
            self.literal(gap);

            let token = Token::new(source.clone(), tag.start, tag.end);
            if is_statement {
                self.statement(token)?;
            } else {
                self.expression(&token)?;
            }
            last_was_statement = is_statement;
            offset = tag.end;
        }

        let mut rest = &text[offset..];
        if self.options.trim_blocks && last_was_statement {
            rest = rest.strip_prefix('\n').unwrap_or(rest);
        }
        self.literal(rest);

        let unclosed = [
            (self.if_stack.first(), "No matching {% endif %}"),
            (self.for_stack.first(), "No matching {% endfor %}"),
            (self.while_stack.first(), "No matching {% endwhile %}"),
        ];
        for (token, reason) in unclosed {
            if let Some(token) = token {
                return Err(TemplateError::syntax(token, reason));
            }
        }

        Ok(Plan::new(self.instructions))
    }
}

/// Turns composed template text into render plans
#[derive(Debug, Clone, Copy, Default)]
pub struct Compiler {
    options: Options,
}

impl Compiler {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Strips comments from `composed` and compiles what is left
    ///
    /// `composed` must already have its `extends`, `block` and `include` tags resolved,
    /// any left over are reported as syntax errors.
    pub fn compile(&self, composed: &str) -> Result<Plan> {
        let text = strip_comments(composed, &self.options);
        let plan = Compilation::new(&text, &self.options).run()?;
        debug!(instructions = plan.len(), "compiled template");
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expr;
    use pretty_assertions::assert_eq;

    fn compile(text: &str) -> Result<Plan> {
        Compiler::default().compile(text)
    }

    fn reason(text: &str) -> String {
        match compile(text) {
            Err(error) => error.reason().unwrap_or_default().to_string(),
            Ok(plan) => panic!("compiled to {:?}", plan),
        }
    }

    fn name(n: &str) -> Expr {
        Expr::Name(n.to_string())
    }

    #[test]
    fn text_without_tags_is_one_literal() {
        let plan = compile("just {text}").unwrap();
        assert_eq!(plan.instructions(), &[Instruction::Literal("just {text}".to_string())]);
        assert!(compile("").unwrap().is_empty());
    }

    #[test]
    fn if_elif_else_layout() {
        let plan = compile("{% if a %}A{% elif b %}B{% else %}C{% endif %}").unwrap();
        assert_eq!(
            plan.instructions(),
            &[
                Instruction::Branch {
                    condition: name("a"),
                    otherwise: 3
                },
                Instruction::Literal("A".to_string()),
                Instruction::Jump(7),
                Instruction::Branch {
                    condition: name("b"),
                    otherwise: 6
                },
                Instruction::Literal("B".to_string()),
                Instruction::Jump(7),
                Instruction::Literal("C".to_string()),
            ]
        );
    }

    #[test]
    fn for_empty_layout() {
        let plan = compile("{% for i in items %}x{% empty %}none{% endfor %}").unwrap();
        assert_eq!(
            plan.instructions(),
            &[
                Instruction::ForStart {
                    targets: vec!["i".to_string()],
                    iterable: name("items"),
                    otherwise: 3
                },
                Instruction::Literal("x".to_string()),
                Instruction::ForNext { body: 1, exit: 4 },
                Instruction::Literal("none".to_string()),
            ]
        );
    }

    #[test]
    fn while_layout() {
        let plan = compile("{% while n %}x{% endwhile %}").unwrap();
        assert_eq!(
            plan.instructions(),
            &[
                Instruction::While {
                    condition: name("n"),
                    exit: 3
                },
                Instruction::Literal("x".to_string()),
                Instruction::Jump(0),
            ]
        );
    }

    #[test]
    fn autoescape_is_resolved_per_expression() {
        let plan = compile(
            concat!(
                "{{ a }}{% autoescape off %}{{ b }}",
                "{% autoescape on %}{{ c }}{% endautoescape %}{{ d }}",
            ),
        )
        .unwrap();
        let escapes: Vec<_> = plan
            .instructions()
            .iter()
            .filter_map(|instruction| match instruction {
                Instruction::Expression { escape, .. } => Some(*escape),
                _ => None,
            })
            .collect();
        assert_eq!(
            escapes,
            vec![Some(Language::Html), None, Some(Language::Html), None]
        );
    }

    #[test]
    fn whitespace_control() {
        let plan = compile("<ul>\n  {% for i in items %}\n  <li>\n  {% endfor %}\n</ul>").unwrap();
        let literals: Vec<_> = plan
            .instructions()
            .iter()
            .filter_map(|instruction| match instruction {
                Instruction::Literal(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(literals, vec!["<ul>\n", "  <li>\n", "</ul>"]);

        let options = Options {
            trim_blocks: false,
            lstrip_blocks: false,
            ..Options::default()
        };
        let plan = Compiler::new(options).compile("a\n  {% exec x = 1 %}\nb").unwrap();
        assert_eq!(plan.get(0), Some(&Instruction::Literal("a\n  ".to_string())));
        assert_eq!(plan.get(2), Some(&Instruction::Literal("\nb".to_string())));
    }

    #[test]
    fn comments_are_stripped_first() {
        let plan = compile("a{# {% if %} #}b").unwrap();
        assert_eq!(plan.instructions(), &[Instruction::Literal("ab".to_string())]);
    }

    #[test]
    fn unmatched_tags() {
        assert_eq!(reason("{% if x %}"), "No matching {% endif %}");
        assert_eq!(reason("{% endfor %}"), "No matching {% for ... %}");
        assert_eq!(reason("{% else %}"), "No matching {% if ... %}");
        assert_eq!(reason("{% elif x %}"), "No matching {% if ... %}");
        assert_eq!(reason("{% empty %}"), "No matching {% for ... %}");
        assert_eq!(reason("{% endwhile %}"), "No matching {% while ... %}");
        assert_eq!(reason("{% while x %}"), "No matching {% endwhile %}");
        assert_eq!(reason("{% for x in y %}"), "No matching {% endfor %}");
        assert_eq!(reason("{% endautoescape %}"), "No matching {% autoescape ... %}");
        assert_eq!(reason("{% endblock %}"), "No matching {% block ... %}");
        assert_eq!(reason("x{% extends 'a' %}"), "Incorrect use of {% extends ... %}");
        assert_eq!(reason("{% frobnicate %}"), "Unknown token: {% frobnicate %}");
    }

    #[test]
    fn unclosed_errors_point_at_the_outermost_tag() {
        let error = compile("{% if a %}\n{% if b %}").unwrap_err();
        let TemplateError::Syntax { excerpt, .. } = error else {
            panic!("expected a syntax error");
        };
        assert_eq!(excerpt, "{% if a %}\n^^^^^^^^^^\n{% if b %}");
    }

    #[test]
    fn misplaced_arms() {
        assert_eq!(
            reason("{% if a %}{% else %}{% else %}{% endif %}"),
            "Misplaced {% else %}"
        );
        assert_eq!(
            reason("{% if a %}{% else %}{% elif b %}{% endif %}"),
            "Misplaced {% elif ... %}"
        );
        assert_eq!(
            reason("{% if a %}{% for x in y %}{% else %}{% endfor %}{% endif %}"),
            "Misplaced {% else %}"
        );
        assert_eq!(
            reason("{% for x in y %}{% empty %}{% empty %}{% endfor %}"),
            "Misplaced {% empty %}"
        );
    }

    #[test]
    fn kinds_may_interleave() {
        assert!(compile("{% if a %}{% for x in y %}{% endif %}{% endfor %}").is_ok());
    }

    #[test]
    fn invalid_expressions() {
        assert!(reason("{{ a + }}").starts_with("Invalid expression: "));
        assert!(reason("{% if %}").starts_with("Invalid expression: "));
        assert!(reason("{% for x items %}").starts_with("Invalid expression: "));
        assert!(matches!(
            compile("{% autoescape maybe %}"),
            Err(TemplateError::UnknownAutoescapeMode { mode }) if mode == "maybe"
        ));
    }
}
