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

//! Template composition
//!
//! Flattens `extends`, `block` and `include` into a single buffer before compilation.
//!
//! Walking an `extends` chain starts at the most derived template. Each level
//! contributes its block bodies to a replacement map, after which the working buffer
//! becomes the parent template. Once a template without `extends` is reached, its blocks
//! are replaced from the map. An override may refer to the body it replaces with
//! `{{ block.super }}`.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::{
    error::{Result, TemplateError},
    resolver::TemplateResolver,
    scanner::{TagKind, find, find_end_block, find_tag_within},
    token::Token,
};

/// Placeholder for the body of the overridden block
pub const BLOCK_SUPER: &str = "{{ block.super }}";

/// Deepest chain of templates including one another
pub const MAX_INCLUDE_DEPTH: usize = 64;

/// A composed template and every template it was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    /// The flattened template text
    pub source: String,
    /// Paths of all templates read, in the order they were first loaded
    pub dependencies: Vec<String>,
}

struct Composer<'r> {
    resolver: &'r dyn TemplateResolver,
    dependencies: Vec<String>,
}

fn syntax_error(text: &str, start: usize, end: usize, reason: &str) -> TemplateError {
    TemplateError::syntax(&Token::new(text, start, end), reason)
}

impl<'r> Composer<'r> {
    fn load(&mut self, path: &str) -> Result<String> {
        if !self.resolver.is_file(path) {
            return Err(TemplateError::NotFound {
                path: path.to_string(),
            });
        }
        let text = self.resolver.read(path)?;
        if !self.dependencies.iter().any(|dependency| dependency == path) {
            self.dependencies.push(path.to_string());
        }
        Ok(text)
    }

    /// Splices included templates until no `include` tag is left
    fn resolve_includes(&mut self, text: String) -> Result<String> {
        self.splice_includes(text, 0)
    }

    /// Splices the includes of `text`, which sits `depth` includes below the root
    fn splice_includes(&mut self, mut text: String, depth: usize) -> Result<String> {
        let mut from = 0;
        while let Some(tag) = find(TagKind::Include, &text, from) {
            let range = tag.range();
            let path = tag.argument.unwrap_or_default().to_string();

            if depth >= MAX_INCLUDE_DEPTH {
                return Err(syntax_error(
                    &text,
                    range.start,
                    range.end,
                    "{% include ... %} nested too deeply, possible include cycle",
                ));
            }

            let included = self.load(&path)?;
            debug!(path = %path, depth, "including template");
            let included = self.splice_includes(included, depth + 1)?;
            from = range.start + included.len();
            text.replace_range(range, &included);
        }
        Ok(text)
    }
}

/// Collects the blocks of a child template into `replacements`
fn collect_blocks(
    text: &str,
    from: usize,
    replacements: &mut HashMap<String, String>,
) -> Result<()> {
    let mut offset = from;
    while let Some(block) = find(TagKind::Block, text, offset) {
        let name = block.argument.unwrap_or_default();

        if let Some(stray) = find_tag_within(text, offset..block.start) {
            return Err(syntax_error(text, stray.start, stray.end, "Token between blocks"));
        }

        let end = matching_end_block(text, block.start, block.end, name)?;
        let body = &text[block.end..end.start];

        match replacements.get_mut(name) {
            Some(existing) => *existing = existing.replace(BLOCK_SUPER, body),
            None => {
                replacements.insert(name.to_string(), body.to_string());
            }
        }
        offset = end.end;
    }

    if let Some(stray) = find_tag_within(text, offset..text.len()) {
        return Err(syntax_error(text, stray.start, stray.end, "Token between blocks"));
    }
    Ok(())
}

/// Finds the end of a block with a body, rejecting blocks nested inside it
fn matching_end_block(
    text: &str,
    start: usize,
    header_end: usize,
    name: &str,
) -> Result<std::ops::Range<usize>> {
    let nested = find(TagKind::Block, text, header_end);
    let nested_error = |nested: std::ops::Range<usize>| {
        syntax_error(text, nested.start, nested.end, "Nested blocks are not supported")
    };
    match (find_end_block(text, header_end, name), nested) {
        (Some(end), Some(nested)) if nested.start < end.start => Err(nested_error(nested.range())),
        (Some(end), _) => Ok(end.range()),
        (None, Some(nested)) if find(TagKind::EndBlock, text, nested.end).is_some() => {
            Err(nested_error(nested.range()))
        }
        (None, _) => Err(syntax_error(text, start, header_end, "No matching {% endblock %}")),
    }
}

/// Replaces the blocks of the root template with their overrides or default bodies
fn replace_blocks(mut text: String, replacements: &HashMap<String, String>) -> Result<String> {
    let mut from = 0;
    while let Some(block) = find(TagKind::Block, &text, from) {
        let name = block.argument.unwrap_or_default().to_string();
        let (start, header_end) = (block.start, block.end);

        let (end, replacement) = match find_end_block(&text, header_end, &name) {
            // A block without a body is a placeholder
            None => {
                let replacement = replacements
                    .get(&name)
                    .map(|content| content.replace(BLOCK_SUPER, ""))
                    .unwrap_or_default();
                (header_end, replacement)
            }
            Some(end_block) => {
                if let Some(nested) = find(TagKind::Block, &text, header_end)
                    .filter(|nested| nested.start < end_block.start)
                {
                    return Err(syntax_error(
                        &text,
                        nested.start,
                        nested.end,
                        "Nested blocks are not supported",
                    ));
                }
                let default = &text[header_end..end_block.start];
                let replacement = match replacements.get(&name) {
                    Some(content) => content.replace(BLOCK_SUPER, default),
                    None => default.to_string(),
                };
                (end_block.end, replacement)
            }
        };

        text.replace_range(start..end, &replacement);
        from = start + replacement.len();
    }
    Ok(text)
}

/// Composes `source` into a single template
///
/// `origin` is the path `source` was loaded from, if any. It is recorded as the first
/// dependency and counts as visited for the circular `extends` check.
pub fn compose(
    source: &str,
    origin: Option<&str>,
    resolver: &dyn TemplateResolver,
) -> Result<Composition> {
    let mut composer = Composer {
        resolver,
        dependencies: origin.map(str::to_string).into_iter().collect(),
    };
    let mut visited: HashSet<String> = origin.map(str::to_string).into_iter().collect();
    let mut replacements: HashMap<String, String> = HashMap::new();
    let mut text = source.to_string();

    while let Some(extends) = find(TagKind::Extends, &text, 0) {
        let range = extends.range();
        let path = extends.argument.unwrap_or_default().to_string();

        if !resolver.is_file(&path) {
            return Err(TemplateError::NotFound { path });
        }
        if !visited.insert(path.clone()) {
            return Err(syntax_error(&text, range.start, range.end, "Circular extends"));
        }
        let parent = composer.load(&path)?;
        debug!(path = %path, "extending template");

        text = composer.resolve_includes(text)?;

        // Includes before the tag may have moved it
        let Some(extends) = find(TagKind::Extends, &text, 0) else {
            break;
        };
        if let Some(stacked) = find(TagKind::Extends, &text, extends.end) {
            return Err(syntax_error(
                &text,
                stacked.start,
                stacked.end,
                "Incorrect use of {% extends ... %}",
            ));
        }

        collect_blocks(&text, extends.end, &mut replacements)?;
        text = parent;
    }

    let text = composer.resolve_includes(text)?;
    let source = replace_blocks(text, &replacements)?;
    Ok(Composition {
        source,
        dependencies: composer.dependencies,
    })
}
