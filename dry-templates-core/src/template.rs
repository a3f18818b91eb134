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

//! Compiled templates

use std::{num::NonZeroUsize, sync::Arc};

use tracing::debug;

use crate::{
    compiler::{Compiler, Options},
    compose::compose,
    context::Context,
    error::{RenderResult, Result, TemplateError},
    plan::Plan,
    render::{Chunks, Fragments},
    resolver::{FileSystemResolver, TemplateResolver},
};

/// A template compiled once and rendered any number of times
///
/// The plan is shared, so cloning a template is cheap and rendering it from several
/// threads at once needs no locking.
///
/// ```
/// use dry_templates_core::{Context, Template};
///
/// let template = Template::new("Hello {{ name }}!").unwrap();
/// let context = Context::new().with("name", "World");
/// assert_eq!(template.render(&context).unwrap(), "Hello World!");
/// ```
#[derive(Debug, Clone)]
pub struct Template {
    plan: Arc<Plan>,
    options: Options,
}

impl Template {
    /// Compiles `source` with default options, reading `extends` and `include` targets
    /// relative to the working directory
    pub fn new(source: &str) -> Result<Self> {
        Self::with_options(source, Options::default())
    }

    pub fn with_options(source: &str, options: Options) -> Result<Self> {
        Self::with_resolver(source, &FileSystemResolver::new(), options)
    }

    /// Compiles `source`, loading referenced templates through `resolver`
    pub fn with_resolver(
        source: &str,
        resolver: &dyn TemplateResolver,
        options: Options,
    ) -> Result<Self> {
        Self::compile(source, None, resolver, options)
    }

    /// Loads and compiles the template at `path` relative to the working directory
    pub fn from_path(path: &str, options: Options) -> Result<Self> {
        Self::from_path_with_resolver(path, &FileSystemResolver::new(), options)
    }

    /// Loads and compiles the template at `path` through `resolver`
    pub fn from_path_with_resolver(
        path: &str,
        resolver: &dyn TemplateResolver,
        options: Options,
    ) -> Result<Self> {
        if !resolver.is_file(path) {
            return Err(TemplateError::NotFound {
                path: path.to_string(),
            });
        }
        let source = resolver.read(path)?;
        debug!(path = %path, "loading template");
        Self::compile(&source, Some(path), resolver, options)
    }

    fn compile(
        source: &str,
        origin: Option<&str>,
        resolver: &dyn TemplateResolver,
        options: Options,
    ) -> Result<Self> {
        let composition = compose(source, origin, resolver)?;
        let plan = Compiler::new(options).compile(&composition.source)?;
        Ok(Self {
            plan: Arc::new(plan),
            options,
        })
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Renders the whole template into one string
    pub fn render(&self, context: &Context) -> RenderResult<String> {
        self.render_iter(context).collect()
    }

    /// Renders the template lazily, one fragment at a time
    pub fn render_iter<'c>(&self, context: &'c Context) -> Fragments<'c> {
        Fragments::new(Arc::clone(&self.plan), context)
    }

    /// Renders the template lazily in chunks of `chunk_size` characters
    pub fn render_chunks<'c>(
        &self,
        context: &'c Context,
        chunk_size: NonZeroUsize,
    ) -> Chunks<Fragments<'c>> {
        Chunks::new(self.render_iter(context), chunk_size)
    }
}
