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

//! Compiled template reuse and one-call rendering
//!
//! A [`TemplateCache`] maps the identity of a template (its source text, or its path)
//! and the options it was compiled with to the compiled [`Template`]. Two threads
//! missing on the same key may both compile it; the last one stored wins.

use std::{
    collections::HashMap,
    num::NonZeroUsize,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::debug;

use crate::{
    compiler::Options,
    context::Context,
    error::{Error, RenderResult, Result},
    render::{Chunks, Fragments},
    template::Template,
};

/// Identity of a cached template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A template compiled from a string, keyed by the string itself
    Source { source: Arc<str>, options: Options },
    /// A template loaded from a path
    Path { path: String, options: Options },
}

impl CacheKey {
    pub fn for_source(source: &str, options: Options) -> Self {
        Self::Source {
            source: Arc::from(source),
            options,
        }
    }

    pub fn for_path(path: &str, options: Options) -> Self {
        Self::Path {
            path: path.to_string(),
            options,
        }
    }
}

/// A thread safe store of compiled templates
#[derive(Debug, Default)]
pub struct TemplateCache {
    templates: RwLock<HashMap<CacheKey, Arc<Template>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the template stored under `key`, compiling and storing it on a miss
    ///
    /// Failed compilations are not stored.
    pub fn get_or_compile(
        &self,
        key: CacheKey,
        compile: impl FnOnce() -> Result<Template>,
    ) -> Result<Arc<Template>> {
        let cached = self
            .templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(template) = cached {
            debug!(key = ?key, "template cache hit");
            return Ok(template);
        }

        debug!(key = ?key, "template cache miss");
        let template = Arc::new(compile()?);
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&template));
        Ok(template)
    }

    /// The compiled form of `source`
    pub fn from_source(&self, source: &str, options: Options) -> Result<Arc<Template>> {
        self.get_or_compile(CacheKey::for_source(source, options), || {
            Template::with_options(source, options)
        })
    }

    /// The compiled form of the template at `path`
    pub fn from_path(&self, path: &str, options: Options) -> Result<Arc<Template>> {
        self.get_or_compile(CacheKey::for_path(path, options), || {
            Template::from_path(path, options)
        })
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached template
    pub fn clear(&self) {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Lazily rendered output, chunked or not
pub enum RenderIter<'c> {
    Fragments(Fragments<'c>),
    Chunks(Chunks<Fragments<'c>>),
}

impl<'c> RenderIter<'c> {
    fn new(template: &Template, context: &'c Context, chunk_size: Option<NonZeroUsize>) -> Self {
        match chunk_size {
            Some(size) => RenderIter::Chunks(template.render_chunks(context, size)),
            None => RenderIter::Fragments(template.render_iter(context)),
        }
    }
}

impl Iterator for RenderIter<'_> {
    type Item = RenderResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            RenderIter::Fragments(fragments) => fragments.next(),
            RenderIter::Chunks(chunks) => chunks.next(),
        }
    }
}

fn compile_source(
    source: &str,
    options: Options,
    cache: Option<&TemplateCache>,
) -> Result<Arc<Template>> {
    match cache {
        Some(cache) => cache.from_source(source, options),
        None => Template::with_options(source, options).map(Arc::new),
    }
}

fn compile_path(
    path: &str,
    options: Options,
    cache: Option<&TemplateCache>,
) -> Result<Arc<Template>> {
    match cache {
        Some(cache) => cache.from_path(path, options),
        None => Template::from_path(path, options).map(Arc::new),
    }
}

/// Compiles `source` and renders it against `context`
///
/// ```
/// use dry_templates_core::{render_string, Context, Options, TemplateCache};
///
/// let cache = TemplateCache::new();
/// let context = Context::new().with("name", "World");
/// let text = render_string("Hello {{ name }}!", &context, Options::default(), Some(&cache));
/// assert_eq!(text.unwrap(), "Hello World!");
/// assert_eq!(cache.len(), 1);
/// ```
pub fn render_string(
    source: &str,
    context: &Context,
    options: Options,
    cache: Option<&TemplateCache>,
) -> std::result::Result<String, Error> {
    Ok(compile_source(source, options, cache)?.render(context)?)
}

/// Compiles `source` and renders it lazily, in chunks of `chunk_size` characters if set
pub fn render_string_iter<'c>(
    source: &str,
    context: &'c Context,
    options: Options,
    cache: Option<&TemplateCache>,
    chunk_size: Option<NonZeroUsize>,
) -> Result<RenderIter<'c>> {
    let template = compile_source(source, options, cache)?;
    Ok(RenderIter::new(&template, context, chunk_size))
}

/// Loads the template at `path` and renders it against `context`
pub fn render_template(
    path: &str,
    context: &Context,
    options: Options,
    cache: Option<&TemplateCache>,
) -> std::result::Result<String, Error> {
    Ok(compile_path(path, options, cache)?.render(context)?)
}

/// Loads the template at `path` and renders it lazily, in chunks of `chunk_size`
/// characters if set
pub fn render_template_iter<'c>(
    path: &str,
    context: &'c Context,
    options: Options,
    cache: Option<&TemplateCache>,
    chunk_size: Option<NonZeroUsize>,
) -> Result<RenderIter<'c>> {
    let template = compile_path(path, options, cache)?;
    Ok(RenderIter::new(&template, context, chunk_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TemplateError;

    #[test]
    fn keys_depend_on_source_and_options() {
        let html = Options::default();
        let xml = Options::with_language(crate::escape::Language::Xml);
        assert_eq!(CacheKey::for_source("a", html), CacheKey::for_source("a", html));
        assert_ne!(CacheKey::for_source("a", html), CacheKey::for_source("b", html));
        assert_ne!(CacheKey::for_source("a", html), CacheKey::for_source("a", xml));
        assert_ne!(CacheKey::for_path("a", html), CacheKey::for_source("a", html));
    }

    #[test]
    fn distinct_sources_never_share_a_template() {
        let cache = TemplateCache::new();
        let key = CacheKey::for_source("{{ 1 }}", Options::default());
        assert!(matches!(&key, CacheKey::Source { source, .. } if &**source == "{{ 1 }}"));

        for n in 0..500 {
            let source = format!("{{{{ {} }}}}", n);
            let template = cache.from_source(&source, Options::default()).unwrap();
            assert_eq!(template.render(&Context::new()).unwrap(), n.to_string());
        }
        assert_eq!(cache.len(), 500);
    }

    #[test]
    fn compiles_once_per_key() {
        let cache = TemplateCache::new();
        let first = cache.from_source("{{ 1 }}", Options::default()).unwrap();
        let second = cache.from_source("{{ 1 }}", Options::default()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = TemplateCache::new();
        let key = CacheKey::for_source("{% if x %}", Options::default());
        assert!(cache.from_source("{% if x %}", Options::default()).is_err());
        assert!(!cache.contains(&key));

        let error = cache
            .get_or_compile(CacheKey::for_path("x", Options::default()), || {
                Err(TemplateError::NotFound {
                    path: "x".to_string(),
                })
            })
            .unwrap_err();
        assert!(matches!(error, TemplateError::NotFound { .. }));
    }

    #[test]
    fn iter_variants_chunk_on_request() {
        let context = Context::new().with("name", "World");
        let fragments: Vec<String> = render_string_iter(
            "Hello {{ name }}!",
            &context,
            Options::default(),
            None,
            None,
        )
        .unwrap()
        .collect::<RenderResult<_>>()
        .unwrap();
        assert_eq!(fragments, vec!["Hello ", "World", "!"]);

        let chunks: Vec<String> = render_string_iter(
            "Hello {{ name }}!",
            &context,
            Options::default(),
            None,
            NonZeroUsize::new(5),
        )
        .unwrap()
        .collect::<RenderResult<_>>()
        .unwrap();
        assert_eq!(chunks, vec!["Hello", " Worl", "d!"]);
    }

    #[test]
    fn errors_of_both_phases_surface() {
        let context = Context::new();
        assert!(matches!(
            render_string("{% endif %}", &context, Options::default(), None),
            Err(Error::Template(_))
        ));
        assert!(matches!(
            render_string("{{ x }}", &context, Options::default(), None),
            Err(Error::Render(_))
        ));
    }
}
