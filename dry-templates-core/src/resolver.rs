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

//! Template sources
//!
//! Composition only needs to know whether a path names a template and how to read it.
//! [`TemplateResolver`] is that capability; the filesystem is one implementation.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::error::{Result, TemplateError};

/// Locates and loads templates referenced by `extends` and `include`
pub trait TemplateResolver {
    /// True when `path` names an existing template
    fn is_file(&self, path: &str) -> bool;

    /// Reads the full text of the template at `path`
    fn read(&self, path: &str) -> Result<String>;
}

impl<T: TemplateResolver + ?Sized> TemplateResolver for &T {
    fn is_file(&self, path: &str) -> bool {
        (**self).is_file(path)
    }

    fn read(&self, path: &str) -> Result<String> {
        (**self).read(path)
    }
}

/// Resolver that reads templates from disk
///
/// Paths are taken relative to `root` when one is set, otherwise relative to the
/// working directory of the process.
#[derive(Debug, Clone, Default)]
pub struct FileSystemResolver {
    root: Option<PathBuf>,
}

impl FileSystemResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver reading paths relative to `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// The location on disk of a template path
    pub fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        }
    }
}

impl TemplateResolver for FileSystemResolver {
    fn is_file(&self, path: &str) -> bool {
        fs::metadata(self.resolve(path)).is_ok_and(|metadata| metadata.is_file())
    }

    fn read(&self, path: &str) -> Result<String> {
        fs::read_to_string(self.resolve(path)).map_err(|source| TemplateError::Io {
            path: path.to_string(),
            source,
        })
    }
}

/// Resolver that serves templates from an in-memory map
///
/// Useful for tests and for templates bundled into a binary.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    templates: HashMap<String, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a template under `path`
    pub fn add(&mut self, path: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.templates.insert(path.into(), text.into());
        self
    }

    /// Creates a resolver holding the given templates
    pub fn with_templates(
        templates: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        let mut resolver = Self::new();
        for (path, text) in templates {
            resolver.add(path, text);
        }
        resolver
    }
}

impl TemplateResolver for MemoryResolver {
    fn is_file(&self, path: &str) -> bool {
        self.templates.contains_key(path)
    }

    fn read(&self, path: &str) -> Result<String> {
        self.templates
            .get(path)
            .cloned()
            .ok_or_else(|| TemplateError::NotFound {
                path: path.to_string(),
            })
    }
}

/// Resolver for which no template exists
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResolver;

impl TemplateResolver for NullResolver {
    fn is_file(&self, _path: &str) -> bool {
        false
    }

    fn read(&self, path: &str) -> Result<String> {
        Err(TemplateError::NotFound {
            path: path.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filesystem_resolver_only_accepts_regular_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.html"), "<p>hi</p>").unwrap();
        fs::create_dir(dir.path().join("partials")).unwrap();

        let resolver = FileSystemResolver::with_root(dir.path());
        assert!(resolver.is_file("page.html"));
        assert!(!resolver.is_file("partials"));
        assert!(!resolver.is_file("missing.html"));
        assert_eq!(resolver.read("page.html").unwrap(), "<p>hi</p>");
        assert!(matches!(
            resolver.read("missing.html"),
            Err(TemplateError::Io { path, .. }) if path == "missing.html"
        ));
    }

    #[test]
    fn memory_resolver() {
        let resolver = MemoryResolver::with_templates([("base.html", "<main></main>")]);
        assert!(resolver.is_file("base.html"));
        assert!(!resolver.is_file("other.html"));
        assert_eq!(resolver.read("base.html").unwrap(), "<main></main>");
    }

    #[test]
    fn null_resolver() {
        assert!(!NullResolver.is_file("anything"));
        assert!(matches!(
            NullResolver.read("anything"),
            Err(TemplateError::NotFound { .. })
        ));
    }

    #[test]
    fn resolvers_work_through_references() {
        fn exists(resolver: impl TemplateResolver, path: &str) -> bool {
            resolver.is_file(path)
        }
        let mut resolver = MemoryResolver::new();
        resolver.add("a", "x");
        assert!(exists(&resolver, "a"));
    }
}
