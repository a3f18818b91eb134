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

//! Template engine behind the `dry-templates` crate
//!
//! Templates use a Jinja flavoured syntax: `{{ expr }}` output, `{# ... #}` comments,
//! `{% if %}`, `{% for %}`, `{% while %}`, `{% exec %}`, `{% autoescape %}` control
//! tags and `{% extends %}`/`{% block %}`/`{% include %}` composition. A [`Template`] is
//! compiled once into a flat [`Plan`] which is then rendered against a [`Context`],
//! either in one go or lazily as a stream of fragments.
//!
//! ```
//! use dry_templates_core::{Context, Template};
//!
//! let template = Template::new(
//!     "{% for item in items %}<li>{{ item }}</li>{% empty %}<p>nothing</p>{% endfor %}",
//! )
//! .unwrap();
//! let context = Context::new().with("items", vec!["a<b", "c"]);
//! assert_eq!(
//!     template.render(&context).unwrap(),
//!     "<li>a&lt;b</li><li>c</li>"
//! );
//! ```

pub mod cache;
pub mod comment;
pub mod compiler;
pub mod compose;
pub mod context;
pub mod diagnostic;
pub mod error;
pub mod escape;
pub mod expression;
pub mod plan;
pub mod render;
pub mod resolver;
pub mod scanner;
pub mod template;
pub mod token;
pub mod value;

pub use cache::{
    CacheKey, RenderIter, TemplateCache, render_string, render_string_iter, render_template,
    render_template_iter,
};
pub use compiler::{Compiler, Options};
pub use compose::{Composition, compose};
pub use context::Context;
pub use error::{ContextError, Error, RenderError, RenderResult, Result, TemplateError};
pub use escape::{Language, safe_html, safe_markdown, safe_xml};
pub use plan::{Instruction, Plan};
pub use render::{Chunks, Fragments};
pub use resolver::{FileSystemResolver, MemoryResolver, NullResolver, TemplateResolver};
pub use template::Template;
pub use value::Value;
