//! Jinja flavoured templates with inheritance, streaming output and build time checks
//!
//! Templates can be compiled at runtime with [`Template`] or the `render_*` functions,
//! or at build time with [`str!`], [`file!`] and [`directory!`]. The macros resolve
//! `extends` and `include`, check the template structure and fail the build on any
//! error. Each one defines a function returning the compiled `&'static Template`.
//!
//! ```
//! mod templates {
//!     dry_templates::str!("greeting", "Hello {{ name }}!");
//! }
//!
//! let context = dry_templates::Context::new().with("name", "<World>");
//! assert_eq!(
//!     templates::greeting().render(&context).unwrap(),
//!     "Hello &lt;World&gt;!"
//! );
//! ```

extern crate self as dry_templates;

pub use dry_templates_core::*;
pub use dry_templates_macros::dry_templates_directory as directory;
pub use dry_templates_macros::dry_templates_file as file;
pub use dry_templates_macros::dry_templates_str as str;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn basic_usage() {
        mod template {
            crate::str!("test", r#"<p>{{ firstname }} {{ lastname }}</p>"#);
        }
        let context = Context::new()
            .with("firstname", "King")
            .with("lastname", "Tubby");
        assert_eq!(
            template::test().render(&context).unwrap(),
            "<p>King Tubby</p>"
        );
    }

    #[test]
    fn path_expressions() {
        mod template {
            crate::str!(
                "test",
                //language=jinja2
                r#"{{ person.firstname }} {{ person["lastname"] }}"#
            );
        }
        let context = Context::from_json(json!({
            "person": {"firstname": "King", "lastname": "Tubby"}
        }))
        .unwrap();
        assert_eq!(template::test().render(&context).unwrap(), "King Tubby");
    }

    #[test]
    fn if_else() {
        mod template {
            crate::str!(
                "test",
                //language=jinja2
                r#"{% if author %}<h1>{{ author.name }}</h1>{% else %}<h1>Unknown</h1>{% endif %}"#
            );
        }
        let with_author = Context::from_json(json!({"author": {"name": "King"}})).unwrap();
        assert_eq!(
            template::test().render(&with_author).unwrap(),
            //language=html
            "<h1>King</h1>"
        );
        let without = Context::from_json(json!({"author": null})).unwrap();
        assert_eq!(
            template::test().render(&without).unwrap(),
            //language=html
            "<h1>Unknown</h1>"
        );
    }

    #[test]
    fn same_template_every_call() {
        mod template {
            crate::str!("test", "{{ 40 + 2 }}");
        }
        assert!(std::ptr::eq(template::test(), template::test()));
        assert_eq!(template::test().render(&Context::new()).unwrap(), "42");
    }

    #[test]
    fn language_argument() {
        mod template {
            crate::str!("test", "<item>{{ v }}</item>", "xml");
        }
        let context = Context::new().with("v", "a-b&c");
        assert_eq!(
            template::test().render(&context).unwrap(),
            "<item>a-b&amp;c</item>"
        );
    }

    #[test]
    fn format_numbers() {
        mod template {
            crate::str!(
                "test",
                "Price: ${% autoescape off %}{{ round(price, 2) }}{% endautoescape %}"
            );
        }
        let context = Context::new().with("price", 12.2345f64);
        assert_eq!(
            template::test().render(&context).unwrap(),
            "Price: $12.23"
        );
    }
}
