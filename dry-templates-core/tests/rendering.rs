use std::{fs, num::NonZeroUsize, path::Path};

use dry_templates_core::{
    Context, Error, FileSystemResolver, Language, Options, RenderResult, Template,
    TemplateCache, TemplateError, render_string, render_string_iter, render_template,
    render_template_iter, safe_html, safe_markdown, safe_xml,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn context(value: serde_json::Value) -> Context {
    Context::from_json(value).unwrap()
}

fn write(dir: &Path, name: &str, text: &str) {
    fs::write(dir.join(name), text).unwrap();
}

fn chunks(template: &Template, context: &Context, size: usize) -> Vec<String> {
    template
        .render_chunks(context, NonZeroUsize::new(size).unwrap())
        .collect::<RenderResult<_>>()
        .unwrap()
}

#[test]
fn text_without_tags_renders_unchanged() {
    let sources = [
        "",
        "plain text",
        "multi\nline\n  text with { braces } and % signs\n",
        "{ {not a tag} } {%not a tag%} {{not a tag}}",
        "unicode: żółw ☃",
    ];
    let contexts = [context(json!({})), context(json!({"name": "ignored"}))];
    for source in sources {
        let template = Template::new(source).unwrap();
        for context in &contexts {
            assert_eq!(template.render(context).unwrap(), source);
        }
    }
}

#[test]
fn lazy_rendering_matches_full_rendering() {
    let template = Template::new(
        concat!(
            "<ul>\n{% for item in items %}\n  <li>{{ item.name }}: {{ item.qty * 2 }}</li>\n",
            "{% empty %}\n  <li>none</li>\n{% endfor %}\n</ul>",
        ),
    )
    .unwrap();
    let context = context(json!({
        "items": [{"name": "żółw", "qty": 1}, {"name": "bolt", "qty": 12}]
    }));

    let full = template.render(&context).unwrap();
    assert_eq!(
        full,
        "<ul>\n  <li>żółw: 2</li>\n  <li>bolt: 24</li>\n</ul>"
    );

    let fragments: String = template
        .render_iter(&context)
        .collect::<RenderResult<_>>()
        .unwrap();
    assert_eq!(fragments, full);

    let length = full.chars().count();
    for size in 1..=length + 1 {
        let chunks = chunks(&template, &context, size);
        assert_eq!(chunks.concat(), full);
        let (last, rest) = chunks.split_last().unwrap();
        assert!(rest.iter().all(|chunk| chunk.chars().count() == size));
        assert!((1..=size).contains(&last.chars().count()));
    }
}

#[test]
fn hello_world() {
    let context = context(json!({"name": "World"}));
    assert_eq!(
        render_string("Hello {{ name }}!", &context, Options::default(), None).unwrap(),
        "Hello World!"
    );

    let chunks: Vec<String> = render_string_iter(
        "Hello {{ name }}!",
        &context,
        Options::default(),
        None,
        NonZeroUsize::new(3),
    )
    .unwrap()
    .collect::<RenderResult<_>>()
    .unwrap();
    assert_eq!(chunks, vec!["Hel", "lo ", "Wor", "ld!"]);
}

#[test]
fn escaping_covers_markup() {
    let inputs = ["<script>alert(\"x\")</script>", "a & b", "'quoted' \"text\"", "&amp;"];
    for input in inputs {
        let html = safe_html(input);
        assert!(!html.contains(['<', '>', '"']), "{}", html);
        for (at, _) in html.match_indices('&') {
            let entity = html[at + 1..].split(';').next().unwrap_or_default();
            assert!(
                !entity.is_empty() && entity.chars().all(|c| c.is_ascii_alphabetic()),
                "{}",
                html
            );
        }

        let xml = safe_xml(input);
        assert!(!xml.contains(['<', '>', '"', '\'']), "{}", xml);
    }

    assert_eq!(safe_xml("<&>\"'"), "&lt;&amp;&gt;&quot;&apos;");
    assert_eq!(safe_markdown("*a* _b_ #c"), "\\*a\\* \\_b\\_ \\#c");
}

#[test]
fn autoescape_off_emits_raw_values() {
    let context = context(json!({"v": "<b>"}));
    let raw = "{% autoescape off %}{{ v }}{% endautoescape %}";
    assert_eq!(
        render_string(raw, &context, Options::default(), None).unwrap(),
        "<b>"
    );
    assert_eq!(
        render_string("{{ v }}", &context, Options::default(), None).unwrap(),
        "&lt;b&gt;"
    );
    assert_eq!(
        render_string(
            concat!(
                "{% autoescape off %}{% autoescape on %}{{ v }}{% endautoescape %}",
                "{{ v }}{% endautoescape %}",
            ),
            &context,
            Options::default(),
            None
        )
        .unwrap(),
        "&lt;b&gt;<b>"
    );
}

#[test]
fn unknown_autoescape_mode_is_rejected() {
    let error = Template::new("{% autoescape maybe %}{% endautoescape %}").unwrap_err();
    assert!(matches!(error, TemplateError::UnknownAutoescapeMode { mode } if mode == "maybe"));
}

#[test]
fn unmatched_tags_fail_to_compile() {
    let cases = [
        ("{% if x %}", "{% if x %}", "No matching {% endif %}"),
        ("{% endfor %}", "{% endfor %}", "No matching {% for ... %}"),
        ("a{% elif y %}", "{% elif y %}", "No matching {% if ... %}"),
        ("{% for x in y %}", "{% for x in y %}", "No matching {% endfor %}"),
        ("{% empty %}", "{% empty %}", "No matching {% for ... %}"),
        ("{% while x %}", "{% while x %}", "No matching {% endwhile %}"),
        ("{% endwhile %}", "{% endwhile %}", "No matching {% while ... %}"),
        ("{% endautoescape %}", "{% endautoescape %}", "No matching {% autoescape ... %}"),
        ("{% endblock %}", "{% endblock %}", "No matching {% block ... %}"),
        ("{% frobnicate %}", "{% frobnicate %}", "Unknown token: {% frobnicate %}"),
    ];
    for (source, tag, reason) in cases {
        match Template::new(source) {
            Err(TemplateError::Syntax {
                excerpt,
                reason: actual,
            }) => {
                assert_eq!(actual, reason, "{}", source);
                assert!(excerpt.contains(tag), "{}", excerpt);
                assert!(excerpt.contains('^'), "{}", excerpt);
            }
            other => panic!("{} compiled to {:?}", source, other),
        }
    }
}

#[test]
fn child_overrides_base_block() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "B", "{% block a %}base{% endblock a %}");
    write(
        dir.path(),
        "C",
        "{% extends \"B\" %}{% block a %}child-{{ block.super }}{% endblock a %}",
    );
    let resolver = FileSystemResolver::with_root(dir.path());
    let template = Template::from_path_with_resolver("C", &resolver, Options::default()).unwrap();
    assert_eq!(template.render(&Context::new()).unwrap(), "child-base");
}

#[test]
fn layout_with_include() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "base.html",
        concat!(
            "<title>{% block title %}Site{% endblock %}</title>{% include \"nav.html\" %}",
            "<main>{% block body %}{% endblock %}</main>",
        ),
    );
    write(dir.path(), "nav.html", "<nav>{{ section }}</nav>");
    write(
        dir.path(),
        "page.html",
        concat!(
            "{% extends \"base.html\" %}\n",
            "{% block title %}{{ title }} | {{ block.super }}{% endblock %}\n",
            "{% block body %}<p>{{ body }}</p>{% endblock %}\n",
        ),
    );

    let resolver = FileSystemResolver::with_root(dir.path());
    let template =
        Template::from_path_with_resolver("page.html", &resolver, Options::default()).unwrap();
    let context = context(json!({"title": "Home", "section": "news", "body": "<hi>"}));
    assert_eq!(
        template.render(&context).unwrap(),
        "<title>Home | Site</title><nav>news</nav><main><p>&lt;hi&gt;</p></main>"
    );
}

#[test]
fn circular_extends_fails() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "A", "{% extends \"B\" %}");
    write(dir.path(), "B", "{% extends \"A\" %}");
    let resolver = FileSystemResolver::with_root(dir.path());

    let error = Template::from_path_with_resolver("A", &resolver, Options::default()).unwrap_err();
    assert_eq!(error.reason(), Some("Circular extends"));

    let error = Template::with_resolver("{% extends \"A\" %}", &resolver, Options::default())
        .unwrap_err();
    assert_eq!(error.reason(), Some("Circular extends"));
}

#[test]
fn missing_templates_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = FileSystemResolver::with_root(dir.path());
    let source = "{% include \"gone.html\" %}";
    let error = Template::with_resolver(source, &resolver, Options::default()).unwrap_err();
    assert!(matches!(error, TemplateError::NotFound { path } if path == "gone.html"));

    fs::create_dir(dir.path().join("folder")).unwrap();
    let error =
        Template::from_path_with_resolver("folder", &resolver, Options::default()).unwrap_err();
    assert!(matches!(error, TemplateError::NotFound { .. }));
}

#[test]
fn empty_clause_runs_without_items() {
    let template = Template::new("{% for i in items %}{{ i }}{% empty %}none{% endfor %}").unwrap();
    assert_eq!(template.render(&context(json!({"items": []}))).unwrap(), "none");
    assert_eq!(template.render(&context(json!({"items": [1, 2]}))).unwrap(), "12");
}

#[test]
fn control_flow_and_statements() {
    let source = "\
{% exec total = 0 %}
{% for name, price in prices.items() %}
{% if price > 10 %}
{{ name.upper() }} is expensive
{% elif price == 0 %}
{{ name }} is free
{% else %}
{{ name }} costs {{ price }}
{% endif %}
{% exec total += price %}
{% endfor %}
total {{ total }}
";
    let context = context(json!({"prices": {"apple": 3, "beer": 0, "cake": 12}}));
    assert_eq!(
        render_string(source, &context, Options::default(), None).unwrap(),
        "apple costs 3\nbeer is free\nCAKE is expensive\ntotal 15\n"
    );
}

#[test]
fn whitespace_control_is_configurable() {
    let source = "<ul>\n  {% for x in xs %}\n  <li>{{ x }}</li>\n  {% endfor %}\n</ul>";
    let context = context(json!({"xs": [1]}));
    assert_eq!(
        render_string(source, &context, Options::default(), None).unwrap(),
        "<ul>\n  <li>1</li>\n</ul>"
    );
    let options = Options {
        trim_blocks: false,
        lstrip_blocks: false,
        ..Options::default()
    };
    assert_eq!(
        render_string(source, &context, options, None).unwrap(),
        "<ul>\n  \n  <li>1</li>\n  \n</ul>"
    );
}

#[test]
fn comments_are_removed() {
    let source = "a{# note #}b{% comment \"why\" %}hidden {{ x }}{% endcomment %}c";
    assert_eq!(
        render_string(source, &Context::new(), Options::default(), None).unwrap(),
        "abc"
    );
}

#[test]
fn language_selects_escaper() {
    let context = context(json!({"v": "<a_b>"}));
    let render = |language| {
        render_string("{{ v }}", &context, Options::with_language(language), None).unwrap()
    };
    assert_eq!(render(Language::Html), "&lt;a&lowbar;b&gt;");
    assert_eq!(render(Language::Xml), "&lt;a_b&gt;");
    assert_eq!(render(Language::Markdown), "\\<a\\_b\\>");
}

#[test]
fn render_errors_propagate() {
    let error = render_string("{{ 1 // 0 }}", &Context::new(), Options::default(), None)
        .unwrap_err();
    assert!(matches!(error, Error::Render(_)));

    let context = Context::new();
    let mut fragments = render_string_iter(
        "ok {{ missing }} never",
        &context,
        Options::default(),
        None,
        None,
    )
    .unwrap();
    assert_eq!(fragments.next().unwrap().unwrap(), "ok ");
    assert!(fragments.next().unwrap().is_err());
    assert!(fragments.next().is_none());
}

#[test]
fn cache_skips_recompilation() {
    let cache = TemplateCache::new();
    let context = context(json!({"n": 2}));
    for _ in 0..3 {
        let text = render_string("{{ n * n }}", &context, Options::default(), Some(&cache));
        assert_eq!(text.unwrap(), "4");
    }
    assert_eq!(cache.len(), 1);

    render_string("{{ n }}", &context, Options::default(), Some(&cache)).unwrap();
    render_string(
        "{{ n }}",
        &context,
        Options::with_language(Language::Xml),
        Some(&cache),
    )
    .unwrap();
    assert_eq!(cache.len(), 3);
}

#[test]
fn templates_render_from_paths() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.txt");
    fs::write(&path, "Hello {{ name }}!").unwrap();
    let path = path.to_string_lossy().to_string();

    let cache = TemplateCache::new();
    let context = context(json!({"name": "disk"}));
    assert_eq!(
        render_template(&path, &context, Options::default(), Some(&cache)).unwrap(),
        "Hello disk!"
    );
    let chunks: Vec<String> = render_template_iter(
        &path,
        &context,
        Options::default(),
        Some(&cache),
        NonZeroUsize::new(4),
    )
    .unwrap()
    .collect::<RenderResult<_>>()
    .unwrap();
    assert_eq!(chunks, vec!["Hell", "o di", "sk!"]);
    assert_eq!(cache.len(), 1);

    let missing = dir.path().join("missing.txt");
    let error = render_template(
        &missing.to_string_lossy(),
        &context,
        Options::default(),
        None,
    )
    .unwrap_err();
    assert!(matches!(error, Error::Template(TemplateError::NotFound { .. })));
}

#[test]
fn templates_render_concurrently() {
    let template = Template::new("{{ who }} {{ n }}").unwrap();
    std::thread::scope(|scope| {
        for n in 0..4 {
            let template = &template;
            scope.spawn(move || {
                let context = Context::new().with("who", "thread").with("n", n);
                assert_eq!(template.render(&context).unwrap(), format!("thread {}", n));
            });
        }
    });
}
