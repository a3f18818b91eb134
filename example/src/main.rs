use std::num::NonZeroUsize;

use dry_templates::{Context, Options, TemplateCache, render_template};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;


mod templates {
    dry_templates::directory!("templates/");
    dry_templates::file!("single/feed.xml");
    //language=html
    dry_templates::str!("hello_first_last", r#"
        <p>Hello {{ firstname }} {{ lastname }}</p>
    "#);
}

const FEED_CHUNK: NonZeroUsize = NonZeroUsize::new(64).unwrap();

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let context = Context::from_json(json!({
        "title": "Today",
        "links": [{"href": "/", "label": "Home"}, {"href": "/done", "label": "Done"}],
        "todos": [
            {"text": "Water the plants", "done": true},
            {"text": "Fix <blink> tag", "done": false},
        ],
        "firstname": "King",
        "lastname": "Tubby",
    }))?;

    println!("{}", templates::page().render(&context)?);

    // the feed is streamed rather than built up in memory
    for chunk in templates::feed().render_chunks(&context, FEED_CHUNK) {
        print!("{}", chunk?);
    }

    println!("{}", templates::hello_first_last().render(&context)?);

    // compiled at runtime, the second call is served from the cache
    let cache = TemplateCache::new();
    for _ in 0..2 {
        let html = render_template(
            "templates/page.html",
            &context,
            Options::default(),
            Some(&cache),
        )?;
        info!(bytes = html.len(), cached = cache.len(), "rendered page at runtime");
    }

    Ok(())
}
