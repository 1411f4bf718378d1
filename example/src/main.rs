use std::sync::Once;

use serde::Serialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[cfg(test)]
mod test;

mod templates {
    microtemplate::directory!("templates/");
    microtemplate::file!("partials/footer.jst");
    //language=html
    microtemplate::template!("hello_first_last", r#"
        <p>Hello <%- firstname %> <%- lastname %></p>
    "#);
}

#[derive(Serialize)]
struct Todo {
    title: &'static str,
    done: bool,
}

static TRACING: Once = Once::new();

fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    });
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let html = templates::button().render(&json!({"id": 42, "label": "My Todo"}))?;
    println!("{}", html);

    let todos = [
        Todo { title: "Write templates", done: true },
        Todo { title: "Ship <it>", done: false },
    ];
    let html2 = templates::todo_list().render(&json!({ "todos": todos }))?;
    println!("{}", html2);

    let html3 = templates::hello_first_last().render(&json!({"firstname": "King", "lastname": "Tubby"}))?;
    println!("{}", html3);

    let html4 = templates::footer().render(&json!({"year": 2024, "owner": "Tubby & co"}))?;
    println!("{}", html4);

    // templates can also be compiled at runtime, against the process-wide settings
    let runtime = microtemplate::compile("<%= n %> templates rendered", None)?;
    info!(source_len = runtime.source().len(), "compiled runtime template");
    println!("{}", runtime.render(&json!({"n": 4}))?);
    Ok(())
}
