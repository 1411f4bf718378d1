use pretty_assertions::assert_eq;
use serde_json::json;

use crate::templates;

#[test]
fn button_from_directory() {
    assert_eq!(
        templates::button().render(&json!({"id": 7, "label": "<b>Go</b>"})).unwrap(),
        "<button type=\"button\" data-id=\"7\">&lt;b&gt;Go&lt;/b&gt;</button>\n"
    );
}

#[test]
fn todo_list_counts_open_items() {
    let html = templates::todo_list()
        .render(&json!({"todos": [
            {"title": "a", "done": true},
            {"title": "b", "done": false},
        ]}))
        .unwrap();
    assert_eq!(
        html,
        "<ul class=\"todos\">\n  <li class=\"done\">a</li>\n  <li class=\"open\">b</li>\n</ul>\n<p>1 left</p>\n"
    );
}

#[test]
fn footer_from_file() {
    assert_eq!(
        templates::footer().render(&json!({"year": null, "owner": "A&B"})).unwrap(),
        "<footer>A&amp;B</footer>\n"
    );
    assert!(templates::FOOTER_SOURCE.starts_with("function(obj){"));
}

#[test]
fn inline_template() {
    mod template {
        microtemplate::template!("test", r#"<p><%= firstname %> <%= lastname %></p>"#);
    }
    assert_eq!(
        template::test().render(&json!({"firstname": " King", "lastname": "Tubby "})).unwrap(),
        "<p> King Tubby </p>"
    );
    assert_eq!(
        templates::hello_first_last()
            .render(&json!({"firstname": "King", "lastname": "Tubby"}))
            .unwrap()
            .trim(),
        "<p>Hello King Tubby</p>"
    );
}

#[test]
fn missing_data_is_a_render_error() {
    let err = templates::button().render(&json!({"id": 1})).unwrap_err();
    assert_eq!(err.to_string(), "ReferenceError: label is not defined");
}
