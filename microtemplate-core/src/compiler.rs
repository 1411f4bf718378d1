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

//! Template compilation
//!
//! # Compilation Process
//!
//! 1. Merging the caller's settings onto the defaults
//! 2. Tokenizing the template with the combined delimiter pattern
//! 3. Generating the source of the render function
//! 4. Parsing that source into a [`Template`]
//!
//! # Examples
//!
//! ```rust
//! use microtemplate_core::{Settings, compile, compile_with};
//! use serde_json::json;
//!
//! let hello = compile("Hello <%= name %>!", None).unwrap();
//! assert_eq!(hello.render_json(&json!({"name": "Eve"})).unwrap(), "Hello Eve!");
//!
//! let mustache = Settings::new().with_interpolate(r"\{\{([\s\S]+?)\}\}");
//! let hello = compile_with("Hello {{ name }}!", &mustache).unwrap();
//! assert_eq!(hello.render_json(&json!({"name": "Eve"})).unwrap(), "Hello Eve!");
//! ```

use tracing::debug;

use crate::{
    codegen::generate,
    error::Result,
    settings::{Settings, template_settings},
    template::Template,
    tokenizer::Matcher,
};

/// Compiles a template, filling unset fields of `overrides` from the
/// process-wide defaults
pub fn compile(text: &str, overrides: Option<&Settings>) -> Result<Template> {
    let settings = overrides
        .cloned()
        .unwrap_or_default()
        .defaults(&template_settings());
    compile_with(text, &settings)
}

/// Compiles a template with exactly these settings; unset delimiters never match
#[tracing::instrument(level = "debug", skip_all)]
pub fn compile_with(text: &str, settings: &Settings) -> Result<Template> {
    settings.validate_variable()?;
    let tokens = Matcher::new(settings)?.tokenize(text);
    debug!(tokens = tokens.len(), "tokenized template");
    let source = generate(&tokens, settings.scope()).source();
    debug!(source_len = source.len(), "generated template source");
    Template::from_source(&source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{CompileError, RenderError},
        escape::ESCAPES,
        tokenizer::DirectiveKind,
    };
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn classic(text: &str) -> Template {
        compile_with(text, &Settings::classic()).unwrap()
    }

    fn render(text: &str, data: serde_json::Value) -> String {
        classic(text).render_json(&data).unwrap()
    }

    #[test]
    fn message_count_example() {
        assert_eq!(
            render(
                "Hello <%- name %>, you have <%= count %> new <% if (count === 1) { %>message<% } else { %>messages<% } %>.",
                json!({"name": "<Eve>", "count": 1})
            ),
            "Hello &lt;Eve&gt;, you have 1 new message."
        );
    }

    #[test]
    fn directive_free_text_is_unchanged() {
        let text = "plain 'quoted' \\ back\r\nslash \u{2028}\u{2029} done";
        assert_eq!(render(text, json!({})), text);
    }

    #[test]
    fn escape_and_interpolate() {
        assert_eq!(render("<%- v %>|<%= v %>", json!({"v": "<b>"})), "&lt;b&gt;|<b>");
        assert_eq!(render("<%- v %>", json!({"v": "&\"'`"})), "&amp;&quot;&#x27;&#x60;");
    }

    #[test]
    fn null_and_undefined_render_empty() {
        let data = json!({"n": null});
        assert_eq!(render("[<%- n %>][<%= n %>][<%- obj.u %>][<%= obj.u %>]", data), "[][][][]");
        assert_eq!(render("<%= zero %><%= no %><%= empty %>", json!({"zero": 0, "no": false, "empty": ""})), "0false");
    }

    #[test]
    fn blank_expressions_render_empty() {
        assert_eq!(render("a<%=   %>b<%- \n %>c", json!({})), "abc");
    }

    #[test]
    fn long_templates() {
        let text = "<li><%= a %></li>\n".repeat(5000);
        assert_eq!(render(&text, json!({"a": 1})), "<li>1</li>\n".repeat(5000));
        let text = "<%- a %>,".repeat(5000);
        assert_eq!(render(&text, json!({"a": "<"})), "&lt;,".repeat(5000));
    }

    #[test]
    fn self_containing_arrays_render() {
        assert_eq!(render("<% var a = [1]; a.push(a); %><%= a %>|<%= a.join('-') %>", json!({})), "1,|1-");
    }

    #[test]
    fn print_repeats_fragments() {
        assert_eq!(
            render("<% for (var i = 0; i < n; i++) { print('a', i, ';') } %>", json!({"n": 3})),
            "a0;a1;a2;"
        );
    }

    #[test]
    fn evaluate_blocks_wrap_literals() {
        assert_eq!(
            render("<% _.each(people, function(p) { %><li><%- p %></li><% }) %>", json!({"people": ["a", "<b>"]})),
            "<li>a</li><li>&lt;b&gt;</li>"
        );
        assert_eq!(
            render("<% for (const p of people) { %>[<%= p.name %>]<% } %>", json!({"people": [{"name": "x"}, {"name": "y"}]})),
            "[x][y]"
        );
    }

    #[test]
    fn explicit_variable_disables_flattening() {
        let settings = Settings::classic().with_variable("data");
        let named = compile_with("<%= data.name %>", &settings).unwrap();
        assert_eq!(named.variable(), "data");
        assert_eq!(named.render_json(&json!({"name": "x"})).unwrap(), "x");
        assert!(!named.source().contains("with("));

        let bare = compile_with("<%= name %>", &settings).unwrap();
        assert_eq!(
            bare.render_json(&json!({"name": "x"})),
            Err(RenderError::Reference("name".to_string()))
        );
        assert_eq!(classic("<%= name %>").render_json(&json!({"name": "x"})).unwrap(), "x");
    }

    #[test]
    fn flattened_data_is_also_obj() {
        assert_eq!(render("<%= obj.a %><%= a %>", json!({"a": 1})), "11");
        assert_eq!(classic("x<%= 1 %>").render_json(&json!(null)).unwrap(), "x1");
    }

    #[test]
    fn custom_delimiters() {
        let settings = Settings::new()
            .with_interpolate(r"\{\{([\s\S]+?)\}\}")
            .with_evaluate(r"\{%([\s\S]+?)%\}");
        let template = compile_with("{% if (ok) { %}{{ a }}{% } %}<%= a %>", &settings).unwrap();
        assert_eq!(template.render_json(&json!({"ok": true, "a": 1})).unwrap(), "1<%= a %>");
    }

    #[test]
    fn disabled_delimiter_overrides_defaults() {
        let overrides = Settings::new().without(DirectiveKind::Evaluate);
        let settings = overrides.defaults(&Settings::classic());
        let template = compile_with("<% x %><%= 1 %>", &settings).unwrap();
        assert_eq!(template.render_json(&json!({})).unwrap(), "<% x %>1");
    }

    #[test]
    fn compile_errors() {
        let err = compile_with("<% if (a) { %>", &Settings::classic()).unwrap_err();
        let source = err.generated_source().unwrap();
        assert!(source.starts_with("function(obj){"), "{source}");
        assert!(matches!(
            compile_with("", &Settings::classic().with_escape("(")),
            Err(CompileError::InvalidPattern { kind: DirectiveKind::Escape, .. })
        ));
        assert!(matches!(
            compile_with("", &Settings::classic().with_variable("a b")),
            Err(CompileError::InvalidVariable(_))
        ));
    }

    #[test]
    fn render_errors_leave_no_output() {
        let template = classic("before <% throw 'stop' %> after");
        assert_eq!(template.render_json(&json!({})), Err(RenderError::Thrown("stop".to_string())));
    }

    #[test]
    fn precompiled_source_round_trips() {
        let template = classic("<% var n = items.length %><%= n %> item<%= n == 1 ? '' : 's' %>");
        let rebuilt = Template::from_source(template.source()).unwrap();
        let data = json!({"items": [1, 2]});
        assert_eq!(rebuilt.render_json(&data).unwrap(), template.render_json(&data).unwrap());
        assert_eq!(rebuilt.render_json(&data).unwrap(), "2 items");
    }

    #[test]
    fn compile_merges_overrides_with_defaults() {
        let _store = crate::settings::STORE_LOCK.lock();
        let overrides = Settings::new().with_variable("it");
        let template = compile("<%= it.a %>", Some(&overrides)).unwrap();
        assert_eq!(template.render_json(&json!({"a": 5})).unwrap(), "5");
    }

    fn literal_text() -> impl Strategy<Value = String> {
        let special: Vec<&'static str> = ESCAPES.iter().map(|(raw, _)| *raw).collect();
        prop::collection::vec(
            prop_oneof![
                "[a-zA-Z0-9 \"&<>%=-]{0,8}",
                prop::sample::select(special).prop_map(str::to_string),
            ],
            0..12,
        )
        .prop_map(|parts| parts.concat())
        .prop_filter("no directive openers", |text| !text.contains("<%"))
    }

    proptest! {
        #[test]
        fn literal_text_round_trips(text in literal_text()) {
            prop_assert_eq!(classic(&text).render_json(&json!({})).unwrap(), text);
        }

        #[test]
        fn source_is_stable(text in literal_text(), name in "[a-z]{1,6}") {
            let template = format!("{text}<%= v_{name} %>{text}");
            let first = compile_with(&template, &Settings::classic()).unwrap();
            let second = compile_with(&template, &Settings::classic()).unwrap();
            prop_assert_eq!(first.source(), second.source());
        }
    }
}
