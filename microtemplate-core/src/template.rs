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

use std::{fmt, sync::Arc};

use serde::Serialize;
use tracing::trace;

use crate::{
    error::{RenderResult, Result},
    script::{self, ast::FunctionExpr},
};

/// A compiled template
///
/// Holds the generated source and its parsed form. Cloning is cheap and
/// rendering takes `&self`, so one template can serve many threads at once.
///
/// ```rust
/// use microtemplate_core::{Settings, compile_with};
/// use serde_json::json;
///
/// let template = compile_with("<%- a %> & <%= a %>", &Settings::classic()).unwrap();
/// assert_eq!(template.render_json(&json!({"a": "<i>"})).unwrap(), "&lt;i&gt; & <i>");
/// ```
#[derive(Clone)]
pub struct Template {
    source: Arc<str>,
    function: Arc<FunctionExpr>,
}

impl Template {
    /// Rebuilds a template from the text returned by [`Template::source`]
    pub fn from_source(source: &str) -> Result<Self> {
        let function = script::link(source)?;
        Ok(Self {
            source: Arc::from(source),
            function,
        })
    }

    /// The generated function, `function(<variable>){...}`
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Name the render data is bound to inside the template
    pub fn variable(&self) -> &str {
        self.function.params.first().map_or("", |param| param.as_ref())
    }

    /// Renders with any serializable value as the data
    pub fn render<T: Serialize + ?Sized>(&self, data: &T) -> RenderResult<String> {
        self.render_json(&serde_json::to_value(data)?)
    }

    pub fn render_json(&self, data: &serde_json::Value) -> RenderResult<String> {
        let output = script::run(&self.function, data);
        trace!(ok = output.is_ok(), "rendered template");
        output
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("variable", &self.variable())
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::CompileError, error::RenderError};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn templates_are_shareable() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<Template>();
    }

    #[test]
    fn from_source_renders() {
        let template = Template::from_source(
            "function(data){\nvar __p='';\n__p+=data.a+data.b;\nreturn __p;\n}",
        )
        .unwrap();
        assert_eq!(template.variable(), "data");
        assert_eq!(template.render_json(&json!({"a": 1, "b": 2})).unwrap(), "3");
    }

    #[test]
    fn render_serializes_data() {
        #[derive(Serialize)]
        struct Person<'a> {
            name: &'a str,
            tags: Vec<&'a str>,
        }
        let template = Template::from_source("function(p){ return p.name + ':' + p.tags.join('/') }").unwrap();
        let person = Person { name: "ann", tags: vec!["a", "b"] };
        assert_eq!(template.render(&person).unwrap(), "ann:a/b");
    }

    #[test]
    fn syntax_errors_carry_the_source() {
        let source = "function(obj){ return ( }";
        let err = Template::from_source(source).unwrap_err();
        assert_eq!(err.generated_source(), Some(source));
        assert!(matches!(err, CompileError::Syntax { .. }));
    }

    #[test]
    fn renders_concurrently() {
        let template = Template::from_source("function(d){ var s = ''; for (var i = 0; i < d.n; i++) s += i; return s }").unwrap();
        std::thread::scope(|scope| {
            for n in 0..4 {
                let template = &template;
                scope.spawn(move || {
                    let expected: String = (0..n).map(|i| i.to_string()).collect();
                    assert_eq!(template.render_json(&json!({"n": n})).unwrap(), expected);
                });
            }
        });
    }

    #[test]
    fn render_errors_propagate() {
        let template = Template::from_source("function(d){ return d.missing.field }").unwrap();
        assert!(matches!(template.render_json(&json!({})), Err(RenderError::Type(_))));
    }
}
