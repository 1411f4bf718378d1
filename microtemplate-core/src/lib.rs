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

//! Micro-template compiler
//!
//! Compiles text with embedded directives into a reusable [`Template`]:
//!
//! - `<%- expr %>` writes the value of `expr`, HTML-escaped
//! - `<%= expr %>` writes the value of `expr` as is
//! - `<% code %>` runs `code`, which may open and close blocks around text
//!
//! `null` and `undefined` write nothing. The delimiters are regular
//! expressions and can be replaced per compile or process-wide, see
//! [`Settings`].
//!
//! # Examples
//!
//! ```rust
//! use microtemplate_core::compile;
//! use serde_json::json;
//!
//! let template = compile(
//!     "<ul><% for (const p of people) { %><li><%- p %></li><% } %></ul>",
//!     None,
//! ).unwrap();
//! assert_eq!(
//!     template.render_json(&json!({"people": ["Ann", "<Bo>"]})).unwrap(),
//!     "<ul><li>Ann</li><li>&lt;Bo&gt;</li></ul>"
//! );
//! ```
//!
//! The generated source can be stored and loaded later without compiling the
//! template text again:
//!
//! ```rust
//! use microtemplate_core::{Template, compile};
//! use serde_json::json;
//!
//! let source = compile("Hi <%= name %>", None).unwrap().source().to_string();
//! let template = Template::from_source(&source).unwrap();
//! assert_eq!(template.render_json(&json!({"name": "Al"})).unwrap(), "Hi Al");
//! ```

pub mod codegen;
pub mod compiler;
pub mod error;
pub mod escape;
pub mod html;
mod script;
pub mod settings;
pub mod template;
pub mod tokenizer;

pub use compiler::{compile, compile_with};
pub use error::{CompileError, RenderError};
pub use settings::{
    Delimiter, Scope, Settings, reset_template_settings, set_template_settings,
    template_settings, update_template_settings,
};
pub use template::Template;
pub use tokenizer::{DirectiveKind, Token};
