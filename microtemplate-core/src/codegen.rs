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

//! Source generation
//!
//! Turns a token stream into the text of a script function that rebuilds the
//! template output by string concatenation. The function for
//! `Hi <%- name %>!` is:
//!
//! ```text
//! function(obj){
//! var __t,__p='',__j=Array.prototype.join,print=function(){__p+=__j.call(arguments,'');};
//! with(obj||{}){
//! __p+='Hi '+
//! ((__t=( name ))==null?'':_.escape(__t))+
//! '!';
//! }
//! return __p;
//! }
//! ```
//!
//! Literal text is written inside single-quoted string literals, so it goes
//! through [`escape_literal`] first. Evaluate directives close the current
//! `__p+=` statement and are copied verbatim, which lets them open and close
//! blocks around the literal text that follows.

use crate::{escape::escape_literal, settings::Scope, tokenizer::Token};

const PREAMBLE: &str = "var __t,__p='',__j=Array.prototype.join,print=function(){__p+=__j.call(arguments,'');};\n";

/// The generated function, parameter and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceProgram {
    param: String,
    body: String,
}

impl SourceProgram {
    /// Name of the parameter the render data is passed as
    pub fn param(&self) -> &str {
        &self.param
    }

    /// Statements of the function body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The whole function as `function(<param>){...}`
    pub fn source(&self) -> String {
        format!("function({}){{\n{}}}", self.param, self.body)
    }
}

/// Blank expressions evaluate to `undefined` and render nothing
fn expression(expr: &str) -> &str {
    if expr.trim().is_empty() { "undefined" } else { expr }
}

/// Generates the render function for a token stream
pub fn generate(tokens: &[Token<'_>], scope: Scope<'_>) -> SourceProgram {
    let mut code = String::from("__p+='");
    for token in tokens {
        match token {
            Token::Literal(text) => code.push_str(&escape_literal(text)),
            Token::Escape(expr) => {
                code.push_str("'+\n((__t=(");
                code.push_str(expression(expr));
                code.push_str("))==null?'':_.escape(__t))+\n'");
            }
            Token::Interpolate(expr) => {
                code.push_str("'+\n((__t=(");
                code.push_str(expression(expr));
                code.push_str("))==null?'':__t)+\n'");
            }
            Token::Evaluate(statements) => {
                code.push_str("';\n");
                code.push_str(statements);
                code.push_str("\n__p+='");
            }
        }
    }
    code.push_str("';\n");

    let param = scope.param().to_string();
    let mut body = String::with_capacity(PREAMBLE.len() + code.len() + 32);
    body.push_str(PREAMBLE);
    match scope {
        Scope::Flatten => {
            body.push_str("with(");
            body.push_str(&param);
            body.push_str("||{}){\n");
            body.push_str(&code);
            body.push_str("}\n");
        }
        Scope::Named(_) => body.push_str(&code),
    }
    body.push_str("return __p;\n");
    SourceProgram { param, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flattened_scope_wraps_body() {
        let program = generate(
            &[Token::Literal("Hi "), Token::Escape(" name "), Token::Literal("!")],
            Scope::Flatten,
        );
        assert_eq!(
            program.source(),
            "function(obj){\n\
             var __t,__p='',__j=Array.prototype.join,print=function(){__p+=__j.call(arguments,'');};\n\
             with(obj||{}){\n\
             __p+='Hi '+\n\
             ((__t=( name ))==null?'':_.escape(__t))+\n\
             '!';\n\
             }\n\
             return __p;\n\
             }"
        );
    }

    #[test]
    fn named_scope_has_no_wrapper() {
        let program = generate(
            &[Token::Interpolate("data.x"), Token::Evaluate(" if (a) { "), Token::Literal("y")],
            Scope::Named("data"),
        );
        assert_eq!(program.param(), "data");
        assert_eq!(
            program.body(),
            "var __t,__p='',__j=Array.prototype.join,print=function(){__p+=__j.call(arguments,'');};\n\
             __p+=''+\n\
             ((__t=(data.x))==null?'':__t)+\n\
             '';\n if (a) { \n\
             __p+='y';\n\
             return __p;\n"
        );
    }

    #[test]
    fn literal_text_is_escaped() {
        let program = generate(&[Token::Literal("it's\n\\")], Scope::Named("d"));
        assert!(program.body().contains("__p+='it\\'s\\n\\\\';"));
    }

    #[test]
    fn blank_expressions_become_undefined() {
        let program = generate(&[Token::Escape("  "), Token::Interpolate("")], Scope::Named("d"));
        assert_eq!(program.body().matches("(__t=(undefined))").count(), 2);
    }
}
