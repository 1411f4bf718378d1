//! The script dialect generated templates are written in
//!
//! Generated source is parsed once, when a template is compiled, into an
//! immutable syntax tree that any number of threads may share. Each render
//! then evaluates that tree in a fresh [`Vm`](interp::Vm) whose values are
//! dropped when the render returns.
//!
//! The dialect covers what template code needs: `var`, `let` and `const`,
//! `if`, the `for` loop forms, `while`, `with`, functions and arrow functions,
//! the usual operators, array and object literals, and a handful of methods on
//! arrays, strings and numbers. There is no `new`, no classes, no regular
//! expression literals and no exceptions beyond `throw`, which aborts the
//! render.

pub(crate) mod ast;
pub(crate) mod builtins;
pub(crate) mod interp;
pub(crate) mod lexer;
pub(crate) mod parser;
pub(crate) mod stack;
pub(crate) mod value;

use std::{rc::Rc, sync::Arc};

use tracing::trace;

use crate::error::{RenderResult, Result};
use ast::FunctionExpr;
use interp::{Closure, Vm};
use parser::Parser;
use value::Value;

/// Parses the source of a one-parameter function such as `function(obj){...}`
pub(crate) fn link(source: &str) -> Result<Arc<FunctionExpr>> {
    let function = Parser::new(source)?.template_function()?;
    trace!(statements = function.body.len(), "parsed template function");
    Ok(function)
}

/// Calls a parsed template function with `data` and returns its output
pub(crate) fn run(function: &Arc<FunctionExpr>, data: &serde_json::Value) -> RenderResult<String> {
    let mut vm = Vm::new();
    let closure = Value::Function(Rc::new(Closure {
        function: function.clone(),
        env: vm.global(),
    }));
    let output = vm.call(&closure, Value::Undefined, vec![Value::from_json(data)])?;
    Ok(output.to_js_string())
}
