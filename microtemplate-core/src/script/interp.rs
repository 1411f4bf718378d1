//! Tree-walking evaluator
//!
//! Scopes form a chain of frames. `var` names live in the nearest function
//! frame, `let` and `const` in the innermost block, and a `with` frame
//! resolves names against the properties of its object before looking
//! further out. Names assigned without any declaration land in the global
//! frame.
//!
//! `break`, `continue` and `return` are recorded on the [`Vm`] and unwind
//! statement execution until a loop or call consumes them.
//!
//! Closures stored in the frames they capture form `Rc` cycles, the generated
//! `print` helper among them. The [`Vm`] remembers every frame it creates and
//! empties the survivors when it is dropped.

use std::{
    cell::RefCell,
    cmp::Ordering,
    mem,
    rc::{Rc, Weak},
    sync::Arc,
};

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::{
    error::{RenderError, RenderResult},
    script::{
        ast::{BinaryOp, DeclKind, Expr, FunctionExpr, LogicalOp, Stmt, UnaryOp},
        builtins,
        stack::ensure_sufficient_stack,
        value::{Object, Value, array_index},
    },
};

/// Nested calls allowed before rendering fails
pub(crate) const MAX_CALL_DEPTH: usize = 64;

/// Longest array an index assignment may grow to
const MAX_ARRAY_LENGTH: usize = 1 << 24;

struct Frame {
    vars: FxHashMap<Arc<str>, Value>,
    /// Set on the frames of `with` statements
    object: Option<Object>,
    /// Set on the frames of non-arrow function calls
    this: Option<Value>,
    parent: Option<Env>,
}

/// A scope and everything enclosing it
#[derive(Clone)]
pub(crate) struct Env(Rc<RefCell<Frame>>);

impl Env {
    fn frame(parent: Option<Env>) -> Self {
        Env(Rc::new(RefCell::new(Frame {
            vars: FxHashMap::default(),
            object: None,
            this: None,
            parent,
        })))
    }

    pub(crate) fn declare(&self, name: Arc<str>, value: Value) {
        self.0.borrow_mut().vars.insert(name, value);
    }

    /// Runs `update` on the nearest binding of `name`
    fn with_slot<R>(&self, name: &str, update: impl FnOnce(&mut Value) -> R) -> Option<R> {
        let mut env = self.clone();
        loop {
            let parent = {
                let mut frame = env.0.borrow_mut();
                if let Some(object) = &frame.object {
                    if let Some(slot) = object.borrow_mut().get_mut(name) {
                        return Some(update(slot));
                    }
                }
                if let Some(slot) = frame.vars.get_mut(name) {
                    return Some(update(slot));
                }
                frame.parent.clone()
            };
            env = parent?;
        }
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<Value> {
        self.with_slot(name, |slot| slot.clone())
    }

    /// Overwrites the nearest binding of `name`, returning false when there is none
    fn assign(&self, name: &str, value: Value) -> bool {
        self.with_slot(name, |slot| *slot = value).is_some()
    }

    fn this(&self) -> Value {
        let mut env = self.clone();
        loop {
            let parent = {
                let frame = env.0.borrow();
                if let Some(this) = &frame.this {
                    return this.clone();
                }
                frame.parent.clone()
            };
            match parent {
                Some(parent) => env = parent,
                None => return Value::Undefined,
            }
        }
    }

    fn root(&self) -> Env {
        let mut env = self.clone();
        loop {
            let parent = env.0.borrow().parent.clone();
            match parent {
                Some(parent) => env = parent,
                None => return env,
            }
        }
    }
}

/// A script function together with the scope it was created in
pub(crate) struct Closure {
    pub(crate) function: Arc<FunctionExpr>,
    pub(crate) env: Env,
}

/// Where an assignment writes, resolved once before the value is computed
enum Place<'e> {
    Name(&'e Arc<str>),
    Property(Value, String),
}

enum Flow {
    Break,
    Continue,
    Return(Value),
}

/// Evaluation state for one render
pub(crate) struct Vm {
    flow: Option<Flow>,
    depth: usize,
    frames: Vec<Weak<RefCell<Frame>>>,
    prune_at: usize,
}

impl Vm {
    pub(crate) fn new() -> Self {
        Self {
            flow: None,
            depth: 0,
            frames: Vec::new(),
            prune_at: 64,
        }
    }

    /// A fresh global scope with the builtins bound
    pub(crate) fn global(&mut self) -> Env {
        let env = Env::frame(None);
        builtins::install(&env);
        self.track(&env);
        env
    }

    fn scope(&mut self, parent: &Env) -> Env {
        let env = Env::frame(Some(parent.clone()));
        self.track(&env);
        env
    }

    fn track(&mut self, env: &Env) {
        if self.frames.len() >= self.prune_at {
            self.frames.retain(|frame| frame.strong_count() > 0);
            self.prune_at = (self.frames.len() * 2).max(64);
        }
        self.frames.push(Rc::downgrade(&env.0));
    }

    pub(crate) fn call(&mut self, callee: &Value, this: Value, args: Vec<Value>) -> RenderResult<Value> {
        match callee {
            Value::Function(closure) => self.call_closure(closure, this, args),
            Value::Native(native) => (native.call)(self, this, args),
            other => Err(RenderError::Type(format!("{} is not a function", other.type_of()))),
        }
    }

    fn call_closure(&mut self, closure: &Closure, this: Value, args: Vec<Value>) -> RenderResult<Value> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RenderError::StackOverflow);
        }
        let function = &closure.function;
        let env = self.scope(&closure.env);
        for name in &function.vars {
            env.declare(name.clone(), Value::Undefined);
        }
        if !function.arrow {
            env.0.borrow_mut().this = Some(this);
            env.declare(Arc::from("arguments"), Value::array(args.clone()));
        }
        let mut args = args.into_iter();
        for param in &function.params {
            env.declare(param.clone(), args.next().unwrap_or_default());
        }

        self.depth += 1;
        let result = self.run_block(&function.body, &env);
        self.depth -= 1;
        let flow = self.flow.take();
        result?;
        Ok(match flow {
            Some(Flow::Return(value)) => value,
            _ => Value::Undefined,
        })
    }

    /// Binds the block's function declarations, then runs its statements
    fn run_block(&mut self, stmts: &[Stmt], env: &Env) -> RenderResult<()> {
        for stmt in stmts {
            if let Stmt::Function(function) = stmt {
                if let Some(name) = &function.name {
                    let closure = Closure {
                        function: function.clone(),
                        env: env.clone(),
                    };
                    env.declare(name.clone(), Value::Function(Rc::new(closure)));
                }
            }
        }
        for stmt in stmts {
            self.exec(stmt, env)?;
            if self.flow.is_some() {
                break;
            }
        }
        Ok(())
    }

    /// Consumes loop control after a loop body ran; true when the loop must stop
    fn loop_exit(&mut self) -> bool {
        match self.flow {
            Some(Flow::Break) => {
                self.flow = None;
                true
            }
            Some(Flow::Continue) => {
                self.flow = None;
                false
            }
            Some(Flow::Return(_)) => true,
            None => false,
        }
    }

    fn assign_name(&mut self, name: &Arc<str>, value: Value, env: &Env) {
        if !env.assign(name, value.clone()) {
            trace!(%name, "implicit global");
            env.root().declare(name.clone(), value);
        }
    }

    /// The scope a loop iteration runs in after binding its variable
    fn bind_loop(&mut self, kind: Option<DeclKind>, name: &Arc<str>, value: Value, env: &Env) -> Env {
        match kind {
            Some(DeclKind::Let | DeclKind::Const) => {
                let scope = self.scope(env);
                scope.declare(name.clone(), value);
                scope
            }
            _ => {
                self.assign_name(name, value, env);
                env.clone()
            }
        }
    }

    fn exec(&mut self, stmt: &Stmt, env: &Env) -> RenderResult<()> {
        ensure_sufficient_stack(|| self.exec_stmt(stmt, env))
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Env) -> RenderResult<()> {
        match stmt {
            Stmt::Declare { kind, decls } => {
                for (name, init) in decls {
                    match (kind, init) {
                        (DeclKind::Var, None) => {}
                        (DeclKind::Var, Some(init)) => {
                            let value = self.eval(init, env)?;
                            self.assign_name(name, value, env);
                        }
                        (_, init) => {
                            let value = match init {
                                Some(init) => self.eval(init, env)?,
                                None => Value::Undefined,
                            };
                            env.declare(name.clone(), value);
                        }
                    }
                }
            }
            Stmt::Function(_) | Stmt::Empty => {}
            Stmt::Expr(expr) => {
                self.eval(expr, env)?;
            }
            Stmt::If { test, then, otherwise } => {
                if self.eval(test, env)?.truthy() {
                    self.exec(then, env)?;
                } else if let Some(otherwise) = otherwise {
                    self.exec(otherwise, env)?;
                }
            }
            Stmt::Block(stmts) => {
                let scope = self.scope(env);
                self.run_block(stmts, &scope)?;
            }
            Stmt::For { init, test, update, body } => {
                let scope = self.scope(env);
                if let Some(init) = init {
                    self.exec(init, &scope)?;
                }
                loop {
                    if let Some(test) = test {
                        if !self.eval(test, &scope)?.truthy() {
                            break;
                        }
                    }
                    self.exec(body, &scope)?;
                    if self.loop_exit() {
                        break;
                    }
                    if let Some(update) = update {
                        self.eval(update, &scope)?;
                    }
                }
            }
            Stmt::ForOf { kind, name, iterable, body } => {
                let items = match self.eval(iterable, env)? {
                    Value::Array(items) => items.borrow().clone(),
                    Value::String(text) => text.chars().map(|c| Value::string(c)).collect(),
                    _ => {
                        return Err(RenderError::Type(format!(
                            "{} is not iterable",
                            iterable.describe()
                        )));
                    }
                };
                for item in items {
                    let scope = self.bind_loop(*kind, name, item, env);
                    self.exec(body, &scope)?;
                    if self.loop_exit() {
                        break;
                    }
                }
            }
            Stmt::ForIn { kind, name, object, body } => {
                let keys: Vec<String> = match self.eval(object, env)? {
                    Value::Object(entries) => entries.borrow().keys().cloned().collect(),
                    Value::Array(items) => (0..items.borrow().len()).map(|i| i.to_string()).collect(),
                    Value::String(text) => (0..text.chars().count()).map(|i| i.to_string()).collect(),
                    _ => Vec::new(),
                };
                for key in keys {
                    let scope = self.bind_loop(*kind, name, Value::string(key), env);
                    self.exec(body, &scope)?;
                    if self.loop_exit() {
                        break;
                    }
                }
            }
            Stmt::While { test, body } => {
                while self.eval(test, env)?.truthy() {
                    self.exec(body, env)?;
                    if self.loop_exit() {
                        break;
                    }
                }
            }
            Stmt::DoWhile { body, test } => loop {
                self.exec(body, env)?;
                if self.loop_exit() || !self.eval(test, env)?.truthy() {
                    break;
                }
            },
            Stmt::With { object, body } => {
                let scope = self.scope(env);
                match self.eval(object, env)? {
                    Value::Object(object) => scope.0.borrow_mut().object = Some(object),
                    Value::Undefined | Value::Null => {
                        return Err(RenderError::Type(
                            "Cannot convert undefined or null to object".to_string(),
                        ));
                    }
                    _ => {}
                }
                self.exec(body, &scope)?;
            }
            Stmt::Break => self.flow = Some(Flow::Break),
            Stmt::Continue => self.flow = Some(Flow::Continue),
            Stmt::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(value, env)?,
                    None => Value::Undefined,
                };
                self.flow = Some(Flow::Return(value));
            }
            Stmt::Throw(value) => {
                let value = self.eval(value, env)?;
                return Err(RenderError::Thrown(value.to_js_string()));
            }
        }
        Ok(())
    }

    pub(crate) fn eval(&mut self, expr: &Expr, env: &Env) -> RenderResult<Value> {
        ensure_sufficient_stack(|| self.eval_expr(expr, env))
    }

    fn eval_expr(&mut self, expr: &Expr, env: &Env) -> RenderResult<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(text) => Ok(Value::string(text.as_ref())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::This => Ok(env.this()),
            Expr::Ident(name) => env
                .lookup(name)
                .ok_or_else(|| RenderError::Reference(name.to_string())),
            Expr::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| self.eval(item, env))
                    .collect::<RenderResult<Vec<_>>>()?;
                Ok(Value::array(items))
            }
            Expr::Object(entries) => {
                let mut object = indexmap::IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    object.insert(key.to_string(), self.eval(value, env)?);
                }
                Ok(Value::object(object))
            }
            Expr::Function(function) => Ok(Value::Function(Rc::new(Closure {
                function: function.clone(),
                env: env.clone(),
            }))),
            Expr::Unary { op, expr } => {
                if let (UnaryOp::TypeOf, Expr::Ident(name)) = (op, expr.as_ref()) {
                    let kind = env.lookup(name).map_or("undefined", |value| value.type_of());
                    return Ok(Value::string(kind));
                }
                let value = self.eval(expr, env)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::string(value.type_of()),
                    UnaryOp::Void => Value::Undefined,
                })
            }
            Expr::Update { increment, prefix, target } => {
                let place = self.place(target, env)?;
                let old = self.read(&place, env)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.write(place, Value::Number(new), env)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary { lhs, rest } => {
                let mut acc = self.eval(lhs, env)?;
                for (op, rhs) in rest {
                    let rhs = self.eval(rhs, env)?;
                    acc = match (op, acc) {
                        // appends in place unless the running string is shared
                        (BinaryOp::Add, Value::String(mut text)) => {
                            rhs.to_primitive().append_to(Rc::make_mut(&mut text));
                            Value::String(text)
                        }
                        (op, acc) => binary(*op, &acc, &rhs)?,
                    };
                }
                Ok(acc)
            }
            Expr::Logical { op, lhs, rhs } => {
                let lhs = self.eval(lhs, env)?;
                let short_circuit = match op {
                    LogicalOp::And => !lhs.truthy(),
                    LogicalOp::Or => lhs.truthy(),
                    LogicalOp::Nullish => !lhs.is_nullish(),
                };
                if short_circuit { Ok(lhs) } else { self.eval(rhs, env) }
            }
            Expr::Conditional { test, then, otherwise } => {
                if self.eval(test, env)?.truthy() {
                    self.eval(then, env)
                } else {
                    self.eval(otherwise, env)
                }
            }
            Expr::Assign { op, target, value } => self.eval_assign(*op, target, value, env),
            Expr::Member { object, property, optional } => {
                let object = self.eval(object, env)?;
                if *optional && object.is_nullish() {
                    return Ok(Value::Undefined);
                }
                get_property(&object, property)
            }
            Expr::Index { object, index, optional } => {
                let object = self.eval(object, env)?;
                if *optional && object.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let key = self.eval(index, env)?.to_js_string();
                get_property(&object, &key)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args, env),
        }
    }

    fn eval_assign(
        &mut self,
        op: Option<BinaryOp>,
        target: &Expr,
        value: &Expr,
        env: &Env,
    ) -> RenderResult<Value> {
        let place = self.place(target, env)?;
        let Some(op) = op else {
            let value = self.eval(value, env)?;
            self.write(place, value.clone(), env)?;
            return Ok(value);
        };
        if let (BinaryOp::Add, Place::Name(name)) = (op, &place) {
            // appends to a string binding in place
            let rhs = self.eval(value, env)?.to_primitive();
            let appended = env.with_slot(name, |slot| {
                let Value::String(text) = slot else {
                    return None;
                };
                rhs.append_to(Rc::make_mut(text));
                Some(Value::String(text.clone()))
            });
            return match appended {
                Some(Some(result)) => Ok(result),
                Some(None) => {
                    let result = self.read(&place, env)?.add(&rhs);
                    self.write(place, result.clone(), env)?;
                    Ok(result)
                }
                None => Err(RenderError::Reference(name.to_string())),
            };
        }
        let current = self.read(&place, env)?;
        let rhs = self.eval(value, env)?;
        let result = binary(op, &current, &rhs)?;
        self.write(place, result.clone(), env)?;
        Ok(result)
    }

    /// Evaluates the object and key of an assignment target
    fn place<'e>(&mut self, target: &'e Expr, env: &Env) -> RenderResult<Place<'e>> {
        match target {
            Expr::Ident(name) => Ok(Place::Name(name)),
            Expr::Member { object, property, .. } => {
                let object = self.eval(object, env)?;
                Ok(Place::Property(object, property.to_string()))
            }
            Expr::Index { object, index, .. } => {
                let object = self.eval(object, env)?;
                let key = self.eval(index, env)?.to_js_string();
                Ok(Place::Property(object, key))
            }
            _ => Err(RenderError::Type(format!(
                "cannot assign to {}",
                target.describe()
            ))),
        }
    }

    fn read(&self, place: &Place<'_>, env: &Env) -> RenderResult<Value> {
        match place {
            Place::Name(name) => env
                .lookup(name)
                .ok_or_else(|| RenderError::Reference(name.to_string())),
            Place::Property(object, key) => get_property(object, key),
        }
    }

    fn write(&mut self, place: Place<'_>, value: Value, env: &Env) -> RenderResult<()> {
        match place {
            Place::Name(name) => {
                self.assign_name(name, value, env);
                Ok(())
            }
            Place::Property(object, key) => set_property(&object, &key, value),
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], env: &Env) -> RenderResult<Value> {
        let (function, this) = match callee {
            Expr::Member { object, property, optional } => {
                let this = self.eval(object, env)?;
                if *optional && this.is_nullish() {
                    return Ok(Value::Undefined);
                }
                (get_property(&this, property)?, this)
            }
            Expr::Index { object, index, optional } => {
                let this = self.eval(object, env)?;
                if *optional && this.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let key = self.eval(index, env)?.to_js_string();
                (get_property(&this, &key)?, this)
            }
            other => (self.eval(other, env)?, Value::Undefined),
        };
        if !function.is_callable() {
            return Err(RenderError::Type(format!(
                "{} is not a function",
                callee.describe()
            )));
        }
        let args = args
            .iter()
            .map(|arg| self.eval(arg, env))
            .collect::<RenderResult<Vec<_>>>()?;
        self.call(&function, this, args)
    }
}

impl Drop for Vm {
    fn drop(&mut self) {
        for frame in mem::take(&mut self.frames) {
            let Some(frame) = frame.upgrade() else {
                continue;
            };
            let (vars, object, this, parent) = {
                let mut frame = frame.borrow_mut();
                (
                    mem::take(&mut frame.vars),
                    frame.object.take(),
                    frame.this.take(),
                    frame.parent.take(),
                )
            };
            drop((vars, object, this, parent));
        }
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> RenderResult<Value> {
    let ordering = || lhs.compare(rhs);
    Ok(match op {
        BinaryOp::Add => lhs.add(rhs),
        BinaryOp::Sub => Value::Number(lhs.to_number() - rhs.to_number()),
        BinaryOp::Mul => Value::Number(lhs.to_number() * rhs.to_number()),
        BinaryOp::Div => Value::Number(lhs.to_number() / rhs.to_number()),
        BinaryOp::Rem => Value::Number(lhs.to_number() % rhs.to_number()),
        BinaryOp::Eq => Value::Bool(lhs.loose_equals(rhs)),
        BinaryOp::NotEq => Value::Bool(!lhs.loose_equals(rhs)),
        BinaryOp::StrictEq => Value::Bool(lhs.strict_equals(rhs)),
        BinaryOp::StrictNotEq => Value::Bool(!lhs.strict_equals(rhs)),
        BinaryOp::Lt => Value::Bool(ordering() == Some(Ordering::Less)),
        BinaryOp::LtEq => Value::Bool(matches!(ordering(), Some(Ordering::Less | Ordering::Equal))),
        BinaryOp::Gt => Value::Bool(ordering() == Some(Ordering::Greater)),
        BinaryOp::GtEq => Value::Bool(matches!(
            ordering(),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::In => {
            let key = lhs.to_js_string();
            match rhs {
                Value::Object(entries) => Value::Bool(entries.borrow().contains_key(&key)),
                Value::Array(items) => Value::Bool(
                    key == "length" || array_index(&key).is_some_and(|i| i < items.borrow().len()),
                ),
                _ => {
                    return Err(RenderError::Type(format!(
                        "Cannot use 'in' operator to search for '{key}' in {}",
                        rhs.to_js_string()
                    )));
                }
            }
        }
    })
}

pub(crate) fn get_property(object: &Value, key: &str) -> RenderResult<Value> {
    Ok(match object {
        Value::Undefined | Value::Null => {
            return Err(RenderError::Type(format!(
                "Cannot read properties of {} (reading '{key}')",
                object.to_js_string()
            )));
        }
        Value::Object(entries) => entries.borrow().get(key).cloned().unwrap_or_default(),
        Value::Array(items) => match (key, array_index(key)) {
            ("length", _) => Value::Number(items.borrow().len() as f64),
            (_, Some(index)) => items.borrow().get(index).cloned().unwrap_or_default(),
            _ => builtins::array_method(key).map_or(Value::Undefined, Value::Native),
        },
        Value::String(text) => match (key, array_index(key)) {
            ("length", _) => Value::Number(text.chars().count() as f64),
            (_, Some(index)) => text.chars().nth(index).map_or(Value::Undefined, Value::string),
            _ => builtins::string_method(key).map_or(Value::Undefined, Value::Native),
        },
        Value::Number(_) => builtins::number_method(key).map_or(Value::Undefined, Value::Native),
        Value::Function(_) | Value::Native(_) => {
            builtins::function_method(key).map_or(Value::Undefined, Value::Native)
        }
        _ => Value::Undefined,
    })
}

fn set_property(object: &Value, key: &str, value: Value) -> RenderResult<()> {
    match object {
        Value::Undefined | Value::Null => {
            return Err(RenderError::Type(format!(
                "Cannot set properties of {} (setting '{key}')",
                object.to_js_string()
            )));
        }
        Value::Object(entries) => {
            entries.borrow_mut().insert(key.to_string(), value);
        }
        Value::Array(items) => {
            let length = match (key, array_index(key)) {
                ("length", _) => {
                    let length = value.to_number();
                    if length < 0.0 || length.fract() != 0.0 || length > MAX_ARRAY_LENGTH as f64 {
                        return Err(RenderError::Type("Invalid array length".to_string()));
                    }
                    items.borrow_mut().resize(length as usize, Value::Undefined);
                    return Ok(());
                }
                (_, Some(index)) => index + 1,
                _ => return Ok(()),
            };
            if length > MAX_ARRAY_LENGTH {
                return Err(RenderError::Type("Invalid array length".to_string()));
            }
            let mut items = items.borrow_mut();
            if items.len() < length {
                items.resize(length, Value::Undefined);
            }
            items[length - 1] = value;
        }
        // writes to primitives are ignored
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::Parser;
    use pretty_assertions::assert_eq;

    /// Runs `body` as a function of `data` and returns its result as a string
    fn run(body: &str, data: serde_json::Value) -> RenderResult<String> {
        let source = format!("function(data){{{body}}}");
        let function = Parser::new(&source).unwrap().template_function().unwrap();
        let mut vm = Vm::new();
        let closure = Value::Function(Rc::new(Closure {
            function,
            env: vm.global(),
        }));
        let result = vm.call(&closure, Value::Undefined, vec![Value::from_json(&data)])?;
        Ok(result.to_js_string())
    }

    fn eval(body: &str) -> String {
        run(body, serde_json::Value::Null).unwrap()
    }

    #[test]
    fn arithmetic_and_strings() {
        assert_eq!(eval("return 1 + 2 * 3"), "7");
        assert_eq!(eval("return '1' + 2"), "12");
        assert_eq!(eval("return 7 % 3 - 10 / 4"), "-1.5");
        assert_eq!(eval("return -'3' + +true"), "-2");
        assert_eq!(eval("return 1 / 0"), "Infinity");
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(eval("return 0 || 'b'"), "b");
        assert_eq!(eval("return 'a' && 'b'"), "b");
        assert_eq!(eval("return 0 ?? 'b'"), "0");
        assert_eq!(eval("return null ?? 'b'"), "b");
    }

    #[test]
    fn var_is_function_scoped() {
        assert_eq!(eval("if (true) { var a = 1 } return a"), "1");
        assert_eq!(eval("var before = typeof later; var later = 1; return before"), "undefined");
        assert_eq!(
            run("{ let a = 1 } return a", serde_json::Value::Null),
            Err(RenderError::Reference("a".to_string()))
        );
    }

    #[test]
    fn loops() {
        assert_eq!(
            eval("var s = ''; for (var i = 0; i < 5; i++) { if (i == 1) continue; if (i == 4) break; s += i } return s"),
            "023"
        );
        assert_eq!(eval("var s = ''; for (const c of 'abc') s += c + '.'; return s"), "a.b.c.");
        assert_eq!(eval("var n = 0; while (n < 10) n += 3; return n"), "12");
        assert_eq!(eval("var n = 0; do { n++ } while (false); return n"), "1");
    }

    #[test]
    fn for_in_visits_keys_in_order() {
        assert_eq!(
            run(
                "var keys = []; for (var k in data) keys.push(k); return keys.join('|')",
                serde_json::json!({"z": 1, "a": 2, "m": 3})
            )
            .unwrap(),
            "z|a|m"
        );
    }

    #[test]
    fn with_resolves_against_object() {
        assert_eq!(
            run("with (data) { name = name.toUpperCase() } return data.name", serde_json::json!({"name": "ann"}))
                .unwrap(),
            "ANN"
        );
        assert_eq!(
            run("with (data) { return missing }", serde_json::json!({})),
            Err(RenderError::Reference("missing".to_string()))
        );
    }

    #[test]
    fn closures_and_recursion() {
        assert_eq!(
            eval("function fact(n) { return n <= 1 ? 1 : n * fact(n - 1) } return fact(5)"),
            "120"
        );
        assert_eq!(
            eval("var counter = function() { var n = 0; return () => ++n }(); counter(); return counter()"),
            "2"
        );
        assert_eq!(eval("var f = function() { return arguments.length }; return f(1, 2, 3)"), "3");
    }

    #[test]
    fn method_calls_bind_this() {
        assert_eq!(
            eval("var o = {n: 2, get: function() { return this.n }}; return o.get()"),
            "2"
        );
    }

    #[test]
    fn unbounded_recursion_fails() {
        assert_eq!(
            run("function f() { return f() } return f()", serde_json::Value::Null),
            Err(RenderError::StackOverflow)
        );
    }

    #[test]
    fn runtime_errors() {
        assert_eq!(
            run("return data.a.b", serde_json::json!({})),
            Err(RenderError::Type("Cannot read properties of undefined (reading 'b')".to_string()))
        );
        assert_eq!(
            run("return data.nope()", serde_json::json!({})),
            Err(RenderError::Type("data.nope is not a function".to_string()))
        );
        assert_eq!(
            run("throw 'bad ' + 1", serde_json::Value::Null),
            Err(RenderError::Thrown("bad 1".to_string()))
        );
        assert_eq!(run("return data?.a?.b", serde_json::Value::Null).unwrap(), "undefined");
    }

    #[test]
    fn string_append_does_not_alias() {
        assert_eq!(eval("var a = 'x'; var b = a; a += 'y'; return a + b"), "xyx");
        assert_eq!(eval("var a = 'x'; a += a; return a"), "xx");
        assert_eq!(eval("var a = 1; a += '2'; return a"), "12");
    }

    #[test]
    fn array_writes() {
        assert_eq!(eval("var a = [1]; a[2] = 3; return a.length + ':' + a"), "3:1,,3");
        assert_eq!(eval("var a = [1, 2, 3]; a.length = 1; return a"), "1");
        assert_eq!(eval("var o = {}; o['k'] = 1; o.k += 1; return o.k"), "2");
    }

    #[test]
    fn assignment_targets_are_evaluated_once() {
        assert_eq!(eval("var a = [0, 0, 0]; var i = 0; a[i++] += 5; return a + '|' + i"), "5,0,0|1");
        assert_eq!(
            eval("var n = 0; var o = {k: 1}; function k() { n++; return 'k' } o[k()]++; o[k()] *= 3; return o.k + ':' + n"),
            "6:2"
        );
    }

    #[test]
    fn deep_nesting() {
        assert_eq!(eval(&format!("return {}true", "!".repeat(2001))), "false");
        assert_eq!(eval(&format!("return {}1{}", "(".repeat(1000), ")".repeat(1000))), "1");
        let sum = format!("var s = ''{}; return s.length", "; s = s + 'ab' + 1".repeat(3000));
        assert_eq!(eval(&sum), "9000");
    }

    #[test]
    fn frames_are_released_after_the_vm() {
        let mut vm = Vm::new();
        let global = vm.global();
        let weak = Rc::downgrade(&global.0);
        let function = Parser::new("function(d){ var f = function() { return f }; return 1 }")
            .unwrap()
            .template_function()
            .unwrap();
        let closure = Value::Function(Rc::new(Closure { function, env: global }));
        vm.call(&closure, Value::Undefined, vec![Value::Null]).unwrap();
        drop(closure);
        drop(vm);
        assert_eq!(weak.strong_count(), 0);
    }

    #[test]
    fn implicit_globals() {
        assert_eq!(eval("function f() { leaked = 5 } f(); return leaked"), "5");
    }
}
