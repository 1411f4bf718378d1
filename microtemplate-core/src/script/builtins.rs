//! Native functions
//!
//! The global `_` object carries `escape`, `unescape` and `each`. Arrays,
//! strings and numbers expose a small set of the usual methods. String
//! positions count characters.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    error::{RenderError, RenderResult},
    html,
    script::{
        interp::{Env, Vm},
        value::{Array, Value, join_array, number_to_string},
    },
};

pub(crate) type NativeFn = fn(&mut Vm, Value, Vec<Value>) -> RenderResult<Value>;

pub(crate) struct Native {
    pub(crate) name: &'static str,
    pub(crate) call: NativeFn,
}

static UNDERSCORE: [Native; 3] = [
    Native { name: "escape", call: underscore_escape },
    Native { name: "unescape", call: underscore_unescape },
    Native { name: "each", call: underscore_each },
];

static ARRAY_METHODS: [Native; 9] = [
    Native { name: "concat", call: array_concat },
    Native { name: "filter", call: array_filter },
    Native { name: "forEach", call: array_for_each },
    Native { name: "includes", call: array_includes },
    Native { name: "indexOf", call: array_index_of },
    Native { name: "join", call: array_join },
    Native { name: "map", call: array_map },
    Native { name: "push", call: array_push },
    Native { name: "slice", call: array_slice },
];

static STRING_METHODS: [Native; 11] = [
    Native { name: "endsWith", call: string_ends_with },
    Native { name: "includes", call: string_includes },
    Native { name: "indexOf", call: string_index_of },
    Native { name: "replace", call: string_replace },
    Native { name: "slice", call: string_slice },
    Native { name: "split", call: string_split },
    Native { name: "startsWith", call: string_starts_with },
    Native { name: "toLowerCase", call: string_to_lower_case },
    Native { name: "toString", call: string_to_string },
    Native { name: "toUpperCase", call: string_to_upper_case },
    Native { name: "trim", call: string_trim },
];

static NUMBER_METHODS: [Native; 2] = [
    Native { name: "toFixed", call: number_to_fixed },
    Native { name: "toString", call: number_to_string_method },
];

static FUNCTION_METHODS: [Native; 1] = [Native { name: "call", call: function_call }];

fn find(methods: &'static [Native], name: &str) -> Option<&'static Native> {
    methods.iter().find(|native| native.name == name)
}

pub(crate) fn array_method(name: &str) -> Option<&'static Native> {
    find(&ARRAY_METHODS, name)
}

pub(crate) fn string_method(name: &str) -> Option<&'static Native> {
    find(&STRING_METHODS, name)
}

pub(crate) fn number_method(name: &str) -> Option<&'static Native> {
    find(&NUMBER_METHODS, name)
}

pub(crate) fn function_method(name: &str) -> Option<&'static Native> {
    find(&FUNCTION_METHODS, name)
}

fn namespace(natives: &'static [Native]) -> Value {
    Value::object(
        natives
            .iter()
            .map(|native| (native.name.to_string(), Value::Native(native)))
            .collect(),
    )
}

/// Binds the global names every render starts with
pub(crate) fn install(env: &Env) {
    env.declare("_".into(), namespace(&UNDERSCORE));
    let array: IndexMap<String, Value> = [("prototype".to_string(), namespace(&ARRAY_METHODS))].into();
    env.declare("Array".into(), Value::object(array));
    env.declare("undefined".into(), Value::Undefined);
    env.declare("NaN".into(), Value::Number(f64::NAN));
    env.declare("Infinity".into(), Value::Number(f64::INFINITY));
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn callback(args: &[Value]) -> RenderResult<Value> {
    let callback = arg(args, 0);
    if callback.is_callable() {
        Ok(callback)
    } else {
        Err(RenderError::Type(format!(
            "{} is not a function",
            callback.to_js_string()
        )))
    }
}

fn this_array(this: &Value, method: &str) -> RenderResult<Array> {
    match this {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(RenderError::Type(format!(
            "Array.prototype.{method} called on {}",
            this.type_of()
        ))),
    }
}

fn this_string(this: &Value) -> Rc<String> {
    match this {
        Value::String(text) => text.clone(),
        other => Rc::new(other.to_js_string()),
    }
}

/// Resolves a possibly negative position against `len`
fn relative(position: &Value, len: usize, default: usize) -> usize {
    if matches!(position, Value::Undefined) {
        return default;
    }
    let position = position.to_number();
    if position.is_nan() {
        0
    } else if position < 0.0 {
        (len as f64 + position.trunc()).max(0.0) as usize
    } else {
        position.trunc().min(len as f64) as usize
    }
}

// _

fn underscore_escape(_vm: &mut Vm, _this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let value = arg(&args, 0);
    if value.is_nullish() {
        return Ok(Value::string(""));
    }
    Ok(Value::string(html::escape(&value.to_js_string())))
}

fn underscore_unescape(_vm: &mut Vm, _this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let value = arg(&args, 0);
    if value.is_nullish() {
        return Ok(Value::string(""));
    }
    Ok(Value::string(html::unescape(&value.to_js_string())))
}

/// `_.each(list, iteratee, context)` over array elements or object properties
fn underscore_each(vm: &mut Vm, _this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let list = arg(&args, 0);
    let iteratee = callback(&args[1.min(args.len())..])?;
    let context = arg(&args, 2);
    match &list {
        Value::Array(items) => {
            let items = items.borrow().clone();
            for (index, item) in items.into_iter().enumerate() {
                vm.call(&iteratee, context.clone(), vec![item, Value::Number(index as f64), list.clone()])?;
            }
        }
        Value::Object(entries) => {
            let entries: Vec<(String, Value)> = entries
                .borrow()
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            for (key, value) in entries {
                vm.call(&iteratee, context.clone(), vec![value, Value::string(key), list.clone()])?;
            }
        }
        _ => {}
    }
    Ok(list)
}

// Array.prototype

fn array_concat(_vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let mut items = this_array(&this, "concat")?.borrow().clone();
    for arg in args {
        match arg {
            Value::Array(more) => items.extend(more.borrow().iter().cloned()),
            other => items.push(other),
        }
    }
    Ok(Value::array(items))
}

fn array_filter(vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let callback = callback(&args)?;
    let items = this_array(&this, "filter")?.borrow().clone();
    let mut kept = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        let keep = vm.call(&callback, Value::Undefined, vec![item.clone(), Value::Number(index as f64), this.clone()])?;
        if keep.truthy() {
            kept.push(item);
        }
    }
    Ok(Value::array(kept))
}

fn array_for_each(vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let callback = callback(&args)?;
    let items = this_array(&this, "forEach")?.borrow().clone();
    for (index, item) in items.into_iter().enumerate() {
        vm.call(&callback, Value::Undefined, vec![item, Value::Number(index as f64), this.clone()])?;
    }
    Ok(Value::Undefined)
}

fn array_includes(_vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let needle = arg(&args, 0);
    let items = this_array(&this, "includes")?;
    let found = items.borrow().iter().any(|item| {
        item.strict_equals(&needle)
            || matches!((item, &needle), (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan())
    });
    Ok(Value::Bool(found))
}

fn array_index_of(_vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let needle = arg(&args, 0);
    let items = this_array(&this, "indexOf")?;
    let position = items.borrow().iter().position(|item| item.strict_equals(&needle));
    Ok(Value::Number(position.map_or(-1.0, |index| index as f64)))
}

fn array_join(_vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let separator = match arg(&args, 0) {
        Value::Undefined => ",".to_string(),
        other => other.to_js_string(),
    };
    let items = this_array(&this, "join")?;
    Ok(Value::string(join_array(&items, &separator)))
}

fn array_map(vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let callback = callback(&args)?;
    let items = this_array(&this, "map")?.borrow().clone();
    let mut mapped = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        mapped.push(vm.call(&callback, Value::Undefined, vec![item, Value::Number(index as f64), this.clone()])?);
    }
    Ok(Value::array(mapped))
}

fn array_push(_vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let items = this_array(&this, "push")?;
    let mut items = items.borrow_mut();
    items.extend(args);
    Ok(Value::Number(items.len() as f64))
}

fn array_slice(_vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let items = this_array(&this, "slice")?;
    let items = items.borrow();
    let start = relative(&arg(&args, 0), items.len(), 0);
    let end = relative(&arg(&args, 1), items.len(), items.len());
    Ok(Value::array(items.get(start..end.max(start)).unwrap_or_default().to_vec()))
}

// String.prototype

fn string_ends_with(_vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let text = this_string(&this);
    Ok(Value::Bool(text.ends_with(arg(&args, 0).to_js_string().as_str())))
}

fn string_includes(_vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let text = this_string(&this);
    Ok(Value::Bool(text.contains(arg(&args, 0).to_js_string().as_str())))
}

fn string_index_of(_vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let text = this_string(&this);
    let needle = arg(&args, 0).to_js_string();
    let position = text
        .find(needle.as_str())
        .map_or(-1.0, |byte| text[..byte].chars().count() as f64);
    Ok(Value::Number(position))
}

/// Replaces the first occurrence of a plain string
fn string_replace(vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let text = this_string(&this);
    let pattern = arg(&args, 0).to_js_string();
    let Some(byte) = text.find(pattern.as_str()) else {
        return Ok(Value::String(text));
    };
    let replacement = match arg(&args, 1) {
        function if function.is_callable() => vm
            .call(&function, Value::Undefined, vec![Value::string(pattern.as_str())])?
            .to_js_string(),
        other => other.to_js_string(),
    };
    let mut replaced = String::with_capacity(text.len() + replacement.len());
    replaced.push_str(&text[..byte]);
    replaced.push_str(&replacement);
    replaced.push_str(&text[byte + pattern.len()..]);
    Ok(Value::string(replaced))
}

fn string_slice(_vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let chars: Vec<char> = this_string(&this).chars().collect();
    let start = relative(&arg(&args, 0), chars.len(), 0);
    let end = relative(&arg(&args, 1), chars.len(), chars.len());
    let sliced: String = chars.get(start..end.max(start)).unwrap_or_default().iter().collect();
    Ok(Value::string(sliced))
}

fn string_split(_vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let text = this_string(&this);
    let parts: Vec<Value> = match arg(&args, 0) {
        Value::Undefined => vec![Value::String(text)],
        separator => {
            let separator = separator.to_js_string();
            if separator.is_empty() {
                text.chars().map(Value::string).collect()
            } else {
                text.split(separator.as_str()).map(Value::string).collect()
            }
        }
    };
    Ok(Value::array(parts))
}

fn string_starts_with(_vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let text = this_string(&this);
    Ok(Value::Bool(text.starts_with(arg(&args, 0).to_js_string().as_str())))
}

fn string_to_lower_case(_vm: &mut Vm, this: Value, _args: Vec<Value>) -> RenderResult<Value> {
    Ok(Value::string(this_string(&this).to_lowercase()))
}

fn string_to_string(_vm: &mut Vm, this: Value, _args: Vec<Value>) -> RenderResult<Value> {
    Ok(Value::String(this_string(&this)))
}

fn string_to_upper_case(_vm: &mut Vm, this: Value, _args: Vec<Value>) -> RenderResult<Value> {
    Ok(Value::string(this_string(&this).to_uppercase()))
}

fn string_trim(_vm: &mut Vm, this: Value, _args: Vec<Value>) -> RenderResult<Value> {
    Ok(Value::string(this_string(&this).trim()))
}

// Function.prototype

/// `f.call(receiver, ...args)`
fn function_call(vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let mut args = args.into_iter();
    let receiver = args.next().unwrap_or_default();
    vm.call(&this, receiver, args.collect())
}

// Number.prototype

fn number_to_fixed(_vm: &mut Vm, this: Value, args: Vec<Value>) -> RenderResult<Value> {
    let n = this.to_number();
    let digits = match arg(&args, 0) {
        Value::Undefined => 0.0,
        digits => digits.to_number().trunc(),
    };
    if !(0.0..=100.0).contains(&digits) {
        return Err(RenderError::Type(
            "toFixed() digits argument must be between 0 and 100".to_string(),
        ));
    }
    if !n.is_finite() || n.abs() >= 1e21 {
        return Ok(Value::string(number_to_string(n)));
    }
    Ok(Value::string(to_fixed(n, digits as usize)))
}

/// Rounds to `digits` decimals; an exact half rounds away from zero
fn to_fixed(n: f64, digits: usize) -> String {
    // a finite f64 has at most 1074 fractional digits
    let exact = format!("{:.1074}", n.abs());
    let point = exact.find('.').unwrap_or(exact.len());
    let cut = (point + 1 + digits).min(exact.len());
    let round_up = exact.as_bytes().get(cut).is_some_and(|digit| *digit >= b'5');
    let mut kept = exact[..cut].trim_end_matches('.').as_bytes().to_vec();
    if round_up {
        let mut carry = true;
        for digit in kept.iter_mut().rev() {
            match *digit {
                b'.' => continue,
                b'9' => *digit = b'0',
                _ => {
                    *digit += 1;
                    carry = false;
                    break;
                }
            }
        }
        if carry {
            kept.insert(0, b'1');
        }
    }
    let sign = if n < 0.0 { "-" } else { "" };
    sign.chars().chain(kept.into_iter().map(char::from)).collect()
}

fn number_to_string_method(_vm: &mut Vm, this: Value, _args: Vec<Value>) -> RenderResult<Value> {
    Ok(Value::string(number_to_string(this.to_number())))
}
