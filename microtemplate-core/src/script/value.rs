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

//! Runtime values
//!
//! Values live for one render call only, so reference types use `Rc` and
//! `RefCell`. Conversions follow the loose rules scripts expect: `+` joins
//! strings, `==` treats `null` and `undefined` as equal, and every value has a
//! string form.

use std::{cell::RefCell, cmp::Ordering, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::script::{builtins::Native, interp::Closure, stack::ensure_sufficient_stack};

pub(crate) type Array = Rc<RefCell<Vec<Value>>>;
pub(crate) type Object = Rc<RefCell<IndexMap<String, Value>>>;

/// Arrays and objects being written out, innermost last
type Open = Vec<*const ()>;

#[derive(Clone, Default)]
pub(crate) enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    /// Shared so that `+=` can append in place when nothing else holds the string
    String(Rc<String>),
    Array(Array),
    Object(Object),
    Function(Rc<Closure>),
    Native(&'static Native),
}

/// Formats a number the way scripts print it: `1`, `1.5`, `1e+21`, `NaN`
pub(crate) fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let formatted = format!("{n:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        };
    }
    if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

/// Parses a canonical array index such as `3`, rejecting `03` or `-1`
pub(crate) fn array_index(key: &str) -> Option<usize> {
    let index = key.parse::<usize>().ok()?;
    (index.to_string() == key).then_some(index)
}

impl Value {
    pub(crate) fn string(text: impl Into<String>) -> Self {
        Value::String(Rc::new(text.into()))
    }

    pub(crate) fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub(crate) fn object(entries: IndexMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(entries)))
    }

    pub(crate) fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::string(s.as_str()),
            serde_json::Value::Array(items) => {
                Value::array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::object(
                map.iter()
                    .map(|(key, value)| (key.clone(), Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    pub(crate) fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub(crate) fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Native(_))
    }

    pub(crate) fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub(crate) fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
        }
    }

    /// Appends the string form of the value to `out`
    pub(crate) fn append_to(&self, out: &mut String) {
        self.write_into(out, &mut Open::new());
    }

    fn write_into(&self, out: &mut String, open: &mut Open) {
        match self {
            Value::Undefined => out.push_str("undefined"),
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) => out.push_str(&number_to_string(*n)),
            Value::String(s) => out.push_str(s),
            Value::Array(items) => join_into(items, ",", out, open),
            Value::Object(_) => out.push_str("[object Object]"),
            Value::Function(_) => out.push_str("function () { [code] }"),
            Value::Native(native) => {
                out.push_str("function ");
                out.push_str(native.name);
                out.push_str("() { [native code] }");
            }
        }
    }

    pub(crate) fn to_js_string(&self) -> String {
        match self {
            Value::String(s) => s.as_ref().clone(),
            _ => {
                let mut out = String::new();
                self.append_to(&mut out);
                out
            }
        }
    }

    pub(crate) fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Array(_) => parse_number(&self.to_js_string()),
            _ => f64::NAN,
        }
    }

    /// Reference types become their string form; primitives are unchanged
    pub(crate) fn to_primitive(&self) -> Value {
        match self {
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Native(_) => {
                Value::string(self.to_js_string())
            }
            _ => self.clone(),
        }
    }

    /// `===`
    pub(crate) fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => std::ptr::eq(*a, *b),
            _ => false,
        }
    }

    /// `==`
    pub(crate) fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::Number(a), Value::String(_)) => *a == other.to_number(),
            (Value::String(_), Value::Number(b)) => self.to_number() == *b,
            (Value::Bool(a), _) => Value::Number(f64::from(u8::from(*a))).loose_equals(other),
            (_, Value::Bool(b)) => self.loose_equals(&Value::Number(f64::from(u8::from(*b)))),
            (
                Value::Array(_) | Value::Object(_),
                Value::String(_) | Value::Number(_),
            ) => self.to_primitive().loose_equals(other),
            (
                Value::String(_) | Value::Number(_),
                Value::Array(_) | Value::Object(_),
            ) => self.loose_equals(&other.to_primitive()),
            _ => self.strict_equals(other),
        }
    }

    /// Ordering used by `<`, `<=`, `>` and `>=`; `None` when either side is `NaN`
    pub(crate) fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self.to_primitive(), other.to_primitive()) {
            (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
            (a, b) => a.to_number().partial_cmp(&b.to_number()),
        }
    }

    /// `+`
    pub(crate) fn add(&self, other: &Value) -> Value {
        let (lhs, rhs) = (self.to_primitive(), other.to_primitive());
        if matches!(lhs, Value::String(_)) || matches!(rhs, Value::String(_)) {
            let mut joined = lhs.to_js_string();
            rhs.append_to(&mut joined);
            Value::string(joined)
        } else {
            Value::Number(lhs.to_number() + rhs.to_number())
        }
    }
}

/// Writes the elements of `items` separated by `separator`
///
/// Missing elements are empty, and so is an array met again while it is
/// still being written.
pub(crate) fn join_array(items: &Array, separator: &str) -> String {
    let mut out = String::new();
    join_into(items, separator, &mut out, &mut Open::new());
    out
}

fn join_into(items: &Array, separator: &str, out: &mut String, open: &mut Open) {
    let id = Rc::as_ptr(items).cast::<()>();
    if open.contains(&id) {
        return;
    }
    open.push(id);
    ensure_sufficient_stack(|| {
        for (i, item) in items.borrow().iter().enumerate() {
            if i > 0 {
                out.push_str(separator);
            }
            if !item.is_nullish() {
                item.write_into(out, open);
            }
        }
    });
    open.pop();
}

fn parse_number(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    match text {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust accepts spellings such as "inf" and "nan" that scripts do not
        _ if text.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => text.parse().unwrap_or(f64::NAN),
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = RefCell::new(Open::new());
        Nested { value: self, open: &open }.fmt(f)
    }
}

/// Debug view of a value that prints `[Circular]` for a container it is already inside
struct Nested<'a> {
    value: &'a Value,
    open: &'a RefCell<Open>,
}

impl Nested<'_> {
    fn child<'a>(&'a self, value: &'a Value) -> Nested<'a> {
        Nested { value, open: self.open }
    }
}

impl fmt::Debug for Nested<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = match self.value {
            Value::String(s) => return write!(f, "{:?}", s.as_str()),
            Value::Array(items) => Rc::as_ptr(items).cast::<()>(),
            Value::Object(entries) => Rc::as_ptr(entries).cast::<()>(),
            other => return f.write_str(&other.to_js_string()),
        };
        if self.open.borrow().contains(&id) {
            return f.write_str("[Circular]");
        }
        self.open.borrow_mut().push(id);
        let result = match self.value {
            Value::Array(items) => f
                .debug_list()
                .entries(items.borrow().iter().map(|item| self.child(item)))
                .finish(),
            Value::Object(entries) => f
                .debug_map()
                .entries(entries.borrow().iter().map(|(key, value)| (key, self.child(value))))
                .finish(),
            _ => Ok(()),
        };
        self.open.borrow_mut().pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn formats_numbers() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(1.5), "1.5");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(123456789012.0), "123456789012");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn string_forms() {
        let data = Value::from_json(&json!([1, null, "a", [2, 3], {"k": true}]));
        assert_eq!(data.to_js_string(), "1,,a,2,3,[object Object]");
        assert_eq!(Value::Undefined.to_js_string(), "undefined");
    }

    #[test]
    fn self_containing_arrays() {
        let list = Value::from_json(&json!([1, [2]]));
        let Value::Array(items) = &list else {
            unreachable!()
        };
        items.borrow_mut().push(list.clone());
        assert_eq!(list.to_js_string(), "1,2,");
        assert_eq!(join_array(items, "-"), "1-2-");
        assert_eq!(format!("{list:?}"), "[1, [2], [Circular]]");

        let object = Value::from_json(&json!({"a": 1}));
        if let Value::Object(entries) = &object {
            entries.borrow_mut().insert("me".to_string(), object.clone());
        }
        assert_eq!(format!("{object:?}"), r#"{"a": 1, "me": [Circular]}"#);
        items.borrow_mut().clear();
        if let Value::Object(entries) = &object {
            entries.borrow_mut().clear();
        }
    }

    #[test]
    fn loose_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Number(0.0).loose_equals(&Value::Null));
        assert!(!Value::string("").loose_equals(&Value::Undefined));
        assert!(Value::Number(1.0).loose_equals(&Value::string("1")));
        assert!(Value::Bool(true).loose_equals(&Value::Number(1.0)));
        assert!(!Value::Number(f64::NAN).loose_equals(&Value::Number(f64::NAN)));
        assert!(!Value::Number(1.0).strict_equals(&Value::string("1")));
    }

    #[test]
    fn addition_concatenates_strings() {
        assert_eq!(Value::Number(1.0).add(&Value::Number(2.0)).to_js_string(), "3");
        assert_eq!(Value::string("a").add(&Value::Number(2.0)).to_js_string(), "a2");
        assert_eq!(Value::Null.add(&Value::Bool(true)).to_js_string(), "1");
        let list = Value::from_json(&json!([1, 2]));
        assert_eq!(list.add(&Value::string("!")).to_js_string(), "1,2!");
    }

    #[test]
    fn numbers_from_strings() {
        assert_eq!(Value::string(" 42 ").to_number(), 42.0);
        assert_eq!(Value::string("").to_number(), 0.0);
        assert_eq!(Value::string("0x1f").to_number(), 31.0);
        assert!(Value::string("inf").to_number().is_nan());
        assert!(Value::string("12px").to_number().is_nan());
        assert_eq!(Value::string("1e3").to_number(), 1000.0);
    }

    #[test]
    fn compares_strings_and_numbers() {
        assert_eq!(Value::string("a").compare(&Value::string("b")), Some(Ordering::Less));
        assert_eq!(Value::string("10").compare(&Value::Number(9.0)), Some(Ordering::Greater));
        assert_eq!(Value::Undefined.compare(&Value::Number(1.0)), None);
    }

    #[test]
    fn canonical_indices_only() {
        assert_eq!(array_index("3"), Some(3));
        assert_eq!(array_index("03"), None);
        assert_eq!(array_index("-1"), None);
    }
}
