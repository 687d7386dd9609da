//! Host‑provided functionality: the global `system` object and the method
//! library available on literal values (`nil`, booleans, numbers, strings
//! and arrays).
//!
//! Method tables are compile‑time `phf` maps from name to arity and handler,
//! the same way the scanner resolves keywords.  A method read from a literal
//! becomes a [`NativeFunction`] bound to that literal as its receiver.

use std::rc::Rc;

use chrono::Local;
use log::debug;
use phf::phf_map;
use regex::Regex;

use crate::heap::Heap;
use crate::interpreter::{IResult, Interpreter};
use crate::value::{ArrayRef, Arity, Callable, NativeCall, NativeFn, NativeFunction, Value};

/// Reported by `system.version()`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct Builtin {
    pub arity: Arity,
    pub handler: NativeFn,
}

static SYSTEM_METHODS: phf::Map<&'static str, Builtin> = phf_map! {
    "print" => Builtin { arity: Arity::Any, handler: system_print },
    "log" => Builtin { arity: Arity::Any, handler: system_log },
    "time" => Builtin { arity: Arity::Between(0, 1), handler: system_time },
    "version" => Builtin { arity: Arity::Fixed(0), handler: system_version },
};

static COMMON_METHODS: phf::Map<&'static str, Builtin> = phf_map! {
    "toString" => Builtin { arity: Arity::Fixed(0), handler: to_string },
};

static NUMBER_METHODS: phf::Map<&'static str, Builtin> = phf_map! {
    "abs" => Builtin { arity: Arity::Fixed(0), handler: number_abs },
    "ceil" => Builtin { arity: Arity::Fixed(0), handler: number_ceil },
    "floor" => Builtin { arity: Arity::Fixed(0), handler: number_floor },
    "round" => Builtin { arity: Arity::Fixed(0), handler: number_round },
};

static STRING_METHODS: phf::Map<&'static str, Builtin> = phf_map! {
    "explode" => Builtin { arity: Arity::Between(0, 1), handler: string_explode },
    "get" => Builtin { arity: Arity::Fixed(1), handler: string_get },
    "length" => Builtin { arity: Arity::Fixed(0), handler: string_length },
    "match" => Builtin { arity: Arity::Fixed(1), handler: string_match },
    "matchAll" => Builtin { arity: Arity::Fixed(1), handler: string_match_all },
    "replace" => Builtin { arity: Arity::Fixed(2), handler: string_replace },
    "reverse" => Builtin { arity: Arity::Fixed(0), handler: string_reverse },
    "trim" => Builtin { arity: Arity::Fixed(0), handler: string_trim },
};

static ARRAY_METHODS: phf::Map<&'static str, Builtin> = phf_map! {
    "count" => Builtin { arity: Arity::Fixed(0), handler: array_count },
    "each" => Builtin { arity: Arity::Fixed(1), handler: array_each },
    "filter" => Builtin { arity: Arity::Between(0, 1), handler: array_filter },
    "first" => Builtin { arity: Arity::Fixed(0), handler: array_first },
    "get" => Builtin { arity: Arity::Fixed(1), handler: array_get },
    "implode" => Builtin { arity: Arity::Between(0, 1), handler: array_implode },
    "last" => Builtin { arity: Arity::Fixed(0), handler: array_last },
    "map" => Builtin { arity: Arity::Fixed(1), handler: array_map },
    "max" => Builtin { arity: Arity::Fixed(0), handler: array_max },
    "min" => Builtin { arity: Arity::Fixed(0), handler: array_min },
    "pop" => Builtin { arity: Arity::Fixed(0), handler: array_pop },
    "push" => Builtin { arity: Arity::Fixed(1), handler: array_push },
    "reverse" => Builtin { arity: Arity::Fixed(0), handler: array_reverse },
    "shift" => Builtin { arity: Arity::Fixed(0), handler: array_shift },
    "slice" => Builtin { arity: Arity::Between(1, 2), handler: array_slice },
    "unshift" => Builtin { arity: Arity::Fixed(1), handler: array_unshift },
};

fn native(name: &str, builtin: &Builtin, receiver: Value) -> Value {
    Value::Callable(Callable::Native(Rc::new(NativeFunction {
        name: name.to_string(),
        arity: builtin.arity,
        receiver,
        handler: builtin.handler,
    })))
}

/// The `system` global: a class‑less instance whose fields are natives.
pub fn system_object(heap: &mut Heap) -> Value {
    let system = heap.instance(None);

    for (name, builtin) in SYSTEM_METHODS.entries() {
        debug!("Registering native 'system.{}'", name);
        system
            .borrow_mut()
            .fields
            .insert(name.to_string(), native(name, builtin, Value::Nil));
    }

    Value::Instance(system)
}

/// Looks up `name` in the method table for `receiver`'s kind, falling back to
/// the methods every literal shares.
pub fn literal_method(receiver: &Value, name: &str) -> Option<Value> {
    let table: Option<&phf::Map<&'static str, Builtin>> = match receiver {
        Value::Number(_) => Some(&NUMBER_METHODS),
        Value::String(_) => Some(&STRING_METHODS),
        Value::Array(_) => Some(&ARRAY_METHODS),
        Value::Nil | Value::Bool(_) => None,
        Value::Callable(_) | Value::Instance(_) => return None,
    };

    table
        .and_then(|methods| methods.get(name))
        .or_else(|| COMMON_METHODS.get(name))
        .map(|builtin| native(name, builtin, receiver.clone()))
}

// ─────────────────────────────────────────────────────────────────────────────
// system
// ─────────────────────────────────────────────────────────────────────────────

fn joined(args: &[Value]) -> String {
    args.iter().map(|arg| arg.to_string()).collect()
}

fn system_print(interpreter: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    interpreter.write_line(&joined(call.args))?;
    Ok(Value::Nil)
}

fn system_log(interpreter: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    interpreter.write_line(&format!("{}: {}", stamp, joined(call.args)))?;
    Ok(Value::Nil)
}

/// Seconds since the epoch, or milliseconds when passed a truthy argument.
fn system_time(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let now = Local::now();

    if call.arg(0).is_truthy() {
        Ok(Value::Number(now.timestamp_millis() as f64))
    } else {
        Ok(Value::Number(now.timestamp() as f64))
    }
}

fn system_version(_: &mut Interpreter, _: NativeCall<'_>) -> IResult<Value> {
    Ok(Value::String(VERSION.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Receiver / argument helpers
// ─────────────────────────────────────────────────────────────────────────────

fn receiver_number(call: &NativeCall<'_>) -> IResult<f64> {
    match call.receiver {
        Value::Number(n) => Ok(*n),
        _ => Err(call.error("Receiver must be a number.")),
    }
}

fn receiver_str<'c>(call: &NativeCall<'c>) -> IResult<&'c str> {
    match call.receiver {
        Value::String(s) => Ok(s.as_str()),
        _ => Err(call.error("Receiver must be a string.")),
    }
}

fn receiver_array(call: &NativeCall<'_>) -> IResult<ArrayRef> {
    match call.receiver {
        Value::Array(items) => Ok(Rc::clone(items)),
        _ => Err(call.error("Receiver must be an array.")),
    }
}

fn index_arg(call: &NativeCall<'_>, position: usize) -> IResult<i64> {
    match call.arg(position) {
        Value::Number(n) => Ok(n.trunc() as i64),
        _ => Err(call.error("Index must be a number.")),
    }
}

fn callback_arg(call: &NativeCall<'_>, position: usize) -> IResult<Value> {
    match call.arg(position) {
        callback @ Value::Callable(_) => Ok(callback),
        _ => Err(call.error("Expected a function argument.")),
    }
}

/// Negative indices count from the end; `None` when out of range.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { len + index } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

// ─────────────────────────────────────────────────────────────────────────────
// All literals
// ─────────────────────────────────────────────────────────────────────────────

fn to_string(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    Ok(Value::String(call.receiver.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Number
// ─────────────────────────────────────────────────────────────────────────────

fn number_abs(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    Ok(Value::Number(receiver_number(&call)?.abs()))
}

fn number_ceil(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    Ok(Value::Number(receiver_number(&call)?.ceil()))
}

fn number_floor(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    Ok(Value::Number(receiver_number(&call)?.floor()))
}

/// Half away from zero.
fn number_round(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    Ok(Value::Number(receiver_number(&call)?.round()))
}

// ─────────────────────────────────────────────────────────────────────────────
// String
// ─────────────────────────────────────────────────────────────────────────────

fn strings(heap: &mut Heap, parts: Vec<String>) -> Value {
    Value::Array(heap.array(parts.into_iter().map(Value::String).collect()))
}

/// Splits on the separator; a missing or empty one means a single space.
fn string_explode(interpreter: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let s: &str = receiver_str(&call)?;
    let separator: String = match call.arg(0) {
        Value::Nil => String::new(),
        other => other.to_string(),
    };
    let separator: &str = if separator.is_empty() { " " } else { &separator };

    let parts: Vec<String> = s.split(separator).map(str::to_string).collect();

    Ok(strings(interpreter.heap_mut(), parts))
}

fn string_get(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let s: &str = receiver_str(&call)?;
    let index: i64 = index_arg(&call, 0)?;

    let chars: Vec<char> = s.chars().collect();
    Ok(normalize_index(index, chars.len())
        .map(|i| Value::String(chars[i].to_string()))
        .unwrap_or(Value::Nil))
}

fn string_length(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    Ok(Value::Number(receiver_str(&call)?.chars().count() as f64))
}

fn pattern(call: &NativeCall<'_>) -> IResult<Regex> {
    let source: String = call.arg(0).to_string();
    Regex::new(&source).map_err(|e| call.error(format!("Invalid pattern: {}", e)))
}

/// Whole match followed by each capture group; empty when nothing matches.
fn string_match(interpreter: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let s: &str = receiver_str(&call)?;
    let re: Regex = pattern(&call)?;

    let groups: Vec<String> = match re.captures(s) {
        Some(captures) => captures
            .iter()
            .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect(),
        None => Vec::new(),
    };

    Ok(strings(interpreter.heap_mut(), groups))
}

fn string_match_all(interpreter: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let s: &str = receiver_str(&call)?;
    let re: Regex = pattern(&call)?;

    let matches: Vec<String> = re.find_iter(s).map(|m| m.as_str().to_string()).collect();

    Ok(strings(interpreter.heap_mut(), matches))
}

fn string_replace(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let s: &str = receiver_str(&call)?;
    let from: String = call.arg(0).to_string();
    let to: String = call.arg(1).to_string();

    if from.is_empty() {
        return Ok(Value::String(s.to_string()));
    }

    Ok(Value::String(s.replace(&from, &to)))
}

fn string_reverse(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    Ok(Value::String(receiver_str(&call)?.chars().rev().collect()))
}

fn string_trim(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    Ok(Value::String(receiver_str(&call)?.trim().to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Array
// ─────────────────────────────────────────────────────────────────────────────

/// Calls a user callback with as many of `args` as it accepts.
fn invoke(
    interpreter: &mut Interpreter,
    call: &NativeCall<'_>,
    callback: &Value,
    mut args: Vec<Value>,
) -> IResult<Value> {
    if let Value::Callable(callable) = callback {
        if let Some(max) = callable.arity().max() {
            args.truncate(max);
        }
    }

    interpreter.call_value(callback, args, call.paren)
}

fn array_count(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    Ok(Value::Number(receiver_array(&call)?.borrow().len() as f64))
}

/// Calls the callback with `(value, index)` for each element.
fn array_each(interpreter: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let items: Vec<Value> = receiver_array(&call)?.borrow().clone();
    let callback: Value = callback_arg(&call, 0)?;

    for (index, item) in items.into_iter().enumerate() {
        invoke(
            interpreter,
            &call,
            &callback,
            vec![item, Value::Number(index as f64)],
        )?;
    }

    Ok(Value::Nil)
}

/// Keeps elements for which the callback is truthy, or truthy elements
/// when called without one.
fn array_filter(interpreter: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let items: Vec<Value> = receiver_array(&call)?.borrow().clone();
    let callback: Option<Value> = match call.arg(0) {
        Value::Nil => None,
        _ => Some(callback_arg(&call, 0)?),
    };

    let mut kept: Vec<Value> = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        let keep: bool = match &callback {
            Some(callback) => invoke(
                interpreter,
                &call,
                callback,
                vec![item.clone(), Value::Number(index as f64)],
            )?
            .is_truthy(),
            None => item.is_truthy(),
        };

        if keep {
            kept.push(item);
        }
    }

    Ok(Value::Array(interpreter.heap_mut().array(kept)))
}

fn array_first(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    Ok(receiver_array(&call)?
        .borrow()
        .first()
        .cloned()
        .unwrap_or(Value::Nil))
}

fn array_get(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let items: ArrayRef = receiver_array(&call)?;
    let index: i64 = index_arg(&call, 0)?;

    let items = items.borrow();
    Ok(normalize_index(index, items.len())
        .map(|i| items[i].clone())
        .unwrap_or(Value::Nil))
}

fn array_implode(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let separator: String = match call.arg(0) {
        Value::Nil => String::new(),
        other => other.to_string(),
    };

    let parts: Vec<String> = receiver_array(&call)?
        .borrow()
        .iter()
        .map(|item| item.to_string())
        .collect();

    Ok(Value::String(parts.join(&separator)))
}

fn array_last(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    Ok(receiver_array(&call)?
        .borrow()
        .last()
        .cloned()
        .unwrap_or(Value::Nil))
}

fn array_map(interpreter: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let items: Vec<Value> = receiver_array(&call)?.borrow().clone();
    let callback: Value = callback_arg(&call, 0)?;

    let mut mapped: Vec<Value> = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        mapped.push(invoke(
            interpreter,
            &call,
            &callback,
            vec![item, Value::Number(index as f64)],
        )?);
    }

    Ok(Value::Array(interpreter.heap_mut().array(mapped)))
}

fn numbers(call: &NativeCall<'_>) -> IResult<Vec<f64>> {
    receiver_array(call)?
        .borrow()
        .iter()
        .map(|item| match item {
            Value::Number(n) => Ok(*n),
            _ => Err(call.error("Array elements must be numbers.")),
        })
        .collect()
}

fn array_max(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    Ok(numbers(&call)?
        .into_iter()
        .reduce(f64::max)
        .map(Value::Number)
        .unwrap_or(Value::Nil))
}

fn array_min(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    Ok(numbers(&call)?
        .into_iter()
        .reduce(f64::min)
        .map(Value::Number)
        .unwrap_or(Value::Nil))
}

fn array_pop(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    Ok(receiver_array(&call)?
        .borrow_mut()
        .pop()
        .unwrap_or(Value::Nil))
}

/// Appends and returns the new length.
fn array_push(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let items: ArrayRef = receiver_array(&call)?;
    let mut items = items.borrow_mut();
    items.push(call.arg(0));
    Ok(Value::Number(items.len() as f64))
}

fn array_reverse(interpreter: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let mut items: Vec<Value> = receiver_array(&call)?.borrow().clone();
    items.reverse();
    Ok(Value::Array(interpreter.heap_mut().array(items)))
}

fn array_shift(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let items: ArrayRef = receiver_array(&call)?;
    let mut items = items.borrow_mut();

    if items.is_empty() {
        Ok(Value::Nil)
    } else {
        Ok(items.remove(0))
    }
}

/// `slice(start, length?)`: negative `start` counts from the end, negative
/// `length` stops that many elements before the end.
fn array_slice(interpreter: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let items: Vec<Value> = receiver_array(&call)?.borrow().clone();
    let len = items.len() as i64;

    let start: i64 = index_arg(&call, 0)?;
    let start: i64 = if start < 0 { (len + start).max(0) } else { start.min(len) };

    let end: i64 = match call.arg(1) {
        Value::Nil => len,
        _ => {
            let length: i64 = index_arg(&call, 1)?;
            if length < 0 {
                (len + length).max(start)
            } else {
                start.saturating_add(length).min(len)
            }
        }
    };

    let slice: Vec<Value> = items[start as usize..end.max(start) as usize].to_vec();
    Ok(Value::Array(interpreter.heap_mut().array(slice)))
}

/// Prepends and returns the new length.
fn array_unshift(_: &mut Interpreter, call: NativeCall<'_>) -> IResult<Value> {
    let items: ArrayRef = receiver_array(&call)?;
    let mut items = items.borrow_mut();
    items.insert(0, call.arg(0));
    Ok(Value::Number(items.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_indices_count_from_the_end() {
        assert_eq!(normalize_index(0, 3), Some(0));
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(3, 3), None);
        assert_eq!(normalize_index(-4, 3), None);
        assert_eq!(normalize_index(0, 0), None);
    }

    #[test]
    fn literal_tables_fall_back_to_shared_methods() {
        assert!(literal_method(&Value::Number(1.0), "floor").is_some());
        assert!(literal_method(&Value::Number(1.0), "toString").is_some());
        assert!(literal_method(&Value::Nil, "toString").is_some());
        assert!(literal_method(&Value::Bool(true), "floor").is_none());
        assert!(literal_method(&Value::String("x".into()), "push").is_none());
    }
}
