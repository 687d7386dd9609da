//! Runtime value model shared by the interpreter and the built‑in library.
//!
//! `Value` is one closed sum type threaded through every evaluation function.
//! Arrays, instances and environments are shared by reference (`Rc<RefCell<…>>`);
//! reference cycles through captured closures are reclaimed by the
//! [`Heap`](crate::heap::Heap) when the owning interpreter is dropped.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::environment::EnvRef;
use crate::error::{LoxError, Result};
use crate::heap::Heap;
use crate::interpreter::{IResult, InterpretError, Interpreter};
use crate::token::Token;

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type InstanceRef = Rc<RefCell<Instance>>;

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Array(ArrayRef),
    Callable(Callable),
    Instance(InstanceRef),
}

impl Value {
    /// Everything is truthy except `nil` and `false`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Runtime kind name reported by `typeof`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Bool(_) => "Boolean",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Array(_) => "Array",
            Value::Callable(Callable::Class(_)) => "Class",
            Value::Callable(_) => "Function",
            Value::Instance(instance) if instance.borrow().class.is_none() => "System",
            Value::Instance(_) => "Instance",
        }
    }

    /// Scalars and arrays carry the built‑in method library.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Value::Nil | Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Array(_)
        )
    }
}

impl PartialEq for Value {
    /// Numbers by value, strings and arrays structurally, everything else
    /// by identity.
    fn eq(&self, other: &Self) -> bool {
        values_equal(self, other, &mut HashSet::new())
    }
}

type ArrayPtr = *const RefCell<Vec<Value>>;

/// Array pairs already under comparison count as equal, so cyclic arrays
/// terminate.
fn values_equal(a: &Value, b: &Value, comparing: &mut HashSet<(ArrayPtr, ArrayPtr)>) -> bool {
    match (a, b) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            if Rc::ptr_eq(a, b) {
                return true;
            }

            let pair: (ArrayPtr, ArrayPtr) = (Rc::as_ptr(a), Rc::as_ptr(b));
            if !comparing.insert(pair) {
                return true;
            }

            let (left, right) = (a.borrow(), b.borrow());
            let equal: bool = left.len() == right.len()
                && left
                    .iter()
                    .zip(right.iter())
                    .all(|(l, r)| values_equal(l, r, comparing));

            comparing.remove(&pair);
            equal
        }
        (Value::Callable(a), Value::Callable(b)) => a.same(b),
        (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

/// Integral values print without a fraction (`3`), others use the shortest
/// round‑trip form (`2.5`).
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        let mut buf: itoa::Buffer = itoa::Buffer::new();
        buf.format(n as i64).to_owned()
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) => write!(f, "{}", format_number(*n)),

            Value::String(s) => write!(f, "{}", s),

            Value::Array(items) => write_array(f, items, &mut HashSet::new()),

            Value::Callable(callable) => write!(f, "{}", callable),

            Value::Instance(instance) => match &instance.borrow().class {
                Some(class) => write!(f, "<instance {}>", class.name),
                None => write!(f, "System"),
            },
        }
    }
}

/// Arrays already on the current path print as `[...]`.
fn write_array(
    f: &mut fmt::Formatter<'_>,
    items: &ArrayRef,
    path: &mut HashSet<ArrayPtr>,
) -> fmt::Result {
    let ptr: ArrayPtr = Rc::as_ptr(items);
    if !path.insert(ptr) {
        return write!(f, "[...]");
    }

    write!(f, "[")?;
    for (i, item) in items.borrow().iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        match item {
            Value::Array(inner) => write_array(f, inner, path)?,
            _ => write!(f, "{}", item)?,
        }
    }
    write!(f, "]")?;

    path.remove(&ptr);
    Ok(())
}

impl fmt::Debug for Value {
    /// Shallow on purpose: instances and closures may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Array(items) => write!(f, "Array(len={})", items.borrow().len()),
            other => write!(f, "{}({})", other.type_name(), other),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Callables
// ─────────────────────────────────────────────────────────────────────────────

/// Accepted argument counts of a callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    /// Inclusive range of counts, e.g. an optional trailing argument.
    Between(usize, usize),
    /// Any count (variadic).
    Any,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Fixed(n) => count == n,
            Arity::Between(min, max) => (min..=max).contains(&count),
            Arity::Any => true,
        }
    }

    /// Largest count worth passing, used to trim surplus callback arguments.
    pub fn max(&self) -> Option<usize> {
        match *self {
            Arity::Fixed(n) | Arity::Between(_, n) => Some(n),
            Arity::Any => None,
        }
    }
}

impl fmt::Display for Arity {
    /// `2`, `0 or 1`, `0, 1 or 2`, `any`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Arity::Fixed(n) => write!(f, "{}", n),
            Arity::Between(min, max) => {
                let counts: Vec<String> = (min..max).map(|n| n.to_string()).collect();
                write!(f, "{} or {}", counts.join(", "), max)
            }
            Arity::Any => write!(f, "any"),
        }
    }
}

#[derive(Clone)]
pub enum Callable {
    Function(Rc<Function>),
    Native(Rc<NativeFunction>),
    Class(Rc<Class>),
}

impl Callable {
    pub fn arity(&self) -> Arity {
        match self {
            Callable::Function(function) => Arity::Fixed(function.declaration.arity()),
            Callable::Native(native) => native.arity,
            Callable::Class(class) => class.arity(),
        }
    }

    fn same(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            (Callable::Class(a), Callable::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function(function) => match function.declaration.name() {
                Some(name) => write!(f, "<function {}>", name),
                None => write!(f, "<fn>"),
            },
            Callable::Native(_) => write!(f, "<native function>"),
            Callable::Class(class) => write!(f, "{}", class.name),
        }
    }
}

/// A user function: shared declaration plus the environment captured at its
/// definition site.
pub struct Function {
    pub declaration: Rc<FunctionDecl>,
    pub closure: EnvRef,
    pub is_initializer: bool,
}

impl Function {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvRef, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    /// Same body, closure extended with a scope that defines `this`.
    pub fn bind(&self, instance: InstanceRef, heap: &mut Heap) -> Function {
        let environment: EnvRef = heap.environment(Some(Rc::clone(&self.closure)));
        environment
            .borrow_mut()
            .define("this", Value::Instance(instance));

        Function::new(
            Rc::clone(&self.declaration),
            environment,
            self.is_initializer,
        )
    }
}

/// Arguments handed to a native handler.
pub struct NativeCall<'c> {
    /// The value the method was read from (`nil` for free functions).
    pub receiver: &'c Value,
    pub args: &'c [Value],
    /// Call‑site token, used for error positions.
    pub paren: &'c Token,
}

impl<'c> NativeCall<'c> {
    /// Positional argument, `nil` when omitted.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or(Value::Nil)
    }

    pub fn error<S: Into<String>>(&self, message: S) -> InterpretError {
        InterpretError::RuntimeError(LoxError::runtime(
            self.paren.line,
            self.paren.column,
            message,
        ))
    }
}

pub type NativeFn = fn(&mut Interpreter, NativeCall<'_>) -> IResult<Value>;

/// A host function, optionally bound to a receiver value.
pub struct NativeFunction {
    pub name: String,
    pub arity: Arity,
    pub receiver: Value,
    pub handler: NativeFn,
}

// ─────────────────────────────────────────────────────────────────────────────
// Classes and instances
// ─────────────────────────────────────────────────────────────────────────────

pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<Class>>,
    methods: HashMap<String, Rc<Function>>,
}

impl Class {
    pub fn new(
        name: String,
        superclass: Option<Rc<Class>>,
        methods: HashMap<String, Rc<Function>>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    /// Own method, else the nearest one up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        match self.methods.get(name) {
            Some(method) => Some(Rc::clone(method)),
            None => self
                .superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name)),
        }
    }

    /// Calling a class takes the arguments of its (possibly inherited) `init`.
    pub fn arity(&self) -> Arity {
        self.find_method("init")
            .map(|init| Arity::Fixed(init.declaration.arity()))
            .unwrap_or(Arity::Fixed(0))
    }
}

pub struct Instance {
    /// `None` for host objects such as `system`.
    pub class: Option<Rc<Class>>,
    pub fields: HashMap<String, Value>,
}

impl Instance {
    pub fn new(class: Option<Rc<Class>>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    /// Own field first, then a class method bound to `instance`.
    pub fn get(instance: &InstanceRef, name: &Token, heap: &mut Heap) -> Result<Value> {
        let method: Option<Rc<Function>> = {
            let this = instance.borrow();

            if let Some(value) = this.fields.get(&name.lexeme) {
                return Ok(value.clone());
            }

            this.class
                .as_ref()
                .and_then(|class| class.find_method(&name.lexeme))
        };

        match method {
            Some(method) => {
                let bound: Function = method.bind(Rc::clone(instance), heap);
                Ok(Value::Callable(Callable::Function(Rc::new(bound))))
            }
            None => Err(LoxError::runtime(
                name.line,
                name.column,
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }

    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    #[test]
    fn truthiness_only_rejects_nil_and_false() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
        assert!(array(vec![]).is_truthy());
    }

    #[test]
    fn arrays_compare_structurally() {
        let a = array(vec![Value::Number(1.0), Value::String("x".into())]);
        let b = array(vec![Value::Number(1.0), Value::String("x".into())]);

        assert_eq!(a, b);
        assert_ne!(a, array(vec![Value::Number(1.0)]));
        assert_ne!(Value::Number(1.0), Value::String("1".into()));
    }

    #[test]
    fn numbers_print_without_trailing_zero() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(
            array(vec![Value::Number(1.0), Value::Bool(true), Value::Nil]).to_string(),
            "[1, true, nil]"
        );
    }

    #[test]
    fn arity_sets_describe_themselves() {
        assert!(Arity::Between(0, 1).accepts(1));
        assert!(!Arity::Fixed(0).accepts(1));
        assert!(Arity::Any.accepts(42));
        assert_eq!(Arity::Fixed(2).to_string(), "2");
        assert_eq!(Arity::Between(0, 1).to_string(), "0 or 1");
        assert_eq!(Arity::Between(0, 2).to_string(), "0, 1 or 2");
    }
}
