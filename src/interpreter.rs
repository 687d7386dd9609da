//! Tree‑walking evaluator.
//!
//! Statements run against a chain of [`Environment`]s; function calls, class
//! instantiation and the built‑in library all funnel through
//! [`Interpreter::call_value`].  `return` unwinds as
//! [`InterpretError::ReturnSignal`] and is caught at the function boundary,
//! so a runtime error and a return share one `?`‑propagated path.

use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use log::{debug, info};
use thiserror::Error;

use crate::ast::{Expr, FunctionDecl, LiteralValue, Stmt};
use crate::builtins;
use crate::environment::EnvRef;
use crate::error::{LoxError, Result};
use crate::heap::Heap;
use crate::token::{Token, TokenType};
use crate::value::{Callable, Class, Function, Instance, NativeCall, Value};

/// Nested calls allowed before a `Stack overflow.` runtime error.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

#[derive(Error, Debug)]
pub enum InterpretError {
    #[error(transparent)]
    RuntimeError(#[from] LoxError),

    #[error("Return signal with value: {0}")]
    ReturnSignal(Value),
}

/// Convenient alias for interpreter results.
pub type IResult<T> = std::result::Result<T, InterpretError>;

pub struct Interpreter {
    environment: EnvRef,
    out: Box<dyn Write>,
    depth: usize,
    max_depth: usize,
    heap: Heap,
}

impl Interpreter {
    /// Creates an interpreter writing program output to `out`, with the
    /// `system` object defined globally.
    pub fn new(out: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let mut heap = Heap::new();
        let globals: EnvRef = heap.environment(None);

        debug!("Defining global 'system'");
        let system: Value = builtins::system_object(&mut heap);
        globals.borrow_mut().define("system", system);

        Self {
            environment: globals,
            out,
            depth: 0,
            max_depth: DEFAULT_MAX_CALL_DEPTH,
            heap,
        }
    }

    pub fn with_max_call_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Runs a program.  The first runtime error aborts execution; output
    /// already written stays written.
    pub fn execute(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        let outcome: IResult<()> = statements
            .iter()
            .try_for_each(|stmt| self.execute_stmt(stmt));

        // A runtime error outranks a failed flush.
        let flushed: std::io::Result<()> = self.out.flush();

        match outcome {
            Ok(()) => info!("Interpretation completed successfully"),
            Err(InterpretError::RuntimeError(e)) => return Err(e),
            Err(InterpretError::ReturnSignal(_)) => {
                debug!("Top-level return ended the program");
            }
        }

        flushed?;
        Ok(())
    }

    /// Evaluates a single expression in the global scope.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match self.eval(expr) {
            Ok(value) => Ok(value),
            Err(InterpretError::RuntimeError(e)) => Err(e),
            Err(InterpretError::ReturnSignal(value)) => Ok(value),
        }
    }

    /// Writes one line of program output.
    pub fn write_line(&mut self, text: &str) -> IResult<()> {
        writeln!(self.out, "{}", text).map_err(LoxError::from)?;
        Ok(())
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    fn execute_stmt(&mut self, stmt: &Stmt) -> IResult<()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.eval(expr)?;
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}'", name.lexeme);
                self.environment.borrow_mut().define(&name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let env: EnvRef = self.heap.environment(Some(Rc::clone(&self.environment)));
                self.execute_block(statements, env)?;
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.execute_stmt(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute_stmt(else_branch)?;
                }
            }

            Stmt::While { condition, body } => {
                while self.eval(condition)?.is_truthy() {
                    self.execute_stmt(body)?;
                }
            }

            Stmt::Function(declaration) => {
                let function: Value = self.closure(declaration, false);

                if let Some(name) = &declaration.name {
                    debug!("Defining function '{}'", name.lexeme);
                    self.environment.borrow_mut().define(&name.lexeme, function);
                }
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Nil,
                };

                return Err(InterpretError::ReturnSignal(value));
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.declare_class(name, superclass.as_ref(), methods)?,
        }

        Ok(())
    }

    /// Runs `statements` with `env` as the current scope, restoring the
    /// previous scope on every exit path.
    pub fn execute_block(&mut self, statements: &[Stmt], env: EnvRef) -> IResult<()> {
        let previous: EnvRef = std::mem::replace(&mut self.environment, env);

        let result: IResult<()> = statements
            .iter()
            .try_for_each(|stmt| self.execute_stmt(stmt));

        self.environment = previous;
        result
    }

    fn declare_class(
        &mut self,
        name: &Token,
        superclass: Option<&Token>,
        methods: &[Rc<FunctionDecl>],
    ) -> IResult<()> {
        debug!("Declaring class '{}'", name.lexeme);

        // The name exists (as nil) while the superclass and methods are set up.
        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        let superclass: Option<Rc<Class>> = match superclass {
            Some(token) => {
                let value: Value = self.environment.borrow().get(token)?;
                match value {
                    Value::Callable(Callable::Class(class)) => Some(class),
                    _ => return Err(Self::error(token, "Superclass must be a class.")),
                }
            }
            None => None,
        };

        let closure: EnvRef = self.heap.environment(Some(Rc::clone(&self.environment)));
        if let Some(superclass) = &superclass {
            closure.borrow_mut().define(
                "super",
                Value::Callable(Callable::Class(Rc::clone(superclass))),
            );
        }

        let methods: HashMap<String, Rc<Function>> = methods
            .iter()
            .filter_map(|method| {
                let method_name: &str = method.name()?;
                let function = Function::new(
                    Rc::clone(method),
                    Rc::clone(&closure),
                    method_name == "init",
                );
                Some((method_name.to_string(), Rc::new(function)))
            })
            .collect();

        let class = Class::new(name.lexeme.clone(), superclass, methods);

        self.environment
            .borrow_mut()
            .assign(name, Value::Callable(Callable::Class(Rc::new(class))))?;

        Ok(())
    }

    fn closure(&self, declaration: &Rc<FunctionDecl>, is_initializer: bool) -> Value {
        let function = Function::new(
            Rc::clone(declaration),
            Rc::clone(&self.environment),
            is_initializer,
        );
        Value::Callable(Callable::Function(Rc::new(function)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    fn eval(&mut self, expr: &Expr) -> IResult<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.eval(inner),

            Expr::Variable(name) => Ok(self.environment.borrow().get(name)?),

            Expr::Assign { name, value } => {
                let value: Value = self.eval(value)?;
                self.environment
                    .borrow_mut()
                    .assign(name, value.clone())?;
                Ok(value)
            }

            Expr::Unary { operator, right } => {
                let right: Value = self.eval(right)?;

                match operator.token_type {
                    TokenType::MINUS => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(Self::error(operator, "Operand must be a number.")),
                    },
                    TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
                    _ => Err(Self::error(operator, "Unknown unary operator.")),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left: Value = self.eval(left)?;
                let right: Value = self.eval(right)?;
                self.binary(left, operator, right)
            }

            // Short-circuit yields the left operand; otherwise the truthiness
            // of the right operand.
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.eval(left)?;

                let short_circuit: bool = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if short_circuit {
                    return Ok(left);
                }

                Ok(Value::Bool(self.eval(right)?.is_truthy()))
            }

            Expr::Typeof { operand, .. } => {
                let value: Value = self.eval(operand)?;
                Ok(Value::String(value.type_name().to_string()))
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.eval(callee)?;

                if !matches!(callee, Value::Callable(_)) {
                    return Err(Self::error(paren, "Can only call functions and classes."));
                }

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.eval(argument)?);
                }

                self.call_value(&callee, args, paren)
            }

            Expr::Get {
                object,
                name,
                optional,
            } => {
                let object: Value = self.eval(object)?;

                if *optional && matches!(object, Value::Nil) {
                    return Ok(Value::Nil);
                }

                self.get_property(&object, name)
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object: Value = self.eval(object)?;

                match object {
                    Value::Instance(instance) => {
                        let value: Value = self.eval(value)?;
                        instance.borrow_mut().set(name, value.clone());
                        Ok(value)
                    }
                    other if other.is_literal() => {
                        Err(Self::error(name, "Can't add property to literal."))
                    }
                    _ => Err(Self::error(name, "Only instances have fields.")),
                }
            }

            Expr::This(keyword) => Ok(self.environment.borrow().get_named("this", keyword)?),

            Expr::Super { keyword, method } => self.super_method(keyword, method),

            Expr::Function(declaration) => Ok(self.closure(declaration, false)),

            Expr::Array { elements, .. } => {
                let mut items: Vec<Value> = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.eval(element)?);
                }
                Ok(Value::Array(self.heap.array(items)))
            }
        }
    }

    fn binary(&mut self, left: Value, operator: &Token, right: Value) -> IResult<Value> {
        match operator.token_type {
            TokenType::PLUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                (Value::Array(a), Value::Array(b)) => {
                    let mut items: Vec<Value> = a.borrow().clone();
                    items.extend(b.borrow().iter().cloned());
                    Ok(Value::Array(self.heap.array(items)))
                }
                _ => Err(Self::error(
                    operator,
                    "Operands must be two numbers, strings or arrays.",
                )),
            },

            TokenType::MINUS => {
                let (a, b) = Self::numbers(operator, &left, &right)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = Self::numbers(operator, &left, &right)?;
                Ok(Value::Number(a * b))
            }

            // Division and remainder by zero yield 0.
            TokenType::SLASH => {
                let (a, b) = Self::numbers(operator, &left, &right)?;
                Ok(Value::Number(if b == 0.0 { 0.0 } else { a / b }))
            }

            TokenType::PERCENT => {
                let (a, b) = Self::numbers(operator, &left, &right)?;
                Ok(Value::Number(if b == 0.0 { 0.0 } else { a % b }))
            }

            TokenType::GREATER => {
                let (a, b) = Self::numbers(operator, &left, &right)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = Self::numbers(operator, &left, &right)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = Self::numbers(operator, &left, &right)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = Self::numbers(operator, &left, &right)?;
                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

            _ => Err(Self::error(operator, "Unknown binary operator.")),
        }
    }

    fn numbers(operator: &Token, left: &Value, right: &Value) -> IResult<(f64, f64)> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
            _ => Err(Self::error(operator, "Operands must be numbers.")),
        }
    }

    fn get_property(&mut self, object: &Value, name: &Token) -> IResult<Value> {
        match object {
            Value::Instance(instance) => Ok(Instance::get(instance, name, &mut self.heap)?),

            literal if literal.is_literal() => builtins::literal_method(literal, &name.lexeme)
                .ok_or_else(|| {
                    Self::error(name, format!("Undefined property '{}'.", name.lexeme))
                }),

            _ => Err(Self::error(name, "Only instances have properties.")),
        }
    }

    fn super_method(&mut self, keyword: &Token, method: &Token) -> IResult<Value> {
        let superclass: Value = self.environment.borrow().get_named("super", keyword)?;
        let this: Value = self.environment.borrow().get_named("this", keyword)?;

        let (Value::Callable(Callable::Class(superclass)), Value::Instance(instance)) =
            (superclass, this)
        else {
            return Err(Self::error(keyword, "Can't use 'super' in a class with no superclass."));
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => {
                let bound: Function = found.bind(instance, &mut self.heap);
                Ok(Value::Callable(Callable::Function(Rc::new(bound))))
            }
            None => Err(Self::error(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    /// Calls `callee` with `args`, checking arity and call depth.  Errors are
    /// located at `paren`.
    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>, paren: &Token) -> IResult<Value> {
        let Value::Callable(callable) = callee else {
            return Err(Self::error(paren, "Can only call functions and classes."));
        };

        let arity = callable.arity();
        if !arity.accepts(args.len()) {
            return Err(Self::error(
                paren,
                format!("Expected {} arguments but got {}.", arity, args.len()),
            ));
        }

        if self.depth >= self.max_depth {
            return Err(Self::error(paren, "Stack overflow."));
        }

        self.depth += 1;

        let result: IResult<Value> = match callable {
            Callable::Function(function) => self.call_function(function, args),

            Callable::Native(native) => {
                debug!("Calling native function '{}'", native.name);
                (native.handler)(
                    self,
                    NativeCall {
                        receiver: &native.receiver,
                        args: &args,
                        paren,
                    },
                )
            }

            Callable::Class(class) => self.instantiate(class, args),
        };

        self.depth -= 1;
        result
    }

    fn call_function(&mut self, function: &Function, args: Vec<Value>) -> IResult<Value> {
        let env: EnvRef = self.heap.environment(Some(Rc::clone(&function.closure)));

        {
            let mut scope = env.borrow_mut();
            for (param, arg) in function.declaration.params.iter().zip(args) {
                scope.define(&param.lexeme, arg);
            }
        }

        let declaration: Rc<FunctionDecl> = Rc::clone(&function.declaration);

        let returned: Value = match self.execute_block(&declaration.body, env) {
            Ok(()) => Value::Nil,
            Err(InterpretError::ReturnSignal(value)) => value,
            Err(e) => return Err(e),
        };

        // Initializers always hand back the instance they were bound to.
        if function.is_initializer {
            return Ok(function.closure.borrow().lookup("this").unwrap_or(Value::Nil));
        }

        Ok(returned)
    }

    fn instantiate(&mut self, class: &Rc<Class>, args: Vec<Value>) -> IResult<Value> {
        debug!("Instantiating class '{}'", class.name);

        let instance = self.heap.instance(Some(Rc::clone(class)));

        if let Some(initializer) = class.find_method("init") {
            let bound: Function = initializer.bind(Rc::clone(&instance), &mut self.heap);
            self.call_function(&bound, args)?;
        }

        Ok(Value::Instance(instance))
    }

    fn error<S: Into<String>>(token: &Token, message: S) -> InterpretError {
        InterpretError::RuntimeError(LoxError::runtime(token.line, token.column, message))
    }
}
