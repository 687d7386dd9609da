//! Static resolver pass for the **Rox** interpreter.
//!
//! Pure validation: one AST walk that builds lexical scopes (a stack of
//! `HashMap<&str, bool>` tracking declared/defined) and reports static
//! errors before any code runs:
//!
//! - re‑declaring a name twice in one textual scope,
//! - reading a local in its own initializer,
//! - `return` outside a function, `return <value>` inside `init`,
//! - `this` / `super` outside a class, `super` without a superclass,
//! - a class inheriting from itself.
//!
//! The interpreter does a plain environment‑chain walk per lookup, so no
//! binding distances are recorded here.  The outermost scope is the global
//! one and is checked like any other.

use crate::ast::{Expr, FunctionDecl, Stmt};
use crate::error::{LoxError, Result};
use crate::token::Token;
use log::{debug, info};
use std::collections::HashMap;

/// What kind of function body are we in?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

/// What kind of class body are we in?  Used to validate `this` / `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Resolver: tracks scopes and enforces static rules.
pub struct Resolver<'a> {
    scopes: Vec<HashMap<&'a str, bool>>, // false=declared, true=defined
    current_function: FunctionType,
    current_class: ClassType,
}

impl Default for Resolver<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Resolver<'a> {
    /// Create a new resolver with the global scope already open.
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: vec![HashMap::new()],
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Walk all top‑level statements, aborting at the first error.
    pub fn resolve_all(&mut self, statements: &'a [Stmt]) -> Result<()> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &'a Stmt) -> Result<()> {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s)?;
                }
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define
                self.declare(name)?;
                if let Some(expr) = initializer {
                    self.resolve_expr(expr)?;
                }
                self.define(name);
            }

            Stmt::Function(function) => {
                // The name is visible *inside* its own body to allow recursion.
                if let Some(name) = &function.name {
                    self.declare(name)?;
                    self.define(name);
                }
                self.resolve_function(function, FunctionType::Function)?;
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods)?,

            Stmt::Expression(expr) => {
                self.resolve_expr(expr)?;
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb)?;
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(body)?;
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    return Err(Self::error(keyword, "Can't return from top-level code."));
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        return Err(Self::error(
                            keyword,
                            "Can't return a value from an initializer.",
                        ));
                    }

                    self.resolve_expr(expr)?;
                }
            }
        }

        Ok(())
    }

    fn resolve_class(
        &mut self,
        name: &'a Token,
        superclass: Option<&'a Token>,
        methods: &'a [std::rc::Rc<FunctionDecl>],
    ) -> Result<()> {
        debug!("Resolving class '{}'", name.lexeme);

        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name)?;
        self.define(name);

        if let Some(superclass) = superclass {
            if superclass.lexeme == name.lexeme {
                return Err(Self::error(superclass, "A class can't inherit from itself."));
            }

            self.current_class = ClassType::Subclass;
            self.check_initialized(superclass)?;

            // `super` lives one scope outside `this` so each can be shadowed.
            self.begin_scope();
            self.define_keyword("super");
        }

        self.begin_scope();
        self.define_keyword("this");

        for method in methods {
            let kind: FunctionType = if method.name() == Some("init") {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            self.resolve_function(method, kind)?;
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &'a Expr) -> Result<()> {
        match expr {
            Expr::Literal(_) => {}

            Expr::This(_) | Expr::Super { .. } => self.check_class_keyword(expr)?,

            Expr::Grouping(inner) => self.resolve_expr(inner)?,

            Expr::Unary { right, .. } => self.resolve_expr(right)?,

            Expr::Typeof { operand, .. } => self.resolve_expr(operand)?,

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }

            Expr::Variable(tok) => self.check_initialized(tok)?,

            Expr::Assign { value, .. } => self.resolve_expr(value)?,

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;
                for arg in arguments {
                    self.resolve_expr(arg)?;
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object)?,

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value)?;
                self.resolve_expr(object)?;
            }

            Expr::Array { elements, .. } => {
                for element in elements {
                    self.resolve_expr(element)?;
                }
            }

            Expr::Function(function) => {
                self.resolve_function(function, FunctionType::Function)?;
            }
        }

        Ok(())
    }

    /// `this` and `super` are only meaningful inside a class body.
    fn check_class_keyword(&self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::This(keyword) if self.current_class == ClassType::None => {
                Err(Self::error(keyword, "Can't use 'this' outside of a class."))
            }

            Expr::Super { keyword, .. } => match self.current_class {
                ClassType::None => Err(Self::error(keyword, "Can't use 'super' outside of a class.")),
                ClassType::Class => Err(Self::error(
                    keyword,
                    "Can't use 'super' in a class with no superclass.",
                )),
                ClassType::Subclass => Ok(()),
            },

            _ => Ok(()),
        }
    }

    /// Reject reading a name that is declared but not yet defined in the
    /// innermost scope (i.e. inside its own initializer).
    fn check_initialized(&self, name: &Token) -> Result<()> {
        if let Some(scope) = self.scopes.last() {
            if scope.get(name.lexeme.as_str()) == Some(&false) {
                return Err(Self::error(
                    name,
                    "Can't read local variable in its own initializer.",
                ));
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    fn resolve_function(&mut self, function: &'a FunctionDecl, kind: FunctionType) -> Result<()> {
        debug!(
            "Resolving {:?} '{}'",
            kind,
            function.name().unwrap_or("<anonymous>")
        );

        let enclosing = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &function.params {
            self.declare(param)?;
            self.define(param);
        }
        for stmt in &function.body {
            self.resolve_stmt(stmt)?;
        }
        self.end_scope();

        self.current_function = enclosing;

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &'a Token) -> Result<()> {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(name.lexeme.as_str()) {
                return Err(Self::error(
                    name,
                    "Already a variable with this name in this scope.",
                ));
            }
            scope.insert(name.lexeme.as_str(), false);
        }

        Ok(())
    }

    fn define(&mut self, name: &'a Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.as_str(), true);
        }
    }

    fn define_keyword(&mut self, keyword: &'static str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(keyword, true);
        }
    }

    fn error(token: &Token, message: &str) -> LoxError {
        LoxError::resolve(token.line, token.column, message)
    }
}
