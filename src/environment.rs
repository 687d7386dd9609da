use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub type EnvRef = Rc<RefCell<Environment>>;

/// One lexical scope: a name → value map plus a link to the enclosing scope.
#[derive(Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Binds `name` in this scope, replacing an existing binding.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Nearest binding of `name.lexeme` walking outward.
    pub fn get(&self, name: &Token) -> Result<Value> {
        self.lookup(&name.lexeme)
            .ok_or_else(|| Self::undefined(name, &name.lexeme))
    }

    /// Like [`get`](Self::get) for an implicit name such as `this`, with
    /// errors located at `at`.
    pub fn get_named(&self, name: &str, at: &Token) -> Result<Value> {
        self.lookup(name).ok_or_else(|| Self::undefined(at, name))
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.get(name) {
            Some(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().lookup(name)
        } else {
            None
        }
    }

    /// Overwrites the nearest existing binding; never creates one.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(Self::undefined(name, &name.lexeme))
        }
    }

    /// Drops every binding and the parent link.  Used by the heap to break
    /// closure cycles on teardown.
    pub(crate) fn clear(&mut self) -> (HashMap<String, Value>, Option<EnvRef>) {
        (
            std::mem::take(&mut self.values),
            self.enclosing.take(),
        )
    }

    fn undefined(at: &Token, name: &str) -> LoxError {
        LoxError::runtime(
            at.line,
            at.column,
            format!("Undefined variable '{}'.", name),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name, 2, 5)
    }

    #[test]
    fn inner_scope_shadows_and_assign_reaches_outer() {
        let outer: EnvRef = Rc::new(RefCell::new(Environment::new()));
        outer.borrow_mut().define("a", Value::Number(1.0));
        outer.borrow_mut().define("b", Value::Number(2.0));

        let mut inner = Environment::with_enclosing(Rc::clone(&outer));
        inner.define("a", Value::Number(10.0));

        inner.assign(&ident("b"), Value::Number(20.0)).unwrap();

        assert_eq!(inner.get(&ident("a")).unwrap(), Value::Number(10.0));
        assert_eq!(outer.borrow().get(&ident("a")).unwrap(), Value::Number(1.0));
        assert_eq!(outer.borrow().get(&ident("b")).unwrap(), Value::Number(20.0));
    }

    #[test]
    fn undefined_names_report_position() {
        let env = Environment::new();
        let err = env.get(&ident("missing")).unwrap_err();

        assert_eq!(
            err.to_string(),
            "[line 2, column 5] Runtime error: Undefined variable 'missing'."
        );

        let mut env = Environment::new();
        assert!(env.assign(&ident("missing"), Value::Nil).is_err());
    }
}
