use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to a scope frame.  Every closure that captured the frame
/// holds one; the frame is dropped with the last holder.
pub type EnvRef = Rc<RefCell<Environment>>;

/// One lexical scope frame: name → value, plus the enclosing frame
/// (`None` for the global frame).
#[derive(Debug, Default)]
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

    /// Wrap into a shared handle.
    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    /// Bind `name` in this frame.  Re‑defining overwrites.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Dynamic lookup along the enclosing chain.  The interpreter only uses
    /// it on the global frame, where the chain is just that frame.
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(LoxError::runtime(
                name,
                format!("Undefined variable '{}'.", name.lexeme),
            ))
        }
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(LoxError::runtime(
                name,
                format!("Undefined variable '{}'.", name.lexeme),
            ))
        }
    }

    /// The frame `distance` hops up from `env` (0 is `env` itself).
    pub fn ancestor(env: &EnvRef, distance: usize) -> Option<EnvRef> {
        let mut current: EnvRef = Rc::clone(env);

        for _ in 0..distance {
            let next: EnvRef = current.borrow().enclosing.clone()?;
            current = next;
        }

        Some(current)
    }

    /// Read `name` from exactly the frame `distance` hops up.
    pub fn get_at(env: &EnvRef, distance: usize, name: &str) -> Option<Value> {
        let frame: EnvRef = Self::ancestor(env, distance)?;
        let frame = frame.borrow();

        frame.values.get(name).cloned()
    }

    /// Overwrite `name` in exactly the frame `distance` hops up.
    /// Returns `false` if that frame does not hold `name`.
    pub fn assign_at(env: &EnvRef, distance: usize, name: &str, value: Value) -> bool {
        let Some(frame) = Self::ancestor(env, distance) else {
            return false;
        };

        let mut frame = frame.borrow_mut();

        match frame.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name, 1)
    }

    #[test]
    fn define_overwrites_existing_binding() {
        let mut env = Environment::new();
        env.define("a", Value::Number(1.0));
        env.define("a", Value::Number(2.0));

        assert_eq!(env.get(&ident("a")).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn undefined_lookup_is_a_runtime_error() {
        let env = Environment::new();
        let err = env.get(&ident("missing")).unwrap_err();

        assert!(err.is_runtime());
        assert_eq!(err.message(), "Undefined variable 'missing'.");
    }

    #[test]
    fn distance_addresses_exact_frame() {
        let global = Environment::new().into_ref();
        global.borrow_mut().define("x", Value::from("global"));

        let inner = Environment::with_enclosing(Rc::clone(&global)).into_ref();
        inner.borrow_mut().define("x", Value::from("inner"));

        assert_eq!(Environment::get_at(&inner, 0, "x"), Some(Value::from("inner")));
        assert_eq!(Environment::get_at(&inner, 1, "x"), Some(Value::from("global")));
        assert_eq!(Environment::get_at(&inner, 2, "x"), None);

        assert!(Environment::assign_at(&inner, 1, "x", Value::Nil));
        assert_eq!(global.borrow().get(&ident("x")).unwrap(), Value::Nil);
        assert!(!Environment::assign_at(&inner, 0, "y", Value::Nil));
    }

    #[test]
    fn assign_walks_to_enclosing_frame() {
        let global = Environment::new().into_ref();
        global.borrow_mut().define("n", Value::Number(1.0));

        let mut inner = Environment::with_enclosing(Rc::clone(&global));
        inner.assign(&ident("n"), Value::Number(5.0)).unwrap();

        assert_eq!(global.borrow().get(&ident("n")).unwrap(), Value::Number(5.0));
        assert!(inner.assign(&ident("nope"), Value::Nil).is_err());
    }
}
