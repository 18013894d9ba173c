use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::class::LoxInstance;
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::interpreter::{Flow, Interpreter};
use crate::stmt::FunctionDecl;
use crate::value::Value;

/// Signature of a builtin implemented in Rust.
pub type NativeFn = fn(&[Value]) -> std::result::Result<Value, String>;

/// A builtin function such as `clock`.
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: NativeFn,
}

impl NativeFunction {
    pub fn call(&self, arguments: &[Value]) -> std::result::Result<Value, String> {
        debug!("Calling native function '{}'", self.name);

        (self.func)(arguments)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

/// A user‑defined function or method together with the frame it closes over.
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: EnvRef,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvRef, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// A copy of this method whose closure is a fresh frame defining `this`.
    pub fn bind(&self, instance: Rc<LoxInstance>) -> LoxFunction {
        let mut env = Environment::with_enclosing(Rc::clone(&self.closure));
        env.define("this", Value::Instance(instance));

        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: env.into_ref(),
            is_initializer: self.is_initializer,
        }
    }

    /// Run the body in a new frame whose parent is the closure.  Arity has
    /// already been checked by the caller.
    pub fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!(
            "Calling '{}' with {} argument(s)",
            self.name(),
            arguments.len()
        );

        let mut env = Environment::with_enclosing(Rc::clone(&self.closure));

        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            env.define(&param.lexeme, argument);
        }

        let flow: Flow = interpreter.execute_block(&self.declaration.body, env.into_ref())?;

        // An initializer always yields its instance, even on a bare `return;`.
        if self.is_initializer {
            return Environment::get_at(&self.closure, 0, "this").ok_or_else(|| {
                LoxError::runtime(&self.declaration.name, "Initializer has no bound 'this'.")
            });
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fun {}>", self.name())
    }
}

// Closure omitted: its frames can reach this function again.
impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoxFunction")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .field("is_initializer", &self.is_initializer)
            .finish()
    }
}
