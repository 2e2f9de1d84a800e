//! Callable values: the [`Callable`] capability, host‑provided natives, and
//! user functions (closures).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::ast::FunctionDecl;
use crate::class::LoxInstance;
use crate::environment::{EnvRef, Environment};
use crate::error::Result;
use crate::interpreter::{Flow, Interpreter};
use crate::value::Value;

/// Anything that can appear in callee position.
pub trait Callable {
    /// Exact number of arguments the callee accepts.
    fn arity(&self) -> usize;

    /// Invoke with already‑evaluated arguments. The caller has checked
    /// `arguments.len() == self.arity()`.
    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value>;
}

/// A function implemented by the host, such as `clock`.
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: fn(&[Value]) -> Value,
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(&self, _interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!("Calling native function '{}'", self.name);
        Ok((self.func)(&arguments))
    }
}

/// A user‑defined function or method together with the environment it
/// closed over.
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

    /// A copy of this method whose closure has `this` bound to `instance`.
    /// Every call produces a distinct function value.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>) -> LoxFunction {
        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));
        environment.define("this", Value::Instance(instance));

        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: environment.into_ref(),
            is_initializer: self.is_initializer,
        }
    }

    fn bound_this(&self) -> Value {
        Environment::get_named_at(&self.closure, 0, "this").unwrap_or(Value::Nil)
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!("Calling user-defined function '{}'", self.name());

        // Parameters live in a fresh frame over the *closure*, never over the
        // caller's environment.
        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));

        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.define(&param.lexeme, argument);
        }

        let flow: Flow = interpreter.execute_block(&self.declaration.body, environment.into_ref())?;

        if self.is_initializer {
            return Ok(self.bound_this());
        }

        match flow {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Nil),
        }
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}
