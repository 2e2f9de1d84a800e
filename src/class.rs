//! Classes and instances: single inheritance, methods bound on lookup,
//! fields created on first assignment.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{LoxError, Result};
use crate::function::{Callable, LoxFunction};
use crate::interpreter::Interpreter;
use crate::token::Token;
use crate::value::Value;

/// Name of the method run by the constructor.
pub const INITIALIZER: &str = "init";

pub struct LoxClass {
    pub name: String,
    base: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(
        name: String,
        base: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
    ) -> Self {
        Self {
            name,
            base,
            methods,
        }
    }

    /// Unbound method lookup, own table first, then up the base chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        match self.methods.get(name) {
            Some(method) => Some(Rc::clone(method)),
            None => self.base.as_ref()?.find_method(name),
        }
    }
}

impl Callable for Rc<LoxClass> {
    fn arity(&self) -> usize {
        self.find_method(INITIALIZER).map_or(0, |init| init.arity())
    }

    /// Constructs a fresh instance and runs `init` on it. The result is always
    /// the instance, whatever the initializer returned.
    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!("Constructing instance of '{}'", self.name);

        let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(self))));

        if let Some(initializer) = self.find_method(INITIALIZER) {
            initializer
                .bind(Rc::clone(&instance))
                .call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class(&self) -> &Rc<LoxClass> {
        &self.class
    }

    /// Property read: a field if one is set, else a method bound to
    /// `instance`.
    pub fn get(instance: &Rc<RefCell<LoxInstance>>, name: &Token) -> Result<Value> {
        if let Some(value) = instance.borrow().fields.get(&name.lexeme) {
            return Ok(value.clone());
        }

        let method: Option<Rc<LoxFunction>> = instance.borrow().class.find_method(&name.lexeme);

        match method {
            Some(method) => Ok(Value::Function(Rc::new(method.bind(Rc::clone(instance))))),
            None => Err(LoxError::runtime(
                name,
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }

    /// Property write. Always lands in this instance's own field table.
    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}
