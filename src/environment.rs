use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;
use log::trace;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to a scope frame. Closures, bound methods and active calls
/// all hold one; the frame lives as long as the longest holder.
pub type EnvRef = Rc<RefCell<Environment>>;

/// One scope frame: a name → value map plus the lexically enclosing frame.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    /// A frame with no parent: the global scope.
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

    /// Wrap into a shareable handle.
    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    /// Bind `name` in this frame, shadowing or overwriting silently.
    pub fn define(&mut self, name: &str, value: Value) {
        trace!("define {} = {}", name, value);
        self.values.insert(name.to_string(), value);
    }

    /// Dynamic lookup through the whole chain. Used for globals.
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    /// Dynamic assignment through the whole chain. Used for globals.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// The frame `distance` enclosing links away from `env`.
    pub fn ancestor(env: &EnvRef, distance: usize) -> Option<EnvRef> {
        let mut frame: EnvRef = Rc::clone(env);

        for _ in 0..distance {
            let parent: EnvRef = frame.borrow().enclosing.clone()?;
            frame = parent;
        }

        Some(frame)
    }

    /// Read `name` from exactly the frame the resolver pointed at.
    pub fn get_at(env: &EnvRef, distance: usize, name: &Token) -> Result<Value> {
        Self::get_named_at(env, distance, &name.lexeme).ok_or_else(|| undefined(name))
    }

    /// Like [`get_at`](Self::get_at) for the implicit `this`/`base` slots,
    /// which have no token of their own.
    pub fn get_named_at(env: &EnvRef, distance: usize, name: &str) -> Option<Value> {
        let frame: EnvRef = Self::ancestor(env, distance)?;
        let value: Option<Value> = frame.borrow().values.get(name).cloned();
        value
    }

    /// Write `name` into exactly the frame the resolver pointed at.
    pub fn assign_at(env: &EnvRef, distance: usize, name: &Token, value: Value) -> Result<()> {
        let frame: EnvRef = Self::ancestor(env, distance).ok_or_else(|| undefined(name))?;
        let mut frame = frame.borrow_mut();

        match frame.values.get_mut(&name.lexeme) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name)),
        }
    }
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name, 1)
    }

    #[test]
    fn get_walks_the_chain() {
        let globals = Environment::new().into_ref();
        globals.borrow_mut().define("a", Value::Number(1.0));

        let inner = Environment::with_enclosing(Rc::clone(&globals));
        assert_eq!(inner.get(&ident("a")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn undefined_variable_is_a_runtime_error() {
        let env = Environment::new();
        let err = env.get(&ident("nope")).unwrap_err();
        assert_eq!(err.message(), "Undefined variable 'nope'.");
        assert!(err.is_runtime());
    }

    #[test]
    fn get_at_skips_shadowing_frames() {
        let outer = Environment::new().into_ref();
        outer.borrow_mut().define("x", Value::Number(1.0));

        let inner = Environment::with_enclosing(Rc::clone(&outer)).into_ref();
        inner.borrow_mut().define("x", Value::Number(2.0));

        assert_eq!(
            Environment::get_at(&inner, 1, &ident("x")).unwrap(),
            Value::Number(1.0)
        );
        assert_eq!(
            Environment::get_at(&inner, 0, &ident("x")).unwrap(),
            Value::Number(2.0)
        );
    }

    #[test]
    fn assign_at_writes_the_target_frame_only() {
        let outer = Environment::new().into_ref();
        outer.borrow_mut().define("x", Value::Nil);

        let inner = Environment::with_enclosing(Rc::clone(&outer)).into_ref();
        inner.borrow_mut().define("x", Value::Nil);

        Environment::assign_at(&inner, 1, &ident("x"), Value::Bool(true)).unwrap();

        assert_eq!(
            Environment::get_at(&outer, 0, &ident("x")).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            Environment::get_at(&inner, 0, &ident("x")).unwrap(),
            Value::Nil
        );
    }

    #[test]
    fn assign_to_missing_global_fails() {
        let mut env = Environment::new();
        assert!(env.assign(&ident("ghost"), Value::Nil).is_err());
    }

    #[test]
    fn ancestor_past_the_root_is_none() {
        let env = Environment::new().into_ref();
        assert!(Environment::ancestor(&env, 1).is_none());
    }
}
