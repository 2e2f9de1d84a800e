use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::slice;

use chrono::Utc;
use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::class::{LoxClass, LoxInstance, INITIALIZER};
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::function::{LoxFunction, NativeFunction};
use crate::resolver::Locals;
use crate::stack::ensure_sufficient_stack;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Deepest chain of nested calls before the program is stopped with
/// `Stack overflow.`.
pub const MAX_CALL_DEPTH: usize = 1024;

/// How a statement finished. Anything but `Normal` unwinds enclosing
/// statements until a loop or a call consumes it.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    locals: Locals,
    out: Box<dyn Write>,
    call_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates an Interpreter printing to stdout.
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }

    /// Creates an Interpreter whose `print` statements write to `out`, and
    /// defines native functions such as `clock`.
    pub fn with_output<W: Write + 'static>(out: W) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Environment::new().into_ref();

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction(Rc::new(NativeFunction {
                name: "clock",
                arity: 0,
                func: clock,
            })),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            out: Box::new(out),
            call_depth: 0,
        }
    }

    /// Adds resolution distances for the next unit. The table is never
    /// pruned and grows for the life of a REPL session: closures from earlier
    /// units may still run and need their entries.
    pub fn resolve(&mut self, locals: Locals) {
        debug!("Recording {} resolved local(s)", locals.len());
        self.locals.extend(locals);
    }

    /// Interprets a list of statements (a "program"). The first runtime
    /// error stops the unit; output written before it stays written.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        self.environment = Rc::clone(&self.globals);

        for stmt in statements {
            if let Err(err) = self.execute(stmt) {
                debug!("Unit aborted: {}", err);
                self.reset();
                self.out.flush()?;
                return Err(err);
            }
        }

        self.out.flush()?;
        info!("Interpretation completed successfully");
        Ok(())
    }

    /// Evaluates a single expression at global scope.
    pub fn evaluate_expression(&mut self, expr: &Expr) -> Result<Value> {
        self.environment = Rc::clone(&self.globals);

        let value = self.evaluate(expr);
        if value.is_err() {
            self.reset();
        }
        value
    }

    fn reset(&mut self) {
        self.environment = Rc::clone(&self.globals);
        self.call_depth = 0;
    }

    /// Executes a single statement.
    fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        ensure_sufficient_stack(|| match stmt {
            Stmt::Expression(expr) => {
                debug!("Evaluating expression statement");
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                debug!("Evaluating print statement");
                let value: Value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
                info!("Printed value: {}", value);
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                debug!("Defining variable '{}'", name.lexeme);
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                debug!("Entering block with {} statements", statements.len());
                let frame = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(statements, frame.into_ref())
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    debug!("Condition is truthy; executing then branch");
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    debug!("Condition is falsy; executing else branch");
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While {
                condition,
                body,
                increment,
            } => match increment.as_deref() {
                Some(increment) => self.execute_for(condition, body, increment),
                None => self.execute_while(condition, body),
            },

            Stmt::Break(_) => Ok(Flow::Break),

            Stmt::Continue(_) => Ok(Flow::Continue),

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);
                let function = LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment), false);
                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                Ok(Flow::Return(value))
            }

            Stmt::Class {
                name,
                base,
                methods,
            } => self.execute_class(name, base.as_ref(), methods),
        })
    }

    /// Runs `statements` with `environment` as the current frame. The previous
    /// frame is restored on every exit, errors included.
    pub(crate) fn execute_block(&mut self, statements: &[Stmt], environment: EnvRef) -> Result<Flow> {
        let previous: EnvRef = std::mem::replace(&mut self.environment, environment);

        let mut result: Result<Flow> = Ok(Flow::Normal);
        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;
        result
    }

    fn execute_while(&mut self, condition: &Expr, body: &Stmt) -> Result<Flow> {
        debug!("Entering while loop");

        while self.evaluate(condition)?.is_truthy() {
            match self.execute(body)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
        }

        info!("Exited while loop");
        Ok(Flow::Normal)
    }

    /// A desugared `for`. The current frame is the loop frame holding the
    /// loop variable; it is replaced by a copy after every iteration so each
    /// iteration's closures keep their own binding.
    fn execute_for(&mut self, condition: &Expr, body: &Stmt, increment: &Stmt) -> Result<Flow> {
        debug!("Entering for loop");

        let entry: EnvRef = Rc::clone(&self.environment);
        let result = self.run_for(condition, body, increment);
        self.environment = entry;

        info!("Exited for loop");
        result
    }

    fn run_for(&mut self, condition: &Expr, body: &Stmt, increment: &Stmt) -> Result<Flow> {
        while self.evaluate(condition)?.is_truthy() {
            let frame = Environment::with_enclosing(Rc::clone(&self.environment));

            match self.execute_block(slice::from_ref(body), frame.into_ref())? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }

            let next: Environment = self.environment.borrow().clone();
            self.environment = next.into_ref();

            let frame = Environment::with_enclosing(Rc::clone(&self.environment));
            self.execute_block(slice::from_ref(increment), frame.into_ref())?;
        }

        Ok(Flow::Normal)
    }

    fn execute_class(
        &mut self,
        name: &Token,
        base: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<Flow> {
        debug!("Defining class '{}'", name.lexeme);

        self.environment.borrow_mut().define(&name.lexeme, Value::Nil);

        let base_class: Option<Rc<LoxClass>> = match base {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let at: &Token = match expr {
                        Expr::Variable { name, .. } => name,
                        _ => name,
                    };
                    return Err(LoxError::runtime(at, "Base class must be a class."));
                }
            },
            None => None,
        };

        let enclosing: EnvRef = Rc::clone(&self.environment);

        if let Some(base) = &base_class {
            let mut frame = Environment::with_enclosing(Rc::clone(&enclosing));
            frame.define("base", Value::Class(Rc::clone(base)));
            self.environment = frame.into_ref();
        }

        let table: HashMap<String, Rc<LoxFunction>> = methods
            .iter()
            .map(|method| {
                let function = LoxFunction::new(
                    Rc::clone(method),
                    Rc::clone(&self.environment),
                    method.name.lexeme == INITIALIZER,
                );
                (method.name.lexeme.clone(), Rc::new(function))
            })
            .collect();

        self.environment = enclosing;

        let class = LoxClass::new(name.lexeme.clone(), base_class, table);
        self.environment
            .borrow_mut()
            .assign(name, Value::Class(Rc::new(class)))?;

        info!("Class '{}' defined with {} method(s)", name.lexeme, methods.len());
        Ok(Flow::Normal)
    }

    /// Evaluates an expression and returns a Value.
    fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        ensure_sufficient_stack(|| match expr {
            Expr::Literal(literal) => Ok(evaluate_literal(literal)),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val: Value = self.evaluate(left)?;
                let decided: bool = if operator.token_type == TokenType::OR {
                    left_val.is_truthy()
                } else {
                    !left_val.is_truthy()
                };

                if decided {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(&self.environment, distance, name, value.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                debug!("Assigned value {} to '{}'", value, name.lexeme);
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                debug!("Evaluating function call");
                let callee_val: Value = self.evaluate(callee)?;

                let mut arg_values: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    arg_values.push(self.evaluate(arg)?);
                }

                self.invoke_callable(&callee_val, paren, arg_values)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),
                _ => Err(LoxError::runtime(name, "Only instances have properties.")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name, "Only instances have fields."));
                };

                let value: Value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());
                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Base {
                id,
                keyword,
                method,
            } => self.evaluate_base(*id, keyword, method),
        })
    }

    /// Evaluates a unary expression.
    fn evaluate_unary(&mut self, op: &Token, expr: &Expr) -> Result<Value> {
        let right_val: Value = self.evaluate(expr)?;

        match op.token_type {
            TokenType::MINUS => match right_val {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(LoxError::runtime(op, "Operand must be a number.")),
            },
            TokenType::BANG => Ok(Value::Bool(!right_val.is_truthy())),
            _ => Err(LoxError::runtime(op, "Invalid unary operator.")),
        }
    }

    /// Evaluates a binary expression.
    fn evaluate_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value> {
        let left_val: Value = self.evaluate(left)?;
        let right_val: Value = self.evaluate(right)?;
        debug!("Left operand: {}, Right operand: {}", left_val, right_val);

        match op.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err(LoxError::runtime(
                    op,
                    "Operands must be two numbers or two strings.",
                )),
            },
            TokenType::MINUS => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Number(a - b))
            }
            TokenType::STAR => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Number(a * b))
            }
            TokenType::SLASH => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                if b == 0.0 {
                    return Err(LoxError::runtime(op, "Division by zero."));
                }
                Ok(Value::Number(a / b))
            }
            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),
            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),
            TokenType::LESS => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Bool(a < b))
            }
            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Bool(a <= b))
            }
            TokenType::GREATER => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Bool(a > b))
            }
            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Bool(a >= b))
            }
            _ => Err(LoxError::runtime(op, "Invalid binary operator.")),
        }
    }

    /// Resolved locals read the exact frame; everything else is a global.
    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        let value: Value = match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, name)?,
            None => self.globals.borrow().get(name)?,
        };

        debug!("Variable '{}' evaluated to: {}", name.lexeme, value);
        Ok(value)
    }

    /// `base.method`: the method as found on the base class, bound to the
    /// current `this`.
    fn evaluate_base(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let undefined = |what: &str| LoxError::runtime(keyword, format!("Undefined variable '{}'.", what));

        let distance: usize = *self.locals.get(&id).ok_or_else(|| undefined("base"))?;

        let Value::Class(base) = Environment::get_at(&self.environment, distance, keyword)? else {
            return Err(undefined("base"));
        };

        let this: Option<Value> = distance
            .checked_sub(1)
            .and_then(|d| Environment::get_named_at(&self.environment, d, "this"));
        let Some(Value::Instance(instance)) = this else {
            return Err(undefined("this"));
        };

        match base.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => Err(LoxError::runtime(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    /// Invokes a callable (native, user-defined function, or class).
    fn invoke_callable(
        &mut self,
        callee_val: &Value,
        paren_token: &Token,
        arg_values: Vec<Value>,
    ) -> Result<Value> {
        let Some(callable) = callee_val.as_callable() else {
            return Err(LoxError::runtime(
                paren_token,
                "Can only call functions and classes.",
            ));
        };

        if arg_values.len() != callable.arity() {
            return Err(LoxError::runtime(
                paren_token,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    arg_values.len()
                ),
            ));
        }

        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(LoxError::runtime(paren_token, "Stack overflow."));
        }

        self.call_depth += 1;
        let result = callable.call(self, arg_values);
        self.call_depth -= 1;

        result
    }
}

fn evaluate_literal(literal: &LiteralValue) -> Value {
    match literal {
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::Str(s) => Value::String(s.clone()),
        LiteralValue::True => Value::Bool(true),
        LiteralValue::False => Value::Bool(false),
        LiteralValue::Nil => Value::Nil,
    }
}

fn number_operands(op: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(LoxError::runtime(op, "Operands must be numbers.")),
    }
}

/// Seconds since the Unix epoch, with millisecond precision.
fn clock(_args: &[Value]) -> Value {
    let timestamp: f64 = Utc::now().timestamp_millis() as f64 / 1000.0;
    debug!("Native function 'clock' returned: {}", timestamp);
    Value::Number(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::resolver::resolve;
    use crate::scanner::scan;
    use std::cell::RefCell;

    #[derive(Clone, Default)]
    struct Capture(Rc<RefCell<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).into_owned()
        }
    }

    fn run_unit(interpreter: &mut Interpreter, source: &str) -> Result<()> {
        let (tokens, _) = scan(source);
        let (stmts, _) = parse(&tokens);
        let (locals, _) = resolve(&stmts);
        interpreter.resolve(locals);
        interpreter.interpret(&stmts)
    }

    #[test]
    fn error_restores_global_scope() {
        let capture = Capture::default();
        let mut interpreter = Interpreter::with_output(capture.clone());

        assert!(run_unit(&mut interpreter, "var g = 1; { var g = 2; print g / 0; }").is_err());
        assert!(Rc::ptr_eq(&interpreter.environment, &interpreter.globals));

        run_unit(&mut interpreter, "print g;").unwrap();
        assert_eq!(capture.text(), "1\n");
    }

    #[test]
    fn unbounded_recursion_is_a_runtime_error() {
        let mut interpreter = Interpreter::with_output(Capture::default());

        let err = run_unit(&mut interpreter, "fun f() { f(); } f();").unwrap_err();
        assert!(err.is_runtime());
        assert_eq!(err.message(), "Stack overflow.");
        assert_eq!(interpreter.call_depth, 0);

        // the cap is per unit, so the next one can call again
        run_unit(&mut interpreter, "fun g() { return 1; } g();").unwrap();
    }
}
