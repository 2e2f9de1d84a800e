#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use rox::ast::Stmt;
use rox::error::LoxError;
use rox::interpreter::Interpreter;
use rox::parser::parse;
use rox::resolver::{resolve, Locals};
use rox::scanner::scan;

/// Print sink the tests can read back after the interpreter took ownership
/// of its clone.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_owned).collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Scan and parse, failing the test on any static diagnostic.
pub fn parse_ok(source: &str) -> Vec<Stmt> {
    let (tokens, lex_errors) = scan(source);
    assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);

    let (statements, parse_errors) = parse(&tokens);
    assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);

    statements
}

/// Static diagnostics, rendered. Like the driver, resolution only runs when
/// scanning and parsing were clean.
pub fn static_errors(source: &str) -> Vec<String> {
    let (tokens, lex_errors) = scan(source);
    let (statements, parse_errors) = parse(&tokens);

    let errors: Vec<LoxError> = if lex_errors.is_empty() && parse_errors.is_empty() {
        let (_, resolve_errors): (Locals, Vec<LoxError>) = resolve(&statements);
        resolve_errors
    } else {
        lex_errors.into_iter().chain(parse_errors).collect()
    };

    errors.iter().map(ToString::to_string).collect()
}

/// A fresh interpreter writing into a readable buffer.
pub fn interpreter() -> (Interpreter, SharedBuf) {
    let out = SharedBuf::default();
    (Interpreter::with_output(out.clone()), out)
}

/// Runs one unit on `interpreter`, the way the REPL does.
pub fn run_on(interpreter: &mut Interpreter, source: &str) -> Result<(), LoxError> {
    let statements = parse_ok(source);

    let (locals, resolve_errors) = resolve(&statements);
    assert!(resolve_errors.is_empty(), "resolve errors: {:?}", resolve_errors);

    interpreter.resolve(locals);
    interpreter.interpret(&statements)
}

/// Runs a whole program, returning printed lines and the runtime result.
pub fn run(source: &str) -> (Vec<String>, Result<(), LoxError>) {
    let (mut interpreter, out) = interpreter();
    let result = run_on(&mut interpreter, source);
    (out.lines(), result)
}
