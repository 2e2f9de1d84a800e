//! Abstract syntax tree for Lox programs.
//!
//! Both node families are closed sum types; every pass (resolver,
//! interpreter, printer) matches them exhaustively, so adding a variant is a
//! compile error until each pass handles it.
//!
//! Nodes that the resolver binds to a scope (`Variable`, `Assign`, `This`,
//! `Base`) carry an [`ExprId`]. The resolver's distance table is keyed by that
//! id, so two textually identical references stay distinct entries.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::token::Token;

static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

/// Identity of a resolvable expression node, minted once at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(usize);

impl ExprId {
    /// Allocate an id no other node in this process has.
    pub fn fresh() -> Self {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A **literal constant** that appears directly in the source code.
///
/// The parser copies the value out of the token at parse‑time.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal ‑ stored as IEEE‑754 `f64`.
    /// Integral lexemes such as `"3"` are still parsed as `3.0`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    /// The boolean constant `true`.
    True,

    /// The boolean constant `false`.
    False,

    /// The `nil` literal.
    Nil,
}

/// **Abstract‑Syntax‑Tree node** representing every kind of *expression*.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal constant: number, string, `true`, `false`, or `nil`.
    Literal(LiteralValue),

    /// Parenthesised sub‑expression: `"(" expression ")"`.
    Grouping(Box<Expr>),

    /// Prefix unary operator expression
    /// *Example:* `!isReady` or `-42`
    Unary {
        /// The operator token (`!` or `-`).
        operator: Token,
        /// Operand to which the operator is applied.
        right: Box<Expr>,
    },

    /// Infix binary operator expression
    /// *Example:* `a + b`, `x <= y`
    Binary {
        left: Box<Expr>,
        /// Operator token such as `+`, `*`, `==`, …
        operator: Token,
        right: Box<Expr>,
    },

    /// Short‑circuiting logical operators `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token, // `AND` or `OR`
        right: Box<Expr>,
    },

    /// Variable access.
    Variable { id: ExprId, name: Token },

    /// Assignment expression: `identifier "=" expression`
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },

    /// Function‑, method‑ or constructor‑call expression
    /// *Example:* `clock()` or `add(1, 2)`
    Call {
        /// Expression that evaluates to a callable (variable, property, etc.).
        callee: Box<Expr>,
        /// The closing `)` token ‑ retained for error reporting.
        paren: Token,
        /// Argument list (may be empty).
        arguments: Vec<Expr>,
    },

    /// object.property
    Get { object: Box<Expr>, name: Token },

    /// object.property = value
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    /// The `this` keyword inside a method.
    This { id: ExprId, keyword: Token },

    /// `base.method` inside a subclass method.
    Base {
        id: ExprId,
        keyword: Token,
        method: Token,
    },
}

/// A function or method declaration. Shared (`Rc`) between the statement list
/// and every closure built from it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Token,

    /// Parameter name tokens (arity ≤ 255).
    pub params: Vec<Token>,

    /// Body executed when the function is called.
    pub body: Vec<Stmt>,
}

/// **Abstract‑Syntax‑Tree node** for *statements*. A program is a sequence of
/// these nodes returned by [`crate::parser::Parser::parse`].
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Stand‑alone expression terminated by a semicolon.
    Expression(Expr),

    /// `print` statement used for output.
    Print(Expr),

    /// Variable declaration: `"var" IDENT ("=" initializer)? ";"`.
    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    /// Braced scope containing zero or more declarations/statements.
    Block(Vec<Stmt>),

    /// `if` / `else` conditional.
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// `while` loop. A desugared `for` loop keeps its increment here so that
    /// `continue` can still run it; the body and increment together behave as
    /// the scope `{ body ; increment }`.
    While {
        condition: Expr,
        body: Box<Stmt>,
        increment: Option<Box<Stmt>>,
    },

    /// `break;`
    Break(Token),

    /// `continue;`
    Continue(Token),

    /// Function declaration ‑ becomes a first‑class callable value.
    Function(Rc<FunctionDecl>),

    /// `return` statement inside a function body.
    Return {
        /// The `return` keyword token (for error locations).
        keyword: Token,

        /// Optional expression to return. Absent ⇒ `nil` is returned.
        value: Option<Expr>,
    },

    /// `class Name (< Base)? { methods }`
    Class {
        name: Token,

        /// Always an `Expr::Variable` when present.
        base: Option<Expr>,

        methods: Vec<Rc<FunctionDecl>>,
    },
}
