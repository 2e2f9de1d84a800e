//! Static resolver pass for the **Lox** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<String, bool>` tracking declared/defined).
//! 2. Report static errors (self‑reading initializers, redeclaration, misplaced
//!    `return`/`this`/`base`/`break`/`continue`, self‑inheritance). Loop
//!    placement is re‑checked here so hand‑built statement lists are covered.
//! 3. Record, for *each* resolvable reference, how many scopes separate it
//!    from its binding, so the interpreter never falls back to a dynamic
//!    lookup that would see a later shadowing local.
//!
//! Errors are collected, never thrown: the pass always walks the whole
//! program.

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::class::INITIALIZER;
use crate::error::LoxError;
use crate::stack::ensure_sufficient_stack;
use crate::token::Token;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Resolution distances keyed by node identity. References with no entry are
/// globals.
pub type Locals = HashMap<ExprId, usize>;

/// What kind of function body we are in. Gates `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

/// What kind of class body we are in. Gates `this` and `base`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and records binding
/// distances.
pub struct Resolver {
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    initializing_globals: HashSet<String>,
    current_function: FunctionType,
    current_class: ClassType,
    loop_depth: usize,
    locals: Locals,
    errors: Vec<LoxError>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        info!("Resolver instantiated");
        Resolver {
            scopes: Vec::new(),
            initializing_globals: HashSet::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            loop_depth: 0,
            locals: Locals::new(),
            errors: Vec::new(),
        }
    }

    /// Walk all top‑level statements, returning the distance table and every
    /// diagnostic found.
    pub fn resolve(mut self, statements: &[Stmt]) -> (Locals, Vec<LoxError>) {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        self.resolve_stmts(statements);

        info!(
            "Resolved {} local reference(s) with {} error(s)",
            self.locals.len(),
            self.errors.len()
        );

        (self.locals, self.errors)
    }

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.errors.push(LoxError::resolve(token, message));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        ensure_sufficient_stack(|| match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Function(decl) => {
                // the name is visible *inside* its own body (recursion)
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionType::Function);
            }

            Stmt::Class {
                name,
                base,
                methods,
            } => self.resolve_class(name, base.as_ref(), methods),

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While {
                condition,
                body,
                increment,
            } => {
                self.resolve_expr(condition);
                self.loop_depth += 1;

                match increment.as_deref() {
                    // for‑loop: body and increment share one scope, exactly
                    // as if written `{ body ; increment }`
                    Some(increment) => {
                        self.begin_scope();
                        self.resolve_stmt(body);
                        self.resolve_stmt(increment);
                        self.end_scope();
                    }
                    None => self.resolve_stmt(body),
                }

                self.loop_depth -= 1;
            }

            Stmt::Break(keyword) | Stmt::Continue(keyword) => {
                if self.loop_depth == 0 {
                    let message = format!("Must be inside a loop to use '{}'.", keyword.lexeme);
                    self.error(keyword, &message);
                }
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(expr);
                }
            }
        })
    }

    fn resolve_class(&mut self, name: &Token, base: Option<&Expr>, methods: &[Rc<FunctionDecl>]) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(base_expr) = base {
            if let Expr::Variable { name: base_name, .. } = base_expr {
                if base_name.lexeme == name.lexeme {
                    self.error(base_name, "A class can't inherit from itself.");
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(base_expr);

            self.begin_scope();
            self.bind_implicit("base");
        }

        self.begin_scope();
        self.bind_implicit("this");

        for method in methods {
            let kind = if method.name.lexeme == INITIALIZER {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            self.resolve_function(method, kind);
        }

        self.end_scope();

        if base.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        ensure_sufficient_stack(|| match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                if self.is_initializing(name) {
                    self.error(name, "Can't read local variable in its own initializer.");
                }
                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                // First resolve RHS, then bind LHS
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }
                self.resolve_local(*id, keyword);
            }

            Expr::Base { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Can't use 'base' outside of a class.");
                        return;
                    }
                    ClassType::Class => {
                        self.error(keyword, "Can't use 'base' in a class with no base class.");
                        return;
                    }
                    ClassType::Subclass => {}
                }
                self.resolve_local(*id, keyword);
            }
        })
    }

    /// Is `name` declared but not yet defined in the innermost scope (or, at
    /// top level, a global whose initializer is being resolved)?
    fn is_initializing(&self, name: &Token) -> bool {
        match self.scopes.last() {
            Some(scope) => scope.get(&name.lexeme) == Some(&false),
            None => self.initializing_globals.contains(&name.lexeme),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function’s parameters + body.
    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) {
        let enclosing_function = self.current_function;
        let enclosing_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.current_function = kind;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&decl.body);
        self.end_scope();

        self.current_function = enclosing_function;
        self.loop_depth = enclosing_loops;
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

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            self.initializing_globals.insert(name.lexeme.clone());
            return;
        };

        if scope.contains_key(&name.lexeme) {
            self.error(name, "Already a variable with this name in this scope.");
            return;
        }

        scope.insert(name.lexeme.clone(), false);
    }

    fn define(&mut self, name: &Token) {
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.insert(name.lexeme.clone(), true);
            }
            None => {
                self.initializing_globals.remove(&name.lexeme);
            }
        }
    }

    /// Bind `this`/`base` in the innermost scope; they are always defined.
    fn bind_implicit(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this reference as a local at depth `d`, or leave it unrecorded
    /// (a global) if no enclosing scope binds it.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved '{}' {} at depth {}", name.lexeme, id, depth);
                self.locals.insert(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' {} as global", name.lexeme, id);
    }
}

/// Resolve a complete program.
pub fn resolve(statements: &[Stmt]) -> (Locals, Vec<LoxError>) {
    Resolver::new().resolve(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::scanner::scan;

    fn resolve_source(source: &str) -> (Vec<Stmt>, Locals, Vec<LoxError>) {
        let (tokens, _) = scan(source);
        let (stmts, parse_errors) = parse(&tokens);
        assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);
        let (locals, errors) = resolve(&stmts);
        (stmts, locals, errors)
    }

    fn messages(errors: &[LoxError]) -> Vec<String> {
        errors.iter().map(LoxError::message).collect()
    }

    #[test]
    fn globals_get_no_distance() {
        let (_, locals, errors) = resolve_source("var a = 1; print a;");
        assert!(errors.is_empty());
        assert!(locals.is_empty());
    }

    #[test]
    fn block_local_resolves_at_depth_zero() {
        let (stmts, locals, _) = resolve_source("{ var a = 1; print a; }");

        let Stmt::Block(inner) = &stmts[0] else {
            panic!("expected block");
        };
        let Stmt::Print(Expr::Variable { id, .. }) = &inner[1] else {
            panic!("expected print of variable");
        };

        assert_eq!(locals.get(id), Some(&0));
    }

    #[test]
    fn redeclaring_a_global_is_allowed() {
        let (_, _, errors) = resolve_source("var a = 1; var a = 2;");
        assert!(errors.is_empty());
    }

    #[test]
    fn redeclaring_a_local_is_reported() {
        let (_, _, errors) = resolve_source("{ var a = 1; var a = 2; }");
        assert_eq!(
            messages(&errors),
            ["Already a variable with this name in this scope."]
        );
    }

    #[test]
    fn reading_global_in_own_initializer_is_reported() {
        let (_, _, errors) = resolve_source("var a = a;");
        assert_eq!(
            messages(&errors),
            ["Can't read local variable in its own initializer."]
        );
    }

    #[test]
    fn this_at_depth_one_inside_method() {
        let (stmts, locals, errors) = resolve_source("class A { m() { return this; } }");
        assert!(errors.is_empty());

        let Stmt::Class { methods, .. } = &stmts[0] else {
            panic!("expected class");
        };
        let Stmt::Return {
            value: Some(Expr::This { id, .. }),
            ..
        } = &methods[0].body[0]
        else {
            panic!("expected return this");
        };

        // method scope (params) → class `this` scope
        assert_eq!(locals.get(id), Some(&1));
    }
}
