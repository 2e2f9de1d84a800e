use crate::ast::{Expr, FunctionDecl, LiteralValue, Stmt};

/// Converts syntax trees to the Crafting‑Interpreters prefix form, e.g.
/// `(+ 1.0 (group (* 2.0 3.0)))`. Used by the `parse` and `evaluate`
/// subcommands and by parser tests.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(expr: &Expr) -> String {
        match expr {
            // ── literals ────────────────────────────────────────────────
            Expr::Literal(lit) => match lit {
                LiteralValue::True => "true".into(),

                LiteralValue::False => "false".into(),

                LiteralValue::Nil => "nil".into(),

                LiteralValue::Str(s) => s.clone(),

                LiteralValue::Number(n) => {
                    if n.fract() == 0.0 {
                        // 3.0 → 3.0, never 3
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }
            },

            // ── grouping ────────────────────────────────────────────────
            Expr::Grouping(inner) => format!("(group {})", Self::print(inner)),

            // ── operators ───────────────────────────────────────────────
            Expr::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, Self::print(right))
            }

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                operator.lexeme,
                Self::print(left),
                Self::print(right)
            ),

            // ── variables ───────────────────────────────────────────────
            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                format!("(= {} {})", name.lexeme, Self::print(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut s = format!("(call {}", Self::print(callee));
                for arg in arguments {
                    s.push(' ');
                    s.push_str(&Self::print(arg));
                }
                s.push(')');
                s
            }

            // ── objects ─────────────────────────────────────────────────
            Expr::Get { object, name } => format!("(. {} {})", Self::print(object), name.lexeme),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(= (. {} {}) {})",
                Self::print(object),
                name.lexeme,
                Self::print(value)
            ),

            Expr::This { .. } => "this".into(),

            Expr::Base { method, .. } => format!("(base {})", method.lexeme),
        }
    }

    pub fn print_stmt(stmt: &Stmt) -> String {
        match stmt {
            Stmt::Expression(expr) => format!("(; {})", Self::print(expr)),

            Stmt::Print(expr) => format!("(print {})", Self::print(expr)),

            Stmt::Var { name, initializer } => match initializer {
                Some(expr) => format!("(var {} {})", name.lexeme, Self::print(expr)),
                None => format!("(var {})", name.lexeme),
            },

            Stmt::Block(statements) => Self::parenthesize_stmts("block", statements),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                Some(else_branch) => format!(
                    "(if {} {} {})",
                    Self::print(condition),
                    Self::print_stmt(then_branch),
                    Self::print_stmt(else_branch)
                ),
                None => format!(
                    "(if {} {})",
                    Self::print(condition),
                    Self::print_stmt(then_branch)
                ),
            },

            Stmt::While {
                condition,
                body,
                increment,
            } => match increment {
                Some(increment) => format!(
                    "(while {} {} {})",
                    Self::print(condition),
                    Self::print_stmt(body),
                    Self::print_stmt(increment)
                ),
                None => format!(
                    "(while {} {})",
                    Self::print(condition),
                    Self::print_stmt(body)
                ),
            },

            Stmt::Break(_) => "(break)".into(),

            Stmt::Continue(_) => "(continue)".into(),

            Stmt::Function(decl) => Self::function("fun", decl),

            Stmt::Return { value, .. } => match value {
                Some(expr) => format!("(return {})", Self::print(expr)),
                None => "(return)".into(),
            },

            Stmt::Class {
                name,
                base,
                methods,
            } => {
                let mut s = format!("(class {}", name.lexeme);
                if let Some(base) = base {
                    s.push_str(" < ");
                    s.push_str(&Self::print(base));
                }
                for method in methods {
                    s.push(' ');
                    s.push_str(&Self::function("method", method));
                }
                s.push(')');
                s
            }
        }
    }

    fn function(keyword: &str, decl: &FunctionDecl) -> String {
        let params: Vec<&str> = decl.params.iter().map(|p| p.lexeme.as_str()).collect();
        let mut s = format!("({} {}({})", keyword, decl.name.lexeme, params.join(" "));
        for stmt in &decl.body {
            s.push(' ');
            s.push_str(&Self::print_stmt(stmt));
        }
        s.push(')');
        s
    }

    fn parenthesize_stmts(name: &str, statements: &[Stmt]) -> String {
        let mut s = format!("({}", name);
        for stmt in statements {
            s.push(' ');
            s.push_str(&Self::print_stmt(stmt));
        }
        s.push(')');
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, Parser};
    use crate::scanner::scan;

    fn print_expression(source: &str) -> String {
        let (tokens, _) = scan(source);
        let (expr, errors) = Parser::new(&tokens).parse_expression();
        assert!(errors.is_empty(), "{:?}", errors);
        AstPrinter::print(&expr.expect("expression"))
    }

    #[test]
    fn prints_nested_arithmetic() {
        assert_eq!(
            print_expression("-1 + (2 * 3.5)"),
            "(+ (- 1.0) (group (* 2.0 3.5)))"
        );
    }

    #[test]
    fn prints_property_chain() {
        assert_eq!(print_expression("a.b.c = nil"), "(= (. (. a b) c) nil)");
    }

    #[test]
    fn prints_desugared_for() {
        let (tokens, _) = scan("for (var i = 0; i < 2; i = i + 1) print i;");
        let (stmts, _) = parse(&tokens);

        assert_eq!(
            AstPrinter::print_stmt(&stmts[0]),
            "(block (var i 0.0) (while (< i 2.0) (print i) (; (= i (+ i 1.0)))))"
        );
    }

    #[test]
    fn prints_class_with_base() {
        let (tokens, _) = scan("class B < A { init(x) { this.x = x; } }");
        let (stmts, _) = parse(&tokens);

        assert_eq!(
            AstPrinter::print_stmt(&stmts[0]),
            "(class B < A (method init(x) (; (= (. this x) x))))"
        );
    }
}
