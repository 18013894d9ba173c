use crate::expr::{Expr, LiteralValue};
use crate::stack::ensure_sufficient_stack;

/// Renders an expression in fully parenthesised prefix form, e.g.
/// `(* (- 123.0) (group 45.67))`.  Used by `rlox parse`.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(expr: &Expr) -> String {
        let mut out = String::new();
        Self::write_expr(&mut out, expr);
        out
    }

    fn write_expr(out: &mut String, expr: &Expr) {
        ensure_sufficient_stack(|| Self::write_expr_inner(out, expr));
    }

    fn write_expr_inner(out: &mut String, expr: &Expr) {
        match expr {
            Expr::Literal(lit) => Self::write_literal(out, lit),

            Expr::Grouping(inner) => Self::parenthesize(out, "group", &[&**inner]),

            Expr::Unary { operator, right } => Self::parenthesize(out, &operator.lexeme, &[&**right]),

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => Self::parenthesize(out, &operator.lexeme, &[&**left, &**right]),

            Expr::Variable { name, .. } => out.push_str(&name.lexeme),

            Expr::Assign { name, value, .. } => {
                out.push_str("(= ");
                out.push_str(&name.lexeme);
                out.push(' ');
                Self::write_expr(out, value);
                out.push(')');
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut operands: Vec<&Expr> = Vec::with_capacity(arguments.len() + 1);
                operands.push(&**callee);
                operands.extend(arguments.iter());

                Self::parenthesize(out, "call", &operands);
            }

            Expr::Get { object, name } => {
                out.push_str("(. ");
                Self::write_expr(out, object);
                out.push(' ');
                out.push_str(&name.lexeme);
                out.push(')');
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                out.push_str("(= (. ");
                Self::write_expr(out, object);
                out.push(' ');
                out.push_str(&name.lexeme);
                out.push_str(") ");
                Self::write_expr(out, value);
                out.push(')');
            }

            Expr::This { .. } => out.push_str("this"),

            Expr::Super { method, .. } => {
                out.push_str("(super ");
                out.push_str(&method.lexeme);
                out.push(')');
            }
        }
    }

    fn write_literal(out: &mut String, lit: &LiteralValue) {
        match lit {
            LiteralValue::True => out.push_str("true"),
            LiteralValue::False => out.push_str("false"),
            LiteralValue::Nil => out.push_str("nil"),
            LiteralValue::Str(s) => out.push_str(s),

            // integral numbers keep one decimal: 3 → 3.0
            LiteralValue::Number(n) if n.fract() == 0.0 => out.push_str(&format!("{:.1}", n)),
            LiteralValue::Number(n) => out.push_str(&n.to_string()),
        }
    }

    fn parenthesize(out: &mut String, name: &str, operands: &[&Expr]) {
        out.push('(');
        out.push_str(name);

        for operand in operands {
            out.push(' ');
            Self::write_expr(out, operand);
        }

        out.push(')');
    }
}
