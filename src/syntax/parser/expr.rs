use crate::diagnostic::Diagnostic;
use crate::ir::{Call, Callee, Expr, Literal, PrimOp};
use crate::lexeme::Lexeme;
use crate::span::Span;

use super::Parser;

impl Parser<'_> {
    pub(super) fn parse_expr(&mut self) -> Expr {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Expr {
        if !self.enter_nesting() {
            return Expr::int(0);
        }
        let mut lhs = self.parse_unary();

        loop {
            let Some(op) = binary_op(self.peek()) else {
                break;
            };
            let (l_bp, r_bp) = op_binding_power(op);
            if l_bp < min_bp {
                break;
            }
            let span = self.current_span();
            self.advance(); // consume operator
            let rhs = self.parse_expr_bp(r_bp);
            lhs = Expr::Call(Box::new(Call::prim(op, vec![lhs, rhs]).with_span(span)));
        }

        self.exit_nesting();
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        let span = self.current_span();
        let op = match self.peek().clone() {
            Lexeme::Minus => PrimOp::UnaryMinus,
            Lexeme::Bang => PrimOp::UnaryLNot,
            Lexeme::Tilde => PrimOp::UnaryNot,
            _ => {
                let base = self.parse_primary();
                return self.parse_postfix(base);
            }
        };
        self.advance();
        let operand = self.parse_unary();
        match (op, operand) {
            // Negative literals are literals.
            (PrimOp::UnaryMinus, Expr::Lit(Literal::Int(v))) => Expr::int(v.wrapping_neg()),
            (PrimOp::UnaryMinus, Expr::Lit(Literal::Real(v))) => Expr::Lit(Literal::Real(-v)),
            (op, operand) => {
                Expr::Call(Box::new(Call::prim(op, vec![operand]).with_span(span)))
            }
        }
    }

    /// `base[index]...` reads an array element.
    fn parse_postfix(&mut self, mut base: Expr) -> Expr {
        while self.at(&Lexeme::LBracket) {
            let span = self.current_span();
            self.advance();
            let index = self.parse_expr();
            let span = span.merge(self.expect(&Lexeme::RBracket));
            base = Expr::Call(Box::new(
                Call::prim(PrimOp::ArrayGetValue, vec![base, index]).with_span(span),
            ));
        }
        base
    }

    fn parse_primary(&mut self) -> Expr {
        let start = self.current_span();

        match self.peek().clone() {
            Lexeme::Integer(n) => {
                self.advance();
                match i64::try_from(n) {
                    Ok(v) => Expr::int(v),
                    Err(_) => {
                        self.error_at("integer literal does not fit in 64 bits", start);
                        Expr::int(0)
                    }
                }
            }
            Lexeme::Real(v) => {
                self.advance();
                Expr::Lit(Literal::Real(v))
            }
            Lexeme::Str(s) => {
                self.advance();
                Expr::Lit(Literal::Str(s))
            }
            Lexeme::True => {
                self.advance();
                Expr::Lit(Literal::Bool(true))
            }
            Lexeme::False => {
                self.advance();
                Expr::Lit(Literal::Bool(false))
            }
            Lexeme::LParen => {
                self.advance();
                let inner = self.parse_expr();
                self.expect(&Lexeme::RParen);
                inner
            }
            Lexeme::Type => {
                self.advance();
                let name = self.expect_ident();
                match self.classes.get(&name.node) {
                    Some(&t) => Expr::Type(t),
                    None => {
                        self.error_at(&format!("unknown type '{}'", name.node), name.span);
                        Expr::int(0)
                    }
                }
            }
            Lexeme::Ident(name) => {
                self.advance();
                if self.at(&Lexeme::LParen) {
                    return self.parse_call(&name, start);
                }
                match self.lookup(&name) {
                    Some(s) => Expr::Sym(s),
                    None => {
                        self.error_at(&format!("undeclared variable '{}'", name), start);
                        Expr::int(0)
                    }
                }
            }
            other => {
                self.error_at(
                    &format!("expected an expression, found {}", other.description()),
                    start,
                );
                self.advance();
                Expr::int(0)
            }
        }
    }

    /// `name(args)`: a function if one is declared with that name, else a
    /// primitive.
    fn parse_call(&mut self, name: &str, start: Span) -> Expr {
        self.expect(&Lexeme::LParen);
        let mut args = Vec::new();
        if !self.at(&Lexeme::RParen) {
            loop {
                args.push(self.parse_expr());
                if !self.eat(&Lexeme::Comma) {
                    break;
                }
            }
        }
        let span = start.merge(self.expect(&Lexeme::RParen));

        let callee = if let Some(&f) = self.fns.get(name) {
            Callee::Fn(f)
        } else if let Some(op) = PrimOp::from_name(name) {
            Callee::Prim(op)
        } else {
            self.diagnostics.push(
                Diagnostic::error(format!("unknown function '{}'", name), start)
                    .with_help("declare it with `fn` or use a primitive name".to_string()),
            );
            return Expr::int(0);
        };
        Expr::Call(Box::new(Call::new(callee, args).with_span(span)))
    }
}

fn binary_op(tok: &Lexeme) -> Option<PrimOp> {
    Some(match tok {
        Lexeme::Pipe => PrimOp::Or,
        Lexeme::Caret => PrimOp::Xor,
        Lexeme::Amp => PrimOp::And,
        Lexeme::EqEq => PrimOp::Equal,
        Lexeme::NotEq => PrimOp::NotEqual,
        Lexeme::Lt => PrimOp::Less,
        Lexeme::Le => PrimOp::LessOrEqual,
        Lexeme::Gt => PrimOp::Greater,
        Lexeme::Ge => PrimOp::GreaterOrEqual,
        Lexeme::Shl => PrimOp::Lsh,
        Lexeme::Shr => PrimOp::Rsh,
        Lexeme::Plus => PrimOp::Add,
        Lexeme::Minus => PrimOp::Subtract,
        Lexeme::Star => PrimOp::Mult,
        Lexeme::Slash => PrimOp::Div,
        Lexeme::Percent => PrimOp::Mod,
        _ => return None,
    })
}

/// Returns (left binding power, right binding power) for a binary operator.
/// Higher binding power = higher precedence; all operators are
/// left-associative.
fn op_binding_power(op: PrimOp) -> (u8, u8) {
    match op {
        PrimOp::Or => (1, 2),
        PrimOp::Xor => (3, 4),
        PrimOp::And => (5, 6),
        PrimOp::Equal | PrimOp::NotEqual => (7, 8),
        PrimOp::Less | PrimOp::LessOrEqual | PrimOp::Greater | PrimOp::GreaterOrEqual => (9, 10),
        PrimOp::Lsh | PrimOp::Rsh => (11, 12),
        PrimOp::Add | PrimOp::Subtract => (13, 14),
        _ => (15, 16),
    }
}
