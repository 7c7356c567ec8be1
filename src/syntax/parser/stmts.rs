use crate::ir::{Block, BlockKind, CForLoop, Call, Cond, Expr, PrimOp, Stmt, SymFlags, Type};
use crate::lexeme::Lexeme;

use super::Parser;

impl Parser<'_> {
    /// `{ stmt* }` in a fresh lexical scope.
    pub(super) fn parse_block_stmts(&mut self) -> Vec<Stmt> {
        self.expect(&Lexeme::LBrace);
        self.push_scope();
        let mut stmts = Vec::new();
        while !self.at(&Lexeme::RBrace) && !self.at(&Lexeme::Eof) && !self.failed() {
            self.parse_stmt(&mut stmts);
        }
        self.pop_scope();
        self.expect(&Lexeme::RBrace);
        stmts
    }

    /// Parse one statement, appending the IR statements it lowers to.
    pub(super) fn parse_stmt(&mut self, out: &mut Vec<Stmt>) {
        if !self.enter_nesting() {
            self.advance();
            return;
        }
        match self.peek().clone() {
            Lexeme::Var | Lexeme::Const | Lexeme::Param | Lexeme::Type => {
                self.parse_decl(out);
                self.expect(&Lexeme::Semicolon);
            }
            Lexeme::If => {
                let cond = self.parse_if();
                out.push(Stmt::Cond(cond));
            }
            Lexeme::For => {
                let lp = self.parse_for();
                out.push(Stmt::Loop(lp));
            }
            Lexeme::Local => {
                self.advance();
                let stmts = self.parse_block_stmts();
                out.push(Stmt::Block(Block {
                    kind: BlockKind::Local,
                    stmts,
                }));
            }
            Lexeme::Kernel => {
                self.advance();
                self.expect(&Lexeme::LParen);
                let work_items = self.parse_expr();
                self.expect(&Lexeme::Comma);
                let group_size = self.parse_expr();
                self.expect(&Lexeme::RParen);
                let stmts = self.parse_block_stmts();
                out.push(Stmt::Block(Block {
                    kind: BlockKind::Kernel {
                        work_items,
                        group_size,
                    },
                    stmts,
                }));
            }
            Lexeme::LBrace => {
                let stmts = self.parse_block_stmts();
                out.push(Stmt::Block(Block::with_stmts(stmts)));
            }
            Lexeme::Return => {
                self.advance();
                if self.eat(&Lexeme::Semicolon) {
                    out.push(Stmt::Return(None));
                } else {
                    let value = self.parse_expr();
                    self.expect(&Lexeme::Semicolon);
                    out.push(Stmt::Return(Some(value)));
                }
            }
            Lexeme::Fn => {
                self.parse_fn();
            }
            Lexeme::Semicolon => {
                self.advance();
            }
            _ => {
                self.parse_simple(out);
                self.expect(&Lexeme::Semicolon);
            }
        }
        self.exit_nesting();
    }

    /// `var x: T @attrs = e`, `const`, `param`, or `type X = T`.
    fn parse_decl(&mut self, out: &mut Vec<Stmt>) {
        let keyword = self.peek().clone();
        self.advance();
        let name = self.expect_ident();

        if keyword == Lexeme::Type {
            self.expect(&Lexeme::Eq);
            let ty = self.parse_type();
            let flags = SymFlags {
                type_alias: true,
                ..SymFlags::default()
            };
            let id = self.declare(name, ty, flags);
            out.push(Stmt::Def(id));
            return;
        }

        self.expect(&Lexeme::Colon);
        let ty = self.parse_type();
        let attrs = self.parse_attrs();
        let mut flags = self.sym_flags(&attrs);
        flags.constant = keyword == Lexeme::Const;
        flags.param = keyword == Lexeme::Param;
        // The initializer sees the enclosing binding of the same name.
        let init = if self.eat(&Lexeme::Eq) {
            Some(self.parse_expr())
        } else {
            None
        };
        let span = name.span.merge(self.prev_span());
        let id = self.declare(name, ty, flags);
        out.push(Stmt::Def(id));
        if let Some(value) = init {
            out.push(Stmt::Call(
                Call::prim(PrimOp::Move, vec![Expr::Sym(id), value]).with_span(span),
            ));
        }
    }

    /// An assignment, compound assignment, call, or (in loop headers) a
    /// declaration.
    pub(super) fn parse_simple(&mut self, out: &mut Vec<Stmt>) {
        if matches!(self.peek(), Lexeme::Var | Lexeme::Const | Lexeme::Param) {
            self.parse_decl(out);
            return;
        }
        let start = self.current_span();
        let lhs = self.parse_expr();
        let Some(op) = assign_op(self.peek()) else {
            match lhs {
                Expr::Call(call) => {
                    let span = start.merge(self.prev_span());
                    out.push(Stmt::Call((*call).with_span(span)));
                }
                _ => self.error_at(
                    "expected a call or an assignment",
                    start.merge(self.prev_span()),
                ),
            }
            return;
        };
        self.advance();
        let rhs = self.parse_expr();
        let span = start.merge(self.prev_span());

        let call = match lhs {
            Expr::Sym(_) => Call::prim(op, vec![lhs, rhs]),
            Expr::Call(elem)
                if elem.is_prim(PrimOp::ArrayGetValue)
                    && elem.args.len() == 2
                    && op.is_copy() =>
            {
                let mut args = elem.args;
                args.push(rhs);
                Call::prim(PrimOp::ArraySet, args)
            }
            _ => {
                self.error_at(
                    "the left side of an assignment must be a variable or an array element",
                    span,
                );
                return;
            }
        };
        out.push(Stmt::Call(call.with_span(span)));
    }

    fn parse_if(&mut self) -> Cond {
        self.expect(&Lexeme::If);
        let test = self.parse_expr();
        let then_block = Block::with_stmts(self.parse_block_stmts());
        let else_block = if self.eat(&Lexeme::Else) {
            if self.at(&Lexeme::If) {
                let nested = self.parse_if();
                Some(Block::with_stmts(vec![Stmt::Cond(nested)]))
            } else {
                Some(Block::with_stmts(self.parse_block_stmts()))
            }
        } else {
            None
        };
        Cond {
            test,
            then_block,
            else_block,
        }
    }

    /// `for @order_independent? (init, ...; test, ...; incr, ...) { body }`
    fn parse_for(&mut self) -> CForLoop {
        let span = self.expect(&Lexeme::For);
        let attrs = self.parse_attrs();
        let mut order_independent = false;
        for attr in &attrs {
            match attr.node.as_str() {
                "order_independent" => order_independent = true,
                other => self.error_at(&format!("unknown loop attribute '@{}'", other), attr.span),
            }
        }
        self.expect(&Lexeme::LParen);
        // Header declarations stay visible in the body.
        self.push_scope();
        let init = self.parse_header(&Lexeme::Semicolon);
        let test = self.parse_header(&Lexeme::Semicolon);
        let incr = self.parse_header(&Lexeme::RParen);
        let body = self.parse_block_stmts();
        self.pop_scope();
        CForLoop {
            init: Block::with_stmts(init),
            test: Block::with_stmts(test),
            incr: Block::with_stmts(incr),
            body: Block::with_stmts(body),
            order_independent,
            span,
        }
    }

    fn parse_header(&mut self, terminator: &Lexeme) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        if !self.at(terminator) {
            loop {
                self.parse_simple(&mut stmts);
                if self.failed() || !self.eat(&Lexeme::Comma) {
                    break;
                }
            }
        }
        self.expect(terminator);
        stmts
    }

    pub(super) fn parse_type(&mut self) -> Type {
        let tok = self.peek().clone();
        let span = self.current_span();
        self.advance();
        match tok {
            Lexeme::IntTy => Type::Int,
            Lexeme::UIntTy => Type::UInt,
            Lexeme::RealTy => Type::Real,
            Lexeme::BoolTy => Type::Bool,
            Lexeme::VoidTy => Type::Void,
            Lexeme::StringTy => Type::CString,
            Lexeme::CPtrTy => Type::CVoidPtr,
            Lexeme::Ref => Type::Ref(Box::new(self.parse_type())),
            Lexeme::Wide => Type::Wide(Box::new(self.parse_type())),
            Lexeme::LBracket => {
                let elem = self.parse_type();
                self.expect(&Lexeme::RBracket);
                Type::Array(Box::new(elem))
            }
            Lexeme::Ident(name) => match self.classes.get(&name) {
                Some(&t) => Type::Class(t),
                None => {
                    self.error_at(&format!("unknown type '{}'", name), span);
                    Type::Void
                }
            },
            other => {
                self.error_at(
                    &format!("expected a type, found {}", other.description()),
                    span,
                );
                Type::Void
            }
        }
    }
}

fn assign_op(tok: &Lexeme) -> Option<PrimOp> {
    Some(match tok {
        Lexeme::Eq => PrimOp::Assign,
        Lexeme::ColonEq => PrimOp::Move,
        Lexeme::PlusEq => PrimOp::AddAssign,
        Lexeme::MinusEq => PrimOp::SubtractAssign,
        Lexeme::StarEq => PrimOp::MultAssign,
        Lexeme::SlashEq => PrimOp::DivAssign,
        Lexeme::PercentEq => PrimOp::ModAssign,
        Lexeme::ShlEq => PrimOp::LshAssign,
        Lexeme::ShrEq => PrimOp::RshAssign,
        Lexeme::AmpEq => PrimOp::AndAssign,
        Lexeme::PipeEq => PrimOp::OrAssign,
        Lexeme::CaretEq => PrimOp::XorAssign,
        _ => return None,
    })
}
