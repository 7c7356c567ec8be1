use crate::diagnostic::Diagnostic;
use crate::ir::{Block, Field, FnFlags, FnId, ModId, Scope, SymFlags, Type};
use crate::lexeme::Lexeme;
use crate::span::Spanned;

use super::Parser;

impl Parser<'_> {
    pub(super) fn parse_module(&mut self) {
        self.expect(&Lexeme::Module);
        let name = self.expect_ident();
        let Some(&m) = self.modules.get(&name.node) else {
            return;
        };
        self.current = Scope::Module(m);
        self.push_scope();
        self.expect(&Lexeme::LBrace);
        let mut init = Vec::new();
        while !self.at(&Lexeme::RBrace) && !self.at(&Lexeme::Eof) && !self.failed() {
            if self.at(&Lexeme::Class) {
                self.parse_class(m);
            } else {
                self.parse_stmt(&mut init);
            }
        }
        self.expect(&Lexeme::RBrace);
        self.pop_scope();
        self.program.module_mut(m).init.stmts.extend(init);
    }

    /// `class Name @carrier? { field: T, ... }`
    fn parse_class(&mut self, m: ModId) {
        self.expect(&Lexeme::Class);
        let name = self.expect_ident();
        let attrs = self.parse_attrs();
        let mut carrier = false;
        for attr in &attrs {
            match attr.node.as_str() {
                "carrier" => carrier = true,
                other => self.error_at(&format!("unknown class attribute '@{}'", other), attr.span),
            }
        }
        self.expect(&Lexeme::LBrace);
        let mut fields = Vec::new();
        while !self.at(&Lexeme::RBrace) && !self.at(&Lexeme::Eof) {
            let field = self.expect_ident();
            self.expect(&Lexeme::Colon);
            let ty = self.parse_type();
            fields.push(Field {
                name: field.node,
                ty,
            });
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        self.expect(&Lexeme::RBrace);

        let Some(&t) = self.classes.get(&name.node) else {
            return;
        };
        let def = &mut self.program.types[t.index()];
        def.fields = fields;
        def.carrier = carrier;
        self.program.module_mut(m).types.push(t);
    }

    /// `fn name(formals): T @attrs { body }` or `fn name(formals) @extern;`.
    /// Registers the function with the enclosing module or function.
    pub(super) fn parse_fn(&mut self) -> Option<FnId> {
        self.expect(&Lexeme::Fn);
        let name = self.expect_ident();
        let f = match self.fns.get(&name.node) {
            Some(&f) => f,
            None => {
                self.error_at(&format!("function '{}' was not declared", name.node), name.span);
                return None;
            }
        };
        let parent = self.current;
        self.program.func_mut(f).parent = parent;
        match parent {
            Scope::Module(m) => self.program.module_mut(m).functions.push(f),
            Scope::Function(p) => self.program.func_mut(p).nested.push(f),
        }

        self.current = Scope::Function(f);
        self.push_scope();

        self.expect(&Lexeme::LParen);
        let mut formals = Vec::new();
        if !self.at(&Lexeme::RParen) {
            loop {
                let formal = self.expect_ident();
                self.expect(&Lexeme::Colon);
                let ty = self.parse_type();
                let attrs = self.parse_attrs();
                let flags = self.sym_flags(&attrs);
                formals.push(self.declare(formal, ty, flags));
                if !self.eat(&Lexeme::Comma) {
                    break;
                }
            }
        }
        self.expect(&Lexeme::RParen);
        let ret = if self.eat(&Lexeme::Colon) {
            self.parse_type()
        } else {
            Type::Void
        };
        let attrs = self.parse_attrs();
        let flags = self.fn_flags(&attrs);

        let body = if flags.extern_fn {
            self.expect(&Lexeme::Semicolon);
            Block::new()
        } else {
            Block::with_stmts(self.parse_block_stmts())
        };

        self.pop_scope();
        self.current = parent;

        let func = self.program.func_mut(f);
        func.formals = formals;
        func.ret = ret;
        func.flags = flags;
        func.body = body;
        Some(f)
    }

    pub(super) fn sym_flags(&mut self, attrs: &[Spanned<String>]) -> SymFlags {
        let mut flags = SymFlags::default();
        for attr in attrs {
            match attr.node.as_str() {
                "temp" => flags.temp = true,
                "concurrent" => flags.concurrently_accessed = true,
                "nocodegen" => flags.no_codegen = true,
                other => self.error_at(
                    &format!("unknown variable attribute '@{}'", other),
                    attr.span,
                ),
            }
        }
        flags
    }

    fn fn_flags(&mut self, attrs: &[Spanned<String>]) -> FnFlags {
        let mut flags = FnFlags::default();
        for attr in attrs {
            match attr.node.as_str() {
                "offload" => flags.offload_requested = true,
                "kernel" => flags.offload_target = true,
                "fit" => flags.fit_for_offload = true,
                "extern" => flags.extern_fn = true,
                "on_block" => flags.on_block = true,
                "non_blocking" => flags.non_blocking = true,
                "local" => flags.local_fn = true,
                "device" => flags.device_copy = true,
                other => {
                    let msg = format!("unknown function attribute '@{}'", other);
                    self.diagnostics.push(
                        Diagnostic::error(msg, attr.span).with_help(
                            "known attributes: @offload @kernel @fit @extern @on_block \
                             @non_blocking @local @device"
                                .to_string(),
                        ),
                    );
                }
            }
        }
        flags
    }
}
