//! Recursive-descent parser for `.oir` files.
//!
//! Names are resolved while parsing: symbols through a stack of lexical
//! scopes, functions and classes through a table filled by a pre-scan of
//! the token stream, so calls may refer to functions defined later.

mod expr;
mod items;
mod stmts;

use std::collections::HashMap;

use crate::diagnostic::Diagnostic;
use crate::ir::{FnId, Function, ModId, Program, Scope, SymFlags, SymId, Symbol, Type, TypeDef, TypeId};
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

const MAX_NESTING_DEPTH: u32 = 256;

pub(crate) struct Parser<'p> {
    tokens: Vec<Spanned<Lexeme>>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    depth: u32,
    program: &'p mut Program,
    /// Lexical scopes, innermost last.
    scopes: Vec<HashMap<String, SymId>>,
    /// Definition scope of declarations being parsed.
    current: Scope,
    modules: HashMap<String, ModId>,
    fns: HashMap<String, FnId>,
    classes: HashMap<String, TypeId>,
}

impl<'p> Parser<'p> {
    /// Functions and classes already in `program` are visible to the new
    /// source.
    pub(crate) fn new(tokens: Vec<Spanned<Lexeme>>, program: &'p mut Program) -> Self {
        let fns = program
            .fn_ids()
            .map(|f| (program.func(f).name.clone(), f))
            .collect();
        let classes = (0..program.types.len() as u32)
            .map(TypeId)
            .map(|t| (program.type_def(t).name.clone(), t))
            .collect();
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            depth: 0,
            program,
            scopes: Vec::new(),
            current: Scope::Module(ModId(0)),
            modules: HashMap::new(),
            fns,
            classes,
        }
    }

    pub(crate) fn parse_file(mut self) -> Result<(), Vec<Diagnostic>> {
        self.prescan();
        while !self.at(&Lexeme::Eof) {
            if self.at(&Lexeme::Module) {
                self.parse_module();
            } else {
                self.error_with_help(
                    &format!("expected 'module', found {}", self.peek().description()),
                    "every .oir file is a sequence of `module <name> { ... }` blocks",
                );
                self.advance();
            }
            if !self.diagnostics.is_empty() {
                break;
            }
        }
        if self.diagnostics.is_empty() {
            Ok(())
        } else {
            Err(self.diagnostics)
        }
    }

    /// Declare every module, function and class up front.
    fn prescan(&mut self) {
        let mut module = None;
        for i in 0..self.tokens.len().saturating_sub(1) {
            let Lexeme::Ident(name) = &self.tokens[i + 1].node else {
                continue;
            };
            let name = name.clone();
            let span = self.tokens[i + 1].span;
            let kind = self.tokens[i].node.clone();
            match kind {
                Lexeme::Module => {
                    if self.modules.contains_key(&name) {
                        self.diagnostics.push(Diagnostic::error(
                            format!("module '{}' is defined more than once", name),
                            span,
                        ));
                        continue;
                    }
                    let m = self.program.add_module(&name, span.file_id);
                    self.modules.insert(name, m);
                    module = Some(m);
                }
                Lexeme::Fn => {
                    let Some(m) = module else { continue };
                    if self.fns.contains_key(&name) {
                        self.diagnostics.push(Diagnostic::error(
                            format!("function '{}' is defined more than once", name),
                            span,
                        ));
                        continue;
                    }
                    let mut func = Function::new(name.clone(), Scope::Module(m));
                    func.span = span;
                    let f = self.program.add_function(func);
                    self.fns.insert(name, f);
                }
                Lexeme::Class => {
                    let Some(m) = module else { continue };
                    if self.classes.contains_key(&name) {
                        self.diagnostics.push(Diagnostic::error(
                            format!("class '{}' is defined more than once", name),
                            span,
                        ));
                        continue;
                    }
                    let t = self.program.add_type(TypeDef {
                        name: name.clone(),
                        fields: Vec::new(),
                        module: m,
                        carrier: false,
                    });
                    self.classes.insert(name, t);
                }
                _ => {}
            }
        }
    }

    // ─── Scopes ───────────────────────────────────────────────────

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: Spanned<String>, ty: Type, flags: SymFlags) -> SymId {
        let id = self.program.add_symbol(Symbol {
            name: name.node.clone(),
            ty,
            scope: self.current,
            flags,
            span: name.span,
        });
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.node, id);
        }
        id
    }

    fn lookup(&self, name: &str) -> Option<SymId> {
        self.scopes.iter().rev().find_map(|s| s.get(name).copied())
    }

    fn current_module(&self) -> ModId {
        self.program.module_of(self.current)
    }

    // ─── Nesting guard ────────────────────────────────────────────

    fn enter_nesting(&mut self) -> bool {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.error_with_help(
                "nesting depth exceeded (maximum 256 levels)",
                "split deeply nested code into separate functions",
            );
            return false;
        }
        true
    }

    fn exit_nesting(&mut self) {
        self.depth -= 1;
    }

    // ─── Token helpers ────────────────────────────────────────────

    fn peek(&self) -> &Lexeme {
        &self.tokens[self.pos].node
    }

    fn peek_ahead(&self, n: usize) -> &Lexeme {
        let i = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[i].node
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    fn advance(&mut self) -> &Spanned<Lexeme> {
        let tok = &self.tokens[self.pos];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, token: &Lexeme) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Lexeme) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Lexeme) -> Span {
        if self.at(token) {
            let span = self.current_span();
            self.advance();
            span
        } else {
            self.error_at_current(&format!(
                "expected {}, found {}",
                token.description(),
                self.peek().description()
            ));
            self.current_span()
        }
    }

    fn expect_ident(&mut self) -> Spanned<String> {
        if let Lexeme::Ident(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            Spanned::new(name, span)
        } else {
            self.error_at_current(&format!(
                "expected identifier, found {}",
                self.peek().description()
            ));
            Spanned::new("_error_".to_string(), self.current_span())
        }
    }

    /// `@name @name ...`, returned with their spans.
    fn parse_attrs(&mut self) -> Vec<Spanned<String>> {
        let mut attrs = Vec::new();
        while self.at(&Lexeme::At) {
            self.advance();
            let span = self.current_span();
            match self.peek().as_attr_name().map(str::to_string) {
                Some(name) => {
                    self.advance();
                    attrs.push(Spanned::new(name, span));
                }
                None => {
                    self.error_at_current("expected attribute name after '@'");
                    break;
                }
            }
        }
        attrs
    }

    fn error_at_current(&mut self, msg: &str) {
        self.diagnostics
            .push(Diagnostic::error(msg.to_string(), self.current_span()));
    }

    fn error_at(&mut self, msg: &str, span: Span) {
        self.diagnostics.push(Diagnostic::error(msg.to_string(), span));
    }

    fn error_with_help(&mut self, msg: &str, help: &str) {
        self.diagnostics.push(
            Diagnostic::error(msg.to_string(), self.current_span()).with_help(help.to_string()),
        );
    }

    fn failed(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}
