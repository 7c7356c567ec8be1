//! Copy-with-substitution.
//!
//! Every copy declares fresh symbols for the declarations it contains and
//! records old→new in a [`SymbolMap`]; the copied tree is then rewired
//! through the map, so the result never aliases storage of the original.

use std::collections::HashMap;

use super::walk::{defined_symbols, for_each_call_mut, for_each_expr_mut};
use super::{Block, CForLoop, Callee, Expr, FnId, Function, Program, Scope, Stmt, SymId};

/// Old → new handles produced by a copy.
#[derive(Clone, Debug, Default)]
pub struct SymbolMap {
    pub syms: HashMap<SymId, SymId>,
    pub fns: HashMap<FnId, FnId>,
}

impl SymbolMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sym(&self, s: SymId) -> SymId {
        self.syms.get(&s).copied().unwrap_or(s)
    }

    pub fn func(&self, f: FnId) -> FnId {
        self.fns.get(&f).copied().unwrap_or(f)
    }
}

impl Program {
    /// Fresh symbol shaped like `s`, declared in `scope`.
    pub fn clone_symbol(&mut self, s: SymId, scope: Scope) -> SymId {
        let mut sym = self.sym(s).clone();
        sym.scope = scope;
        self.add_symbol(sym)
    }

    /// Copy `block`, declaring fresh symbols for its definitions in `scope`.
    pub fn copy_block(&mut self, block: &Block, map: &mut SymbolMap, scope: Scope) -> Block {
        self.declare_copies(&defined_symbols(block), map, scope);
        let mut copy = block.clone();
        rewire(&mut copy, map);
        copy
    }

    /// Copy a whole loop (header and body) like [`Program::copy_block`].
    pub fn copy_loop(&mut self, lp: &CForLoop, map: &mut SymbolMap, scope: Scope) -> CForLoop {
        let mut copy = lp.clone();
        for block in [&mut copy.init, &mut copy.test, &mut copy.incr, &mut copy.body] {
            self.declare_copies(&defined_symbols(block), map, scope);
        }
        for block in [&mut copy.init, &mut copy.test, &mut copy.incr, &mut copy.body] {
            rewire(block, map);
        }
        copy
    }

    /// Copy function `f` (with its nested functions) under `name`, defined
    /// in `parent`. Calls between the copied functions are redirected to
    /// the copies.
    pub fn copy_function(
        &mut self,
        f: FnId,
        name: &str,
        parent: Scope,
        map: &mut SymbolMap,
    ) -> FnId {
        let new = self.declare_function_copy(f, name.to_string(), parent, map);
        self.fill_function_copy(f, map);
        new
    }

    fn declare_copies(&mut self, syms: &[SymId], map: &mut SymbolMap, scope: Scope) {
        for &s in syms {
            if !map.syms.contains_key(&s) {
                let fresh = self.clone_symbol(s, scope);
                map.syms.insert(s, fresh);
            }
        }
    }

    fn declare_function_copy(
        &mut self,
        f: FnId,
        name: String,
        parent: Scope,
        map: &mut SymbolMap,
    ) -> FnId {
        let orig = self.func(f).clone();
        let mut copy = Function::new(name, parent);
        copy.ret = orig.ret.clone();
        copy.flags = orig.flags.clone();
        copy.span = orig.span;
        let new = self.add_function(copy);
        map.fns.insert(f, new);

        let scope = Scope::Function(new);
        self.declare_copies(&orig.formals, map, scope);
        self.declare_copies(&defined_symbols(&orig.body), map, scope);
        self.func_mut(new).formals = orig.formals.iter().map(|s| map.sym(*s)).collect();

        for nested in orig.nested {
            let nested_name = self.func(nested).name.clone();
            let nested_name = self.fresh_name(&nested_name);
            let n = self.declare_function_copy(nested, nested_name, scope, map);
            self.func_mut(new).nested.push(n);
        }
        new
    }

    fn fill_function_copy(&mut self, f: FnId, map: &SymbolMap) {
        let new = map.func(f);
        let mut body = self.func(f).body.clone();
        rewire(&mut body, map);
        self.func_mut(new).body = body;
        for nested in self.func(f).nested.clone() {
            self.fill_function_copy(nested, map);
        }
    }
}

/// Rewrite declarations, uses and callees of `block` through `map`.
fn rewire(block: &mut Block, map: &SymbolMap) {
    rewire_defs(block, map);
    for_each_expr_mut(block, &mut |e| {
        if let Expr::Sym(s) = e {
            *s = map.sym(*s);
        }
    });
    if !map.fns.is_empty() {
        for_each_call_mut(block, &mut |c| {
            if let Callee::Fn(f) = c.callee {
                c.callee = Callee::Fn(map.func(f));
            }
        });
    }
}

fn rewire_defs(block: &mut Block, map: &SymbolMap) {
    for stmt in &mut block.stmts {
        match stmt {
            Stmt::Def(s) => *s = map.sym(*s),
            Stmt::Block(b) => rewire_defs(b, map),
            Stmt::Loop(lp) => {
                rewire_defs(&mut lp.init, map);
                rewire_defs(&mut lp.test, map);
                rewire_defs(&mut lp.incr, map);
                rewire_defs(&mut lp.body, map);
            }
            Stmt::Cond(c) => {
                rewire_defs(&mut c.then_block, map);
                if let Some(e) = &mut c.else_block {
                    rewire_defs(e, map);
                }
            }
            Stmt::Call(_) | Stmt::Return(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Call, PrimOp, SymFlags, Symbol, Type};
    use crate::span::Span;

    fn local(p: &mut Program, name: &str, scope: Scope) -> SymId {
        p.add_symbol(Symbol {
            name: name.into(),
            ty: Type::Int,
            scope,
            flags: SymFlags::default(),
            span: Span::dummy(),
        })
    }

    #[test]
    fn test_copy_block_declares_fresh_symbols() {
        let mut p = Program::new();
        let m = p.add_module("m", 0);
        let f = p.add_function(Function::new("f", Scope::Module(m)));
        let scope = Scope::Function(f);
        let outer = local(&mut p, "outer", scope);
        let t = local(&mut p, "t", scope);
        let block = Block::with_stmts(vec![
            Stmt::Def(t),
            Stmt::mov(t, Expr::Sym(outer)),
        ]);
        let mut map = SymbolMap::new();
        let copy = p.copy_block(&block, &mut map, scope);
        let t2 = map.sym(t);
        assert_ne!(t2, t);
        assert_eq!(copy.stmts[0], Stmt::Def(t2));
        assert_eq!(copy.stmts[1], Stmt::mov(t2, Expr::Sym(outer)));
        assert_eq!(p.sym(t2).name, "t");
    }

    #[test]
    fn test_copy_function_redirects_nested_calls() {
        let mut p = Program::new();
        let m = p.add_module("m", 0);
        let outer = p.add_function(Function::new("outer", Scope::Module(m)));
        let inner = p.add_function(Function::new("inner", Scope::Function(outer)));
        p.func_mut(outer).nested.push(inner);
        let x = local(&mut p, "x", Scope::Function(outer));
        p.func_mut(outer).formals.push(x);
        p.func_mut(inner).body = Block::with_stmts(vec![Stmt::prim(PrimOp::Write, vec![Expr::Sym(x)])]);
        p.func_mut(outer).body = Block::with_stmts(vec![Stmt::Call(Call::new(Callee::Fn(inner), vec![]))]);

        let mut map = SymbolMap::new();
        let copy = p.copy_function(outer, "outer_dev", Scope::Module(m), &mut map);
        let inner_copy = map.func(inner);
        assert_ne!(inner_copy, inner);
        assert_eq!(p.func(copy).nested, vec![inner_copy]);
        assert_eq!(
            p.func(copy).body.stmts[0],
            Stmt::Call(Call::new(Callee::Fn(inner_copy), vec![]))
        );
        let x2 = p.func(copy).formals[0];
        assert_eq!(
            p.func(inner_copy).body.stmts[0],
            Stmt::prim(PrimOp::Write, vec![Expr::Sym(x2)])
        );
        assert_eq!(p.sym(x2).scope, Scope::Function(copy));
    }
}
