//! Tree walkers over blocks: call collection, symbol uses and writes,
//! and in-place symbol substitution.

use std::collections::{HashMap, HashSet};

use super::{Block, BlockKind, Call, Callee, CForLoop, Expr, Program, Stmt, SymId};

/// A call found by [`collect_calls`], with the locality of its position.
#[derive(Clone, Copy, Debug)]
pub struct CallSite<'a> {
    pub call: &'a Call,
    /// Inside a `local` block (or the caller asked to treat everything as local).
    pub in_local: bool,
}

// ─── Calls ────────────────────────────────────────────────────────

/// Collect every call in `block`, including calls nested in arguments,
/// conditions and loop headers.
pub fn collect_calls<'a>(block: &'a Block, in_local: bool, out: &mut Vec<CallSite<'a>>) {
    let in_local = in_local || block.kind == BlockKind::Local;
    if let BlockKind::Kernel {
        work_items,
        group_size,
    } = &block.kind
    {
        collect_expr_calls(work_items, in_local, out);
        collect_expr_calls(group_size, in_local, out);
    }
    for stmt in &block.stmts {
        collect_stmt_calls(stmt, in_local, out);
    }
}

/// Calls in a loop's header and body.
pub fn collect_loop_calls<'a>(lp: &'a CForLoop, in_local: bool, out: &mut Vec<CallSite<'a>>) {
    collect_calls(&lp.init, in_local, out);
    collect_calls(&lp.test, in_local, out);
    collect_calls(&lp.incr, in_local, out);
    collect_calls(&lp.body, in_local, out);
}

fn collect_stmt_calls<'a>(stmt: &'a Stmt, in_local: bool, out: &mut Vec<CallSite<'a>>) {
    match stmt {
        Stmt::Def(_) | Stmt::Return(None) => {}
        Stmt::Call(call) => collect_call(call, in_local, out),
        Stmt::Block(b) => collect_calls(b, in_local, out),
        Stmt::Loop(lp) => collect_loop_calls(lp, in_local, out),
        Stmt::Cond(c) => {
            collect_expr_calls(&c.test, in_local, out);
            collect_calls(&c.then_block, in_local, out);
            if let Some(e) = &c.else_block {
                collect_calls(e, in_local, out);
            }
        }
        Stmt::Return(Some(e)) => collect_expr_calls(e, in_local, out),
    }
}

fn collect_call<'a>(call: &'a Call, in_local: bool, out: &mut Vec<CallSite<'a>>) {
    out.push(CallSite { call, in_local });
    for arg in &call.args {
        collect_expr_calls(arg, in_local, out);
    }
}

fn collect_expr_calls<'a>(expr: &'a Expr, in_local: bool, out: &mut Vec<CallSite<'a>>) {
    if let Expr::Call(c) = expr {
        collect_call(c, in_local, out);
    }
}

// ─── Symbol uses ──────────────────────────────────────────────────

/// Every symbol referenced by an expression in `block`, in first-use order,
/// without duplicates. Declarations (`Stmt::Def`) are not uses.
pub fn symbol_uses(block: &Block) -> Vec<SymId> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for_each_expr(block, &mut |e| {
        if let Expr::Sym(s) = e {
            if seen.insert(*s) {
                out.push(*s);
            }
        }
    });
    out
}

/// Symbols declared anywhere in `block`.
pub fn defined_symbols(block: &Block) -> Vec<SymId> {
    let mut out = Vec::new();
    collect_defs(block, &mut out);
    out
}

fn collect_defs(block: &Block, out: &mut Vec<SymId>) {
    for stmt in &block.stmts {
        match stmt {
            Stmt::Def(s) => out.push(*s),
            Stmt::Block(b) => collect_defs(b, out),
            Stmt::Loop(lp) => {
                collect_defs(&lp.init, out);
                collect_defs(&lp.test, out);
                collect_defs(&lp.incr, out);
                collect_defs(&lp.body, out);
            }
            Stmt::Cond(c) => {
                collect_defs(&c.then_block, out);
                if let Some(e) = &c.else_block {
                    collect_defs(e, out);
                }
            }
            Stmt::Call(_) | Stmt::Return(_) => {}
        }
    }
}

/// Symbols that `block` may overwrite: targets of moves, assignments and
/// compound updates, operands of `addr_of`, and actuals bound to
/// by-reference formals.
pub fn written_symbols(program: &Program, block: &Block) -> HashSet<SymId> {
    let mut calls = Vec::new();
    collect_calls(block, false, &mut calls);
    let mut out = HashSet::new();
    for site in calls {
        let call = site.call;
        match call.callee {
            Callee::Prim(op) => {
                if op.writes_first_arg() || op == super::PrimOp::AddrOf {
                    if let Some(s) = call.args.first().and_then(Expr::as_sym) {
                        out.insert(s);
                    }
                }
            }
            Callee::Fn(f) => {
                let formals = &program.func(f).formals;
                for (formal, actual) in formals.iter().zip(&call.args) {
                    if program.sym(*formal).ty.is_ref() {
                        if let Some(s) = actual.as_sym() {
                            out.insert(s);
                        }
                    }
                }
            }
        }
    }
    out
}

// ─── Visitors ─────────────────────────────────────────────────────

/// Visit every expression (outermost first) in `block`.
pub fn for_each_expr(block: &Block, f: &mut impl FnMut(&Expr)) {
    if let BlockKind::Kernel {
        work_items,
        group_size,
    } = &block.kind
    {
        visit_expr(work_items, f);
        visit_expr(group_size, f);
    }
    for stmt in &block.stmts {
        match stmt {
            Stmt::Def(_) | Stmt::Return(None) => {}
            Stmt::Call(call) => {
                for a in &call.args {
                    visit_expr(a, f);
                }
            }
            Stmt::Block(b) => for_each_expr(b, f),
            Stmt::Loop(lp) => {
                for_each_expr(&lp.init, f);
                for_each_expr(&lp.test, f);
                for_each_expr(&lp.incr, f);
                for_each_expr(&lp.body, f);
            }
            Stmt::Cond(c) => {
                visit_expr(&c.test, f);
                for_each_expr(&c.then_block, f);
                if let Some(e) = &c.else_block {
                    for_each_expr(e, f);
                }
            }
            Stmt::Return(Some(e)) => visit_expr(e, f),
        }
    }
}

fn visit_expr(expr: &Expr, f: &mut impl FnMut(&Expr)) {
    f(expr);
    if let Expr::Call(c) = expr {
        for a in &c.args {
            visit_expr(a, f);
        }
    }
}

/// Visit every expression in `block` mutably, innermost first.
pub fn for_each_expr_mut(block: &mut Block, f: &mut impl FnMut(&mut Expr)) {
    if let BlockKind::Kernel {
        work_items,
        group_size,
    } = &mut block.kind
    {
        visit_expr_mut(work_items, f);
        visit_expr_mut(group_size, f);
    }
    for stmt in &mut block.stmts {
        match stmt {
            Stmt::Def(_) | Stmt::Return(None) => {}
            Stmt::Call(call) => {
                for a in &mut call.args {
                    visit_expr_mut(a, f);
                }
            }
            Stmt::Block(b) => for_each_expr_mut(b, f),
            Stmt::Loop(lp) => {
                for_each_expr_mut(&mut lp.init, f);
                for_each_expr_mut(&mut lp.test, f);
                for_each_expr_mut(&mut lp.incr, f);
                for_each_expr_mut(&mut lp.body, f);
            }
            Stmt::Cond(c) => {
                visit_expr_mut(&mut c.test, f);
                for_each_expr_mut(&mut c.then_block, f);
                if let Some(e) = &mut c.else_block {
                    for_each_expr_mut(e, f);
                }
            }
            Stmt::Return(Some(e)) => visit_expr_mut(e, f),
        }
    }
}

fn visit_expr_mut(expr: &mut Expr, f: &mut impl FnMut(&mut Expr)) {
    if let Expr::Call(c) = expr {
        for a in &mut c.args {
            visit_expr_mut(a, f);
        }
    }
    f(expr);
}

/// Visit every call in `block` mutably (statement calls and nested ones).
pub fn for_each_call_mut(block: &mut Block, f: &mut impl FnMut(&mut Call)) {
    for_each_expr_mut(block, &mut |e| {
        if let Expr::Call(c) = e {
            f(&mut **c);
        }
    });
    visit_stmt_calls_mut(block, f);
}

fn visit_stmt_calls_mut(block: &mut Block, f: &mut impl FnMut(&mut Call)) {
    for stmt in &mut block.stmts {
        match stmt {
            Stmt::Call(c) => f(c),
            Stmt::Block(b) => visit_stmt_calls_mut(b, f),
            Stmt::Loop(lp) => {
                visit_stmt_calls_mut(&mut lp.init, f);
                visit_stmt_calls_mut(&mut lp.test, f);
                visit_stmt_calls_mut(&mut lp.incr, f);
                visit_stmt_calls_mut(&mut lp.body, f);
            }
            Stmt::Cond(c) => {
                visit_stmt_calls_mut(&mut c.then_block, f);
                if let Some(e) = &mut c.else_block {
                    visit_stmt_calls_mut(e, f);
                }
            }
            Stmt::Def(_) | Stmt::Return(_) => {}
        }
    }
}

/// Redirect every use of a mapped symbol. Declarations are left alone.
pub fn replace_syms(block: &mut Block, map: &HashMap<SymId, SymId>) {
    if map.is_empty() {
        return;
    }
    for_each_expr_mut(block, &mut |e| {
        if let Expr::Sym(s) = e {
            if let Some(to) = map.get(s) {
                *s = *to;
            }
        }
    });
}
