//! Loop body → kernel function.
//!
//! ```text
//! for (i := k1; i < k2; i += k3) { A[i] = B[i]; }
//!
//! fn gpu_kernel0(_wkgrp_size_arg, _wkitem_count_arg) @kernel {
//!     _wkitem_id := get_global_id();
//!     _new_index := k1 + k3 * _wkitem_id;
//!     A[_new_index] = B[_new_index];
//! }
//! ```
//!
//! The call site (the GPU path) computes the work-item count and, after
//! the launch, leaves the index with the value the loop would have left.

use std::collections::HashSet;

use crate::config::OffloadOptions;
use crate::ir::walk::{defined_symbols, symbol_uses, written_symbols};
use crate::ir::{
    Block, BlockKind, CForLoop, Call, Callee, Expr, FnId, Function, PrimOp, Program, Scope,
    Stmt, SymFlags, SymId, Symbol, SymbolMap, Type,
};

use super::registry::{KernelOrigin, KernelRegistry};
use super::report::Rejection;
use super::shape::{self, LoopShape};
use super::temps::eliminate_temporaries;
use super::trip::{self, TripCount};

/// A successfully outlined loop.
#[derive(Clone, Debug)]
pub struct OutlinedLoop {
    pub id: u32,
    pub kernel: FnId,
    /// Replaces the loop when running on an accelerator.
    pub gpu_path: Block,
}

/// Everything established about a loop before the IR is touched.
struct Plan {
    shape: LoopShape,
    trip: TripCount,
    /// The index is declared in the loop header and dies with the loop.
    index_is_header_local: bool,
}

/// Outline `lp`, found in `enclosing`, into a registered kernel.
///
/// All legality checks run first; on `Err` neither the program nor the
/// registry has been modified.
pub fn outline_loop(
    program: &mut Program,
    registry: &mut KernelRegistry,
    options: &OffloadOptions,
    enclosing: FnId,
    lp: &CForLoop,
) -> Result<OutlinedLoop, Rejection> {
    let plan = plan(program, lp)?;
    let kernel = new_kernel(program, registry, enclosing);
    let kscope = Scope::Function(kernel);

    let wkitem = program.new_temp("_wkitem_id", Type::Int, kscope);
    let index_ty = program.sym(plan.shape.index).ty.clone();
    let new_index = program.new_temp("_new_index", index_ty, kscope);

    let mut map = SymbolMap::new();
    map.syms.insert(plan.shape.index, new_index);
    let body = program.copy_block(&lp.body, &mut map, kscope);

    let mut stmts = vec![
        Stmt::Def(wkitem),
        Stmt::mov(wkitem, Expr::prim(PrimOp::GetGlobalId, vec![])),
        Stmt::Def(new_index),
        Stmt::mov(new_index, trip::index_at(&plan.shape, Expr::Sym(wkitem))),
    ];
    stmts.extend(body.stmts);
    let k = program.func_mut(kernel);
    k.body = Block::with_stmts(stmts);
    k.span = lp.span;

    let id = registry.register(kernel, KernelOrigin::Loop);
    log::debug!("outlined loop into '{}' (kernel {})", program.func(kernel).name, id);

    let gpu_path = launch_block(program, options, enclosing, kernel, lp, &plan);
    Ok(OutlinedLoop {
        id,
        kernel,
        gpu_path,
    })
}

/// Every legality check of [`outline_loop`] after fitness, without
/// touching the IR.
pub fn analyze(program: &Program, lp: &CForLoop) -> Result<LoopShape, Rejection> {
    plan(program, lp).map(|p| p.shape)
}

fn plan(program: &Program, lp: &CForLoop) -> Result<Plan, Rejection> {
    let mut header = lp.clone();
    eliminate_temporaries(program, &mut header.incr);
    let shape = shape::recognize(&header).ok_or(Rejection::NotCanonical)?;

    if has_return(&lp.body) {
        return Err(Rejection::EarlyExit);
    }
    let trip = trip::synthesize(program, &shape)?;

    let mut header_defs: HashSet<SymId> = HashSet::new();
    for block in [&header.init, &header.test, &header.incr] {
        header_defs.extend(defined_symbols(block));
    }
    let written = written_symbols(program, &lp.body);
    for s in shape.operand_syms() {
        if written.contains(&s) || header_defs.contains(&s) {
            return Err(Rejection::VariantOperand {
                name: program.sym(s).name.clone(),
            });
        }
    }
    if written.contains(&shape.index) {
        return Err(Rejection::IndexWritten {
            name: program.sym(shape.index).name.clone(),
        });
    }
    let uses = symbol_uses(&lp.body);
    if let Some(s) = uses
        .iter()
        .find(|s| **s != shape.index && header_defs.contains(*s))
    {
        return Err(Rejection::HeaderLocal {
            name: program.sym(*s).name.clone(),
        });
    }
    // Captured variables reach the kernel by value; only reference-like
    // ones carry writes back to the caller.
    let body_defs: HashSet<SymId> = defined_symbols(&lp.body).into_iter().collect();
    if let Some(s) = uses.iter().find(|s| {
        written.contains(*s)
            && !body_defs.contains(*s)
            && !program.sym(**s).ty.is_reference_like()
    }) {
        return Err(Rejection::CapturedWrite {
            name: program.sym(*s).name.clone(),
        });
    }

    Ok(Plan {
        index_is_header_local: header_defs.contains(&shape.index),
        shape,
        trip,
    })
}

fn has_return(block: &Block) -> bool {
    block.stmts.iter().any(|s| match s {
        Stmt::Return(_) => true,
        Stmt::Block(b) => has_return(b),
        Stmt::Loop(lp) => has_return(&lp.body),
        Stmt::Cond(c) => {
            has_return(&c.then_block) || c.else_block.as_ref().is_some_and(has_return)
        }
        Stmt::Def(_) | Stmt::Call(_) => false,
    })
}

/// Create an empty kernel function nested in `enclosing`, carrying the
/// launch formals `(_wkgrp_size_arg, _wkitem_count_arg)`. The caller
/// registers it once its body is in place.
pub(super) fn new_kernel(
    program: &mut Program,
    registry: &KernelRegistry,
    enclosing: FnId,
) -> FnId {
    let name = program.fresh_name(&format!("gpu_kernel{}", registry.next_id()));
    let mut func = Function::new(name, Scope::Function(enclosing));
    func.flags.offload_target = true;
    let kernel = program.add_function(func);
    program.func_mut(enclosing).nested.push(kernel);

    let scope = Scope::Function(kernel);
    let formals: Vec<SymId> = ["_wkgrp_size_arg", "_wkitem_count_arg"]
        .into_iter()
        .map(|name| {
            program.add_symbol(Symbol {
                name: name.to_string(),
                ty: Type::Int,
                scope,
                flags: SymFlags {
                    no_codegen: true,
                    ..SymFlags::default()
                },
                span: crate::span::Span::dummy(),
            })
        })
        .collect();
    program.func_mut(kernel).formals = formals;
    kernel
}

/// `_wkgrp_size := N; _wkitem_count := trip; kernel(...); i := exit`.
fn launch_block(
    program: &mut Program,
    options: &OffloadOptions,
    enclosing: FnId,
    kernel: FnId,
    lp: &CForLoop,
    plan: &Plan,
) -> Block {
    let scope = Scope::Function(enclosing);
    let wkgrp = program.new_temp("_wkgrp_size", Type::Int, scope);
    let count = program.new_temp("_wkitem_count", Type::Int, scope);
    let launch = Call::new(
        Callee::Fn(kernel),
        vec![Expr::Sym(wkgrp), Expr::Sym(count)],
    )
    .with_span(lp.span);

    let mut stmts = vec![
        Stmt::Def(wkgrp),
        Stmt::mov(wkgrp, Expr::int(i64::from(options.work_group_size))),
        Stmt::Def(count),
        Stmt::mov(count, plan.trip.count.clone()),
        Stmt::Call(launch),
    ];
    if !plan.index_is_header_local {
        stmts.push(Stmt::mov(
            plan.shape.index,
            trip::index_at(&plan.shape, Expr::Sym(count)),
        ));
    }
    Block {
        kind: BlockKind::Plain,
        stmts,
    }
}
