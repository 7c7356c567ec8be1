//! Temporary elimination in loop increments.
//!
//! Front ends often lower `i += s` to a load/modify/store through a
//! temporary:
//!
//! ```text
//! var t; t := i; t += s; i := t;
//! ```
//!
//! which hides the induction update from [`super::shape::recognize`]. This
//! peephole rewrites it back to `i += s`.

use crate::ir::walk::for_each_expr;
use crate::ir::{Block, Expr, Program, Stmt, SymId};

/// Collapse every eliminable temporary declared directly in `block`.
/// Returns how many were removed.
pub fn eliminate_temporaries(program: &Program, block: &mut Block) -> usize {
    let candidates: Vec<SymId> = block
        .stmts
        .iter()
        .filter_map(|s| match s {
            Stmt::Def(t) if !program.sym(*t).ty.is_ref() => Some(*t),
            _ => None,
        })
        .collect();

    let mut removed = 0;
    for t in candidates {
        if let Some(plan) = plan_elimination(block, t) {
            apply(block, t, plan);
            removed += 1;
        }
    }
    removed
}

/// Statement indices of the copy-in, update and copy-out, plus the
/// variable the temporary shadows.
struct Plan {
    copy_in: usize,
    update: usize,
    copy_out: usize,
    var: SymId,
}

fn plan_elimination(block: &Block, t: SymId) -> Option<Plan> {
    // Exactly three mentions: copy-in target, update target, copy-out source.
    let mut mentions = 0;
    for_each_expr(block, &mut |e| {
        if *e == Expr::Sym(t) {
            mentions += 1;
        }
    });
    if mentions != 3 {
        return None;
    }

    let mut copy_in = None;
    let mut update = None;
    let mut copy_out = None;
    for (idx, stmt) in block.stmts.iter().enumerate() {
        let Some(call) = stmt.as_call() else {
            continue;
        };
        if let Some((target, value)) = call.as_copy() {
            if target == t {
                let src = value.as_sym().filter(|&s| s != t)?;
                if copy_in.replace((idx, src)).is_some() {
                    return None;
                }
            } else if value.as_sym() == Some(t) {
                if copy_out.replace((idx, target)).is_some() {
                    return None;
                }
            }
        } else if let Some((_, target, _)) = call.as_op_assign() {
            if target == t && update.replace(idx).is_some() {
                return None;
            }
        }
    }

    let (copy_in, src) = copy_in?;
    let update = update?;
    let (copy_out, dst) = copy_out?;
    if src != dst || !(copy_in < update && update < copy_out) {
        return None;
    }
    Some(Plan {
        copy_in,
        update,
        copy_out,
        var: src,
    })
}

fn apply(block: &mut Block, t: SymId, plan: Plan) {
    if let Stmt::Call(call) = &mut block.stmts[plan.update] {
        call.args[0] = Expr::Sym(plan.var);
    }
    let mut idx = 0;
    block.stmts.retain(|s| {
        let keep = idx != plan.copy_in && idx != plan.copy_out && *s != Stmt::Def(t);
        idx += 1;
        keep
    });
}
