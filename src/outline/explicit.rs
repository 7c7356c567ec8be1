//! Explicit `kernel(count, size) { ... }` blocks.
//!
//! The block is trusted to be order independent: its statements move into
//! a kernel function unchanged and the block becomes the launch
//! `gpu_kernelN(size, count)`. The body reads its work-item through
//! `get_global_id()`.

use crate::diagnostic::Diagnostic;
use crate::ir::walk::defined_symbols;
use crate::ir::{Block, BlockKind, Call, Callee, Expr, FnId, Program, Scope, Stmt};

use super::fitness::FitnessClassifier;
use super::kernel::new_kernel;
use super::registry::{KernelOrigin, KernelRegistry};

/// Outline every kernel block in every function. Blocks that fail the
/// fitness check are outlined anyway and reported as warnings.
pub fn outline_kernel_blocks(
    program: &mut Program,
    registry: &mut KernelRegistry,
    classifier: &FitnessClassifier,
) -> Vec<Diagnostic> {
    let mut warnings = Vec::new();
    let candidates: Vec<FnId> = program
        .fn_ids()
        .filter(|&f| {
            let flags = &program.func(f).flags;
            !flags.offload_target && !flags.extern_fn
        })
        .collect();
    for f in candidates {
        let local = program.func(f).flags.local_fn;
        let mut body = program.func(f).body.clone();
        if rewrite_block(program, registry, classifier, &mut warnings, f, &mut body, local) {
            program.func_mut(f).body = body;
        }
    }
    warnings
}

fn rewrite_block(
    program: &mut Program,
    registry: &mut KernelRegistry,
    classifier: &FitnessClassifier,
    warnings: &mut Vec<Diagnostic>,
    enclosing: FnId,
    block: &mut Block,
    in_local: bool,
) -> bool {
    let in_local = in_local || block.kind == BlockKind::Local;
    let mut changed = false;
    for stmt in &mut block.stmts {
        match stmt {
            Stmt::Block(b) if matches!(b.kind, BlockKind::Kernel { .. }) => {
                *stmt = launch(program, registry, classifier, warnings, enclosing, b, in_local);
                changed = true;
            }
            Stmt::Block(b) => {
                changed |= rewrite_block(program, registry, classifier, warnings, enclosing, b, in_local);
            }
            Stmt::Loop(lp) => {
                changed |= rewrite_block(program, registry, classifier, warnings, enclosing, &mut lp.body, in_local);
            }
            Stmt::Cond(c) => {
                changed |= rewrite_block(program, registry, classifier, warnings, enclosing, &mut c.then_block, in_local);
                if let Some(e) = &mut c.else_block {
                    changed |= rewrite_block(program, registry, classifier, warnings, enclosing, e, in_local);
                }
            }
            Stmt::Def(_) | Stmt::Call(_) | Stmt::Return(_) => {}
        }
    }
    changed
}

fn launch(
    program: &mut Program,
    registry: &mut KernelRegistry,
    classifier: &FitnessClassifier,
    warnings: &mut Vec<Diagnostic>,
    enclosing: FnId,
    block: &Block,
    in_local: bool,
) -> Stmt {
    let BlockKind::Kernel {
        work_items,
        group_size,
    } = block.kind.clone()
    else {
        return Stmt::Block(block.clone());
    };
    if let Err(reason) = classifier.check_block(program, block, in_local) {
        let name = &program.func(enclosing).name;
        log::warn!("kernel block in '{}' is not safe to offload: {}", name, reason);
        warnings.push(
            Diagnostic::warning(
                format!("kernel block in '{}' is not safe to offload: {}", name, reason),
                program.func(enclosing).span,
            )
            .with_note("the block is outlined as written".to_string()),
        );
    }

    let kernel = new_kernel(program, registry, enclosing);
    let scope = Scope::Function(kernel);
    for s in defined_symbols(block) {
        program.sym_mut(s).scope = scope;
    }
    let span = program.func(enclosing).span;
    let k = program.func_mut(kernel);
    k.body = Block::with_stmts(block.stmts.clone());
    k.span = span;
    let id = registry.register(kernel, KernelOrigin::Block);
    log::debug!("outlined kernel block into '{}' (kernel {})", program.func(kernel).name, id);

    Stmt::Call(Call::new(Callee::Fn(kernel), vec![group_size, work_items]).with_span(span))
}
