//! The GPU outlining pass.
//!
//! ```text
//!   explicit kernel blocks ─┐
//!                           ├─► KernelRegistry ─► bundle ─► device copies
//!   order-independent loops ┘
//!     shape → fitness → temps → trip count → kernel → dual path
//! ```
//!
//! Loops are visited outermost first. An outlined loop is not searched
//! further; a rejected one is, so an inner loop can still be offloaded.

pub mod bundle;
pub mod check;
pub mod device;
pub mod dual;
pub mod explicit;
pub mod fitness;
pub mod kernel;
pub mod layout;
pub mod registry;
pub mod report;
pub mod request;
pub mod shape;
pub mod temps;
pub mod trip;

use crate::config::OffloadOptions;
use crate::diagnostic::Diagnostic;
use crate::error::OffloadError;
use crate::ir::callgraph::CallGraph;
use crate::ir::{Block, BlockKind, CForLoop, FnId, Program, Stmt};

use fitness::FitnessClassifier;
use registry::KernelRegistry;
use report::{LoopOutcome, Report};

/// What the pass hands to the backend.
#[derive(Clone, Debug, Default)]
pub struct OffloadResult {
    pub registry: KernelRegistry,
    pub report: Report,
    /// Explicit kernel blocks that failed the fitness check.
    pub warnings: Vec<Diagnostic>,
}

pub struct OffloadPass {
    options: OffloadOptions,
    classifier: FitnessClassifier,
    registry: KernelRegistry,
    report: Report,
}

impl OffloadPass {
    pub fn new(options: OffloadOptions) -> Self {
        let classifier = FitnessClassifier::new(options.single_unit);
        Self {
            options,
            classifier,
            registry: KernelRegistry::new(),
            report: Report::default(),
        }
    }

    /// Rewrite `program` in place.
    pub fn run(mut self, program: &mut Program) -> Result<OffloadResult, OffloadError> {
        let warnings = if self.options.explicit_kernels {
            explicit::outline_kernel_blocks(program, &mut self.registry, &self.classifier)
        } else {
            Vec::new()
        };

        let graph = CallGraph::build(program);
        let requested = request::requested_functions(program, &graph);
        let candidates: Vec<FnId> = program
            .fn_ids()
            .filter(|f| requested.contains(f) && is_host_function(program, *f))
            .collect();
        for f in candidates {
            let in_local = program.func(f).flags.local_fn;
            // Analyses read the original body while the copy is rewritten.
            let mut body = program.func(f).body.clone();
            if self.visit_block(program, f, &mut body, in_local) {
                program.func_mut(f).body = body;
            }
        }

        bundle::bundle_kernels(program, &self.registry)?;
        if self.options.device_copies {
            device::make_device_copies(program, &self.registry);
        }
        log::debug!(
            "offload: {} loop(s) outlined, {} rejected, {} kernel(s)",
            self.report.outlined(),
            self.report.rejected(),
            self.registry.len()
        );
        Ok(OffloadResult {
            registry: self.registry,
            report: self.report,
            warnings,
        })
    }

    fn visit_block(&mut self, program: &mut Program, f: FnId, block: &mut Block, in_local: bool) -> bool {
        let in_local = match block.kind {
            BlockKind::Local => true,
            BlockKind::Kernel { .. } => return false,
            BlockKind::Plain => in_local,
        };
        let mut changed = false;
        for stmt in &mut block.stmts {
            match stmt {
                Stmt::Loop(lp) => {
                    if lp.order_independent {
                        if let Some(replacement) = self.consider(program, f, lp, in_local) {
                            *stmt = replacement;
                            changed = true;
                            continue;
                        }
                    }
                    changed |= self.visit_block(program, f, &mut lp.body, in_local);
                }
                Stmt::Block(b) => changed |= self.visit_block(program, f, b, in_local),
                Stmt::Cond(c) => {
                    changed |= self.visit_block(program, f, &mut c.then_block, in_local);
                    if let Some(e) = &mut c.else_block {
                        changed |= self.visit_block(program, f, e, in_local);
                    }
                }
                Stmt::Def(_) | Stmt::Call(_) | Stmt::Return(_) => {}
            }
        }
        changed
    }

    /// Try to offload one loop; `Some` is the statement replacing it.
    fn consider(&mut self, program: &mut Program, f: FnId, lp: &CForLoop, in_local: bool) -> Option<Stmt> {
        let attempt = self
            .classifier
            .check_loop(program, lp, in_local)
            .and_then(|()| kernel::outline_loop(program, &mut self.registry, &self.options, f, lp));
        let (result, replacement) = match attempt {
            Ok(out) => (Ok(out.id), Some(dual::dual_path(program, f, lp, out.gpu_path))),
            Err(reason) => (Err(reason), None),
        };

        let (file, line) = program.location(lp.span);
        let outcome = LoopOutcome {
            function: program.func(f).name.clone(),
            file,
            line,
            span: lp.span,
            result,
        };
        if self.options.report {
            println!("{}", outcome.report_line());
        }
        log::debug!("{}", outcome.report_line());
        self.report.push(outcome);
        replacement
    }
}

fn is_host_function(program: &Program, f: FnId) -> bool {
    let flags = &program.func(f).flags;
    !flags.offload_target && !flags.device_copy && !flags.extern_fn
}

/// Run the pass with `options` over `program`.
pub fn outline_program(program: &mut Program, options: &OffloadOptions) -> Result<OffloadResult, OffloadError> {
    OffloadPass::new(options.clone()).run(program)
}

#[cfg(test)]
mod tests;
