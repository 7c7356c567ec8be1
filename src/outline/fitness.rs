//! Device fitness: may a call run on an accelerator work-item?
//!
//! Every call is placed on a two-bit lattice. *Fast* means it neither
//! blocks nor yields; *local* means it touches no remote memory. Only
//! `FastAndLocal` calls may appear in a kernel.

use std::collections::HashSet;

use crate::ir::walk::{collect_calls, collect_loop_calls, CallSite};
use crate::ir::{CForLoop, Call, Callee, Expr, FnId, PrimOp, Program};

use super::report::Rejection;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verdict {
    NotFastNotLocal = 0,
    LocalNotFast = 1,
    FastNotLocal = 2,
    FastAndLocal = 3,
}

impl Verdict {
    const FAST: u8 = 2;
    const LOCAL: u8 = 1;

    fn from_bits(bits: u8) -> Verdict {
        match bits & 3 {
            0 => Verdict::NotFastNotLocal,
            1 => Verdict::LocalNotFast,
            2 => Verdict::FastNotLocal,
            _ => Verdict::FastAndLocal,
        }
    }

    pub fn is_fast(self) -> bool {
        self as u8 & Self::FAST != 0
    }

    pub fn is_local(self) -> bool {
        self as u8 & Self::LOCAL != 0
    }

    /// In a local context nothing is remote, so every verdict gains the
    /// local bit.
    pub fn in_local_context(self) -> Verdict {
        Verdict::from_bits(self as u8 | Self::LOCAL)
    }
}

/// Fixed verdict of a primitive, before operand-dependent refinement.
pub fn base_verdict(op: PrimOp) -> Verdict {
    use PrimOp::*;
    match op {
        Noop | Move | Assign | UnaryMinus | UnaryNot | UnaryLNot | Add | Subtract | Mult
        | Div | Mod | Lsh | Rsh | And | Or | Xor | Pow | Min | Max | Equal | NotEqual
        | LessOrEqual | GreaterOrEqual | Less | Greater | AddAssign | SubtractAssign
        | MultAssign | DivAssign | ModAssign | LshAssign | RshAssign | AndAssign | OrAssign
        | XorAssign | CheckNil | AddrOf | SetReference | LocalCheck | Cast | SizeOf
        | PtrEqual | PtrNotEqual | CastToVoidStar | GetUserLine | GetUserFile
        | GetGlobalId => Verdict::FastAndLocal,

        GetMember | GetMemberValue | SetMember | Deref | ArrayGet | ArrayGetValue
        | ArraySet => Verdict::FastAndLocal,

        ArrayAlloc | ArrayFree | HereAlloc | HereFree | StringCopy | RtError | RtWarning => {
            Verdict::LocalNotFast
        }

        CommGet | CommPut | CommArrayGet | CommArrayPut => Verdict::FastNotLocal,

        OnLocaleNum | WideGetLocale | WideGetNode | HeapBroadcastGlobalVars
        | PrivateBroadcast | GetSerial | SetSerial | GetEndCount | SetEndCount | Write
        | IsGpuSublocale => Verdict::NotFastNotLocal,
    }
}

/// Primitives whose locality depends on whether the handle operand is wide.
fn accesses_through_handle(op: PrimOp) -> bool {
    matches!(
        op,
        PrimOp::GetMember
            | PrimOp::GetMemberValue
            | PrimOp::SetMember
            | PrimOp::Deref
            | PrimOp::ArrayGet
            | PrimOp::ArrayGetValue
            | PrimOp::ArraySet
    )
}

pub struct FitnessClassifier {
    /// The program targets a single execution unit.
    single_unit: bool,
}

impl FitnessClassifier {
    pub fn new(single_unit: bool) -> Self {
        Self { single_unit }
    }

    /// Verdict for a primitive call. Calls to functions are classified
    /// through [`FitnessClassifier::is_function_fit`].
    pub fn classify(&self, program: &Program, call: &Call, in_local_block: bool) -> Verdict {
        let Callee::Prim(op) = call.callee else {
            return Verdict::NotFastNotLocal;
        };
        let mut verdict = base_verdict(op);
        if accesses_through_handle(op) && handle_is_wide(program, call) {
            verdict = Verdict::FastNotLocal;
        }
        if in_local_block || self.single_unit {
            verdict = verdict.in_local_context();
        }
        verdict
    }

    /// True if every call reachable from `f` is `FastAndLocal`. A positive
    /// answer is memoized on the function and never revoked.
    pub fn is_function_fit(&self, program: &mut Program, f: FnId) -> bool {
        let mut query = Query::default();
        let fit = self.check_fn(program, f, &mut query);
        query.commit(program);
        fit
    }

    /// Check every call in a loop's header and body. `in_local` is the
    /// locality of the loop's own position.
    pub fn check_loop(
        &self,
        program: &mut Program,
        lp: &CForLoop,
        in_local: bool,
    ) -> Result<(), Rejection> {
        let mut calls = Vec::new();
        collect_loop_calls(lp, in_local, &mut calls);
        let mut query = Query::default();
        let result = self.check_sites(program, &calls, false, &mut query);
        query.commit(program);
        result
    }

    /// Check the statements of an explicit kernel block.
    pub fn check_block(
        &self,
        program: &mut Program,
        block: &crate::ir::Block,
        in_local: bool,
    ) -> Result<(), Rejection> {
        let mut calls = Vec::new();
        collect_calls(block, in_local, &mut calls);
        let mut query = Query::default();
        let result = self.check_sites(program, &calls, false, &mut query);
        query.commit(program);
        result
    }

    fn check_sites(
        &self,
        program: &Program,
        calls: &[CallSite<'_>],
        local_fn: bool,
        query: &mut Query,
    ) -> Result<(), Rejection> {
        for site in calls {
            match site.call.callee {
                Callee::Prim(op) => {
                    let verdict = self.classify(program, site.call, site.in_local || local_fn);
                    if verdict != Verdict::FastAndLocal {
                        return Err(Rejection::Unfit {
                            callee: op.name().to_string(),
                        });
                    }
                }
                Callee::Fn(g) => {
                    if !self.check_fn(program, g, query) {
                        return Err(Rejection::Unfit {
                            callee: program.func(g).name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn check_fn(&self, program: &Program, f: FnId, query: &mut Query) -> bool {
        let func = program.func(f);
        if func.flags.fit_for_offload || query.proven.contains(&f) {
            return true;
        }
        // Revisiting a function in the same query means a call cycle.
        if !query.visiting.insert(f) {
            return false;
        }
        let flags = &func.flags;
        // Kernels cannot be launched from device code.
        if flags.extern_fn || flags.on_block || flags.non_blocking || flags.offload_target {
            return false;
        }
        let mut calls = Vec::new();
        collect_calls(&func.body, false, &mut calls);
        let fit = self
            .check_sites(program, &calls, flags.local_fn, query)
            .is_ok();
        if fit {
            query.proven.insert(f);
        }
        fit
    }
}

/// Bookkeeping of one top-level fitness query.
#[derive(Default)]
struct Query {
    visiting: HashSet<FnId>,
    proven: HashSet<FnId>,
}

impl Query {
    fn commit(self, program: &mut Program) {
        for f in self.proven {
            program.func_mut(f).flags.fit_for_offload = true;
        }
    }
}

fn handle_is_wide(program: &Program, call: &Call) -> bool {
    match call.args.first() {
        Some(Expr::Sym(s)) => program.sym(*s).ty.is_wide(),
        _ => false,
    }
}
