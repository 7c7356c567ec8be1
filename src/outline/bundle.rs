//! Free-variable bundling (closure conversion of kernels).
//!
//! A kernel is born nested in the function it was outlined from and reads
//! that function's variables directly. Device code cannot, so every such
//! variable is packed into a carrier object at the launch site and unpacked
//! in the kernel prologue:
//!
//! ```text
//! // launch site                              // kernel prologue
//! var _args_for_gpu_kernel0: C;               var n: int @temp;
//! _args_for_gpu_kernel0 := here_alloc(type C);  n := get_member_value(_carrier, 0);
//! set_member(_args_for_gpu_kernel0, 0, n);
//! var _args_vfor_gpu_kernel0: c_ptr;
//! _args_vfor_gpu_kernel0 := cast_to_void_star(_args_for_gpu_kernel0);
//! gpu_kernel0(_args_vfor_gpu_kernel0, _args_for_gpu_kernel0, size, count);
//! ```
//!
//! The kernel is then hoisted to module level.

use std::collections::HashMap;

use crate::error::OffloadError;
use crate::ir::callgraph::{CallGraph, Caller};
use crate::ir::walk::symbol_uses;
use crate::ir::{
    Block, Call, Expr, Field, FnId, PrimOp, Program, Scope, Stmt, SymFlags, SymId, Symbol, Type,
    TypeDef, TypeId,
};
use crate::span::Span;

use super::registry::KernelRegistry;

/// Bundle the free variables of every registered kernel, in registry order.
pub fn bundle_kernels(program: &mut Program, registry: &KernelRegistry) -> Result<(), OffloadError> {
    let graph = CallGraph::build(program);
    for entry in registry.iter() {
        bundle_kernel(program, &graph, entry.func)?;
    }
    Ok(())
}

/// Symbols `kernel` uses but does not declare, in first-use order.
/// Compile-time params and type aliases need no storage and stay put.
pub fn free_variables(program: &Program, kernel: FnId) -> Vec<SymId> {
    let own = Scope::Function(kernel);
    symbol_uses(&program.func(kernel).body)
        .into_iter()
        .filter(|&s| {
            let sym = program.sym(s);
            sym.scope != own && !sym.flags.param && !sym.flags.type_alias
        })
        .collect()
}

fn bundle_kernel(program: &mut Program, graph: &CallGraph, kernel: FnId) -> Result<(), OffloadError> {
    let name = program.func(kernel).name.clone();
    let count = graph.call_site_count(kernel);
    if count != 1 {
        return Err(OffloadError::CallSiteCount {
            kernel: name,
            count,
            span: program.func(kernel).span,
        });
    }
    let caller = graph.callers(kernel)[0];

    let free = free_variables(program, kernel);
    let module = program.module_of(Scope::Function(kernel));
    let carrier = declare_carrier(program, kernel, &free);
    for &s in &free {
        if program.sym(s).ty.is_reference_like() {
            program.sym_mut(s).flags.concurrently_accessed = true;
        }
    }

    // Kernel side: new formals, then the unpacking prologue.
    let kscope = Scope::Function(kernel);
    let bundle = program.add_symbol(Symbol {
        name: "_bundle".to_string(),
        ty: Type::CVoidPtr,
        scope: kscope,
        flags: SymFlags {
            no_codegen: true,
            ..SymFlags::default()
        },
        span: Span::dummy(),
    });
    let carrier_formal = program.add_symbol(Symbol {
        name: "_carrier".to_string(),
        ty: Type::Class(carrier),
        scope: kscope,
        flags: SymFlags::default(),
        span: Span::dummy(),
    });
    let mut map = HashMap::new();
    let mut prologue = Vec::with_capacity(free.len() * 2);
    for (k, &s) in free.iter().enumerate() {
        let sym = program.sym(s);
        let (field_name, ty) = (sym.name.clone(), sym.ty.clone());
        let local = program.new_temp(&field_name, ty, kscope);
        prologue.push(Stmt::Def(local));
        prologue.push(Stmt::mov(
            local,
            Expr::prim(
                PrimOp::GetMemberValue,
                vec![Expr::Sym(carrier_formal), Expr::int(k as i64)],
            ),
        ));
        map.insert(s, local);
    }
    let func = program.func_mut(kernel);
    crate::ir::walk::replace_syms(&mut func.body, &map);
    prologue.append(&mut func.body.stmts);
    func.body.stmts = prologue;
    let mut formals = vec![bundle, carrier_formal];
    formals.append(&mut func.formals);
    func.formals = formals;

    // Launch side.
    splice_call_site(program, caller, kernel, carrier, &free)?;

    hoist(program, kernel, module);
    check_closed(program, kernel)?;
    log::debug!("bundled {} free variable(s) of '{}'", free.len(), name);
    Ok(())
}

/// Carrier type with one field per free variable, placed first among the
/// module's types.
fn declare_carrier(program: &mut Program, kernel: FnId, free: &[SymId]) -> TypeId {
    let name = program.fresh_name(&format!("_class_locals_{}", program.func(kernel).name));
    let fields = free
        .iter()
        .enumerate()
        .map(|(k, &s)| {
            let sym = program.sym(s);
            Field {
                name: format!("_{}_{}", k, sym.name),
                ty: sym.ty.clone(),
            }
        })
        .collect();
    let module = program.module_of(Scope::Function(kernel));
    let t = program.add_type(TypeDef {
        name,
        fields,
        module,
        carrier: true,
    });
    program.module_mut(module).types.insert(0, t);
    t
}

fn splice_call_site(
    program: &mut Program,
    caller: Caller,
    kernel: FnId,
    carrier: TypeId,
    free: &[SymId],
) -> Result<(), OffloadError> {
    let (scope, mut body) = match caller {
        Caller::Fn(g) => (Scope::Function(g), program.func(g).body.clone()),
        Caller::Init(m) => (Scope::Module(m), program.module(m).init.clone()),
    };
    let kname = program.func(kernel).name.clone();
    let args_for = program.new_temp(&format!("_args_for_{}", kname), Type::Class(carrier), scope);
    let args_vfor = program.new_temp(&format!("_args_vfor_{}", kname), Type::CVoidPtr, scope);

    let mut packing = vec![
        Stmt::Def(args_for),
        Stmt::mov(
            args_for,
            Expr::prim(PrimOp::HereAlloc, vec![Expr::Type(carrier)]),
        ),
    ];
    for (k, &s) in free.iter().enumerate() {
        packing.push(Stmt::prim(
            PrimOp::SetMember,
            vec![Expr::Sym(args_for), Expr::int(k as i64), Expr::Sym(s)],
        ));
    }
    packing.push(Stmt::Def(args_vfor));
    packing.push(Stmt::mov(
        args_vfor,
        Expr::prim(PrimOp::CastToVoidStar, vec![Expr::Sym(args_for)]),
    ));
    let actuals = [Expr::Sym(args_vfor), Expr::Sym(args_for)];

    if !insert_before_launch(&mut body, kernel, &mut Some(packing), &actuals) {
        let parent = match caller {
            Caller::Fn(g) => program.func(g).name.clone(),
            Caller::Init(m) => program.module(m).name.clone(),
        };
        return Err(OffloadError::MissingCallSite {
            kernel: kname,
            parent,
        });
    }
    match caller {
        Caller::Fn(g) => program.func_mut(g).body = body,
        Caller::Init(m) => program.module_mut(m).init = body,
    }
    Ok(())
}

/// Find the statement launching `kernel`, put `packing` in front of it and
/// prepend `actuals` to its arguments.
fn insert_before_launch(
    block: &mut Block,
    kernel: FnId,
    packing: &mut Option<Vec<Stmt>>,
    actuals: &[Expr],
) -> bool {
    let found = block.stmts.iter().position(|s| {
        s.as_call()
            .is_some_and(|c: &Call| c.fn_id() == Some(kernel))
    });
    if let Some(at) = found {
        if let Stmt::Call(call) = &mut block.stmts[at] {
            let mut args = actuals.to_vec();
            args.append(&mut call.args);
            call.args = args;
        }
        let mut tail = block.stmts.split_off(at);
        block.stmts.extend(packing.take().unwrap_or_default());
        block.stmts.append(&mut tail);
        return true;
    }
    block.stmts.iter_mut().any(|stmt| match stmt {
        Stmt::Block(b) => insert_before_launch(b, kernel, packing, actuals),
        Stmt::Loop(lp) => insert_before_launch(&mut lp.body, kernel, packing, actuals),
        Stmt::Cond(c) => {
            insert_before_launch(&mut c.then_block, kernel, packing, actuals)
                || c
                    .else_block
                    .as_mut()
                    .is_some_and(|e| insert_before_launch(e, kernel, packing, actuals))
        }
        Stmt::Def(_) | Stmt::Call(_) | Stmt::Return(_) => false,
    })
}

/// Move `kernel` from its enclosing function to the module's function list.
fn hoist(program: &mut Program, kernel: FnId, module: crate::ir::ModId) {
    match program.func(kernel).parent {
        Scope::Function(p) => program.func_mut(p).nested.retain(|&f| f != kernel),
        Scope::Module(m) => program.module_mut(m).functions.retain(|&f| f != kernel),
    }
    program.func_mut(kernel).parent = Scope::Module(module);
    program.module_mut(module).functions.push(kernel);
}

fn check_closed(program: &Program, kernel: FnId) -> Result<(), OffloadError> {
    match free_variables(program, kernel).first() {
        Some(&s) => Err(OffloadError::ResidualFreeVariable {
            kernel: program.func(kernel).name.clone(),
            symbol: program.sym(s).name.clone(),
            span: program.sym(s).span,
        }),
        None => Ok(()),
    }
}
