//! Device copies of functions called from kernels.
//!
//! Device code cannot call into host objects, so every function reachable
//! from a kernel gets a clone flagged `@device`, declared right before its
//! original, and calls made from device code are redirected to the clones.
//! Extern functions are left alone: they are resolved by the device linker.

use std::collections::HashMap;

use crate::ir::walk::for_each_call_mut;
use crate::ir::{Callee, FnId, Program, Scope, SymbolMap};

use super::registry::KernelRegistry;

/// Clone the call tree of every kernel. Returns original → copy.
pub fn make_device_copies(program: &mut Program, registry: &KernelRegistry) -> HashMap<FnId, FnId> {
    let mut copies: HashMap<FnId, FnId> = HashMap::new();
    let mut work: Vec<FnId> = registry.fn_ids();
    while let Some(f) = work.pop() {
        for g in direct_callees(program, f) {
            if copies.contains_key(&g) || !needs_copy(program, g) {
                continue;
            }
            let mut map = SymbolMap::new();
            let name = program.fresh_name(&format!("{}_device", program.func(g).name));
            let parent = program.func(g).parent;
            let copy = program.copy_function(g, &name, parent, &mut map);
            insert_before(program, parent, g, copy);
            for (&orig, &new) in &map.fns {
                program.func_mut(new).flags.device_copy = true;
                copies.insert(orig, new);
                work.push(new);
            }
            log::debug!("device copy '{}' of '{}'", name, program.func(g).name);
        }
        redirect(program, f, &copies);
    }
    copies
}

fn needs_copy(program: &Program, f: FnId) -> bool {
    let flags = &program.func(f).flags;
    !flags.extern_fn && !flags.offload_target && !flags.device_copy
}

fn direct_callees(program: &Program, f: FnId) -> Vec<FnId> {
    let mut calls = Vec::new();
    crate::ir::walk::collect_calls(&program.func(f).body, false, &mut calls);
    let mut out: Vec<FnId> = Vec::new();
    for site in calls {
        if let Some(g) = site.call.fn_id() {
            if !out.contains(&g) {
                out.push(g);
            }
        }
    }
    out
}

fn insert_before(program: &mut Program, parent: Scope, original: FnId, copy: FnId) {
    let list = match parent {
        Scope::Module(m) => &mut program.module_mut(m).functions,
        Scope::Function(p) => &mut program.func_mut(p).nested,
    };
    let at = list.iter().position(|&f| f == original).unwrap_or(list.len());
    list.insert(at, copy);
}

fn redirect(program: &mut Program, f: FnId, copies: &HashMap<FnId, FnId>) {
    for_each_call_mut(&mut program.func_mut(f).body, &mut |call| {
        if let Callee::Fn(g) = call.callee {
            if let Some(&copy) = copies.get(&g) {
                call.callee = Callee::Fn(copy);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::registry::KernelOrigin;
    use crate::syntax::parse_program;

    const SRC: &str = r#"
module m {
    fn sq(x: int): int { return x * x; }
    fn quad(x: int): int { return sq(sq(x)); }
    fn host_only() { }
    fn sink(x: int) @extern;
    fn gpu_kernel0(_wkgrp_size_arg: int, _wkitem_count_arg: int) @kernel {
        var id: int = get_global_id();
        var y: int = quad(id);
        sink(y);
    }
    fn main() {
        gpu_kernel0(64, 8);
        var z: int = quad(3);
        host_only();
    }
}
"#;

    fn setup() -> (Program, KernelRegistry) {
        let p = parse_program("t.oir", SRC).expect("parses");
        let mut reg = KernelRegistry::new();
        reg.register(p.function_by_name("gpu_kernel0").expect("kernel"), KernelOrigin::Block);
        (p, reg)
    }

    #[test]
    fn test_call_tree_is_cloned_and_redirected() {
        let (mut p, reg) = setup();
        let copies = make_device_copies(&mut p, &reg);
        assert_eq!(copies.len(), 2);

        let sq = p.function_by_name("sq").expect("sq");
        let quad = p.function_by_name("quad").expect("quad");
        let sq_dev = p.function_by_name("sq_device").expect("sq copy");
        let quad_dev = p.function_by_name("quad_device").expect("quad copy");
        assert_eq!(copies[&sq], sq_dev);
        assert!(p.func(sq_dev).flags.device_copy);

        // Device code calls the copies, host code keeps the originals.
        let kernel = p.function_by_name("gpu_kernel0").expect("kernel");
        let mut calls = Vec::new();
        crate::ir::walk::collect_calls(&p.func(kernel).body, false, &mut calls);
        let targets: Vec<FnId> = calls.iter().filter_map(|c| c.call.fn_id()).collect();
        assert!(targets.contains(&quad_dev));
        assert!(!targets.contains(&quad));
        let main = p.function_by_name("main").expect("main");
        let mut calls = Vec::new();
        crate::ir::walk::collect_calls(&p.func(main).body, false, &mut calls);
        assert!(calls.iter().any(|c| c.call.fn_id() == Some(quad)));

        let mut calls = Vec::new();
        crate::ir::walk::collect_calls(&p.func(quad_dev).body, false, &mut calls);
        assert!(calls.iter().all(|c| c.call.fn_id() != Some(sq)));
    }

    #[test]
    fn test_copies_sit_before_their_originals() {
        let (mut p, reg) = setup();
        make_device_copies(&mut p, &reg);
        let order: Vec<&str> = p
            .module(crate::ir::ModId(0))
            .functions
            .iter()
            .map(|&f| p.func(f).name.as_str())
            .collect();
        assert_eq!(
            order,
            vec!["sq_device", "sq", "quad_device", "quad", "host_only", "sink", "gpu_kernel0", "main"]
        );
    }

    #[test]
    fn test_extern_and_uncalled_functions_are_not_copied() {
        let (mut p, reg) = setup();
        make_device_copies(&mut p, &reg);
        assert!(p.function_by_name("sink_device").is_none());
        assert!(p.function_by_name("host_only_device").is_none());
    }
}
