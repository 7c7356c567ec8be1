//! Which functions asked for offloading.
//!
//! A loop is considered only if its function, or some function that
//! (transitively) calls it, carries `@offload`.

use std::collections::HashSet;

use crate::ir::callgraph::{CallGraph, Caller};
use crate::ir::{FnId, Program};

/// Functions whose loops may be offloaded.
pub fn requested_functions(program: &Program, graph: &CallGraph) -> HashSet<FnId> {
    program
        .fn_ids()
        .filter(|&f| is_offload_requested(program, graph, f))
        .collect()
}

pub fn is_offload_requested(program: &Program, graph: &CallGraph, f: FnId) -> bool {
    if program.func(f).flags.offload_requested {
        return true;
    }
    graph.transitive_callers(f).into_iter().any(|c| match c {
        Caller::Fn(g) => program.func(g).flags.offload_requested,
        Caller::Init(_) => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_program;

    #[test]
    fn test_request_flows_down_the_call_chain() {
        let src = r#"
module m {
    fn leaf() { }
    fn mid() { leaf(); }
    fn top() @offload { mid(); }
    fn other() { }
    fn loop_a() { loop_b(); }
    fn loop_b() { loop_a(); }
    leaf();
}
"#;
        let p = parse_program("t.oir", src).expect("parses");
        let graph = CallGraph::build(&p);
        let set = requested_functions(&p, &graph);
        for name in ["leaf", "mid", "top"] {
            assert!(set.contains(&p.function_by_name(name).expect(name)), "{}", name);
        }
        for name in ["other", "loop_a", "loop_b"] {
            assert!(!set.contains(&p.function_by_name(name).expect(name)), "{}", name);
        }
    }
}
