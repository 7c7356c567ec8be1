//! Whole-program call graph (one edge per call site).

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Reversed};
use petgraph::Direction;

use super::walk::{collect_calls, CallSite};
use super::{FnId, ModId, Program};

/// Who owns a call site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Caller {
    /// A module's top-level statements.
    Init(ModId),
    Fn(FnId),
}

pub struct CallGraph {
    graph: DiGraph<Caller, ()>,
    nodes: HashMap<Caller, NodeIndex>,
}

impl CallGraph {
    pub fn build(program: &Program) -> Self {
        let mut cg = CallGraph {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
        };
        for m in 0..program.modules.len() {
            let m = ModId(m as u32);
            let mut calls = Vec::new();
            collect_calls(&program.module(m).init, false, &mut calls);
            cg.add_edges(Caller::Init(m), &calls);
        }
        for f in program.fn_ids() {
            cg.node(Caller::Fn(f));
            let mut calls = Vec::new();
            collect_calls(&program.func(f).body, false, &mut calls);
            cg.add_edges(Caller::Fn(f), &calls);
        }
        cg
    }

    fn node(&mut self, c: Caller) -> NodeIndex {
        if let Some(n) = self.nodes.get(&c) {
            return *n;
        }
        let n = self.graph.add_node(c);
        self.nodes.insert(c, n);
        n
    }

    fn add_edges(&mut self, from: Caller, calls: &[CallSite<'_>]) {
        let src = self.node(from);
        for site in calls {
            if let Some(callee) = site.call.fn_id() {
                let dst = self.node(Caller::Fn(callee));
                self.graph.add_edge(src, dst, ());
            }
        }
    }

    /// Number of call sites targeting `f`.
    pub fn call_site_count(&self, f: FnId) -> usize {
        match self.nodes.get(&Caller::Fn(f)) {
            Some(&n) => self
                .graph
                .neighbors_directed(n, Direction::Incoming)
                .count(),
            None => 0,
        }
    }

    /// Distinct callers of `f`.
    pub fn callers(&self, f: FnId) -> Vec<Caller> {
        let Some(&n) = self.nodes.get(&Caller::Fn(f)) else {
            return Vec::new();
        };
        let mut out: Vec<Caller> = self
            .graph
            .neighbors_directed(n, Direction::Incoming)
            .map(|p| self.graph[p])
            .collect();
        out.sort_by_key(caller_key);
        out.dedup();
        out
    }

    /// Every caller that can reach `f` through call edges, `f` included,
    /// in breadth-first order.
    pub fn transitive_callers(&self, f: FnId) -> Vec<Caller> {
        let Some(&start) = self.nodes.get(&Caller::Fn(f)) else {
            return Vec::new();
        };
        let reversed = Reversed(&self.graph);
        let mut bfs = Bfs::new(reversed, start);
        let mut out = Vec::new();
        while let Some(n) = bfs.next(reversed) {
            out.push(self.graph[n]);
        }
        out
    }
}

fn caller_key(c: &Caller) -> (u8, u32) {
    match c {
        Caller::Init(m) => (0, m.0),
        Caller::Fn(f) => (1, f.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Block, Call, Callee, Function, Scope, Stmt};

    fn call(f: FnId) -> Stmt {
        Stmt::Call(Call::new(Callee::Fn(f), vec![]))
    }

    #[test]
    fn test_callers_and_counts() {
        let mut p = Program::new();
        let m = p.add_module("m", 0);
        let a = p.add_function(Function::new("a", Scope::Module(m)));
        let b = p.add_function(Function::new("b", Scope::Module(m)));
        let c = p.add_function(Function::new("c", Scope::Module(m)));
        p.func_mut(a).body = Block::with_stmts(vec![call(c), call(c)]);
        p.func_mut(b).body = Block::with_stmts(vec![call(c)]);
        p.module_mut(m).init = Block::with_stmts(vec![call(a)]);

        let cg = CallGraph::build(&p);
        assert_eq!(cg.call_site_count(c), 3);
        assert_eq!(cg.callers(c), vec![Caller::Fn(a), Caller::Fn(b)]);
        assert_eq!(cg.callers(a), vec![Caller::Init(m)]);
        assert_eq!(cg.call_site_count(b), 0);
    }

    #[test]
    fn test_transitive_callers_terminate_on_cycles() {
        let mut p = Program::new();
        let m = p.add_module("m", 0);
        let a = p.add_function(Function::new("a", Scope::Module(m)));
        let b = p.add_function(Function::new("b", Scope::Module(m)));
        p.func_mut(a).body = Block::with_stmts(vec![call(b)]);
        p.func_mut(b).body = Block::with_stmts(vec![call(a)]);
        let cg = CallGraph::build(&p);
        let reach = cg.transitive_callers(b);
        assert_eq!(reach.len(), 2);
        assert!(reach.contains(&Caller::Fn(a)));
    }
}
