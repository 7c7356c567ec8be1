//! Dry run: classify every order-independent loop without rewriting.

use crate::config::OffloadOptions;
use crate::ir::callgraph::CallGraph;
use crate::ir::{Block, BlockKind, FnId, Program, Stmt};

use super::fitness::FitnessClassifier;
use super::kernel;
use super::report::Rejection;
use super::request;

/// Verdict for one loop.
#[derive(Clone, Debug)]
pub struct LoopCheck {
    pub function: String,
    pub file: String,
    pub line: u32,
    /// The enclosing function is reached from an `@offload` function.
    pub requested: bool,
    pub result: Result<(), Rejection>,
}

impl LoopCheck {
    pub fn summary(&self) -> String {
        let verdict = match &self.result {
            Ok(()) => "offloadable".to_string(),
            Err(reason) => reason.to_string(),
        };
        let note = if self.requested { "" } else { " (not requested)" };
        format!(
            "{}:{}: loop in '{}': {}{}",
            self.file, self.line, self.function, verdict, note
        )
    }
}

/// Check every order-independent loop of every host function, inner loops
/// included. Only fitness memo flags are written to `program`.
pub fn check_program(program: &mut Program, options: &OffloadOptions) -> Vec<LoopCheck> {
    let classifier = FitnessClassifier::new(options.single_unit);
    let graph = CallGraph::build(program);
    let requested = request::requested_functions(program, &graph);
    let mut out = Vec::new();
    for f in program.fn_ids().collect::<Vec<_>>() {
        let flags = &program.func(f).flags;
        if flags.offload_target || flags.device_copy || flags.extern_fn {
            continue;
        }
        let in_local = flags.local_fn;
        let body = program.func(f).body.clone();
        visit(program, &classifier, f, &body, in_local, requested.contains(&f), &mut out);
    }
    out
}

fn visit(
    program: &mut Program,
    classifier: &FitnessClassifier,
    f: FnId,
    block: &Block,
    in_local: bool,
    requested: bool,
    out: &mut Vec<LoopCheck>,
) {
    let in_local = match block.kind {
        BlockKind::Local => true,
        BlockKind::Kernel { .. } => return,
        BlockKind::Plain => in_local,
    };
    for stmt in &block.stmts {
        match stmt {
            Stmt::Loop(lp) => {
                if lp.order_independent {
                    let result = classifier
                        .check_loop(program, lp, in_local)
                        .and_then(|()| kernel::analyze(program, lp).map(|_| ()));
                    let (file, line) = program.location(lp.span);
                    out.push(LoopCheck {
                        function: program.func(f).name.clone(),
                        file,
                        line,
                        requested,
                        result,
                    });
                }
                visit(program, classifier, f, &lp.body, in_local, requested, out);
            }
            Stmt::Block(b) => visit(program, classifier, f, b, in_local, requested, out),
            Stmt::Cond(c) => {
                visit(program, classifier, f, &c.then_block, in_local, requested, out);
                if let Some(e) = &c.else_block {
                    visit(program, classifier, f, e, in_local, requested, out);
                }
            }
            Stmt::Def(_) | Stmt::Call(_) | Stmt::Return(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::display::print_program;
    use crate::syntax::parse_program;

    const SRC: &str = r#"
module m {
    var A: [int];
    fn f(n: int) @offload {
        var i: int;
        var j: int;
        for @order_independent (i := 0; i < n; i += 1) {
            writeln(i);
            for @order_independent (j := 0; j < n; j += 1) { A[j] = i; }
        }
    }
    fn g(n: int) {
        var i: int;
        for @order_independent (i := 0; i < n; i += 1) { A[i] = 0; }
    }
}
"#;

    #[test]
    fn test_every_loop_is_reported() {
        let mut p = parse_program("c.oir", SRC).expect("parses");
        let before = print_program(&p);
        let checks = check_program(&mut p, &OffloadOptions::default());
        let lines: Vec<String> = checks.iter().map(LoopCheck::summary).collect();
        assert_eq!(
            lines,
            vec![
                "c.oir:7: loop in 'f': 'writeln' may block or communicate",
                "c.oir:9: loop in 'f': offloadable",
                "c.oir:14: loop in 'g': offloadable (not requested)",
            ]
        );
        assert_eq!(print_program(&p), before);
    }

    #[test]
    fn test_shape_failures_are_reported() {
        let src = r#"
module m {
    var A: [int];
    fn f(n: int) @offload {
        var i: int;
        for @order_independent (i := 0; i < n; i += 1) {
            A[i] = 0;
            i += 1;
        }
    }
}
"#;
        let mut p = parse_program("c.oir", src).expect("parses");
        let checks = check_program(&mut p, &OffloadOptions::default());
        assert_eq!(
            checks[0].result,
            Err(Rejection::IndexWritten { name: "i".into() })
        );
    }
}
