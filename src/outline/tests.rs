use super::*;
use crate::ir::display::{print_function, print_program};
use crate::ir::walk::symbol_uses;
use crate::ir::Scope;
use crate::syntax::parse_program;

fn run(src: &str, options: &OffloadOptions) -> (Program, OffloadResult) {
    let mut p = parse_program("pass.oir", src).expect("parses");
    let result = outline_program(&mut p, options).expect("pass succeeds");
    (p, result)
}

const SAXPY: &str = r#"
module demo {
    var A: [real];
    var B: [real];

    fn saxpy(a: real, n: int) @offload {
        var i: int;
        for @order_independent (i := 0; i < n; i += 1) {
            A[i] = a * B[i] + A[i];
        }
    }

    fn untouched(n: int) {
        var i: int;
        for @order_independent (i := 0; i < n; i += 1) {
            A[i] = 0.0;
        }
    }
}
"#;

#[test]
fn test_saxpy_end_to_end_shape() {
    let (p, result) = run(SAXPY, &OffloadOptions::default());
    assert_eq!(result.registry.len(), 1);
    assert_eq!(result.report.outlined(), 1);
    assert_eq!(result.report.loops.len(), 1, "only the requested function is considered");
    let outcome = &result.report.loops[0];
    assert_eq!(outcome.function, "saxpy");
    assert_eq!(outcome.line, 8);
    assert_eq!(
        outcome.report_line(),
        "Replacing loop with CPU and GPU paths at pass.oir:8"
    );

    let saxpy = p.function_by_name("saxpy").expect("saxpy");
    let text = print_function(&p, saxpy);
    assert!(text.contains("_is_gpu := is_gpu_sublocale();"), "{}", text);
    assert!(text.contains("} else {"), "{}", text);
    assert!(text.contains("for @order_independent ("), "{}", text);

    let kernel = result.registry.fn_ids()[0];
    assert_eq!(p.func(kernel).parent, Scope::Module(crate::ir::ModId(0)));
    assert!(p.func(saxpy).nested.is_empty());
    // Closed after bundling.
    assert!(symbol_uses(&p.func(kernel).body)
        .into_iter()
        .all(|s| p.sym(s).scope == Scope::Function(kernel)));
}

#[test]
fn test_output_parses_back() {
    let (p, _) = run(SAXPY, &OffloadOptions::default());
    let text = print_program(&p);
    let reparsed = parse_program("again.oir", &text);
    assert!(reparsed.is_ok(), "{}\n{:?}", text, reparsed.err());
}

#[test]
fn test_unfit_loop_is_left_alone() {
    let src = r#"
module m {
    var A: [int];
    fn f(n: int) @offload {
        var i: int;
        for @order_independent (i := 0; i < n; i += 1) {
            writeln(i);
        }
    }
}
"#;
    let before = parse_program("pass.oir", src).expect("parses");
    let f = before.function_by_name("f").expect("f");
    let (p, result) = run(src, &OffloadOptions::default());
    assert!(result.registry.is_empty());
    assert_eq!(p.func(f).body, before.func(f).body);
    assert_eq!(
        result.report.lines(),
        vec!["Failed to generate GPU kernel for loop at pass.oir:6: 'writeln' may block or communicate"]
    );
}

#[test]
fn test_inner_loop_is_offloaded_when_outer_is_not() {
    let src = r#"
module m {
    var A: [int];
    fn f(n: int) @offload {
        var i: int;
        var j: int;
        for @order_independent (i := 0; i < n; i += 1) {
            writeln(i);
            for @order_independent (j := 0; j < n; j += 1) {
                A[j] = i;
            }
        }
    }
}
"#;
    let (p, result) = run(src, &OffloadOptions::default());
    assert_eq!(result.report.loops.len(), 2);
    assert!(!result.report.loops[0].is_outlined());
    assert!(result.report.loops[1].is_outlined());
    let f = p.function_by_name("f").expect("f");
    let Stmt::Loop(outer) = &p.func(f).body.stmts[2] else {
        panic!("outer loop stays a loop");
    };
    assert!(matches!(outer.body.stmts[1], Stmt::Block(_)));
}

#[test]
fn test_outlined_loop_is_not_searched_again() {
    let src = r#"
module m {
    var A: [int];
    fn f(n: int) @offload {
        var i: int;
        for @order_independent (i := 0; i < n; i += 1) {
            var j: int;
            for @order_independent (j := 0; j < n; j += 1) {
                A[j] = i;
            }
        }
    }
}
"#;
    let (_, result) = run(src, &OffloadOptions::default());
    assert_eq!(result.report.loops.len(), 1);
    assert_eq!(result.registry.len(), 1);
}

const WIDE: &str = r#"
module m {
    var W: wide [int];
    fn f(n: int) @offload {
        var i: int;
        for @order_independent (i := 0; i < n; i += 1) {
            W[i] = 0;
        }
    }
    fn g(n: int) @offload {
        var i: int;
        local {
            for @order_independent (i := 0; i < n; i += 1) {
                W[i] = 0;
            }
        }
    }
}
"#;

#[test]
fn test_remote_access_needs_locality() {
    let (_, result) = run(WIDE, &OffloadOptions::default());
    let by_fn: Vec<(&str, bool)> = result
        .report
        .loops
        .iter()
        .map(|o| (o.function.as_str(), o.is_outlined()))
        .collect();
    assert_eq!(by_fn, vec![("f", false), ("g", true)]);

    let single = OffloadOptions {
        single_unit: true,
        ..OffloadOptions::default()
    };
    let (_, result) = run(WIDE, &single);
    assert_eq!(result.report.outlined(), 2);
}

#[test]
fn test_recursive_callee_is_rejected() {
    let src = r#"
module m {
    var A: [int];
    fn fact(k: int): int {
        if k <= 1 { return 1; }
        return k * fact(k - 1);
    }
    fn f(n: int) @offload {
        var i: int;
        for @order_independent (i := 0; i < n; i += 1) {
            A[i] = fact(i);
        }
    }
}
"#;
    let (p, result) = run(src, &OffloadOptions::default());
    assert!(result.registry.is_empty());
    let reason = result.report.loops[0].result.clone().unwrap_err();
    assert_eq!(reason.to_string(), "'fact' may block or communicate");
    assert!(!p.func(p.function_by_name("fact").expect("fact")).flags.fit_for_offload);
}

#[test]
fn test_request_reaches_callees_and_ids_are_dense() {
    let src = r#"
module m {
    var A: [int];
    fn leaf(n: int) {
        var i: int;
        for @order_independent (i := 0; i < n; i += 1) { A[i] = 1; }
        kernel(n, 16) { A[get_global_id()] = 2; }
    }
    fn top(n: int) @offload {
        var i: int;
        leaf(n);
        for @order_independent (i := 0; i < n; i += 1) { A[i] = 3; }
    }
}
"#;
    let (p, result) = run(src, &OffloadOptions::default());
    let ids: Vec<u32> = result.registry.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    assert!(result.warnings.is_empty());
    // Explicit blocks are outlined before any loop.
    assert_eq!(
        result.registry.iter().next().expect("kernel 0").origin,
        registry::KernelOrigin::Block
    );
    let names: Vec<&str> = result
        .registry
        .iter()
        .map(|e| p.func(e.func).name.as_str())
        .collect();
    assert_eq!(names, vec!["gpu_kernel0", "gpu_kernel1", "gpu_kernel2"]);
}

#[test]
fn test_device_copies_follow_options() {
    let src = r#"
module m {
    var A: [int];
    fn sq(x: int): int { return x * x; }
    fn f(n: int) @offload {
        var i: int;
        for @order_independent (i := 0; i < n; i += 1) { A[i] = sq(i); }
    }
}
"#;
    let (p, _) = run(src, &OffloadOptions::default());
    assert!(p.function_by_name("sq_device").is_some());

    let no_copies = OffloadOptions {
        device_copies: false,
        ..OffloadOptions::default()
    };
    let (p, _) = run(src, &no_copies);
    assert!(p.function_by_name("sq_device").is_none());
}

#[test]
fn test_loops_without_the_attribute_are_ignored() {
    let src = r#"
module m {
    var A: [int];
    fn f(n: int) @offload {
        var i: int;
        for (i := 0; i < n; i += 1) { A[i] = 1; }
    }
}
"#;
    let (_, result) = run(src, &OffloadOptions::default());
    assert!(result.report.loops.is_empty());
}
