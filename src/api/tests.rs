use super::*;

const SRC: &str = r#"
module demo {
    var A: [int] = array_alloc(4, 0);

    fn fill(n: int) @offload {
        var i: int;
        for @order_independent (i := 0; i < n; i += 1) {
            A[i] = i * i;
        }
    }

    fn main() {
        fill(4);
        writeln(A[0], ",", A[1], ",", A[2], ",", A[3]);
    }
}
"#;

#[test]
fn test_outline_source() {
    let out = outline_source(SRC, "api.oir", &OffloadOptions::default()).expect("outlines");
    assert_eq!(out.result.registry.len(), 1);
    assert!(out.ir().contains("fn gpu_kernel0("));
    assert_eq!(out.manifest().kernels.len(), 1);
}

#[test]
fn test_parse_errors_are_returned() {
    let errors = outline_source("module m { fn f( }", "bad.oir", &OffloadOptions::default()).unwrap_err();
    assert!(!errors.is_empty());
    assert!(errors
        .iter()
        .all(|d| d.severity == crate::diagnostic::Severity::Error));
}

#[test]
fn test_check_source() {
    let checks = check_source(SRC, "api.oir", &OffloadOptions::default()).expect("checks");
    assert_eq!(checks.len(), 1);
    assert!(checks[0].result.is_ok());
    assert!(checks[0].requested);
}

#[test]
fn test_run_source_with_and_without_outlining() {
    let plain = run_source(SRC, "api.oir", &RunOptions::default(), &OffloadOptions::default())
        .expect("runs");
    assert_eq!(plain.output, vec!["0,1,4,9"]);

    let outlined = RunOptions {
        outline: true,
        eval: EvalConfig {
            accelerator: true,
            reverse_work_items: true,
            ..EvalConfig::default()
        },
        ..RunOptions::default()
    };
    let gpu = run_source(SRC, "api.oir", &outlined, &OffloadOptions::default()).expect("runs");
    assert_eq!(gpu.output, plain.output);
    assert_eq!(gpu.launches, 1);
}

#[test]
fn test_runtime_errors_become_diagnostics() {
    let run = RunOptions {
        entry: "nope".to_string(),
        ..RunOptions::default()
    };
    let errors = run_source(SRC, "api.oir", &run, &OffloadOptions::default()).unwrap_err();
    assert_eq!(errors[0].message, "no function named 'nope'");
    assert_eq!(errors[0].notes, vec!["while running 'nope'".to_string()]);
}
