use gpuloop::config::OffloadOptions;
use gpuloop::eval::{self, EvalConfig};
use gpuloop::ir::walk::symbol_uses;
use gpuloop::ir::Scope;
use gpuloop::{outline_source, parse, run_source, RunOptions};

const SAXPY: &str = include_str!("data/saxpy.oir");

const EXPECTED: [&str; 6] = [
    "1.0 8.5 1.0 8.0",
    "adding 0",
    "adding 1",
    "adding 2",
    "adding 3",
    "total 7.0",
];

fn configs() -> Vec<EvalConfig> {
    vec![
        EvalConfig::default(),
        EvalConfig {
            accelerator: true,
            ..EvalConfig::default()
        },
        EvalConfig {
            accelerator: true,
            reverse_work_items: true,
            ..EvalConfig::default()
        },
    ]
}

#[test]
fn test_fixture_report() {
    let out = outline_source(SAXPY, "saxpy.oir", &OffloadOptions::default()).expect("outlines");
    assert_eq!(
        out.result.report.lines(),
        vec![
            "Replacing loop with CPU and GPU paths at saxpy.oir:11",
            "Replacing loop with CPU and GPU paths at saxpy.oir:17",
            "Failed to generate GPU kernel for loop at saxpy.oir:25: 'writeln' may block or communicate",
        ]
    );
    let ids: Vec<u32> = out.result.registry.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![0, 1]);
}

#[test]
fn test_every_path_computes_the_same_output() {
    let original = parse(SAXPY, "saxpy.oir").expect("parses");
    let baseline = eval::run(&original, "main", EvalConfig::default()).expect("runs");
    assert_eq!(baseline.output, EXPECTED);

    let out = outline_source(SAXPY, "saxpy.oir", &OffloadOptions::default()).expect("outlines");
    for config in configs() {
        let launched = config.accelerator;
        let exec = eval::run(&out.program, "main", config).expect("runs");
        assert_eq!(exec.output, EXPECTED);
        assert_eq!(exec.launches, if launched { 2 } else { 0 });
    }
}

#[test]
fn test_kernels_are_closed() {
    let out = outline_source(SAXPY, "saxpy.oir", &OffloadOptions::default()).expect("outlines");
    for entry in out.result.registry.iter() {
        let kernel = out.program.func(entry.func);
        assert!(kernel.flags.offload_target);
        for s in symbol_uses(&kernel.body) {
            assert_eq!(
                out.program.sym(s).scope,
                Scope::Function(entry.func),
                "'{}' leaks into {}",
                out.program.sym(s).name,
                kernel.name
            );
        }
    }
}

#[test]
fn test_printed_output_runs_the_same() {
    let out = outline_source(SAXPY, "saxpy.oir", &OffloadOptions::default()).expect("outlines");
    let text = out.ir();
    let reparsed = parse(&text, "outlined.oir").expect("printed IR parses");
    let exec = eval::run(
        &reparsed,
        "main",
        EvalConfig {
            accelerator: true,
            ..EvalConfig::default()
        },
    )
    .expect("runs");
    assert_eq!(exec.output, EXPECTED);
}

#[test]
fn test_trip_counts_match_iteration() {
    // (start, bound, step, cmp) pairs from the documented examples plus
    // empty and descending ranges.
    let cases = [
        ("0", "10", "2", "<", "+="),
        ("0", "10", "3", "<=", "+="),
        ("5", "5", "1", "<", "+="),
        ("7", "0", "1", "<", "+="),
        ("10", "1", "4", ">", "-="),
        ("10", "1", "4", ">=", "-="),
    ];
    for (start, bound, step, cmp, incr) in cases {
        let src = format!(
            r#"
module m {{
    var A: [int] = array_alloc(16, 0);
    fn f() @offload {{
        var i: int;
        var hits: int = 0;
        for @order_independent (i := {start}; i {cmp} {bound}; i {incr} {step}) {{
            A[i] = A[i] + 1;
        }}
        var k: int;
        for (k := 0; k < 16; k += 1) {{ hits += A[k]; }}
        writeln(i, " ", hits);
    }}
}}
"#
        );
        let before = run_source(
            &src,
            "trip.oir",
            &RunOptions {
                entry: "f".into(),
                ..RunOptions::default()
            },
            &OffloadOptions::default(),
        )
        .expect("runs");
        let after = run_source(
            &src,
            "trip.oir",
            &RunOptions {
                entry: "f".into(),
                outline: true,
                eval: EvalConfig {
                    accelerator: true,
                    reverse_work_items: true,
                    ..EvalConfig::default()
                },
            },
            &OffloadOptions::default(),
        )
        .expect("runs outlined");
        assert_eq!(before.output, after.output, "{} {} {} {}", start, cmp, bound, step);
        assert_eq!(after.launches, 1);
    }
}
