//! End-to-end cost of the outlining pipeline.
//!
//! Measures, on synthetic modules with a growing number of offloadable
//! functions:
//! 1. Parsing `.oir` text into a `Program`
//! 2. The outlining pass (fitness, kernels, bundling, device copies)
//! 3. Executing the outlined program with kernels launched

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use gpuloop::config::OffloadOptions;
use gpuloop::eval::{self, EvalConfig};
use gpuloop::outline::outline_program;
use gpuloop::syntax::parse_program;

/// A module with `n` offloaded loops, each calling a helper so that device
/// copies are exercised too.
fn synthetic_module(n: usize) -> String {
    let mut src = String::from("module bench {\n    var A: [int] = array_alloc(64, 1);\n");
    src.push_str("    fn twice(x: int): int { return x + x; }\n");
    for k in 0..n {
        src.push_str(&format!(
            "    fn f{k}(n: int) @offload {{\n        var i: int;\n        for @order_independent (i := 0; i < n; i += 1) {{\n            A[i] = twice(A[i]) + {k};\n        }}\n    }}\n"
        ));
    }
    src.push_str("    fn main() {\n");
    for k in 0..n {
        src.push_str(&format!("        f{k}(64);\n"));
    }
    src.push_str("        writeln(A[63]);\n    }\n}\n");
    src
}

fn bench_parse(c: &mut Criterion) {
    let small = synthetic_module(10);
    let large = synthetic_module(100);

    let mut group = c.benchmark_group("parse");
    group.bench_function("10_fns", |b| {
        b.iter(|| parse_program("bench.oir", black_box(&small)))
    });
    group.bench_function("100_fns", |b| {
        b.iter(|| parse_program("bench.oir", black_box(&large)))
    });
    group.finish();
}

fn bench_outline(c: &mut Criterion) {
    let options = OffloadOptions::default();
    let mut group = c.benchmark_group("outline");
    for n in [10usize, 100] {
        let src = synthetic_module(n);
        let program = match parse_program("bench.oir", &src) {
            Ok(p) => p,
            Err(_) => panic!("synthetic module must parse"),
        };
        group.bench_function(format!("{}_loops", n), |b| {
            b.iter(|| {
                let mut p = program.clone();
                outline_program(black_box(&mut p), &options)
            })
        });
    }
    group.finish();
}

fn bench_run(c: &mut Criterion) {
    let src = synthetic_module(10);
    let mut program = match parse_program("bench.oir", &src) {
        Ok(p) => p,
        Err(_) => panic!("synthetic module must parse"),
    };
    let original = program.clone();
    if outline_program(&mut program, &OffloadOptions::default()).is_err() {
        panic!("synthetic module must outline");
    }
    let gpu = EvalConfig {
        accelerator: true,
        ..EvalConfig::default()
    };

    let mut group = c.benchmark_group("run");
    group.bench_function("original", |b| {
        b.iter(|| eval::run(black_box(&original), "main", EvalConfig::default()))
    });
    group.bench_function("outlined_cpu", |b| {
        b.iter(|| eval::run(black_box(&program), "main", EvalConfig::default()))
    });
    group.bench_function("outlined_gpu", |b| {
        b.iter(|| eval::run(black_box(&program), "main", gpu.clone()))
    });
    group.finish();
}

criterion_group!(benches, bench_parse, bench_outline, bench_run);
criterion_main!(benches);
