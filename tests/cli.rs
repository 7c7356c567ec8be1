use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const SAXPY: &str = include_str!("data/saxpy.oir");

fn gpuloop(args: &[&str], dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gpuloop"))
        .args(args)
        .current_dir(dir)
        .output()
        .expect("spawn gpuloop")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn setup() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("saxpy.oir"), SAXPY).unwrap();
    dir
}

#[test]
fn test_outline_writes_ir_and_manifest() {
    let dir = setup();
    let out = gpuloop(
        &["outline", "saxpy.oir", "-o", "out.oir", "--manifest", "kernels.json", "--report"],
        dir.path(),
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let text = stdout(&out);
    assert!(text.contains("Replacing loop with CPU and GPU paths at saxpy.oir:11"), "{}", text);
    assert!(text.contains("Failed to generate GPU kernel for loop at saxpy.oir:25"), "{}", text);

    let ir = fs::read_to_string(dir.path().join("out.oir")).unwrap();
    assert!(ir.contains("fn gpu_kernel0("));
    assert!(ir.contains("fn gpu_kernel1("));
    let manifest = fs::read_to_string(dir.path().join("kernels.json")).unwrap();
    assert!(manifest.contains("\"name\": \"gpu_kernel1\""));
}

#[test]
fn test_config_file_enables_report() {
    let dir = setup();
    fs::write(dir.path().join("gpuloop.toml"), "[offload]\nreport = true\n").unwrap();
    let out = gpuloop(&["outline", "saxpy.oir"], dir.path());
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.starts_with("Replacing loop"), "{}", text);
    assert!(text.contains("module saxpy {"));
}

#[test]
fn test_bad_config_fails() {
    let dir = setup();
    fs::write(dir.path().join("gpuloop.toml"), "[offload]\nreport = maybe\n").unwrap();
    let out = gpuloop(&["outline", "saxpy.oir"], dir.path());
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("error:"));
}

#[test]
fn test_check_lists_loops() {
    let dir = setup();
    let out = gpuloop(&["check", "saxpy.oir"], dir.path());
    assert!(out.status.success());
    let lines: Vec<String> = stdout(&out).lines().map(str::to_string).collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "saxpy.oir:11: loop in 'axpy': offloadable");
    assert!(lines[2].ends_with("'writeln' may block or communicate"));
}

#[test]
fn test_run_paths_agree() {
    let dir = setup();
    let plain = gpuloop(&["run", "saxpy.oir"], dir.path());
    assert!(plain.status.success());
    let gpu = gpuloop(
        &["run", "saxpy.oir", "--outline", "--accelerator", "--reverse"],
        dir.path(),
    );
    assert!(gpu.status.success());
    assert_eq!(stdout(&plain), stdout(&gpu));
    assert!(stdout(&plain).starts_with("1.0 8.5 1.0 8.0\n"));
    assert!(String::from_utf8_lossy(&gpu.stderr).contains("2 kernel launch(es)"));
}

#[test]
fn test_input_errors() {
    let dir = setup();
    fs::write(dir.path().join("broken.oir"), "module m { fn f( }").unwrap();
    assert!(!gpuloop(&["outline", "broken.oir"], dir.path()).status.success());
    assert!(!gpuloop(&["outline", "missing.oir"], dir.path()).status.success());
    assert!(!gpuloop(&["check", "saxpy.txt"], dir.path()).status.success());
    assert!(!gpuloop(&["run", "saxpy.oir", "--entry", "nope"], dir.path()).status.success());
}
