//! Source-to-result entry points shared by the CLI, benches and tests.
//!
//! Every function parses one `.oir` source. Failures are returned as
//! diagnostics after being rendered to stderr against that source.

use crate::config::OffloadOptions;
use crate::diagnostic::{render_diagnostics, Diagnostic};
use crate::eval::{self, EvalConfig, Execution};
use crate::ir::display::print_program;
use crate::ir::Program;
use crate::manifest::KernelManifest;
use crate::outline::check::{check_program, LoopCheck};
use crate::outline::{outline_program, OffloadResult};
use crate::span::Span;
use crate::syntax::parse_program;

#[cfg(test)]
mod tests;

/// A program after the outlining pass.
#[derive(Clone, Debug)]
pub struct Outlined {
    pub program: Program,
    pub result: OffloadResult,
}

impl Outlined {
    /// The transformed program as `.oir` text.
    pub fn ir(&self) -> String {
        print_program(&self.program)
    }

    pub fn manifest(&self) -> KernelManifest {
        KernelManifest::build(&self.program, &self.result.registry)
    }
}

/// How `run_source` executes a program.
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub entry: String,
    /// Outline before running.
    pub outline: bool,
    pub eval: EvalConfig,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            entry: "main".to_string(),
            outline: false,
            eval: EvalConfig::default(),
        }
    }
}

/// Parse a source string, rendering any errors.
pub fn parse(source: &str, filename: &str) -> Result<Program, Vec<Diagnostic>> {
    parse_program(filename, source).map_err(|errors| {
        render_diagnostics(&errors, filename, source);
        errors
    })
}

/// Parse and run the outlining pass.
pub fn outline_source(
    source: &str,
    filename: &str,
    options: &OffloadOptions,
) -> Result<Outlined, Vec<Diagnostic>> {
    let mut program = parse(source, filename)?;
    match outline_program(&mut program, options) {
        Ok(result) => {
            render_diagnostics(&result.warnings, filename, source);
            Ok(Outlined { program, result })
        }
        Err(err) => {
            let errors = vec![Diagnostic::from(err)];
            render_diagnostics(&errors, filename, source);
            Err(errors)
        }
    }
}

/// Classify every order-independent loop without transforming.
pub fn check_source(
    source: &str,
    filename: &str,
    options: &OffloadOptions,
) -> Result<Vec<LoopCheck>, Vec<Diagnostic>> {
    let mut program = parse(source, filename)?;
    Ok(check_program(&mut program, options))
}

/// Execute a program with the reference interpreter.
pub fn run_source(
    source: &str,
    filename: &str,
    run: &RunOptions,
    options: &OffloadOptions,
) -> Result<Execution, Vec<Diagnostic>> {
    let program = if run.outline {
        outline_source(source, filename, options)?.program
    } else {
        parse(source, filename)?
    };
    eval::run(&program, &run.entry, run.eval.clone()).map_err(|err| {
        let errors = vec![Diagnostic::error(err.to_string(), Span::dummy())
            .with_note(format!("while running '{}'", run.entry))];
        render_diagnostics(&errors, filename, source);
        errors
    })
}
