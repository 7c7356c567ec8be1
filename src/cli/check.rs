use std::path::PathBuf;
use std::process;

use clap::Args;

use super::resolve_input;

#[derive(Args)]
pub struct CheckArgs {
    /// Input .oir file
    pub input: PathBuf,
    /// Treat the whole program as running on one execution unit
    #[arg(long)]
    pub single_unit: bool,
}

pub fn cmd_check(args: CheckArgs) {
    let ri = resolve_input(&args.input);
    let mut options = ri.base_options();
    options.single_unit |= args.single_unit;

    let checks = match gpuloop::check_source(&ri.source, &ri.filename(), &options) {
        Ok(c) => c,
        Err(_) => process::exit(1),
    };
    for check in &checks {
        println!("{}", check.summary());
    }
    let fit = checks.iter().filter(|c| c.result.is_ok()).count();
    eprintln!(
        "OK: {} ({} of {} loop(s) offloadable)",
        args.input.display(),
        fit,
        checks.len()
    );
}
