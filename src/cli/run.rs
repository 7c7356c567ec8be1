use std::path::PathBuf;
use std::process;

use clap::Args;

use gpuloop::eval::EvalConfig;
use gpuloop::RunOptions;

use super::resolve_input;

#[derive(Args)]
pub struct RunArgs {
    /// Input .oir file
    pub input: PathBuf,
    /// Function to call after module initialization
    #[arg(long)]
    pub entry: Option<String>,
    /// Run the outlining pass first
    #[arg(long)]
    pub outline: bool,
    /// Make is_gpu_sublocale() return true
    #[arg(long)]
    pub accelerator: bool,
    /// Execute work-items from last to first
    #[arg(long)]
    pub reverse: bool,
    /// Abort after this many statements
    #[arg(long, value_name = "N")]
    pub step_limit: Option<u64>,
    /// Abort when calls nest deeper than this
    #[arg(long, value_name = "N")]
    pub max_call_depth: Option<usize>,
}

pub fn cmd_run(args: RunArgs) {
    let ri = resolve_input(&args.input);
    let options = ri.base_options();
    let entry = args
        .entry
        .clone()
        .or_else(|| ri.config.as_ref().and_then(|c| c.entry.clone()))
        .unwrap_or_else(|| "main".to_string());

    let mut eval = EvalConfig {
        accelerator: args.accelerator,
        reverse_work_items: args.reverse,
        ..EvalConfig::default()
    };
    if let Some(n) = args.step_limit {
        eval.step_limit = n;
    }
    if let Some(n) = args.max_call_depth {
        eval.max_call_depth = n;
    }
    let run = RunOptions {
        entry,
        outline: args.outline,
        eval,
    };

    match gpuloop::run_source(&ri.source, &ri.filename(), &run, &options) {
        Ok(exec) => {
            for line in &exec.output {
                println!("{}", line);
            }
            eprintln!(
                "Executed {} step(s), {} kernel launch(es)",
                exec.steps, exec.launches
            );
        }
        Err(_) => process::exit(1),
    }
}
