use std::path::PathBuf;
use std::process;

use clap::Args;

use super::{resolve_input, write_file};

#[derive(Args)]
pub struct OutlineArgs {
    /// Input .oir file
    pub input: PathBuf,
    /// Output .oir file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Print one line per considered loop
    #[arg(long)]
    pub report: bool,
    /// Treat the whole program as running on one execution unit
    #[arg(long)]
    pub single_unit: bool,
    /// Work-items per work-group for every launch
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub work_group_size: Option<u32>,
    /// Write the kernel manifest (JSON) to PATH
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,
    /// Do not clone functions called from kernels
    #[arg(long)]
    pub no_device_copies: bool,
}

pub fn cmd_outline(args: OutlineArgs) {
    let ri = resolve_input(&args.input);
    let mut options = ri.base_options();
    options.report |= args.report;
    options.single_unit |= args.single_unit;
    if let Some(n) = args.work_group_size {
        options.work_group_size = n;
    }
    if args.no_device_copies {
        options.device_copies = false;
    }

    let outlined = match gpuloop::outline_source(&ri.source, &ri.filename(), &options) {
        Ok(o) => o,
        Err(_) => process::exit(1),
    };

    match &args.output {
        Some(path) => {
            write_file(path, &outlined.ir());
            eprintln!(
                "Outlined {} loop(s) into {} kernel(s) → {}",
                outlined.result.report.outlined(),
                outlined.result.registry.len(),
                path.display()
            );
        }
        None => print!("{}", outlined.ir()),
    }

    if let Some(path) = &args.manifest {
        write_file(path, &outlined.manifest().to_json());
        eprintln!("Manifest: {}", path.display());
    }
}
