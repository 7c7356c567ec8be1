use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(
    name = "gpuloop",
    version,
    about = "Outline order-independent loops into accelerator kernels"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the outlining pass and print the transformed IR
    Outline(cli::outline::OutlineArgs),
    /// Report, per loop, whether it can be offloaded
    Check(cli::check::CheckArgs),
    /// Execute a program with the reference interpreter
    Run(cli::run::RunArgs),
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Outline(args) => cli::outline::cmd_outline(args),
        Command::Check(args) => cli::check::cmd_check(args),
        Command::Run(args) => cli::run::cmd_run(args),
    }
}
