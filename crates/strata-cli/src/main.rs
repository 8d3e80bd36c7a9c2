//! Strata CLI - run and inspect dataflow pipelines.

mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about = "Strata dataflow engine CLI", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, set up and run a pipeline file
    Run(commands::run::RunArgs),

    /// Check a pipeline file without running it
    Validate(commands::validate::ValidateArgs),

    /// List available component types and their parameters
    Components(commands::components::ComponentsArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args).map(commands::status_exit_code),
        Commands::Validate(args) => commands::validate::run(args).map(|()| ExitCode::SUCCESS),
        Commands::Components(args) => commands::components::run(args).map(|()| ExitCode::SUCCESS),
    };

    result.unwrap_or_else(|err| {
        eprintln!("Error: {err:#}");
        commands::error_exit_code(&err)
    })
}
