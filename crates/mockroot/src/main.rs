//! The `mockroot` command-line tool.

mod cli;
mod commands;
mod tracing;

use crate::cli::{Cli, Commands};
use crate::tracing::TracingConfig;
use clap::Parser;

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = Cli::parse();
    let code = match run_main(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{error:?}");
            1
        }
    };
    std::process::exit(code);
}

/// Initialise tracing and dispatch; returns the process exit code.
#[allow(clippy::print_stdout)]
async fn run_main(cli: Cli) -> miette::Result<i32> {
    crate::tracing::init_tracing(TracingConfig {
        format: cli.tracing_format(),
        level: cli.level.into(),
        ..Default::default()
    })?;

    match cli.command {
        Commands::Version => {
            println!("{}", commands::version::get_version_info());
            Ok(0)
        }
        Commands::Run(args) => commands::run::execute(args).await,
    }
}
