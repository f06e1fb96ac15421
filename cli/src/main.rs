
mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{inspect, run};
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` wins over the -v counter.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "catchment=info",
        1 => "catchment=debug",
        _ => "catchment=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_logging(cli.verbose);
    match &cli.command {
        Commands::Run(args) => run::run(&cli, args),
        Commands::Inspect(args) => inspect::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }
