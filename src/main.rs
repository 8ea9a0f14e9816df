mod cli;
mod commands;
mod document;
mod highlight;
mod layout;
mod matcher;
mod model;
mod resolver;
mod util;
mod variants;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve(args) => commands::resolve::run(args),
        Commands::Render(args) => commands::render::run(args),
        Commands::Variants(args) => commands::inspect::run_variants(args),
        Commands::Layout(args) => commands::inspect::run_layout(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
