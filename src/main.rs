use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod check;
mod cli;
mod docs;
mod downloads;
mod index;
mod package;
mod probe;
mod validate;
mod workflow;

use cli::{Command, RootArgs};

fn main() -> Result<ExitCode> {
    let args = RootArgs::parse();
    init_tracing(args.command.verbose());

    match &args.command {
        Command::Validate(args) => workflow::run_validate(args),
        Command::BuildIndex(args) => workflow::run_build_index(args),
        Command::CheckDownloads(args) => workflow::run_check_downloads(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "warn,pkgidx=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}
