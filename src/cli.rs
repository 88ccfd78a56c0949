//! CLI argument parsing for the package index tooling.
//!
//! The CLI stays thin: each command maps onto one pipeline (validate, build,
//! check) and carries only the inputs that pipeline needs.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default root holding one JSON document per package.
pub const DEFAULT_PACKAGES_DIR: &str = "packages";

/// Default location of the generated index.
pub const DEFAULT_INDEX_OUT: &str = "dist/index.json";

/// Default logical prefix recorded in index metadata.
pub const DEFAULT_PREFIX: &str = "maven";

/// Default per-request timeout for reachability probes.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 15;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "pkgidx",
    version,
    about = "Validate package descriptors, build the artifact index, and check downloads",
    after_help = "Commands:\n  validate --packages-dir <dir>                          Validate package documents only\n  build-index --owner <org> --repo <repo>                Validate and write dist/index.json\n  check-downloads --packages-dir <dir>                   Probe every declared download\n\nExamples:\n  pkgidx validate --packages-dir packages\n  pkgidx build-index --owner acme --repo artifacts --strict\n  pkgidx check-downloads --packages-dir packages --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Validate(ValidateArgs),
    BuildIndex(BuildIndexArgs),
    CheckDownloads(CheckDownloadsArgs),
}

impl Command {
    pub fn verbose(&self) -> bool {
        match self {
            Command::Validate(args) => args.verbose,
            Command::BuildIndex(args) => args.verbose,
            Command::CheckDownloads(args) => args.verbose,
        }
    }
}

/// Validate command inputs.
#[derive(Parser, Debug)]
#[command(about = "Validate package documents without writing an index")]
pub struct ValidateArgs {
    /// Root directory containing per-package JSON files
    #[arg(long, value_name = "DIR", default_value = DEFAULT_PACKAGES_DIR)]
    pub packages_dir: PathBuf,

    /// Emit debug logging
    #[arg(long)]
    pub verbose: bool,
}

/// Build command inputs for the aggregated index.
#[derive(Parser, Debug)]
#[command(about = "Build the artifacts index with schema validation")]
pub struct BuildIndexArgs {
    /// Root directory containing per-package JSON files
    #[arg(long, value_name = "DIR", default_value = DEFAULT_PACKAGES_DIR)]
    pub packages_dir: PathBuf,

    /// Output index.json path
    #[arg(long, value_name = "PATH", default_value = DEFAULT_INDEX_OUT)]
    pub out: PathBuf,

    /// GitHub org/user for the GHCR base (e.g. acme)
    #[arg(long)]
    pub owner: String,

    /// GitHub repo for the GHCR base (e.g. artifacts)
    #[arg(long)]
    pub repo: String,

    /// Logical prefix stored in index metadata
    #[arg(long, default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    /// Exit with status 2 if any package file is invalid
    #[arg(long)]
    pub strict: bool,

    /// Emit debug logging
    #[arg(long)]
    pub verbose: bool,
}

/// Download check inputs.
#[derive(Parser, Debug)]
#[command(about = "Check that every declared package download is reachable")]
pub struct CheckDownloadsArgs {
    /// Root directory containing per-package JSON files
    #[arg(long, value_name = "DIR", default_value = DEFAULT_PACKAGES_DIR)]
    pub packages_dir: PathBuf,

    /// Timeout applied to each probe request
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = DEFAULT_PROBE_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    /// Emit a machine-readable JSON report
    #[arg(long)]
    pub json: bool,

    /// Emit debug logging
    #[arg(long)]
    pub verbose: bool,
}
