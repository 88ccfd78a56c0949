//! Command entrypoints: each runs one pipeline and decides the exit code.
use crate::check::run_checks;
use crate::cli::{BuildIndexArgs, CheckDownloadsArgs, ValidateArgs};
use crate::downloads::collect_downloads;
use crate::index::{build_index, BuildOptions};
use crate::probe::{ProbeConfig, SourceProbers};
use crate::validate::scan_packages;
use anyhow::{Context, Result};
use std::process::ExitCode;
use std::time::Duration;

/// Exit status for runs that found invalid package documents.
pub const INVALID_PACKAGES_EXIT: u8 = 2;

/// Exit status for download checks with unreachable artifacts.
pub const UNREACHABLE_EXIT: u8 = 1;

pub fn run_validate(args: &ValidateArgs) -> Result<ExitCode> {
    let scan = scan_packages(&args.packages_dir)?;
    if scan.has_errors() {
        print_errors(&scan.errors);
        println!(
            "[FAIL] {} of {} package file(s) invalid.",
            scan.skipped_files, scan.total_files
        );
        return Ok(ExitCode::from(INVALID_PACKAGES_EXIT));
    }
    println!("[OK] {} package file(s) valid.", scan.valid.len());
    Ok(ExitCode::SUCCESS)
}

/// Build the index. The file is written even when documents were skipped;
/// `--strict` only changes the exit status.
pub fn run_build_index(args: &BuildIndexArgs) -> Result<ExitCode> {
    let options = BuildOptions {
        packages_dir: args.packages_dir.clone(),
        owner: args.owner.clone(),
        repo: args.repo.clone(),
        prefix: args.prefix.clone(),
        out: args.out.clone(),
    };
    let outcome = build_index(&options)?;
    if !outcome.errors.is_empty() {
        print_errors(&outcome.errors);
    }
    println!(
        "[OK] Wrote index to {} with {} package(s).",
        outcome.out.display(),
        outcome.entry_count()
    );
    if outcome.errors.is_empty() {
        return Ok(ExitCode::SUCCESS);
    }
    if args.strict {
        println!(
            "[FAIL] Skipped {} invalid file(s); failing because --strict is set.",
            outcome.skipped_files
        );
        return Ok(ExitCode::from(INVALID_PACKAGES_EXIT));
    }
    println!(
        "[WARN] Skipped {} invalid file(s); index contains only valid entries.",
        outcome.skipped_files
    );
    Ok(ExitCode::SUCCESS)
}

pub fn run_check_downloads(args: &CheckDownloadsArgs) -> Result<ExitCode> {
    let downloads = collect_downloads(&args.packages_dir).with_context(|| {
        format!(
            "enumerate downloads under {}",
            args.packages_dir.display()
        )
    })?;
    let config = ProbeConfig::with_timeout(Duration::from_secs(args.timeout_secs));
    let probers = SourceProbers::new(&config);
    let report = run_checks(downloads, &probers);
    if args.json {
        let text = serde_json::to_string_pretty(&report).context("serialize check report")?;
        println!("{text}");
    } else {
        print!("{}", report.render_text());
    }
    if report.all_reachable() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(UNREACHABLE_EXIT))
    }
}

fn print_errors(errors: &[String]) {
    println!("[ERROR] Validation failed for one or more package files:\n");
    for err in errors {
        println!(" - {err}");
    }
}
