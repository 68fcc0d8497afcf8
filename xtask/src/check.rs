use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{cargo, OnFailure};

/// The engine has to build in both logging configurations: defmt on the SoC
/// and tracing on the host.
pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking ASRC builds...".cyan().bold());
    println!();

    let total_start = Instant::now();

    cargo(
        "Checking engine for the SoC (thumbv7em, defmt)",
        &[
            "check",
            "-p",
            "asrc",
            "--target",
            "thumbv7em-none-eabihf",
            "--features",
            "defmt",
        ],
        OnFailure::Abort,
    )?;
    cargo(
        "Checking platform crate (no_std)",
        &[
            "check",
            "-p",
            "platform",
            "--target",
            "thumbv7em-none-eabihf",
            "--no-default-features",
        ],
        OnFailure::Abort,
    )?;
    cargo(
        "Checking engine for the host (tracing)",
        &["check", "-p", "asrc", "--features", "tracing,std"],
        OnFailure::Abort,
    )?;
    cargo(
        "Running clippy lints",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        OnFailure::Warn,
    )?;
    let fmt = cargo(
        "Checking code formatting",
        &["fmt", "--all", "--check"],
        OnFailure::Warn,
    )?;
    if !fmt.status.success() {
        eprintln!("     Run 'cargo fmt --all' to fix");
    }

    println!(
        "{}",
        format!(
            "✓ All checks completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}
