//! Workspace chores for Courier: `cargo xtask <task>`
//!
//! Output goes straight to the terminal; this binary never initialises
//! tracing.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::env;
use std::process::{Command, ExitCode};

use anyhow::{bail, Context};

mod features;

type Task = fn() -> anyhow::Result<()>;

/// Name, one-line summary, entry point
const TASKS: &[(&str, &str, Task)] = &[
    ("ci", "everything a pull request must pass, in order", run_ci),
    ("fmt", "rustfmt in check mode", run_fmt),
    ("clippy", "clippy on every target with warnings denied", run_clippy),
    ("test-features", "build courier-common/courier-core per feature tier", features::test_feature_matrix),
    ("test", "unit, integration and doc tests for the workspace", run_test),
    ("deny", "licence and advisory policy via cargo-deny", run_deny),
    ("audit", "RustSec advisories via cargo-audit", run_audit),
];

/// Steps of `ci`, skipping `ci` itself
const CI_STEPS: &[&str] = &["fmt", "clippy", "test-features", "test", "deny", "audit"];

fn main() -> ExitCode {
    let requested = env::args().nth(1);
    let outcome = match requested.as_deref() {
        None | Some("help" | "-h" | "--help") => {
            print_usage();
            Ok(())
        }
        Some(name) => match lookup(name) {
            Some(task) => task(),
            None => {
                eprintln!("xtask: no task named `{name}`\n");
                print_usage();
                Err(anyhow::anyhow!("unknown task `{name}`"))
            }
        },
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("xtask: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn lookup(name: &str) -> Option<Task> {
    TASKS.iter().find(|(task, _, _)| *task == name).map(|(_, _, run)| *run)
}

fn print_usage() {
    println!("cargo xtask <task>\n");
    for (name, summary, _) in TASKS {
        println!("  {name:<14} {summary}");
    }
    println!("  {:<14} show this list", "help");
}

fn run_ci() -> anyhow::Result<()> {
    let total = CI_STEPS.len();
    for (index, name) in CI_STEPS.iter().enumerate() {
        println!("[ci {}/{total}] {name}", index + 1);
        let task = lookup(name).with_context(|| format!("ci step `{name}` is not a task"))?;
        task().with_context(|| format!("ci step `{name}`"))?;
    }
    println!("[ci] all {total} steps green");
    Ok(())
}

fn run_fmt() -> anyhow::Result<()> {
    cargo(&["fmt", "--all", "--", "--check"]).context("formatting drift; run `cargo fmt --all`")
}

fn run_clippy() -> anyhow::Result<()> {
    cargo(&["clippy", "--workspace", "--all-targets", "--all-features", "--", "-D", "warnings"])
}

fn run_test() -> anyhow::Result<()> {
    cargo(&["test", "--workspace", "--all-features"])
}

fn run_deny() -> anyhow::Result<()> {
    require_subcommand("deny", "cargo-deny")?;
    cargo(&["deny", "check"])
}

fn run_audit() -> anyhow::Result<()> {
    require_subcommand("audit", "cargo-audit")?;
    cargo(&["audit"])
}

/// Run `cargo <args>` with inherited stdio and fail on a non-zero exit
pub(crate) fn cargo(args: &[&str]) -> anyhow::Result<()> {
    let status = Command::new("cargo")
        .args(args)
        .status()
        .with_context(|| format!("could not spawn `cargo {}`", args.join(" ")))?;
    if !status.success() {
        bail!("`cargo {}` exited with {status}", args.join(" "));
    }
    Ok(())
}

fn require_subcommand(subcommand: &str, package: &str) -> anyhow::Result<()> {
    let installed = Command::new("cargo")
        .args([subcommand, "--version"])
        .output()
        .is_ok_and(|output| output.status.success());
    if !installed {
        bail!("`cargo {subcommand}` is unavailable; install it with `cargo install {package}`");
    }
    Ok(())
}
