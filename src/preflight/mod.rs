//! Preflight checks.
//!
//! Validates host tools and the container directory before anything is
//! extracted, so a missing `tar` fails before the config is touched.

mod environment;
mod host_tools;
mod types;

use std::path::Path;

use anyhow::{bail, Result};

pub use types::{CheckResult, CheckStatus, PreflightReport};

/// Run all preflight checks.
pub fn run_preflight(container_path: &Path) -> PreflightReport {
    let mut checks = Vec::new();

    tracing::debug!("Checking host tools...");
    checks.extend(host_tools::check_host_tools());

    tracing::debug!("Checking container directory...");
    checks.extend(environment::check_container_dir(container_path));

    PreflightReport { checks }
}

/// Run preflight and bail if any checks fail.
pub fn run_preflight_or_fail(container_path: &Path) -> Result<()> {
    let report = run_preflight(container_path);
    report.log();

    if !report.all_passed() {
        bail!(
            "Preflight failed: {} check(s) failed. Fix the issues above and retry.",
            report.fail_count()
        );
    }
    Ok(())
}
