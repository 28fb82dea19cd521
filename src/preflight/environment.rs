//! Container directory checks.

use std::fs;
use std::path::Path;

use super::types::CheckResult;

/// Check that the container directory can receive config and rootfs.
pub fn check_container_dir(container_path: &Path) -> Vec<CheckResult> {
    let mut results = Vec::new();
    let name = "container path writable";

    if !container_path.exists() {
        if let Err(e) = fs::create_dir_all(container_path) {
            results.push(CheckResult::fail(
                name,
                &format!("Cannot create {}: {}", container_path.display(), e),
            ));
            return results;
        }
    }

    if !container_path.is_dir() {
        results.push(CheckResult::fail(
            name,
            &format!("{} is not a directory", container_path.display()),
        ));
        return results;
    }

    let probe = container_path.join(".lxc-local-preflight");
    match fs::write(&probe, "test") {
        Ok(_) => {
            let _ = fs::remove_file(&probe);
            results.push(CheckResult::pass_with(
                name,
                &container_path.display().to_string(),
            ));
        }
        Err(e) => {
            results.push(CheckResult::fail(
                name,
                &format!("Cannot write to {}: {}", container_path.display(), e),
            ));
        }
    }

    if !container_path.join("config").exists() {
        results.push(CheckResult::warn(
            "container config",
            "No config yet; only metadata and generated entries will be written",
        ));
    }

    results
}
