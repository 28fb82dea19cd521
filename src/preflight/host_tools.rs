//! Host tool availability checks.

use super::types::CheckResult;

/// Check host tools are installed.
pub fn check_host_tools() -> Vec<CheckResult> {
    let mut results = Vec::new();

    // Required tools with package hints
    let required_tools = [("tar", "tar", "Required to extract both tarballs")];

    for (tool, package, purpose) in required_tools {
        results.push(check_tool_exists(tool, package, purpose, true));
    }

    // tar shells out to these for compressed archives
    let optional_tools = [
        ("xz", "xz-utils", "Required for .tar.xz tarballs"),
        ("gzip", "gzip", "Required for .tar.gz tarballs"),
    ];

    for (tool, package, purpose) in optional_tools {
        results.push(check_tool_exists(tool, package, purpose, false));
    }

    results
}

/// Check if a tool exists in PATH.
fn check_tool_exists(tool: &str, package: &str, purpose: &str, required: bool) -> CheckResult {
    match which::which(tool) {
        Ok(path) => CheckResult::pass_with(tool, &path.display().to_string()),
        Err(_) => {
            let msg = format!("Not found. Install '{}' package. {}", package, purpose);
            if required {
                CheckResult::fail(tool, &msg)
            } else {
                CheckResult::warn(tool, &msg)
            }
        }
    }
}
