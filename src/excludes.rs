//! Exclusion patterns for rootfs extraction.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Pattern dropping device nodes shipped in the fstree.
pub const DEV_NODES_PATTERN: &str = "./dev/*";

/// Ordered glob patterns handed to `tar --exclude`.
///
/// Patterns are anchored at the archive root by the extractor. Nothing here
/// validates glob syntax; a bad pattern is tar's error to report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeSet {
    patterns: Vec<String>,
}

impl ExcludeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude_dev_nodes(&mut self) {
        self.push(DEV_NODES_PATTERN);
    }

    pub fn push(&mut self, pattern: impl Into<String>) {
        self.patterns.push(pattern.into());
    }

    /// Append one pattern per non-empty line of `path`, in file order.
    pub fn extend_from_file(&mut self, path: &Path) -> Result<usize> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read exclusion list {}", path.display()))?;

        let before = self.patterns.len();
        for line in content.lines() {
            let line = line.trim();
            if !line.is_empty() {
                self.push(line);
            }
        }
        Ok(self.patterns.len() - before)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn tar_args(&self) -> Vec<String> {
        self.patterns
            .iter()
            .map(|p| format!("--exclude={p}"))
            .collect()
    }
}
