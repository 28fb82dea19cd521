//! Container configuration merging.
//!
//! LXC config is line-oriented `key = value` text. Lines are never parsed,
//! only classified by key prefix:
//!
//! - **network**: `lxc.net.*`
//! - **recognized**: any other `lxc.*` key
//! - **other**: comments, blank lines, anything else
//!
//! [`ConfigMerger`] pulls the network and recognized lines out of the
//! container's existing config, appends the distribution config from the
//! metadata tarball, then puts the container lines back after it so they
//! override the distribution defaults:
//!
//! ```text
//! <other lines, in place>
//!
//! # Distribution configuration
//! <distribution config>
//!
//! # Container specific configuration
//! <recognized lines>
//!
//! # Network configuration
//! <network lines>
//! ```
//!
//! LXC applies the last value for a key, so this order is load-bearing.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const NETWORK_PREFIX: &str = "lxc.net.";
pub const KEY_PREFIX: &str = "lxc.";

pub const DISTRIBUTION_HEADER: &str = "# Distribution configuration";
pub const CONTAINER_HEADER: &str = "# Container specific configuration";
pub const NETWORK_HEADER: &str = "# Network configuration";

/// Side file holding extracted network lines between steps.
pub const NETWORK_SIDE_FILE: &str = "config-network";
/// Side file holding extracted recognized lines between steps.
pub const EXTRA_SIDE_FILE: &str = "config-auto";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Network,
    Recognized,
    Other,
}

/// Classify a config line by key prefix. Leading whitespace is ignored.
pub fn classify(line: &str) -> LineKind {
    let key = line.trim_start();
    if key.starts_with(NETWORK_PREFIX) {
        LineKind::Network
    } else if key.starts_with(KEY_PREFIX) {
        LineKind::Recognized
    } else {
        LineKind::Other
    }
}

/// A config document split into its three line classes, each in original
/// relative order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSections {
    pub network: Vec<String>,
    pub recognized: Vec<String>,
    pub remainder: Vec<String>,
}

impl ConfigSections {
    pub fn split<S: AsRef<str>>(lines: impl IntoIterator<Item = S>) -> Self {
        let mut sections = Self::default();
        for line in lines {
            let line = line.as_ref();
            sections.bucket(classify(line)).push(line.to_string());
        }
        sections
    }

    fn bucket(&mut self, kind: LineKind) -> &mut Vec<String> {
        match kind {
            LineKind::Network => &mut self.network,
            LineKind::Recognized => &mut self.recognized,
            LineKind::Other => &mut self.remainder,
        }
    }

    /// Take the lines of one class, leaving it empty.
    pub fn take(&mut self, kind: LineKind) -> Vec<String> {
        std::mem::take(self.bucket(kind))
    }
}

/// Edits a container config file in place.
///
/// Every step writes the document back to disk, so an aborted run leaves a
/// file that reflects the last completed step.
pub struct ConfigMerger {
    path: PathBuf,
    lines: Vec<String>,
}

impl ConfigMerger {
    /// Open the config document. A missing file is an empty document.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let lines = if path.exists() {
            fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?
                .lines()
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };
        Ok(Self { path, lines })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn side_file(&self, name: &str) -> PathBuf {
        match self.path.parent() {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    fn save(&self) -> Result<()> {
        write_lines(&self.path, &self.lines)
    }

    /// Move lines of `kind` into side file `name`. Returns how many moved.
    fn extract(&mut self, kind: LineKind, name: &str) -> Result<usize> {
        let taken = ConfigSections::split(&self.lines).take(kind);
        // Other classes stay interleaved as they were
        self.lines.retain(|line| classify(line) != kind);

        let side = self.side_file(name);
        if taken.is_empty() {
            // A leftover from an earlier run must not be merged back in.
            if side.exists() {
                fs::remove_file(&side)
                    .with_context(|| format!("Failed to remove stale {}", side.display()))?;
            }
        } else {
            write_lines(&side, &taken)?;
        }

        self.save()?;
        Ok(taken.len())
    }

    /// Step 1: pull `lxc.net.*` lines out into the network side file.
    pub fn extract_network(&mut self) -> Result<usize> {
        self.extract(LineKind::Network, NETWORK_SIDE_FILE)
    }

    /// Step 2: pull the remaining `lxc.*` lines out into the extra side file.
    pub fn extract_other(&mut self) -> Result<usize> {
        self.extract(LineKind::Recognized, EXTRA_SIDE_FILE)
    }

    /// Step 3: append the distribution config shipped in the metadata.
    pub fn merge_distribution(&mut self, distribution: &Path) -> Result<()> {
        if !distribution.is_file() {
            bail!(
                "Metadata tarball is missing the configuration file (expected {})",
                distribution.display()
            );
        }
        let content = fs::read_to_string(distribution)
            .with_context(|| format!("Failed to read {}", distribution.display()))?;

        self.lines.push(String::new());
        self.lines.push(DISTRIBUTION_HEADER.to_string());
        self.lines.extend(content.lines().map(str::to_string));
        self.save()
    }

    /// Step 4: re-add the container lines, then the network lines, each
    /// under its own header. Side files are consumed.
    pub fn merge_extra_then_network(&mut self) -> Result<()> {
        self.consume_side_file(EXTRA_SIDE_FILE, CONTAINER_HEADER)?;
        self.consume_side_file(NETWORK_SIDE_FILE, NETWORK_HEADER)?;
        self.save()
    }

    fn consume_side_file(&mut self, name: &str, header: &str) -> Result<()> {
        let side = self.side_file(name);
        if !side.exists() {
            return Ok(());
        }
        let content = fs::read_to_string(&side)
            .with_context(|| format!("Failed to read {}", side.display()))?;

        self.lines.push(String::new());
        self.lines.push(header.to_string());
        self.lines.extend(content.lines().map(str::to_string));

        fs::remove_file(&side).with_context(|| format!("Failed to remove {}", side.display()))?;
        Ok(())
    }

    /// Run all four steps in order.
    pub fn merge(&mut self, distribution: &Path) -> Result<()> {
        let network = self.extract_network()?;
        let extra = self.extract_other()?;
        tracing::debug!(
            "Split {}: {} network line(s), {} container line(s)",
            self.path.display(),
            network,
            extra
        );
        self.merge_distribution(distribution)?;
        self.merge_extra_then_network()
    }

    /// Append a single directive at the end of the document.
    pub fn append_line(&mut self, line: impl Into<String>) -> Result<()> {
        self.lines.push(line.into());
        self.save()
    }
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut content = lines.join("\n");
    if !lines.is_empty() {
        content.push('\n');
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
