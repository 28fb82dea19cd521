//! User namespace detection.
//!
//! Classifies the process's execution context from its uid map so the
//! pipeline can pick the `system` or `user` flavour of the metadata files.

use anyhow::{bail, Result};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Length of the identity mapping the initial user namespace carries.
pub const FULL_RANGE: u64 = 4_294_967_295;

/// Where the process runs, as far as id mapping is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceContext {
    /// Initial user namespace: no restriction.
    Host,
    /// Inside a user namespace, already mapped to its root.
    UsernsRoot,
    /// Inside a user namespace as an unprivileged identity.
    UsernsUser,
}

impl NamespaceContext {
    pub fn mode(self) -> ExecutionMode {
        match self {
            NamespaceContext::Host => ExecutionMode::System,
            NamespaceContext::UsernsRoot | NamespaceContext::UsernsUser => ExecutionMode::User,
        }
    }

    /// Whether a uid/gid mapping must be supplied by the caller.
    pub fn requires_id_map(self) -> bool {
        self == NamespaceContext::UsernsUser
    }
}

impl fmt::Display for NamespaceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NamespaceContext::Host => "host",
            NamespaceContext::UsernsRoot => "userns-root",
            NamespaceContext::UsernsUser => "userns-user",
        })
    }
}

/// Which variant of the metadata files to prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    System,
    User,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::System => "system",
            ExecutionMode::User => "user",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a `uid_map` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdMapEntry {
    pub inner: u64,
    pub outer: u64,
    pub length: u64,
}

impl IdMapEntry {
    fn is_full_range(&self) -> bool {
        self.inner == 0 && self.outer == 0 && self.length == FULL_RANGE
    }

    fn is_single_root(&self) -> bool {
        self.inner == 0 && self.length == 1
    }
}

/// Parse a `uid_map` table. Malformed lines are skipped.
pub fn parse_id_map(content: &str) -> Vec<IdMapEntry> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace().map(|f| f.parse::<u64>());
            match (fields.next(), fields.next(), fields.next()) {
                (Some(Ok(inner)), Some(Ok(outer)), Some(Ok(length))) => Some(IdMapEntry {
                    inner,
                    outer,
                    length,
                }),
                _ => None,
            }
        })
        .collect()
}

/// Classify from parsed records alone. `None` means the records were not
/// conclusive and the init comparison decides.
pub fn classify_entries(entries: &[IdMapEntry]) -> Option<NamespaceContext> {
    if entries.iter().any(IdMapEntry::is_full_range) {
        return Some(NamespaceContext::Host);
    }
    if entries.iter().any(IdMapEntry::is_single_root) {
        return Some(NamespaceContext::UsernsRoot);
    }
    None
}

/// Reads uid maps below a procfs root.
pub struct NamespaceDetector {
    proc_root: PathBuf,
}

impl Default for NamespaceDetector {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl NamespaceDetector {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    fn self_map(&self) -> PathBuf {
        self.proc_root.join("self/uid_map")
    }

    fn init_map(&self) -> PathBuf {
        self.proc_root.join("1/uid_map")
    }

    pub fn detect(&self) -> NamespaceContext {
        let own = match fs::read(self.self_map()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No uid_map on this system, assuming host");
                return NamespaceContext::Host;
            }
            Err(e) => {
                tracing::warn!(
                    "Cannot read {}: {}; assuming host",
                    self.self_map().display(),
                    e
                );
                return NamespaceContext::Host;
            }
        };

        let entries = parse_id_map(&String::from_utf8_lossy(&own));
        if let Some(context) = classify_entries(&entries) {
            return context;
        }

        if same_as_init(&own, &self.init_map()) {
            return NamespaceContext::UsernsRoot;
        }

        NamespaceContext::UsernsUser
    }
}

fn same_as_init(own: &[u8], init_map: &Path) -> bool {
    match fs::read(init_map) {
        Ok(init) => init == own,
        Err(_) => false,
    }
}

/// Value of `--mapped-uid` / `--mapped-gid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappedId {
    /// The `-1` sentinel.
    Unmapped,
    Id(u32),
}

impl MappedId {
    pub fn id(self) -> Option<u32> {
        match self {
            MappedId::Unmapped => None,
            MappedId::Id(id) => Some(id),
        }
    }
}

impl FromStr for MappedId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "-1" {
            return Ok(MappedId::Unmapped);
        }
        match s.parse::<u32>() {
            Ok(id) => Ok(MappedId::Id(id)),
            Err(_) => bail!("Invalid mapped id '{}': expected a number or -1", s),
        }
    }
}

/// Refuse to run unprivileged without an id mapping.
pub fn check_id_map(
    context: NamespaceContext,
    uid: Option<MappedId>,
    gid: Option<MappedId>,
) -> Result<()> {
    if !context.requires_id_map() {
        return Ok(());
    }

    let mapped = |id: Option<MappedId>| id.and_then(MappedId::id).is_some();
    if !mapped(uid) || !mapped(gid) {
        bail!(
            "Running in an unprivileged user namespace ({}) but no uid/gid mapping was given.\n\
             Pass --mapped-uid and --mapped-gid.",
            context
        );
    }
    Ok(())
}
