//! Template files and placeholder substitution.
//!
//! The container config, its fstab and any file listed in the metadata's
//! `template` list may contain placeholders that are only known at creation
//! time. They are collected in a [`TemplateFileRegistry`] and rewritten in
//! place by a [`TemplateSubstitutor`] once everything is unpacked.

use anyhow::{Context, Result};
use regex::bytes::{Captures, Regex};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

pub const TOKEN_NAME: &str = "LXC_NAME";
pub const TOKEN_PATH: &str = "LXC_PATH";
pub const TOKEN_ROOTFS_PATH: &str = "LXC_ROOTFS_PATH";
pub const TOKEN_TEMPLATE_CONFIG: &str = "LXC_TEMPLATE_CONFIG";
pub const TOKEN_HOOK_DIR: &str = "LXC_HOOK_DIR";

/// Files that receive substitution, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateFileRegistry {
    files: Vec<PathBuf>,
}

impl TemplateFileRegistry {
    /// Registry seeded with the container config document.
    pub fn new(config: impl Into<PathBuf>) -> Self {
        Self {
            files: vec![config.into()],
        }
    }

    /// Add a file. Returns false if it was already registered.
    pub fn register(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.files.contains(&path) {
            return false;
        }
        self.files.push(path);
        true
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

/// Runtime values for each placeholder.
#[derive(Debug, Clone)]
pub struct Substitutions {
    pub name: String,
    pub path: PathBuf,
    pub rootfs: PathBuf,
    pub template_config: PathBuf,
    pub hook_dir: PathBuf,
}

/// Literal, whole-token placeholder replacement.
///
/// A token only matches when it is not glued to `[A-Za-z0-9_]`, so
/// `LXC_NAME_2` or `MY_LXC_PATH` are left untouched. Files are treated as
/// bytes; they need not be valid UTF-8.
pub struct TemplateSubstitutor {
    pattern: Regex,
    values: Vec<(&'static str, String)>,
}

impl TemplateSubstitutor {
    pub fn new(values: Substitutions) -> Result<Self> {
        let values = vec![
            (TOKEN_NAME, values.name),
            (TOKEN_PATH, values.path.display().to_string()),
            (TOKEN_ROOTFS_PATH, values.rootfs.display().to_string()),
            (
                TOKEN_TEMPLATE_CONFIG,
                values.template_config.display().to_string(),
            ),
            (TOKEN_HOOK_DIR, values.hook_dir.display().to_string()),
        ];
        let alternation = values
            .iter()
            .map(|(token, _)| regex::escape(token))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?-u:\b)(?:{alternation})(?-u:\b)"))
            .context("Failed to build placeholder pattern")?;

        Ok(Self { pattern, values })
    }

    fn value_for<'a>(&'a self, token: &'a [u8]) -> &'a [u8] {
        self.values
            .iter()
            .find(|(name, _)| name.as_bytes() == token)
            .map_or(token, |(_, value)| value.as_bytes())
    }

    pub fn apply<'t>(&self, text: &'t [u8]) -> Cow<'t, [u8]> {
        self.pattern
            .replace_all(text, |caps: &Captures| self.value_for(&caps[0]).to_vec())
    }

    /// Rewrite one file in place. Returns false if the path is not a regular
    /// file (it may have been removed by an earlier step). Symlinks are
    /// never written through.
    pub fn apply_to_file(&self, path: &Path) -> Result<bool> {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_file() => {}
            _ => return Ok(false),
        }
        let content =
            fs::read(path).with_context(|| format!("Failed to read template {}", path.display()))?;

        if let Cow::Owned(rewritten) = self.apply(&content) {
            fs::write(path, rewritten)
                .with_context(|| format!("Failed to write template {}", path.display()))?;
        }
        Ok(true)
    }

    /// Rewrite every registered file. Returns how many were processed.
    pub fn apply_all(&self, registry: &TemplateFileRegistry) -> Result<usize> {
        let mut done = 0;
        for path in registry.files() {
            if self.apply_to_file(path)? {
                tracing::debug!("Substituted placeholders in {}", path.display());
                done += 1;
            } else {
                tracing::debug!("Skipping {}: not a regular file", path.display());
            }
        }
        Ok(done)
    }
}
