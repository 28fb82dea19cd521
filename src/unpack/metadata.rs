//! Metadata tarball handling.
//!
//! The metadata tarball carries the distribution config and a handful of
//! optional helper files. Each one may come in mode and compat-level
//! variants; see [`FileResolver`].

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::tarball::{extract_tarball, ExtractOptions};
use crate::common::{is_regular_file_in, join_rootfs, require_file, WorkDir};
use crate::excludes::ExcludeSet;
use crate::merge::ConfigMerger;
use crate::namespace::ExecutionMode;
use crate::resolve::{self, FileResolver};
use crate::templates::TemplateFileRegistry;

/// Unpacks the metadata tarball and applies what it carries to the
/// container's config.
pub struct MetadataUnpacker<'a> {
    /// Metadata tarball, if one was given on the command line.
    pub archive: Option<&'a Path>,
    /// Container directory; holds `config` and receives `fstab`.
    pub container_path: &'a Path,
    pub mode: ExecutionMode,
    pub compat_level: u32,
}

/// What an applied metadata tarball leaves for the later steps.
#[derive(Debug)]
pub struct UnpackedMetadata {
    /// Resolver over the extracted files.
    pub resolver: FileResolver,
    /// The fstab copy installed next to the config, if the metadata had one.
    pub fstab: Option<PathBuf>,
}

impl MetadataUnpacker<'_> {
    /// Extract the tarball and apply it.
    ///
    /// In order: exclusion list, config merge, fstab. Returns `None` when no
    /// tarball was given.
    pub fn unpack(
        &self,
        work_dir: &WorkDir,
        document: &mut ConfigMerger,
        excludes: &mut ExcludeSet,
        registry: &mut TemplateFileRegistry,
    ) -> Result<Option<UnpackedMetadata>> {
        let Some(archive) = self.archive else {
            tracing::warn!("No metadata tarball given, container config left as is");
            return Ok(None);
        };
        require_file(archive, "Metadata tarball")?;

        let dir = work_dir.subdir("metadata")?;
        extract_tarball(
            archive,
            &dir,
            &ExtractOptions {
                label: "metadata",
                ..Default::default()
            },
        )?;

        let resolver = FileResolver::new(&dir, self.mode, self.compat_level);

        if let Some(list) = resolver.resolve_existing(resolve::EXCLUDES) {
            let added = excludes.extend_from_file(&list)?;
            tracing::debug!("{} exclusion pattern(s) from {}", added, list.display());
        }

        let distribution = resolver.resolve(resolve::CONFIG);
        tracing::info!(
            "Merging {} into {}",
            distribution.display(),
            document.path().display()
        );
        document.merge(&distribution)?;

        let fstab = self.install_fstab(&resolver)?;
        if let Some(fstab) = &fstab {
            registry.register(fstab);
            document.append_line(format!("lxc.mount.fstab = {}", fstab.display()))?;
        }

        Ok(Some(UnpackedMetadata { resolver, fstab }))
    }

    /// Copy the resolved fstab next to the config. Returns the copy's path.
    fn install_fstab(&self, resolver: &FileResolver) -> Result<Option<PathBuf>> {
        let Some(source) = resolver.resolve_existing(resolve::FSTAB) else {
            tracing::debug!("Metadata has no fstab");
            return Ok(None);
        };

        let dest = self.container_path.join("fstab");
        fs::copy(&source, &dest).with_context(|| {
            format!("Failed to copy {} to {}", source.display(), dest.display())
        })?;
        Ok(Some(dest))
    }
}

/// Register the rootfs files named by the metadata's `template` list.
///
/// Runs once the rootfs is extracted. Listed paths that are not regular
/// files inside it are skipped: missing files, `..` escapes and symlinks.
/// Returns how many were registered.
pub fn register_extra_templates(
    resolver: &FileResolver,
    rootfs: &Path,
    registry: &mut TemplateFileRegistry,
) -> Result<usize> {
    let Some(list) = resolver.resolve_existing(resolve::TEMPLATE) else {
        tracing::debug!("Metadata has no template list");
        return Ok(0);
    };
    let content = fs::read_to_string(&list)
        .with_context(|| format!("Failed to read template list {}", list.display()))?;

    let mut added = 0;
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some(path) = join_rootfs(rootfs, line) else {
            tracing::warn!("Template {} leaves the rootfs, skipping", line);
            continue;
        };
        if !is_regular_file_in(rootfs, &path) {
            tracing::debug!("Template {} is not a regular file in the rootfs, skipping", line);
            continue;
        }
        if registry.register(path) {
            added += 1;
        }
    }
    Ok(added)
}
