//! Root filesystem extraction and post-extraction fix-ups.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use super::tarball::{extract_tarball, ExtractOptions};
use crate::common::{ensure_dir_exists, require_file};
use crate::excludes::ExcludeSet;

/// Mount target for the container's devpts instance.
pub const PTS_DIR: &str = "dev/pts";

/// Upstart tty job on older CentOS / Oracle Linux images.
pub const TTY_CONF: &str = "etc/init/tty.conf";

pub struct RootfsUnpacker<'a> {
    pub rootfs: &'a Path,
}

impl RootfsUnpacker<'_> {
    /// Extract the fstree tarball, then apply the fix-ups.
    pub fn unpack(&self, fstree: Option<&Path>, excludes: &ExcludeSet) -> Result<()> {
        let Some(fstree) = fstree else {
            bail!("No fstree tarball given (--fstree); a container needs a root filesystem");
        };
        require_file(fstree, "Fstree tarball")?;

        if !excludes.is_empty() {
            tracing::info!("Excluding: {}", excludes.patterns().join(" "));
        }

        extract_tarball(
            fstree,
            self.rootfs,
            &ExtractOptions {
                excludes: Some(excludes),
                anchored: true,
                label: "fstree",
            },
        )?;

        self.apply_fixups()
    }

    /// Fix-ups that must hold whatever the tarball contained.
    pub fn apply_fixups(&self) -> Result<()> {
        ensure_dir_exists(&self.rootfs.join(PTS_DIR))?;

        if fix_mingetty_hangup(self.rootfs)? {
            tracing::debug!("Patched {} for --nohangup", TTY_CONF);
        }
        Ok(())
    }
}

/// Make mingetty skip vhangup(2), which fails inside a user namespace.
///
/// Returns true if the file was changed.
pub fn fix_mingetty_hangup(rootfs: &Path) -> Result<bool> {
    let path = rootfs.join(TTY_CONF);
    if !path.is_file() {
        return Ok(false);
    }

    let content =
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;

    let mut changed = false;
    let mut out = String::with_capacity(content.len() + 16);
    for line in content.split_inclusive('\n') {
        if line.contains("mingetty") && !line.contains("--nohangup") {
            out.push_str(&line.replacen("mingetty", "mingetty --nohangup", 1));
            changed = true;
        } else {
            out.push_str(line);
        }
    }

    if changed {
        fs::write(&path, out).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(changed)
}
