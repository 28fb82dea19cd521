//! Tarball extraction via the host's GNU tar.
//!
//! Compression is detected by tar itself, so xz, gzip, zstd and plain
//! archives all work.

use anyhow::Result;
use std::path::Path;

use crate::common::ensure_dir_exists;
use crate::excludes::ExcludeSet;
use crate::process::Cmd;

/// How to extract one archive.
#[derive(Debug, Default)]
pub(crate) struct ExtractOptions<'a> {
    /// Exclusion patterns; empty means extract everything.
    pub excludes: Option<&'a ExcludeSet>,
    /// Match exclusion patterns only from the archive root.
    pub anchored: bool,
    /// What is being extracted, for error messages.
    pub label: &'a str,
}

pub(crate) fn extract_command(archive: &Path, dest: &Path, options: &ExtractOptions) -> Cmd {
    let mut cmd = Cmd::new("tar");

    // --anchored only affects the --exclude options that follow it
    if options.anchored {
        cmd = cmd.arg("--anchored");
    }
    if let Some(excludes) = options.excludes {
        cmd = cmd.args(excludes.tar_args());
    }

    cmd.arg("--numeric-owner")
        .arg("-xpf")
        .arg_path(archive)
        .arg("-C")
        .arg_path(dest)
        .error_msg(format!(
            "Failed to extract {} {}",
            options.label,
            archive.display()
        ))
}

/// Extract `archive` into `dest`, creating `dest` if needed.
pub(crate) fn extract_tarball(archive: &Path, dest: &Path, options: &ExtractOptions) -> Result<()> {
    ensure_dir_exists(dest)?;

    tracing::info!(
        "Extracting {} {} to {}",
        options.label,
        archive.display(),
        dest.display()
    );
    extract_command(archive, dest, options).run()?;
    Ok(())
}
