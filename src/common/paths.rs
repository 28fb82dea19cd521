//! Utilities for path checking and directory management.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Ensure a directory exists, creating it and its parents if necessary.
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("Failed to create {}", path.display()))
}

/// Fail unless `path` is an existing regular file.
///
/// `what` names the input in the error ("fstree tarball", ...).
pub fn require_file(path: &Path, what: &str) -> Result<()> {
    if !path.exists() {
        bail!("{} not found: {}", what, path.display());
    }
    if !path.is_file() {
        bail!("{} is not a regular file: {}", what, path.display());
    }
    Ok(())
}

/// Join a rootfs-relative path (with or without a leading `/`) onto `root`.
///
/// Returns `None` if the path has `..` components.
pub fn join_rootfs(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut joined = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => return None,
        }
    }
    Some(joined)
}

/// Whether `path` is a regular file (not a symlink) that resolves to a
/// location below `root`.
pub fn is_regular_file_in(root: &Path, path: &Path) -> bool {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_file() => {}
        _ => return false,
    }
    match (root.canonicalize(), path.canonicalize()) {
        (Ok(root), Ok(path)) => path.starts_with(root),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_dir_exists() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("dev/pts");
        ensure_dir_exists(&dir).unwrap();
        ensure_dir_exists(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_require_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("fstree.tar");

        let err = require_file(&file, "fstree tarball").unwrap_err();
        assert!(err.to_string().contains("fstree tarball not found"));

        assert!(require_file(temp.path(), "fstree tarball").is_err());

        fs::write(&file, "").unwrap();
        assert!(require_file(&file, "fstree tarball").is_ok());
    }

    #[test]
    fn test_join_rootfs() {
        let root = Path::new("/var/lib/lxc/c1/rootfs");
        assert_eq!(
            join_rootfs(root, "/etc/hostname").unwrap(),
            Path::new("/var/lib/lxc/c1/rootfs/etc/hostname")
        );
        assert_eq!(
            join_rootfs(root, "etc/./hosts").unwrap(),
            Path::new("/var/lib/lxc/c1/rootfs/etc/hosts")
        );
        assert!(join_rootfs(root, "/../../../etc/shadow").is_none());
        assert!(join_rootfs(root, "etc/../hosts").is_none());
    }

    #[test]
    fn test_is_regular_file_in() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("rootfs");
        fs::create_dir_all(root.join("etc")).unwrap();
        fs::write(root.join("etc/hostname"), "").unwrap();
        assert!(is_regular_file_in(&root, &root.join("etc/hostname")));
        assert!(!is_regular_file_in(&root, &root.join("etc")));
        assert!(!is_regular_file_in(&root, &root.join("etc/missing")));

        // A symlinked file, even one pointing inside the rootfs
        let outside = temp.path().join("host-owned");
        fs::write(&outside, "").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("etc/escape")).unwrap();
        assert!(!is_regular_file_in(&root, &root.join("etc/escape")));

        // A symlinked parent directory
        std::os::unix::fs::symlink(temp.path(), root.join("host")).unwrap();
        assert!(!is_regular_file_in(&root, &root.join("host/host-owned")));
    }
}
