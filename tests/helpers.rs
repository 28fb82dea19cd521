//! Shared test utilities for lxc-local tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use lxc_local::config::Config;
use lxc_local::namespace::NamespaceContext;
use lxc_local::process::Cmd;
use lxc_local::{AssemblyOptions, AssemblyReport, Pipeline};

/// Test environment: a container directory plus staging areas for the two
/// tarballs.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Container path (holds config, fstab, rootfs)
    pub container: PathBuf,
    /// Staging directory for the metadata tarball contents
    pub metadata_src: PathBuf,
    /// Staging directory for the fstree tarball contents
    pub fstree_src: PathBuf,
    /// Where built tarballs go
    pub archives: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let container = base.join("lxc/c1");
        let metadata_src = base.join("metadata-src");
        let fstree_src = base.join("fstree-src");
        let archives = base.join("archives");

        for dir in [&container, &metadata_src, &fstree_src, &archives] {
            fs::create_dir_all(dir).expect("Failed to create test dir");
        }

        Self {
            _temp_dir: temp_dir,
            container,
            metadata_src,
            fstree_src,
            archives,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.container.join("config")
    }

    pub fn rootfs(&self) -> PathBuf {
        self.container.join("rootfs")
    }

    /// Write the container config as lxc-create would before calling us.
    pub fn write_container_config(&self, content: &str) {
        fs::write(self.config_path(), content).expect("Failed to write container config");
    }

    pub fn add_metadata_file(&self, name: &str, content: &str) {
        write_with_dirs(&self.metadata_src.join(name), content);
    }

    pub fn add_fstree_file(&self, relative: &str, content: impl AsRef<[u8]>) {
        write_with_dirs(&self.fstree_src.join(relative), content);
    }

    /// Ship a symlink in the fstree; tar stores it as a link.
    pub fn add_fstree_symlink(&self, relative: &str, target: &Path) {
        let link = self.fstree_src.join(relative);
        if let Some(parent) = link.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::os::unix::fs::symlink(target, link).expect("Failed to create symlink");
    }

    pub fn metadata_tarball(&self) -> PathBuf {
        create_tarball(&self.metadata_src, &self.archives.join("meta.tar"))
    }

    pub fn fstree_tarball(&self) -> PathBuf {
        create_tarball(&self.fstree_src, &self.archives.join("fstree.tar"))
    }

    /// Options with both tarballs built from the staging dirs.
    pub fn options(&self) -> AssemblyOptions {
        AssemblyOptions {
            name: "c1".to_string(),
            path: self.container.clone(),
            rootfs: self.rootfs(),
            metadata: Some(self.metadata_tarball()),
            fstree: Some(self.fstree_tarball()),
            no_dev: false,
            mapped_uid: None,
            mapped_gid: None,
        }
    }

    pub fn config() -> Config {
        Config {
            hook_dir: PathBuf::from("/usr/share/lxc/hooks"),
            template_config: PathBuf::from("/usr/share/lxc/config"),
            compat_level: 5,
        }
    }

    pub fn run(&self, options: AssemblyOptions) -> anyhow::Result<AssemblyReport> {
        self.run_in(options, NamespaceContext::Host)
    }

    pub fn run_in(
        &self,
        options: AssemblyOptions,
        context: NamespaceContext,
    ) -> anyhow::Result<AssemblyReport> {
        Pipeline::new(options, Self::config(), context)?.run()
    }

    pub fn read_config(&self) -> String {
        fs::read_to_string(self.config_path()).expect("Failed to read container config")
    }

    pub fn config_lines(&self) -> Vec<String> {
        self.read_config().lines().map(str::to_string).collect()
    }
}

pub fn write_with_dirs(path: &Path, content: impl AsRef<[u8]>) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(path, content).expect("Failed to write file");
}

/// Tar up `src` with `./`-prefixed member names, like image builders do.
pub fn create_tarball(src: &Path, out: &Path) -> PathBuf {
    Cmd::new("tar")
        .arg("-cf")
        .arg_path(out)
        .arg("-C")
        .arg_path(src)
        .arg(".")
        .run()
        .expect("Failed to create tarball");
    out.to_path_buf()
}

/// Index of the first line equal to `needle`.
pub fn line_index(lines: &[String], needle: &str) -> usize {
    lines
        .iter()
        .position(|l| l == needle)
        .unwrap_or_else(|| panic!("{needle:?} not found in:\n{}", lines.join("\n")))
}

/// Assert that a file contains expected content.
pub fn assert_file_contains(path: &Path, expected: &str) {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read file {}: {}", path.display(), e));
    assert!(
        content.contains(expected),
        "File {} does not contain expected content.\nExpected to find: {}\nActual content: {}",
        path.display(),
        expected,
        content
    );
}

/// Assert that a directory exists.
pub fn assert_dir_exists(path: &Path) {
    assert!(
        path.is_dir(),
        "Expected directory to exist: {}",
        path.display()
    );
}
