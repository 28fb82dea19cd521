//! Metadata file resolution.
//!
//! A metadata tarball may ship several variants of the same logical file,
//! qualified by execution mode and/or compat level. [`FileResolver`] picks
//! the most specific one that exists.

use std::path::{Path, PathBuf};

use crate::namespace::ExecutionMode;

/// Logical metadata file names.
pub const CONFIG: &str = "config";
pub const FSTAB: &str = "fstab";
pub const TEMPLATE: &str = "template";
pub const EXCLUDES: &str = "excludes";
pub const CREATE_MESSAGE: &str = "create-message";

#[derive(Debug, Clone)]
pub struct FileResolver {
    base: PathBuf,
    mode: ExecutionMode,
    compat_level: u32,
}

impl FileResolver {
    pub fn new(base: impl Into<PathBuf>, mode: ExecutionMode, compat_level: u32) -> Self {
        Self {
            base: base.into(),
            mode,
            compat_level,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Candidate paths for `name`, most specific first.
    pub fn candidates(&self, name: &str) -> [PathBuf; 4] {
        let mode = self.mode.as_str();
        let compat = self.compat_level;
        [
            self.base.join(format!("{name}-{mode}.{compat}")),
            self.base.join(format!("{name}.{compat}")),
            self.base.join(format!("{name}-{mode}")),
            self.base.join(name),
        ]
    }

    /// Most specific existing variant of `name`, or the unqualified path
    /// when no variant exists. Callers check existence themselves.
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.candidates(name)
            .into_iter()
            .find(|p| p.exists())
            .unwrap_or_else(|| self.base.join(name))
    }

    pub fn resolve_existing(&self, name: &str) -> Option<PathBuf> {
        let path = self.resolve(name);
        path.exists().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), name).unwrap();
    }

    fn resolver(dir: &Path, mode: ExecutionMode) -> FileResolver {
        FileResolver::new(dir, mode, 5)
    }

    #[test]
    fn test_nothing_exists_returns_unqualified() {
        let temp = TempDir::new().unwrap();
        let r = resolver(temp.path(), ExecutionMode::System);
        assert_eq!(r.resolve(CONFIG), temp.path().join("config"));
        assert!(r.resolve_existing(CONFIG).is_none());
    }

    #[test]
    fn test_plain_file() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "config");
        let r = resolver(temp.path(), ExecutionMode::User);
        assert_eq!(r.resolve_existing(CONFIG), Some(temp.path().join("config")));
    }

    #[test]
    fn test_specificity_order() {
        let temp = TempDir::new().unwrap();
        let r = resolver(temp.path(), ExecutionMode::User);

        touch(temp.path(), "config");
        assert_eq!(r.resolve(CONFIG), temp.path().join("config"));

        touch(temp.path(), "config-user");
        assert_eq!(r.resolve(CONFIG), temp.path().join("config-user"));

        touch(temp.path(), "config.5");
        assert_eq!(r.resolve(CONFIG), temp.path().join("config.5"));

        touch(temp.path(), "config-user.5");
        assert_eq!(r.resolve(CONFIG), temp.path().join("config-user.5"));
    }

    #[test]
    fn test_other_mode_variant_ignored() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "config");
        touch(temp.path(), "config-system");
        touch(temp.path(), "config-system.5");

        let r = resolver(temp.path(), ExecutionMode::User);
        assert_eq!(r.resolve(CONFIG), temp.path().join("config"));

        let r = resolver(temp.path(), ExecutionMode::System);
        assert_eq!(r.resolve(CONFIG), temp.path().join("config-system.5"));
    }

    #[test]
    fn test_other_compat_level_ignored() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "fstab.4");
        touch(temp.path(), "fstab-system.6");

        let r = resolver(temp.path(), ExecutionMode::System);
        assert_eq!(r.resolve(FSTAB), temp.path().join("fstab"));
        assert!(r.resolve_existing(FSTAB).is_none());
    }

    #[test]
    fn test_hyphenated_name() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "create-message-system");
        let r = resolver(temp.path(), ExecutionMode::System);
        assert_eq!(
            r.resolve(CREATE_MESSAGE),
            temp.path().join("create-message-system")
        );
    }
}
