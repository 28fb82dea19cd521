//! The assembly pipeline.
//!
//! One [`Pipeline`] is built per run. It owns everything the run needs
//! (mode, compat level, working directory) and threads the accumulated
//! state (exclusions, template files, config document) through each step:
//!
//! 1. metadata: exclusion list, config merge, fstab
//! 2. `lxc.uts.name`
//! 3. rootfs extraction and fix-ups
//! 4. extra template discovery
//! 5. placeholder substitution
//! 6. ownership hand-off to the mapped ids
//! 7. create message lookup

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::chown;
use std::path::{Path, PathBuf};

use crate::common::{require_file, WorkDir};
use crate::config::Config;
use crate::excludes::ExcludeSet;
use crate::merge::ConfigMerger;
use crate::namespace::{check_id_map, ExecutionMode, MappedId, NamespaceContext};
use crate::resolve::{self, FileResolver};
use crate::templates::{Substitutions, TemplateFileRegistry, TemplateSubstitutor};
use crate::timing::Timer;
use crate::unpack::{register_extra_templates, MetadataUnpacker, RootfsUnpacker};

/// Inputs of a run, as parsed from the command line.
#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    pub name: String,
    /// Container directory (`lxc.lxcpath/name`).
    pub path: PathBuf,
    pub rootfs: PathBuf,
    pub metadata: Option<PathBuf>,
    pub fstree: Option<PathBuf>,
    /// Exclude `./dev/*` from the fstree.
    pub no_dev: bool,
    pub mapped_uid: Option<MappedId>,
    pub mapped_gid: Option<MappedId>,
}

impl AssemblyOptions {
    pub fn config_path(&self) -> PathBuf {
        self.path.join("config")
    }
}

/// What a successful run did.
#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub context: NamespaceContext,
    pub mode: ExecutionMode,
    /// Whether a metadata tarball was applied.
    pub metadata_applied: bool,
    /// Exclusion patterns used for the fstree, in order.
    pub excludes: Vec<String>,
    /// The fstab installed from the metadata, if any.
    pub fstab: Option<PathBuf>,
    /// Files that went through substitution, in registration order.
    pub template_files: Vec<PathBuf>,
    /// Contents of the resolved `create-message`, if any.
    pub create_message: Option<String>,
}

pub struct Pipeline {
    options: AssemblyOptions,
    config: Config,
    context: NamespaceContext,
    work: WorkDir,
}

impl Pipeline {
    /// Validate the run's inputs against the namespace context and set up
    /// the working directory.
    pub fn new(options: AssemblyOptions, config: Config, context: NamespaceContext) -> Result<Self> {
        check_id_map(context, options.mapped_uid, options.mapped_gid)?;
        let work = WorkDir::new()?;
        Ok(Self {
            options,
            config,
            context,
            work,
        })
    }

    pub fn mode(&self) -> ExecutionMode {
        self.context.mode()
    }

    pub fn work_dir(&self) -> &Path {
        self.work.path()
    }

    pub fn run(&self) -> Result<AssemblyReport> {
        let opts = &self.options;
        tracing::info!(
            "Assembling container '{}' in {} ({} mode, {})",
            opts.name,
            opts.path.display(),
            self.mode(),
            self.context
        );

        // Fail before touching the config if there is nothing to unpack
        if let Some(fstree) = &opts.fstree {
            require_file(fstree, "Fstree tarball")?;
        }

        let mut excludes = ExcludeSet::new();
        if opts.no_dev {
            excludes.exclude_dev_nodes();
        }
        let mut registry = TemplateFileRegistry::new(opts.config_path());
        let mut document = ConfigMerger::open(opts.config_path())?;

        let timer = Timer::start("metadata");
        let metadata = MetadataUnpacker {
            archive: opts.metadata.as_deref(),
            container_path: &opts.path,
            mode: self.mode(),
            compat_level: self.config.compat_level,
        }
        .unpack(&self.work, &mut document, &mut excludes, &mut registry)?;
        timer.finish();

        if metadata.is_some() {
            document.append_line(format!("lxc.uts.name = {}", opts.name))?;
        }

        let timer = Timer::start("rootfs");
        RootfsUnpacker {
            rootfs: &opts.rootfs,
        }
        .unpack(opts.fstree.as_deref(), &excludes)?;
        timer.finish();

        if let Some(unpacked) = &metadata {
            let added = register_extra_templates(&unpacked.resolver, &opts.rootfs, &mut registry)?;
            tracing::debug!("{} extra template file(s) from the rootfs", added);
        }

        let substitutor = TemplateSubstitutor::new(self.substitutions())?;
        let done = substitutor.apply_all(&registry)?;
        tracing::debug!("Substituted placeholders in {} file(s)", done);

        let fstab = metadata.as_ref().and_then(|m| m.fstab.clone());
        self.hand_off_ownership(fstab.as_deref());

        let create_message = match &metadata {
            Some(unpacked) => read_create_message(&unpacked.resolver)?,
            None => None,
        };

        Ok(AssemblyReport {
            context: self.context,
            mode: self.mode(),
            metadata_applied: metadata.is_some(),
            excludes: excludes.patterns().to_vec(),
            fstab,
            template_files: registry.files().to_vec(),
            create_message,
        })
    }

    fn substitutions(&self) -> Substitutions {
        Substitutions {
            name: self.options.name.clone(),
            path: self.options.path.clone(),
            rootfs: self.options.rootfs.clone(),
            template_config: self.config.template_config.clone(),
            hook_dir: self.config.hook_dir.clone(),
        }
    }

    /// Give the config and the fstab installed by this run to the mapped ids
    /// so the unprivileged container owner can edit them. Best effort.
    fn hand_off_ownership(&self, fstab: Option<&Path>) {
        let uid = self.options.mapped_uid.and_then(MappedId::id);
        let gid = self.options.mapped_gid.and_then(MappedId::id);
        if uid.is_none() && gid.is_none() {
            return;
        }

        for path in self.ownership_targets(fstab) {
            if let Err(e) = chown(&path, uid, gid) {
                tracing::warn!("Could not change owner of {}: {}", path.display(), e);
            }
        }
    }

    /// Existing files to hand off: the config, and the fstab only if this
    /// run installed it.
    fn ownership_targets(&self, fstab: Option<&Path>) -> Vec<PathBuf> {
        std::iter::once(self.options.config_path())
            .chain(fstab.map(Path::to_path_buf))
            .filter(|path| path.exists())
            .collect()
    }
}

fn read_create_message(resolver: &FileResolver) -> Result<Option<String>> {
    let Some(path) = resolver.resolve_existing(resolve::CREATE_MESSAGE) else {
        return Ok(None);
    };
    let message =
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(dir: &Path) -> AssemblyOptions {
        AssemblyOptions {
            name: "c1".to_string(),
            path: dir.to_path_buf(),
            rootfs: dir.join("rootfs"),
            metadata: None,
            fstree: None,
            no_dev: false,
            mapped_uid: None,
            mapped_gid: None,
        }
    }

    #[test]
    fn test_unprivileged_without_map_is_rejected() {
        let temp = TempDir::new().unwrap();
        let result = Pipeline::new(
            options(temp.path()),
            Config::default(),
            NamespaceContext::UsernsUser,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unprivileged_with_map() {
        let temp = TempDir::new().unwrap();
        let mut opts = options(temp.path());
        opts.mapped_uid = Some(MappedId::Id(100000));
        opts.mapped_gid = Some(MappedId::Id(100000));

        let pipeline =
            Pipeline::new(opts, Config::default(), NamespaceContext::UsernsUser).unwrap();
        assert_eq!(pipeline.mode(), ExecutionMode::User);
        assert!(pipeline.work_dir().is_dir());
    }

    #[test]
    fn test_work_dir_removed_with_pipeline() {
        let temp = TempDir::new().unwrap();
        let pipeline =
            Pipeline::new(options(temp.path()), Config::default(), NamespaceContext::Host)
                .unwrap();
        let work = pipeline.work_dir().to_path_buf();
        assert!(work.exists());
        drop(pipeline);
        assert!(!work.exists());
    }

    #[test]
    fn test_missing_fstree_leaves_config_untouched() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config");
        fs::write(&config, "lxc.net.0.type = veth\n").unwrap();

        let mut opts = options(temp.path());
        opts.fstree = Some(temp.path().join("missing.tar.xz"));

        let pipeline = Pipeline::new(opts, Config::default(), NamespaceContext::Host).unwrap();
        assert!(pipeline.run().is_err());
        assert_eq!(fs::read_to_string(&config).unwrap(), "lxc.net.0.type = veth\n");
    }

    #[test]
    fn test_ownership_skips_foreign_fstab() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("config"), "").unwrap();
        fs::write(temp.path().join("fstab"), "").unwrap();

        let pipeline =
            Pipeline::new(options(temp.path()), Config::default(), NamespaceContext::Host)
                .unwrap();
        assert_eq!(
            pipeline.ownership_targets(None),
            [temp.path().join("config")]
        );

        let fstab = temp.path().join("fstab");
        assert_eq!(
            pipeline.ownership_targets(Some(&fstab)),
            [temp.path().join("config"), fstab]
        );
    }

    #[test]
    fn test_no_fstree_is_fatal() {
        let temp = TempDir::new().unwrap();
        let pipeline =
            Pipeline::new(options(temp.path()), Config::default(), NamespaceContext::Host)
                .unwrap();
        let err = pipeline.run().unwrap_err();
        assert!(err.to_string().contains("No fstree tarball"));
    }
}
