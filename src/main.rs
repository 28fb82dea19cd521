//! lxc-local - LXC template for locally stored images.
//!
//! Called by `lxc-create -t local`:
//! - unpacks the metadata tarball and merges its config into the container's
//! - unpacks the fstree tarball as the container's rootfs
//! - substitutes the LXC_* placeholders in every generated file

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use lxc_local::common::cleanup_on_interrupt;
use lxc_local::config::Config;
use lxc_local::namespace::{MappedId, NamespaceDetector};
use lxc_local::{preflight, AssemblyOptions, Pipeline};

#[derive(Parser)]
#[command(name = "lxc-local")]
#[command(about = "LXC template for locally stored container images")]
#[command(
    after_help = "EXAMPLE:\n  lxc-create -t local -n c1 -- --metadata meta.tar.xz --fstree rootfs.tar.xz"
)]
struct Cli {
    /// Container name
    #[arg(short, long)]
    name: String,

    /// Container path (directory holding the config)
    #[arg(short, long)]
    path: PathBuf,

    /// Rootfs path (default: <path>/rootfs)
    #[arg(long)]
    rootfs: Option<PathBuf>,

    /// Metadata tarball (config, fstab, templates, excludes, create-message)
    #[arg(short, long)]
    metadata: Option<PathBuf>,

    /// Root filesystem tarball
    #[arg(short, long)]
    fstree: Option<PathBuf>,

    /// Don't extract /dev from the fstree
    #[arg(long)]
    no_dev: bool,

    /// Host uid mapped to the container's root (-1 for none)
    #[arg(long, allow_negative_numbers = true)]
    mapped_uid: Option<MappedId>,

    /// Host gid mapped to the container's root (-1 for none)
    #[arg(long, allow_negative_numbers = true)]
    mapped_gid: Option<MappedId>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    let filter = if debug { "lxc_local=debug" } else { "lxc_local=info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = Config::load();
    config.log();

    let rootfs = cli.rootfs.unwrap_or_else(|| cli.path.join("rootfs"));
    let options = AssemblyOptions {
        name: cli.name,
        path: cli.path,
        rootfs,
        metadata: cli.metadata,
        fstree: cli.fstree,
        no_dev: cli.no_dev,
        mapped_uid: cli.mapped_uid,
        mapped_gid: cli.mapped_gid,
    };

    preflight::run_preflight_or_fail(&options.path)?;

    let context = NamespaceDetector::default().detect();
    tracing::debug!("Namespace context: {}", context);

    let pipeline = Pipeline::new(options, config, context)?;
    cleanup_on_interrupt(pipeline.work_dir().to_path_buf())?;

    let report = pipeline.run()?;

    if let Some(message) = report.create_message {
        println!();
        println!("---");
        print!("{}", message);
    }

    Ok(())
}
