//! Shared utilities across lxc-local modules.

pub mod paths;
pub mod temp;

pub use paths::{ensure_dir_exists, is_regular_file_in, join_rootfs, require_file};
pub use temp::{cleanup_on_interrupt, cleanup_work_dir, WorkDir};
