//! lxc-local: assemble an LXC container from a metadata tarball and an
//! fstree tarball.
//!
//! The binary is a thin wrapper around [`pipeline::Pipeline`]; the modules
//! are public so the integration tests can drive each step on its own.

pub mod common;
pub mod config;
pub mod excludes;
pub mod merge;
pub mod namespace;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod resolve;
pub mod templates;
pub mod timing;
pub mod unpack;

pub use pipeline::{AssemblyOptions, AssemblyReport, Pipeline};
