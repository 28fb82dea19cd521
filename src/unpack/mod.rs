//! Tarball unpacking: metadata first, then the root filesystem.

pub mod metadata;
pub mod rootfs;
mod tarball;

pub use metadata::{register_extra_templates, MetadataUnpacker, UnpackedMetadata};
pub use rootfs::RootfsUnpacker;
