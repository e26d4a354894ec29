//! Shared collaborator interfaces for vfsmount
//!
//! The mount lifecycle in `vfsmount-daemon` drives a virtual filesystem it
//! does not implement. This crate defines the seams it talks through:
//!
//! - [`Source`]: the backing store being mounted (display name + root)
//! - [`VirtualFs`]: the filesystem instance a mount serves
//! - [`RootEntry`]: the top of the tree, used for cache invalidation

pub mod source;
pub mod vfs;

pub use source::{device_label, Source, StaticSource};
pub use vfs::{RootEntry, VfsError, VirtualFs};
