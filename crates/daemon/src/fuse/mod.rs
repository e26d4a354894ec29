//! FUSE mount bridge built on `fuser`
//!
//! Plugs a `fuser::Filesystem` into the mount lifecycle:
//!
//! - `FuserHost`: a [`MountHost`](crate::mount::MountHost) serving one
//!   filesystem through a `fuser::Session`
//! - `FuserBackend`: builds a host plus its virtual filesystem per mount
//! - `mount_options`: bridge option tokens to `fuser::MountOption`

mod host;
mod options;

pub use host::{FuserBackend, FuserHost};
pub use options::mount_options;
