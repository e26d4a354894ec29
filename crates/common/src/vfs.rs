//! Virtual filesystem interfaces consumed by the mount lifecycle
//!
//! File and directory operations live with the implementation; the lifecycle
//! only ever shuts a filesystem down or asks for its root.

use std::sync::Arc;

/// A virtual filesystem instance bound to a [`Source`](crate::Source).
pub trait VirtualFs: Send + Sync {
    /// Quiesce in-flight operations, flush state and release backing resources.
    ///
    /// Called at most once by the mount session that owns the instance.
    fn shutdown(&self);

    /// Look up the root entry of the tree.
    fn root(&self) -> Result<Arc<dyn RootEntry>, VfsError>;
}

/// The top-level directory of a mounted virtual filesystem.
pub trait RootEntry: Send + Sync {
    /// Drop every cached attribute, listing and content below this entry.
    fn forget_all(&self);
}

#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    #[error("root entry unavailable: {0}")]
    RootUnavailable(String),
    #[error("filesystem has been shut down")]
    ShutDown,
    #[error("backend error: {0}")]
    Backend(String),
}
