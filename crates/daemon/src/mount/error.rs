use std::path::PathBuf;

/// Errors reported by a mount bridge host
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("bridge refused the request")]
    Refused,
    #[error("bridge is not mounted")]
    NotMounted,
    #[error("bridge has already served its filesystem")]
    AlreadyMounted,
    #[error("bridge task aborted")]
    Aborted,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from a mount session
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("mountpoint {}: {source}", .path.display())]
    Mountpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("mountpoint {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("mount stopped before reaching ready")]
    StoppedBeforeReady,
    #[error("mount stopped before reaching ready: mount failed: {0}")]
    FailedBeforeReady(#[source] HostError),
    #[error("mount failed: {0}")]
    MountFailed(#[source] HostError),
    #[error("serve task exited without reporting")]
    ServeAborted,
    #[error("host unmount failed: {0}")]
    UnmountFailed(#[source] HostError),
}

impl MountError {
    /// The mount was never attempted because the target was unusable
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            MountError::Mountpoint { .. } | MountError::NotADirectory(_)
        )
    }
}
