//! Seams between a mount session and the OS-facing mount bridge

use std::path::Path;
use std::sync::Arc;

use common::{Source, VirtualFs};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::error::HostError;
use super::options::MountArg;

/// An OS-level mount bridge host serving one filesystem.
///
/// Both calls block; the session runs them off the async runtime.
pub trait MountHost: Send + Sync + 'static {
    /// Attach the filesystem at `target` and serve it until it is unmounted.
    ///
    /// Must call [`ReadyNotifier::notify`] once the bridge is dispatching
    /// operations. Returns when the mount goes away, with an error if it
    /// never came up or broke down.
    fn mount(
        &self,
        target: &Path,
        options: &[MountArg],
        ready: ReadyNotifier,
    ) -> Result<(), HostError>;

    /// Ask the OS to release the mount. The serve call returns afterwards.
    fn unmount(&self) -> Result<(), HostError>;
}

/// One-shot readiness signal handed to [`MountHost::mount`]
#[derive(Debug, Clone)]
pub struct ReadyNotifier {
    tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl ReadyNotifier {
    pub(crate) fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Signal readiness. Only the first call has an effect; returns whether
    /// this call was it.
    pub fn notify(&self) -> bool {
        match self.tx.lock().take() {
            Some(tx) => {
                // the session may already have given up on this mount
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    pub fn is_notified(&self) -> bool {
        self.tx.lock().is_none()
    }
}

/// The virtual filesystem and bridge host that make up one mount
pub struct Attachment {
    pub fs: Arc<dyn VirtualFs>,
    pub host: Arc<dyn MountHost>,
}

/// Builds the filesystem for a source and the host that will serve it
pub trait MountBackend: Send + Sync {
    fn attach(&self, source: &Arc<dyn Source>) -> Attachment;
}
