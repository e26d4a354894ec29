//! `fuser`-backed mount host

use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use common::{Source, VirtualFs};
use fuser::{Filesystem, Session, SessionUnmounter};
use parking_lot::Mutex;

use super::options::mount_options;
use crate::mount::{Attachment, HostError, MountArg, MountBackend, MountHost, ReadyNotifier};

type SharedUnmounter = Arc<Mutex<Option<SessionUnmounter>>>;

/// Serves a single `fuser` filesystem.
///
/// The filesystem is consumed by the first `mount`; a host is good for one
/// mount only. While mounted, SIGINT and SIGTERM unmount it (unless
/// disabled), which lets the serve call return normally.
pub struct FuserHost<F> {
    fs: Mutex<Option<F>>,
    unmounter: SharedUnmounter,
    trap_signals: bool,
}

impl<F: Filesystem + Send + 'static> FuserHost<F> {
    pub fn new(fs: F) -> Self {
        Self {
            fs: Mutex::new(Some(fs)),
            unmounter: Arc::new(Mutex::new(None)),
            trap_signals: true,
        }
    }

    /// Leave SIGINT/SIGTERM alone
    pub fn without_signal_trap(mut self) -> Self {
        self.trap_signals = false;
        self
    }
}

impl<F: Filesystem + Send + 'static> MountHost for FuserHost<F> {
    fn mount(
        &self,
        target: &Path,
        options: &[MountArg],
        ready: ReadyNotifier,
    ) -> Result<(), HostError> {
        let fs = self.fs.lock().take().ok_or(HostError::AlreadyMounted)?;
        let options = mount_options(options);

        // Session::new performs the kernel mount; requests queue until run()
        let mut session = Session::new(fs, target, &options)?;
        *self.unmounter.lock() = Some(session.unmount_callable());
        let _trap = if self.trap_signals {
            InterruptTrap::spawn(self.unmounter.clone())
        } else {
            None
        };

        ready.notify();
        let served = session.run();
        self.unmounter.lock().take();
        tracing::debug!(target = %target.display(), "fuser session ended");
        served.map_err(HostError::from)
    }

    fn unmount(&self) -> Result<(), HostError> {
        let mut unmounter = self.unmounter.lock();
        let unmounter = unmounter.as_mut().ok_or(HostError::NotMounted)?;
        unmounter.unmount()?;
        Ok(())
    }
}

/// Unmounts on SIGINT/SIGTERM until dropped
struct InterruptTrap(tokio::task::AbortHandle);

impl InterruptTrap {
    /// Needs a tokio runtime; without one interrupts are left to the default
    /// handlers.
    fn spawn(unmounter: SharedUnmounter) -> Option<Self> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("no tokio runtime, not trapping interrupts");
                return None;
            }
        };
        let task = handle.spawn(async move {
            wait_for_interrupt().await;
            tracing::info!("interrupted, unmounting");
            if let Some(unmounter) = unmounter.lock().as_mut() {
                if let Err(err) = unmounter.unmount() {
                    tracing::error!(error = %err, "failed to unmount on interrupt");
                }
            }
        });
        Some(Self(task.abort_handle()))
    }
}

impl Drop for InterruptTrap {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(unix)]
async fn wait_for_interrupt() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "cannot trap SIGTERM");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_interrupt() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Builds a [`FuserHost`] per mount from a filesystem factory.
///
/// The factory returns the lifecycle handle of the virtual filesystem along
/// with the `fuser` adapter that serves it.
pub struct FuserBackend<B, F> {
    build: B,
    trap_signals: bool,
    _fs: PhantomData<fn() -> F>,
}

impl<B, F> FuserBackend<B, F>
where
    B: Fn(&Arc<dyn Source>) -> (Arc<dyn VirtualFs>, F) + Send + Sync,
    F: Filesystem + Send + 'static,
{
    pub fn new(build: B) -> Self {
        Self {
            build,
            trap_signals: true,
            _fs: PhantomData,
        }
    }

    pub fn without_signal_trap(mut self) -> Self {
        self.trap_signals = false;
        self
    }
}

impl<B, F> MountBackend for FuserBackend<B, F>
where
    B: Fn(&Arc<dyn Source>) -> (Arc<dyn VirtualFs>, F) + Send + Sync,
    F: Filesystem + Send + 'static,
{
    fn attach(&self, source: &Arc<dyn Source>) -> Attachment {
        let (fs, filesystem) = (self.build)(source);
        let mut host = FuserHost::new(filesystem);
        if !self.trap_signals {
            host = host.without_signal_trap();
        }
        Attachment {
            fs,
            host: Arc::new(host),
        }
    }
}
