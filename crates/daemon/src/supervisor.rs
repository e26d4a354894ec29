//! Attach, serve, maintain, detach
//!
//! [`Supervisor::run`] drives one mount from start to termination as a single
//! call. While the mount is up it reacts to exactly two things: the mount
//! terminating, and maintenance requests, which never end the mount.

use std::path::PathBuf;
use std::sync::Arc;

use common::{device_label, Source};

use crate::maintenance::{
    forward_hangups, MaintenanceDispatcher, MaintenanceEvent, MaintenanceReceiver,
};
use crate::mount::{MountBackend, MountConfig, MountError, MountFlags, MountSession, Mounted};
use crate::notify::{NotifyError, ServiceNotifier, ServiceStatus, SystemdNotifier};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Mount(#[from] MountError),
    #[error(transparent)]
    Notify(NotifyError),
    #[error("failed to unmount FUSE fs: {0}")]
    Unmount(#[source] MountError),
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

pub struct Supervisor {
    notifier: Arc<dyn ServiceNotifier>,
    maintenance: Option<MaintenanceReceiver>,
}

impl Supervisor {
    pub fn new(notifier: Arc<dyn ServiceNotifier>) -> Self {
        Self {
            notifier,
            maintenance: None,
        }
    }

    /// Act on maintenance events from `receiver` while the mount is up
    pub fn with_maintenance(mut self, receiver: MaintenanceReceiver) -> Self {
        self.maintenance = Some(receiver);
        self
    }

    /// Mount `source`, serve it until the mount goes away, then report how
    /// it ended.
    ///
    /// If readiness cannot be announced the mount is torn down again. When
    /// the host also refuses that unmount, the notify error is returned
    /// while the target is still mounted.
    pub async fn run(
        self,
        config: MountConfig,
        source: Arc<dyn Source>,
        backend: &dyn MountBackend,
    ) -> Result<(), RunError> {
        let Mounted {
            session,
            mut terminated,
        } = MountSession::start(config, source, backend).await?;
        let session_id = session.session_id();

        if let Err(err) = self.announce(ServiceStatus::Ready) {
            tracing::error!(
                session_id = %session_id,
                error = %err,
                "failed to announce readiness, unmounting"
            );
            match session.unmount().await {
                // outcome already logged by the termination future
                Ok(()) => {
                    let _ = (&mut terminated).await;
                }
                // still mounted, nothing left to wait for
                Err(unmount_err) => {
                    tracing::error!(session_id = %session_id, error = %unmount_err, "unmount failed");
                }
            }
            session.close();
            return Err(RunError::Notify(err));
        }

        let mut maintenance_open = self.maintenance.is_some();
        let outcome = loop {
            // queued requests are handled before termination is observed
            tokio::select! {
                biased;
                event = next_event(self.maintenance.as_ref()), if maintenance_open => match event {
                    Some(MaintenanceEvent::ForgetAll) => forget_all(&session),
                    None => {
                        tracing::debug!(session_id = %session_id, "maintenance channel closed");
                        maintenance_open = false;
                    }
                },
                result = &mut terminated => break result,
            }
        };

        session.close();
        let stopping = self.announce(ServiceStatus::Stopping);
        match (outcome, stopping) {
            (Err(err), stopping) => {
                if let Err(notify_err) = stopping {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %notify_err,
                        "failed to announce stopping"
                    );
                }
                Err(RunError::Unmount(err))
            }
            (Ok(()), Err(notify_err)) => Err(RunError::Notify(notify_err)),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    /// A missing service manager is not an error
    fn announce(&self, status: ServiceStatus) -> Result<(), NotifyError> {
        match self.notifier.notify(status) {
            Err(NotifyError::NoSocket) => {
                tracing::trace!(status = %status, "no service manager to notify");
                Ok(())
            }
            other => other,
        }
    }
}

async fn next_event(receiver: Option<&MaintenanceReceiver>) -> Option<MaintenanceEvent> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

/// A failed lookup only affects this request, never the mount's outcome
fn forget_all(session: &MountSession) {
    match session.root() {
        Ok(root) => {
            root.forget_all();
            tracing::info!(session_id = %session.session_id(), "forgot all cached state");
        }
        Err(err) => tracing::error!(
            session_id = %session.session_id(),
            error = %err,
            "failed to get mount root for forget-all"
        ),
    }
}

/// Mount `source` at `target` as a service: readiness goes to systemd when
/// `NOTIFY_SOCKET` is set, and SIGHUP flushes all cached state.
pub async fn run_mount(
    source: Arc<dyn Source>,
    target: impl Into<PathBuf>,
    flags: MountFlags,
    backend: &dyn MountBackend,
) -> Result<(), RunError> {
    let config = MountConfig::new(device_label(source.as_ref()), target).with_flags(flags);
    let (dispatcher, receiver) = MaintenanceDispatcher::new();
    let _hangups = forward_hangups(dispatcher).map_err(RunError::Signal)?;

    Supervisor::new(Arc::new(SystemdNotifier::from_env()))
        .with_maintenance(receiver)
        .run(config, source, backend)
        .await
}
