//! A single mount's lifecycle
//!
//! [`MountSession::start`] attaches a filesystem and hands back a
//! [`Mounted`]: the session, which owns the filesystem and knows how to
//! detach it, and a [`Termination`] future that resolves once the bridge's
//! serve call has returned. The serve call is the only authority on whether
//! the mount is gone; `unmount` merely asks for it.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use common::{RootEntry, Source, VfsError, VirtualFs};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::config::MountConfig;
use super::error::{HostError, MountError};
use super::host::{Attachment, MountBackend, MountHost, ReadyNotifier};
use super::options::{build_options, to_args};
use super::platform::PlatformPolicy;
use super::poll::{path_exists, PollSpec};
use super::state::{SessionState, StateCell};

type ServeOutcome = Result<(), HostError>;

/// Owner of one attached filesystem
pub struct MountSession {
    session_id: Uuid,
    device: String,
    target: PathBuf,
    fs: Arc<dyn VirtualFs>,
    host: Arc<dyn MountHost>,
    policy: &'static PlatformPolicy,
    poll: PollSpec,
    state: Arc<StateCell>,
    fs_shut: AtomicBool,
}

/// A session that reached ready, plus its termination signal
#[derive(Debug)]
pub struct Mounted {
    pub session: MountSession,
    pub terminated: Termination,
}

impl std::fmt::Debug for MountSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountSession")
            .field("session_id", &self.session_id)
            .field("device", &self.device)
            .field("target", &self.target)
            .field("state", &self.state.get())
            .finish()
    }
}

impl MountSession {
    /// Attach `source` at the configured target and wait for the bridge to
    /// come up.
    ///
    /// Returns once the mount is serving. If the serve call returns first,
    /// the filesystem is shut down again and the failure is returned; no
    /// readiness is ever reported in that case.
    pub async fn start(
        config: MountConfig,
        source: Arc<dyn Source>,
        backend: &dyn MountBackend,
    ) -> Result<Mounted, MountError> {
        let policy = config.platform.policy();
        if policy.target_must_exist {
            check_target(&config.target)?;
        }

        let session_id = Uuid::new_v4();
        let state = Arc::new(StateCell::new());
        state.advance(SessionState::Mounting);

        let Attachment { fs, host } = backend.attach(&source);
        let options = build_options(&config);
        tracing::info!(
            session_id = %session_id,
            device = %config.device,
            target = %config.target.display(),
            platform = %config.platform,
            options = ?to_args(&options),
            "mounting"
        );

        let (ready, mut ready_rx) = ReadyNotifier::new();
        let (done_tx, mut done_rx) = oneshot::channel::<ServeOutcome>();
        let serve_host = host.clone();
        let serve_target = config.target.clone();
        tokio::task::spawn_blocking(move || {
            let outcome = serve_host.mount(&serve_target, &options, ready);
            // nobody left to tell if the session was dropped
            let _ = done_tx.send(outcome);
        });

        // Readiness is always sent before the serve call returns, so checking
        // it first never mistakes a short-lived mount for an early failure.
        let early = tokio::select! {
            biased;
            Ok(()) = &mut ready_rx => None,
            outcome = &mut done_rx => Some(outcome),
        };

        if let Some(outcome) = early {
            state.advance(SessionState::FailedEarly);
            fs.shutdown();
            state.advance(SessionState::Terminated);

            let err = match outcome {
                Ok(Ok(())) => MountError::StoppedBeforeReady,
                Ok(Err(err)) => MountError::FailedBeforeReady(err),
                Err(_) => MountError::FailedBeforeReady(HostError::Aborted),
            };
            tracing::error!(
                session_id = %session_id,
                target = %config.target.display(),
                error = %err,
                "mount never became ready"
            );
            return Err(err);
        }

        state.advance(SessionState::Ready);
        if !policy.visible_on_ready {
            let target = config.target.clone();
            if !config.poll.wait_for(|| path_exists(&target)).await {
                tracing::warn!(
                    session_id = %session_id,
                    target = %config.target.display(),
                    timeout = ?config.poll.timeout,
                    "mountpoint did not appear in time"
                );
            }
        }
        state.advance(SessionState::Serving);
        tracing::info!(
            session_id = %session_id,
            target = %config.target.display(),
            "mount ready"
        );

        let terminated = Termination {
            rx: done_rx,
            state: state.clone(),
            session_id,
        };
        let session = MountSession {
            session_id,
            device: config.device,
            target: config.target,
            fs,
            host,
            policy,
            poll: config.poll,
            state,
            fs_shut: AtomicBool::new(false),
        };
        Ok(Mounted {
            session,
            terminated,
        })
    }

    /// Shut the filesystem down, then ask the bridge to release the mount.
    ///
    /// Calling again after a failed release retries only the release; the
    /// filesystem is never shut down twice.
    pub async fn unmount(&self) -> Result<(), MountError> {
        self.state.advance(SessionState::Unmounting);
        tracing::info!(
            session_id = %self.session_id,
            target = %self.target.display(),
            "unmounting"
        );

        let fs = (!self.fs_shut.swap(true, Ordering::SeqCst)).then(|| self.fs.clone());
        let host = self.host.clone();
        let released = tokio::task::spawn_blocking(move || {
            if let Some(fs) = fs {
                fs.shutdown();
            }
            host.unmount()
        })
        .await
        .unwrap_or(Err(HostError::Aborted));

        if let Err(err) = released {
            tracing::error!(
                session_id = %self.session_id,
                target = %self.target.display(),
                error = %err,
                "host unmount failed"
            );
            return Err(MountError::UnmountFailed(err));
        }

        if !self.policy.released_on_unmount {
            let target = self.target.clone();
            if !self.poll.wait_for(|| !path_exists(&target)).await {
                tracing::warn!(
                    session_id = %self.session_id,
                    target = %self.target.display(),
                    timeout = ?self.poll.timeout,
                    "mountpoint still present after unmount"
                );
            }
        }
        Ok(())
    }

    /// Root entry of the mounted filesystem, until shutdown begins
    pub fn root(&self) -> Result<Arc<dyn RootEntry>, VfsError> {
        if self.fs_shut.load(Ordering::SeqCst) {
            return Err(VfsError::ShutDown);
        }
        self.fs.root()
    }

    /// Release the filesystem after the mount went away without `unmount`
    pub fn close(&self) {
        if !self.fs_shut.swap(true, Ordering::SeqCst) {
            tracing::debug!(session_id = %self.session_id, "shutting down filesystem");
            self.fs.shutdown();
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn target(&self) -> &Path {
        &self.target
    }
}

/// Resolves once the serve call has returned
///
/// Yields `Ok` for a clean unmount, [`MountError::MountFailed`] when the
/// bridge reported an error and [`MountError::ServeAborted`] when the serve
/// task went away without reporting. Must not be polled after it resolved.
#[derive(Debug)]
pub struct Termination {
    rx: oneshot::Receiver<ServeOutcome>,
    state: Arc<StateCell>,
    session_id: Uuid,
}

impl Future for Termination {
    type Output = Result<(), MountError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(outcome) => outcome,
            Poll::Pending => return Poll::Pending,
        };
        self.state.advance(SessionState::Terminated);

        let result = match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(MountError::MountFailed(err)),
            Err(_) => Err(MountError::ServeAborted),
        };
        match &result {
            Ok(()) => tracing::info!(session_id = %self.session_id, "mount terminated"),
            Err(err) => tracing::error!(
                session_id = %self.session_id,
                error = %err,
                "mount terminated with error"
            ),
        }
        Poll::Ready(result)
    }
}

fn check_target(target: &Path) -> Result<(), MountError> {
    let meta = std::fs::metadata(target).map_err(|source| MountError::Mountpoint {
        path: target.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(MountError::NotADirectory(target.to_path_buf()));
    }
    Ok(())
}
