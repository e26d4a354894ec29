//! Maintenance requests for a running mount
//!
//! A lightweight flume queue between whatever asks for maintenance (the
//! SIGHUP forwarder, an admin endpoint) and the supervisor loop that acts on
//! it. The dispatcher can be cloned freely; the supervisor owns the receiver.

use anyhow::Result;

/// Work the supervisor performs on a live mount without stopping it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceEvent {
    /// Drop every cached attribute, listing and content entry
    ForgetAll,
}

#[derive(Debug, Clone)]
pub struct MaintenanceDispatcher {
    tx: flume::Sender<MaintenanceEvent>,
}

impl MaintenanceDispatcher {
    /// Create a dispatcher and the receiver the supervisor listens on
    pub fn new() -> (Self, MaintenanceReceiver) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, MaintenanceReceiver { rx })
    }

    /// Queue an event. Fails only once the receiver is gone.
    pub fn dispatch(&self, event: MaintenanceEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| anyhow::anyhow!("maintenance receiver has been dropped"))
    }

    pub fn forget_all(&self) -> Result<()> {
        self.dispatch(MaintenanceEvent::ForgetAll)
    }
}

#[derive(Debug)]
pub struct MaintenanceReceiver {
    rx: flume::Receiver<MaintenanceEvent>,
}

impl MaintenanceReceiver {
    /// Next event, or None once every dispatcher has been dropped
    pub async fn recv(&self) -> Option<MaintenanceEvent> {
        self.rx.recv_async().await.ok()
    }

    pub fn try_recv(&self) -> Option<MaintenanceEvent> {
        self.rx.try_recv().ok()
    }
}

/// Stops forwarding signals when dropped
#[derive(Debug)]
pub struct SignalForwarder(Option<tokio::task::AbortHandle>);

impl Drop for SignalForwarder {
    fn drop(&mut self) {
        if let Some(handle) = &self.0 {
            handle.abort();
        }
    }
}

/// Turn every SIGHUP into a [`MaintenanceEvent::ForgetAll`]
///
/// The handler is installed before this returns. Must be called from within
/// a tokio runtime.
#[cfg(unix)]
pub fn forward_hangups(dispatcher: MaintenanceDispatcher) -> std::io::Result<SignalForwarder> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = signal(SignalKind::hangup())?;
    let task = tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            tracing::info!("SIGHUP received, flushing all cached directory information");
            if let Err(err) = dispatcher.forget_all() {
                tracing::debug!(error = %err, "supervisor gone, no longer forwarding SIGHUP");
                break;
            }
        }
    });
    Ok(SignalForwarder(Some(task.abort_handle())))
}

/// There is no hangup signal here; nothing is forwarded.
#[cfg(not(unix))]
pub fn forward_hangups(_dispatcher: MaintenanceDispatcher) -> std::io::Result<SignalForwarder> {
    Ok(SignalForwarder(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dispatch_and_receive() {
        let (dispatcher, receiver) = MaintenanceDispatcher::new();
        let other = dispatcher.clone();

        dispatcher.forget_all().unwrap();
        other.dispatch(MaintenanceEvent::ForgetAll).unwrap();

        assert_eq!(receiver.recv().await, Some(MaintenanceEvent::ForgetAll));
        assert_eq!(receiver.try_recv(), Some(MaintenanceEvent::ForgetAll));
        assert_eq!(receiver.try_recv(), None);

        drop(dispatcher);
        drop(other);
        assert_eq!(receiver.recv().await, None);
    }

    #[test]
    fn test_dispatch_after_receiver_dropped() {
        let (dispatcher, receiver) = MaintenanceDispatcher::new();
        drop(receiver);
        assert!(dispatcher.forget_all().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hangup_becomes_forget_all() {
        let (dispatcher, receiver) = MaintenanceDispatcher::new();
        let _forwarder = forward_hangups(dispatcher).unwrap();

        let status = std::process::Command::new("kill")
            .args(["-HUP", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), receiver.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(MaintenanceEvent::ForgetAll));
    }
}
