//! Service manager notifications
//!
//! Speaks the systemd `sd_notify` datagram protocol. A missing
//! `NOTIFY_SOCKET` is reported as [`NotifyError::NoSocket`] so callers can
//! treat "not running under a service manager" as a non-event.

use std::ffi::OsString;

/// Environment variable naming the service manager's socket
pub const NOTIFY_SOCKET_ENV: &str = "NOTIFY_SOCKET";

#[cfg(unix)]
const SEND_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(100);

/// Lifecycle milestones reported to the service manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Ready,
    Stopping,
}

impl ServiceStatus {
    /// Wire form of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Ready => "READY=1",
            ServiceStatus::Stopping => "STOPPING=1",
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("no service manager socket")]
    NoSocket,
    #[error("failed to notify service manager: {0}")]
    Io(#[from] std::io::Error),
}

/// Out-of-band channel to whatever supervises this process
pub trait ServiceNotifier: Send + Sync {
    fn notify(&self, status: ServiceStatus) -> Result<(), NotifyError>;
}

/// `sd_notify` over a unix datagram socket
#[derive(Debug, Clone, Default)]
pub struct SystemdNotifier {
    socket: Option<OsString>,
}

impl SystemdNotifier {
    pub fn from_env() -> Self {
        Self {
            socket: std::env::var_os(NOTIFY_SOCKET_ENV).filter(|s| !s.is_empty()),
        }
    }

    /// Notify a specific socket. A leading `@` names an abstract socket.
    pub fn with_socket(socket: impl Into<OsString>) -> Self {
        Self {
            socket: Some(socket.into()),
        }
    }
}

impl ServiceNotifier for SystemdNotifier {
    fn notify(&self, status: ServiceStatus) -> Result<(), NotifyError> {
        let socket = self.socket.as_ref().ok_or(NotifyError::NoSocket)?;
        send(socket, status.as_str().as_bytes())?;
        tracing::debug!(status = %status, "notified service manager");
        Ok(())
    }
}

#[cfg(unix)]
fn send(socket: &OsString, message: &[u8]) -> Result<(), NotifyError> {
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::net::UnixDatagram;

    let sock = UnixDatagram::unbound()?;
    sock.set_write_timeout(Some(SEND_TIMEOUT))?;

    match socket.as_bytes().strip_prefix(b"@") {
        #[cfg(target_os = "linux")]
        Some(name) => {
            use std::os::linux::net::SocketAddrExt;
            let addr = std::os::unix::net::SocketAddr::from_abstract_name(name)?;
            sock.send_to_addr(message, &addr)?;
        }
        #[cfg(not(target_os = "linux"))]
        Some(_) => return Err(NotifyError::NoSocket),
        None => {
            sock.send_to(message, std::path::Path::new(socket))?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn send(_socket: &OsString, _message: &[u8]) -> Result<(), NotifyError> {
    Err(NotifyError::NoSocket)
}
