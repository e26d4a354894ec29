//! Mount lifecycle for user-space filesystems
//!
//! Attaches a virtual filesystem to the OS through a mount bridge, keeps it
//! serving while reacting to maintenance requests, and detaches it in order.

// Mount sessions and everything they are built from
pub mod mount;

// Runtime signals around a mount
pub mod maintenance;
pub mod notify;
pub mod supervisor;

#[cfg(feature = "fuse")]
pub mod fuse;

pub use maintenance::{forward_hangups, MaintenanceDispatcher, MaintenanceEvent, MaintenanceReceiver};
pub use mount::{
    HostError, MountBackend, MountConfig, MountError, MountFlags, MountHost, MountSession, Mounted,
    Platform, PollSpec, SessionState,
};
pub use notify::{NotifyError, ServiceNotifier, ServiceStatus, SystemdNotifier};
pub use supervisor::{run_mount, RunError, Supervisor};
