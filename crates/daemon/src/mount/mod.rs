//! Mount lifecycle
//!
//! - [`options`] turns a [`MountConfig`] into bridge option tokens
//! - [`poll`] waits for mountpoint effects the bridge reports late
//! - [`session`] owns a single mount from attach to termination

pub mod config;
mod error;
pub mod host;
pub mod options;
pub mod platform;
pub mod poll;
pub mod session;
pub mod state;

pub use config::{ConfigError, MountConfig, MountFlags};
pub use error::{HostError, MountError};
pub use host::{Attachment, MountBackend, MountHost, ReadyNotifier};
pub use options::{build_options, to_args, MountArg, FS_SUBTYPE};
pub use platform::{Platform, PlatformPolicy};
pub use poll::PollSpec;
pub use session::{MountSession, Mounted, Termination};
pub use state::SessionState;
