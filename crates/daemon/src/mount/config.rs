//! Mount configuration
//!
//! [`MountFlags`] is the user-facing part: it can be flattened into a clap
//! command or read from a TOML file. [`MountConfig`] binds flags to a device,
//! a target and a platform, and is handed to a session by value.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};

use super::platform::Platform;
use super::poll::PollSpec;

/// Default kernel read-ahead in bytes
pub const DEFAULT_MAX_READ_AHEAD: u32 = 128 * 1024;

/// Default attribute cache timeout in milliseconds
pub const DEFAULT_ATTR_TIMEOUT_MS: u64 = 1000;

/// Feature flags for a mount
#[derive(Args, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountFlags {
    /// Trace every request the mount bridge handles
    #[arg(long)]
    pub debug_fuse: bool,

    /// Allow mounting over a non-empty directory
    #[arg(long)]
    pub allow_non_empty: bool,

    /// Allow access to other users
    #[arg(long)]
    pub allow_other: bool,

    /// Allow access to root user
    #[arg(long)]
    pub allow_root: bool,

    /// Let the kernel enforce permission checks
    #[arg(long)]
    pub default_permissions: bool,

    /// Mount read-only
    #[arg(long)]
    pub read_only: bool,

    /// Kernel read-ahead in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_READ_AHEAD)]
    pub max_read_ahead: u32,

    /// How long the kernel may cache attributes, in milliseconds
    #[arg(long, default_value_t = DEFAULT_ATTR_TIMEOUT_MS)]
    pub attr_timeout_ms: u64,

    /// Volume name (macOS). Defaults to the device label.
    #[arg(long)]
    pub volume_name: Option<String>,

    /// Hide AppleDouble (._) files (macOS)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub no_apple_double: bool,

    /// Ignore extended attributes (macOS)
    #[arg(long)]
    pub no_apple_xattr: bool,

    /// Raw mount option, appended after the built-in ones
    #[arg(long = "option", short = 'o')]
    pub options: Vec<String>,

    /// Raw bridge flag, appended last
    #[arg(long = "fuse-flag", allow_hyphen_values = true)]
    pub flags: Vec<String>,
}

impl Default for MountFlags {
    fn default() -> Self {
        Self {
            debug_fuse: false,
            allow_non_empty: false,
            allow_other: false,
            allow_root: false,
            default_permissions: false,
            read_only: false,
            max_read_ahead: DEFAULT_MAX_READ_AHEAD,
            attr_timeout_ms: DEFAULT_ATTR_TIMEOUT_MS,
            volume_name: None,
            no_apple_double: true,
            no_apple_xattr: false,
            options: Vec::new(),
            flags: Vec::new(),
        }
    }
}

impl MountFlags {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read flags from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let flags = Self::from_toml_str(&contents)?;
        tracing::debug!(path = %path.display(), "loaded mount flags");
        Ok(flags)
    }

    pub fn attr_timeout(&self) -> Duration {
        Duration::from_millis(self.attr_timeout_ms)
    }
}

/// Everything a mount session needs to know before it starts
#[derive(Debug, Clone)]
pub struct MountConfig {
    /// Label shown as the mounted filesystem's name
    pub device: String,
    /// Where the filesystem is attached
    pub target: PathBuf,
    pub platform: Platform,
    pub flags: MountFlags,
    /// Budget for mount/unmount visibility checks
    pub poll: PollSpec,
}

impl MountConfig {
    pub fn new(device: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            target: target.into(),
            platform: Platform::current(),
            flags: MountFlags::default(),
            poll: PollSpec::default(),
        }
    }

    pub fn with_flags(mut self, flags: MountFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_poll(mut self, poll: PollSpec) -> Self {
        self.poll = poll;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid mount flags: {0}")]
    Parse(#[from] toml::de::Error),
}
