//! Per-platform mount policy
//!
//! Everything that differs between host platforms lives in one table so the
//! option builder and the session stay platform-agnostic.

use serde::{Deserialize, Serialize};

use super::config::MountConfig;
use super::options::{MountArg, FS_SUBTYPE};

/// Host platform family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Macos,
    Freebsd,
    Windows,
}

impl Platform {
    /// The platform this binary was built for
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::Macos
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "freebsd") {
            Platform::Freebsd
        } else {
            Platform::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Macos => "macos",
            Platform::Freebsd => "freebsd",
            Platform::Windows => "windows",
        }
    }

    pub fn policy(&self) -> &'static PlatformPolicy {
        match self {
            Platform::Linux | Platform::Freebsd => &UNIX,
            Platform::Macos => &MACOS,
            Platform::Windows => &WINDOWS,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Emits an option for a config, or nothing when its toggle is off
pub type OptionRule = fn(&MountConfig) -> Option<MountArg>;

/// How a platform's mount bridge behaves
pub struct PlatformPolicy {
    /// The target directory must exist before mounting. On Windows the
    /// bridge creates it and refuses an existing one.
    pub target_must_exist: bool,
    /// The target is statable as soon as the bridge reports ready.
    pub visible_on_ready: bool,
    /// The target is released as soon as the host unmount call returns.
    pub released_on_unmount: bool,
    /// Platform extensions, evaluated in order after the base options.
    pub rules: &'static [OptionRule],
}

impl std::fmt::Debug for PlatformPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformPolicy")
            .field("target_must_exist", &self.target_must_exist)
            .field("visible_on_ready", &self.visible_on_ready)
            .field("released_on_unmount", &self.released_on_unmount)
            .field("rules", &self.rules.len())
            .finish()
    }
}

static UNIX: PlatformPolicy = PlatformPolicy {
    target_must_exist: true,
    visible_on_ready: true,
    released_on_unmount: true,
    rules: &[],
};

static MACOS: PlatformPolicy = PlatformPolicy {
    target_must_exist: true,
    visible_on_ready: true,
    released_on_unmount: true,
    rules: &[volume_name, no_apple_double, no_apple_xattr],
};

static WINDOWS: PlatformPolicy = PlatformPolicy {
    target_must_exist: false,
    visible_on_ready: false,
    released_on_unmount: false,
    rules: &[current_user_uid, current_user_gid, file_system_name],
};

fn volume_name(config: &MountConfig) -> Option<MountArg> {
    let name = config
        .flags
        .volume_name
        .clone()
        .unwrap_or_else(|| config.device.clone());
    Some(MountArg::opt(format!("volname={}", name)))
}

fn no_apple_double(config: &MountConfig) -> Option<MountArg> {
    config
        .flags
        .no_apple_double
        .then(|| MountArg::opt("noappledouble"))
}

fn no_apple_xattr(config: &MountConfig) -> Option<MountArg> {
    config
        .flags
        .no_apple_xattr
        .then(|| MountArg::opt("noapplexattr"))
}

// -1 makes WinFsp map ownership to the mounting user
fn current_user_uid(_: &MountConfig) -> Option<MountArg> {
    Some(MountArg::opt("uid=-1"))
}

fn current_user_gid(_: &MountConfig) -> Option<MountArg> {
    Some(MountArg::opt("gid=-1"))
}

fn file_system_name(_: &MountConfig) -> Option<MountArg> {
    Some(MountArg::flag(format!("--FileSystemName={}", FS_SUBTYPE)))
}
