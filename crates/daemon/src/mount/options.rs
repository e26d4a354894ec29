//! Mount bridge option building
//!
//! Turns a [`MountConfig`] into the ordered option list handed to the bridge.
//! Built-in options come first; caller-supplied raw options and flags are
//! appended last so they can override any default.

use std::fmt;

use super::config::MountConfig;

/// Filesystem subtype reported to the OS
pub const FS_SUBTYPE: &str = "vfsmount";

/// A single option token for the mount bridge
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MountArg {
    /// A `-o <value>` mount option
    Opt(String),
    /// A bare flag passed through verbatim
    Flag(String),
}

impl MountArg {
    pub fn opt(value: impl Into<String>) -> Self {
        MountArg::Opt(value.into())
    }

    pub fn flag(value: impl Into<String>) -> Self {
        MountArg::Flag(value.into())
    }

    /// Option name without its `=value` part, for `Opt` tokens
    pub fn option_name(&self) -> Option<&str> {
        match self {
            MountArg::Opt(value) => Some(value.split('=').next().unwrap_or(value)),
            MountArg::Flag(_) => None,
        }
    }
}

impl fmt::Display for MountArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountArg::Opt(value) => write!(f, "-o {}", value),
            MountArg::Flag(value) => write!(f, "{}", value),
        }
    }
}

/// Build the ordered option list for a mount
pub fn build_options(config: &MountConfig) -> Vec<MountArg> {
    let flags = &config.flags;

    let mut args = vec![
        MountArg::opt(format!("fsname={}", config.device)),
        MountArg::opt(format!("subtype={}", FS_SUBTYPE)),
        MountArg::opt(format!("max_readahead={}", flags.max_read_ahead)),
        MountArg::opt(format!(
            "attr_timeout={}",
            flags.attr_timeout().as_secs_f64()
        )),
        // Lets the kernel pass O_TRUNC with open. Bridges that don't
        // understand it drop it, so mounts must work either way.
        MountArg::opt("atomic_o_trunc"),
    ];

    if flags.debug_fuse {
        args.push(MountArg::opt("debug"));
    }

    args.extend(
        config
            .platform
            .policy()
            .rules
            .iter()
            .filter_map(|rule| rule(config)),
    );

    let toggles = [
        (flags.allow_non_empty, "nonempty"),
        (flags.allow_other, "allow_other"),
        (flags.allow_root, "allow_root"),
        (flags.default_permissions, "default_permissions"),
        (flags.read_only, "ro"),
    ];
    args.extend(
        toggles
            .into_iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, name)| MountArg::opt(name)),
    );

    args.extend(flags.options.iter().cloned().map(MountArg::Opt));
    args.extend(flags.flags.iter().cloned().map(MountArg::Flag));
    args
}

/// Flatten options into argv form (`-o`, `value`, `--flag`)
pub fn to_args(options: &[MountArg]) -> Vec<String> {
    let mut argv = Vec::with_capacity(options.len() * 2);
    for option in options {
        match option {
            MountArg::Opt(value) => {
                argv.push("-o".to_string());
                argv.push(value.clone());
            }
            MountArg::Flag(value) => argv.push(value.clone()),
        }
    }
    argv
}
