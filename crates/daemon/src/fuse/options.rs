//! Translation of bridge option tokens into `fuser` mount options

use fuser::MountOption;

use crate::mount::MountArg;

/// Convert option tokens into what `fuser` passes to the kernel.
///
/// Tokens that `fuser` negotiates on its own (read-ahead, attribute
/// timeouts, `O_TRUNC` handling, debug tracing) are dropped. Bare flags have
/// no meaning here and are dropped as well. Anything unrecognised is passed
/// through as a custom option.
pub fn mount_options(args: &[MountArg]) -> Vec<MountOption> {
    args.iter().filter_map(translate).collect()
}

fn translate(arg: &MountArg) -> Option<MountOption> {
    let value = match arg {
        MountArg::Opt(value) => value.as_str(),
        MountArg::Flag(flag) => {
            tracing::warn!(flag = %flag, "bridge flag not supported by fuser, ignoring");
            return None;
        }
    };

    let (name, arg_value) = match value.split_once('=') {
        Some((name, v)) => (name, Some(v)),
        None => (value, None),
    };

    let option = match (name, arg_value) {
        ("fsname", Some(v)) => MountOption::FSName(v.to_string()),
        ("subtype", Some(v)) => MountOption::Subtype(v.to_string()),
        ("max_readahead" | "attr_timeout", Some(_)) | ("atomic_o_trunc" | "debug", None) => {
            tracing::debug!(option = %value, "negotiated by fuser, not passed to mount");
            return None;
        }
        ("allow_other", None) => MountOption::AllowOther,
        ("allow_root", None) => MountOption::AllowRoot,
        ("auto_unmount", None) => MountOption::AutoUnmount,
        ("default_permissions", None) => MountOption::DefaultPermissions,
        ("ro", None) => MountOption::RO,
        ("rw", None) => MountOption::RW,
        ("dev", None) => MountOption::Dev,
        ("nodev", None) => MountOption::NoDev,
        ("suid", None) => MountOption::Suid,
        ("nosuid", None) => MountOption::NoSuid,
        ("exec", None) => MountOption::Exec,
        ("noexec", None) => MountOption::NoExec,
        ("atime", None) => MountOption::Atime,
        ("noatime", None) => MountOption::NoAtime,
        ("dirsync", None) => MountOption::DirSync,
        ("sync", None) => MountOption::Sync,
        ("async", None) => MountOption::Async,
        _ => MountOption::CUSTOM(value.to_string()),
    };
    Some(option)
}
