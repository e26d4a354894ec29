//! Shared fixtures for mount lifecycle tests
//!
//! `ScriptedHost` stands in for the OS mount bridge. Its serve call blocks on
//! a release channel, which is fed by `unmount` (or by `external_unmount`,
//! to mimic the OS tearing the mount down behind the session's back).

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ::common::{RootEntry, Source, StaticSource, VfsError, VirtualFs};
use parking_lot::Mutex;
use vfsmount_daemon::mount::{
    Attachment, HostError, MountArg, MountBackend, MountHost, ReadyNotifier,
};
use vfsmount_daemon::{NotifyError, ServiceNotifier, ServiceStatus};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn source() -> Arc<dyn Source> {
    Arc::new(StaticSource::new("remote", "photos"))
}

/// Ordered record of lifecycle calls across the fake filesystem and host
#[derive(Debug, Clone, Default)]
pub struct Marks(Arc<Mutex<Vec<&'static str>>>);

impl Marks {
    pub fn push(&self, mark: &'static str) {
        self.0.lock().push(mark);
    }

    pub fn snapshot(&self) -> Vec<&'static str> {
        self.0.lock().clone()
    }

    pub fn count(&self, mark: &'static str) -> usize {
        self.0.lock().iter().filter(|m| **m == mark).count()
    }
}

/// Root entry that only counts how often it was asked to forget
#[derive(Debug, Default)]
pub struct CountingRoot {
    forgets: AtomicU64,
}

impl CountingRoot {
    pub fn forget_count(&self) -> u64 {
        self.forgets.load(Ordering::SeqCst)
    }
}

impl RootEntry for CountingRoot {
    fn forget_all(&self) {
        self.forgets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Virtual filesystem whose root is a [`CountingRoot`]
pub struct CountingFs {
    pub entry: Arc<CountingRoot>,
    pub marks: Marks,
    pub root_fails: AtomicBool,
}

impl CountingFs {
    pub fn new(marks: Marks) -> Self {
        Self {
            entry: Arc::new(CountingRoot::default()),
            marks,
            root_fails: AtomicBool::new(false),
        }
    }
}

impl VirtualFs for CountingFs {
    fn shutdown(&self) {
        self.marks.push("fs_shutdown");
    }

    fn root(&self) -> Result<Arc<dyn RootEntry>, VfsError> {
        self.marks.push("root_lookup");
        if self.root_fails.load(Ordering::SeqCst) {
            return Err(VfsError::RootUnavailable("backend offline".to_string()));
        }
        Ok(self.entry.clone() as Arc<dyn RootEntry>)
    }
}

/// How the fake bridge behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Signal ready, serve until released, exit cleanly
    Serve,
    /// Return cleanly without ever signalling ready
    ExitBeforeReady,
    /// Fail without ever signalling ready
    RefuseBeforeReady,
    /// Signal ready, then fail once released
    ErrorAfterRelease,
    /// Signal ready, but refuse every unmount request
    RefuseUnmount,
}

pub struct ScriptedHost {
    script: Script,
    /// Create the target after signalling ready and remove it on release,
    /// the way a bridge that owns its mountpoint does.
    owns_target: Option<Duration>,
    marks: Marks,
    release_tx: flume::Sender<()>,
    release_rx: flume::Receiver<()>,
    mounted_tx: flume::Sender<()>,
    mounted_rx: flume::Receiver<()>,
    mounts: AtomicUsize,
}

impl ScriptedHost {
    pub fn new(script: Script, marks: Marks) -> Self {
        let (release_tx, release_rx) = flume::unbounded();
        let (mounted_tx, mounted_rx) = flume::unbounded();
        Self {
            script,
            owns_target: None,
            marks,
            release_tx,
            release_rx,
            mounted_tx,
            mounted_rx,
            mounts: AtomicUsize::new(0),
        }
    }

    /// Create the target `delay` after signalling ready
    pub fn owning_target(mut self, delay: Duration) -> Self {
        self.owns_target = Some(delay);
        self
    }

    pub fn mount_calls(&self) -> usize {
        self.mounts.load(Ordering::SeqCst)
    }

    /// Wait until the serve call has signalled ready
    pub async fn wait_mounted(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.mounted_rx.recv_async())
            .await
            .expect("mount never became ready")
            .expect("host dropped");
    }

    /// Tear the mount down without going through the session
    pub fn external_unmount(&self) {
        self.marks.push("external_unmount");
        let _ = self.release_tx.send(());
    }
}

impl MountHost for ScriptedHost {
    fn mount(
        &self,
        target: &Path,
        _options: &[MountArg],
        ready: ReadyNotifier,
    ) -> Result<(), HostError> {
        self.mounts.fetch_add(1, Ordering::SeqCst);
        self.marks.push("mount");

        match self.script {
            Script::ExitBeforeReady => return Ok(()),
            Script::RefuseBeforeReady => return Err(HostError::Refused),
            _ => {}
        }

        ready.notify();
        if let Some(delay) = self.owns_target {
            std::thread::sleep(delay);
            std::fs::create_dir_all(target)?;
        }
        let _ = self.mounted_tx.send(());

        let released = self.release_rx.recv();
        if self.owns_target.is_some() {
            std::fs::remove_dir_all(target)?;
        }
        self.marks.push("serve_returned");

        match (released, self.script) {
            (Err(_), _) => Err(HostError::Aborted),
            (Ok(()), Script::ErrorAfterRelease) => Err(HostError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device went away",
            ))),
            (Ok(()), _) => Ok(()),
        }
    }

    fn unmount(&self) -> Result<(), HostError> {
        self.marks.push("host_unmount");
        if self.script == Script::RefuseUnmount {
            return Err(HostError::Refused);
        }
        self.release_tx.send(()).map_err(|_| HostError::NotMounted)
    }
}

pub struct TestBackend {
    pub fs: Arc<CountingFs>,
    pub host: Arc<ScriptedHost>,
    pub attaches: AtomicUsize,
}

impl TestBackend {
    pub fn new(script: Script) -> Self {
        let marks = Marks::default();
        Self::with_host(ScriptedHost::new(script, marks.clone()), marks)
    }

    pub fn with_host(host: ScriptedHost, marks: Marks) -> Self {
        Self {
            fs: Arc::new(CountingFs::new(marks)),
            host: Arc::new(host),
            attaches: AtomicUsize::new(0),
        }
    }

    pub fn marks(&self) -> &Marks {
        &self.fs.marks
    }
}

impl MountBackend for TestBackend {
    fn attach(&self, _source: &Arc<dyn Source>) -> Attachment {
        self.attaches.fetch_add(1, Ordering::SeqCst);
        Attachment {
            fs: self.fs.clone(),
            host: self.host.clone(),
        }
    }
}

/// What a [`RecordingNotifier`] answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listener {
    /// Accept every status
    Present,
    /// Behave as if no service manager is listening
    Absent,
    /// Fail to deliver this status
    FailOn(ServiceStatus),
}

pub struct RecordingNotifier {
    listener: Listener,
    sent: Mutex<Vec<ServiceStatus>>,
}

impl RecordingNotifier {
    pub fn new(listener: Listener) -> Arc<Self> {
        Arc::new(Self {
            listener,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<ServiceStatus> {
        self.sent.lock().clone()
    }
}

impl ServiceNotifier for RecordingNotifier {
    fn notify(&self, status: ServiceStatus) -> Result<(), NotifyError> {
        match self.listener {
            Listener::Absent => Err(NotifyError::NoSocket),
            Listener::FailOn(failing) if failing == status => Err(NotifyError::Io(
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "listener gone"),
            )),
            _ => {
                self.sent.lock().push(status);
                Ok(())
            }
        }
    }
}

/// A directory that exists, to mount on
pub fn mount_dir() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("mnt");
    std::fs::create_dir(&target).unwrap();
    (dir, target)
}

/// Poll `check` until it holds or five seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
