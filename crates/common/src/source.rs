//! Backing sources a virtual filesystem is built on

use std::fmt;

/// An opaque handle to the storage a virtual filesystem exposes.
///
/// The mount lifecycle only needs enough of it to label the mount.
pub trait Source: fmt::Debug + Send + Sync {
    /// Display name of the backend (e.g. a remote or bucket name)
    fn name(&self) -> &str;

    /// Root identifier within the backend
    fn root(&self) -> &str;
}

/// Device label used for the mount: `name:root`
pub fn device_label(source: &dyn Source) -> String {
    format!("{}:{}", source.name(), source.root())
}

/// A source with fixed name and root.
///
/// Useful for collaborators that only need a label, and for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSource {
    name: String,
    root: String,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }
}

impl Source for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn root(&self) -> &str {
        &self.root
    }
}
