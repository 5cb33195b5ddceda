//! Links between source packages and destination projects.

mod registry;

use std::fmt;
use std::path::{Path, PathBuf};

pub use registry::{LinkRegistry, RegistryStats};

/// Per-entry behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkFlags {
    /// Link even if the source is not a dependency of the destination
    pub force: bool,
    /// Silently skip links that are not dependencies
    pub skip: bool,
    /// Remove the installed files instead of copying them
    pub unlink: bool,
}

/// A requested `src -> dest` pairing, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub src: PathBuf,
    pub dest: PathBuf,
    pub flags: LinkFlags,
}

impl Entry {
    pub fn new(src: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
            flags: LinkFlags::default(),
        }
    }

    pub fn with_flags(mut self, flags: LinkFlags) -> Self {
        self.flags = flags;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub(crate) usize);

/// A registered link. `install_path` is `<dest>/node_modules/<src name>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: LinkId,
    pub src: PackageId,
    pub dest: PackageId,
    pub flags: LinkFlags,
    install_path: PathBuf,
}

impl Link {
    pub fn install_path(&self) -> &Path {
        &self.install_path
    }

    /// Destination of a source file given by its path relative to the package root.
    pub fn dest_path(&self, relative: &Path) -> PathBuf {
        self.install_path.join(relative)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkError {
    SameDirectory { path: PathBuf },
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::SameDirectory { path } => {
                write!(f, "Cannot link to the same directory: {}", path.display())
            }
        }
    }
}

impl std::error::Error for LinkError {}
