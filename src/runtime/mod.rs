//! Runtime abstraction for filesystem operations.
//!
//! Every filesystem access of the crate goes through the [`Runtime`] trait so
//! that package resolution and synchronization can be exercised against a
//! mock in unit tests.
//!
//! # Structure
//!
//! - `fs` - File system operations backed by `tokio::fs`
//! - `path` - Path utility functions (normalize, is_path_under, reduce_paths)

mod fs;
pub mod path;

use anyhow::Result;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

pub use path::{
    ReducedPaths, display_path, is_path_under, normalize_path, reduce_paths, resolve_relative_path,
};

/// Kind of a filesystem entry as reported by `stat`/`lstat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Dir,
    Symlink,
    Other,
}

impl FileKind {
    pub fn is_dir(&self) -> bool {
        matches!(self, FileKind::Dir)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Runtime: Send + Sync {
    async fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Kind of the entry at `path`, following symlinks.
    async fn stat(&self, path: &Path) -> Result<FileKind>;

    /// Kind of the entry at `path` itself (a symlink reports `Symlink`).
    async fn lstat(&self, path: &Path) -> Result<FileKind>;

    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Copy file contents. Symlinked sources are copied as regular files.
    async fn copy(&self, from: &Path, to: &Path) -> Result<u64>;

    async fn remove_file(&self, path: &Path) -> Result<()>;
    async fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Canonicalize a path by resolving all symlinks and returning the canonical absolute path.
    async fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

    fn current_dir(&self) -> Result<PathBuf>;
}

pub struct RealRuntime;

#[async_trait]
impl Runtime for RealRuntime {
    async fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path).await
    }

    async fn stat(&self, path: &Path) -> Result<FileKind> {
        self.stat_impl(path).await
    }

    async fn lstat(&self, path: &Path) -> Result<FileKind> {
        self.lstat_impl(path).await
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        self.copy_impl(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.remove_dir_all_impl(path).await
    }

    async fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        self.canonicalize_impl(path).await
    }

    fn current_dir(&self) -> Result<PathBuf> {
        self.current_dir_impl()
    }
}

/// Returns true if any error in the chain is an I/O "not found" error.
pub fn is_not_found(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
    })
}
