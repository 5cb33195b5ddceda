//! File system operations (read, stat, copy, remove) on top of `tokio::fs`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{FileKind, RealRuntime};

fn kind_of(file_type: std::fs::FileType) -> FileKind {
    if file_type.is_symlink() {
        FileKind::Symlink
    } else if file_type.is_dir() {
        FileKind::Dir
    } else if file_type.is_file() {
        FileKind::File
    } else {
        FileKind::Other
    }
}

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) async fn read_to_string_impl(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) async fn stat_impl(&self, path: &Path) -> Result<FileKind> {
        let metadata = fs::metadata(path)
            .await
            .with_context(|| format!("Failed to stat {:?}", path))?;
        Ok(kind_of(metadata.file_type()))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) async fn lstat_impl(&self, path: &Path) -> Result<FileKind> {
        let metadata = fs::symlink_metadata(path)
            .await
            .with_context(|| format!("Failed to lstat {:?}", path))?;
        Ok(kind_of(metadata.file_type()))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) async fn read_dir_impl(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(path)
            .await
            .with_context(|| format!("Failed to read directory {:?}", path))?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        paths.sort();
        Ok(paths)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) async fn create_dir_all_impl(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .await
            .context("Failed to create directory")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) async fn copy_impl(&self, from: &Path, to: &Path) -> Result<u64> {
        // a symlink left at the destination would make fs::copy write through it
        if let Ok(metadata) = fs::symlink_metadata(to).await
            && metadata.file_type().is_symlink()
        {
            fs::remove_file(to)
                .await
                .context("Failed to remove symlink at destination")?;
        }
        fs::copy(from, to).await.context("Failed to copy file")
    }

    #[tracing::instrument(skip(self))]
    pub(crate) async fn remove_file_impl(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)
            .await
            .context("Failed to remove file")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) async fn remove_dir_all_impl(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path)
            .await
            .context("Failed to remove directory and its contents")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) async fn canonicalize_impl(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path)
            .await
            .with_context(|| format!("Failed to canonicalize {:?}", path))
    }

    pub(crate) fn current_dir_impl(&self) -> Result<PathBuf> {
        std::env::current_dir().context("Failed to get current directory")
    }
}
