//! Publishable file list resolution.
//!
//! A [`FileListResolver`] turns a package root and its manifest into the list of
//! paths `npm pack` would publish, relative to the root. Directories whose whole
//! subtree is publishable are listed once instead of file by file.
//!
//! - `walk` - walks the tree and applies [`PackRules`] (default)
//! - `npm` - asks `npm pack --dry-run --json`
//! - `rules` - the compiled inclusion/exclusion rules

mod walk;
mod npm;
pub mod rules;

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::package::Manifest;

pub use walk::GlobResolver;
pub use npm::{NpmPackResolver, parse_pack_output};
pub use rules::{PackRules, is_always_excluded};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileListResolver: Send + Sync {
    /// Relative paths of the publishable entries under `root`.
    async fn resolve(&self, root: &Path, manifest: &Manifest) -> Result<Vec<PathBuf>>;
}
