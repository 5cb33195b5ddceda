//! Synchronization of package files into install locations.

mod diff;
mod runner;

pub use diff::{FileDiff, diff_files};
pub use runner::{FileOutcome, FileResult, RunReport, SyncKind, SyncRunner};

use crate::link::{LinkId, PackageId};
use crate::package::PackageFile;

/// One unit of work for the run-queue.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    /// Copy or remove `files` through `link`
    Run {
        kind: SyncKind,
        link: LinkId,
        files: Vec<PackageFile>,
    },
    /// Reload `package`, then sync what changed to each of its links.
    /// `also_copy` holds other files changed in the same batch.
    Reinit {
        package: PackageId,
        also_copy: Vec<PackageFile>,
    },
}
