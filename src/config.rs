use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::link::{Entry, LinkFlags};
use crate::resolver::{FileListResolver, GlobResolver, NpmPackResolver};
use crate::runtime::{Runtime, resolve_relative_path};

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Log operations without touching the filesystem
    pub dry_run: bool,
    /// Keep watching sources after the initial pass
    pub watch: bool,
    /// Skip the initial pass and only watch
    pub watch_only: bool,
    /// Flags applied to every entry
    pub flags: LinkFlags,
    pub debounce: Duration,
    /// Resolve file lists with `npm pack` instead of walking the tree
    pub npm_pack: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dry_run: false,
            watch: false,
            watch_only: false,
            flags: LinkFlags::default(),
            debounce: Duration::from_millis(200),
            npm_pack: false,
        }
    }
}

impl Options {
    pub fn watches(&self) -> bool {
        self.watch || self.watch_only
    }
}

pub struct Config<R: Runtime> {
    pub runtime: Arc<R>,
    pub resolver: Box<dyn FileListResolver>,
    pub options: Options,
}

impl<R: Runtime + 'static> Config<R> {
    pub fn new(runtime: Arc<R>, options: Options) -> Self {
        let resolver: Box<dyn FileListResolver> = if options.npm_pack {
            Box::new(NpmPackResolver::default())
        } else {
            Box::new(GlobResolver::new(runtime.clone()))
        };
        Self {
            runtime,
            resolver,
            options,
        }
    }
}

/// One entry per `(source, destination)` pair, paths resolved against `cwd`.
/// Without destinations, `cwd` itself is the destination.
pub fn build_entries(cwd: &Path, sources: &[PathBuf], dests: &[PathBuf], flags: LinkFlags) -> Vec<Entry> {
    let dests: Vec<PathBuf> = if dests.is_empty() {
        vec![cwd.to_path_buf()]
    } else {
        dests.iter().map(|d| resolve_relative_path(cwd, d)).collect()
    };

    sources
        .iter()
        .flat_map(|src| {
            let src = resolve_relative_path(cwd, src);
            dests
                .iter()
                .map(move |dest| Entry::new(src.clone(), dest.clone()).with_flags(flags))
        })
        .collect()
}
