//! Top-level link operation.
//!
//! [`Linker`] registers entries, performs the initial pass (copy, or removal
//! for `unlink` entries) and hands the registry over to the watch engine.

use anyhow::{Result, bail};
use indexmap::IndexSet;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::Config;
use crate::link::{Entry, LinkId, LinkRegistry};
use crate::resolver::FileListResolver;
use crate::runtime::Runtime;
use crate::sync::{SyncKind, SyncRunner};
use crate::watch::{FsWatcher, WatchConfig, WatchEngine, WatchEvent};

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub packages: usize,
    pub links: usize,
    pub errors: usize,
    pub warnings: usize,
}

pub struct Linker<R: Runtime> {
    runtime: Arc<R>,
    registry: LinkRegistry,
    runner: SyncRunner<R>,
    resolver: Box<dyn FileListResolver>,
}

impl<R: Runtime + 'static> Linker<R> {
    pub fn new(config: Config<R>) -> Self {
        Self {
            runner: SyncRunner::new(config.runtime.clone(), config.options.dry_run),
            runtime: config.runtime,
            registry: LinkRegistry::new(),
            resolver: config.resolver,
        }
    }

    pub fn registry(&self) -> &LinkRegistry {
        &self.registry
    }

    /// Register `entries`. Failing entries are reported and counted; the call
    /// only fails when no link could be registered.
    #[tracing::instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn add(&mut self, entries: Vec<Entry>) -> Result<Vec<LinkId>> {
        let sources: Vec<PathBuf> = entries.iter().map(|e| e.src.clone()).collect();
        let results = self.registry.create_all(self.runtime.as_ref(), entries).await;

        let mut ids = IndexSet::new();
        for (src, result) in sources.iter().zip(results) {
            match result {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(e) => {
                    error!("{}: {:#}", self.runner.display(src), e);
                    self.runner.record_error();
                }
            }
        }

        let stats = self.registry.stats();
        info!("Loaded {} packages, {} links", stats.packages, stats.links);
        if ids.is_empty() {
            bail!("No links to process");
        }
        Ok(ids.into_iter().collect())
    }

    /// Initial pass: copy every allowed link, or remove it when flagged `unlink`.
    /// Failures are logged and counted per link.
    #[tracing::instrument(skip(self, ids))]
    pub async fn link(&mut self, ids: &[LinkId]) {
        for id in ids {
            let link = self.registry.link(*id).clone();
            let allowed = self.runner.check_link(
                self.registry.package(link.src),
                self.registry.package(link.dest),
                &link,
                false,
            );
            if !allowed {
                continue;
            }

            let package = self.registry.package_mut(link.src);
            let files = match package.load_files(self.resolver.as_ref()).await {
                Ok(files) => files.to_vec(),
                Err(e) => {
                    error!("{}: {:#}", package.display_name(), e);
                    self.runner.record_error();
                    continue;
                }
            };

            let kind = if link.flags.unlink {
                SyncKind::Remove
            } else {
                SyncKind::Copy
            };
            self.runner
                .run(kind, &link, self.registry.package(link.src), &files)
                .await;
        }
    }

    /// Roots of the source packages that are watched.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        self.registry
            .source_packages()
            .into_iter()
            .filter(|id| self.registry.links_from(*id).any(|link| !link.flags.unlink))
            .map(|id| self.registry.package(id).path().to_path_buf())
            .collect()
    }

    /// Process `events` until the stream ends.
    pub async fn watch(&mut self, events: UnboundedReceiver<WatchEvent>, config: &WatchConfig) {
        WatchEngine::new(&mut self.registry, &self.runner, self.resolver.as_ref())
            .run(events, config)
            .await;
    }

    pub fn stats(&self) -> Summary {
        let stats = self.registry.stats();
        Summary {
            packages: stats.packages,
            links: stats.links,
            errors: self.runner.errors(),
            warnings: self.runner.warnings(),
        }
    }
}

/// Register `entries`, run the initial pass and watch if requested.
pub async fn run<R: Runtime + 'static>(config: Config<R>, entries: Vec<Entry>) -> Result<Summary> {
    let options = config.options.clone();
    let mut linker = Linker::new(config);
    let ids = linker.add(entries).await?;

    if !options.watch_only {
        linker.link(&ids).await;
    }

    if options.watches() {
        let roots = linker.watch_roots();
        if roots.is_empty() {
            warn!("No source packages to watch");
        } else {
            let (watcher, events) = FsWatcher::start(&roots)?;
            let watcher = Arc::new(watcher);
            let closer = watcher.clone();
            let interrupt = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Stopping watch");
                    closer.close();
                }
            });

            info!("Watching {} packages for changes", roots.len());
            linker
                .watch(
                    events,
                    &WatchConfig {
                        debounce: options.debounce,
                    },
                )
                .await;
            interrupt.abort();
            watcher.close();
        }
    }

    let summary = linker.stats();
    info!(
        "Done: {} packages, {} links, {} errors, {} warnings",
        summary.packages, summary.links, summary.errors, summary.warnings
    );
    Ok(summary)
}
