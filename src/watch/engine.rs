use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

use super::{WatchEvent, debounce};
use crate::link::{LinkId, LinkRegistry, PackageId};
use crate::package::{PACKAGE_JSON, PackageFile};
use crate::resolver::FileListResolver;
use crate::runtime::{Runtime, reduce_paths};
use crate::sync::{SyncAction, SyncKind, SyncRunner, diff_files};

#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    pub debounce: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(200),
        }
    }
}

/// Keep only files not covered by another file of the list.
fn collapse(files: Vec<PackageFile>) -> Vec<PackageFile> {
    let reduced = reduce_paths(files.iter().map(|f| f.path.clone()));
    let mut seen = IndexSet::new();
    files
        .into_iter()
        .filter(|f| reduced.is_root(&f.path) && seen.insert(f.path.clone()))
        .collect()
}

/// Drop events whose path lies under another event of the same class.
fn reduce_events(batch: Vec<WatchEvent>) -> Vec<WatchEvent> {
    let (removes, adds): (Vec<_>, Vec<_>) = batch.iter().partition(|e| e.kind.is_remove());
    let removes = reduce_paths(removes.iter().map(|e| e.path.clone()));
    let adds = reduce_paths(adds.iter().map(|e| e.path.clone()));
    batch
        .into_iter()
        .filter(|e| {
            if e.kind.is_remove() {
                removes.is_root(&e.path)
            } else {
                adds.is_root(&e.path)
            }
        })
        .collect()
}

fn relative_file(root: &Path, path: &Path) -> Option<PackageFile> {
    let relative = path.strip_prefix(root).ok()?;
    Some(PackageFile {
        path: path.to_path_buf(),
        relative: relative.to_path_buf(),
    })
}

/// Turns batches of file events into sync actions and runs them in order.
pub struct WatchEngine<'a, R: Runtime> {
    registry: &'a mut LinkRegistry,
    runner: &'a SyncRunner<R>,
    resolver: &'a dyn FileListResolver,
}

impl<'a, R: Runtime> WatchEngine<'a, R> {
    pub fn new(
        registry: &'a mut LinkRegistry,
        runner: &'a SyncRunner<R>,
        resolver: &'a dyn FileListResolver,
    ) -> Self {
        Self {
            registry,
            runner,
            resolver,
        }
    }

    /// Links of `package` that take part in watching.
    fn active_links(&self, package: PackageId) -> Vec<LinkId> {
        self.registry
            .links_from(package)
            .filter(|link| !link.flags.unlink)
            .map(|link| link.id)
            .collect()
    }

    /// Source packages with at least one watched link.
    pub fn active_sources(&self) -> Vec<PackageId> {
        self.registry
            .source_packages()
            .into_iter()
            .filter(|id| !self.active_links(*id).is_empty())
            .collect()
    }

    /// Debounce `events` and process every batch until the stream ends.
    pub async fn run(&mut self, events: UnboundedReceiver<WatchEvent>, config: &WatchConfig) {
        let (batch_tx, mut batch_rx) = unbounded_channel();
        let debouncer = debounce(events, batch_tx, config.debounce);
        let executor = async {
            while let Some(batch) = batch_rx.recv().await {
                let actions = self.plan(batch).await;
                self.execute(actions).await;
            }
        };
        tokio::join!(debouncer, executor);
    }

    /// Pair each event with the source packages that contain its path.
    ///
    /// Reduction runs separately per package, so an event only collapses into a
    /// directory event that the same package publishes.
    fn owned_events(
        &self,
        sources: &[PackageId],
        batch: Vec<WatchEvent>,
    ) -> Vec<(WatchEvent, Vec<PackageId>)> {
        let mut owners: HashMap<PathBuf, Vec<PackageId>> = HashMap::new();
        for id in sources {
            let package = self.registry.package(*id);
            let inside = batch
                .iter()
                .filter(|e| package.is_path_in_package(&e.path))
                .cloned()
                .collect();
            for event in reduce_events(inside) {
                owners.entry(event.path).or_default().push(*id);
            }
        }

        batch
            .into_iter()
            .filter_map(|event| match owners.remove(&event.path) {
                Some(candidates) => Some((event, candidates)),
                None => {
                    debug!("Ignoring {:?} {:?}", event.kind, event.path);
                    None
                }
            })
            .collect()
    }

    /// Build the actions for one batch of events.
    #[tracing::instrument(skip(self, batch), fields(events = batch.len()))]
    pub async fn plan(&mut self, batch: Vec<WatchEvent>) -> Vec<SyncAction> {
        let sources = self.active_sources();

        // (package, kind) -> files, in first-seen order
        let mut groups: IndexMap<(PackageId, SyncKind), Vec<PackageFile>> = IndexMap::new();
        let mut misses: Vec<(WatchEvent, Vec<PackageId>)> = Vec::new();

        for (event, candidates) in self.owned_events(&sources, batch) {
            let kind = if event.kind.is_remove() {
                SyncKind::Remove
            } else {
                SyncKind::Copy
            };

            if event.kind.is_dir() {
                for id in candidates {
                    let root = self.registry.package(id).path();
                    if let Some(file) = relative_file(root, &event.path) {
                        groups.entry((id, kind)).or_default().push(file);
                    }
                }
                continue;
            }

            match self.find_owner(&candidates, &event.path) {
                Some((id, file)) => groups.entry((id, kind)).or_default().push(file),
                None => misses.push((event, candidates)),
            }
        }

        if !misses.is_empty() {
            let stale: IndexSet<PackageId> = misses
                .iter()
                .flat_map(|(_, candidates)| candidates.iter().copied())
                .collect();
            for id in stale {
                let package = self.registry.package_mut(id);
                if let Err(e) = package.refresh_files(self.resolver).await {
                    warn!("Failed to rescan {}: {:#}", package.display_name(), e);
                    self.runner.record_error();
                }
            }
            for (event, candidates) in misses {
                let kind = if event.kind.is_remove() {
                    SyncKind::Remove
                } else {
                    SyncKind::Copy
                };
                match self.find_owner(&candidates, &event.path) {
                    Some((id, file)) => groups.entry((id, kind)).or_default().push(file),
                    None => debug!("{:?} is not a published file", event.path),
                }
            }
        }

        let mut actions = Vec::new();
        for ((package, kind), files) in groups {
            let files = collapse(files);
            if kind == SyncKind::Copy && files.iter().any(PackageFile::is_manifest) {
                actions.push(SyncAction::Reinit {
                    package,
                    also_copy: files.into_iter().filter(|f| !f.is_manifest()).collect(),
                });
                continue;
            }
            for link in self.active_links(package) {
                actions.push(SyncAction::Run {
                    kind,
                    link,
                    files: files.clone(),
                });
            }
        }
        actions
    }

    fn find_owner(&self, candidates: &[PackageId], path: &Path) -> Option<(PackageId, PackageFile)> {
        candidates
            .iter()
            .find_map(|id| self.registry.package(*id).get_file(path).map(|file| (*id, file)))
    }

    /// Run `actions` one at a time. Follow-ups of a reinit run right after it.
    pub async fn execute(&mut self, actions: Vec<SyncAction>) {
        let mut queue: VecDeque<SyncAction> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                SyncAction::Run { kind, link, files } => {
                    let link = self.registry.link(link).clone();
                    let src = self.registry.package(link.src);
                    let dest = self.registry.package(link.dest);
                    if !self.runner.check_link(src, dest, &link, true) {
                        continue;
                    }
                    self.runner.run(kind, &link, src, &files).await;
                }
                SyncAction::Reinit { package, also_copy } => {
                    let follow_ups = self.reinit(package, also_copy).await;
                    for action in follow_ups.into_iter().rev() {
                        queue.push_front(action);
                    }
                }
            }
        }
    }

    async fn reinit(&mut self, id: PackageId, also_copy: Vec<PackageFile>) -> Vec<SyncAction> {
        let package = self.registry.package_mut(id);
        let previous = package.files().map(<[PackageFile]>::to_vec).unwrap_or_default();

        let (removed, copy) = match self.runner.reinit(package, self.resolver).await {
            Ok(()) => {
                let current = package.files().unwrap_or_default();
                let diff = diff_files(&previous, current);
                let manifest = current
                    .iter()
                    .find(|f| f.is_manifest())
                    .cloned()
                    .or_else(|| relative_file(package.path(), &package.path().join(PACKAGE_JSON)));
                debug!(
                    "{}: {} added, {} removed",
                    package.display_name(),
                    diff.added.len(),
                    diff.removed.len()
                );

                let mut copy = diff.added;
                copy.extend(manifest);
                copy.extend(
                    also_copy
                        .into_iter()
                        .filter(|f| package.get_file(&f.path).is_some()),
                );
                (diff.removed, collapse(copy))
            }
            Err(_) => (Vec::new(), collapse(also_copy)),
        };

        let mut follow_ups = Vec::new();
        for link in self.active_links(id) {
            if !removed.is_empty() {
                follow_ups.push(SyncAction::Run {
                    kind: SyncKind::Remove,
                    link,
                    files: removed.clone(),
                });
            }
            if !copy.is_empty() {
                follow_ups.push(SyncAction::Run {
                    kind: SyncKind::Copy,
                    link,
                    files: copy.clone(),
                });
            }
        }
        follow_ups
    }
}
