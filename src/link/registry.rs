use anyhow::Result;
use futures_util::future::join_all;
use indexmap::IndexSet;
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{Entry, Link, LinkError, LinkId, PackageId};
use crate::package::{Package, PackageError};
use crate::runtime::{Runtime, normalize_path};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub packages: usize,
    pub links: usize,
}

/// Owns every loaded [`Package`] and the [`Link`]s between them.
///
/// Packages are keyed by canonical path and shared between links; at most one
/// link exists per `(src, dest)` pair.
#[derive(Debug, Default)]
pub struct LinkRegistry {
    packages: Vec<Package>,
    links: Vec<Link>,
    package_ids: HashMap<PathBuf, PackageId>,
    // entry paths as given, normalized, for lookups that skip the filesystem
    aliases: HashMap<PathBuf, PackageId>,
    link_ids: HashMap<PackageId, HashMap<PackageId, LinkId>>,
    name_counts: HashMap<String, usize>,
}

async fn canonical<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<PathBuf, PackageError> {
    runtime
        .canonicalize(path)
        .await
        .map_err(|_| PackageError::Path {
            path: path.to_path_buf(),
            reason: "no such directory".into(),
        })
}

async fn resolve_entry<R: Runtime + ?Sized>(runtime: &R, entry: &Entry) -> Result<(PathBuf, PathBuf)> {
    let src = canonical(runtime, &entry.src).await?;
    let dest = canonical(runtime, &entry.dest).await?;
    if src == dest {
        return Err(LinkError::SameDirectory { path: src }.into());
    }
    Ok((src, dest))
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing link for `entry`, matched without touching the filesystem.
    ///
    /// Paths match if they are canonical or if they were spelled the same way
    /// (after lexical normalization) by an entry that registered the package.
    pub fn get(&self, entry: &Entry) -> Option<LinkId> {
        let src = self.lookup(&entry.src)?;
        let dest = self.lookup(&entry.dest)?;
        self.link_ids.get(&src)?.get(&dest).copied()
    }

    fn lookup(&self, path: &Path) -> Option<PackageId> {
        let path = normalize_path(path);
        self.package_id(&path).or_else(|| self.aliases.get(&path).copied())
    }

    pub async fn create<R: Runtime + ?Sized>(&mut self, runtime: &R, entry: Entry) -> Result<LinkId> {
        self.create_all(runtime, vec![entry])
            .await
            .pop()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no link created")))
    }

    /// Register links for `entries`, one result per entry in order.
    ///
    /// Each package path not yet known is loaded exactly once, concurrently with
    /// the others. A failing entry does not affect the rest.
    #[tracing::instrument(skip(self, runtime, entries), fields(entries = entries.len()))]
    pub async fn create_all<R: Runtime + ?Sized>(
        &mut self,
        runtime: &R,
        entries: Vec<Entry>,
    ) -> Vec<Result<LinkId>> {
        let resolved = join_all(entries.iter().map(|entry| resolve_entry(runtime, entry))).await;

        let pending: IndexSet<PathBuf> = resolved
            .iter()
            .flatten()
            .flat_map(|(src, dest)| [src, dest])
            .filter(|path| !self.package_ids.contains_key(*path))
            .cloned()
            .collect();
        let loaded = join_all(pending.iter().map(|path| Package::load(runtime, path))).await;
        let mut loaded: HashMap<PathBuf, Result<Package, PackageError>> =
            pending.into_iter().zip(loaded).collect();

        resolved
            .into_iter()
            .zip(entries)
            .map(|(paths, entry)| -> Result<LinkId> {
                let (src, dest) = paths?;
                self.check_loaded(&src, &loaded)?;
                self.check_loaded(&dest, &loaded)?;
                let src = self.register(&src, &mut loaded)?;
                let dest = self.register(&dest, &mut loaded)?;
                self.aliases.insert(normalize_path(&entry.src), src);
                self.aliases.insert(normalize_path(&entry.dest), dest);
                Ok(self.insert_link(src, dest, entry))
            })
            .collect()
    }

    fn check_loaded(
        &self,
        path: &Path,
        loaded: &HashMap<PathBuf, Result<Package, PackageError>>,
    ) -> Result<(), PackageError> {
        match loaded.get(path) {
            Some(Err(e)) => Err(e.clone()),
            _ => Ok(()),
        }
    }

    fn register(
        &mut self,
        path: &Path,
        loaded: &mut HashMap<PathBuf, Result<Package, PackageError>>,
    ) -> Result<PackageId, PackageError> {
        if let Some(id) = self.package_ids.get(path) {
            return Ok(*id);
        }
        let mut package = match loaded.remove(path) {
            Some(Ok(package)) => package,
            Some(Err(e)) => {
                loaded.insert(path.to_path_buf(), Err(e.clone()));
                return Err(e);
            }
            None => {
                return Err(PackageError::Path {
                    path: path.to_path_buf(),
                    reason: "package was not loaded".into(),
                });
            }
        };

        let count = self.name_counts.entry(package.name().to_string()).or_insert(0);
        if *count > 0 {
            package.set_display_name(Some(format!("{}+{}", package.name(), count)));
        }
        *count += 1;

        let id = PackageId(self.packages.len());
        debug!("Registered package {} at {:?}", package.display_name(), path);
        self.packages.push(package);
        self.package_ids.insert(path.to_path_buf(), id);
        Ok(id)
    }

    fn insert_link(&mut self, src: PackageId, dest: PackageId, entry: Entry) -> LinkId {
        if let Some(id) = self.link_ids.get(&src).and_then(|by_dest| by_dest.get(&dest)) {
            return *id;
        }

        let id = LinkId(self.links.len());
        let install_path = self.packages[dest.0]
            .path()
            .join("node_modules")
            .join(self.packages[src.0].name());
        self.links.push(Link {
            id,
            src,
            dest,
            flags: entry.flags,
            install_path,
        });
        self.link_ids.entry(src).or_default().insert(dest, id);
        id
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            packages: self.packages.len(),
            links: self.links.len(),
        }
    }

    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.0]
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.0]
    }

    pub fn package_mut(&mut self, id: PackageId) -> &mut Package {
        &mut self.packages[id.0]
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn package_id(&self, path: &Path) -> Option<PackageId> {
        self.package_ids.get(path).copied()
    }

    /// Links whose source is `src`.
    pub fn links_from(&self, src: PackageId) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(move |link| link.src == src)
    }

    /// Distinct source packages, in registration order.
    pub fn source_packages(&self) -> Vec<PackageId> {
        let sources: IndexSet<PackageId> = self.links.iter().map(|link| link.src).collect();
        sources.into_iter().collect()
    }
}
