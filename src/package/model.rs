use anyhow::Result;
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{Manifest, PACKAGE_JSON, PackageError};
use crate::resolver::{FileListResolver, PackRules};
use crate::runtime::{FileKind, Runtime, is_path_under};

/// One publishable entry of a package. `relative` may name a directory that is
/// published as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageFile {
    pub path: PathBuf,
    pub relative: PathBuf,
}

impl PackageFile {
    pub fn is_manifest(&self) -> bool {
        self.relative == Path::new(PACKAGE_JSON)
    }
}

/// A loaded package directory. Only obtainable through [`Package::load`].
#[derive(Debug, Clone)]
pub struct Package {
    path: PathBuf,
    manifest: Manifest,
    rules: PackRules,
    display_name: Option<String>,
    files: Option<Vec<PackageFile>>,
    index: HashMap<PathBuf, usize>,
}

async fn read_manifest<R: Runtime + ?Sized>(runtime: &R, root: &Path) -> Result<Manifest, PackageError> {
    let path = root.join(PACKAGE_JSON);
    let manifest_error = |reason: String| PackageError::Manifest {
        path: path.clone(),
        reason,
    };

    match runtime.stat(&path).await {
        Ok(FileKind::File) => {}
        Ok(_) => return Err(manifest_error("not a file".into())),
        Err(_) => return Err(manifest_error("file not found".into())),
    }
    let content = runtime
        .read_to_string(&path)
        .await
        .map_err(|e| manifest_error(format!("cannot read file: {}", e)))?;
    Manifest::parse(&content, &path)
}

fn build_index(root: &Path, relative: Vec<PathBuf>) -> (Vec<PackageFile>, HashMap<PathBuf, usize>) {
    let mut files = Vec::with_capacity(relative.len());
    let mut index = HashMap::with_capacity(relative.len());
    for rel in relative {
        let path = root.join(&rel);
        if index.contains_key(&path) {
            continue;
        }
        index.insert(path.clone(), files.len());
        files.push(PackageFile {
            path,
            relative: rel,
        });
    }
    (files, index)
}

impl Package {
    /// Load the package at `path` (expected canonical). The file list is resolved lazily.
    #[tracing::instrument(skip(runtime))]
    pub async fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self, PackageError> {
        match runtime.stat(path).await {
            Ok(kind) if kind.is_dir() => {}
            Ok(_) => {
                return Err(PackageError::Path {
                    path: path.to_path_buf(),
                    reason: "not a directory".into(),
                });
            }
            Err(_) => {
                return Err(PackageError::Path {
                    path: path.to_path_buf(),
                    reason: "no such directory".into(),
                });
            }
        }

        let manifest = read_manifest(runtime, path).await?;
        debug!("Loaded package {} from {:?}", manifest.name, path);
        Ok(Package {
            path: path.to_path_buf(),
            rules: PackRules::new(&manifest),
            manifest,
            display_name: None,
            files: None,
            index: HashMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn rules(&self) -> &PackRules {
        &self.rules
    }

    /// Name used in log output, `name+N` when another package shares the name.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.manifest.name)
    }

    pub(crate) fn set_display_name(&mut self, display_name: Option<String>) {
        self.display_name = display_name;
    }

    /// The cached file list, `None` until first resolved.
    pub fn files(&self) -> Option<&[PackageFile]> {
        self.files.as_deref()
    }

    /// Resolve the file list unless it is already cached.
    pub async fn load_files(&mut self, resolver: &dyn FileListResolver) -> Result<&[PackageFile]> {
        if self.files.is_none() {
            self.refresh_files(resolver).await?;
        }
        Ok(self.files.as_deref().unwrap_or_default())
    }

    /// Re-resolve the file list, replacing the cached one.
    #[tracing::instrument(skip(self, resolver), fields(package = %self.display_name()))]
    pub async fn refresh_files(&mut self, resolver: &dyn FileListResolver) -> Result<()> {
        let relative = resolver.resolve(&self.path, &self.manifest).await?;
        let (files, index) = build_index(&self.path, relative);
        self.files = Some(files);
        self.index = index;
        Ok(())
    }

    /// Look up `path` in the cached index. A path under a directory entry
    /// resolves to that directory's subtree. Never rescans.
    pub fn get_file(&self, path: &Path) -> Option<PackageFile> {
        let files = self.files.as_ref()?;
        if let Some(&i) = self.index.get(path) {
            return files.get(i).cloned();
        }

        let relative = path.strip_prefix(&self.path).ok()?;
        if relative.as_os_str().is_empty() || self.rules.is_excluded(relative) {
            return None;
        }
        path.ancestors()
            .skip(1)
            .take_while(|ancestor| ancestor.starts_with(&self.path) && *ancestor != self.path)
            .any(|ancestor| self.index.contains_key(ancestor))
            .then(|| PackageFile {
                path: path.to_path_buf(),
                relative: relative.to_path_buf(),
            })
    }

    /// True if `path` could belong to this package's published files.
    pub fn is_path_in_package(&self, path: &Path) -> bool {
        if self.index.contains_key(path) {
            return true;
        }
        if !is_path_under(path, &self.path) {
            return false;
        }
        match path.strip_prefix(&self.path) {
            Ok(relative) if !relative.as_os_str().is_empty() => self.rules.selects(relative),
            _ => false,
        }
    }

    /// Re-read the manifest and file list. Fails with [`PackageError::Identity`]
    /// if the name changed; on any failure the package is left untouched.
    #[tracing::instrument(skip(self, runtime, resolver), fields(package = %self.display_name()))]
    pub async fn reload<R: Runtime + ?Sized>(
        &mut self,
        runtime: &R,
        resolver: &dyn FileListResolver,
    ) -> Result<()> {
        let manifest = read_manifest(runtime, &self.path).await?;
        if manifest.name != self.manifest.name {
            return Err(PackageError::Identity {
                path: self.path.clone(),
                previous: self.manifest.name.clone(),
                current: manifest.name,
            }
            .into());
        }

        let relative = resolver.resolve(&self.path, &manifest).await?;
        let (files, index) = build_index(&self.path, relative);
        self.rules = PackRules::new(&manifest);
        self.manifest = manifest;
        self.files = Some(files);
        self.index = index;
        Ok(())
    }
}
