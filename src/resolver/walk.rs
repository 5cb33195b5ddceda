use anyhow::Result;
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{FileListResolver, PackRules};
use crate::package::Manifest;
use crate::runtime::{FileKind, Runtime, reduce_paths};

/// Entries found under one directory.
#[derive(Debug, Default)]
struct Walked {
    entries: Vec<PathBuf>,
    /// Nothing below the directory was excluded or left unselected
    complete: bool,
}

/// Resolves the file list by walking the package tree.
pub struct GlobResolver<R: Runtime> {
    runtime: Arc<R>,
}

impl<R: Runtime> GlobResolver<R> {
    pub fn new(runtime: Arc<R>) -> Self {
        Self { runtime }
    }

    fn walk<'a>(
        &'a self,
        root: &'a Path,
        rel: PathBuf,
        rules: &'a PackRules,
    ) -> BoxFuture<'a, Result<Walked>> {
        async move {
            let mut walked = Walked {
                entries: Vec::new(),
                complete: true,
            };

            for child in self.runtime.read_dir(&root.join(&rel)).await? {
                let Some(name) = child.file_name() else {
                    continue;
                };
                let child_rel = rel.join(name);
                if rules.is_excluded(&child_rel) {
                    walked.complete = false;
                    continue;
                }

                let kind = match self.runtime.lstat(&child).await {
                    // symlinked directories are taken as a unit and never walked
                    Ok(FileKind::Symlink) => match self.runtime.stat(&child).await {
                        Ok(kind) => kind,
                        Err(e) => {
                            debug!("Skipping dangling symlink {:?}: {}", child, e);
                            walked.complete = false;
                            continue;
                        }
                    },
                    Ok(FileKind::Dir) => {
                        let sub = self.walk(root, child_rel.clone(), rules).await?;
                        if sub.complete && rules.includes(&child_rel) {
                            if !sub.entries.is_empty() {
                                walked.entries.push(child_rel);
                            }
                        } else {
                            walked.complete = false;
                            walked.entries.extend(sub.entries);
                        }
                        continue;
                    }
                    Ok(kind) => kind,
                    Err(e) => {
                        debug!("Skipping {:?}: {}", child, e);
                        walked.complete = false;
                        continue;
                    }
                };

                if matches!(kind, FileKind::File | FileKind::Dir) && rules.includes(&child_rel) {
                    walked.entries.push(child_rel);
                } else {
                    walked.complete = false;
                }
            }
            Ok(walked)
        }
        .boxed()
    }
}

#[async_trait]
impl<R: Runtime + 'static> FileListResolver for GlobResolver<R> {
    #[tracing::instrument(skip(self, manifest))]
    async fn resolve(&self, root: &Path, manifest: &Manifest) -> Result<Vec<PathBuf>> {
        let rules = PackRules::new(manifest);
        let walked = self.walk(root, PathBuf::new(), &rules).await?;
        let files = reduce_paths(walked.entries).roots;
        debug!("Resolved {} entries in {:?}", files.len(), root);
        Ok(files)
    }
}
