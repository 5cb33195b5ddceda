use anyhow::Result;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use log::{debug, error, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::link::Link;
use crate::package::{self, DependencyPolicyError, GuardVerdict, Package, PackageFile};
use crate::resolver::{FileListResolver, PackRules};
use crate::runtime::{FileKind, Runtime, display_path, is_not_found};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncKind {
    Copy,
    Remove,
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncKind::Copy => write!(f, "copy"),
            SyncKind::Remove => write!(f, "remove"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Done,
    /// Source (copy) or destination (remove) did not exist
    Missing,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileResult {
    pub file: PackageFile,
    pub dest: PathBuf,
    pub outcome: FileOutcome,
}

/// Per-file results of one [`SyncRunner::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub kind: SyncKind,
    pub results: Vec<FileResult>,
}

impl RunReport {
    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn done(&self) -> usize {
        self.count(|o| *o == FileOutcome::Done)
    }

    pub fn missing(&self) -> usize {
        self.count(|o| *o == FileOutcome::Missing)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed(_)))
    }
}

/// Copies and removes package files into install locations.
pub struct SyncRunner<R: Runtime> {
    runtime: Arc<R>,
    dry_run: bool,
    cwd: PathBuf,
    errors: AtomicUsize,
    warnings: AtomicUsize,
}

impl<R: Runtime> SyncRunner<R> {
    pub fn new(runtime: Arc<R>, dry_run: bool) -> Self {
        let cwd = runtime.current_dir().unwrap_or_default();
        Self {
            runtime,
            dry_run,
            cwd,
            errors: AtomicUsize::new(0),
            warnings: AtomicUsize::new(0),
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn warnings(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_warning(&self) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
    }

    /// Shorten `path` for log output.
    pub fn display(&self, path: &Path) -> String {
        display_path(&self.cwd, path)
    }

    /// Run the dependency gate for `src -> dest`. Unless `quiet`, a blocked link
    /// counts as an error and a forced one as a warning.
    pub fn check_link(&self, src: &Package, dest: &Package, link: &Link, quiet: bool) -> bool {
        let verdict = package::check_link(src, dest, link.flags);
        let policy = || DependencyPolicyError {
            src: src.display_name().to_string(),
            dest: dest.display_name().to_string(),
            forced: verdict == GuardVerdict::Forced,
        };
        match verdict {
            GuardVerdict::Dependency => {}
            GuardVerdict::Forced if !quiet && !link.flags.skip => {
                warn!("{}", policy());
                self.record_warning();
            }
            GuardVerdict::Blocked if !quiet => {
                error!("{}", policy());
                self.record_error();
            }
            GuardVerdict::Skipped | GuardVerdict::Forced | GuardVerdict::Blocked => {
                debug!("{} -> {}: {:?}", src.display_name(), dest.display_name(), verdict);
            }
        }
        verdict.proceeds()
    }

    /// Apply `kind` to every file of `src` through `link`. Files run concurrently;
    /// a failing file is logged and counted without stopping the others.
    #[tracing::instrument(skip(self, link, src, files), fields(package = %src.display_name(), files = files.len()))]
    pub async fn run(
        &self,
        kind: SyncKind,
        link: &Link,
        src: &Package,
        files: &[PackageFile],
    ) -> RunReport {
        let results = join_all(files.iter().map(|file| async move {
            let dest = link.dest_path(&file.relative);
            let outcome = self.run_file(kind, src.rules(), file, &dest).await;
            FileResult {
                file: file.clone(),
                dest,
                outcome,
            }
        }))
        .await;

        let report = RunReport { kind, results };
        if !files.is_empty() {
            info!(
                "{}{} {} of {} files: {} -> {}{}",
                if self.dry_run { "[dry-run] " } else { "" },
                match kind {
                    SyncKind::Copy => "Copied",
                    SyncKind::Remove => "Removed",
                },
                report.done(),
                files.len(),
                src.display_name(),
                self.display(link.install_path()),
                match report.missing() {
                    0 => String::new(),
                    n => format!(" ({} missing)", n),
                }
            );
        }
        report
    }

    async fn run_file(
        &self,
        kind: SyncKind,
        rules: &PackRules,
        file: &PackageFile,
        dest: &Path,
    ) -> FileOutcome {
        if self.dry_run {
            debug!("[dry-run] {} {}", kind, self.display(dest));
            return FileOutcome::Done;
        }

        let result = match kind {
            SyncKind::Copy => self.copy_entry(&file.path, dest, file.relative.clone(), rules).await,
            SyncKind::Remove => self.remove_entry(dest).await,
        };
        match result {
            Ok(()) => {
                debug!("{} {}", kind, self.display(dest));
                FileOutcome::Done
            }
            Err(e) if is_not_found(&e) => {
                debug!("{} {}: nothing to do, {}", kind, self.display(&file.path), e);
                FileOutcome::Missing
            }
            Err(e) => {
                error!("Failed to {} {}: {:#}", kind, self.display(dest), e);
                self.record_error();
                FileOutcome::Failed(format!("{:#}", e))
            }
        }
    }

    /// Copy `src` to `dest`, recursing into directories. Symlinks in the source
    /// are followed; whatever occupies `dest` with a different type is replaced.
    fn copy_entry<'a>(
        &'a self,
        src: &'a Path,
        dest: &'a Path,
        relative: PathBuf,
        rules: &'a PackRules,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let kind = self.runtime.stat(src).await?;
            let existing = self.runtime.lstat(dest).await.ok();

            if kind.is_dir() {
                match existing {
                    Some(FileKind::Dir) => {}
                    Some(_) => {
                        self.runtime.remove_file(dest).await?;
                        self.runtime.create_dir_all(dest).await?;
                    }
                    None => self.runtime.create_dir_all(dest).await?,
                }
                for child in self.runtime.read_dir(src).await? {
                    let Some(name) = child.file_name() else {
                        continue;
                    };
                    let child_rel = relative.join(name);
                    if rules.is_excluded(&child_rel) {
                        continue;
                    }
                    self.copy_entry(&child, &dest.join(name), child_rel, rules)
                        .await?;
                }
                return Ok(());
            }

            if let Some(parent) = dest.parent() {
                self.runtime.create_dir_all(parent).await?;
            }
            if existing == Some(FileKind::Dir) {
                self.runtime.remove_dir_all(dest).await?;
            }
            self.runtime.copy(src, dest).await?;
            Ok(())
        }
        .boxed()
    }

    async fn remove_entry(&self, dest: &Path) -> Result<()> {
        if self.runtime.lstat(dest).await?.is_dir() {
            self.runtime.remove_dir_all(dest).await
        } else {
            self.runtime.remove_file(dest).await
        }
    }

    /// Re-read the manifest and file list of `package`. Never syncs by itself.
    pub async fn reinit(&self, package: &mut Package, resolver: &dyn FileListResolver) -> Result<()> {
        match package.reload(self.runtime.as_ref(), resolver).await {
            Ok(()) => {
                info!("Reloaded {}", package.display_name());
                Ok(())
            }
            Err(e) => {
                error!("Failed to reload {}: {:#}", package.display_name(), e);
                self.record_error();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{Entry, LinkFlags, LinkRegistry};
    use crate::resolver::GlobResolver;
    use crate::runtime::{MockRuntime, RealRuntime};
    use crate::test_utils::{read_tree, write_files};
    use tempfile::tempdir;

    async fn setup(
        root: &Path,
        flags: LinkFlags,
    ) -> (LinkRegistry, Link, Vec<PackageFile>) {
        let mut registry = LinkRegistry::new();
        let id = registry
            .create(
                &RealRuntime,
                Entry::new(root.join("lib"), root.join("app")).with_flags(flags),
            )
            .await
            .unwrap();
        let link = registry.link(id).clone();
        let resolver = GlobResolver::new(Arc::new(RealRuntime));
        let files = registry
            .package_mut(link.src)
            .load_files(&resolver)
            .await
            .unwrap()
            .to_vec();
        (registry, link, files)
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        write_files(
            dir.path(),
            &[
                ("lib/package.json", r#"{"name":"lib","files":["dist"]}"#),
                ("lib/dist/a.js", "a"),
                ("lib/dist/sub/b.js", "b"),
                ("lib/src/a.ts", "ts"),
                ("app/package.json", r#"{"name":"app","dependencies":{"lib":"*"}}"#),
            ],
        );
        dir
    }

    #[test_log::test(tokio::test)]
    async fn test_copy_then_remove() {
        let dir = fixture();
        let root = dir.path().canonicalize().unwrap();
        let (registry, link, files) = setup(&root, LinkFlags::default()).await;
        let runner = SyncRunner::new(Arc::new(RealRuntime), false);

        let src = registry.package(link.src);
        assert!(runner.check_link(src, registry.package(link.dest), &link, false));
        let report = runner.run(SyncKind::Copy, &link, src, &files).await;
        assert_eq!(report.done(), 2);
        assert_eq!(
            read_tree(&root.join("app/node_modules/lib")),
            vec!["dist/a.js", "dist/sub/b.js", "package.json"]
        );

        let report = runner.run(SyncKind::Remove, &link, src, &files).await;
        assert_eq!(report.done(), 2);
        assert!(read_tree(&root.join("app/node_modules/lib")).is_empty());
        assert_eq!(runner.errors(), 0);
    }

    #[tokio::test]
    async fn test_missing_paths_are_not_errors() {
        let dir = fixture();
        let root = dir.path().canonicalize().unwrap();
        let (registry, link, _) = setup(&root, LinkFlags::default()).await;
        let runner = SyncRunner::new(Arc::new(RealRuntime), false);
        let ghost = vec![PackageFile {
            path: root.join("lib/dist/ghost.js"),
            relative: PathBuf::from("dist/ghost.js"),
        }];

        let src = registry.package(link.src);
        let report = runner.run(SyncKind::Copy, &link, src, &ghost).await;
        assert_eq!(report.missing(), 1);
        let report = runner.run(SyncKind::Remove, &link, src, &ghost).await;
        assert_eq!(report.missing(), 1);
        assert_eq!(runner.errors(), 0);
    }

    #[tokio::test]
    async fn test_copy_replaces_conflicting_types() {
        let dir = fixture();
        let root = dir.path().canonicalize().unwrap();
        let (registry, link, files) = setup(&root, LinkFlags::default()).await;
        // a file where a directory goes and a directory where a file goes
        write_files(
            &root,
            &[
                ("app/node_modules/lib/dist", "stale"),
                ("app/node_modules/lib/package.json/x", "stale"),
            ],
        );
        let runner = SyncRunner::new(Arc::new(RealRuntime), false);

        let report = runner
            .run(SyncKind::Copy, &link, registry.package(link.src), &files)
            .await;
        assert_eq!(report.failed(), 0);
        assert_eq!(
            read_tree(&root.join("app/node_modules/lib")),
            vec!["dist/a.js", "dist/sub/b.js", "package.json"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_copy_follows_source_symlinks() {
        let dir = fixture();
        let root = dir.path().canonicalize().unwrap();
        write_files(&root, &[("shared/c.js", "c")]);
        std::os::unix::fs::symlink(root.join("shared"), root.join("lib/dist/linked")).unwrap();
        let (registry, link, files) = setup(&root, LinkFlags::default()).await;
        let runner = SyncRunner::new(Arc::new(RealRuntime), false);

        runner
            .run(SyncKind::Copy, &link, registry.package(link.src), &files)
            .await;
        let copied = root.join("app/node_modules/lib/dist/linked");
        assert!(!std::fs::symlink_metadata(&copied).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_to_string(copied.join("c.js")).unwrap(), "c");
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let dir = fixture();
        let root = dir.path().canonicalize().unwrap();
        let (registry, link, files) = setup(&root, LinkFlags::default()).await;
        let runner = SyncRunner::new(Arc::new(RealRuntime), true);

        let report = runner
            .run(SyncKind::Copy, &link, registry.package(link.src), &files)
            .await;
        assert_eq!(report.done(), files.len());
        assert!(!root.join("app/node_modules").exists());
    }

    #[tokio::test]
    async fn test_failed_file_is_counted() {
        let mut runtime = MockRuntime::new();
        runtime.expect_current_dir().returning(|| Ok(PathBuf::from("/work")));
        runtime
            .expect_stat()
            .returning(|_| Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied).into()));
        runtime.expect_lstat().returning(|_| Ok(FileKind::File));

        let dir = fixture();
        let root = dir.path().canonicalize().unwrap();
        let (registry, link, files) = setup(&root, LinkFlags::default()).await;
        let runner = SyncRunner::new(Arc::new(runtime), false);

        let report = runner
            .run(SyncKind::Copy, &link, registry.package(link.src), &files)
            .await;
        assert_eq!(report.failed(), 2);
        assert_eq!(runner.errors(), 2);
    }

    #[tokio::test]
    async fn test_check_link_counts() {
        let dir = tempdir().unwrap();
        write_files(
            dir.path(),
            &[
                ("lib/package.json", r#"{"name":"lib"}"#),
                ("app/package.json", r#"{"name":"app"}"#),
            ],
        );
        let root = dir.path().canonicalize().unwrap();
        let runner = SyncRunner::new(Arc::new(RealRuntime), false);

        for (flags, proceeds, errors, warnings) in [
            (LinkFlags::default(), false, 1, 0),
            (LinkFlags { force: true, ..Default::default() }, true, 1, 1),
            (LinkFlags { skip: true, ..Default::default() }, false, 1, 1),
            (LinkFlags { force: true, skip: true, ..Default::default() }, true, 1, 1),
        ] {
            let (registry, link, _) = setup(&root, flags).await;
            let verdict = runner.check_link(
                registry.package(link.src),
                registry.package(link.dest),
                &link,
                false,
            );
            assert_eq!(verdict, proceeds);
            assert_eq!(runner.errors(), errors);
            assert_eq!(runner.warnings(), warnings);
        }
    }
}
