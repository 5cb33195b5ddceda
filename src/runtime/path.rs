//! Path utility functions for normalization, comparison and reduction.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {
                // Skip `.` components
            }
            Component::ParentDir => {
                // Pop the last component if possible
                if !result.pop() {
                    // If we can't pop (e.g., at root), keep the `..`
                    result.push(component);
                }
            }
            _ => {
                result.push(component);
            }
        }
    }
    result
}

/// Check if a path is under a given directory by comparing normalized path components.
/// Returns true if `path` is under `dir` (i.e., `dir` is a prefix of `path`).
///
/// `/pkg/lib/../../etc/passwd` is NOT under `/pkg`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    normalize_path(path).starts_with(normalize_path(dir))
}

/// Resolve a possibly relative path against a base directory to get an absolute path.
pub fn resolve_relative_path(base_dir: &Path, relative_path: &Path) -> PathBuf {
    if relative_path.is_absolute() {
        normalize_path(relative_path)
    } else {
        normalize_path(&base_dir.join(relative_path))
    }
}

/// Shorten `path` for log output: relative to `cwd` when possible, `.` for `cwd` itself.
pub fn display_path(cwd: &Path, path: &Path) -> String {
    match pathdiff::diff_paths(path, cwd) {
        Some(relative) if relative.as_os_str().is_empty() => ".".to_string(),
        Some(relative) if !relative.is_absolute() => relative.display().to_string(),
        _ => path.display().to_string(),
    }
}

/// Result of [`reduce_paths`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReducedPaths {
    /// Paths that have no ancestor in the input set, sorted and unique.
    pub roots: Vec<PathBuf>,
    /// Every collapsed path mapped to the root that covers it.
    pub ancestors: HashMap<PathBuf, PathBuf>,
}

impl ReducedPaths {
    pub fn is_root(&self, path: &Path) -> bool {
        !self.ancestors.contains_key(path) && self.roots.binary_search_by(|r| r.as_path().cmp(path)).is_ok()
    }

    pub fn ancestor_of(&self, path: &Path) -> Option<&Path> {
        self.ancestors.get(path).map(PathBuf::as_path)
    }
}

/// Collapse a path set to its ancestors.
///
/// `Path` ordering is component-wise, so after sorting every descendant of a
/// path directly follows it and a single pass against the last root is enough.
/// `a/b` is never treated as a descendant of `a-b` or `a.b`.
pub fn reduce_paths<I, P>(paths: I) -> ReducedPaths
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let mut sorted: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
    sorted.sort();
    sorted.dedup();

    let mut reduced = ReducedPaths::default();
    for path in sorted {
        match reduced.roots.last() {
            Some(root) if path.starts_with(root) => {
                let root = root.clone();
                reduced.ancestors.insert(path, root);
            }
            _ => reduced.roots.push(path),
        }
    }
    reduced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_with_parent_dir() {
        assert_eq!(
            normalize_path(Path::new("/pkg/lib/../bin")),
            PathBuf::from("/pkg/bin")
        );
    }

    #[test]
    fn test_normalize_path_mixed_components() {
        assert_eq!(
            normalize_path(Path::new("/pkg/./lib/../bin/./cli.js")),
            PathBuf::from("/pkg/bin/cli.js")
        );
    }

    #[test]
    fn test_normalize_path_relative() {
        assert_eq!(
            normalize_path(Path::new("foo/bar/../baz")),
            PathBuf::from("foo/baz")
        );
    }

    #[test]
    fn test_is_path_under_simple() {
        assert!(is_path_under(Path::new("/pkg/lib/a.js"), Path::new("/pkg")));
        assert!(is_path_under(Path::new("/pkg"), Path::new("/pkg")));
    }

    #[test]
    fn test_is_path_under_partial_component_match() {
        // "/pkg-extra" should NOT be under "/pkg"
        assert!(!is_path_under(Path::new("/pkg-extra/a.js"), Path::new("/pkg")));
    }

    #[test]
    fn test_is_path_under_directory_traversal() {
        assert!(!is_path_under(
            Path::new("/pkg/lib/../../etc/passwd"),
            Path::new("/pkg")
        ));
    }

    #[test]
    fn test_resolve_relative_path() {
        assert_eq!(
            resolve_relative_path(Path::new("/work/app"), Path::new("../lib")),
            PathBuf::from("/work/lib")
        );
        assert_eq!(
            resolve_relative_path(Path::new("/work/app"), Path::new("/abs/./pkg")),
            PathBuf::from("/abs/pkg")
        );
    }

    #[test]
    fn test_display_path() {
        let cwd = Path::new("/work/app");
        assert_eq!(display_path(cwd, Path::new("/work/app")), ".");
        assert_eq!(display_path(cwd, Path::new("/work/app/lib/a.js")), "lib/a.js");
        assert_eq!(display_path(cwd, Path::new("/work/pkg")), "../pkg");
    }

    #[test]
    fn test_reduce_paths_collapses_descendants() {
        let reduced = reduce_paths(["/p/lib/a.js", "/p/lib", "/p/lib/sub/b.js", "/p/README.md"]);
        assert_eq!(
            reduced.roots,
            vec![PathBuf::from("/p/README.md"), PathBuf::from("/p/lib")]
        );
        assert_eq!(reduced.ancestor_of(Path::new("/p/lib/a.js")), Some(Path::new("/p/lib")));
        assert_eq!(reduced.ancestor_of(Path::new("/p/lib/sub/b.js")), Some(Path::new("/p/lib")));
        assert!(reduced.is_root(Path::new("/p/lib")));
        assert!(!reduced.is_root(Path::new("/p/lib/a.js")));
    }

    #[test]
    fn test_reduce_paths_sibling_prefix_is_not_ancestor() {
        let reduced = reduce_paths(["a", "a-b/c", "a.b", "a/b"]);
        assert_eq!(
            reduced.roots,
            vec![PathBuf::from("a"), PathBuf::from("a-b/c"), PathBuf::from("a.b")]
        );
        assert_eq!(reduced.ancestor_of(Path::new("a/b")), Some(Path::new("a")));
    }

    #[test]
    fn test_reduce_paths_dedups_and_handles_small_inputs() {
        assert_eq!(reduce_paths(Vec::<PathBuf>::new()), ReducedPaths::default());
        let reduced = reduce_paths(["x", "x"]);
        assert_eq!(reduced.roots, vec![PathBuf::from("x")]);
        assert!(reduced.ancestors.is_empty());
    }
}
