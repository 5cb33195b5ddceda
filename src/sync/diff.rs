use std::collections::HashSet;
use std::path::Path;

use crate::package::PackageFile;

/// Difference between two file lists, by absolute path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileDiff {
    pub added: Vec<PackageFile>,
    pub removed: Vec<PackageFile>,
    pub retained: Vec<PackageFile>,
}

fn unique(files: &[PackageFile]) -> Vec<&PackageFile> {
    let mut seen: HashSet<&Path> = HashSet::with_capacity(files.len());
    files.iter().filter(|f| seen.insert(f.path.as_path())).collect()
}

/// Compare `old` with `new`. Order follows the input lists; duplicates are dropped.
pub fn diff_files(old: &[PackageFile], new: &[PackageFile]) -> FileDiff {
    let old = unique(old);
    let new = unique(new);
    let old_paths: HashSet<&Path> = old.iter().map(|f| f.path.as_path()).collect();
    let new_paths: HashSet<&Path> = new.iter().map(|f| f.path.as_path()).collect();

    let mut diff = FileDiff::default();
    for file in &old {
        if new_paths.contains(file.path.as_path()) {
            diff.retained.push((*file).clone());
        } else {
            diff.removed.push((*file).clone());
        }
    }
    diff.added = new
        .into_iter()
        .filter(|f| !old_paths.contains(f.path.as_path()))
        .cloned()
        .collect();
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(rel: &str) -> PackageFile {
        PackageFile {
            path: PathBuf::from("/pkg").join(rel),
            relative: PathBuf::from(rel),
        }
    }

    #[test]
    fn test_diff_same_list() {
        let files = vec![file("a.js"), file("lib"), file("package.json")];
        let diff = diff_files(&files, &files);
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert_eq!(diff.retained, files);
    }

    #[test]
    fn test_diff_added_removed_retained() {
        let old = vec![file("a.js"), file("b.js"), file("package.json")];
        let new = vec![file("package.json"), file("c.js"), file("a.js")];
        let diff = diff_files(&old, &new);
        assert_eq!(diff.added, vec![file("c.js")]);
        assert_eq!(diff.removed, vec![file("b.js")]);
        assert_eq!(diff.retained, vec![file("a.js"), file("package.json")]);
    }

    #[test]
    fn test_diff_dedups() {
        let old = vec![file("a.js"), file("a.js")];
        let new = vec![file("b.js"), file("b.js"), file("a.js")];
        let diff = diff_files(&old, &new);
        assert_eq!(diff.added, vec![file("b.js")]);
        assert_eq!(diff.retained, vec![file("a.js")]);
        assert!(diff.removed.is_empty());
    }
}
