//! npm pack inclusion and exclusion rules.

use glob::{MatchOptions, Pattern};
use log::warn;
use std::path::{Component, Path};

use crate::package::Manifest;

/// Names dropped at any depth, whether or not `files` is set.
pub const ALWAYS_EXCLUDE: &[&str] = &[
    ".git",
    "node_modules",
    ".npmrc",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
];

/// Names dropped at any depth when the manifest has no `files` field.
pub const DEFAULT_EXCLUDE: &[&str] = &[
    "CVS",
    ".svn",
    ".hg",
    ".lock-wscript",
    ".wafpickle-*",
    ".*.swp",
    ".DS_Store",
    "._*",
    "npm-debug.log",
    "config.gypi",
    "*.orig",
];

/// Root-level files npm always packs.
pub const ALWAYS_INCLUDE: &[&str] = &[
    "package.json",
    "README",
    "README.*",
    "LICENSE",
    "LICENSE.*",
    "LICENCE",
    "LICENCE.*",
];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Strip `./`, a leading `/` and trailing `/` from a `files` entry.
fn normalize_pattern(pattern: &str) -> String {
    let mut pattern = pattern.trim();
    while let Some(rest) = pattern.strip_prefix("./") {
        pattern = rest;
    }
    pattern.trim_start_matches('/').trim_end_matches('/').to_string()
}

fn compile(pattern: &str) -> Option<Pattern> {
    match Pattern::new(pattern) {
        Ok(p) => Some(p),
        Err(e) => {
            warn!("Ignoring invalid pattern {:?}: {}", pattern, e);
            None
        }
    }
}

fn compile_all(patterns: &[&str]) -> Vec<Pattern> {
    patterns.iter().filter_map(|p| compile(p)).collect()
}

/// Slash-joined form of a relative path, the shape patterns are matched against.
pub fn rel_key(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Prefixes of `key`, shortest first: `a/b/c` yields `a`, `a/b`, `a/b/c`.
fn prefixes(key: &str) -> impl Iterator<Item = &str> {
    key.match_indices('/')
        .map(move |(i, _)| &key[..i])
        .chain(std::iter::once(key))
}

/// True if `name` is dropped by npm regardless of the manifest.
pub fn is_always_excluded(name: &str) -> bool {
    ALWAYS_EXCLUDE
        .iter()
        .any(|excluded| excluded.eq_ignore_ascii_case(name))
}

/// Compiled pack rules of one manifest.
#[derive(Debug, Clone)]
pub struct PackRules {
    include: Vec<Pattern>,
    negate: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl PackRules {
    pub fn new(manifest: &Manifest) -> Self {
        let mut include = compile_all(ALWAYS_INCLUDE);
        let mut negate = Vec::new();
        let mut exclude = compile_all(ALWAYS_EXCLUDE);

        match &manifest.files {
            Some(files) => {
                for entry in files {
                    if let Some(negated) = entry.trim().strip_prefix('!') {
                        let pattern = normalize_pattern(negated);
                        if !pattern.is_empty() {
                            negate.extend(compile(&pattern));
                        }
                    } else {
                        let pattern = normalize_pattern(entry);
                        if !pattern.is_empty() {
                            include.extend(compile(&pattern));
                        }
                    }
                }
            }
            None => {
                include.extend(compile("*"));
                exclude.extend(compile_all(DEFAULT_EXCLUDE));
            }
        }

        for target in manifest.main.iter().chain(manifest.bin.iter()) {
            let target = normalize_pattern(target);
            if !target.is_empty() {
                include.extend(compile(&Pattern::escape(&target)));
            }
        }

        PackRules {
            include,
            negate,
            exclude,
        }
    }

    /// True if a single path component is excluded by name.
    pub fn excludes_name(&self, name: &str) -> bool {
        self.exclude
            .iter()
            .any(|p| p.matches_with(name, MATCH_OPTIONS))
    }

    /// True if any component of `rel` is excluded, or `rel` sits under a negated pattern.
    pub fn is_excluded(&self, rel: &Path) -> bool {
        let key = rel_key(rel);
        key.split('/').any(|name| self.excludes_name(name))
            || prefixes(&key).any(|prefix| {
                self.negate
                    .iter()
                    .any(|p| p.matches_with(prefix, MATCH_OPTIONS))
            })
    }

    /// True if `rel` or one of its ancestors matches an include pattern.
    pub fn includes(&self, rel: &Path) -> bool {
        let key = rel_key(rel);
        !key.is_empty()
            && prefixes(&key).any(|prefix| {
                self.include
                    .iter()
                    .any(|p| p.matches_with(prefix, MATCH_OPTIONS))
            })
    }

    pub fn selects(&self, rel: &Path) -> bool {
        self.includes(rel) && !self.is_excluded(rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(files: Option<&[&str]>) -> Manifest {
        Manifest {
            name: "pkg".into(),
            files: files.map(|f| f.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_rules_select_everything_but_ignored_names() {
        let rules = PackRules::new(&manifest(None));
        assert!(rules.selects(Path::new("index.js")));
        assert!(rules.selects(Path::new("lib/deep/a.js")));
        assert!(rules.selects(Path::new(".eslintrc")));
        assert!(!rules.selects(Path::new("node_modules/dep/index.js")));
        assert!(!rules.selects(Path::new("lib/.git/HEAD")));
        assert!(!rules.selects(Path::new(".DS_Store")));
        assert!(!rules.selects(Path::new("lib/.a.js.swp")));
        assert!(!rules.selects(Path::new("patch.orig")));
        assert!(!rules.selects(Path::new("yarn.lock")));
    }

    #[test]
    fn test_files_field_limits_selection() {
        let rules = PackRules::new(&manifest(Some(&["./lib/", "types/*.d.ts"])));
        assert!(rules.selects(Path::new("lib")));
        assert!(rules.selects(Path::new("lib/a.js")));
        assert!(rules.selects(Path::new("types/index.d.ts")));
        assert!(!rules.selects(Path::new("types/index.ts")));
        assert!(!rules.selects(Path::new("src/a.ts")));

        // always included, case-insensitive
        assert!(rules.selects(Path::new("package.json")));
        assert!(rules.selects(Path::new("readme.md")));
        assert!(rules.selects(Path::new("LICENCE")));
        assert!(!rules.selects(Path::new("docs/README.md")));
    }

    #[test]
    fn test_files_field_disables_default_excludes_only() {
        let rules = PackRules::new(&manifest(Some(&["lib"])));
        assert!(rules.selects(Path::new("lib/.DS_Store")));
        assert!(!rules.selects(Path::new("lib/node_modules/x.js")));
        assert!(!rules.selects(Path::new("lib/.npmrc")));
    }

    #[test]
    fn test_negated_entries_exclude() {
        let rules = PackRules::new(&manifest(Some(&["lib", "!lib/test", "!**/*.map"])));
        assert!(rules.selects(Path::new("lib/a.js")));
        assert!(!rules.selects(Path::new("lib/test")));
        assert!(!rules.selects(Path::new("lib/test/a.spec.js")));
        assert!(!rules.selects(Path::new("lib/a.js.map")));
    }

    #[test]
    fn test_main_and_bin_are_included() {
        let mut m = manifest(Some(&["lib"]));
        m.main = Some("./index.js".into());
        m.bin = vec!["bin/cli[1].js".into()];
        let rules = PackRules::new(&m);
        assert!(rules.selects(Path::new("index.js")));
        assert!(rules.selects(Path::new("bin/cli[1].js")));
        assert!(!rules.selects(Path::new("bin/other.js")));
    }

    #[test]
    fn test_rel_key_and_prefixes() {
        assert_eq!(rel_key(Path::new("./a/b/c")), "a/b/c");
        assert_eq!(prefixes("a/b/c").collect::<Vec<_>>(), vec!["a", "a/b", "a/b/c"]);
        assert!(is_always_excluded("node_modules"));
        assert!(!is_always_excluded("lib"));
    }
}
