//! Dependency gate between a source package and its destination.

use std::fmt;

use super::Package;
use crate::link::LinkFlags;

/// Outcome of [`check_link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    /// The source is a declared dependency of the destination
    Dependency,
    /// Not a dependency, allowed by `force`
    Forced,
    /// Not a dependency, blocked silently because of `skip`
    Skipped,
    /// Not a dependency, blocked
    Blocked,
}

impl GuardVerdict {
    pub fn proceeds(&self) -> bool {
        matches!(self, GuardVerdict::Dependency | GuardVerdict::Forced)
    }
}

/// Reported when a link between unrelated packages is attempted.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyPolicyError {
    pub src: String,
    pub dest: String,
    pub forced: bool,
}

impl fmt::Display for DependencyPolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.forced {
            write!(f, "{} is not a dependency of {}, linking anyway.", self.src, self.dest)
        } else {
            write!(
                f,
                "{} is not a dependency of {}. Use --force to allow this link.",
                self.src, self.dest
            )
        }
    }
}

impl std::error::Error for DependencyPolicyError {}

/// True if `src` is declared in any dependency field of `dest`.
pub fn is_dependency(src: &Package, dest: &Package) -> bool {
    dest.manifest().has_dependency(src.name())
}

/// Decide whether a link may proceed.
pub fn check_link(src: &Package, dest: &Package, flags: LinkFlags) -> GuardVerdict {
    if is_dependency(src, dest) {
        GuardVerdict::Dependency
    } else if flags.force {
        GuardVerdict::Forced
    } else if flags.skip {
        GuardVerdict::Skipped
    } else {
        GuardVerdict::Blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use crate::test_utils::write_files;
    use tempfile::tempdir;

    async fn packages(dest_manifest: &str) -> (tempfile::TempDir, Package, Package) {
        let dir = tempdir().unwrap();
        write_files(
            dir.path(),
            &[
                ("src/package.json", r#"{"name":"@scope/lib"}"#),
                ("dest/package.json", dest_manifest),
            ],
        );
        let src = Package::load(&RealRuntime, &dir.path().join("src")).await.unwrap();
        let dest = Package::load(&RealRuntime, &dir.path().join("dest")).await.unwrap();
        (dir, src, dest)
    }

    #[tokio::test]
    async fn test_is_dependency_fields() {
        for manifest in [
            r#"{"name":"app","dependencies":{"@scope/lib":"1"}}"#,
            r#"{"name":"app","devDependencies":{"@scope/lib":"1"}}"#,
            r#"{"name":"app","peerDependencies":{"@scope/lib":"1"}}"#,
            r#"{"name":"app","optionalDependencies":{"@scope/lib":"1"}}"#,
            r#"{"name":"app","bundleDependencies":["@scope/lib"]}"#,
            r#"{"name":"app","bundledDependencies":["@scope/lib"]}"#,
        ] {
            let (_dir, src, dest) = packages(manifest).await;
            assert!(is_dependency(&src, &dest), "{}", manifest);
        }

        let (_dir, src, dest) = packages(r#"{"name":"app","dependencies":{"other":"1"}}"#).await;
        assert!(!is_dependency(&src, &dest));
    }

    #[tokio::test]
    async fn test_check_link_verdicts() {
        let (_dir, src, dest) = packages(r#"{"name":"app"}"#).await;
        let flags = |force, skip| LinkFlags {
            force,
            skip,
            unlink: false,
        };

        assert_eq!(check_link(&src, &dest, flags(false, false)), GuardVerdict::Blocked);
        assert_eq!(check_link(&src, &dest, flags(true, false)), GuardVerdict::Forced);
        assert_eq!(check_link(&src, &dest, flags(false, true)), GuardVerdict::Skipped);
        // force wins over skip
        assert_eq!(check_link(&src, &dest, flags(true, true)), GuardVerdict::Forced);
        assert!(!GuardVerdict::Skipped.proceeds());
        assert!(GuardVerdict::Forced.proceeds());

        let (_dir, src, dest) =
            packages(r#"{"name":"app","dependencies":{"@scope/lib":"1"}}"#).await;
        assert_eq!(check_link(&src, &dest, flags(false, false)), GuardVerdict::Dependency);
    }

    #[test]
    fn test_policy_error_message() {
        let err = DependencyPolicyError {
            src: "lib".into(),
            dest: "app".into(),
            forced: false,
        };
        assert_eq!(
            err.to_string(),
            "lib is not a dependency of app. Use --force to allow this link."
        );
    }
}
