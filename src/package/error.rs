use std::fmt;
use std::path::PathBuf;

/// Errors raised while loading or re-initializing a package.
#[derive(Debug, Clone, PartialEq)]
pub enum PackageError {
    /// The package path does not exist or is not a directory
    Path { path: PathBuf, reason: String },
    /// `package.json` is missing, unreadable, unparsable or has no name
    Manifest { path: PathBuf, reason: String },
    /// The manifest name differs from the name the package was loaded with
    Identity {
        path: PathBuf,
        previous: String,
        current: String,
    },
}

impl PackageError {
    pub fn is_identity(&self) -> bool {
        matches!(self, PackageError::Identity { .. })
    }
}

impl fmt::Display for PackageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageError::Path { path, reason } => write!(f, "{}: {}", path.display(), reason),
            PackageError::Manifest { path, reason } => {
                write!(f, "{}: {}", path.display(), reason)
            }
            PackageError::Identity {
                path,
                previous,
                current,
            } => write!(
                f,
                "Package name changed from \"{}\" to \"{}\" in {}. Requires a restart to apply directory changes.",
                previous,
                current,
                path.display()
            ),
        }
    }
}

impl std::error::Error for PackageError {}

/// Returns true if `error` carries a [`PackageError::Identity`].
pub fn is_identity_error(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<PackageError>()
        .is_some_and(PackageError::is_identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_error_display() {
        let err = PackageError::Path {
            path: PathBuf::from("/work/pkg"),
            reason: "not a directory".into(),
        };
        assert_eq!(err.to_string(), "/work/pkg: not a directory");

        let err = PackageError::Identity {
            path: PathBuf::from("/work/pkg"),
            previous: "a".into(),
            current: "b".into(),
        };
        assert!(err.to_string().contains("from \"a\" to \"b\""));
        assert!(err.to_string().contains("restart"));
    }

    #[test]
    fn test_is_identity_error_downcast() {
        let err = anyhow::Error::from(PackageError::Identity {
            path: PathBuf::from("/p"),
            previous: "a".into(),
            current: "b".into(),
        });
        assert!(is_identity_error(&err));

        let err = anyhow::Error::from(PackageError::Manifest {
            path: PathBuf::from("/p/package.json"),
            reason: "cannot parse json file".into(),
        });
        assert!(!is_identity_error(&err));
        assert!(!is_identity_error(&anyhow::anyhow!("other")));
    }
}
