//! Package loading and policy
//!
//! A package is a directory with a `package.json`. This module parses the
//! manifest, tracks the publishable file list and decides whether one package
//! may be installed into another.

mod dependency;
mod error;
mod manifest;
mod model;

pub use dependency::{DependencyPolicyError, GuardVerdict, check_link, is_dependency};
pub use error::{PackageError, is_identity_error};
pub use manifest::{Manifest, PACKAGE_JSON};
pub use model::{Package, PackageFile};
