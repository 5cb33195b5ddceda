use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::{FileListResolver, is_always_excluded};
use crate::package::Manifest;

#[derive(Deserialize, Debug)]
struct PackEntry {
    #[serde(default)]
    files: Vec<PackFile>,
}

#[derive(Deserialize, Debug)]
struct PackFile {
    path: String,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum PackOutput {
    Many(Vec<PackEntry>),
    One(PackEntry),
}

/// Parse the output of `npm pack --dry-run --json` into relative paths.
///
/// Paths under an always-excluded name are dropped even if npm reports them.
pub fn parse_pack_output(output: &str) -> Result<Vec<PathBuf>> {
    let parsed: PackOutput =
        serde_json::from_str(output).context("Failed to parse npm pack output")?;
    let entries = match parsed {
        PackOutput::Many(entries) => entries,
        PackOutput::One(entry) => vec![entry],
    };

    let mut files: Vec<PathBuf> = entries
        .into_iter()
        .flat_map(|entry| entry.files)
        .map(|file| PathBuf::from(file.path))
        .filter(|path| {
            !path
                .iter()
                .any(|name| is_always_excluded(&name.to_string_lossy()))
        })
        .collect();
    files.sort();
    files.dedup();
    Ok(files)
}

/// Resolves the file list by asking npm itself.
pub struct NpmPackResolver {
    program: String,
}

impl NpmPackResolver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for NpmPackResolver {
    fn default() -> Self {
        Self::new("npm")
    }
}

#[async_trait]
impl FileListResolver for NpmPackResolver {
    #[tracing::instrument(skip(self, _manifest))]
    async fn resolve(&self, root: &Path, _manifest: &Manifest) -> Result<Vec<PathBuf>> {
        let output = Command::new(&self.program)
            .args(["pack", "--dry-run", "--json", "--ignore-scripts"])
            .current_dir(root)
            .output()
            .await
            .with_context(|| format!("Failed to run {} pack in {:?}", self.program, root))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} pack exited with code {}: {}",
                self.program,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        let files = parse_pack_output(&String::from_utf8_lossy(&output.stdout))?;
        debug!("npm pack reported {} files in {:?}", files.len(), root);
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pack_output_array() {
        let output = r#"[{
            "id": "pkg@1.0.0",
            "name": "pkg",
            "files": [
                {"path": "package.json", "size": 10, "mode": 420},
                {"path": "lib/a.js", "size": 1, "mode": 420},
                {"path": "README.md", "size": 5, "mode": 420}
            ]
        }]"#;
        assert_eq!(
            parse_pack_output(output).unwrap(),
            vec![
                PathBuf::from("README.md"),
                PathBuf::from("lib/a.js"),
                PathBuf::from("package.json")
            ]
        );
    }

    #[test]
    fn test_parse_pack_output_single_object_and_filtering() {
        let output = r#"{"files": [
            {"path": "index.js"},
            {"path": "node_modules/dep/index.js"},
            {"path": "index.js"}
        ]}"#;
        assert_eq!(parse_pack_output(output).unwrap(), vec![PathBuf::from("index.js")]);
    }

    #[test]
    fn test_parse_pack_output_invalid() {
        assert!(parse_pack_output("npm ERR! code E404").is_err());
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let resolver = NpmPackResolver::new("lnpkg-test-no-such-npm");
        let dir = tempfile::tempdir().unwrap();
        let result = resolver.resolve(dir.path(), &Manifest::default()).await;
        assert!(result.is_err());
    }
}
