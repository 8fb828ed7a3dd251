//! Route manifest loading.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::BundleError;

pub const CLIENT_DIR: &str = "client";
pub const PRERENDERED_DIR: &str = "prerendered";
pub const MANIFEST_FILE: &str = "manifest.json";

/// On-disk shape of `manifest.json`.
#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    prerendered: Vec<String>,
}

/// Where the build output lives and which routes were prerendered.
#[derive(Debug, Clone)]
pub struct RouteManifest {
    client_dir: PathBuf,
    prerendered_dir: PathBuf,
    prerendered: HashSet<String>,
}

impl RouteManifest {
    /// Build a manifest from explicit parts.
    pub fn new<I, S>(client_dir: PathBuf, prerendered_dir: PathBuf, prerendered: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            client_dir,
            prerendered_dir,
            prerendered: prerendered.into_iter().map(Into::into).collect(),
        }
    }

    /// Validate the bundle layout under `root` and read its manifest.
    pub fn load(root: &Path) -> Result<Self, BundleError> {
        let client_dir = root.join(CLIENT_DIR);
        if !client_dir.is_dir() {
            return Err(BundleError::MissingDirectory(client_dir));
        }

        let prerendered_dir = root.join(PRERENDERED_DIR);
        if !prerendered_dir.is_dir() {
            tracing::warn!(
                path = %prerendered_dir.display(),
                "Prerendered directory missing; prerendered routes will fall through"
            );
        }

        let manifest_path = root.join(MANIFEST_FILE);
        let content = fs::read_to_string(&manifest_path).map_err(|source| BundleError::ManifestIo {
            path: manifest_path.clone(),
            source,
        })?;
        let file: ManifestFile =
            serde_json::from_str(&content).map_err(|source| BundleError::ManifestParse {
                path: manifest_path.clone(),
                source,
            })?;

        let manifest = Self::new(client_dir, prerendered_dir, file.prerendered);
        tracing::info!(
            prerendered_routes = manifest.prerendered.len(),
            client_dir = %manifest.client_dir.display(),
            "Route manifest loaded"
        );
        Ok(manifest)
    }

    /// Membership test against the prerendered route set.
    pub fn is_prerendered(&self, path: &str) -> bool {
        self.prerendered.contains(path)
    }

    pub fn prerendered_count(&self) -> usize {
        self.prerendered.len()
    }

    pub fn client_dir(&self) -> &Path {
        &self.client_dir
    }

    pub fn prerendered_dir(&self) -> &Path {
        &self.prerendered_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_prerendered_set() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(CLIENT_DIR)).unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{ "prerendered": ["/", "/about"] }"#,
        )
        .unwrap();

        let manifest = RouteManifest::load(dir.path()).unwrap();
        assert!(manifest.is_prerendered("/"));
        assert!(manifest.is_prerendered("/about"));
        assert!(!manifest.is_prerendered("/about/"));
        assert_eq!(manifest.prerendered_count(), 2);
    }

    #[test]
    fn missing_client_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{}").unwrap();

        let err = RouteManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, BundleError::MissingDirectory(_)));
    }

    #[test]
    fn malformed_manifest_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(CLIENT_DIR)).unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{ prerendered: ").unwrap();

        let err = RouteManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, BundleError::ManifestParse { .. }));
    }
}
