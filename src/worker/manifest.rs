//! Build-generated list of static assets for one release.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Prefix of every cache bucket name.
pub const CACHE_PREFIX: &str = "cache-";

/// The release version and every file its build produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    /// Release identifier, unique per deployment.
    pub version: String,
    /// Absolute URL paths of build outputs and static files.
    pub files: BTreeSet<String>,
}

impl AssetManifest {
    /// Creates a manifest from a version and a list of paths.
    #[must_use]
    pub fn new<I, P>(version: impl Into<String>, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            version: version.into(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads a JSON manifest from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid manifest.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Name of this release's cache bucket, `cache-<version>`.
    #[must_use]
    pub fn cache_name(&self) -> String {
        format!("{CACHE_PREFIX}{}", self.version)
    }

    /// Whether `path` is one of this release's assets.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    /// Number of assets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether there are no assets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_name_uses_version() {
        let manifest = AssetManifest::new("1718031234567", ["/favicon.png"]);
        assert_eq!(manifest.cache_name(), "cache-1718031234567");
    }

    #[test]
    fn membership_is_exact_path() {
        let manifest = AssetManifest::new("v1", ["/_app/immutable/entry/start.js", "/favicon.png"]);
        assert!(manifest.contains("/favicon.png"));
        assert!(!manifest.contains("/favicon.png/"));
        assert!(!manifest.contains("/monitors"));
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn load_reads_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("assets.json");
        std::fs::write(
            &path,
            r#"{"version":"abc","files":["/app.js","/app.css","/app.js"]}"#,
        )
        .unwrap();
        let manifest = AssetManifest::load(&path).unwrap();
        assert_eq!(manifest.version, "abc");
        assert_eq!(manifest.len(), 2);
    }
}
