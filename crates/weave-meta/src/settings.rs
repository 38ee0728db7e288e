//! Repository configuration.
//!
//! ```toml
//! # weave.toml
//! source-root = "src"
//! dependency-dir = "node_modules"
//! runtime-version = "2.1.0"
//! ```

use crate::error::{MetadataError, Result};
use semver::Version;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the dependency manager's install directory.
pub const DEFAULT_DEPENDENCY_DIR: &str = "node_modules";

/// Settings for a [`MetadataRepository`](crate::MetadataRepository).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct RepositoryConfig {
    /// Root of the application sources. Packages below it (and outside any
    /// dependency directory) are local packages.
    pub source_root: PathBuf,

    /// Name of the dependency directory.
    #[serde(default = "default_dependency_dir")]
    pub dependency_dir: String,

    /// Runtime version packages are checked against.
    #[serde(default)]
    pub runtime_version: Option<Version>,
}

fn default_dependency_dir() -> String {
    DEFAULT_DEPENDENCY_DIR.to_string()
}

impl RepositoryConfig {
    /// Create a configuration for the given source root.
    #[must_use]
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            dependency_dir: default_dependency_dir(),
            runtime_version: None,
        }
    }

    /// Use a different dependency directory name.
    #[must_use]
    pub fn with_dependency_dir(mut self, name: impl Into<String>) -> Self {
        self.dependency_dir = name.into();
        self
    }

    /// Check packages against the given runtime version.
    #[must_use]
    pub fn with_runtime_version(mut self, version: Version) -> Self {
        self.runtime_version = Some(version);
        self
    }

    /// Load a configuration file. A relative `source-root` is resolved
    /// against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| MetadataError::io(path, e))?;
        let mut config = Self::parse(&content, path)?;
        if config.source_root.is_relative() {
            if let Some(dir) = path.parent() {
                config.source_root = dir.join(&config.source_root);
            }
        }
        Ok(config)
    }

    /// Parse a configuration from TOML; `path` is used for error messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| MetadataError::parse(path, e))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let dir = &self.dependency_dir;
        if dir.is_empty() || dir.contains(['/', '\\']) {
            return Err(MetadataError::validation(
                path,
                format!("dependency-dir must be a single directory name, got '{dir}'"),
            ));
        }
        Ok(())
    }
}
