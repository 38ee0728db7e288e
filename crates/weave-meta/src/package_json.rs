//! The package identity file (`package.json`).

use crate::cache::{CacheEntry, CacheProvider};
use crate::context::SharedContext;
use crate::error::{MetadataError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The identity filename.
pub const PACKAGE_JSON: &str = "package.json";

/// The fields of `package.json` relevant to metadata resolution.
///
/// Everything else in the file is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    pub name: String,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub optional_dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub peer_dependencies_meta: BTreeMap<String, PeerDependencyMeta>,

    /// The raw serialized descriptor ([`DESCRIPTOR_FIELD`](crate::DESCRIPTOR_FIELD)),
    /// validated when the package is loaded.
    #[serde(default, rename = "weaveFramework")]
    pub descriptor: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PeerDependencyMeta {
    #[serde(default)]
    pub optional: bool,
}

/// A dependency edge of a package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageDependency {
    pub package_name: String,
    /// Resolution failures are tolerated for optional dependencies.
    pub optional: bool,
}

impl PackageJson {
    /// Parse `package.json` content; `path` is used for error messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid JSON, has no name, or a
    /// known field has the wrong type.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let package: Self =
            serde_json::from_str(content).map_err(|e| MetadataError::parse(path, e))?;
        if package.name.trim().is_empty() {
            return Err(MetadataError::validation(path, "package name cannot be empty"));
        }
        Ok(package)
    }

    /// Read and parse a `package.json` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MetadataError::io(path, e))?;
        Self::parse(&content, path)
    }

    /// Runtime, peer and optional dependencies, sorted by name.
    ///
    /// A dependency is optional if it is listed in `optionalDependencies`
    /// or marked optional in `peerDependenciesMeta`.
    #[must_use]
    pub fn all_dependencies(&self) -> Vec<PackageDependency> {
        let names = self
            .dependencies
            .keys()
            .chain(self.peer_dependencies.keys())
            .chain(self.optional_dependencies.keys())
            .collect::<BTreeSet<_>>();

        names
            .into_iter()
            .map(|name| PackageDependency {
                package_name: name.clone(),
                optional: self.optional_dependencies.contains_key(name)
                    || self.peer_dependencies_meta.get(name).is_some_and(|m| m.optional),
            })
            .collect()
    }

    /// Returns true if the package embeds a serialized descriptor.
    #[must_use]
    pub fn has_descriptor(&self) -> bool {
        self.descriptor.is_some()
    }
}

/// Reads `package.json` files for the repository's helper cache, keyed by
/// package directory.
#[derive(Debug, Default)]
pub struct PackageJsonProvider;

#[async_trait]
impl CacheProvider for PackageJsonProvider {
    type Key = PathBuf;
    type Value = Arc<PackageJson>;
    type Context = SharedContext;
    type Error = MetadataError;

    fn cache_id(&self, key: &PathBuf) -> String {
        key.to_string_lossy().into_owned()
    }

    async fn compute(
        &self,
        package_dir: PathBuf,
        ctx: SharedContext,
    ) -> Result<CacheEntry<Arc<PackageJson>>> {
        let path = package_dir.join(PACKAGE_JSON);
        ctx.add_watch_file(&path);
        let package = PackageJson::from_path(&path).await?;
        Ok(CacheEntry::new(Arc::new(package), BTreeSet::from([path])))
    }

    fn on_cached_return(
        &self,
        _key: &PathBuf,
        entry: &CacheEntry<Arc<PackageJson>>,
        ctx: &SharedContext,
    ) {
        for file in &entry.watch_files {
            ctx.add_watch_file(file);
        }
    }
}
