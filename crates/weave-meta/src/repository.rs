//! Application dependency graph resolution.
//!
//! This module provides:
//! - Recursive discovery of every package an application depends on
//! - Memoization of per-package metadata across resolution passes
//! - Detection of packages found at more than one location
//! - Invalidation driven by file-change notifications

use crate::cache::{lock, Cache};
use crate::context::SharedContext;
use crate::error::{MetadataError, Result};
use crate::layout::{self, BUILD_CONFIG_NAME};
use crate::loader::PackageMetadataLoader;
use crate::metadata::{AppMetadata, DeclaredPackage, PackageMetadata};
use crate::package_json::{PackageDependency, PackageJsonProvider, PACKAGE_JSON};
use crate::settings::RepositoryConfig;
use futures_util::future::{try_join_all, BoxFuture, FutureExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Resolves application metadata and caches per-package results.
///
/// A repository is meant to live as long as the host process: cached
/// results are reused by later resolutions until a watched file changes
/// ([`on_file_changed`](Self::on_file_changed)) or the repository is
/// [`reset`](Self::reset).
#[derive(Debug)]
pub struct MetadataRepository {
    config: RepositoryConfig,
    package_json: Cache<PackageJsonProvider>,
    metadata: Cache<PackageMetadataLoader>,
}

/// Packages recorded during one resolution, keyed by name.
#[derive(Default)]
struct Graph {
    packages: Mutex<BTreeMap<String, Arc<PackageMetadata>>>,
}

impl Graph {
    /// Record `metadata`, returning true if its name was not seen before.
    fn record(&self, metadata: &Arc<PackageMetadata>) -> Result<bool> {
        let mut packages = lock(&self.packages);
        match packages.get(metadata.name()) {
            Some(existing) if existing.directory() == metadata.directory() => Ok(false),
            Some(existing) => Err(MetadataError::DuplicatePackageLocation {
                package: metadata.name().to_string(),
                first: existing.directory().to_path_buf(),
                second: metadata.directory().to_path_buf(),
            }),
            None => {
                packages.insert(metadata.name().to_string(), Arc::clone(metadata));
                Ok(true)
            }
        }
    }

    fn into_packages(self) -> BTreeMap<String, Arc<PackageMetadata>> {
        self.packages
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl MetadataRepository {
    /// Create a repository with empty caches.
    ///
    /// # Errors
    ///
    /// Returns an error if the source root does not exist.
    pub async fn new(config: RepositoryConfig) -> Result<Self> {
        // Package directories are canonical, so the source root must be too.
        let source_root = tokio::fs::canonicalize(&config.source_root)
            .await
            .map_err(|e| MetadataError::io(&config.source_root, e))?;
        let package_json = Cache::new(PackageJsonProvider);
        let loader = PackageMetadataLoader::new(
            source_root,
            config.dependency_dir.clone(),
            config.runtime_version.clone(),
            package_json.clone(),
        );
        Ok(Self {
            config,
            package_json,
            metadata: Cache::new(loader),
        })
    }

    /// The configuration this repository was created with.
    #[must_use]
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Resolve the application in `app_dir` and every package it depends on.
    ///
    /// # Errors
    ///
    /// Returns the first error hit anywhere in the graph; no partial result
    /// is produced.
    pub async fn get_app_metadata(
        &self,
        app_dir: impl AsRef<Path>,
        ctx: SharedContext,
    ) -> Result<AppMetadata> {
        let app_dir = layout::normalize_dir(app_dir.as_ref()).await?;
        let app = self.metadata.get(app_dir.clone(), ctx.clone()).await?;
        let Some(app_package) = app.as_declared() else {
            return Err(MetadataError::MissingFile {
                package: app.name().to_string(),
                what: "build configuration".to_string(),
                path: app_dir.join(format!("{BUILD_CONFIG_NAME}.toml")),
            });
        };

        let graph = Graph::default();
        graph.record(&app)?;
        self.visit(app_package, &graph, &ctx).await?;
        let packages = graph.into_packages();
        check_overrides(&packages, &ctx);

        debug!(app = %app_package.name, packages = packages.len(), "resolved application");
        Ok(AppMetadata {
            name: app_package.name.clone(),
            directory: app_package.directory.clone(),
            package_json_path: app_package.package_json_path.clone(),
            locales: app_package.locales().map(str::to_string).collect(),
            app_package: Arc::new(app_package.clone()),
            packages: packages.into_values().collect(),
        })
    }

    /// Load the metadata of a single package directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory does not exist or its metadata is
    /// invalid.
    pub async fn get_package_metadata(
        &self,
        package_dir: impl AsRef<Path>,
        ctx: SharedContext,
    ) -> Result<Arc<PackageMetadata>> {
        let package_dir = layout::normalize_dir(package_dir.as_ref()).await?;
        self.metadata.get(package_dir, ctx).await
    }

    /// Drop every cached result that depends on `path`.
    ///
    /// Returns the number of invalidated entries.
    pub fn on_file_changed(&self, path: &Path) -> usize {
        let removed =
            self.package_json.invalidate_watching(path) + self.metadata.invalidate_watching(path);
        if removed > 0 {
            debug!(path = %path.display(), removed, "file change invalidated cached metadata");
        }
        removed
    }

    /// Discard all cached results.
    pub fn reset(&self) {
        self.package_json.clear();
        self.metadata.clear();
    }

    /// Number of packages with cached metadata.
    #[must_use]
    pub fn cached_packages(&self) -> usize {
        self.metadata.len()
    }

    /// Visit the dependencies of `package`, siblings concurrently.
    fn visit<'a>(
        &'a self,
        package: &'a DeclaredPackage,
        graph: &'a Graph,
        ctx: &'a SharedContext,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            try_join_all(
                package
                    .dependencies
                    .iter()
                    .map(|dependency| self.visit_dependency(package, dependency, graph, ctx)),
            )
            .await?;
            Ok(())
        }
        .boxed()
    }

    async fn visit_dependency(
        &self,
        parent: &DeclaredPackage,
        dependency: &PackageDependency,
        graph: &Graph,
        ctx: &SharedContext,
    ) -> Result<()> {
        let Some(dir) = self.resolve_dependency(parent, dependency, ctx).await? else {
            return Ok(());
        };
        let metadata = self.metadata.get(dir, ctx.clone()).await?;
        // A name already recorded is not descended again; this ends cycles.
        if !graph.record(&metadata)? {
            return Ok(());
        }
        debug!(from = %parent.name, to = metadata.name(), "dependency edge");
        if let Some(declared) = metadata.as_declared() {
            self.visit(declared, graph, ctx).await?;
        }
        Ok(())
    }

    /// Find the normalized directory of `dependency` as seen from `parent`.
    async fn resolve_dependency(
        &self,
        parent: &DeclaredPackage,
        dependency: &PackageDependency,
        ctx: &SharedContext,
    ) -> Result<Option<PathBuf>> {
        let name = &dependency.package_name;
        let module_id = format!("{name}/{PACKAGE_JSON}");
        let Some(path) = ctx.resolve(&module_id, &parent.package_json_path).await else {
            if dependency.optional {
                debug!(
                    package = %parent.name,
                    dependency = %name,
                    "optional dependency not installed"
                );
                return Ok(None);
            }
            return Err(MetadataError::MissingDependency {
                package: parent.name.clone(),
                dependency: name.clone(),
            });
        };
        let dir = path.parent().unwrap_or(&path);
        layout::normalize_dir(dir).await.map(Some)
    }
}

/// Warn about service overrides that target nothing in the graph.
fn check_overrides(packages: &BTreeMap<String, Arc<PackageMetadata>>, ctx: &SharedContext) {
    for package in packages.values().filter_map(|p| p.as_declared()) {
        for (target, overrides) in &package.config.overrides {
            let Some(target_package) = packages.get(target) else {
                ctx.warn(&format!(
                    "package '{}' overrides services of '{target}', which is not a dependency \
                     of the application",
                    package.name
                ));
                continue;
            };
            let services = target_package.as_declared().map(|p| &p.config.services);
            for service in overrides.services.keys() {
                if !services.is_some_and(|s| s.contains_key(service)) {
                    ctx.warn(&format!(
                        "package '{}' overrides service '{service}' of '{target}', which does \
                         not define it",
                        package.name
                    ));
                }
            }
        }
    }
}
