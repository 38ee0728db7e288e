//! Per-package metadata loading.

use crate::build_config::BuildConfig;
use crate::cache::{Cache, CacheEntry, CacheProvider};
use crate::context::SharedContext;
use crate::descriptor::PackageDescriptor;
use crate::error::{MetadataError, Result};
use crate::layout::{self, PackageLocation};
use crate::metadata::{DeclaredPackage, PackageMetadata, PlainPackage};
use crate::package_config::PackageConfig;
use crate::package_json::{PackageJson, PackageJsonProvider, PACKAGE_JSON};
use crate::version;
use async_trait::async_trait;
use semver::Version;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Where a package's configuration comes from.
enum ConfigSource {
    Build(PathBuf),
    Serialized(serde_json::Value),
    None,
}

/// Loads the metadata of a single package directory.
///
/// Keys are normalized package directories; see
/// [`normalize_dir`](crate::layout::normalize_dir).
#[derive(Debug)]
pub struct PackageMetadataLoader {
    source_root: PathBuf,
    dependency_dir: String,
    runtime_version: Option<Version>,
    package_json: Cache<PackageJsonProvider>,
}

impl PackageMetadataLoader {
    pub fn new(
        source_root: PathBuf,
        dependency_dir: String,
        runtime_version: Option<Version>,
        package_json: Cache<PackageJsonProvider>,
    ) -> Self {
        Self {
            source_root,
            dependency_dir,
            runtime_version,
            package_json,
        }
    }

    /// Classify a normalized package directory as local or external.
    #[must_use]
    pub fn location(&self, package_dir: &Path) -> PackageLocation {
        layout::classify(package_dir, &self.source_root, &self.dependency_dir)
    }

    async fn load(
        &self,
        package_dir: PathBuf,
        ctx: &SharedContext,
        watch: &mut WatchSet<'_>,
    ) -> Result<PackageMetadata> {
        let package_json_path = package_dir.join(PACKAGE_JSON);
        watch.add(&package_json_path);
        let package = self.package_json.get(package_dir.clone(), ctx.clone()).await?;
        let location = self.location(&package_dir);
        debug!(package = %package.name, ?location, dir = %package_dir.display(), "loading package");

        let source = self
            .select_source(&package, location, &package_dir, &package_json_path, ctx, watch)
            .await?;

        let config = match source {
            ConfigSource::None => {
                return Ok(PackageMetadata::Plain(PlainPackage {
                    name: package.name.clone(),
                    directory: package_dir,
                }));
            }
            ConfigSource::Build(path) => {
                let build_config = BuildConfig::from_path(&path).await?;
                PackageConfig::from_build_config(&build_config, &package.name)?
            }
            ConfigSource::Serialized(value) => {
                let descriptor =
                    PackageDescriptor::from_value(&value, &package.name, &package_json_path)?;
                self.check_runtime_version(&descriptor, &package.name)?;
                PackageConfig::from_descriptor(&descriptor, &package.name)?
            }
        };

        let importer = package_json_path.as_path();
        let services_module_path = match config.services_module.as_deref() {
            Some(module) if config.has_services() => {
                let what = "services module";
                Some(
                    self.resolve_entry(&package.name, location, module, importer, what, ctx)
                        .await?,
                )
            }
            _ => None,
        };
        if let Some(path) = &services_module_path {
            watch.add(path);
        }

        let css_file_path = match config.styles.as_deref() {
            Some(styles) => Some(
                self.resolve_entry(&package.name, location, styles, importer, "styles", ctx)
                    .await?,
            ),
            None => None,
        };
        if let Some(path) = &css_file_path {
            watch.add(path);
        }

        let mut i18n_paths = BTreeMap::new();
        for locale in &config.languages {
            let path = layout::i18n_path(&package_dir, locale);
            watch.add(&path);
            if !layout::file_exists(&path).await {
                return Err(MetadataError::MissingFile {
                    package: package.name.clone(),
                    what: format!("i18n file for locale '{locale}'"),
                    path,
                });
            }
            i18n_paths.insert(locale.clone(), path);
        }

        Ok(PackageMetadata::Declared(DeclaredPackage {
            name: package.name.clone(),
            version: package.version.clone(),
            directory: package_dir,
            package_json_path,
            services_module_path,
            css_file_path,
            i18n_paths,
            dependencies: package.all_dependencies(),
            config,
        }))
    }

    async fn select_source(
        &self,
        package: &PackageJson,
        location: PackageLocation,
        package_dir: &Path,
        package_json_path: &Path,
        ctx: &SharedContext,
        watch: &mut WatchSet<'_>,
    ) -> Result<ConfigSource> {
        let mut build_config = None;
        for candidate in layout::build_config_candidates(package_dir) {
            watch.add(&candidate);
            if build_config.is_none() && layout::file_exists(&candidate).await {
                build_config = Some(candidate);
            }
        }
        let descriptor = package.descriptor.clone();

        let source = match (location, build_config, descriptor) {
            (PackageLocation::External, build_config, None) => {
                if let Some(path) = build_config {
                    ctx.warn(&format!(
                        "package '{}' ships '{}' but no serialized descriptor; it is treated as a \
                         plain dependency",
                        package.name,
                        path.display()
                    ));
                }
                ConfigSource::None
            }
            (PackageLocation::External, _, Some(value)) => ConfigSource::Serialized(value),
            (PackageLocation::Local, Some(path), Some(_)) => {
                return Err(MetadataError::AmbiguousConfiguration {
                    package: package.name.clone(),
                    build_config: path,
                    package_json: package_json_path.to_path_buf(),
                });
            }
            (PackageLocation::Local, Some(path), None) => ConfigSource::Build(path),
            (PackageLocation::Local, None, Some(value)) => {
                ctx.warn(&format!(
                    "local package '{}' is configured through its serialized descriptor in '{}'; \
                     confirm this is intentional",
                    package.name,
                    package_json_path.display()
                ));
                ConfigSource::Serialized(value)
            }
            (PackageLocation::Local, None, None) => ConfigSource::None,
        };
        Ok(source)
    }

    fn check_runtime_version(&self, descriptor: &PackageDescriptor, package: &str) -> Result<()> {
        let (Some(runtime), Some(required)) = (&self.runtime_version, &descriptor.runtime_version)
        else {
            return Ok(());
        };
        if version::is_runtime_version_compatible(runtime, required)? {
            Ok(())
        } else {
            Err(MetadataError::UnsupportedRuntimeVersion {
                package: package.to_string(),
                version: required.clone(),
                supported: runtime.to_string(),
            })
        }
    }

    /// Resolve a module declared by a package to a file.
    ///
    /// Local packages resolve relative to their own `package.json`; external
    /// packages resolve through their public name.
    async fn resolve_entry(
        &self,
        package: &str,
        location: PackageLocation,
        module: &str,
        importer: &Path,
        what: &str,
        ctx: &SharedContext,
    ) -> Result<PathBuf> {
        let relative = module.trim_start_matches("./");
        let module_id = match location {
            PackageLocation::Local => format!("./{relative}"),
            PackageLocation::External => format!("{package}/{relative}"),
        };
        ctx.resolve(&module_id, importer)
            .await
            .ok_or_else(|| MetadataError::MissingFile {
                package: package.to_string(),
                what: what.to_string(),
                path: importer.parent().unwrap_or(importer).join(relative),
            })
    }
}

/// Files a computation depends on, reported to the context as they are
/// discovered.
struct WatchSet<'a> {
    ctx: &'a SharedContext,
    files: BTreeSet<PathBuf>,
}

impl<'a> WatchSet<'a> {
    fn new(ctx: &'a SharedContext) -> Self {
        Self {
            ctx,
            files: BTreeSet::new(),
        }
    }

    fn add(&mut self, path: &Path) {
        if self.files.insert(path.to_path_buf()) {
            self.ctx.add_watch_file(path);
        }
    }
}

#[async_trait]
impl CacheProvider for PackageMetadataLoader {
    type Key = PathBuf;
    type Value = Arc<PackageMetadata>;
    type Context = SharedContext;
    type Error = MetadataError;

    fn cache_id(&self, key: &PathBuf) -> String {
        key.to_string_lossy().into_owned()
    }

    async fn compute(
        &self,
        package_dir: PathBuf,
        ctx: SharedContext,
    ) -> Result<CacheEntry<Arc<PackageMetadata>>> {
        let mut watch = WatchSet::new(&ctx);
        let metadata = self.load(package_dir, &ctx, &mut watch).await?;
        Ok(CacheEntry::new(Arc::new(metadata), watch.files))
    }

    fn on_cached_return(
        &self,
        _key: &PathBuf,
        entry: &CacheEntry<Arc<PackageMetadata>>,
        ctx: &SharedContext,
    ) {
        for file in &entry.watch_files {
            ctx.add_watch_file(file);
        }
    }

    fn on_invalidate(&self, id: &str, entry: &CacheEntry<Arc<PackageMetadata>>) {
        debug!(%id, package = entry.value.name(), "package metadata invalidated");
    }
}
