//! Conventional file locations inside a package.
//!
//! ```text
//! my-package/
//! ├── package.json          # Identity file (may embed a serialized descriptor)
//! ├── build.config.toml     # Build descriptor (local packages)
//! ├── services.ts           # Services module
//! ├── styles.css            # Style entry point
//! └── i18n/
//!     ├── de.yaml           # Messages per locale
//!     └── en.yaml
//! ```

use crate::error::{MetadataError, Result};
use std::path::{Component, Path, PathBuf};

/// Base filename of the build descriptor.
pub const BUILD_CONFIG_NAME: &str = "build.config";

/// Build descriptor extensions, in lookup priority order.
pub const BUILD_CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Directory holding locale files.
pub const I18N_DIR: &str = "i18n";

/// Extension of locale files.
pub const I18N_EXT: &str = "yaml";

/// Where a package lives relative to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageLocation {
    /// Inside the application's source tree.
    Local,
    /// Installed by the dependency manager or outside the source tree.
    External,
}

/// All build descriptor paths of a package, in lookup priority order.
#[must_use]
pub fn build_config_candidates(package_dir: &Path) -> Vec<PathBuf> {
    BUILD_CONFIG_EXTENSIONS
        .iter()
        .map(|ext| package_dir.join(format!("{BUILD_CONFIG_NAME}.{ext}")))
        .collect()
}

/// The locale file of a package for `locale`.
#[must_use]
pub fn i18n_path(package_dir: &Path, locale: &str) -> PathBuf {
    package_dir
        .join(I18N_DIR)
        .join(format!("{locale}.{I18N_EXT}"))
}

/// Classify a normalized package directory.
#[must_use]
pub fn classify(package_dir: &Path, source_root: &Path, dependency_dir: &str) -> PackageLocation {
    let in_dependency_dir = package_dir
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name == dependency_dir));
    if package_dir.starts_with(source_root) && !in_dependency_dir {
        PackageLocation::Local
    } else {
        PackageLocation::External
    }
}

/// Normalize a package directory so equal directories compare equal.
///
/// Symbolic links are resolved, so a linked workspace package and its
/// real location share one cache entry.
///
/// # Errors
///
/// Returns an error if the directory does not exist.
pub async fn normalize_dir(dir: &Path) -> Result<PathBuf> {
    tokio::fs::canonicalize(dir)
        .await
        .map_err(|e| MetadataError::io(dir, e))
}

/// Returns true if `path` exists and is a file.
pub(crate) async fn file_exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}
