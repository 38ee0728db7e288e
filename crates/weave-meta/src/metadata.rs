//! Resolved package and application metadata.

use crate::package_config::PackageConfig;
use crate::package_json::PackageDependency;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Metadata of one package in the dependency graph.
#[derive(Debug, Clone, PartialEq)]
pub enum PackageMetadata {
    /// A package without a descriptor; only its existence matters.
    Plain(PlainPackage),
    /// A package with services, UI references, styles or messages.
    Declared(DeclaredPackage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainPackage {
    pub name: String,
    pub directory: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredPackage {
    pub name: String,
    pub version: Option<String>,
    pub directory: PathBuf,
    pub package_json_path: PathBuf,
    /// Resolved services module, if the package declares services.
    pub services_module_path: Option<PathBuf>,
    /// Resolved style entry point, if the package declares styles.
    pub css_file_path: Option<PathBuf>,
    /// Locale file per declared locale.
    pub i18n_paths: BTreeMap<String, PathBuf>,
    pub dependencies: Vec<PackageDependency>,
    pub config: PackageConfig,
}

impl PackageMetadata {
    /// The package name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Plain(p) => &p.name,
            Self::Declared(p) => &p.name,
        }
    }

    /// The normalized package directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        match self {
            Self::Plain(p) => &p.directory,
            Self::Declared(p) => &p.directory,
        }
    }

    /// The declared metadata, if any.
    #[must_use]
    pub fn as_declared(&self) -> Option<&DeclaredPackage> {
        match self {
            Self::Declared(p) => Some(p),
            Self::Plain(_) => None,
        }
    }

    /// Dependencies to follow; plain packages are leaves.
    #[must_use]
    pub fn dependencies(&self) -> &[PackageDependency] {
        match self {
            Self::Declared(p) => &p.dependencies,
            Self::Plain(_) => &[],
        }
    }
}

impl DeclaredPackage {
    /// Locales the package ships messages for, sorted.
    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.i18n_paths.keys().map(String::as_str)
    }

    /// Returns true if the package ships messages for any locale.
    #[must_use]
    pub fn has_i18n(&self) -> bool {
        !self.i18n_paths.is_empty()
    }
}

/// The fully resolved application.
#[derive(Debug, Clone, PartialEq)]
pub struct AppMetadata {
    pub name: String,
    pub directory: PathBuf,
    pub package_json_path: PathBuf,
    /// Locales declared by the application package.
    pub locales: Vec<String>,
    pub app_package: Arc<DeclaredPackage>,
    /// Every package in the graph, the app included, sorted by name.
    pub packages: Vec<Arc<PackageMetadata>>,
}

impl AppMetadata {
    /// Look up a package by name.
    #[must_use]
    pub fn package(&self, name: &str) -> Option<&PackageMetadata> {
        self.packages
            .iter()
            .map(AsRef::as_ref)
            .find(|p| p.name() == name)
    }

    /// Packages carrying declared metadata.
    pub fn declared_packages(&self) -> impl Iterator<Item = &DeclaredPackage> {
        self.packages.iter().filter_map(|p| p.as_declared())
    }

    /// Names of all packages, sorted.
    #[must_use]
    pub fn package_names(&self) -> Vec<&str> {
        self.packages.iter().map(|p| p.name()).collect()
    }
}
