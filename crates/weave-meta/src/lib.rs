//! Package metadata resolution for Weave applications.
//!
//! This crate provides:
//! - Reader/writer compatibility checks for versioned package data
//! - Parsing of build descriptors and serialized package descriptors
//! - Recursive discovery of an application's package graph
//! - A single-flight cache invalidated by file-change notifications
//! - Merging of localized messages with application overrides

mod build_config;
mod cache;
mod context;
mod de;
mod descriptor;
mod error;
mod i18n;
mod layout;
mod loader;
mod metadata;
mod package_config;
mod package_json;
mod repository;
mod settings;
mod version;

pub use build_config::{
    BuildConfig, BuildConfigFormat, DetailedInterfaceConfig, DetailedReferenceConfig,
    InterfaceConfig, PackageOverridesConfig, PropertyMetaConfig, PublishConfig,
    PublishValidationConfig, ReferenceConfig, ServiceConfig, ServiceOverrideConfig, UiConfig,
};
pub use cache::{Cache, CacheEntry, CacheProvider};
pub use context::{FsContext, MetadataContext, SharedContext, DEFAULT_EXTENSIONS};
pub use descriptor::{
    I18nDescriptor, InterfaceDescriptor, PackageDescriptor, PropertyDescriptor,
    ReferenceDescriptor, ReferenceKind, ServiceDescriptor, UiDescriptor, UiReferenceDescriptor,
    DESCRIPTOR_FIELD,
};
pub use error::{
    DefinitionKind, ErrorKind, LocaleMismatch, MetadataError, Result, MAX_REPORTED_PACKAGES,
};
pub use i18n::{I18nFile, I18nMerger, LocaleMessages, Messages};
pub use layout::{
    build_config_candidates, classify, i18n_path, normalize_dir, PackageLocation,
    BUILD_CONFIG_EXTENSIONS, BUILD_CONFIG_NAME, I18N_DIR, I18N_EXT,
};
pub use loader::PackageMetadataLoader;
pub use metadata::{AppMetadata, DeclaredPackage, PackageMetadata, PlainPackage};
pub use package_config::{
    Cardinality, PackageConfig, PackageOverrides, Property, ProvidedInterface, Reference,
    Service, ServiceOverride, UiReference, DEFAULT_SERVICES_MODULE,
};
pub use package_json::{
    PackageDependency, PackageJson, PackageJsonProvider, PeerDependencyMeta, PACKAGE_JSON,
};
pub use repository::MetadataRepository;
pub use settings::{RepositoryConfig, DEFAULT_DEPENDENCY_DIR};
pub use version::{
    is_package_format_compatible, is_reader_compatible, is_runtime_version_compatible,
    parse_version, PACKAGE_FORMAT_VERSION,
};
