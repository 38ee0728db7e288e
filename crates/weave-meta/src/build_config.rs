//! Build descriptor (`build.config.*`) parsing.
//!
//! The build descriptor is authored by hand next to a local package's
//! `package.json`. It is validated strictly: unknown keys are rejected at
//! every level, and repeated keys are errors even in JSON.
//!
//! ```toml
//! # build.config.toml
//! styles = "./styles.css"
//! i18n = ["de", "en"]
//!
//! [services.MapService]
//! provides = ["map.MapRegistry"]
//!
//! [services.MapService.references]
//! http = "http.HttpService"
//! layers = { name = "map.LayerProvider", all = true }
//!
//! [properties]
//! zoom = 4
//!
//! [propertiesMeta.zoom]
//! required = true
//! ```

use crate::de::{
    parse_error, unique_keys, unique_properties, unique_references, unique_services,
};
use crate::error::{MetadataError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// The complete build descriptor.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct BuildConfig {
    /// Additional modules exposed to the bundler.
    #[serde(default)]
    pub entry_points: Vec<String>,

    /// Style entry point, relative to the package.
    #[serde(default)]
    pub styles: Option<String>,

    /// Locales the package ships messages for.
    #[serde(default)]
    pub i18n: Vec<String>,

    /// Services implemented by the package.
    #[serde(default, deserialize_with = "unique_services")]
    pub services: BTreeMap<String, ServiceConfig>,

    /// Module exporting the service implementations.
    #[serde(default)]
    pub services_module: Option<String>,

    /// Interfaces used from UI code.
    #[serde(default)]
    pub ui: Option<UiConfig>,

    /// Default property values.
    #[serde(default, deserialize_with = "unique_properties")]
    pub properties: BTreeMap<String, serde_json::Value>,

    /// Extra information about declared properties.
    #[serde(default, deserialize_with = "unique_properties")]
    pub properties_meta: BTreeMap<String, PropertyMetaConfig>,

    /// Adjustments to other packages' services.
    #[serde(default, deserialize_with = "unique_keys")]
    pub overrides: BTreeMap<String, PackageOverridesConfig>,

    /// Options for publishing the package.
    #[serde(default)]
    pub publish_config: Option<PublishConfig>,
}

/// A service entry in the build descriptor.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default)]
    pub provides: Vec<InterfaceConfig>,

    #[serde(default, deserialize_with = "unique_references")]
    pub references: BTreeMap<String, ReferenceConfig>,
}

/// A provided interface: either a bare interface name or a full object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InterfaceConfig {
    Name(String),
    Detailed(DetailedInterfaceConfig),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailedInterfaceConfig {
    pub name: String,
    #[serde(default)]
    pub qualifier: Option<String>,
}

/// A referenced interface: either a bare interface name or a full object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ReferenceConfig {
    Name(String),
    Detailed(DetailedReferenceConfig),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailedReferenceConfig {
    pub name: String,
    #[serde(default)]
    pub qualifier: Option<String>,
    /// Inject every implementation instead of exactly one.
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UiConfig {
    #[serde(default)]
    pub references: Vec<ReferenceConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyMetaConfig {
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageOverridesConfig {
    #[serde(default, deserialize_with = "unique_services")]
    pub services: BTreeMap<String, ServiceOverrideConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceOverrideConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PublishConfig {
    #[serde(default)]
    pub strict: Option<bool>,
    #[serde(default)]
    pub validation: Option<PublishValidationConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PublishValidationConfig {
    #[serde(default)]
    pub require_readme: Option<bool>,
    #[serde(default)]
    pub require_license: Option<bool>,
    #[serde(default)]
    pub require_changelog: Option<bool>,
}

fn default_true() -> bool {
    true
}

/// Supported build descriptor formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl BuildConfigFormat {
    /// Determine the format from a file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl BuildConfig {
    /// Load a build descriptor, choosing the format by file extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has an unsupported
    /// extension, or does not match the schema.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(BuildConfigFormat::from_extension)
            .ok_or_else(|| MetadataError::validation(path, "unsupported build config format"))?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MetadataError::io(path, e))?;
        Self::parse(&content, format, path)
    }

    /// Parse a build descriptor; `path` is used for error messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the content does not match the schema.
    pub fn parse(content: &str, format: BuildConfigFormat, path: &Path) -> Result<Self> {
        let config: Self = match format {
            BuildConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(path, e))?,
            BuildConfigFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| parse_error(path, e))?
            }
            BuildConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| parse_error(path, e))?
            }
        };
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(name) = self
            .properties_meta
            .keys()
            .find(|name| !self.properties.contains_key(*name))
        {
            return Err(MetadataError::validation(
                path,
                format!("propertiesMeta refers to undeclared property '{name}'"),
            ));
        }
        if let Some(locale) = self.i18n.iter().find(|l| l.trim().is_empty()) {
            return Err(MetadataError::validation(
                path,
                format!("invalid locale '{locale}' in i18n"),
            ));
        }
        Ok(())
    }
}
