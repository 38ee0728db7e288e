//! Serialized package descriptor.
//!
//! Published packages embed their metadata in the `weaveFramework` field of
//! their `package.json`. The descriptor is written by tooling, possibly a
//! newer version than the one reading it, so unknown fields are ignored.
//! Fields that are known must still have the documented shape.

use crate::error::{MetadataError, Result};
use crate::version::{self, PACKAGE_FORMAT_VERSION};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the `package.json` field holding the serialized descriptor.
pub const DESCRIPTOR_FIELD: &str = "weaveFramework";

/// The serialized descriptor of a published package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    pub package_format_version: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services_module: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i18n: Option<I18nDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiDescriptor>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub service_name: String,
    #[serde(default)]
    pub provides: Vec<InterfaceDescriptor>,
    #[serde(default)]
    pub references: Vec<ReferenceDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDescriptor {
    pub interface_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceDescriptor {
    #[serde(rename = "type")]
    pub kind: ReferenceKind,
    pub reference_name: String,
    pub interface_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiReferenceDescriptor {
    #[serde(rename = "type")]
    pub kind: ReferenceKind,
    pub interface_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

/// How many implementations a serialized reference binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Unique,
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct I18nDescriptor {
    #[serde(default)]
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiDescriptor {
    #[serde(default)]
    pub references: Vec<UiReferenceDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub property_name: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub required: bool,
}

impl PackageDescriptor {
    /// Create an empty descriptor in the current format.
    #[must_use]
    pub fn new() -> Self {
        Self {
            package_format_version: PACKAGE_FORMAT_VERSION.to_string(),
            ..Self::default()
        }
    }

    /// Validate the format version of a raw descriptor, then parse it.
    ///
    /// The version is checked before anything else so that a descriptor
    /// from an incompatible writer is reported as such rather than as a
    /// schema violation.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::UnsupportedFormatVersion`] for incompatible
    /// versions and a validation error for schema violations.
    pub fn from_value(value: &serde_json::Value, package: &str, path: &Path) -> Result<Self> {
        let version = value
            .get("packageFormatVersion")
            .ok_or_else(|| {
                MetadataError::validation(
                    path,
                    format!("{DESCRIPTOR_FIELD}.packageFormatVersion is missing"),
                )
            })?
            .as_str()
            .ok_or_else(|| {
                MetadataError::validation(
                    path,
                    format!("{DESCRIPTOR_FIELD}.packageFormatVersion must be a string"),
                )
            })?;

        if !version::is_package_format_compatible(version)? {
            return Err(MetadataError::UnsupportedFormatVersion {
                package: package.to_string(),
                version: version.to_string(),
                supported: PACKAGE_FORMAT_VERSION.to_string(),
            });
        }

        Self::deserialize(value).map_err(|e| {
            MetadataError::validation(path, format!("invalid {DESCRIPTOR_FIELD}: {e}"))
        })
    }

    /// Locales declared by the descriptor.
    #[must_use]
    pub fn languages(&self) -> &[String] {
        self.i18n
            .as_ref()
            .map(|i| i.languages.as_slice())
            .unwrap_or_default()
    }
}
