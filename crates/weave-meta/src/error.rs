//! Errors raised while resolving package metadata.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = MetadataError> = std::result::Result<T, E>;

/// Maximum number of packages listed in a locale coverage error.
pub const MAX_REPORTED_PACKAGES: usize = 5;

/// Errors that can occur while resolving package metadata.
///
/// Every error is terminal for the current resolution pass. Errors are
/// cheap to clone so a single computation can report the same failure to
/// every caller waiting on it.
#[derive(Error, Debug, Clone)]
pub enum MetadataError {
    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("failed to parse '{}': {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration in '{}': {message}", .path.display())]
    Validation { path: PathBuf, message: String },

    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error(
        "package '{package}' uses package format version {version}, which is not supported \
         by this tool (supported: {supported})"
    )]
    UnsupportedFormatVersion {
        package: String,
        version: String,
        supported: String,
    },

    #[error(
        "package '{package}' requires runtime version {version}, which is not compatible \
         with runtime version {supported}"
    )]
    UnsupportedRuntimeVersion {
        package: String,
        version: String,
        supported: String,
    },

    #[error("{kind} '{name}' is defined multiple times in {owner}")]
    Duplicate {
        kind: DefinitionKind,
        name: String,
        owner: String,
    },

    #[error(
        "package '{package}' was found at two locations: '{}' and '{}'",
        .first.display(),
        .second.display()
    )]
    DuplicatePackageLocation {
        package: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("failed to resolve dependency '{dependency}' of package '{package}'")]
    MissingDependency { package: String, dependency: String },

    #[error("{what} of package '{package}' does not exist: '{}'", .path.display())]
    MissingFile {
        package: String,
        what: String,
        path: PathBuf,
    },

    #[error(
        "package '{package}' has both '{}' and a serialized descriptor in '{}'; \
         remove one of them",
        .build_config.display(),
        .package_json.display()
    )]
    AmbiguousConfiguration {
        package: String,
        build_config: PathBuf,
        package_json: PathBuf,
    },

    #[error(
        "package '{package}' has no messages for locale '{locale}' (supported locales: {}) \
         and the app provides no overrides for it",
        format_locales(.available)
    )]
    MissingTranslation {
        package: String,
        locale: String,
        available: Vec<String>,
    },

    #[error(
        "the app supports the locales {}, but these packages support none of them:\n{}",
        format_locales(.app_locales),
        format_mismatches(.packages, .remaining)
    )]
    NoLocaleMatch {
        app_locales: Vec<String>,
        packages: Vec<LocaleMismatch>,
        remaining: usize,
    },
}

/// Classification of [`MetadataError`]s, independent of their payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    UnsupportedFormatVersion,
    UnsupportedRuntimeVersion,
    Validation,
    DuplicateDefinition,
    DuplicatePackageLocation,
    MissingDependency,
    MissingFile,
    AmbiguousConfiguration,
    LocaleCoverage,
}

impl MetadataError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::Parse { .. } | Self::Validation { .. } | Self::InvalidVersion { .. } => {
                ErrorKind::Validation
            }
            Self::UnsupportedFormatVersion { .. } => ErrorKind::UnsupportedFormatVersion,
            Self::UnsupportedRuntimeVersion { .. } => ErrorKind::UnsupportedRuntimeVersion,
            Self::Duplicate { .. } => ErrorKind::DuplicateDefinition,
            Self::DuplicatePackageLocation { .. } => ErrorKind::DuplicatePackageLocation,
            Self::MissingDependency { .. } => ErrorKind::MissingDependency,
            Self::MissingFile { .. } => ErrorKind::MissingFile,
            Self::AmbiguousConfiguration { .. } => ErrorKind::AmbiguousConfiguration,
            Self::MissingTranslation { .. } | Self::NoLocaleMatch { .. } => {
                ErrorKind::LocaleCoverage
            }
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn validation(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// The kind of item a [`MetadataError::Duplicate`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    Service,
    Interface,
    Reference,
    Property,
    MessageKey,
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Service => "service",
            Self::Interface => "provided interface",
            Self::Reference => "reference",
            Self::Property => "property",
            Self::MessageKey => "message key",
        };
        f.write_str(s)
    }
}

/// A package whose locales do not intersect with the app's locales.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleMismatch {
    pub package: String,
    pub locales: Vec<String>,
}

fn format_locales(locales: &[String]) -> String {
    if locales.is_empty() {
        return String::from("none");
    }
    locales
        .iter()
        .map(|l| format!("'{l}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_mismatches(packages: &[LocaleMismatch], remaining: &usize) -> String {
    let mut lines = packages
        .iter()
        .map(|p| format!("  - {} (supports {})", p.package, format_locales(&p.locales)))
        .collect::<Vec<_>>();
    if *remaining > 0 {
        lines.push(format!("  ... and {remaining} more"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_locale_match_lists_remainder() {
        let err = MetadataError::NoLocaleMatch {
            app_locales: vec!["de".into()],
            packages: vec![LocaleMismatch {
                package: "search".into(),
                locales: vec!["en".into()],
            }],
            remaining: 3,
        };
        let message = err.to_string();
        assert!(message.contains("search (supports 'en')"));
        assert!(message.contains("and 3 more"));
        assert_eq!(err.kind(), ErrorKind::LocaleCoverage);
    }

    #[test]
    fn missing_translation_names_available_locales() {
        let err = MetadataError::MissingTranslation {
            package: "search".into(),
            locale: "de".into(),
            available: vec!["en".into()],
        };
        assert!(err.to_string().contains("'search'"));
        assert!(err.to_string().contains("'en'"));
    }

    #[test]
    fn parse_errors_are_validation_errors() {
        let err = MetadataError::parse("/pkg/package.json", "expected value");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
