//! Reader/writer compatibility for versioned package data.
//!
//! A reader accepts data written by any version of the same major line that
//! is not newer than itself. In addition, it accepts data written by a newer
//! *patch* release of its own minor line, so older tooling can open files
//! produced by slightly newer tooling. Anything from another major line, or
//! from a newer minor line, is rejected.

use crate::error::{MetadataError, Result};
use semver::{Comparator, Op, Prerelease, Version, VersionReq};

/// The serialized descriptor format written by this crate.
pub const PACKAGE_FORMAT_VERSION: Version = Version::new(1, 0, 0);

/// Returns true if a reader at `current` can read data written by `other`.
///
/// `current` is trusted. `other` comes from untrusted input; a parse failure
/// is reported as [`MetadataError::InvalidVersion`].
///
/// # Errors
///
/// Returns an error if `other` is not a valid semantic version.
pub fn is_reader_compatible(current: &Version, other: &str) -> Result<bool> {
    let other = parse_version(other)?;
    Ok(is_compatible(current, &other))
}

/// Checks the `packageFormatVersion` of a serialized descriptor.
///
/// # Errors
///
/// Returns an error if the version cannot be parsed.
pub fn is_package_format_compatible(other: &str) -> Result<bool> {
    is_reader_compatible(&PACKAGE_FORMAT_VERSION, other)
}

/// Checks the `runtimeVersion` a package was built against.
///
/// # Errors
///
/// Returns an error if the version cannot be parsed.
pub fn is_runtime_version_compatible(runtime: &Version, other: &str) -> Result<bool> {
    is_reader_compatible(runtime, other)
}

/// Parse an untrusted version string.
///
/// # Errors
///
/// Returns [`MetadataError::InvalidVersion`] describing the parse failure.
pub fn parse_version(version: &str) -> Result<Version> {
    Version::parse(version.trim()).map_err(|e| MetadataError::InvalidVersion {
        version: version.to_string(),
        reason: e.to_string(),
    })
}

fn is_compatible(current: &Version, other: &Version) -> bool {
    if current.major == other.major && current >= other {
        return true;
    }
    same_minor_line(current).matches(other)
}

/// The `~current` range: same major and minor, patch at least `current`'s.
fn same_minor_line(current: &Version) -> VersionReq {
    VersionReq {
        comparators: vec![Comparator {
            op: Op::Tilde,
            major: current.major,
            minor: Some(current.minor),
            patch: Some(current.patch),
            pre: Prerelease::EMPTY,
        }],
    }
}
