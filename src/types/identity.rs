//! Package identity: group, name, and semantic version.
//!
//! The identity triple is validated at construction, so every
//! `PackageIdentity` in the system is known to satisfy the identifier
//! grammar before any I/O happens.

use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier segments may only use alphanumerics plus `-`, `.`, `_`.
const MAX_SEGMENT_LEN: usize = 50;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Package name must not be empty")]
    EmptyName,

    #[error("Invalid package name '{0}': only letters, digits, '-', '.', '_' are allowed")]
    InvalidName(String),

    #[error("Invalid package group '{0}': only letters, digits, '-', '.', '_', '/' are allowed")]
    InvalidGroup(String),

    #[error("Invalid version: {0}")]
    Version(#[from] semver::Error),

    #[error("Invalid package specifier '{0}': expected [group/]name@version")]
    InvalidSpec(String),
}

/// A validated package identity.
///
/// # Example
///
/// ```
/// use upack::types::PackageIdentity;
///
/// let id = PackageIdentity::new(Some("tools"), "builder", "1.2.3-beta").unwrap();
/// assert_eq!(id.to_string(), "tools/builder:1.2.3-beta");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIdentity {
    group: Option<String>,
    name: String,
    version: Version,
}

impl PackageIdentity {
    /// Validate and construct an identity from raw parts.
    ///
    /// An empty or whitespace-only group is treated as no group.
    pub fn new(group: Option<&str>, name: &str, version: &str) -> Result<Self, IdentityError> {
        if name.is_empty() {
            return Err(IdentityError::EmptyName);
        }
        if !is_valid_segment(name) {
            return Err(IdentityError::InvalidName(name.to_string()));
        }

        let group = match group.map(str::trim) {
            None | Some("") => None,
            Some(g) => {
                if !is_valid_group(g) {
                    return Err(IdentityError::InvalidGroup(g.to_string()));
                }
                Some(g.to_string())
            }
        };

        let version = Version::parse(version)?;

        Ok(Self {
            group,
            name: name.to_string(),
            version,
        })
    }

    /// Parse a package specifier like `tools/builder@1.2.3`.
    ///
    /// The version is mandatory; group is everything before the final `/`.
    pub fn parse_spec(spec: &str) -> Result<Self, IdentityError> {
        let (path, version) = spec
            .split_once('@')
            .ok_or_else(|| IdentityError::InvalidSpec(spec.to_string()))?;
        if path.is_empty() || version.is_empty() {
            return Err(IdentityError::InvalidSpec(spec.to_string()));
        }

        match path.rsplit_once('/') {
            Some((group, name)) => Self::new(Some(group), name, version),
            None => Self::new(None, path, version),
        }
    }

    /// Package group, if any.
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Canonical file name for this identity: `<name>-<version>`.
    pub fn file_stem(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{}/{}:{}", group, self.name, self.version),
            None => write!(f, "{}:{}", self.name, self.version),
        }
    }
}

fn is_valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_SEGMENT_LEN
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
}

fn is_valid_group(group: &str) -> bool {
    group.split('/').all(is_valid_segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identity() {
        let id = PackageIdentity::new(Some("tools"), "builder", "1.2.3-beta").unwrap();
        assert_eq!(id.group(), Some("tools"));
        assert_eq!(id.name(), "builder");
        assert_eq!(id.version().to_string(), "1.2.3-beta");
    }

    #[test]
    fn test_no_group() {
        let id = PackageIdentity::new(None, "jq", "1.7.1").unwrap();
        assert_eq!(id.group(), None);
        assert_eq!(id.to_string(), "jq:1.7.1");
    }

    #[test]
    fn test_empty_group_is_none() {
        let id = PackageIdentity::new(Some(""), "jq", "1.7.1").unwrap();
        assert_eq!(id.group(), None);
    }

    #[test]
    fn test_nested_group() {
        let id = PackageIdentity::new(Some("acme/internal"), "tool", "0.1.0").unwrap();
        assert_eq!(id.group(), Some("acme/internal"));
    }

    #[test]
    fn test_rejects_empty_name() {
        assert!(matches!(
            PackageIdentity::new(None, "", "1.0.0"),
            Err(IdentityError::EmptyName)
        ));
    }

    #[test]
    fn test_rejects_path_separator_in_name() {
        assert!(matches!(
            PackageIdentity::new(None, "a/b", "1.0.0"),
            Err(IdentityError::InvalidName(_))
        ));
    }

    #[test]
    fn test_rejects_bad_group() {
        assert!(PackageIdentity::new(Some("/leading"), "x", "1.0.0").is_err());
        assert!(PackageIdentity::new(Some("trailing/"), "x", "1.0.0").is_err());
        assert!(PackageIdentity::new(Some("sp ace"), "x", "1.0.0").is_err());
    }

    #[test]
    fn test_rejects_bad_version() {
        assert!(matches!(
            PackageIdentity::new(None, "x", "not-a-version"),
            Err(IdentityError::Version(_))
        ));
        assert!(PackageIdentity::new(None, "x", "1.2").is_err());
    }

    #[test]
    fn test_parse_spec() {
        let id = PackageIdentity::parse_spec("tools/builder@1.2.3").unwrap();
        assert_eq!(id.group(), Some("tools"));
        assert_eq!(id.name(), "builder");

        let id = PackageIdentity::parse_spec("jq@1.7.1").unwrap();
        assert_eq!(id.group(), None);
        assert_eq!(id.name(), "jq");
    }

    #[test]
    fn test_parse_spec_invalid() {
        assert!(PackageIdentity::parse_spec("jq").is_err());
        assert!(PackageIdentity::parse_spec("@1.0.0").is_err());
        assert!(PackageIdentity::parse_spec("jq@").is_err());
    }

    #[test]
    fn test_file_stem() {
        let id = PackageIdentity::new(Some("demo"), "pkg", "1.0.0").unwrap();
        assert_eq!(id.file_stem(), "pkg-1.0.0");
    }
}
