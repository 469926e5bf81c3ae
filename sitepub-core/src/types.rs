//! Domain types shared by every sitepub crate.
//!
//! Names that the cloud APIs validate (buckets, documents) are parsed once into
//! newtypes so later stages never re-check them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A validated S3 bucket name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketName(String);

impl BucketName {
    /// Parse a bucket name using the S3 general-purpose naming rules:
    /// 3–63 characters, lowercase letters, digits, `.` and `-`, starting and
    /// ending with a letter or digit, no `..`.
    pub fn parse(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        let invalid = |reason| ConfigError::InvalidBucket {
            name: name.clone(),
            reason,
        };

        if name.len() < 3 || name.len() > 63 {
            return Err(invalid("must be between 3 and 63 characters"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
        {
            return Err(invalid(
                "only lowercase letters, digits, '.' and '-' are allowed",
            ));
        }
        let alnum = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
        if !alnum(name.chars().next()) || !alnum(name.chars().last()) {
            return Err(invalid("must start and end with a letter or digit"));
        }
        if name.contains("..") {
            return Err(invalid("must not contain consecutive dots"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for BucketName {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<BucketName> for String {
    fn from(b: BucketName) -> Self {
        b.0
    }
}

/// A bare file name served as the index or error document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DocumentName(String);

impl DocumentName {
    pub fn parse(field: &'static str, value: impl Into<String>) -> Result<Self, ConfigError> {
        let value = value.into();
        let bare = !value.trim().is_empty()
            && !value.contains('/')
            && !value.contains('\\')
            && value != "."
            && value != "..";
        if !bare {
            return Err(ConfigError::InvalidDocument { field, value });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A CloudFront distribution identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistributionId(pub String);

impl fmt::Display for DistributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for DistributionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DistributionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// ACLs
// ---------------------------------------------------------------------------

/// Canned ACL applied to every uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Acl {
    PublicRead,
    Private,
    AuthenticatedRead,
}

impl Acl {
    /// `public-read` for public sites, otherwise the configured non-public variant.
    pub fn select(public_read: bool, private_acl: PrivateAcl) -> Self {
        if public_read {
            Acl::PublicRead
        } else {
            private_acl.into()
        }
    }

    /// The canned ACL string the S3 API expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Acl::PublicRead => "public-read",
            Acl::Private => "private",
            Acl::AuthenticatedRead => "authenticated-read",
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Acl::PublicRead)
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ACL used when the site is not public.
///
/// The deploy scripts disagreed on this value, so it is configuration rather
/// than a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PrivateAcl {
    #[default]
    Private,
    AuthenticatedRead,
}

impl From<PrivateAcl> for Acl {
    fn from(p: PrivateAcl) -> Self {
        match p {
            PrivateAcl::Private => Acl::Private,
            PrivateAcl::AuthenticatedRead => Acl::AuthenticatedRead,
        }
    }
}

impl FromStr for PrivateAcl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "authenticated-read" => Ok(Self::AuthenticatedRead),
            other => Err(format!(
                "unknown private ACL '{other}'; expected: private, authenticated-read"
            )),
        }
    }
}

impl fmt::Display for PrivateAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Acl::from(*self).fmt(f)
    }
}
