//! Shared types used across the Footprint workspace.
//!
//! This module defines the site identifier newtype and the scan category enum
//! that ties a category scanner to its key in the aggregate result.

use crate::error::CoreError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Newtype for site identifiers with validation.
///
/// Site IDs are 1-64 characters of ASCII letters, digits, `.`, `_` or `-`,
/// starting with a letter or digit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SiteId(String);

impl SiteId {
    /// Create a new `SiteId` from a string.
    ///
    /// Surrounding whitespace is trimmed before validation.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into().trim().to_string();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), CoreError> {
        static SITE_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = SITE_REGEX
            .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$").expect("valid regex"));

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "invalid site ID: must be 1-64 letters, digits, '.', '_' or '-', got '{id}'"
            )))
        }
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SiteId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SiteId> for String {
    fn from(id: SiteId) -> Self {
        id.0
    }
}

/// The identifier types a scan can cover.
///
/// Each category is served by one category scanner; its display name is also
/// the source of the key the scanner's output is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanCategory {
    /// Username presence across the site catalog
    Username,
    /// Full name presence across country-specific sites
    FullName,
    /// Breach lookup for an e-mail address
    Email,
    /// Profile lookup on the social network API
    SocialProfile,
    /// WHOIS, DNS and port analysis for a domain or IP
    DomainIp,
    /// Offline phone number metadata
    PhoneNumber,
}

impl ScanCategory {
    /// All categories, in the order the prompt layer offers them.
    pub const ALL: [Self; 6] = [
        Self::Username,
        Self::FullName,
        Self::Email,
        Self::SocialProfile,
        Self::DomainIp,
        Self::PhoneNumber,
    ];

    /// Human-readable scanner name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Username => "Username Scan",
            Self::FullName => "Full Name Scan",
            Self::Email => "Email Scan",
            Self::SocialProfile => "Twitter Profile Scan",
            Self::DomainIp => "Domain/IP Analysis",
            Self::PhoneNumber => "Phone Number Analysis",
        }
    }

    /// Key under which this category's output is stored in the aggregate result.
    #[must_use]
    pub fn context_key(&self) -> String {
        context_key(self.display_name())
    }

    /// Whether this category probes sites from the catalog.
    #[must_use]
    pub fn uses_catalog(&self) -> bool {
        matches!(self, Self::Username | Self::FullName)
    }
}

impl fmt::Display for ScanCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Derive a snake-case key from a display name.
///
/// Letters and digits are lowercased; every run of other characters becomes a
/// single underscore, and leading/trailing underscores are dropped.
#[must_use]
pub fn context_key(display_name: &str) -> String {
    let mut key = String::with_capacity(display_name.len());
    let mut pending_separator = false;

    for c in display_name.chars() {
        if c.is_alphanumeric() {
            if pending_separator && !key.is_empty() {
                key.push('_');
            }
            pending_separator = false;
            key.extend(c.to_lowercase());
        } else {
            pending_separator = true;
        }
    }

    key
}
