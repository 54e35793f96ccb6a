//! Site definition types and record normalization.
//!
//! Raw catalog records arrive as loosely-typed JSON objects in two shapes: the
//! canonical one (`urlTemplate`, `noResult`, `requiresJs`) and the legacy
//! username shape (`url`, `errorType`, `errorString`, `checkType`,
//! `checkMethod`). Both are deserialized into [`RawSiteRecord`] and normalized
//! into a [`SiteDefinition`] by [`SiteDefinition::try_from`]. Nothing else in
//! the workspace sees raw records.

use crate::error::{CatalogError, Result};
use chrono::NaiveDate;
use footprint_core::SiteId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// Placeholder name implied by an unnamed `{}` in a URL template.
pub const DEFAULT_PLACEHOLDER: &str = "username";

/// HTTP method used by the static probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET request
    #[default]
    Get,
    /// POST request with an empty body
    Post,
    /// HEAD request
    Head,
}

impl HttpMethod {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "HEAD" => Some(Self::Head),
            _ => None,
        }
    }

    /// Method name as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Head => "HEAD",
        }
    }
}

/// Expected response body kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// HTML page
    #[default]
    Html,
    /// JSON document
    Json,
}

/// Whether the matching rules describe absence or presence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    /// Rules describe the "no such user" page
    #[default]
    Negative,
    /// Rules describe a successful hit
    Positive,
}

/// Rule that recognises a "no result" response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoResultRule {
    /// The body contains one of the needles (case-insensitive)
    Contains {
        /// Needles, already lowercased
        needles: Vec<String>,
    },
    /// The response status equals one of the given codes
    StatusCode {
        /// Status codes meaning "absent"
        statuses: Vec<u16>,
    },
}

/// Legal metadata attached to a site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalInfo {
    /// Whether automated lookups are allowed
    #[serde(default)]
    pub allowed: Option<bool>,
    /// Free-form note
    #[serde(default)]
    pub note: Option<String>,
}

/// A validated, immutable site definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteDefinition {
    /// Unique site identifier
    pub id: SiteId,
    /// Display name
    pub name: String,
    /// Site home page
    pub home_url: Option<String>,
    /// URL template with named `{placeholder}` segments
    pub url_template: String,
    /// Placeholders the template expects
    pub placeholders: Vec<String>,
    /// Placeholders only filled in advanced searches
    pub advanced_placeholders: Vec<String>,
    /// Percent-encode parameter values before substitution
    pub url_encode: bool,
    /// HTTP method for the static probe
    pub method: HttpMethod,
    /// Expected response kind
    pub response_type: ResponseType,
    /// Page must be rendered in a browser
    pub requires_js: bool,
    /// Primary "no result" rule
    pub no_result: Option<NoResultRule>,
    /// Error strings (lowercased) whose presence means not found
    pub error_strings: Vec<String>,
    /// Whether the rules describe absence or presence
    pub check_type: CheckType,
    /// Marker whose presence means found, for positive checks
    pub success_string: Option<String>,
    /// Extra request headers; a `User-Agent` entry overrides the default
    pub headers: BTreeMap<String, String>,
    /// Per-request timeout override in seconds
    pub timeout_secs: Option<u64>,
    /// Extra attempts after the first one
    pub retries: u32,
    /// Maximum probes per minute against this site
    pub rate_limit_per_minute: Option<u32>,
    /// Inactive sites are never probed
    pub active: bool,
    /// Apply the generic negative-phrase filter to this site
    pub negative_phrase_filter: bool,
    /// Date the definition was last checked by a maintainer
    pub last_verified: Option<NaiveDate>,
    /// Legal metadata
    pub legal: Option<LegalInfo>,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Free-form notes
    pub notes: Option<String>,
}

impl SiteDefinition {
    /// Parse and normalize a single raw JSON record.
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawSiteRecord =
            serde_json::from_value(value).map_err(|e| CatalogError::InvalidRecord {
                site: "<unknown>".to_string(),
                reason: e.to_string(),
            })?;
        Self::try_from(raw)
    }

    /// Whether `name` is one of this site's template placeholders.
    #[must_use]
    pub fn has_placeholder(&self, name: &str) -> bool {
        self.placeholders.iter().any(|p| p == name)
    }

    /// Whether `name` is one of this site's advanced placeholders.
    #[must_use]
    pub fn has_advanced_placeholder(&self, name: &str) -> bool {
        self.advanced_placeholders.iter().any(|p| p == name)
    }
}

/// Sites available for full-name searches in one country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountrySites {
    /// Country name as written in the document
    pub country: String,
    /// Optional ISO country code
    pub country_code: Option<String>,
    /// Validated sites for this country
    pub sites: Vec<Arc<SiteDefinition>>,
}

impl CountrySites {
    /// Case-insensitive match against a country name or code.
    #[must_use]
    pub fn matches(&self, country: &str) -> bool {
        let country = country.trim();
        self.country.eq_ignore_ascii_case(country)
            || self
                .country_code
                .as_deref()
                .is_some_and(|code| code.eq_ignore_ascii_case(country))
    }
}

/// Country record as it appears in the full-name document.
#[derive(Debug, Deserialize)]
pub struct RawCountryRecord {
    /// Country name
    pub country: String,
    /// Optional ISO country code
    #[serde(default)]
    pub country_code: Option<String>,
    /// Raw site records, validated one by one
    #[serde(default)]
    pub sites: Vec<Value>,
}

/// A site record as found in a catalog document, before normalization.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSiteRecord {
    id: Option<String>,
    name: Option<String>,
    home_url: Option<String>,
    #[serde(alias = "url")]
    url_template: Option<String>,
    placeholders: Option<Vec<String>>,
    #[serde(default, alias = "advanced_placeholders")]
    advanced_placeholders: Vec<String>,
    #[serde(default)]
    url_encode: bool,
    method: Option<String>,
    response_type: Option<ResponseType>,
    requires_js: Option<bool>,
    check_method: Option<String>,
    no_result: Option<RawNoResult>,
    error_type: Option<String>,
    error_string: Option<OneOrMany>,
    check_type: Option<CheckType>,
    success_string: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    timeout_seconds: Option<u64>,
    retries: Option<u32>,
    rate_limit_per_minute: Option<u32>,
    last_verified: Option<String>,
    active: Option<bool>,
    legal: Option<LegalInfo>,
    #[serde(default)]
    tags: Vec<String>,
    notes: Option<String>,
    #[serde(default)]
    negative_phrase_filter: bool,
}

#[derive(Debug, Deserialize)]
struct RawNoResult {
    #[serde(rename = "type")]
    kind: String,
    value: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

impl TryFrom<RawSiteRecord> for SiteDefinition {
    type Error = CatalogError;

    fn try_from(raw: RawSiteRecord) -> Result<Self> {
        let label = raw
            .id
            .clone()
            .or_else(|| raw.name.clone())
            .unwrap_or_else(|| "<unnamed>".to_string());
        let invalid = |reason: String| CatalogError::InvalidRecord {
            site: label.clone(),
            reason,
        };

        let id = match raw.id.as_deref() {
            Some(id) => SiteId::new(id).map_err(|e| invalid(e.to_string()))?,
            None => return Err(invalid("missing required field `id`".to_string())),
        };

        let template = raw
            .url_template
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| invalid("missing required field `urlTemplate`".to_string()))?;

        if !(template.starts_with("http://") || template.starts_with("https://")) {
            return Err(invalid(format!(
                "urlTemplate must be an http(s) URL, got '{template}'"
            )));
        }

        let url_template = template.replace("{}", &format!("{{{DEFAULT_PLACEHOLDER}}}"));
        let placeholders = match raw.placeholders {
            Some(list) if !list.is_empty() => list,
            _ => template_placeholders(&url_template),
        };

        let method = match raw.method.as_deref() {
            Some(m) => HttpMethod::parse(m)
                .ok_or_else(|| invalid(format!("unsupported HTTP method '{m}'")))?,
            None => HttpMethod::default(),
        };

        let requires_js = raw.requires_js.unwrap_or_else(|| {
            raw.check_method
                .as_deref()
                .is_some_and(|m| m.eq_ignore_ascii_case("dynamic"))
        });

        let no_result = raw
            .no_result
            .map(|rule| parse_no_result(rule).map_err(&invalid))
            .transpose()?;

        let error_strings = match raw.error_type.as_deref() {
            Some("string") => {
                let strings: Vec<String> = raw
                    .error_string
                    .map(OneOrMany::into_vec)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_lowercase())
                    .collect();
                if strings.is_empty() && no_result.is_none() {
                    return Err(invalid(
                        "errorType \"string\" requires a non-empty errorString".to_string(),
                    ));
                }
                strings
            }
            Some("status_code") | None => Vec::new(),
            Some(other) => return Err(invalid(format!("unsupported errorType '{other}'"))),
        };

        let last_verified = raw.last_verified.as_deref().and_then(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| {
                    tracing::debug!(
                        site = %id,
                        value = %date,
                        error = %e,
                        "ignoring unparsable lastVerified"
                    );
                })
                .ok()
        });

        Ok(Self {
            name: raw
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| id.to_string()),
            id,
            home_url: raw.home_url,
            url_template,
            placeholders,
            advanced_placeholders: raw.advanced_placeholders,
            url_encode: raw.url_encode,
            method,
            response_type: raw.response_type.unwrap_or_default(),
            requires_js,
            no_result,
            error_strings,
            check_type: raw.check_type.unwrap_or_default(),
            success_string: raw.success_string.filter(|s| !s.is_empty()),
            headers: raw.headers,
            timeout_secs: raw.timeout_seconds.filter(|t| *t > 0),
            retries: raw.retries.unwrap_or(0),
            rate_limit_per_minute: raw.rate_limit_per_minute.filter(|r| *r > 0),
            active: raw.active.unwrap_or(true),
            negative_phrase_filter: raw.negative_phrase_filter,
            last_verified,
            legal: raw.legal,
            tags: raw.tags,
            notes: raw.notes,
        })
    }
}

/// Extract the `{name}` placeholders of a template, in order of first use.
#[must_use]
pub fn template_placeholders(template: &str) -> Vec<String> {
    static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PLACEHOLDER_REGEX
        .get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

    let mut names: Vec<String> = Vec::new();
    for capture in regex.captures_iter(template) {
        let name = capture[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

fn parse_no_result(rule: RawNoResult) -> std::result::Result<NoResultRule, String> {
    let values = match rule.value {
        Value::Array(items) => items,
        other => vec![other],
    };

    match rule.kind.as_str() {
        "contains" => {
            let needles: Vec<String> = values
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) if !s.is_empty() => Some(s.to_lowercase()),
                    _ => None,
                })
                .collect();
            if needles.is_empty() {
                return Err("noResult \"contains\" needs a non-empty string value".to_string());
            }
            Ok(NoResultRule::Contains { needles })
        }
        "status_code" => {
            let statuses = values
                .iter()
                .map(|v| match v {
                    Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
                    Value::String(s) => s.trim().parse::<u16>().ok(),
                    _ => None,
                })
                .collect::<Option<Vec<u16>>>()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| "noResult \"status_code\" needs numeric status values".to_string())?;
            Ok(NoResultRule::StatusCode { statuses })
        }
        other => Err(format!("unsupported noResult type '{other}'")),
    }
}
