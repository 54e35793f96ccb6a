//! Category scanners.
//!
//! Each scanner serves one [`ScanCategory`]: the catalog-backed ones prepare
//! probe jobs for the [`ScanOrchestrator`](crate::ScanOrchestrator), the
//! others call a single external service or library.

use crate::error::{Result, ScannerError};
use crate::probe::retry_after;
use async_trait::async_trait;
use footprint_core::{ApiConfig, ScanCategory};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

pub mod domain_ip;
pub mod email;
pub mod full_name;
pub mod phone;
pub mod social;
pub mod username;

pub use domain_ip::DomainIpScanner;
pub use email::EmailScanner;
pub use full_name::{FullNameScanner, FullNameTarget};
pub use phone::PhoneScanner;
pub use social::SocialProfileScanner;
pub use username::UsernameScanner;

/// Keywords grouped by kind, e.g. `"location" -> ["Oslo"]`.
pub type Keywords = BTreeMap<String, Vec<String>>;

/// What a scanner hands back to the manager.
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    /// Category result, stored under the category key
    pub data: serde_json::Value,
    /// Keywords merged into the aggregate side channel
    pub osint_keywords: Keywords,
}

impl ScanOutput {
    /// Output without keywords.
    #[must_use]
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            data,
            osint_keywords: Keywords::new(),
        }
    }

    /// Add a keyword of `kind`, ignoring blanks.
    #[must_use]
    pub fn with_keyword(mut self, kind: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.osint_keywords.entry(kind.to_string()).or_default().push(value);
        }
        self
    }
}

/// One category scan with its target already bound.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Category served.
    fn category(&self) -> ScanCategory;

    /// Human-readable name, also the origin of the result key.
    fn name(&self) -> &'static str {
        self.category().display_name()
    }

    /// Run the scan.
    async fn scan(&self) -> Result<ScanOutput>;
}

/// HTTP client for single-call API scanners.
pub(crate) fn api_client(
    component: &str,
    apis: &ApiConfig,
    user_agent: &str,
) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent.to_string())
        .timeout(Duration::from_secs(apis.timeout_secs))
        .build()
        .map_err(|e| ScannerError::internal(component, format!("HTTP client: {e}")))
}

/// Send a request, sleeping once on HTTP 429 before a single retry.
///
/// A second 429 is returned as [`ScannerError::RateLimited`].
pub(crate) async fn send_with_rate_limit_retry<F>(
    component: &str,
    max_wait: Duration,
    build: F,
) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let context = format!("{component} request");
    let response = build()
        .send()
        .await
        .map_err(|e| ScannerError::from_reqwest(component, &context, e))?;
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return Ok(response);
    }

    let wait = retry_after(response.headers())
        .unwrap_or(Duration::from_secs(2))
        .min(max_wait);
    warn!(scanner = component, wait_secs = wait.as_secs(), "rate limited, waiting once");
    tokio::time::sleep(wait).await;

    let response = build()
        .send()
        .await
        .map_err(|e| ScannerError::from_reqwest(component, &context, e))?;
    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        return Err(ScannerError::RateLimited {
            scanner: component.to_string(),
            retry_after: retry_after(response.headers()),
        });
    }
    Ok(response)
}

/// First characters of an error body, for messages.
pub(crate) async fn body_excerpt(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    text.chars().take(100).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_keywords_skip_blanks() {
        let output = ScanOutput::new(serde_json::json!({}))
            .with_keyword("location", "Oslo")
            .with_keyword("location", "  ")
            .with_keyword("name", "Alice");

        assert_eq!(output.osint_keywords["location"], vec!["Oslo"]);
        assert_eq!(output.osint_keywords["name"], vec!["Alice"]);
        assert_eq!(output.osint_keywords.len(), 2);
    }
}
