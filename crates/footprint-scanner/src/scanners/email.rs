use super::{api_client, body_excerpt, send_with_rate_limit_retry, ScanOutput, Scanner};
use crate::error::{Result, ScannerError};
use async_trait::async_trait;
use footprint_core::{ApiConfig, ScanCategory, ScanningConfig};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;
use tracing::{debug, info};

/// Breach lookup for an e-mail address against the HIBP v3 API.
pub struct EmailScanner {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_retry_after: Duration,
    email: String,
}

#[derive(Debug, Deserialize)]
struct BreachSummary {
    #[serde(rename = "Name")]
    name: String,
}

impl EmailScanner {
    /// Bind an address to the configured API.
    pub fn new(
        apis: &ApiConfig,
        scanning: &ScanningConfig,
        email: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: api_client(ScanCategory::Email.display_name(), apis, &scanning.user_agent)?,
            base_url: apis.hibp_base_url.trim_end_matches('/').to_string(),
            api_key: apis.hibp_api_key.clone().filter(|k| !k.trim().is_empty()),
            max_retry_after: Duration::from_secs(scanning.max_retry_after_secs),
            email: email.into().trim().to_string(),
        })
    }
}

impl EmailScanner {
    /// Lookup URL with the address as one percent-encoded path segment.
    fn breach_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ScannerError::invalid_input(self.name(), format!("invalid HIBP base URL: {e}"))
        })?;
        url.path_segments_mut()
            .map_err(|()| ScannerError::invalid_input(self.name(), "HIBP base URL has no path"))?
            .pop_if_empty()
            .extend(["breachedaccount", self.email.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl Scanner for EmailScanner {
    fn category(&self) -> ScanCategory {
        ScanCategory::Email
    }

    async fn scan(&self) -> Result<ScanOutput> {
        let name = self.name();
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ScannerError::authentication(
                name,
                "HIBP API key not provided, skipping breach check",
            ));
        };
        if !self.email.contains('@') {
            return Err(ScannerError::invalid_input(
                name,
                format!("'{}' is not an e-mail address", self.email),
            ));
        }

        let url = self.breach_url()?;
        let response = send_with_rate_limit_retry(name, self.max_retry_after, || {
            self.client.get(url.clone()).header("hibp-api-key", api_key)
        })
        .await?;

        let status = response.status();
        debug!(status = status.as_u16(), "HIBP answered");
        let breaches = match status {
            StatusCode::OK => {
                let breaches: Vec<BreachSummary> = response.json().await.map_err(|e| {
                    ScannerError::Parsing {
                        scanner: name.to_string(),
                        message: "HIBP API returned a non-JSON response".to_string(),
                        source: Some(Box::new(e)),
                    }
                })?;
                let names: Vec<String> = breaches.into_iter().map(|b| b.name).collect();
                json!({
                    "breached": true,
                    "count": names.len(),
                    "breaches": names,
                })
            }
            StatusCode::NOT_FOUND => json!({
                "breached": false,
                "message": "No breaches found for this email.",
            }),
            StatusCode::UNAUTHORIZED => {
                return Err(ScannerError::authentication(name, "HIBP rejected the API key"));
            }
            other => {
                let excerpt = body_excerpt(response).await;
                return Err(ScannerError::api(
                    name,
                    other.as_u16(),
                    format!("HIBP API error: status {}, response: {excerpt}", other.as_u16()),
                ));
            }
        };

        info!(breached = breaches["breached"].as_bool().unwrap_or(false), "email scan complete");
        let names: Vec<String> = breaches["breaches"]
            .as_array()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|b| b.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let mut output = ScanOutput::new(json!({ "breaches": breaches }));
        for breach in names {
            output = output.with_keyword("breach", breach);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner(email: &str) -> EmailScanner {
        let apis = ApiConfig {
            hibp_api_key: Some("key".to_string()),
            ..ApiConfig::default()
        };
        EmailScanner::new(&apis, &ScanningConfig::default(), email).expect("build scanner")
    }

    #[test]
    fn test_address_is_one_path_segment() {
        let url = scanner("first/last#tag?x@example.com").breach_url().expect("valid url");
        assert_eq!(
            url.as_str(),
            "https://haveibeenpwned.com/api/v3/breachedaccount/first%2Flast%23tag%3Fx@example.com"
        );
        assert_eq!(url.path_segments().map(Iterator::count), Some(3));
        assert!(url.fragment().is_none());
        assert!(url.query().is_none());
    }
}
