//! Probe strategies.
//!
//! A probe asks one site whether it knows the target. [`StaticProber`] does
//! it with a single HTTP request, [`DynamicProber`] renders the page in a
//! browser context first. Both bound their in-flight work with their own
//! semaphore, share the per-site throttle and hand the response to
//! [`decide`](crate::decision::decide).

use crate::decision::{decide, DecisionPolicy};
use crate::error::{Result, ScannerError};
use crate::throttle::SiteThrottle;
use footprint_browser::{BrowserSession, RenderOptions};
use footprint_catalog::{HttpMethod, SiteDefinition};
use footprint_core::{BrowserConfig, ScanningConfig, SiteId, WaitUntil};
use reqwest::header::{HeaderMap, RETRY_AFTER, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Base delay between attempts after a transport failure.
const RETRY_DELAY_MS: u64 = 250;

/// Wait applied to a 429 that carries no `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(2);

/// Status recorded when a render never saw its document response.
///
/// It is outside 2xx, so the default rule reads it as not found.
pub const UNSEEN_STATUS: u16 = 0;

const STATIC_COMPONENT: &str = "Static Probe";
const DYNAMIC_COMPONENT: &str = "Dynamic Probe";

/// How a site is probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStrategy {
    /// Plain HTTP request
    Static,
    /// Rendered in a headless browser
    Dynamic,
}

impl ProbeStrategy {
    /// Strategy required by a site.
    #[must_use]
    pub fn for_site(site: &SiteDefinition) -> Self {
        if site.requires_js {
            Self::Dynamic
        } else {
            Self::Static
        }
    }
}

/// Definitive result of probing one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    /// Site that was probed
    pub site_id: SiteId,
    /// Display name of the site
    pub site_name: String,
    /// URL the probe was sent to
    pub url: String,
    /// Whether the target was found
    pub found: bool,
    /// Strategy used
    pub strategy: ProbeStrategy,
    /// Failure that ended the probe; `found` is false when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Settings shared by every probe of one strategy.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Timeout when the site does not set its own
    pub default_timeout: Duration,
    /// Retry a not-found result while attempts remain
    pub retry_not_found: bool,
    /// Decision switches
    pub policy: DecisionPolicy,
    /// Upper bound for a `Retry-After` sleep
    pub max_retry_after: Duration,
}

impl ProbeSettings {
    /// Settings for `strategy` taken from configuration.
    #[must_use]
    pub fn new(
        scanning: &ScanningConfig,
        browser: &BrowserConfig,
        strategy: ProbeStrategy,
    ) -> Self {
        let (default_timeout, retry_not_found) = match strategy {
            ProbeStrategy::Static => (
                Duration::from_secs(scanning.request_timeout_secs),
                scanning.retry_not_found_static,
            ),
            ProbeStrategy::Dynamic => (
                Duration::from_secs(browser.navigation_timeout_secs),
                scanning.retry_not_found_dynamic,
            ),
        };
        Self {
            default_timeout,
            retry_not_found,
            policy: DecisionPolicy::from_config(scanning),
            max_retry_after: Duration::from_secs(scanning.max_retry_after_secs),
        }
    }

    fn timeout_for(&self, site: &SiteDefinition) -> Duration {
        site.timeout_secs
            .map_or(self.default_timeout, Duration::from_secs)
    }
}

/// What the attempt loop does after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the given pause
    Retry(Duration),
    /// Surface the error now
    GiveUp,
}

impl RetryDecision {
    /// Decide how to continue after `error` on attempt number `attempt` (1-based).
    #[must_use]
    pub fn after(error: &ScannerError, attempt: u32, max_retry_after: Duration) -> Self {
        if !error.is_retryable() {
            return Self::GiveUp;
        }
        let pause = match error {
            ScannerError::RateLimited { retry_after, .. } => {
                retry_after.unwrap_or(DEFAULT_RETRY_AFTER).min(max_retry_after)
            }
            _ => Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)),
        };
        Self::Retry(pause)
    }
}

/// Run `attempt` up to `retries + 1` times for `site`.
///
/// A hit ends the loop at once. A miss ends it unless the settings ask for
/// not-found results to be retried. A retryable error is retried while
/// attempts remain; the last one is returned.
pub async fn with_retries<F, Fut>(
    site: &SiteDefinition,
    settings: &ProbeSettings,
    mut attempt: F,
) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let total = site.retries.saturating_add(1);
    let mut last_error = None;

    for n in 1..=total {
        match attempt().await {
            Ok(true) => return Ok(true),
            Ok(false) => {
                if !settings.retry_not_found || n == total {
                    return Ok(false);
                }
                debug!(site = %site.id, attempt = n, "no result, retrying");
                last_error = None;
            }
            Err(e) => match RetryDecision::after(&e, n, settings.max_retry_after) {
                RetryDecision::GiveUp => return Err(e),
                RetryDecision::Retry(pause) => {
                    if n < total {
                        warn!(
                            site = %site.id,
                            attempt = n,
                            of = total,
                            error = %e,
                            "probe attempt failed, retrying in {pause:?}"
                        );
                        tokio::time::sleep(pause).await;
                    }
                    last_error = Some(e);
                }
            },
        }
    }

    match last_error {
        Some(e) => Err(e),
        None => Ok(false),
    }
}

/// HTTP prober for sites that need no JavaScript.
#[derive(Debug)]
pub struct StaticProber {
    client: reqwest::Client,
    permits: Semaphore,
    throttle: Arc<SiteThrottle>,
    settings: ProbeSettings,
}

impl StaticProber {
    /// Build the HTTP client and pool from configuration.
    pub fn new(
        scanning: &ScanningConfig,
        browser: &BrowserConfig,
        throttle: Arc<SiteThrottle>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(scanning.user_agent.clone())
            .danger_accept_invalid_certs(!scanning.verify_tls)
            .timeout(Duration::from_secs(scanning.request_timeout_secs))
            .build()
            .map_err(|e| ScannerError::internal(STATIC_COMPONENT, format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            permits: Semaphore::new(scanning.static_concurrency.max(1)),
            throttle,
            settings: ProbeSettings::new(scanning, browser, ProbeStrategy::Static),
        })
    }

    /// Probe `url` for `site`, retrying per the site's budget.
    pub async fn probe(&self, site: &SiteDefinition, url: &str) -> Result<bool> {
        with_retries(site, &self.settings, || self.attempt(site, url)).await
    }

    async fn attempt(&self, site: &SiteDefinition, url: &str) -> Result<bool> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ScannerError::internal(STATIC_COMPONENT, e.to_string()))?;
        self.throttle.wait(site).await;

        let method = match site.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Head => reqwest::Method::HEAD,
        };

        // Site headers win over the client's default user agent
        let mut request = self
            .client
            .request(method, url)
            .timeout(self.settings.timeout_for(site));
        for (name, value) in &site.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let context = format!("probing {}", site.id);
        let response = request
            .send()
            .await
            .map_err(|e| ScannerError::from_reqwest(STATIC_COMPONENT, &context, e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ScannerError::RateLimited {
                scanner: STATIC_COMPONENT.to_string(),
                retry_after: retry_after(response.headers()),
            });
        }

        let body = if site.method == HttpMethod::Head {
            String::new()
        } else {
            response
                .text()
                .await
                .map_err(|e| ScannerError::from_reqwest(STATIC_COMPONENT, &context, e))?
        };

        let found = decide(status.as_u16(), &body, site, self.settings.policy);
        debug!(site = %site.id, status = status.as_u16(), found, "static probe answered");
        Ok(found)
    }
}

/// Browser prober for sites that render their content with JavaScript.
#[derive(Debug)]
pub struct DynamicProber {
    permits: Semaphore,
    throttle: Arc<SiteThrottle>,
    settings: ProbeSettings,
    wait_until: WaitUntil,
}

impl DynamicProber {
    /// Create the pool from configuration.
    #[must_use]
    pub fn new(
        scanning: &ScanningConfig,
        browser: &BrowserConfig,
        throttle: Arc<SiteThrottle>,
    ) -> Self {
        Self {
            permits: Semaphore::new(scanning.dynamic_concurrency.max(1)),
            throttle,
            settings: ProbeSettings::new(scanning, browser, ProbeStrategy::Dynamic),
            wait_until: browser.wait_until,
        }
    }

    /// Render `url` for `site` inside `session`, retrying per the site's budget.
    pub async fn probe(
        &self,
        session: &BrowserSession<'_>,
        site: &SiteDefinition,
        url: &str,
    ) -> Result<bool> {
        with_retries(site, &self.settings, || self.attempt(session, site, url)).await
    }

    async fn attempt(
        &self,
        session: &BrowserSession<'_>,
        site: &SiteDefinition,
        url: &str,
    ) -> Result<bool> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ScannerError::internal(DYNAMIC_COMPONENT, e.to_string()))?;
        self.throttle.wait(site).await;

        let page = session
            .render(url, &self.render_options(site))
            .await
            .map_err(|source| ScannerError::Browser {
                scanner: DYNAMIC_COMPONENT.to_string(),
                source,
            })?;

        let status = document_status(page.status);
        if status == UNSEEN_STATUS {
            debug!(site = %site.id, "no document response observed");
        }
        if status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
            return Err(ScannerError::RateLimited {
                scanner: DYNAMIC_COMPONENT.to_string(),
                retry_after: None,
            });
        }

        let found = decide(status, &page.content, site, self.settings.policy);
        debug!(site = %site.id, status, found, "dynamic probe rendered");
        Ok(found)
    }

    fn render_options(&self, site: &SiteDefinition) -> RenderOptions {
        let mut headers = BTreeMap::new();
        let mut user_agent = None;
        for (name, value) in &site.headers {
            if name.eq_ignore_ascii_case(USER_AGENT.as_str()) {
                user_agent = Some(value.clone());
            } else {
                headers.insert(name.clone(), value.clone());
            }
        }

        RenderOptions {
            timeout: self.settings.timeout_for(site),
            wait_until: self.wait_until,
            headers,
            user_agent,
        }
    }
}

/// Status a rendered page is judged with.
#[must_use]
pub fn document_status(observed: Option<u16>) -> u16 {
    observed.unwrap_or(UNSEEN_STATUS)
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn site(retries: u32) -> SiteDefinition {
        SiteDefinition::from_value(json!({
            "id": "flaky",
            "urlTemplate": "https://example.com/{username}",
            "retries": retries
        }))
        .expect("valid site")
    }

    fn settings(retry_not_found: bool) -> ProbeSettings {
        ProbeSettings {
            default_timeout: Duration::from_secs(1),
            retry_not_found,
            policy: DecisionPolicy::default(),
            max_retry_after: Duration::from_millis(10),
        }
    }

    fn timeout_error() -> ScannerError {
        ScannerError::Network {
            scanner: STATIC_COMPONENT.to_string(),
            message: "timed out".to_string(),
            source: None,
        }
    }

    #[test]
    fn test_strategy_follows_requires_js() {
        let mut definition = site(0);
        assert_eq!(ProbeStrategy::for_site(&definition), ProbeStrategy::Static);
        definition.requires_js = true;
        assert_eq!(ProbeStrategy::for_site(&definition), ProbeStrategy::Dynamic);
    }

    #[tokio::test]
    async fn test_timeouts_exhaust_budget() {
        let calls = AtomicU32::new(0);
        let result = with_retries(&site(2), &settings(true), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(timeout_error()) }
        })
        .await;

        assert!(matches!(result, Err(ScannerError::Network { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_hit_stops_retrying() {
        let calls = AtomicU32::new(0);
        let result = with_retries(&site(5), &settings(true), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(timeout_error())
                } else {
                    Ok(true)
                }
            }
        })
        .await;

        assert!(result.expect("second attempt succeeds"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_not_found_retry_policy() {
        let calls = AtomicU32::new(0);
        let result = with_retries(&site(2), &settings(false), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(false) }
        })
        .await;
        assert!(!result.expect("miss is not an error"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let calls = AtomicU32::new(0);
        let result = with_retries(&site(2), &settings(true), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(false) }
        })
        .await;
        assert!(!result.expect("miss is not an error"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_gives_up() {
        let calls = AtomicU32::new(0);
        let result = with_retries(&site(3), &settings(true), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ScannerError::invalid_input(STATIC_COMPONENT, "bad header")) }
        })
        .await;

        assert!(matches!(result, Err(ScannerError::InvalidInput { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retry_after_is_capped() {
        let limited = ScannerError::RateLimited {
            scanner: STATIC_COMPONENT.to_string(),
            retry_after: Some(Duration::from_secs(600)),
        };
        assert_eq!(
            RetryDecision::after(&limited, 1, Duration::from_secs(10)),
            RetryDecision::Retry(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "7".parse().expect("header value"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(RETRY_AFTER, "Wed, 21 Oct 2015 07:28:00 GMT".parse().expect("header value"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_unseen_document_is_not_found() {
        let definition = site(0);
        let policy = DecisionPolicy::default();

        assert_eq!(document_status(None), UNSEEN_STATUS);
        assert!(!decide(document_status(None), "<h1>alice</h1>", &definition, policy));
        assert!(decide(document_status(Some(200)), "<h1>alice</h1>", &definition, policy));
    }
}
