//! One top-level invocation: from a [`ScanRequest`] to an [`AggregateContext`].

use crate::error::{Result, ScannerError};
use crate::manager::{AggregateContext, ScanManager};
use crate::orchestrator::ScanOrchestrator;
use crate::scanners::{
    DomainIpScanner, EmailScanner, FullNameScanner, FullNameTarget, PhoneScanner, Scanner,
    SocialProfileScanner, UsernameScanner,
};
use footprint_browser::BrowserEngine;
use footprint_catalog::Catalog;
use footprint_core::{AppConfig, ScanCategory};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

const COMPONENT: &str = "Scan Manager";

/// Targets and credentials collected by the prompt layer.
///
/// A category is scanned when its target is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanRequest {
    /// Username to look for across the catalog
    pub username: Option<String>,
    /// Person to look for on the sites of one country
    pub full_name: Option<FullNameTarget>,
    /// Address to check for breaches
    pub email: Option<String>,
    /// Handle to look up on the social network API
    pub social_username: Option<String>,
    /// Domain or IP address to analyze
    pub domain_or_ip: Option<String>,
    /// Phone number in international form
    pub phone_number: Option<String>,
    /// Overrides the configured HIBP key
    #[serde(skip_serializing)]
    pub hibp_api_key: Option<String>,
    /// Overrides the configured bearer token
    #[serde(skip_serializing)]
    pub twitter_bearer_token: Option<String>,
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl ScanRequest {
    /// Categories this request selects, in menu order.
    #[must_use]
    pub fn categories(&self) -> Vec<ScanCategory> {
        ScanCategory::ALL
            .into_iter()
            .filter(|category| match category {
                ScanCategory::Username => present(self.username.as_ref()).is_some(),
                ScanCategory::FullName => self.full_name.is_some(),
                ScanCategory::Email => present(self.email.as_ref()).is_some(),
                ScanCategory::SocialProfile => present(self.social_username.as_ref()).is_some(),
                ScanCategory::DomainIp => present(self.domain_or_ip.as_ref()).is_some(),
                ScanCategory::PhoneNumber => present(self.phone_number.as_ref()).is_some(),
            })
            .collect()
    }

    fn echo_targets(&self, context: &mut AggregateContext) {
        if let Some(username) = present(self.username.as_ref()) {
            context.set_target("username", username);
        }
        if let Some(full_name) = &self.full_name {
            context.set_target("full_name", full_name);
        }
        if let Some(email) = present(self.email.as_ref()) {
            context.set_target("email", email);
        }
        if let Some(handle) = present(self.social_username.as_ref()) {
            context.set_target("social_username", handle);
        }
        if let Some(target) = present(self.domain_or_ip.as_ref()) {
            context.set_target("domain_or_ip", target);
        }
        if let Some(number) = present(self.phone_number.as_ref()) {
            context.set_target("phone_number", number);
        }
    }
}

/// Whether any selected catalog scan has an active site that needs JavaScript.
#[must_use]
pub fn needs_browser(catalog: &Catalog, request: &ScanRequest) -> bool {
    let requires_js = |sites: Vec<std::sync::Arc<footprint_catalog::SiteDefinition>>| {
        sites.iter().any(|s| s.active && s.requires_js)
    };

    let username = present(request.username.as_ref()).is_some()
        && requires_js(catalog.sites_for(ScanCategory::Username));
    let full_name = request.full_name.as_ref().is_some_and(|target| {
        requires_js(catalog.sites_for_country(ScanCategory::FullName, &target.country))
    });
    username || full_name
}

/// Run one invocation.
///
/// The browser is launched only when [`needs_browser`] says so; a launch
/// failure aborts the invocation. Once launched it is shut down before this
/// returns. A scanner that cannot be set up is recorded as an error under its
/// own category and the others still run.
pub async fn run_invocation(
    config: &AppConfig,
    catalog: &Catalog,
    request: &ScanRequest,
) -> Result<AggregateContext> {
    let mut context = AggregateContext::new();
    request.echo_targets(&mut context);

    let categories = request.categories();
    if categories.is_empty() {
        warn!("scan request selects no category");
        context.finished_at = Some(chrono::Utc::now());
        return Ok(context);
    }
    info!(scan_id = %context.scan_id, categories = ?categories, "starting invocation");

    let orchestrator = match ScanOrchestrator::new(&config.scanning, &config.browser) {
        Ok(orchestrator) => Some(orchestrator),
        Err(e) => {
            for category in categories.iter().filter(|c| c.uses_catalog()) {
                record_setup_failure(&mut context, *category, &e);
            }
            None
        }
    };

    let browser = if orchestrator.is_some() && needs_browser(catalog, request) {
        let engine = BrowserEngine::launch(&config.browser, &config.scanning.user_agent)
            .await
            .map_err(|source| ScannerError::Browser {
                scanner: COMPONENT.to_string(),
                source,
            })?;
        Some(engine)
    } else {
        None
    };

    run_scanners(
        config,
        catalog,
        request,
        orchestrator.as_ref(),
        browser.as_ref(),
        &mut context,
    )
    .await;

    if let Some(engine) = browser {
        engine.shutdown().await;
    }

    Ok(context)
}

fn record_setup_failure(context: &mut AggregateContext, category: ScanCategory, e: &ScannerError) {
    error!(scanner = category.display_name(), error = %e, "scanner could not be set up");
    context
        .results
        .insert(category.context_key(), json!({ "error": e.to_string() }));
}

fn push_built<'a, S>(
    scanners: &mut Vec<Box<dyn Scanner + 'a>>,
    context: &mut AggregateContext,
    category: ScanCategory,
    built: Result<S>,
) where
    S: Scanner + 'a,
{
    match built {
        Ok(scanner) => scanners.push(Box::new(scanner)),
        Err(e) => record_setup_failure(context, category, &e),
    }
}

async fn run_scanners(
    config: &AppConfig,
    catalog: &Catalog,
    request: &ScanRequest,
    orchestrator: Option<&ScanOrchestrator>,
    browser: Option<&BrowserEngine>,
    context: &mut AggregateContext,
) {
    let mut apis = config.apis.clone();
    if let Some(key) = request.hibp_api_key.clone() {
        apis.hibp_api_key = Some(key);
    }
    if let Some(token) = request.twitter_bearer_token.clone() {
        apis.twitter_bearer_token = Some(token);
    }
    let scanning = &config.scanning;

    let mut scanners: Vec<Box<dyn Scanner + '_>> = Vec::new();
    if let Some(orchestrator) = orchestrator {
        if let Some(username) = present(request.username.as_ref()) {
            scanners.push(Box::new(UsernameScanner::new(
                catalog,
                orchestrator,
                browser,
                username,
            )));
        }
        if let Some(target) = &request.full_name {
            scanners.push(Box::new(FullNameScanner::new(
                catalog,
                orchestrator,
                browser,
                target.clone(),
            )));
        }
    }
    if let Some(email) = present(request.email.as_ref()) {
        let built = EmailScanner::new(&apis, scanning, email);
        push_built(&mut scanners, context, ScanCategory::Email, built);
    }
    if let Some(handle) = present(request.social_username.as_ref()) {
        let built = SocialProfileScanner::new(&apis, scanning, handle);
        push_built(&mut scanners, context, ScanCategory::SocialProfile, built);
    }
    if let Some(target) = present(request.domain_or_ip.as_ref()) {
        let built = DomainIpScanner::new(&apis, scanning, target);
        push_built(&mut scanners, context, ScanCategory::DomainIp, built);
    }
    if let Some(number) = present(request.phone_number.as_ref()) {
        scanners.push(Box::new(PhoneScanner::new(number)));
    }

    ScanManager::new().run(&scanners, context).await;
    info!(
        scan_id = %context.scan_id,
        failed = context.results.keys().filter(|k| context.is_error(k)).count(),
        "invocation finished"
    );
}
