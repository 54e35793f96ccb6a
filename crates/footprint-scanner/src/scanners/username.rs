use super::{ScanOutput, Scanner};
use crate::error::{Result, ScannerError};
use crate::orchestrator::{ProbeJob, ScanOrchestrator, ScanResult};
use crate::url_builder::username_params;
use async_trait::async_trait;
use footprint_browser::BrowserEngine;
use footprint_catalog::Catalog;
use footprint_core::ScanCategory;
use serde_json::json;
use tracing::{info, warn};

/// Probes every catalog site for one username.
pub struct UsernameScanner<'a> {
    catalog: &'a Catalog,
    orchestrator: &'a ScanOrchestrator,
    browser: Option<&'a BrowserEngine>,
    username: String,
}

impl<'a> UsernameScanner<'a> {
    /// Bind a username to the shared catalog, pools and browser.
    #[must_use]
    pub fn new(
        catalog: &'a Catalog,
        orchestrator: &'a ScanOrchestrator,
        browser: Option<&'a BrowserEngine>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            orchestrator,
            browser,
            username: username.into().trim().to_string(),
        }
    }
}

#[async_trait]
impl Scanner for UsernameScanner<'_> {
    fn category(&self) -> ScanCategory {
        ScanCategory::Username
    }

    async fn scan(&self) -> Result<ScanOutput> {
        if self.username.is_empty() {
            return Err(ScannerError::invalid_input(self.name(), "username is empty"));
        }

        let sites = self.catalog.sites_for(ScanCategory::Username);
        if sites.is_empty() {
            warn!(username = %self.username, "username catalog is empty");
        }

        let params = username_params(&self.username);
        let jobs = sites
            .into_iter()
            .map(|site| ProbeJob {
                site,
                params: params.clone(),
            })
            .collect();

        let sweep = self.orchestrator.run(jobs, self.browser).await;
        info!(
            username = %self.username,
            found = sweep.found().count(),
            "username scan complete"
        );

        let mut target = serde_json::Map::new();
        target.insert("username".to_string(), json!(self.username));
        let result = ScanResult::from_sweep(target, &sweep);

        let data = serde_json::to_value(&result)
            .map_err(|e| ScannerError::internal(self.name(), e.to_string()))?;
        Ok(ScanOutput::new(data))
    }
}
