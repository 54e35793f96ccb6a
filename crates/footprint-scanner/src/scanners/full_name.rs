//! Full-name scan over the sites of one country.
//!
//! Sites that take separate `{first}` and `{last}` placeholders get one probe.
//! Every other site is searched once per name variation through its
//! `{query}` placeholder.

use super::{ScanOutput, Scanner};
use crate::error::{Result, ScannerError};
use crate::orchestrator::{ProbeJob, ScanOrchestrator, ScanResult};
use crate::url_builder::ProbeParams;
use async_trait::async_trait;
use footprint_browser::BrowserEngine;
use footprint_catalog::{Catalog, SiteDefinition};
use footprint_core::ScanCategory;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

/// Name and search options for a full-name scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FullNameTarget {
    /// Name as typed
    pub full_name: String,
    /// Given name
    pub first_name: String,
    /// Middle name, may be empty
    pub middle_name: String,
    /// Family name
    pub last_name: String,
    /// Other names the person goes by
    pub aliases: Vec<String>,
    /// Country whose sites are searched
    pub country: String,
    /// City for sites supporting it
    pub city: String,
    /// Fill advanced placeholders such as `{city}`
    pub advanced_search: bool,
}

impl FullNameTarget {
    /// Fill in whichever of the full name or its parts is missing.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.full_name = self.full_name.trim().to_string();
        self.first_name = self.first_name.trim().to_string();
        self.middle_name = self.middle_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.country = self.country.trim().to_string();
        self.city = self.city.trim().to_string();
        self.aliases = self
            .aliases
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        if self.first_name.is_empty() && self.last_name.is_empty() {
            let parts: Vec<&str> = self.full_name.split_whitespace().collect();
            if let [first, middle @ .., last] = parts.as_slice() {
                self.first_name = (*first).to_string();
                self.middle_name = middle.join(" ");
                self.last_name = (*last).to_string();
            }
        } else if self.full_name.is_empty() {
            self.full_name = [&self.first_name, &self.middle_name, &self.last_name]
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(" ");
        }
        self
    }

    /// Query strings for sites without separate name placeholders.
    #[must_use]
    pub fn name_variations(&self) -> Vec<String> {
        let mut variations = Vec::new();
        if self.middle_name.is_empty() {
            variations.push(self.full_name.clone());
        } else {
            variations.push(format!(
                "{} {} {}",
                self.first_name, self.middle_name, self.last_name
            ));
            variations.push(format!("{} {}", self.first_name, self.last_name));
        }
        variations.extend(self.aliases.iter().cloned());
        variations
    }
}

/// Placeholder values for every probe of `site`.
#[must_use]
pub fn plan_queries(site: &SiteDefinition, target: &FullNameTarget) -> Vec<ProbeParams> {
    if site.has_placeholder("first") && site.has_placeholder("last") {
        let mut params = ProbeParams::from([
            ("first".to_string(), target.first_name.clone()),
            ("last".to_string(), target.last_name.clone()),
        ]);
        if target.advanced_search
            && site.has_advanced_placeholder("city")
            && !target.city.is_empty()
        {
            params.insert("city".to_string(), target.city.clone());
        }
        return vec![params];
    }

    target
        .name_variations()
        .into_iter()
        .map(|query| ProbeParams::from([("query".to_string(), query)]))
        .collect()
}

/// Searches a country's people-search sites for one person.
pub struct FullNameScanner<'a> {
    catalog: &'a Catalog,
    orchestrator: &'a ScanOrchestrator,
    browser: Option<&'a BrowserEngine>,
    target: FullNameTarget,
}

impl<'a> FullNameScanner<'a> {
    /// Bind a person to the shared catalog, pools and browser.
    #[must_use]
    pub fn new(
        catalog: &'a Catalog,
        orchestrator: &'a ScanOrchestrator,
        browser: Option<&'a BrowserEngine>,
        target: FullNameTarget,
    ) -> Self {
        Self {
            catalog,
            orchestrator,
            browser,
            target: target.normalized(),
        }
    }

    fn target_echo(&self) -> serde_json::Map<String, serde_json::Value> {
        let t = &self.target;
        let mut echo = serde_json::Map::new();
        echo.insert("full_name".to_string(), json!(t.full_name));
        echo.insert("first_name".to_string(), json!(t.first_name));
        echo.insert("middle_name".to_string(), json!(t.middle_name));
        echo.insert("last_name".to_string(), json!(t.last_name));
        echo.insert("country".to_string(), json!(t.country));
        echo
    }
}

#[async_trait]
impl Scanner for FullNameScanner<'_> {
    fn category(&self) -> ScanCategory {
        ScanCategory::FullName
    }

    async fn scan(&self) -> Result<ScanOutput> {
        if self.target.full_name.is_empty() {
            return Err(ScannerError::invalid_input(self.name(), "name is empty"));
        }
        if self.target.country.is_empty() {
            return Err(ScannerError::invalid_input(self.name(), "country is required"));
        }

        let sites = self
            .catalog
            .sites_for_country(ScanCategory::FullName, &self.target.country);
        if sites.is_empty() {
            info!(country = %self.target.country, "no full name sites for country");
        }

        let jobs: Vec<ProbeJob> = sites
            .iter()
            .flat_map(|site| {
                plan_queries(site, &self.target)
                    .into_iter()
                    .map(move |params| ProbeJob {
                        site: site.clone(),
                        params,
                    })
            })
            .collect();

        let sweep = self.orchestrator.run(jobs, self.browser).await;
        info!(
            name = %self.target.full_name,
            country = %self.target.country,
            found = sweep.found().count(),
            "full name scan complete"
        );

        let result = ScanResult::from_sweep(self.target_echo(), &sweep);
        let data = serde_json::to_value(&result)
            .map_err(|e| ScannerError::internal(self.name(), e.to_string()))?;
        Ok(ScanOutput::new(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(value: serde_json::Value) -> SiteDefinition {
        SiteDefinition::from_value(value).expect("valid site")
    }

    fn split_site() -> SiteDefinition {
        site(json!({
            "id": "ratsit",
            "urlTemplate": "https://example.se/{first}-{last}?city={city}",
            "placeholders": ["first", "last"],
            "advancedPlaceholders": ["city"]
        }))
    }

    fn query_site() -> SiteDefinition {
        site(json!({
            "id": "hitta",
            "urlTemplate": "https://example.se/sok?vad={query}",
            "urlEncode": true
        }))
    }

    fn target() -> FullNameTarget {
        FullNameTarget {
            full_name: "Anna Maria Svensson".to_string(),
            aliases: vec!["Annie Svensson".to_string()],
            country: "Sweden".to_string(),
            city: "Malmo".to_string(),
            ..FullNameTarget::default()
        }
        .normalized()
    }

    #[test]
    fn test_normalized_splits_full_name() {
        let t = target();
        assert_eq!(t.first_name, "Anna");
        assert_eq!(t.middle_name, "Maria");
        assert_eq!(t.last_name, "Svensson");
    }

    #[test]
    fn test_normalized_joins_parts() {
        let t = FullNameTarget {
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            ..FullNameTarget::default()
        }
        .normalized();
        assert_eq!(t.full_name, "John Doe");
        assert_eq!(t.name_variations(), vec!["John Doe"]);
    }

    #[test]
    fn test_split_site_gets_one_probe() {
        let plans = plan_queries(&split_site(), &target());
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0]["first"], "Anna");
        assert_eq!(plans[0]["last"], "Svensson");
        assert!(!plans[0].contains_key("city"));
    }

    #[test]
    fn test_city_only_with_advanced_search() {
        let mut t = target();
        t.advanced_search = true;
        let plans = plan_queries(&split_site(), &t);
        assert_eq!(plans[0]["city"], "Malmo");

        t.city.clear();
        let plans = plan_queries(&split_site(), &t);
        assert!(!plans[0].contains_key("city"));
    }

    #[test]
    fn test_query_site_gets_every_variation() {
        let plans = plan_queries(&query_site(), &target());
        let queries: Vec<&str> = plans.iter().map(|p| p["query"].as_str()).collect();
        assert_eq!(
            queries,
            vec!["Anna Maria Svensson", "Anna Svensson", "Annie Svensson"]
        );
    }
}
