//! The owned in-memory site catalog.
//!
//! A [`Catalog`] is constructed once per process and handed to the scanners by
//! reference. Reads hand out `Arc<SiteDefinition>` clones, so a refresh that
//! swaps the snapshot never disturbs a scan already holding its sites.

use crate::{
    definition::{CountrySites, SiteDefinition},
    error::{CatalogError, Result},
    loader::{parse_full_name_document, parse_username_document, CatalogLoader, DocumentKind},
};
use footprint_core::{CatalogConfig, ScanCategory};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Snapshot {
    username: Vec<Arc<SiteDefinition>>,
    full_name: Vec<CountrySites>,
}

/// Validated, refreshable collection of site definitions.
#[derive(Debug, Clone)]
pub struct Catalog {
    snapshot: Arc<RwLock<Snapshot>>,
    loader: Option<CatalogLoader>,
    refresh_timeout: Duration,
}

impl Catalog {
    /// Create a catalog holding the given records, with no backing store.
    ///
    /// A refresh on such a catalog updates memory only.
    #[must_use]
    pub fn from_records(username: Vec<SiteDefinition>, full_name: Vec<CountrySites>) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(Snapshot {
                username: username.into_iter().map(Arc::new).collect(),
                full_name,
            })),
            loader: None,
            refresh_timeout: Duration::from_secs(10),
        }
    }

    /// Load both documents from disk.
    ///
    /// A document that cannot be read or parsed is logged and left empty.
    #[must_use]
    pub fn load(loader: CatalogLoader, refresh_timeout: Duration) -> Self {
        let catalog = Self {
            snapshot: Arc::new(RwLock::new(Snapshot::default())),
            loader: Some(loader),
            refresh_timeout,
        };
        catalog.reload();
        catalog
    }

    /// Startup sequence: create missing documents, load both, and refresh any
    /// document that loaded empty from its remote URL.
    pub async fn bootstrap(config: &CatalogConfig) -> Result<Self> {
        let loader = CatalogLoader::new(config.resolve_data_dir()?)?;
        Self::bootstrap_with(loader, config).await
    }

    /// [`Catalog::bootstrap`] with an explicit loader.
    pub async fn bootstrap_with(loader: CatalogLoader, config: &CatalogConfig) -> Result<Self> {
        loader.ensure_defaults()?;
        let catalog = Self::load(loader, Duration::from_secs(config.refresh_timeout_secs));

        if catalog.count(DocumentKind::Username) == 0 {
            info!("username catalog is empty, trying remote refresh");
            catalog
                .refresh(DocumentKind::Username, &config.username_sites_url)
                .await;
        }

        if catalog.count(DocumentKind::FullName) == 0 {
            info!("full-name catalog is empty, trying remote refresh");
            catalog
                .refresh(DocumentKind::FullName, &config.full_name_sites_url)
                .await;
        }

        Ok(catalog)
    }

    /// Re-read both documents from the backing store.
    ///
    /// A document that fails to load keeps its current in-memory contents.
    pub fn reload(&self) {
        let Some(loader) = &self.loader else {
            debug!("catalog has no backing store, nothing to reload");
            return;
        };

        match loader.load_username() {
            Ok(parsed) => {
                info!(
                    count = parsed.records.len(),
                    rejected = parsed.rejected,
                    "loaded username sites"
                );
                self.replace_username(parsed.records);
            }
            Err(e) => warn!(error = %e, "failed to load username sites"),
        }

        match loader.load_full_name() {
            Ok(parsed) => {
                info!(
                    countries = parsed.records.len(),
                    rejected = parsed.rejected,
                    "loaded full-name sites"
                );
                self.replace_full_name(parsed.records);
            }
            Err(e) => warn!(error = %e, "failed to load full-name sites"),
        }
    }

    /// Fetch a document from `url` and, if it parses, swap it in and persist it.
    ///
    /// Returns `false` and leaves the catalog untouched on any fetch or parse
    /// failure.
    pub async fn refresh(&self, kind: DocumentKind, url: &str) -> bool {
        info!(document = %kind, url = %url, "refreshing catalog document");

        let contents = match self.fetch(url).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!(document = %kind, error = %e, "catalog refresh failed");
                return false;
            }
        };

        match kind {
            DocumentKind::Username => match parse_username_document(&contents) {
                Ok(parsed) => {
                    self.persist(kind, &contents);
                    info!(
                        count = parsed.records.len(),
                        rejected = parsed.rejected,
                        "refreshed username sites"
                    );
                    self.replace_username(parsed.records);
                }
                Err(e) => {
                    warn!(document = %kind, error = %e, "refreshed document rejected");
                    return false;
                }
            },
            DocumentKind::FullName => match parse_full_name_document(&contents) {
                Ok(parsed) => {
                    self.persist(kind, &contents);
                    info!(
                        countries = parsed.records.len(),
                        rejected = parsed.rejected,
                        "refreshed full-name sites"
                    );
                    self.replace_full_name(parsed.records);
                }
                Err(e) => {
                    warn!(document = %kind, error = %e, "refreshed document rejected");
                    return false;
                }
            },
        }

        true
    }

    /// Sites applicable to a category, active or not.
    ///
    /// Full-name sites of every country are returned; other non-catalog
    /// categories have no sites.
    #[must_use]
    pub fn sites_for(&self, category: ScanCategory) -> Vec<Arc<SiteDefinition>> {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        match category {
            ScanCategory::Username => snapshot.username.clone(),
            ScanCategory::FullName => snapshot
                .full_name
                .iter()
                .flat_map(|c| c.sites.iter().cloned())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Sites applicable to a category in one country (case-insensitive).
    ///
    /// Username sites are not grouped by country and are returned as is.
    #[must_use]
    pub fn sites_for_country(
        &self,
        category: ScanCategory,
        country: &str,
    ) -> Vec<Arc<SiteDefinition>> {
        if category == ScanCategory::Username {
            return self.sites_for(category);
        }
        if category != ScanCategory::FullName {
            return Vec::new();
        }

        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        snapshot
            .full_name
            .iter()
            .find(|c| c.matches(country))
            .map(|c| c.sites.clone())
            .unwrap_or_default()
    }

    /// Country names available for full-name searches.
    #[must_use]
    pub fn countries(&self) -> Vec<String> {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        snapshot.full_name.iter().map(|c| c.country.clone()).collect()
    }

    /// Number of records in one document (sites or countries).
    #[must_use]
    pub fn count(&self, kind: DocumentKind) -> usize {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        match kind {
            DocumentKind::Username => snapshot.username.len(),
            DocumentKind::FullName => snapshot.full_name.len(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let fetch_error = |source| CatalogError::FetchError {
            url: url.to_string(),
            source,
        };

        let client = reqwest::Client::builder()
            .timeout(self.refresh_timeout)
            .build()
            .map_err(fetch_error)?;

        client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_error)?
            .text()
            .await
            .map_err(fetch_error)
    }

    fn persist(&self, kind: DocumentKind, contents: &str) {
        if let Some(loader) = &self.loader {
            if let Err(e) = loader.write_raw(kind, contents) {
                warn!(document = %kind, error = %e, "failed to persist refreshed document");
            }
        }
    }

    fn replace_username(&self, records: Vec<SiteDefinition>) {
        let records = records.into_iter().map(Arc::new).collect();
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.username = records;
    }

    fn replace_full_name(&self, records: Vec<CountrySites>) {
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.full_name = records;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn site(id: &str, active: bool) -> SiteDefinition {
        SiteDefinition::from_value(json!({
            "id": id,
            "urlTemplate": format!("https://{id}.example/{{username}}"),
            "active": active
        }))
        .expect("valid site")
    }

    fn sample() -> Catalog {
        Catalog::from_records(
            vec![site("one", true), site("two", false)],
            vec![CountrySites {
                country: "Sweden".to_string(),
                country_code: Some("SE".to_string()),
                sites: vec![Arc::new(site("hitta", true))],
            }],
        )
    }

    #[test]
    fn test_sites_for_username_includes_inactive() {
        let catalog = sample();
        assert_eq!(catalog.sites_for(ScanCategory::Username).len(), 2);
    }

    #[test]
    fn test_sites_for_country_is_case_insensitive() {
        let catalog = sample();
        let sites = catalog.sites_for_country(ScanCategory::FullName, "SWEDEN");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].id.as_str(), "hitta");

        assert!(catalog
            .sites_for_country(ScanCategory::FullName, "Norway")
            .is_empty());
    }

    #[test]
    fn test_non_catalog_categories_are_empty() {
        let catalog = sample();
        assert!(catalog.sites_for(ScanCategory::Email).is_empty());
        assert!(catalog
            .sites_for_country(ScanCategory::PhoneNumber, "Sweden")
            .is_empty());
    }

    #[test]
    fn test_counts_and_countries() {
        let catalog = sample();
        assert_eq!(catalog.count(DocumentKind::Username), 2);
        assert_eq!(catalog.count(DocumentKind::FullName), 1);
        assert_eq!(catalog.countries(), vec!["Sweden"]);
    }

    #[tokio::test]
    async fn test_refresh_unreachable_leaves_catalog_unchanged() {
        let catalog = sample();
        // Port 9 on localhost is the discard service and is closed on test hosts.
        let refreshed = catalog
            .refresh(DocumentKind::Username, "http://127.0.0.1:9/sites.json")
            .await;

        assert!(!refreshed);
        assert_eq!(catalog.count(DocumentKind::Username), 2);
    }
}
