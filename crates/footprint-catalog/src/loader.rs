//! Catalog document loading from the local data directory.
//!
//! Two JSON documents back the catalog: `sites.json` (an object with a
//! `username_sites` array) and `full_name_sites.json` (an array of country
//! records). Records are validated one at a time; a bad record is logged and
//! skipped, never fatal for the document.

use crate::{
    definition::{CountrySites, RawCountryRecord, SiteDefinition},
    error::{CatalogError, Result},
};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The two catalog documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Flat list of username sites
    Username,
    /// Country-grouped full-name sites
    FullName,
}

impl DocumentKind {
    /// File name of the document inside the data directory.
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Username => "sites.json",
            Self::FullName => "full_name_sites.json",
        }
    }

    /// Content written when the document does not exist yet.
    #[must_use]
    pub fn default_content(&self) -> &'static str {
        match self {
            Self::Username => "{\n  \"username_sites\": []\n}\n",
            Self::FullName => "[]\n",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Records parsed from one document plus the number of rejected records.
#[derive(Debug, Clone)]
pub struct ParsedDocument<T> {
    /// Records that passed validation
    pub records: Vec<T>,
    /// Records dropped during validation
    pub rejected: usize,
}

/// Loader for the catalog documents in one data directory.
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    /// Directory containing `sites.json` and `full_name_sites.json`
    data_dir: PathBuf,
}

impl CatalogLoader {
    /// Create a loader for the given data directory.
    ///
    /// The directory is created if it does not exist.
    ///
    /// # Errors
    /// Returns error if the path exists but is not a directory, or cannot be created.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();

        if data_dir.exists() && !data_dir.is_dir() {
            return Err(CatalogError::DirectoryNotFound {
                path: data_dir.display().to_string(),
            });
        }

        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    /// Directory holding the documents.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of one document.
    #[must_use]
    pub fn path(&self, kind: DocumentKind) -> PathBuf {
        self.data_dir.join(kind.file_name())
    }

    /// Create default documents for any that are missing.
    ///
    /// Returns the documents that were created.
    pub fn ensure_defaults(&self) -> Result<Vec<DocumentKind>> {
        let mut created = Vec::new();

        for kind in [DocumentKind::Username, DocumentKind::FullName] {
            let path = self.path(kind);
            if !path.exists() {
                std::fs::write(&path, kind.default_content())?;
                info!(path = %path.display(), "created default catalog document");
                created.push(kind);
            }
        }

        Ok(created)
    }

    /// Load and validate the username document.
    pub fn load_username(&self) -> Result<ParsedDocument<SiteDefinition>> {
        let contents = self.read(DocumentKind::Username)?;
        parse_username_document(&contents)
    }

    /// Load and validate the full-name document.
    pub fn load_full_name(&self) -> Result<ParsedDocument<CountrySites>> {
        let contents = self.read(DocumentKind::FullName)?;
        parse_full_name_document(&contents)
    }

    /// Replace a document on disk with raw fetched contents.
    pub fn write_raw(&self, kind: DocumentKind, contents: &str) -> Result<()> {
        let path = self.path(kind);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), bytes = contents.len(), "persisted catalog document");
        Ok(())
    }

    fn read(&self, kind: DocumentKind) -> Result<String> {
        let path = self.path(kind);
        let contents = std::fs::read_to_string(&path)?;
        debug!(path = %path.display(), bytes = contents.len(), "read catalog document");
        Ok(contents)
    }
}

/// Parse the username document (`{"username_sites": [...]}`).
///
/// A document without the `username_sites` key is treated as empty.
pub fn parse_username_document(contents: &str) -> Result<ParsedDocument<SiteDefinition>> {
    let document = DocumentKind::Username;
    let value: Value =
        serde_json::from_str(contents).map_err(|source| CatalogError::ParseError {
            document: document.to_string(),
            source,
        })?;

    let Value::Object(mut root) = value else {
        return Err(CatalogError::InvalidDocument {
            document: document.to_string(),
            reason: "expected a JSON object with a `username_sites` array".to_string(),
        });
    };

    let records = match root.remove("username_sites") {
        Some(Value::Array(records)) => records,
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            return Err(CatalogError::InvalidDocument {
                document: document.to_string(),
                reason: "`username_sites` must be an array".to_string(),
            })
        }
    };

    Ok(validate_sites(records, document.file_name()))
}

/// Parse the full-name document (an array of country records).
pub fn parse_full_name_document(contents: &str) -> Result<ParsedDocument<CountrySites>> {
    let document = DocumentKind::FullName;
    let value: Value =
        serde_json::from_str(contents).map_err(|source| CatalogError::ParseError {
            document: document.to_string(),
            source,
        })?;

    let Value::Array(countries) = value else {
        return Err(CatalogError::InvalidDocument {
            document: document.to_string(),
            reason: "expected a JSON array of country records".to_string(),
        });
    };

    let mut records = Vec::with_capacity(countries.len());
    let mut rejected = 0;

    for entry in countries {
        match serde_json::from_value::<RawCountryRecord>(entry) {
            Ok(raw) if !raw.country.trim().is_empty() => {
                let sites = validate_sites(raw.sites, &raw.country);
                rejected += sites.rejected;
                records.push(CountrySites {
                    country: raw.country.trim().to_string(),
                    country_code: raw.country_code.filter(|c| !c.trim().is_empty()),
                    sites: sites.records.into_iter().map(Arc::new).collect(),
                });
            }
            Ok(_) => {
                rejected += 1;
                warn!(document = %document, "skipping country record with empty name");
            }
            Err(e) => {
                rejected += 1;
                warn!(document = %document, error = %e, "skipping invalid country record");
            }
        }
    }

    Ok(ParsedDocument { records, rejected })
}

fn validate_sites(records: Vec<Value>, scope: &str) -> ParsedDocument<SiteDefinition> {
    let mut seen = HashSet::new();
    let mut valid = Vec::with_capacity(records.len());
    let mut rejected = 0;

    for record in records {
        match SiteDefinition::from_value(record) {
            Ok(site) if seen.insert(site.id.clone()) => valid.push(site),
            Ok(site) => {
                rejected += 1;
                warn!(scope = %scope, site = %site.id, "skipping duplicate site record");
            }
            Err(e) => {
                rejected += 1;
                warn!(scope = %scope, error = %e, "skipping invalid site record");
            }
        }
    }

    ParsedDocument {
        records: valid,
        rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const THREE_RECORDS: &str = r#"{
        "username_sites": [
            {"id": "github", "name": "GitHub", "urlTemplate": "https://github.com/{username}"},
            {"id": "broken", "name": "Broken"},
            {"id": "gitlab", "name": "GitLab", "url": "https://gitlab.com/{}"}
        ]
    }"#;

    #[test]
    fn test_loader_creates_directory() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let dir = temp_dir.path().join("nested").join("data");
        let loader = CatalogLoader::new(&dir).expect("create loader");
        assert!(loader.data_dir().is_dir());
    }

    #[test]
    fn test_loader_rejects_file_path() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let file = temp_dir.path().join("not-a-dir");
        std::fs::write(&file, "x").expect("write file");

        let result = CatalogLoader::new(&file);
        assert!(matches!(result, Err(CatalogError::DirectoryNotFound { .. })));
    }

    #[test]
    fn test_ensure_defaults_creates_missing_only() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let loader = CatalogLoader::new(temp_dir.path()).expect("create loader");
        std::fs::write(loader.path(DocumentKind::Username), THREE_RECORDS)
            .expect("write username document");

        let created = loader.ensure_defaults().expect("ensure defaults");
        assert_eq!(created, vec![DocumentKind::FullName]);

        let username = loader.load_username().expect("load username document");
        assert_eq!(username.records.len(), 2);

        let full_name = loader.load_full_name().expect("load full-name document");
        assert!(full_name.records.is_empty());
    }

    #[test]
    fn test_one_invalid_record_among_three() {
        let parsed = parse_username_document(THREE_RECORDS).expect("parse document");

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.rejected, 1);
        let ids: Vec<&str> = parsed.records.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["github", "gitlab"]);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let parsed = parse_username_document(
            r#"{"username_sites": [
                {"id": "a", "urlTemplate": "https://a.com/{username}"},
                {"id": "a", "urlTemplate": "https://b.com/{username}"}
            ]}"#,
        )
        .expect("parse document");

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].url_template, "https://a.com/{username}");
        assert_eq!(parsed.rejected, 1);
    }

    #[test]
    fn test_missing_key_is_empty() {
        let parsed = parse_username_document("{}").expect("parse document");
        assert!(parsed.records.is_empty());
    }

    #[test]
    fn test_malformed_document_is_error() {
        assert!(matches!(
            parse_username_document("not json"),
            Err(CatalogError::ParseError { .. })
        ));
        assert!(matches!(
            parse_username_document("[]"),
            Err(CatalogError::InvalidDocument { .. })
        ));
        assert!(matches!(
            parse_full_name_document("{}"),
            Err(CatalogError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn test_full_name_document() {
        let parsed = parse_full_name_document(
            r#"[
                {"country": "Sweden", "country_code": "SE", "sites": [
                    {"id": "hitta", "urlTemplate": "https://www.hitta.se/s?vad={query}",
                     "noResult": {"type": "contains", "value": "Inga träffar"}},
                    {"id": "no-template"}
                ]},
                {"sites": []}
            ]"#,
        )
        .expect("parse document");

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.rejected, 2);
        let sweden = &parsed.records[0];
        assert_eq!(sweden.country_code.as_deref(), Some("SE"));
        assert_eq!(sweden.sites.len(), 1);
    }

    #[test]
    fn test_write_raw_replaces_document() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let loader = CatalogLoader::new(temp_dir.path()).expect("create loader");
        loader.ensure_defaults().expect("ensure defaults");

        loader
            .write_raw(DocumentKind::Username, THREE_RECORDS)
            .expect("write raw document");

        let parsed = loader.load_username().expect("load document");
        assert_eq!(parsed.records.len(), 2);
        assert!(!loader.path(DocumentKind::Username).with_extension("json.tmp").exists());
    }
}
