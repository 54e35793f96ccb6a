//! Error types for the site catalog.

use thiserror::Error;

/// Errors that can occur while loading or refreshing the catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A single site record failed validation
    #[error("invalid site record {site}: {reason}")]
    InvalidRecord {
        /// Site ID or name, when known
        site: String,
        /// Reason for validation failure
        reason: String,
    },

    /// A catalog document is not shaped as expected
    #[error("invalid catalog document {document}: {reason}")]
    InvalidDocument {
        /// Document name
        document: String,
        /// Reason for rejection
        reason: String,
    },

    /// A catalog document is not valid JSON
    #[error("failed to parse catalog document {document}: {source}")]
    ParseError {
        /// Document name
        document: String,
        /// JSON parse error
        #[source]
        source: serde_json::Error,
    },

    /// Fetching a remote catalog document failed
    #[error("failed to fetch catalog document from {url}: {source}")]
    FetchError {
        /// Remote URL
        url: String,
        /// Underlying HTTP error
        #[source]
        source: reqwest::Error,
    },

    /// Catalog data directory not found or unusable
    #[error("catalog directory not usable at {path}")]
    DirectoryNotFound {
        /// Expected directory path
        path: String,
    },

    /// I/O error while accessing catalog documents
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be resolved
    #[error("configuration error: {0}")]
    Config(#[from] footprint_core::ConfigError),
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
