//! Footprint Catalog - Site definitions for presence probing.
//!
//! This crate turns the raw JSON catalog documents into validated, immutable
//! site definitions and keeps them in an owned, refreshable in-memory catalog.
//!
//! # Architecture
//!
//! - **Definition Types** ([`definition`]): Record normalization and the canonical `SiteDefinition`
//! - **Loader** ([`loader`]): Local document loading and default creation
//! - **Catalog** ([`catalog`]): In-memory collection with atomic remote refresh
//! - **Errors** ([`error`]): Catalog-specific error types
//!
//! # Example
//!
//! ```rust,no_run
//! use footprint_catalog::{Catalog, DocumentKind};
//! use footprint_core::{AppConfig, ScanCategory};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load_with_env()?;
//! let catalog = Catalog::bootstrap(&config.catalog).await?;
//!
//! println!("{} username sites", catalog.count(DocumentKind::Username));
//! for site in catalog.sites_for_country(ScanCategory::FullName, "sweden") {
//!     println!("{}: {}", site.id, site.url_template);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod catalog;
pub mod definition;
pub mod error;
pub mod loader;

// Re-export commonly used types
pub use catalog::Catalog;
pub use definition::{
    CheckType, CountrySites, HttpMethod, LegalInfo, NoResultRule, ResponseType, SiteDefinition,
};
pub use error::{CatalogError, Result};
pub use loader::{CatalogLoader, DocumentKind, ParsedDocument};
