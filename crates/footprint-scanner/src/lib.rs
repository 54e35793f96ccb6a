//! Footprint Scanner - multi-site presence probing.
//!
//! This crate turns a target identifier into an aggregate report. Catalog
//! categories (username, full name) fan out over every applicable site with
//! bounded concurrency; the other categories call one external service or
//! library each.
//!
//! # Features
//!
//! - Pure found/not-found decision shared by static and rendered probes
//! - Independent pools for HTTP requests and browser pages
//! - Per-site retry budget, `Retry-After` handling and rate-limit spacing
//! - Per-probe and per-category failure isolation
//!
//! # Example
//!
//! ```rust,no_run
//! use footprint_catalog::Catalog;
//! use footprint_core::AppConfig;
//! use footprint_scanner::{run_invocation, ScanRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load_with_env()?;
//! let catalog = Catalog::bootstrap(&config.catalog).await?;
//! let request = ScanRequest {
//!     username: Some("alice".to_string()),
//!     ..ScanRequest::default()
//! };
//!
//! let context = run_invocation(&config, &catalog, &request).await?;
//! println!("{}", serde_json::to_string_pretty(&context)?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod decision;
pub mod error;
pub mod manager;
pub mod orchestrator;
pub mod probe;
pub mod request;
pub mod scanners;
pub mod throttle;
#[allow(missing_docs)]
pub mod url_builder;

// Re-export commonly used types
pub use decision::{decide, DecisionPolicy, GENERIC_NEGATIVE_PHRASES};
pub use error::{Result, ScannerError};
pub use manager::{AggregateContext, ScanManager};
pub use orchestrator::{FoundSite, ProbeJob, ScanOrchestrator, ScanResult, SiteSweep};
pub use probe::{DynamicProber, ProbeOutcome, ProbeStrategy, StaticProber};
pub use request::{needs_browser, run_invocation, ScanRequest};
pub use scanners::{ScanOutput, Scanner};
pub use url_builder::{build_probe_url, ProbeParams};
