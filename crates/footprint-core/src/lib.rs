//! Footprint Core - Foundation crate for the Footprint presence scanner.
//!
//! This crate provides shared types, error handling and configuration
//! management that all other Footprint crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`SiteId`, `ScanCategory`)
//!
//! # Example
//!
//! ```rust
//! use footprint_core::{AppConfig, ScanCategory};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.scanning.static_concurrency, 4);
//! assert_eq!(ScanCategory::DomainIp.context_key(), "domain_ip_analysis");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    ApiConfig, AppConfig, BrowserConfig, CatalogConfig, ScanningConfig, WaitUntil,
    DEFAULT_USER_AGENT,
};
pub use error::{ConfigError, ConfigResult, CoreError, Result};
pub use types::{context_key, ScanCategory, SiteId};
