//! Browser rendering engine for JavaScript-heavy sites.
//!
//! Provides one headless browser per invocation, isolated contexts per
//! category scan and a page-per-probe render call that skips heavy
//! subresources.

pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod session;

pub use engine::BrowserEngine;
pub use error::{BrowserError, Result};
pub use fingerprint::FingerprintConfig;
pub use session::{BrowserSession, RenderOptions, RenderedPage};
