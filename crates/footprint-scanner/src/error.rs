use std::time::Duration;
use thiserror::Error;

/// Boxed lower-level cause carried by a [`ScannerError`].
pub type Cause = Box<dyn std::error::Error + Send + Sync>;

/// Failure raised by a probe or a category scanner.
///
/// Every variant names the component it originated from so the aggregate
/// report can tell which part of a scan went wrong.
#[derive(Debug, Error)]
pub enum ScannerError {
    /// Connection failure or timeout
    #[error("[{scanner} Error]: {message}")]
    Network {
        /// Originating component
        scanner: String,
        /// What was being attempted
        message: String,
        /// Underlying transport error
        #[source]
        source: Option<Cause>,
    },

    /// Remote API answered with an unexpected status
    #[error("[{scanner} Error]: {message}")]
    Api {
        /// Originating component
        scanner: String,
        /// Description including the status
        message: String,
        /// HTTP status, when one was received
        status: Option<u16>,
    },

    /// Response body could not be interpreted
    #[error("[{scanner} Error]: {message}")]
    Parsing {
        /// Originating component
        scanner: String,
        /// What could not be parsed
        message: String,
        /// Underlying decode error
        #[source]
        source: Option<Cause>,
    },

    /// Remote side asked us to slow down (HTTP 429)
    #[error("[{scanner} Error]: rate limited{}", retry_hint(*retry_after))]
    RateLimited {
        /// Originating component
        scanner: String,
        /// Value of the `Retry-After` header, when present
        retry_after: Option<Duration>,
    },

    /// Missing or rejected credential
    #[error("[{scanner} Error]: {message}")]
    Authentication {
        /// Originating component
        scanner: String,
        /// Description
        message: String,
    },

    /// Target or site definition cannot produce a request
    #[error("[{scanner} Error]: {message}")]
    InvalidInput {
        /// Originating component
        scanner: String,
        /// Description
        message: String,
    },

    /// Page rendering failed
    #[error("[{scanner} Error]: {source}")]
    Browser {
        /// Originating component
        scanner: String,
        /// Underlying browser error
        #[source]
        source: footprint_browser::BrowserError,
    },

    /// Unexpected internal failure
    #[error("[{scanner} Error]: {message}")]
    Internal {
        /// Originating component
        scanner: String,
        /// Description
        message: String,
    },
}

fn retry_hint(retry_after: Option<Duration>) -> String {
    retry_after
        .map(|d| format!(", retry after {}s", d.as_secs()))
        .unwrap_or_default()
}

impl ScannerError {
    /// Classify a `reqwest` failure.
    ///
    /// Timeouts and connection problems become [`ScannerError::Network`],
    /// body decode failures [`ScannerError::Parsing`] and request construction
    /// failures [`ScannerError::InvalidInput`].
    pub fn from_reqwest(scanner: &str, context: &str, error: reqwest::Error) -> Self {
        if error.is_builder() {
            return Self::InvalidInput {
                scanner: scanner.to_string(),
                message: format!("{context}: {error}"),
            };
        }
        if error.is_decode() {
            return Self::Parsing {
                scanner: scanner.to_string(),
                message: format!("{context}: invalid response body"),
                source: Some(Box::new(error)),
            };
        }

        let kind = if error.is_timeout() {
            "timed out"
        } else if error.is_connect() {
            "connection failed"
        } else {
            "request failed"
        };
        Self::Network {
            scanner: scanner.to_string(),
            message: format!("{context}: {kind}"),
            source: Some(Box::new(error)),
        }
    }

    /// Unexpected API status.
    pub fn api(scanner: &str, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            scanner: scanner.to_string(),
            message: message.into(),
            status: Some(status),
        }
    }

    /// Malformed response body.
    pub fn parsing(scanner: &str, message: impl Into<String>) -> Self {
        Self::Parsing {
            scanner: scanner.to_string(),
            message: message.into(),
            source: None,
        }
    }

    /// Missing or rejected credential.
    pub fn authentication(scanner: &str, message: impl Into<String>) -> Self {
        Self::Authentication {
            scanner: scanner.to_string(),
            message: message.into(),
        }
    }

    /// Unusable input.
    pub fn invalid_input(scanner: &str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            scanner: scanner.to_string(),
            message: message.into(),
        }
    }

    /// Unexpected internal failure.
    pub fn internal(scanner: &str, message: impl Into<String>) -> Self {
        Self::Internal {
            scanner: scanner.to_string(),
            message: message.into(),
        }
    }

    /// Name of the component that raised the error.
    #[must_use]
    pub fn scanner(&self) -> &str {
        match self {
            Self::Network { scanner, .. }
            | Self::Api { scanner, .. }
            | Self::Parsing { scanner, .. }
            | Self::RateLimited { scanner, .. }
            | Self::Authentication { scanner, .. }
            | Self::InvalidInput { scanner, .. }
            | Self::Browser { scanner, .. }
            | Self::Internal { scanner, .. } => scanner,
        }
    }

    /// Whether another attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimited { .. } => true,
            Self::Browser { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Wait requested by the remote side, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Result type for scanner operations.
pub type Result<T> = std::result::Result<T, ScannerError>;
