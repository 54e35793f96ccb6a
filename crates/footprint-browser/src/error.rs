use chromiumoxide::error::CdpError;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    LaunchError(String),

    #[error("chromium error: {0}")]
    ChromiumError(#[from] CdpError),

    #[error("navigation to {url} failed: {reason}")]
    NavigationError { url: String, reason: String },

    #[error("timed out after {}s rendering {url}", .after.as_secs())]
    Timeout { url: String, after: Duration },
}

impl BrowserError {
    /// Failures a fresh attempt may not hit again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::NavigationError { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BrowserError::NavigationError {
            url: "https://example.com".to_string(),
            reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "navigation to https://example.com failed: net::ERR_NAME_NOT_RESOLVED"
        );
    }

    #[test]
    fn test_timeout_is_transient() {
        let err = BrowserError::Timeout {
            url: "https://example.com".to_string(),
            after: Duration::from_secs(90),
        };
        assert!(err.to_string().contains("90s"));
        assert!(err.is_transient());
        assert!(!BrowserError::LaunchError("no chrome".to_string()).is_transient());
    }
}
