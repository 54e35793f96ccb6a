//! Configuration management for Footprint.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// User agent sent by both probe strategies unless a site overrides it.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36";

/// Remote location of the username site document.
pub const DEFAULT_USERNAME_SITES_URL: &str =
    "https://raw.githubusercontent.com/XeinTDM/OSINT/main/data/sites.json";

/// Remote location of the full-name site document.
pub const DEFAULT_FULL_NAME_SITES_URL: &str =
    "https://raw.githubusercontent.com/XeinTDM/OSINT/main/data/full_name_sites.json";

/// Main application configuration.
///
/// This is loaded from `~/.config/footprint/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Probe and scan behavior settings
    pub scanning: ScanningConfig,
    /// Headless browser settings
    pub browser: BrowserConfig,
    /// Site catalog locations
    pub catalog: CatalogConfig,
    /// External API endpoints and credentials
    pub apis: ApiConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!(path = %config_path.display(), "loading config");
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `FOOTPRINT_STATIC_CONCURRENCY`: size of the static probe pool
    /// - `FOOTPRINT_DYNAMIC_CONCURRENCY`: size of the dynamic probe pool
    /// - `FOOTPRINT_HEADLESS`: browser headless mode (true/false)
    /// - `FOOTPRINT_VERIFY_TLS`: TLS certificate verification (true/false)
    /// - `HIBP_API_KEY`: breach lookup API key
    /// - `TWITTER_BEARER_TOKEN`: social profile API bearer token
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("FOOTPRINT_STATIC_CONCURRENCY") {
            match val.parse() {
                Ok(n) => {
                    self.scanning.static_concurrency = n;
                    tracing::debug!(value = n, "override scanning.static_concurrency from env");
                }
                Err(_) => {
                    tracing::warn!(value = %val, "ignoring invalid FOOTPRINT_STATIC_CONCURRENCY");
                }
            }
        }

        if let Some(val) = lookup("FOOTPRINT_DYNAMIC_CONCURRENCY") {
            match val.parse() {
                Ok(n) => {
                    self.scanning.dynamic_concurrency = n;
                    tracing::debug!(value = n, "override scanning.dynamic_concurrency from env");
                }
                Err(_) => {
                    tracing::warn!(value = %val, "ignoring invalid FOOTPRINT_DYNAMIC_CONCURRENCY");
                }
            }
        }

        if let Some(val) = lookup("FOOTPRINT_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!(headless, "override browser.headless from env");
            }
        }

        if let Some(val) = lookup("FOOTPRINT_VERIFY_TLS") {
            if let Ok(verify) = val.parse() {
                self.scanning.verify_tls = verify;
                tracing::debug!(verify, "override scanning.verify_tls from env");
            }
        }

        if let Some(key) = lookup("HIBP_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.apis.hibp_api_key = Some(key);
        }

        if let Some(token) = lookup("TWITTER_BEARER_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.apis.twitter_bearer_token = Some(token);
        }
    }

    /// Reject values no scan can run with.
    pub fn validate(&self) -> ConfigResult<()> {
        let checks: [(&str, u64); 6] = [
            ("scanning.static_concurrency", self.scanning.static_concurrency as u64),
            ("scanning.dynamic_concurrency", self.scanning.dynamic_concurrency as u64),
            ("scanning.request_timeout_secs", self.scanning.request_timeout_secs),
            ("scanning.port_scan_concurrency", self.scanning.port_scan_concurrency as u64),
            ("browser.navigation_timeout_secs", self.browser.navigation_timeout_secs),
            ("catalog.refresh_timeout_secs", self.catalog.refresh_timeout_secs),
        ];

        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        if self.scanning.port_scan_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scanning.port_scan_timeout_ms".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist. Credentials are not written.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!(path = %config_path.display(), "saving config");

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/footprint/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "footprint", "footprint").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/footprint`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "footprint", "footprint").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Probe and scan behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ScanningConfig {
    /// Maximum in-flight static (plain HTTP) probes
    pub static_concurrency: usize,
    /// Maximum in-flight dynamic (browser page) probes
    pub dynamic_concurrency: usize,
    /// Default per-request timeout in seconds, used when a site sets none
    pub request_timeout_secs: u64,
    /// Verify TLS certificates of probed sites
    pub verify_tls: bool,
    /// User agent string
    pub user_agent: String,
    /// Re-attempt static probes that came back not-found
    pub retry_not_found_static: bool,
    /// Re-attempt dynamic probes that came back not-found
    pub retry_not_found_dynamic: bool,
    /// Apply the generic negative-phrase filter to every site
    pub force_negative_phrase_filter: bool,
    /// Per-port TCP connect timeout in milliseconds
    pub port_scan_timeout_ms: u64,
    /// Maximum concurrent TCP connect attempts
    pub port_scan_concurrency: usize,
    /// Upper bound for any `Retry-After` sleep, in seconds
    pub max_retry_after_secs: u64,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            static_concurrency: 4,
            dynamic_concurrency: 2,
            request_timeout_secs: 45,
            verify_tls: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry_not_found_static: true,
            retry_not_found_dynamic: false,
            force_negative_phrase_filter: false,
            port_scan_timeout_ms: 1000,
            port_scan_concurrency: 50,
            max_retry_after_secs: 10,
        }
    }
}

/// Navigation completion condition for dynamic probes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    /// The `load` event has fired
    Load,
    /// The `DOMContentLoaded` event has fired
    #[default]
    DomContentLoaded,
    /// The navigation response was received
    Commit,
}

/// Headless browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// When a navigation counts as finished
    pub wait_until: WaitUntil,
    /// Explicit Chromium executable; auto-detected when unset
    pub executable: Option<PathBuf>,
    /// Pick a random desktop user agent and viewport per browser launch
    pub randomize_fingerprint: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            navigation_timeout_secs: 90,
            wait_until: WaitUntil::DomContentLoaded,
            executable: None,
            randomize_fingerprint: false,
        }
    }
}

/// Site catalog locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Directory holding the local catalog documents; the XDG data dir when unset
    pub data_dir: Option<PathBuf>,
    /// Remote username site document
    pub username_sites_url: String,
    /// Remote full-name site document
    pub full_name_sites_url: String,
    /// Timeout for a remote refresh, in seconds
    pub refresh_timeout_secs: u64,
}

impl CatalogConfig {
    /// Resolve the directory holding the catalog documents.
    pub fn resolve_data_dir(&self) -> ConfigResult<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => AppConfig::data_dir(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            username_sites_url: DEFAULT_USERNAME_SITES_URL.to_string(),
            full_name_sites_url: DEFAULT_FULL_NAME_SITES_URL.to_string(),
            refresh_timeout_secs: 10,
        }
    }
}

/// External API endpoints and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Breach lookup service base URL
    pub hibp_base_url: String,
    /// Social profile service base URL
    pub twitter_base_url: String,
    /// Domain registration (RDAP) service base URL
    pub rdap_base_url: String,
    /// Timeout for single API calls, in seconds
    pub timeout_secs: u64,
    /// Breach lookup API key (from the environment, never written to disk)
    #[serde(skip)]
    pub hibp_api_key: Option<String>,
    /// Social profile bearer token (from the environment, never written to disk)
    #[serde(skip)]
    pub twitter_bearer_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            hibp_base_url: "https://haveibeenpwned.com/api/v3".to_string(),
            twitter_base_url: "https://api.twitter.com".to_string(),
            rdap_base_url: "https://rdap.org".to_string(),
            timeout_secs: 15,
            hibp_api_key: None,
            twitter_bearer_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scanning.static_concurrency, 4);
        assert_eq!(config.scanning.dynamic_concurrency, 2);
        assert_eq!(config.scanning.request_timeout_secs, 45);
        assert!(!config.scanning.verify_tls);
        assert!(config.scanning.retry_not_found_static);
        assert!(!config.scanning.retry_not_found_dynamic);
        assert!(config.browser.headless);
        assert_eq!(config.browser.navigation_timeout_secs, 90);
        assert_eq!(config.browser.wait_until, WaitUntil::DomContentLoaded);
        assert_eq!(config.catalog.refresh_timeout_secs, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = AppConfig::default();
        config.apis.hibp_api_key = Some("secret".to_string());

        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[scanning]"));
        assert!(toml_str.contains("[browser]"));
        assert!(toml_str.contains("wait_until = \"domcontentloaded\""));
        assert!(!toml_str.contains("secret"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.scanning.user_agent, config.scanning.user_agent);
        assert!(parsed.apis.hibp_api_key.is_none());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.scanning.static_concurrency = 30;
        config.browser.wait_until = WaitUntil::Load;

        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config file");

        let loaded_contents = fs::read_to_string(&config_path).expect("read config file");
        let loaded: AppConfig = toml::from_str(&loaded_contents).expect("parse loaded config");

        assert_eq!(loaded.scanning.static_concurrency, 30);
        assert_eq!(loaded.browser.wait_until, WaitUntil::Load);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("FOOTPRINT_STATIC_CONCURRENCY", "12"),
            ("FOOTPRINT_DYNAMIC_CONCURRENCY", "not-a-number"),
            ("FOOTPRINT_HEADLESS", "false"),
            ("FOOTPRINT_VERIFY_TLS", "true"),
            ("HIBP_API_KEY", "hibp-key"),
            ("TWITTER_BEARER_TOKEN", "  "),
        ]);

        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.scanning.static_concurrency, 12);
        assert_eq!(config.scanning.dynamic_concurrency, 2);
        assert!(!config.browser.headless);
        assert!(config.scanning.verify_tls);
        assert_eq!(config.apis.hibp_api_key.as_deref(), Some("hibp-key"));
        assert!(config.apis.twitter_bearer_token.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_pool() {
        let mut config = AppConfig::default();
        config.scanning.dynamic_concurrency = 0;

        let err = config.validate().expect_err("zero pool must be rejected");
        assert!(err.to_string().contains("scanning.dynamic_concurrency"));
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[scanning]
static_concurrency = 30
retry_not_found_static = false

[catalog]
data_dir = "/tmp/footprint"
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.scanning.static_concurrency, 30);
        assert!(!config.scanning.retry_not_found_static);
        assert_eq!(
            config.catalog.resolve_data_dir().expect("data dir"),
            PathBuf::from("/tmp/footprint")
        );
        // These should be defaults
        assert_eq!(config.scanning.dynamic_concurrency, 2);
        assert!(config.browser.headless);
    }
}
