use footprint_core::BrowserConfig;
use rand::Rng;

/// Desktop user agents used when the fingerprint is randomized
const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Common desktop viewport sizes
const VIEWPORTS: [(u32, u32); 4] = [(1920, 1080), (1366, 768), (1536, 864), (1440, 900)];

/// Identity the browser presents to probed sites
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintConfig {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl FingerprintConfig {
    /// Fixed fingerprint from settings
    pub fn from_settings(settings: &BrowserConfig, user_agent: &str) -> Self {
        if settings.randomize_fingerprint {
            return Self::randomized();
        }

        Self {
            user_agent: user_agent.to_string(),
            viewport_width: settings.window_width,
            viewport_height: settings.window_height,
        }
    }

    /// Generate a randomized fingerprint configuration
    pub fn randomized() -> Self {
        let mut rng = rand::thread_rng();

        let ua_idx = rng.gen_range(0..USER_AGENTS.len());
        let vp_idx = rng.gen_range(0..VIEWPORTS.len());
        let (width, height) = VIEWPORTS[vp_idx];

        Self {
            user_agent: USER_AGENTS[ua_idx].to_string(),
            viewport_width: width,
            viewport_height: height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings_keeps_configured_agent() {
        let settings = BrowserConfig::default();
        let config = FingerprintConfig::from_settings(&settings, "TestAgent/1.0");
        assert_eq!(config.user_agent, "TestAgent/1.0");
        assert_eq!(config.viewport_width, 1920);
        assert_eq!(config.viewport_height, 1080);
    }

    #[test]
    fn test_randomized_fingerprint() {
        let config = FingerprintConfig::randomized();
        assert!(USER_AGENTS.contains(&config.user_agent.as_str()));
        assert!(VIEWPORTS.contains(&(config.viewport_width, config.viewport_height)));
    }

    #[test]
    fn test_fingerprint_variation() {
        // Probabilistic, but ten identical draws out of three agents is very unlikely
        let configs: Vec<_> = (0..10).map(|_| FingerprintConfig::randomized()).collect();

        let first_ua = &configs[0].user_agent;
        let all_same = configs.iter().all(|c| &c.user_agent == first_ua);
        assert!(!all_same, "Expected variation in user agents");
    }

    #[test]
    fn test_from_settings_randomizes_when_enabled() {
        let settings = BrowserConfig {
            randomize_fingerprint: true,
            ..BrowserConfig::default()
        };
        let config = FingerprintConfig::from_settings(&settings, "TestAgent/1.0");
        assert_ne!(config.user_agent, "TestAgent/1.0");
    }
}
