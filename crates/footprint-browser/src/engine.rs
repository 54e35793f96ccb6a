use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use crate::session::BrowserSession;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::target::CreateBrowserContextParams;
use footprint_core::BrowserConfig;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One headless browser process shared by every category scan of an invocation
pub struct BrowserEngine {
    pub(crate) browser: Browser,
    fingerprint: FingerprintConfig,
    handler: JoinHandle<()>,
}

impl BrowserEngine {
    /// Launch a browser configured from settings
    pub async fn launch(settings: &BrowserConfig, user_agent: &str) -> Result<Self> {
        Self::with_fingerprint(settings, FingerprintConfig::from_settings(settings, user_agent))
            .await
    }

    /// Launch a browser presenting a specific fingerprint
    pub async fn with_fingerprint(
        settings: &BrowserConfig,
        fingerprint: FingerprintConfig,
    ) -> Result<Self> {
        let mut builder = ChromeConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .request_timeout(Duration::from_secs(settings.navigation_timeout_secs))
            .arg(format!("--user-agent={}", fingerprint.user_agent));

        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &settings.executable {
            builder = builder.chrome_executable(path);
        }

        let config = builder.build().map_err(BrowserError::LaunchError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchError(e.to_string()))?;

        // Spawn browser handler
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler reported an error");
                }
            }
        });

        info!(
            headless = settings.headless,
            user_agent = %fingerprint.user_agent,
            "browser launched"
        );

        Ok(Self {
            browser,
            fingerprint,
            handler,
        })
    }

    /// Fingerprint the browser was launched with
    pub fn fingerprint(&self) -> &FingerprintConfig {
        &self.fingerprint
    }

    /// Open an isolated browser context for one category scan
    pub async fn new_session(&self) -> Result<BrowserSession<'_>> {
        let created = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await?;
        let context_id = created.result.browser_context_id.clone();
        debug!(context = ?context_id, "browser context opened");
        Ok(BrowserSession::new(self, context_id))
    }

    /// Close the browser process and stop the handler task
    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "failed to close browser cleanly");
        }
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "failed to reap browser process");
        }
        self.handler.abort();
        info!("browser shut down");
    }
}
