//! Per-scan browser contexts and page rendering.
//!
//! A [`BrowserSession`] owns one browser context. Every render opens a fresh
//! page inside it, blocks heavy subresources, navigates, reads the DOM and
//! closes the page again whatever the outcome.

use crate::engine::BrowserEngine;
use crate::error::{BrowserError, Result};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams, EventRequestPaused, FailRequestParams, RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, EventResponseReceived, Headers, ResourceType, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EventDomContentEventFired, EventLoadEventFired, NavigateParams,
};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::Page;
use footprint_core::WaitUntil;
use futures::{FutureExt, StreamExt};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Subresource kinds that are never loaded during a render
pub const BLOCKED_RESOURCE_TYPES: [ResourceType; 4] = [
    ResourceType::Image,
    ResourceType::Stylesheet,
    ResourceType::Font,
    ResourceType::Media,
];

/// How a single page should be rendered
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Budget for navigation plus DOM read
    pub timeout: Duration,
    /// When the navigation counts as finished
    pub wait_until: WaitUntil,
    /// Extra request headers
    pub headers: BTreeMap<String, String>,
    /// Per-page user agent override
    pub user_agent: Option<String>,
}

/// Result of rendering one page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Status of the main document response, when one was observed
    pub status: Option<u16>,
    /// Serialized DOM after the wait condition
    pub content: String,
    /// URL after redirects
    pub final_url: Option<String>,
}

/// One browser context, shared by every dynamic probe of a category scan
pub struct BrowserSession<'a> {
    engine: &'a BrowserEngine,
    context_id: BrowserContextId,
}

impl<'a> BrowserSession<'a> {
    pub(crate) fn new(engine: &'a BrowserEngine, context_id: BrowserContextId) -> Self {
        Self { engine, context_id }
    }

    /// Render `url` in a new page of this context
    pub async fn render(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage> {
        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(self.context_id.clone())
            .build()
            .map_err(|reason| BrowserError::NavigationError {
                url: url.to_string(),
                reason,
            })?;

        let page = self.engine.browser.new_page(params).await?;
        let outcome = drive(&page, url, options).await;

        if let Err(e) = page.close().await {
            debug!(url = %url, error = %e, "failed to close page");
        }

        outcome
    }

    /// Dispose of the browser context and every page left in it
    pub async fn close(self) {
        let dispose = DisposeBrowserContextParams::new(self.context_id.clone());
        match self.engine.browser.execute(dispose).await {
            Ok(_) => debug!(context = ?self.context_id, "browser context closed"),
            Err(e) => {
                warn!(context = ?self.context_id, error = %e, "failed to close browser context");
            }
        }
    }
}

async fn drive(page: &Page, url: &str, options: &RenderOptions) -> Result<RenderedPage> {
    let interceptor = block_subresources(page).await?;
    let rendered = tokio::time::timeout(options.timeout, navigate(page, url, options)).await;
    interceptor.abort();

    rendered.map_err(|_| BrowserError::Timeout {
        url: url.to_string(),
        after: options.timeout,
    })?
}

async fn block_subresources(page: &Page) -> Result<JoinHandle<()>> {
    let mut paused = page.event_listener::<EventRequestPaused>().await?;

    let patterns: Vec<RequestPattern> = BLOCKED_RESOURCE_TYPES
        .iter()
        .map(|kind| {
            RequestPattern::builder()
                .url_pattern("*")
                .resource_type(kind.clone())
                .request_stage(RequestStage::Request)
                .build()
        })
        .collect();
    page.execute(EnableParams::builder().patterns(patterns).build())
        .await?;

    let page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let fail =
                FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
            if let Err(e) = page.execute(fail).await {
                trace!(error = %e, "failed to block subresource");
            }
        }
    }))
}

async fn navigate(page: &Page, url: &str, options: &RenderOptions) -> Result<RenderedPage> {
    if let Some(user_agent) = &options.user_agent {
        page.execute(SetUserAgentOverrideParams::new(user_agent.clone()))
            .await?;
    }

    if !options.headers.is_empty() {
        let headers: serde_json::Map<String, serde_json::Value> = options
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(
            serde_json::Value::Object(headers),
        )))
        .await?;
    }

    let mut responses = page.event_listener::<EventResponseReceived>().await?;
    let mut dom_ready = page.event_listener::<EventDomContentEventFired>().await?;
    let mut loaded = page.event_listener::<EventLoadEventFired>().await?;

    let navigation = page.execute(NavigateParams::new(url)).await?;
    if let Some(reason) = navigation.result.error_text.clone() {
        return Err(BrowserError::NavigationError {
            url: url.to_string(),
            reason,
        });
    }
    let frame_id = navigation.result.frame_id.clone();

    match options.wait_until {
        WaitUntil::Commit => {}
        WaitUntil::DomContentLoaded => {
            dom_ready.next().await;
        }
        WaitUntil::Load => {
            loaded.next().await;
        }
    }

    // Last main-frame document response wins, so redirects report the final status
    let mut status = None;
    while let Some(Some(event)) = responses.next().now_or_never() {
        if event.r#type == ResourceType::Document && event.frame_id.as_ref() == Some(&frame_id) {
            status = u16::try_from(event.response.status).ok();
        }
    }

    let content = page.content().await?;
    let final_url = page.url().await?;

    Ok(RenderedPage {
        status,
        content,
        final_url,
    })
}
