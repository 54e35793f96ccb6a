//! Scan orchestrator for fanning one target out over many sites.
//!
//! This module provides the [`ScanOrchestrator`], which runs one probe per
//! applicable site on the strategy the site requires. Probes are bounded by
//! the static and dynamic pools only; a failing or panicking probe becomes an
//! error entry and never disturbs its siblings.

use crate::error::{Result, ScannerError};
use crate::probe::{DynamicProber, ProbeOutcome, ProbeStrategy, StaticProber};
use crate::throttle::SiteThrottle;
use crate::url_builder::{build_probe_url, ProbeParams};
use footprint_browser::{BrowserEngine, BrowserSession};
use footprint_catalog::SiteDefinition;
use footprint_core::{BrowserConfig, ScanningConfig};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "Scan Orchestrator";

/// One probe to schedule: a site and the values for its placeholders.
#[derive(Debug, Clone)]
pub struct ProbeJob {
    /// Site to probe
    pub site: Arc<SiteDefinition>,
    /// Placeholder values
    pub params: ProbeParams,
}

/// Lifecycle of one category sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPhase {
    /// Selecting sites and opening the browser context
    Init,
    /// Scheduling probes
    Dispatch,
    /// Awaiting probe completion
    Collecting,
    /// Context closed, result built
    Done,
}

/// Every outcome of one sweep, in completion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteSweep {
    /// One outcome per dispatched probe
    pub outcomes: Vec<ProbeOutcome>,
    /// Jobs dropped because their site is inactive
    pub skipped_inactive: usize,
}

impl SiteSweep {
    /// Outcomes where the target was found.
    pub fn found(&self) -> impl Iterator<Item = &ProbeOutcome> {
        self.outcomes.iter().filter(|o| o.found)
    }

    /// Error strings of the probes that failed.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error.as_ref().map(|e| format!("{}: {e}", o.site_name)))
            .collect()
    }
}

/// A site where the target was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoundSite {
    /// Site display name
    pub name: String,
    /// Probed URL
    pub url: String,
}

/// Result of one catalog category scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    /// Echo of the scanned target
    #[serde(flatten)]
    pub target: serde_json::Map<String, serde_json::Value>,
    /// Sites that know the target, in completion order
    pub found_on: Vec<FoundSite>,
    /// Failed probes
    pub errors: Vec<String>,
}

impl ScanResult {
    /// Build the result of a finished sweep.
    #[must_use]
    pub fn from_sweep(
        target: serde_json::Map<String, serde_json::Value>,
        sweep: &SiteSweep,
    ) -> Self {
        Self {
            target,
            found_on: sweep
                .found()
                .map(|o| FoundSite {
                    name: o.site_name.clone(),
                    url: o.url.clone(),
                })
                .collect(),
            errors: sweep.errors(),
        }
    }
}

/// Runs probe jobs on the static and dynamic pools.
///
/// One orchestrator is shared by every category scan of an invocation, so
/// the pool limits hold across categories.
#[derive(Debug)]
pub struct ScanOrchestrator {
    static_prober: StaticProber,
    dynamic_prober: DynamicProber,
}

impl ScanOrchestrator {
    /// Create the probers from configuration.
    pub fn new(scanning: &ScanningConfig, browser: &BrowserConfig) -> Result<Self> {
        let throttle = Arc::new(SiteThrottle::new());
        Ok(Self {
            static_prober: StaticProber::new(scanning, browser, Arc::clone(&throttle))?,
            dynamic_prober: DynamicProber::new(scanning, browser, throttle),
        })
    }

    /// Probe every active job and collect one outcome per job.
    ///
    /// A browser context is opened only when some active site needs
    /// JavaScript, and it is closed before returning whatever happened.
    pub async fn run(&self, jobs: Vec<ProbeJob>, browser: Option<&BrowserEngine>) -> SiteSweep {
        debug!(phase = ?SweepPhase::Init, jobs = jobs.len(), "starting sweep");
        let total = jobs.len();
        let active: Vec<ProbeJob> = jobs.into_iter().filter(|j| j.site.active).collect();
        let skipped_inactive = total - active.len();
        if skipped_inactive > 0 {
            debug!(skipped = skipped_inactive, "skipping inactive sites");
        }

        let needs_browser = active.iter().any(|j| j.site.requires_js);
        let mut session_failure = None;
        let session = match browser {
            Some(engine) if needs_browser => match engine.new_session().await {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(error = %e, "failed to open browser context");
                    session_failure = Some(e.to_string());
                    None
                }
            },
            _ => None,
        };
        let session_failure = session_failure.as_deref();
        let session_ref = session.as_ref();

        let outcomes = collect_outcomes(active, move |site, url| async move {
            self.dispatch(&site, &url, session_ref, session_failure).await
        })
        .await;

        if let Some(session) = session {
            session.close().await;
        }

        let sweep = SiteSweep {
            outcomes,
            skipped_inactive,
        };
        info!(
            phase = ?SweepPhase::Done,
            probes = sweep.outcomes.len(),
            found = sweep.found().count(),
            errors = sweep.outcomes.iter().filter(|o| o.error.is_some()).count(),
            "sweep finished"
        );
        sweep
    }

    async fn dispatch(
        &self,
        site: &SiteDefinition,
        url: &str,
        session: Option<&BrowserSession<'_>>,
        session_failure: Option<&str>,
    ) -> Result<bool> {
        match (ProbeStrategy::for_site(site), session) {
            (ProbeStrategy::Static, _) => self.static_prober.probe(site, url).await,
            (ProbeStrategy::Dynamic, Some(session)) => {
                self.dynamic_prober.probe(session, site, url).await
            }
            (ProbeStrategy::Dynamic, None) => Err(ScannerError::internal(
                COMPONENT,
                match session_failure {
                    Some(reason) => format!("browser context unavailable: {reason}"),
                    None => "site requires JavaScript but no browser is running".to_string(),
                },
            )),
        }
    }
}

/// Dispatch every job through `probe` and collect one outcome per job.
///
/// A job whose URL cannot be built, whose probe fails or whose probe panics
/// still yields an outcome, with `found = false` and the error recorded.
async fn collect_outcomes<F, Fut>(jobs: Vec<ProbeJob>, probe: F) -> Vec<ProbeOutcome>
where
    F: Fn(Arc<SiteDefinition>, String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    debug!(phase = ?SweepPhase::Dispatch, probes = jobs.len(), "dispatching probes");
    let mut outcomes = Vec::with_capacity(jobs.len());
    let mut pending = FuturesUnordered::new();

    for job in jobs {
        let strategy = ProbeStrategy::for_site(&job.site);
        let url = match build_probe_url(&job.site, &job.params) {
            Ok(url) => url,
            Err(e) => {
                warn!(site = %job.site.id, error = %e, "cannot build probe URL");
                let template = job.site.url_template.clone();
                outcomes.push(failed(&job.site, template, strategy, e.to_string()));
                continue;
            }
        };

        let attempt = probe(Arc::clone(&job.site), url.clone());
        pending.push(async move {
            let result = AssertUnwindSafe(attempt).catch_unwind().await;
            (job.site, url, strategy, result)
        });
    }

    debug!(phase = ?SweepPhase::Collecting, in_flight = pending.len(), "collecting outcomes");
    while let Some((site, url, strategy, result)) = pending.next().await {
        let outcome = match result {
            Ok(Ok(found)) => ProbeOutcome {
                site_id: site.id.clone(),
                site_name: site.name.clone(),
                url,
                found,
                strategy,
                error: None,
            },
            Ok(Err(e)) => {
                warn!(site = %site.id, error = %e, "probe failed");
                failed(&site, url, strategy, e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(site = %site.id, panic = %message, "probe panicked");
                failed(&site, url, strategy, format!("probe panicked: {message}"))
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}

fn failed(
    site: &SiteDefinition,
    url: String,
    strategy: ProbeStrategy,
    error: String,
) -> ProbeOutcome {
    ProbeOutcome {
        site_id: site.id.clone(),
        site_name: site.name.clone(),
        url,
        found: false,
        strategy,
        error: Some(error),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
