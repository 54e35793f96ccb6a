use footprint_catalog::SiteDefinition;
use footprint_core::SiteId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Spaces successive probes to the same site according to its
/// `rateLimitPerMinute` hint.
///
/// Each caller reserves the next free slot under the lock and sleeps outside
/// it, so concurrent probes of one site queue up instead of bursting.
#[derive(Debug, Default)]
pub struct SiteThrottle {
    next_slot: Mutex<HashMap<SiteId, Instant>>,
}

impl SiteThrottle {
    /// Create an empty throttle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `site` may be probed again.
    pub async fn wait(&self, site: &SiteDefinition) {
        let Some(interval) = min_interval(site) else {
            return;
        };

        let slot = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots.get(&site.id).copied().filter(|s| *s > now).unwrap_or(now);
            slots.insert(site.id.clone(), slot + interval);
            slot
        };

        if slot > Instant::now() {
            let delay_ms = (slot - Instant::now()).as_millis();
            debug!(site = %site.id, delay_ms, "throttling probe");
            tokio::time::sleep_until(slot).await;
        }
    }
}

fn min_interval(site: &SiteDefinition) -> Option<Duration> {
    site.rate_limit_per_minute
        .filter(|per_minute| *per_minute > 0)
        .map(|per_minute| Duration::from_secs(60) / per_minute)
}
