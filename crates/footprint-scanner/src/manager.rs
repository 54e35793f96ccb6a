//! Scan manager: runs category scanners side by side and merges their
//! output into one [`AggregateContext`].

use crate::scanners::{Keywords, Scanner};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use tracing::{error, info};
use uuid::Uuid;

/// Message stored for a scanner that panicked.
pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred.";

/// Everything one invocation produced, handed whole to the report renderer.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateContext {
    /// Invocation id
    pub scan_id: Uuid,
    /// When the invocation started
    pub started_at: DateTime<Utc>,
    /// When the last scanner finished
    pub finished_at: Option<DateTime<Utc>>,
    /// Echo of the inputs, keyed `target_*`
    #[serde(flatten)]
    pub targets: BTreeMap<String, Value>,
    /// Scanner output or `{"error": ...}`, keyed by category
    #[serde(flatten)]
    pub results: BTreeMap<String, Value>,
    /// Keywords collected from every scanner
    pub osint_keywords: Keywords,
}

impl AggregateContext {
    /// Start a new, empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scan_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            targets: BTreeMap::new(),
            results: BTreeMap::new(),
            osint_keywords: Keywords::new(),
        }
    }

    /// Record an input under `target_<name>`.
    pub fn set_target(&mut self, name: &str, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.targets.insert(format!("target_{name}"), value);
    }

    /// Merge keywords, keeping each value once per kind.
    pub fn merge_keywords(&mut self, keywords: Keywords) {
        for (kind, values) in keywords {
            let slot = self.osint_keywords.entry(kind).or_default();
            for value in values {
                if !slot.contains(&value) {
                    slot.push(value);
                }
            }
        }
    }

    /// Whether the category stored under `key` failed.
    #[must_use]
    pub fn is_error(&self, key: &str) -> bool {
        self.results
            .get(key)
            .and_then(|v| v.get("error"))
            .is_some()
    }
}

impl Default for AggregateContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs category scanners concurrently, one failure boundary each.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanManager;

impl ScanManager {
    /// Create a manager.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run every scanner and store its output under its category key.
    ///
    /// A scanner that fails or panics is recorded as `{"error": message}`;
    /// the others still complete.
    pub async fn run(&self, scanners: &[Box<dyn Scanner + '_>], context: &mut AggregateContext) {
        let runs = scanners.iter().map(|scanner| async move {
            info!(scanner = scanner.name(), "scanner started");
            let outcome = AssertUnwindSafe(scanner.scan()).catch_unwind().await;
            (scanner.name(), scanner.category().context_key(), outcome)
        });

        for (name, key, outcome) in join_all(runs).await {
            let value = match outcome {
                Ok(Ok(output)) => {
                    info!(scanner = name, "scanner finished");
                    context.merge_keywords(output.osint_keywords);
                    output.data
                }
                Ok(Err(e)) => {
                    error!(scanner = name, error = %e, "scanner failed");
                    json!({ "error": e.to_string() })
                }
                Err(_) => {
                    error!(scanner = name, "scanner panicked");
                    json!({ "error": UNEXPECTED_ERROR })
                }
            };
            context.results.insert(key, value);
        }
        context.finished_at = Some(Utc::now());
    }
}
